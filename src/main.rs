use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use directory_submit::browser::default_candidates;
use directory_submit::error::ConfigError;
use directory_submit::server::{build_router, shutdown_signal, AppState};
use directory_submit::services::LlmFormDetector;
use directory_submit::utils::logging::log_startup;
use directory_submit::{
    logger, AdapterRegistry, BrowserManager, BrowserSettings, Config, LightpandaLauncher,
    MemoryStore, ProcessorSettings, QueueProcessor, SubmissionStore, SupabaseStore,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置（可选的 TOML 文件 + 环境变量）
    let config_path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load(Some(Path::new(&config_path)))?;

    // 初始化日志
    logger::init(config.verbose_logging);

    let store = build_store(&config).await?;

    // 浏览器生命周期管理
    let launcher = LightpandaLauncher::new(
        default_candidates(config.lightpanda_path.as_deref()),
        config.browser_host.clone(),
        config.browser_port,
    );
    let browser = Arc::new(BrowserManager::new(
        Arc::new(launcher),
        BrowserSettings::from_config(&config),
    ));

    // panic 时先强制结束引擎进程，避免留下孤儿进程
    let panic_browser = Arc::clone(&browser);
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        panic_browser.emergency_kill();
        default_hook(info);
    }));

    if config.llm_api_key.is_none() {
        warn!("⚠️ 未配置 LLM API Key，AI 表单识别不可用");
    }
    let registry = Arc::new(AdapterRegistry::with_builtin(Arc::new(
        LlmFormDetector::from_config(&config),
    )));
    info!("已注册适配器: {}", registry.names().join(", "));

    let processor = Arc::new(QueueProcessor::new(
        store,
        Arc::clone(&browser),
        registry,
        ProcessorSettings::from_config(&config),
    ));

    let router = build_router(AppState {
        processor,
        cron_secret: config.cron_secret.clone(),
    });

    let addr = format!("{}:{}", config.host, config.port);
    log_startup(&addr, &config.store_backend, config.batch_size);
    if config.cron_secret.is_none() {
        warn!("⚠️ 未配置 CRON_SECRET，/process-queue 将拒绝所有请求");
    }

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("无法监听 {}", addr))?;

    axum::serve(listener, router)
        .with_graceful_shutdown({
            let browser = Arc::clone(&browser);
            async move {
                shutdown_signal().await;
                // 排空期间仍在处理的请求拿不到新浏览器
                browser.begin_drain();
            }
        })
        .await
        .context("HTTP 服务出错")?;

    // 停止接收请求后释放浏览器资源
    browser.shutdown().await;
    info!("👋 Worker 已退出");

    Ok(())
}

/// 按配置选择存储后端
async fn build_store(config: &Config) -> Result<Arc<dyn SubmissionStore>> {
    match config.store_backend.as_str() {
        "supabase" => {
            if config.supabase_url.is_empty() || config.supabase_service_key.is_empty() {
                bail!("supabase 后端需要 SUPABASE_URL 和 SUPABASE_SERVICE_KEY");
            }
            let store = SupabaseStore::new(&config.supabase_url, &config.supabase_service_key)?;
            Ok(Arc::new(store))
        }
        "memory" => {
            let store = match config.queue_seed_file.as_deref() {
                Some(path) => MemoryStore::from_seed_file(Path::new(path))
                    .await
                    .with_context(|| format!("无法加载队列种子: {}", path))?,
                None => MemoryStore::default(),
            };
            Ok(Arc::new(store))
        }
        other => Err(ConfigError::UnknownStoreBackend(other.to_string()).into()),
    }
}
