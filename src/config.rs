use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- HTTP 触发端点 ---
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 触发批处理的共享密钥（Bearer）
    pub cron_secret: Option<String>,

    // --- 数据存储 ---
    /// 存储后端：supabase | memory
    pub store_backend: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
    /// memory 后端的队列种子文件（TOML）
    pub queue_seed_file: Option<String>,

    // --- 浏览器引擎 ---
    /// 显式指定的 Lightpanda 路径（优先搜索）
    pub lightpanda_path: Option<String>,
    pub browser_host: String,
    pub browser_port: u16,
    pub max_connection_attempts: u32,
    pub health_check_timeout_secs: u64,
    pub ready_timeout_secs: u64,
    pub ready_settle_ms: u64,
    pub kill_grace_ms: u64,
    pub user_agent: String,

    // --- 队列处理 ---
    /// 每批最多处理的作业数
    pub batch_size: usize,
    /// retry_count 上限（拉取条件）
    pub max_retry_count: u32,
    pub inter_job_delay_min_ms: u64,
    pub inter_job_delay_max_ms: u64,

    // --- LLM 配置 ---
    pub llm_api_key: Option<String>,
    pub llm_api_base_url: String,
    pub llm_model_name: String,

    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cron_secret: None,
            store_backend: "supabase".to_string(),
            supabase_url: String::new(),
            supabase_service_key: String::new(),
            queue_seed_file: None,
            lightpanda_path: None,
            browser_host: "127.0.0.1".to_string(),
            browser_port: 9222,
            max_connection_attempts: 3,
            health_check_timeout_secs: 5,
            ready_timeout_secs: 10,
            ready_settle_ms: 2000,
            kill_grace_ms: 1000,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            batch_size: 5,
            max_retry_count: 3,
            inter_job_delay_min_ms: 2000,
            inter_job_delay_max_ms: 5000,
            llm_api_key: None,
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            llm_model_name: "gemini-2.0-flash".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 仅从环境变量构建配置
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 先读取 TOML 配置文件（可选），再叠加环境变量
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) if path.exists() => Self::from_toml_file(path)?,
            _ => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    /// 解析 TOML 配置文件
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn with_env_overrides(self) -> Self {
        let llm_api_key = env_string("GEMINI_API_KEY")
            .or_else(|| env_string("GOOGLE_AI_API_KEY"))
            .or_else(|| env_string("LLM_API_KEY"))
            .or(self.llm_api_key);

        Self {
            host: env_string("HOST").unwrap_or(self.host),
            port: env_parse("PORT").unwrap_or(self.port),
            cron_secret: env_string("CRON_SECRET").or(self.cron_secret),
            store_backend: env_string("STORE_BACKEND").unwrap_or(self.store_backend),
            supabase_url: env_string("SUPABASE_URL").unwrap_or(self.supabase_url),
            supabase_service_key: env_string("SUPABASE_SERVICE_KEY")
                .unwrap_or(self.supabase_service_key),
            queue_seed_file: env_string("QUEUE_SEED_FILE").or(self.queue_seed_file),
            lightpanda_path: env_string("LIGHTPANDA_PATH").or(self.lightpanda_path),
            browser_host: env_string("BROWSER_HOST").unwrap_or(self.browser_host),
            browser_port: env_parse("BROWSER_PORT").unwrap_or(self.browser_port),
            max_connection_attempts: env_parse("MAX_CONNECTION_ATTEMPTS")
                .unwrap_or(self.max_connection_attempts),
            health_check_timeout_secs: env_parse("HEALTH_CHECK_TIMEOUT_SECS")
                .unwrap_or(self.health_check_timeout_secs),
            ready_timeout_secs: env_parse("READY_TIMEOUT_SECS").unwrap_or(self.ready_timeout_secs),
            ready_settle_ms: env_parse("READY_SETTLE_MS").unwrap_or(self.ready_settle_ms),
            kill_grace_ms: env_parse("KILL_GRACE_MS").unwrap_or(self.kill_grace_ms),
            user_agent: env_string("USER_AGENT").unwrap_or(self.user_agent),
            batch_size: env_parse("BATCH_SIZE").unwrap_or(self.batch_size),
            max_retry_count: env_parse("MAX_RETRY_COUNT").unwrap_or(self.max_retry_count),
            inter_job_delay_min_ms: env_parse("INTER_JOB_DELAY_MIN_MS")
                .unwrap_or(self.inter_job_delay_min_ms),
            inter_job_delay_max_ms: env_parse("INTER_JOB_DELAY_MAX_MS")
                .unwrap_or(self.inter_job_delay_max_ms),
            llm_api_key,
            llm_api_base_url: env_string("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: env_string("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
