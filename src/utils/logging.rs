/// 日志工具模块
///
/// 提供批次横幅、统计输出等格式化辅助函数
use tracing::info;

/// 记录程序启动信息
///
/// # 参数
/// - `addr`: HTTP 监听地址
/// - `store_backend`: 存储后端名称
/// - `batch_size`: 每批作业数
pub fn log_startup(addr: &str, store_backend: &str, batch_size: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 目录提交 Worker 启动");
    info!("🌐 监听地址: {}", addr);
    info!("🗄️ 存储后端: {}", store_backend);
    info!("📊 每批最多处理: {} 个作业", batch_size);
    info!("{}", "=".repeat(60));
}

/// 记录批次开始信息
///
/// # 参数
/// - `batch_id`: 批次编号（进程内递增）
/// - `total`: 本批作业数
pub fn log_batch_start(batch_id: u64, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {} 批", batch_id);
    info!("📄 本批作业: {} 个（按创建时间顺序串行处理）", total);
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
///
/// # 参数
/// - `batch_id`: 批次编号
/// - `succeeded`: 成功数量
/// - `failed`: 失败数量
/// - `total`: 本批作业数
pub fn log_batch_complete(batch_id: u64, succeeded: usize, failed: usize, total: usize) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 第 {} 批完成 ({})",
        batch_id,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("✅ 成功: {}/{}", succeeded, total);
    info!("❌ 失败: {}", failed);
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
