use chromiumoxide::error::CdpError;
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 数据存储错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 浏览器相关错误
///
/// 注意：Display 文本会进入错误分类器，措辞需与分类表中的基础设施模式保持一致
/// （"Browser crashed" / "Browser disconnected" / "Connection closed"）。
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 找不到引擎可执行文件
    #[error("Lightpanda binary not found. Searched: {}", searched.join(", "))]
    BinaryNotFound { searched: Vec<String> },

    /// 启动引擎进程失败
    #[error("Browser crashed: failed to spawn engine process: {0}")]
    SpawnFailed(String),

    /// 引擎启动超时
    #[error("Browser crashed: engine startup timeout after {0} ms")]
    StartupTimeout(u64),

    /// 引擎进程已退出
    #[error("Browser crashed: engine process exited (code: {code:?})")]
    ProcessExited { code: Option<i32> },

    /// 连接控制协议失败
    #[error("Connection closed: failed to connect to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// 多次连接尝试全部失败
    #[error("Failed to connect after {attempts} attempts: {last}")]
    AttemptsExhausted { attempts: u32, last: String },

    /// 管理器正在关闭
    #[error("Browser manager is shutting down")]
    ShuttingDown,

    /// 健康检查失败
    #[error("Browser disconnected: health check failed: {0}")]
    HealthCheckFailed(String),

    /// 向进程发送信号失败
    #[error("failed to signal engine process {pid}: {reason}")]
    SignalFailed { pid: u32, reason: String },

    /// CDP 协议错误
    #[error("{}", describe_cdp_error(.0))]
    Cdp(#[from] CdpError),
}

/// 把 CDP 错误翻译成分类器认识的措辞
///
/// 通道 / WebSocket 断开归入 "Browser disconnected"，超时归入 "Timeout exceeded"，
/// 其余保持原文，由分类器按默认规则处理。
pub fn describe_cdp_error(err: &CdpError) -> String {
    match err {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            format!("Browser disconnected: {}", err)
        }
        CdpError::Timeout => format!("Timeout exceeded: {}", err),
        CdpError::NotFound => format!("Element not found: {}", err),
        _ => format!("CDP error: {}", err),
    }
}

/// 数据存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 网络请求失败
    #[error("存储请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// 返回错误响应
    #[error("存储返回错误响应 ({endpoint}): status={status}, body={body}")]
    BadResponse {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// 响应解析失败
    #[error("存储响应解析失败 ({endpoint}): {source}")]
    DecodeFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// 记录不存在
    #[error("记录不存在: {0}")]
    NotFound(String),
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {reason}")]
    ApiCallFailed { model: String, reason: String },

    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },

    /// 请求构建失败
    #[error("LLM请求构建失败: {0}")]
    RequestBuild(String),
}

/// AI 表单识别错误
///
/// Display 文本会进入错误分类器（"AI error:" / "AI returned invalid" 为临时错误，
/// "AI could not identify" / "AI detection unavailable" 为配置错误）。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectionError {
    /// 未配置 API Key
    #[error("AI detection unavailable: No API key configured")]
    Unavailable,

    /// 页面上没有任何表单元素
    #[error("AI could not identify any form fields: no form elements found on page")]
    NoFormElements,

    /// 响应中没有可解析的 JSON 对象
    #[error("AI returned invalid format")]
    InvalidFormat,

    /// 识别结果为空
    #[error("AI could not identify any form fields")]
    NoFields,

    /// 调用失败
    #[error("AI error: {0}")]
    Api(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// 未知的存储后端
    #[error("未知的存储后端: {0}")]
    UnknownStoreBackend(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Other(err.to_string())
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 浏览器操作结果类型
pub type BrowserResult<T> = Result<T, BrowserError>;

/// 存储操作结果类型
pub type StoreResult<T> = Result<T, StoreError>;
