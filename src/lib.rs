//! # Directory Submit
//!
//! 把一个网站自动提交到多个第三方目录站点的 worker
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 引擎进程、CDP 连接、生命周期管理（唯一创建/销毁浏览器句柄的地方）
//! - `infrastructure/` - `PageDriver`，只暴露"操作页面"的能力
//!
//! ### ② 业务能力层（Services）
//! - `ErrorClassifier` - 错误信息 → 类别与标志
//! - `RetryStrategy` - 类别 + 计数器 → 重试决策
//! - `LlmService` / `FieldDetector` - AI 表单识别
//!
//! ### ③ 适配器层（Adapters）
//! - `adapters/` - 每个目录站点的表单协议，`registry` 按名称查找
//!
//! ### ④ 流程层（Workflow）
//! - `SubmissionCtx` - 上下文封装（batch_id + job_id）
//! - `SubmissionFlow` - 一个作业的完整流程（获取浏览器 → 认领 → 提交 → 写回）
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/queue_processor` - 读取一批作业，串行处理，汇总结果
//!
//! ### 边界
//! - `store/` - 队列存储（Supabase / 内存）
//! - `server/` - HTTP 触发入口
//!
//! ## 模块结构

pub mod adapters;
pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod server;
pub mod services;
pub mod store;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use adapters::{AdapterRegistry, SubmissionAdapter, SubmissionInput, SubmissionResult};
pub use browser::{BrowserManager, BrowserSettings, BrowserStatus, LightpandaLauncher};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::PageDriver;
pub use models::{Directory, Submission, SubmissionStatus, Website};
pub use orchestrator::{BatchSummary, ProcessorSettings, QueueProcessor};
pub use store::{MemoryStore, SubmissionStore, SupabaseStore};
pub use workflow::{JobOutcome, SubmissionCtx, SubmissionFlow};
