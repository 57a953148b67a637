//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 一次批处理：读取待处理作业 → 逐个串行处理 → 作业间随机停顿 → 汇总结果。
//!
//! ## 层次关系
//!
//! ```text
//! queue_processor (处理 Vec<Submission>)
//!     ↓
//! workflow::SubmissionFlow (处理单个作业)
//!     ↓
//! adapters (站点表单协议) / services (分类、重试、AI 识别)
//!     ↓
//! browser + infrastructure (引擎进程、CDP 连接、页面)
//! ```
//!
//! ## 设计原则
//!
//! 1. **串行处理**：同一时间只有一个作业占用浏览器
//! 2. **错误隔离**：单个作业的任何错误都不会中断整批
//! 3. **向下依赖**：编排层 → workflow → adapters / services → infrastructure

pub mod queue_processor;

pub use queue_processor::{BatchSummary, ProcessorSettings, QueueProcessor};
