//! 数据存储边界
//!
//! 队列处理器只通过 [`SubmissionStore`] 读取待处理作业、认领作业、写回结果。
//! - `supabase`：PostgREST 接口（生产）
//! - `memory`：进程内存储（测试和本地调试）

pub mod memory;
pub mod supabase;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::{Submission, SubmissionUpdate};

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// 待处理作业：status = pending、retry_count < 上限、已到重试时间，按创建时间升序
    async fn fetch_pending(&self, limit: usize, max_retry_count: u32)
        -> StoreResult<Vec<Submission>>;

    /// 原子认领：仅当作业仍为 pending 时标记 in_progress，返回是否认领成功
    async fn claim(
        &self,
        id: &str,
        title_used: Option<String>,
        description_used: Option<String>,
    ) -> StoreResult<bool>;

    async fn update(&self, id: &str, update: &SubmissionUpdate) -> StoreResult<()>;
}
