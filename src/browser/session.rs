use async_trait::async_trait;

use crate::error::BrowserResult;
use crate::infrastructure::PageDriver;

/// 已连接的浏览器句柄
///
/// 只有 [`BrowserManager`](super::BrowserManager) 创建和销毁它；调用方拿到的是共享引用。
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// 打开一个新页面
    async fn new_page(&self) -> BrowserResult<Box<dyn PageDriver>>;

    /// 控制连接是否仍然存活（只是缓存标志，不能代替健康检查）
    fn is_connected(&self) -> bool;

    /// 关闭控制连接
    async fn close(&self) -> BrowserResult<()>;
}
