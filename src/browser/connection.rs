use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Browser;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::session::BrowserSession;
use crate::error::{BrowserError, BrowserResult};
use crate::infrastructure::{CdpPage, PageDriver};

/// 基于 chromiumoxide 的浏览器连接
pub struct CdpBrowser {
    browser: Mutex<Browser>,
    connected: Arc<AtomicBool>,
    handler_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

/// 连接到浏览器的 CDP 端点
///
/// `endpoint` 可以是 `ws://host:port` 或 `http://host:port`。
pub async fn connect_to_browser(endpoint: &str, limit: Duration) -> BrowserResult<CdpBrowser> {
    info!("正在连接到浏览器: {}", endpoint);

    let (browser, mut handler) = match timeout(limit, Browser::connect(endpoint)).await {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => {
            error!("连接浏览器失败: {}", e);
            return Err(BrowserError::ConnectionFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            });
        }
        Err(_) => {
            error!("连接浏览器超时: {}", endpoint);
            return Err(BrowserError::ConnectionFailed {
                endpoint: endpoint.to_string(),
                reason: format!("timeout after {} ms", limit.as_millis()),
            });
        }
    };
    debug!("浏览器连接成功");

    let connected = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&connected);

    // 在后台处理浏览器事件；单条错误只记录，事件流结束即视为断开
    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!("浏览器事件处理出错: {}", e);
            }
        }
        flag.store(false, Ordering::SeqCst);
        warn!("浏览器事件流已结束，连接断开");
    });

    Ok(CdpBrowser {
        browser: Mutex::new(browser),
        connected,
        handler_task: std::sync::Mutex::new(Some(handler_task)),
    })
}

#[async_trait]
impl BrowserSession for CdpBrowser {
    async fn new_page(&self) -> BrowserResult<Box<dyn PageDriver>> {
        let browser = self.browser.lock().await;
        let page = browser.new_page("about:blank").await.map_err(|e| {
            error!("创建新页面失败: {}", e);
            BrowserError::from(e)
        })?;
        Ok(Box::new(CdpPage::new(page)))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> BrowserResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        let result = self.browser.lock().await.close().await;

        let task = self
            .handler_task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }

        result.map(|_| ()).map_err(BrowserError::from)
    }
}
