//! 浏览器生命周期管理 - 基础设施层
//!
//! 唯一可以创建、销毁浏览器句柄的组件，保证进程内同一时间最多一个存活句柄：
//! - `ensure_browser()`：健康检查 → 失败则清理 → 带退避的重连
//! - `cleanup()`：关闭连接、SIGTERM、宽限期后 SIGKILL，可重复调用
//! - `shutdown()`：进入排空状态后清理，之后的 `ensure_browser()` 立即失败
//! - `status()`：只读状态快照
//!
//! 关键不变量：引擎进程退出时，浏览器句柄与进程引用一起作废，
//! 即使连接自身的断开事件还没有到达。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use super::engine::{EngineControl, EngineLauncher, ProcessEvent};
use super::session::BrowserSession;
use crate::config::Config;
use crate::error::{BrowserError, BrowserResult};

/// 生命周期参数
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// 最多连接尝试次数
    pub max_connection_attempts: u32,
    /// 重连退避基数（第 n 次失败后等待 base * 2^(n-1)）
    pub retry_base_delay: Duration,
    pub health_check_timeout: Duration,
    /// 等待就绪标记的硬上限
    pub ready_timeout: Duration,
    /// 没有就绪标记时的乐观等待时间
    pub ready_settle: Duration,
    /// SIGTERM 之后等待退出的宽限期
    pub kill_grace: Duration,
    pub close_timeout: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            max_connection_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
            health_check_timeout: Duration::from_secs(5),
            ready_timeout: Duration::from_secs(10),
            ready_settle: Duration::from_secs(2),
            kill_grace: Duration::from_secs(1),
            close_timeout: Duration::from_secs(5),
        }
    }
}

impl BrowserSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_connection_attempts: config.max_connection_attempts.max(1),
            health_check_timeout: Duration::from_secs(config.health_check_timeout_secs),
            ready_timeout: Duration::from_secs(config.ready_timeout_secs),
            ready_settle: Duration::from_millis(config.ready_settle_ms),
            kill_grace: Duration::from_millis(config.kill_grace_ms),
            ..Self::default()
        }
    }
}

/// 对外的状态快照
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BrowserStatus {
    pub browser_connected: bool,
    pub process_running: bool,
    pub last_health_check: Option<DateTime<Utc>>,
    pub is_shutting_down: bool,
}

struct RunningProcess {
    generation: u64,
    control: Arc<dyn EngineControl>,
}

#[derive(Default)]
struct SessionState {
    browser: Option<Arc<dyn BrowserSession>>,
    process: Option<RunningProcess>,
    generation: u64,
    last_health_check: Option<DateTime<Utc>>,
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 浏览器生命周期管理器
pub struct BrowserManager {
    launcher: Arc<dyn EngineLauncher>,
    settings: BrowserSettings,
    state: Arc<Mutex<SessionState>>,
    /// 串行化 ensure / cleanup，避免并发重连
    op_lock: tokio::sync::Mutex<()>,
    shutting_down: AtomicBool,
}

impl BrowserManager {
    pub fn new(launcher: Arc<dyn EngineLauncher>, settings: BrowserSettings) -> Self {
        Self {
            launcher,
            settings,
            state: Arc::new(Mutex::new(SessionState::default())),
            op_lock: tokio::sync::Mutex::new(()),
            shutting_down: AtomicBool::new(false),
        }
    }

    fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// 获取一个可用的浏览器句柄
    pub async fn ensure_browser(&self) -> BrowserResult<Arc<dyn BrowserSession>> {
        if self.is_shutting_down() {
            return Err(BrowserError::ShuttingDown);
        }

        let _guard = self.op_lock.lock().await;
        if self.is_shutting_down() {
            return Err(BrowserError::ShuttingDown);
        }

        let current = lock(&self.state).browser.clone();
        if let Some(browser) = current {
            match self.health_check(browser.as_ref()).await {
                Ok(()) => {
                    lock(&self.state).last_health_check = Some(Utc::now());
                    debug!("浏览器健康检查通过，复用现有连接");
                    return Ok(browser);
                }
                Err(e) => {
                    warn!("⚠️ 浏览器健康检查失败，准备重连: {}", e);
                    self.cleanup_locked().await;
                }
            }
        }

        self.connect_with_retry().await
    }

    /// 主动探测：打开并关闭一个临时页面
    async fn health_check(&self, browser: &dyn BrowserSession) -> BrowserResult<()> {
        if !browser.is_connected() {
            return Err(BrowserError::HealthCheckFailed(
                "connection flag is down".to_string(),
            ));
        }

        let probe = async {
            let page = browser.new_page().await?;
            if let Err(e) = page.close().await {
                debug!("关闭探测页面失败: {}", e);
            }
            Ok::<(), BrowserError>(())
        };

        match timeout(self.settings.health_check_timeout, probe).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::HealthCheckFailed(e.to_string())),
            Err(_) => Err(BrowserError::HealthCheckFailed(format!(
                "probe timed out after {} ms",
                self.settings.health_check_timeout.as_millis()
            ))),
        }
    }

    async fn connect_with_retry(&self) -> BrowserResult<Arc<dyn BrowserSession>> {
        let attempts = self.settings.max_connection_attempts;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if self.is_shutting_down() {
                return Err(BrowserError::ShuttingDown);
            }

            info!("🔌 连接浏览器 (第 {}/{} 次)", attempt, attempts);
            match self.try_connect().await {
                Ok(browser) => {
                    info!("✓ 浏览器就绪");
                    return Ok(browser);
                }
                Err(e) => {
                    warn!("连接失败 (第 {}/{} 次): {}", attempt, attempts, e);
                    last_error = e.to_string();
                    self.cleanup_locked().await;

                    if attempt < attempts {
                        let backoff = self.settings.retry_base_delay * 2u32.pow(attempt - 1);
                        debug!("等待 {} ms 后重试", backoff.as_millis());
                        sleep(backoff).await;
                    }
                }
            }
        }

        error!("❌ 浏览器连接在 {} 次尝试后仍失败", attempts);
        Err(BrowserError::AttemptsExhausted {
            attempts,
            last: last_error,
        })
    }

    /// 一次完整的 启动(如需) → 等待就绪 → 连接
    async fn try_connect(&self) -> BrowserResult<Arc<dyn BrowserSession>> {
        let generation = match self.current_generation() {
            Some(generation) => generation,
            None => self.spawn_engine().await?,
        };

        let browser = self.launcher.connect().await?;

        // 连接期间进程可能已经退出或被替换
        let stale = {
            let mut state = lock(&self.state);
            let alive = state
                .process
                .as_ref()
                .is_some_and(|p| p.generation == generation);
            if alive {
                state.browser = Some(Arc::clone(&browser));
                state.last_health_check = Some(Utc::now());
            }
            !alive
        };

        if stale || self.is_shutting_down() {
            if let Err(e) = browser.close().await {
                debug!("关闭过期连接失败: {}", e);
            }
            return Err(if stale {
                BrowserError::ProcessExited { code: None }
            } else {
                BrowserError::ShuttingDown
            });
        }

        Ok(browser)
    }

    fn current_generation(&self) -> Option<u64> {
        lock(&self.state).process.as_ref().map(|p| p.generation)
    }

    async fn spawn_engine(&self) -> BrowserResult<u64> {
        let process = self.launcher.spawn().await?;
        let control = Arc::clone(&process.control);

        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.process = Some(RunningProcess {
                generation: state.generation,
                control: Arc::clone(&control),
            });
            state.generation
        };
        info!(
            "引擎进程已启动 (pid: {:?}, generation: {})",
            control.pid(),
            generation
        );

        let events = self.wait_for_ready(process.events).await?;
        self.supervise(generation, events);
        Ok(generation)
    }

    /// 等待就绪标记；没有标记时在 settle 之后乐观放行
    async fn wait_for_ready(
        &self,
        mut events: mpsc::UnboundedReceiver<ProcessEvent>,
    ) -> BrowserResult<mpsc::UnboundedReceiver<ProcessEvent>> {
        let outcome = tokio::select! {
            biased;
            event = events.recv() => match event {
                Some(ProcessEvent::Ready) => Ok(true),
                Some(ProcessEvent::Exited { code }) => Err(BrowserError::ProcessExited { code }),
                Some(ProcessEvent::Failed(reason)) => Err(BrowserError::SpawnFailed(reason)),
                None => Err(BrowserError::ProcessExited { code: None }),
            },
            _ = sleep(self.settings.ready_timeout) => Err(BrowserError::StartupTimeout(
                self.settings.ready_timeout.as_millis() as u64,
            )),
            _ = sleep(self.settings.ready_settle) => Ok(false),
        };

        if outcome? {
            debug!("引擎已输出就绪标记");
        } else {
            debug!(
                "未收到就绪标记，{} ms 后继续",
                self.settings.ready_settle.as_millis()
            );
        }
        Ok(events)
    }

    /// 监视进程事件：退出 / 出错 / 事件流关闭时作废本代的进程和句柄
    fn supervise(&self, generation: u64, mut events: mpsc::UnboundedReceiver<ProcessEvent>) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let reason = loop {
                match events.recv().await {
                    Some(ProcessEvent::Ready) => continue,
                    Some(ProcessEvent::Exited { code }) => break format!("exit code {:?}", code),
                    Some(ProcessEvent::Failed(reason)) => break reason,
                    None => break "event stream closed".to_string(),
                }
            };
            invalidate(&state, generation, &reason);
        });
    }

    /// 释放连接和进程；可重复调用
    pub async fn cleanup(&self) {
        let _guard = self.op_lock.lock().await;
        self.cleanup_locked().await;
    }

    async fn cleanup_locked(&self) {
        let (browser, process) = {
            let mut state = lock(&self.state);
            (state.browser.take(), state.process.take())
        };

        if browser.is_none() && process.is_none() {
            return;
        }
        info!("🧹 清理浏览器资源");

        if let Some(browser) = browser {
            match timeout(self.settings.close_timeout, browser.close()).await {
                Ok(Ok(())) => debug!("浏览器连接已关闭"),
                Ok(Err(e)) => debug!("关闭浏览器连接失败: {}", e),
                Err(_) => debug!("关闭浏览器连接超时"),
            }
        }

        if let Some(process) = process {
            self.stop_process(process.control.as_ref()).await;
        }
    }

    /// SIGTERM → 宽限期 → SIGKILL
    async fn stop_process(&self, control: &dyn EngineControl) {
        if control.has_exited() {
            return;
        }
        if let Err(e) = control.terminate() {
            warn!("发送终止信号失败: {}", e);
        }

        let poll = Duration::from_millis(50);
        let mut waited = Duration::ZERO;
        while waited < self.settings.kill_grace {
            if control.has_exited() {
                debug!("引擎进程已正常退出");
                return;
            }
            sleep(poll).await;
            waited += poll;
        }

        if !control.has_exited() {
            warn!("引擎进程未在宽限期内退出，强制结束 (pid: {:?})", control.pid());
            if let Err(e) = control.kill() {
                error!("强制结束引擎进程失败: {}", e);
            }
        }
    }

    /// 进入排空状态：之后的 `ensure_browser()` 立即失败，已有的引擎保留到 `shutdown()`
    pub fn begin_drain(&self) {
        if !self.shutting_down.swap(true, Ordering::SeqCst) {
            info!("⏳ 浏览器管理器进入排空状态");
        }
    }

    /// 进入排空状态并释放资源
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            debug!("浏览器管理器已处于排空状态");
        }
        info!("🛑 关闭浏览器管理器");

        // 正在进行的重连最多等待一次健康检查的时间，之后强制清理
        match timeout(self.settings.health_check_timeout, self.op_lock.lock()).await {
            Ok(_guard) => self.cleanup_locked().await,
            Err(_) => {
                warn!("等待进行中的浏览器操作超时，强制清理");
                self.cleanup_locked().await;
            }
        }
    }

    /// 同步强制结束引擎进程（panic hook 使用，不等待任何异步操作）
    pub fn emergency_kill(&self) {
        let Ok(state) = self.state.try_lock() else {
            return;
        };
        if let Some(process) = state.process.as_ref() {
            if let Err(e) = process.control.kill() {
                eprintln!("emergency kill of engine process failed: {}", e);
            }
        }
    }

    /// 当前状态快照
    pub fn status(&self) -> BrowserStatus {
        let state = lock(&self.state);
        BrowserStatus {
            browser_connected: state.browser.as_ref().is_some_and(|b| b.is_connected()),
            process_running: state
                .process
                .as_ref()
                .is_some_and(|p| !p.control.has_exited()),
            last_health_check: state.last_health_check,
            is_shutting_down: self.is_shutting_down(),
        }
    }
}

fn invalidate(state: &Mutex<SessionState>, generation: u64, reason: &str) {
    let mut state = lock(state);
    let current = state
        .process
        .as_ref()
        .is_some_and(|p| p.generation == generation);
    if !current {
        debug!("旧进程 (generation: {}) 的事件，忽略: {}", generation, reason);
        return;
    }

    warn!("⚠️ 引擎进程已退出 ({})，浏览器句柄随之作废", reason);
    state.process = None;
    state.browser = None;
}
