//! 渲染引擎进程 - 基础设施层
//!
//! 负责查找 Lightpanda 可执行文件、启动 `serve` 进程、转发输出日志、上报进程事件。
//! 生命周期决策（何时重启、何时清理）由 [`BrowserManager`](super::BrowserManager) 负责。

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sysinfo::{Pid, ProcessesToUpdate, Signal, System};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::connection::connect_to_browser;
use super::session::BrowserSession;
use crate::error::{BrowserError, BrowserResult};

/// 引擎进程上报的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// 输出中出现了就绪标记
    Ready,
    /// 进程退出
    Exited { code: Option<i32> },
    /// 进程出错（等待失败等）
    Failed(String),
}

/// 对引擎进程的同步控制（可在 panic hook 中调用）
pub trait EngineControl: Send + Sync {
    fn pid(&self) -> Option<u32>;

    /// 请求正常退出（unix 上为 SIGTERM）
    fn terminate(&self) -> BrowserResult<()>;

    /// 强制结束
    fn kill(&self) -> BrowserResult<()>;

    fn has_exited(&self) -> bool;
}

/// 一个已启动的引擎进程
pub struct EngineProcess {
    pub control: Arc<dyn EngineControl>,
    pub events: mpsc::UnboundedReceiver<ProcessEvent>,
}

/// 引擎启动器：启动进程并连接控制端点
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn spawn(&self) -> BrowserResult<EngineProcess>;

    async fn connect(&self) -> BrowserResult<Arc<dyn BrowserSession>>;
}

/// 默认的可执行文件搜索路径（按顺序）
pub fn default_candidates(explicit: Option<&str>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(explicit) = explicit.filter(|p| !p.trim().is_empty()) {
        paths.push(PathBuf::from(explicit));
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    paths.push(cwd.join("bin").join("lightpanda"));
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".lightpanda").join("lightpanda"));
    }
    paths.push(PathBuf::from("/opt/render/.lightpanda/lightpanda"));
    paths.push(cwd.join("lightpanda"));
    paths.push(PathBuf::from("/usr/local/bin/lightpanda"));
    paths
}

/// 在候选路径中查找第一个存在的可执行文件
pub fn discover_binary(candidates: &[PathBuf]) -> BrowserResult<PathBuf> {
    debug!("正在查找 Lightpanda 可执行文件...");
    for path in candidates {
        let exists = path.is_file();
        debug!("  检查: {} - 存在: {}", path.display(), exists);
        if exists {
            info!("✓ 找到 Lightpanda: {}", path.display());
            return Ok(path.clone());
        }
    }

    Err(BrowserError::BinaryNotFound {
        searched: candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
    })
}

/// Lightpanda 启动器
pub struct LightpandaLauncher {
    candidates: Vec<PathBuf>,
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl LightpandaLauncher {
    pub fn new(candidates: Vec<PathBuf>, host: impl Into<String>, port: u16) -> Self {
        Self {
            candidates,
            host: host.into(),
            port,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// CDP WebSocket 端点
    pub fn endpoint(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

#[async_trait]
impl EngineLauncher for LightpandaLauncher {
    async fn spawn(&self) -> BrowserResult<EngineProcess> {
        let binary = discover_binary(&self.candidates)?;
        info!("🚀 启动 Lightpanda: {}", binary.display());

        let port = self.port.to_string();
        let mut child = Command::new(&binary)
            .args(["serve", "--host", self.host.as_str(), "--port", port.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BrowserError::SpawnFailed(format!("{}: {}", binary.display(), e)))?;

        let pid = child.id();
        let (tx, rx) = mpsc::unbounded_channel();
        let exited = Arc::new(AtomicBool::new(false));
        let (kill_tx, mut kill_rx) = mpsc::unbounded_channel::<()>();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, false, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, true, tx.clone()));
        }

        // 等待进程退出；收到强制结束请求时 start_kill（非 unix 平台的兜底路径）
        let exited_flag = Arc::clone(&exited);
        tokio::spawn(async move {
            let event = loop {
                tokio::select! {
                    status = child.wait() => {
                        break match status {
                            Ok(status) => ProcessEvent::Exited { code: status.code() },
                            Err(e) => ProcessEvent::Failed(e.to_string()),
                        };
                    }
                    Some(()) = kill_rx.recv() => {
                        if let Err(e) = child.start_kill() {
                            debug!("结束引擎进程失败: {}", e);
                        }
                    }
                }
            };
            exited_flag.store(true, Ordering::SeqCst);
            match &event {
                ProcessEvent::Exited { code } => warn!("Lightpanda 进程退出 (code: {:?})", code),
                ProcessEvent::Failed(reason) => warn!("Lightpanda 进程出错: {}", reason),
                ProcessEvent::Ready => {}
            }
            let _ = tx.send(event);
        });

        Ok(EngineProcess {
            control: Arc::new(ChildControl {
                pid,
                exited,
                kill_tx,
            }),
            events: rx,
        })
    }

    async fn connect(&self) -> BrowserResult<Arc<dyn BrowserSession>> {
        let browser = connect_to_browser(&self.endpoint(), self.connect_timeout).await?;
        info!("✓ 已连接到 Lightpanda");
        Ok(Arc::new(browser))
    }
}

/// 把引擎输出逐行转发到日志，并识别就绪标记
async fn forward_output<R>(stream: R, is_stderr: bool, tx: mpsc::UnboundedSender<ProcessEvent>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(stream).lines();
    let mut announced = false;
    while let Ok(Some(line)) = lines.next_line().await {
        if is_stderr {
            warn!("Lightpanda: {}", line);
        } else {
            info!("Lightpanda: {}", line);
        }
        if !announced && is_ready_line(&line) {
            announced = true;
            let _ = tx.send(ProcessEvent::Ready);
        }
    }
}

/// 输出行是否表示引擎已开始监听
pub fn is_ready_line(line: &str) -> bool {
    line.to_ascii_lowercase().contains("listening")
}

struct ChildControl {
    pid: Option<u32>,
    exited: Arc<AtomicBool>,
    kill_tx: mpsc::UnboundedSender<()>,
}

impl ChildControl {
    fn signal(&self, signal: Signal) -> BrowserResult<()> {
        if self.has_exited() {
            return Ok(());
        }
        let Some(raw_pid) = self.pid else {
            return Ok(());
        };

        let pid = Pid::from_u32(raw_pid);
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        // 进程已经不在了
        let Some(process) = system.process(pid) else {
            return Ok(());
        };

        let delivered = match process.kill_with(signal) {
            Some(delivered) => delivered,
            None => {
                debug!("平台不支持 {:?}，改为强制结束", signal);
                process.kill()
            }
        };
        if delivered {
            Ok(())
        } else {
            Err(BrowserError::SignalFailed {
                pid: raw_pid,
                reason: format!("{:?} 未送达", signal),
            })
        }
    }
}

impl EngineControl for ChildControl {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn terminate(&self) -> BrowserResult<()> {
        self.signal(Signal::Term)
    }

    fn kill(&self) -> BrowserResult<()> {
        self.signal(Signal::Kill)?;
        let _ = self.kill_tx.send(());
        Ok(())
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}
