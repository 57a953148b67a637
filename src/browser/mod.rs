//! 浏览器资源：引擎进程、CDP 连接、生命周期管理

pub mod connection;
pub mod engine;
pub mod manager;
pub mod session;

pub use connection::{connect_to_browser, CdpBrowser};
pub use engine::{
    default_candidates, discover_binary, EngineControl, EngineLauncher, EngineProcess,
    LightpandaLauncher, ProcessEvent,
};
pub use manager::{BrowserManager, BrowserSettings, BrowserStatus};
pub use session::BrowserSession;
