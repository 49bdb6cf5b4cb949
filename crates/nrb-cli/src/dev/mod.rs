//! Development server module.
//!
//! `nrb dev` is built from five cooperating pieces:
//! - [`broker`]: fans reload notifications out to every open Server-Sent Events stream
//! - [`watcher`]: watches the source tree and coalesces bursts into one reload signal
//! - [`upstream`]: owns the bundler's serve endpoint (start, dispose, restart)
//! - [`server`] and [`proxy`]: static files first, everything else proxied to the bundler
//! - [`session`]: wires them together and decides what is fatal

pub mod broker;
pub mod error_overlay;
pub mod esbuild;
pub mod proxy;
pub mod server;
pub mod session;
pub mod tls;
pub mod upstream;
pub mod watcher;

pub use broker::{Broker, BrokerSettings, Subscription};
pub use esbuild::EsbuildEngine;
pub use proxy::Proxy;
pub use server::{DevServer, ServerHandle};
pub use session::DevSession;
pub use upstream::{BuildEngine, RunningEngine, UpstreamSupervisor};
pub use watcher::{ChangeWatcher, WatchOptions};

/// Reserved path of the reload event stream.
pub const RELOAD_PATH: &str = "/__nrb_sse__";

/// Payload broadcast after a change; any message makes the browser reload.
pub const RELOAD_EVENT: &str = "update";

/// Browser bootstrap that reloads the page on every stream message.
///
/// Guarded against double injection (bundle banner plus error page) and
/// reconnects 10 s after an error.
pub const RELOAD_JS: &str = concat!(
    "(()=>{if(window.__nrbReload)return;window.__nrbReload=true;",
    "function c(){var s=new EventSource(\"/__nrb_sse__\");",
    "s.onerror=()=>{s.close();setTimeout(c,10000)};",
    "s.onmessage=()=>{window.location.reload()}}c()})();"
);
