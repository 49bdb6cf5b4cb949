//! Lifecycle of the bundler's loopback serve endpoint.
//!
//! The supervisor is the only owner of the running engine. Request handlers read
//! the current address from a `watch` channel: `None` while a restart is in
//! progress, so a request racing a restart fails fast instead of hitting a dead port.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};

use crate::error::{CliError, Result};

/// Something that can start the bundler in serve mode.
#[async_trait]
pub trait BuildEngine: Send + Sync {
    /// Start a fresh instance. Returns once its endpoint accepts connections.
    async fn start(&self) -> Result<Box<dyn RunningEngine>>;
}

/// A started bundler instance.
#[async_trait]
pub trait RunningEngine: Send {
    /// Loopback address of the serve endpoint.
    fn addr(&self) -> SocketAddr;

    /// Stop the instance and release its port.
    async fn dispose(self: Box<Self>) -> Result<()>;
}

/// Owns exactly one running engine at a time.
pub struct UpstreamSupervisor {
    engine: Box<dyn BuildEngine>,
    current: Option<Box<dyn RunningEngine>>,
    addr_tx: watch::Sender<Option<SocketAddr>>,
}

impl UpstreamSupervisor {
    /// Start the first instance.
    ///
    /// # Errors
    ///
    /// Returns the engine's start error; nothing is left running.
    pub async fn start(engine: Box<dyn BuildEngine>) -> Result<Self> {
        let running = engine.start().await?;
        let addr = running.addr();
        tracing::info!(%addr, "bundler serving");

        let (addr_tx, _) = watch::channel(Some(addr));
        Ok(Self {
            engine,
            current: Some(running),
            addr_tx,
        })
    }

    /// Address updates for request handlers.
    pub fn subscribe(&self) -> watch::Receiver<Option<SocketAddr>> {
        self.addr_tx.subscribe()
    }

    /// Current address, if an instance is running.
    pub fn addr(&self) -> Option<SocketAddr> {
        *self.addr_tx.borrow()
    }

    /// Dispose the running instance, then start a new one.
    ///
    /// Disposal completes before the new instance starts. On a start failure no
    /// instance is running and the error is returned.
    pub async fn restart(&mut self) -> Result<()> {
        self.addr_tx.send_replace(None);
        self.dispose_current().await;

        let running = self.engine.start().await?;
        let addr = running.addr();
        self.current = Some(running);
        self.addr_tx.send_replace(Some(addr));
        tracing::info!(%addr, "bundler restarted");
        Ok(())
    }

    /// Dispose the running instance, if any.
    pub async fn shutdown(mut self) {
        self.addr_tx.send_replace(None);
        self.dispose_current().await;
    }

    async fn dispose_current(&mut self) {
        if let Some(running) = self.current.take() {
            if let Err(err) = running.dispose().await {
                tracing::warn!(error = %err, "failed to stop bundler");
            }
        }
    }
}

/// Poll `addr` until it accepts a TCP connection.
///
/// # Errors
///
/// `CliError::Upstream` when nothing listens before `timeout` elapses.
pub async fn wait_until_listening(addr: SocketAddr, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if TcpStream::connect(addr).await.is_ok() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(CliError::Upstream(format!(
                "nothing listening on {} after {:?}",
                addr, timeout
            )));
        }
        sleep(Duration::from_millis(25)).await;
    }
}
