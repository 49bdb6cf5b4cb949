//! Dev session orchestration.
//!
//! Wires the broker, the upstream bundler, the change watcher and the HTTP server
//! together and runs the event loop that turns watcher output into browser reloads.
//! Any fatal error ends the session; the upstream bundler is always disposed on the
//! way out.

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;

use crate::config::DevConfig;
use crate::dev::watcher::ReloadSignal;
use crate::dev::{
    Broker, BrokerSettings, BuildEngine, ChangeWatcher, DevServer, EsbuildEngine, Proxy,
    ServerHandle, UpstreamSupervisor, WatchOptions, RELOAD_EVENT,
};
use crate::error::{CliError, Result};
use crate::ui;

/// A running dev subsystem.
pub struct DevSession {
    broker: Broker,
    upstream: UpstreamSupervisor,
    watcher: ChangeWatcher,
    server: ServerHandle,
    local_addr: SocketAddr,
    url: String,
}

impl DevSession {
    /// Start every component with the `esbuild` engine described by `config`.
    pub async fn start(config: &DevConfig) -> Result<Self> {
        Self::start_with_engine(config, Box::new(EsbuildEngine::new(config))).await
    }

    /// Start every component around an arbitrary bundler engine.
    ///
    /// Start order is broker, upstream, watcher, server. A failure after the upstream
    /// is running disposes it before returning.
    ///
    /// # Errors
    ///
    /// Any setup error: upstream start, watcher registration, listener bind, TLS.
    pub async fn start_with_engine(
        config: &DevConfig,
        engine: Box<dyn BuildEngine>,
    ) -> Result<Self> {
        let broker = Broker::new(BrokerSettings::from(config));
        let upstream = UpstreamSupervisor::start(engine).await?;

        match Self::attach(config, &broker, &upstream).await {
            Ok((watcher, server, local_addr, url)) => {
                Ok(Self {
                    broker,
                    upstream,
                    watcher,
                    server: server.spawn(),
                    local_addr,
                    url,
                })
            }
            Err(err) => {
                upstream.shutdown().await;
                Err(err)
            }
        }
    }

    async fn attach(
        config: &DevConfig,
        broker: &Broker,
        upstream: &UpstreamSupervisor,
    ) -> Result<(ChangeWatcher, DevServer, SocketAddr, String)> {
        let watcher = ChangeWatcher::start(WatchOptions::from(config))?;
        let proxy = Proxy::new(config, upstream.subscribe())?;
        let server = DevServer::bind(config, broker.clone(), proxy).await?;
        let local_addr = server.local_addr()?;
        let url = server.url()?;
        Ok((watcher, server, local_addr, url))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Browser URL, with the configured host name and the bound port.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Run until `shutdown` resolves or a fatal error occurs.
    ///
    /// # Errors
    ///
    /// The watcher stopped, the server task ended, or the bundler failed to restart
    /// after a config change.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => break Ok(()),

                reload = self.watcher.reloads.recv() => match reload {
                    Some(signal) => self.reload(&signal),
                    None => break Err(CliError::Custom("file watcher stopped".to_string())),
                },

                Some(path) = self.watcher.config_changes.recv() => {
                    if let Err(err) = self.restart_upstream(&path).await {
                        break Err(err);
                    }
                }

                Some(err) = self.watcher.errors.recv() => {
                    ui::warning(&format!("File watcher: {}", err));
                }

                joined = &mut self.server => {
                    break match joined {
                        Ok(Ok(())) => Err(CliError::Server("server stopped".to_string())),
                        Ok(Err(err)) => Err(err),
                        Err(err) => Err(CliError::Server(err.to_string())),
                    };
                }
            }
        };

        self.server.abort();
        self.upstream.shutdown().await;
        result
    }

    fn reload(&self, signal: &ReloadSignal) {
        for path in &signal.changed {
            ui::item("Changed", &path.display().to_string());
        }
        self.broker.notify(RELOAD_EVENT);
        tracing::debug!(
            files = signal.changed.len(),
            clients = self.broker.client_count(),
            "reload sent"
        );
    }

    async fn restart_upstream(&mut self, path: &Path) -> Result<()> {
        ui::reload(&format!(
            "{} changed, restarting bundler...",
            path.display()
        ));
        self.upstream.restart().await?;
        self.broker.notify(RELOAD_EVENT);
        Ok(())
    }
}
