//! esbuild in serve mode as the upstream engine.
//!
//! esbuild builds into memory and serves `<staticDir>` plus the in-memory
//! `<staticDir>/<assetsDir>` outputs on a loopback port. Every bundle starts with
//! the reload bootstrap as its banner.

use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

use crate::config::DevConfig;
use crate::dev::upstream::{wait_until_listening, BuildEngine, RunningEngine};
use crate::dev::RELOAD_JS;
use crate::error::{CliError, Result};

/// Launches `esbuild --serve` processes.
#[derive(Debug, Clone)]
pub struct EsbuildEngine {
    program: String,
    cwd: PathBuf,
    entry: PathBuf,
    static_dir: PathBuf,
    assets_dir: String,
    splitting: bool,
    extra_args: Vec<String>,
    startup_timeout: Duration,
}

impl EsbuildEngine {
    pub fn new(config: &DevConfig) -> Self {
        Self {
            program: config.bundler.program.clone(),
            cwd: config.base_dir.clone(),
            entry: config.entry_path(),
            static_dir: config.static_dir.clone(),
            assets_dir: config.assets_dir.clone(),
            splitting: config.bundler.splitting,
            extra_args: config.bundler.args.clone(),
            startup_timeout: config.bundler.startup_timeout(),
        }
    }

    /// Command line for a serve process on `port`, run from the project directory.
    pub fn args(&self, port: u16) -> Vec<String> {
        let outdir = self.static_dir.join(&self.assets_dir);
        let mut args = vec![
            path_arg(&self.entry),
            "--bundle".to_string(),
            format!("--outdir={}", path_arg(&outdir)),
            format!("--servedir={}", path_arg(&self.static_dir)),
            format!("--serve={}:{}", Ipv4Addr::LOCALHOST, port),
            "--format=esm".to_string(),
            "--entry-names=[name]".to_string(),
            "--sourcemap=linked".to_string(),
            format!("--banner:js={}", RELOAD_JS),
        ];
        if self.splitting {
            args.push("--splitting".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Ready once the port accepts connections; fails if the process exits first.
    async fn wait_ready(&self, child: &mut Child, addr: SocketAddr) -> Result<()> {
        tokio::select! {
            ready = wait_until_listening(addr, self.startup_timeout) => ready,
            exited = child.wait() => Err(CliError::Upstream(match exited {
                Ok(status) => format!("{} exited during startup ({})", self.program, status),
                Err(err) => format!("{} could not be awaited: {}", self.program, err),
            })),
        }
    }
}

#[async_trait]
impl BuildEngine for EsbuildEngine {
    async fn start(&self) -> Result<Box<dyn RunningEngine>> {
        let port = free_loopback_port()?;
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));

        tracing::debug!(program = %self.program, %addr, "starting bundler");
        let mut child = Command::new(&self.program)
            .args(self.args(port))
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CliError::Upstream(format!("failed to run {}: {}", self.program, e)))?;

        if let Err(err) = self.wait_ready(&mut child, addr).await {
            let _ = child.kill().await;
            return Err(err);
        }

        Ok(Box::new(EsbuildProcess { child, addr }))
    }
}

struct EsbuildProcess {
    child: Child,
    addr: SocketAddr,
}

#[async_trait]
impl RunningEngine for EsbuildProcess {
    fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn dispose(self: Box<Self>) -> Result<()> {
        let mut child = self.child;
        if child.try_wait()?.is_none() {
            child.kill().await?;
        }
        Ok(())
    }
}

/// Ask the OS for a free loopback port. The port is released before esbuild binds it.
fn free_loopback_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_args() {
        let config = DevConfig {
            base_dir: PathBuf::from("/project"),
            ..DevConfig::default()
        };
        let args = EsbuildEngine::new(&config).args(41234);

        assert_eq!(args[0], "/project/src/index.tsx");
        assert!(args.contains(&"--bundle".to_string()));
        assert!(args.contains(&"--outdir=public/assets".to_string()));
        assert!(args.contains(&"--servedir=public".to_string()));
        assert!(args.contains(&"--serve=127.0.0.1:41234".to_string()));
        assert!(args.contains(&format!("--banner:js={}", RELOAD_JS)));
        assert!(!args.contains(&"--splitting".to_string()));
    }

    #[test]
    fn test_splitting_and_extra_args_are_appended() {
        let mut config = DevConfig::default();
        config.bundler.splitting = true;
        config.bundler.args = vec!["--loader:.svg=file".to_string()];
        let args = EsbuildEngine::new(&config).args(1);

        let n = args.len();
        assert_eq!(args[n - 2], "--splitting");
        assert_eq!(args[n - 1], "--loader:.svg=file");
    }

    #[tokio::test]
    async fn test_missing_program_is_upstream_error() {
        let mut config = DevConfig {
            base_dir: std::env::temp_dir(),
            ..DevConfig::default()
        };
        config.bundler.program = "nrb-test-no-such-bundler".to_string();

        let err = match EsbuildEngine::new(&config).start().await {
            Ok(_) => panic!("start should fail"),
            Err(err) => err,
        };
        assert!(matches!(err, CliError::Upstream(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_early_exit_is_reported() {
        let mut config = DevConfig {
            base_dir: std::env::temp_dir(),
            ..DevConfig::default()
        };
        config.bundler.program = "false".to_string();

        let err = match EsbuildEngine::new(&config).start().await {
            Ok(_) => panic!("start should fail"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("exited during startup"));
    }
}
