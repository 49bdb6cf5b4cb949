//! Configuration for the dev subsystem with multi-source loading.
//!
//! One immutable [`DevConfig`] is built at startup and handed to every component.
//! Priority: CLI > environment (`NRB_*`) > `"nrb"` section of package.json > defaults

mod conversions;
mod defaults;
mod loading;
mod tests;
mod validation;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use conversions::CliOverrides;
pub(crate) use conversions::base_dir_from;
pub use defaults::*;

/// Name of the HTML entry document inside the static and output directories.
pub const INDEX_FILE_NAME: &str = "index.html";

/// Dev subsystem configuration.
///
/// Relative paths are resolved against [`DevConfig::base_dir`], the directory
/// that holds package.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevConfig {
    /// Source tree that is watched (e.g. "src")
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Entry module inside the source tree (e.g. "index.tsx")
    #[serde(default = "default_entry_file_name")]
    pub entry_file_name: String,

    /// Directory served as static files in dev mode
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Assets directory name, relative to the static/output directory
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,

    /// Output directory of the one-shot build
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Base URL substituted for %PUBLIC_URL%
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Host to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,

    /// Fail on an occupied port instead of falling back to a free one
    #[serde(default)]
    pub strict_port: bool,

    /// HTTPS certificate material
    #[serde(default)]
    pub tls: TlsConfig,

    /// Extra watched file: TypeScript config
    #[serde(default = "default_tsconfig_path")]
    pub tsconfig_path: PathBuf,

    /// Extra watched file: package manifest
    #[serde(default = "default_package_path")]
    pub package_path: PathBuf,

    /// Extra watched file: version file
    #[serde(default = "default_version_path")]
    pub version_path: PathBuf,

    /// Directory names skipped when walking the source tree
    #[serde(default = "default_watch_ignore")]
    pub watch_ignore: Vec<String>,

    /// Debounce window for reloads
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Upper bound for a single upstream request
    #[serde(default = "default_proxy_timeout_secs")]
    pub proxy_timeout_secs: u64,

    /// Interval between keep-alive ping events on a reload stream
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Reconnect hint sent to EventSource clients
    #[serde(default = "default_retry_ms")]
    pub retry_ms: u64,

    /// Outbound buffer per reload stream client
    #[serde(default = "default_client_buffer")]
    pub client_buffer: usize,

    /// Input path prefixes whose chunks get modulepreload links (`nrb index`)
    #[serde(default)]
    pub preload: Vec<String>,

    /// Upstream bundler process
    #[serde(default)]
    pub bundler: BundlerConfig,

    /// Project directory; never read from configuration sources
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// PEM certificate and key for HTTPS. Both or neither.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<PathBuf>,
}

/// How the upstream bundler is launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlerConfig {
    /// Executable name or path
    #[serde(default = "default_bundler_program")]
    pub program: String,

    /// Extra arguments appended to the generated command line
    #[serde(default)]
    pub args: Vec<String>,

    /// Enable code splitting
    #[serde(default)]
    pub splitting: bool,

    /// How long to wait for the serve endpoint to accept connections
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

impl DevConfig {
    /// Resolve a configured path against the project directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn source_root(&self) -> PathBuf {
        self.resolve(&self.source_dir)
    }

    pub fn static_root(&self) -> PathBuf {
        self.resolve(&self.static_dir)
    }

    pub fn output_root(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    /// Entry module path handed to the bundler.
    pub fn entry_path(&self) -> PathBuf {
        self.source_root().join(&self.entry_file_name)
    }

    /// Config files watched outside the source tree. A change restarts the bundler.
    pub fn extra_watch_files(&self) -> Vec<PathBuf> {
        vec![
            self.resolve(&self.tsconfig_path),
            self.resolve(&self.package_path),
            self.resolve(&self.version_path),
        ]
    }

    pub fn tls_enabled(&self) -> bool {
        self.tls.cert.is_some() && self.tls.key.is_some()
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn retry(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }
}

impl BundlerConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}
