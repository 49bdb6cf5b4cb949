use std::path::PathBuf;

use crate::config::{BundlerConfig, DevConfig, TlsConfig};

pub fn default_source_dir() -> PathBuf {
    PathBuf::from("src")
}

pub fn default_entry_file_name() -> String {
    "index.tsx".to_string()
}

pub fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}

pub fn default_assets_dir() -> String {
    "assets".to_string()
}

pub fn default_output_dir() -> PathBuf {
    PathBuf::from("build")
}

pub fn default_public_url() -> String {
    "/".to_string()
}

pub fn default_host() -> String {
    "localhost".to_string()
}

pub fn default_port() -> u16 {
    3000
}

pub fn default_tsconfig_path() -> PathBuf {
    PathBuf::from("tsconfig.json")
}

pub fn default_package_path() -> PathBuf {
    PathBuf::from("package.json")
}

pub fn default_version_path() -> PathBuf {
    PathBuf::from("public/version.json")
}

/// Version control, editor and cache directories.
pub fn default_watch_ignore() -> Vec<String> {
    [".git", ".svn", ".hg", ".idea", ".vscode", ".cache", "node_modules"]
        .into_iter()
        .map(String::from)
        .collect()
}

pub fn default_debounce_ms() -> u64 {
    100
}

pub fn default_proxy_timeout_secs() -> u64 {
    60
}

pub fn default_ping_interval_secs() -> u64 {
    10
}

pub fn default_retry_ms() -> u64 {
    10_000
}

pub fn default_client_buffer() -> usize {
    16
}

pub fn default_bundler_program() -> String {
    "esbuild".to_string()
}

pub fn default_startup_timeout_secs() -> u64 {
    10
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            program: default_bundler_program(),
            args: Vec::new(),
            splitting: false,
            startup_timeout_secs: default_startup_timeout_secs(),
        }
    }
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            entry_file_name: default_entry_file_name(),
            static_dir: default_static_dir(),
            assets_dir: default_assets_dir(),
            output_dir: default_output_dir(),
            public_url: default_public_url(),
            host: default_host(),
            port: default_port(),
            strict_port: false,
            tls: TlsConfig::default(),
            tsconfig_path: default_tsconfig_path(),
            package_path: default_package_path(),
            version_path: default_version_path(),
            watch_ignore: default_watch_ignore(),
            debounce_ms: default_debounce_ms(),
            proxy_timeout_secs: default_proxy_timeout_secs(),
            ping_interval_secs: default_ping_interval_secs(),
            retry_ms: default_retry_ms(),
            client_buffer: default_client_buffer(),
            preload: Vec::new(),
            bundler: BundlerConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}
