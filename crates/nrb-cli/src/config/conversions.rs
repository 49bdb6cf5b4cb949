use serde::Serialize;
use std::path::PathBuf;

use crate::cli::{DevArgs, IndexArgs};
use crate::config::TlsConfig;

/// Command-line values layered on top of every other configuration source.
///
/// Only options the user actually passed are serialized, so unset flags never
/// mask a value from package.json or the environment.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict_port: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

impl From<&DevArgs> for CliOverrides {
    fn from(args: &DevArgs) -> Self {
        let tls = match (&args.cert, &args.key) {
            (None, None) => None,
            (cert, key) => Some(TlsConfig {
                cert: cert.clone(),
                key: key.clone(),
            }),
        };

        Self {
            host: args.host.clone(),
            port: args.port,
            strict_port: args.strict_port.then_some(true),
            public_url: args.public_url.clone(),
            tls,
        }
    }
}

impl From<&IndexArgs> for CliOverrides {
    fn from(args: &IndexArgs) -> Self {
        Self {
            public_url: args.public_url.clone(),
            ..Self::default()
        }
    }
}

/// Project directory from `--cwd`, or the process working directory.
pub(crate) fn base_dir_from(cwd: Option<&PathBuf>) -> std::io::Result<PathBuf> {
    match cwd {
        Some(dir) if dir.is_absolute() => Ok(dir.clone()),
        Some(dir) => Ok(std::env::current_dir()?.join(dir)),
        None => std::env::current_dir(),
    }
}
