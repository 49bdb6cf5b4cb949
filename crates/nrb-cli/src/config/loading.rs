use crate::config::{CliOverrides, DevConfig};
use crate::error::{ConfigError, Result};
use figment::{
    providers::{Env, Format as _, Json, Serialized},
    Figment,
};
use std::path::Path;

/// Key in package.json that holds nrb settings.
const PACKAGE_SECTION: &str = "nrb";

impl DevConfig {
    /// Load configuration for the project in `base_dir`.
    ///
    /// Priority: CLI overrides > `NRB_*` environment > package.json `"nrb"` > defaults.
    /// Nested keys use a double underscore (`NRB_BUNDLER__PROGRAM`); single
    /// underscores map to camelCase (`NRB_STRICT_PORT` sets `strictPort`).
    pub fn load(base_dir: &Path, overrides: &CliOverrides) -> Result<Self> {
        let package = base_dir.join(crate::config::default_package_path());

        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Figment::from(Json::file(&package)).focus(PACKAGE_SECTION))
            .merge(
                Env::prefixed("NRB_")
                    .lowercase(false)
                    .split("__")
                    .map(|key| snake_to_camel(key.as_str()).into()),
            )
            .merge(Serialized::defaults(overrides));

        let mut config: Self = figment.extract().map_err(|e| ConfigError::InvalidValue {
            field: "configuration".to_string(),
            value: e.to_string(),
            hint: format!(
                "Check the \"{}\" section of {} and NRB_* variables",
                PACKAGE_SECTION,
                package.display()
            ),
        })?;

        config.base_dir = base_dir.to_path_buf();
        Ok(config)
    }
}

/// `STRICT_PORT` -> `strictPort`, per dot-separated segment.
fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for c in key.chars() {
        match c {
            '_' => upper_next = true,
            '.' => {
                upper_next = false;
                out.push(c);
            }
            c if upper_next => {
                out.extend(c.to_uppercase());
                upper_next = false;
            }
            c => out.extend(c.to_lowercase()),
        }
    }
    out
}
