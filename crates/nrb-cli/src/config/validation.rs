use crate::config::DevConfig;
use crate::error::{ConfigError, Result};

impl DevConfig {
    /// Validate configuration for the dev server.
    ///
    /// Adds the filesystem check on top of [`DevConfig::validate_values`]: the
    /// source directory has to exist before it can be watched.
    pub fn validate(&self) -> Result<()> {
        self.validate_values()?;

        let source = self.source_root();
        if !source.is_dir() {
            return Err(ConfigError::InvalidValue {
                field: "sourceDir".to_string(),
                value: source.display().to_string(),
                hint: "The source directory must exist".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Validate configuration for logical consistency.
    pub fn validate_values(&self) -> Result<()> {
        if self.entry_file_name.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "entryFileName".to_string(),
                hint: "Name the entry module, e.g. \"index.tsx\"".to_string(),
            }
            .into());
        }

        if self.assets_dir.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "assetsDir".to_string(),
                hint: "Name the assets directory, e.g. \"assets\"".to_string(),
            }
            .into());
        }

        if self.strict_port && self.port == 0 {
            return Err(ConfigError::ConflictingOptions(
                "strictPort requires a fixed port, got port 0".to_string(),
            )
            .into());
        }

        match (&self.tls.cert, &self.tls.key) {
            (Some(_), None) => {
                return Err(ConfigError::MissingField {
                    field: "tls.key".to_string(),
                    hint: "A certificate needs its private key".to_string(),
                }
                .into());
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingField {
                    field: "tls.cert".to_string(),
                    hint: "A private key needs its certificate".to_string(),
                }
                .into());
            }
            _ => {}
        }

        if self.debounce_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "debounceMs".to_string(),
                value: "0".to_string(),
                hint: "Use a positive number of milliseconds".to_string(),
            }
            .into());
        }

        if self.client_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                field: "clientBuffer".to_string(),
                value: "0".to_string(),
                hint: "Each reload client needs room for at least one event".to_string(),
            }
            .into());
        }

        if self.ping_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pingIntervalSecs".to_string(),
                value: "0".to_string(),
                hint: "Use a positive number of seconds".to_string(),
            }
            .into());
        }

        Ok(())
    }
}
