#[cfg(test)]
mod tests {
    use crate::config::*;
    use serial_test::serial;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn project(package_json: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("package.json"), package_json).unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        dir
    }

    #[test]
    #[serial]
    fn test_defaults_without_nrb_section() {
        let dir = project(r#"{ "name": "app", "version": "1.0.0" }"#);
        let config = DevConfig::load(dir.path(), &CliOverrides::default()).unwrap();

        assert_eq!(config.source_dir, PathBuf::from("src"));
        assert_eq!(config.entry_file_name, "index.tsx");
        assert_eq!(config.assets_dir, "assets");
        assert_eq!(config.public_url, "/");
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 3000);
        assert!(!config.strict_port);
        assert_eq!(config.debounce_ms, 100);
        assert_eq!(config.proxy_timeout_secs, 60);
        assert_eq!(config.bundler.program, "esbuild");
        assert_eq!(config.base_dir, dir.path());
        config.validate().unwrap();
    }

    #[test]
    #[serial]
    fn test_package_json_section_overrides_defaults() {
        let dir = project(
            r#"{
                "name": "app",
                "nrb": {
                    "port": 4000,
                    "publicUrl": "/app/",
                    "preload": ["node_modules/react"],
                    "bundler": { "splitting": true },
                    "somethingNew": true
                }
            }"#,
        );
        let config = DevConfig::load(dir.path(), &CliOverrides::default()).unwrap();

        assert_eq!(config.port, 4000);
        assert_eq!(config.public_url, "/app/");
        assert_eq!(config.preload, vec!["node_modules/react".to_string()]);
        assert!(config.bundler.splitting);
        assert_eq!(config.bundler.program, "esbuild");
    }

    #[test]
    #[serial]
    fn test_env_overrides_package_json() {
        let dir = project(r#"{ "nrb": { "port": 4000 } }"#);
        std::env::set_var("NRB_PORT", "5000");
        std::env::set_var("NRB_STRICT_PORT", "true");
        std::env::set_var("NRB_BUNDLER__PROGRAM", "/opt/esbuild");
        let config = DevConfig::load(dir.path(), &CliOverrides::default());
        std::env::remove_var("NRB_PORT");
        std::env::remove_var("NRB_STRICT_PORT");
        std::env::remove_var("NRB_BUNDLER__PROGRAM");

        let config = config.unwrap();
        assert_eq!(config.port, 5000);
        assert!(config.strict_port);
        assert_eq!(config.bundler.program, "/opt/esbuild");
    }

    #[test]
    #[serial]
    fn test_cli_overrides_everything() {
        let dir = project(r#"{ "nrb": { "port": 4000, "host": "0.0.0.0" } }"#);
        std::env::set_var("NRB_PORT", "5000");
        let overrides = CliOverrides {
            port: Some(6000),
            ..CliOverrides::default()
        };
        let config = DevConfig::load(dir.path(), &overrides);
        std::env::remove_var("NRB_PORT");

        let config = config.unwrap();
        assert_eq!(config.port, 6000);
        // Unset CLI options keep lower layers.
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    #[serial]
    fn test_wrong_type_is_invalid_value() {
        let dir = project(r#"{ "nrb": { "port": "not a number" } }"#);
        let err = DevConfig::load(dir.path(), &CliOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("Invalid value"));
    }

    #[test]
    fn test_validation() {
        let base = DevConfig::default();
        base.validate_values().unwrap();

        assert!(DevConfig {
            strict_port: true,
            port: 0,
            ..DevConfig::default()
        }
        .validate_values()
        .is_err());

        assert!(DevConfig {
            entry_file_name: String::new(),
            ..DevConfig::default()
        }
        .validate_values()
        .is_err());

        assert!(DevConfig {
            debounce_ms: 0,
            ..DevConfig::default()
        }
        .validate_values()
        .is_err());

        assert!(DevConfig {
            tls: TlsConfig {
                cert: Some(PathBuf::from("cert.pem")),
                key: None,
            },
            ..DevConfig::default()
        }
        .validate_values()
        .is_err());
    }

    #[test]
    fn test_validate_requires_source_dir() {
        let dir = TempDir::new().unwrap();
        let config = DevConfig {
            base_dir: dir.path().to_path_buf(),
            ..DevConfig::default()
        };
        assert!(config.validate().is_err());

        fs::create_dir(dir.path().join("src")).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_paths_resolve_against_base_dir() {
        let config = DevConfig {
            base_dir: PathBuf::from("/project"),
            ..DevConfig::default()
        };

        assert_eq!(config.entry_path(), PathBuf::from("/project/src/index.tsx"));
        assert_eq!(config.static_root(), PathBuf::from("/project/public"));
        assert_eq!(
            config.extra_watch_files(),
            vec![
                PathBuf::from("/project/tsconfig.json"),
                PathBuf::from("/project/package.json"),
                PathBuf::from("/project/public/version.json"),
            ]
        );
    }

    #[test]
    fn test_cli_overrides_skip_unset_fields() {
        let json = serde_json::to_value(CliOverrides {
            strict_port: Some(true),
            ..CliOverrides::default()
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "strictPort": true }));
    }

    #[test]
    fn test_dev_args_to_overrides() {
        let args = crate::cli::DevArgs {
            cert: Some(PathBuf::from("cert.pem")),
            key: Some(PathBuf::from("key.pem")),
            ..Default::default()
        };
        let overrides = CliOverrides::from(&args);
        assert!(overrides.strict_port.is_none());
        assert_eq!(
            overrides.tls,
            Some(TlsConfig {
                cert: Some(PathBuf::from("cert.pem")),
                key: Some(PathBuf::from("key.pem")),
            })
        );
    }
}
