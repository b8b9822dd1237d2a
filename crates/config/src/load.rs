//! Layered configuration loading.

use crate::error::{ErrorKind, Result};
use crate::model::{Config, project_dirs};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable prefix; nested keys are split on `__`.
pub const ENV_PREFIX: &str = "FETCHBOX_";

/// Values given on the command line, applied after every other source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub listen: Option<SocketAddr>,
    pub root: Option<PathBuf>,
    pub database: Option<PathBuf>,
}

/// Where the configuration file is looked for when none is given.
pub fn default_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Load defaults, then `file` (if any), then the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with(file, &Overrides::default())
    }

    /// Load every layer, apply `overrides` last and validate the result.
    pub fn load_with(file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut config: Config = Self::figment(file)?.extract().or_raise(|| ErrorKind::Load)?;
        if let Some(listen) = overrides.listen {
            config.server.listen = listen;
        }
        if let Some(root) = &overrides.root {
            config.storage.root = root.clone();
        }
        if let Some(database) = &overrides.database {
            config.metadata.database = database.clone();
        }
        config.validate()?;
        Ok(config)
    }

    fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file {
            if !path.is_file() {
                exn::bail!(ErrorKind::Missing(path.to_path_buf()));
            }
            tracing::debug!(path = %path.display(), "loading configuration file");
            let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
            figment = match extension.as_deref() {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            };
        }
        // FETCHBOX_CONFIG and FETCHBOX_URL are read by the command line.
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["config", "url"]).split("__")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::time::Duration;

    #[test]
    fn test_no_sources_gives_defaults() {
        Jail::expect_with(|_jail| {
            assert_eq!(Config::load(None).unwrap(), Config::default());
            Ok(())
        });
    }

    #[test]
    fn test_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "fetchbox.toml",
                r#"
                    [server]
                    listen = "127.0.0.1:9090"

                    [storage]
                    root = "/srv/fetchbox"

                    [deadlines]
                    fetch_ms = 1500
                "#,
            )?;
            let config = Config::load(Some(Path::new("fetchbox.toml"))).unwrap();
            assert_eq!(config.server.listen, "127.0.0.1:9090".parse().unwrap());
            assert_eq!(config.storage.root, PathBuf::from("/srv/fetchbox"));
            assert_eq!(config.deadlines.fetch(), Duration::from_millis(1500));
            // Untouched keys keep their defaults.
            assert_eq!(config.deadlines.metadata_ms, 5_000);
            assert_eq!(config.registry.name_length, 10);
            Ok(())
        });
    }

    #[test]
    fn test_yaml_and_json_files() {
        Jail::expect_with(|jail| {
            jail.create_file("fetchbox.yml", "registry:\n  name_length: 16\n")?;
            jail.create_file("fetchbox.json", r#"{"registry": {"name_attempts": 9}}"#)?;
            assert_eq!(Config::load(Some(Path::new("fetchbox.yml"))).unwrap().registry.name_length, 16);
            assert_eq!(Config::load(Some(Path::new("fetchbox.json"))).unwrap().registry.name_attempts, 9);
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("fetchbox.toml", "[storage]\nroot = \"/from/file\"\n")?;
            jail.set_env("FETCHBOX_STORAGE__ROOT", "/from/env");
            jail.set_env("FETCHBOX_DEADLINES__CONTENT_MS", "250");
            let config = Config::load(Some(Path::new("fetchbox.toml"))).unwrap();
            assert_eq!(config.storage.root, PathBuf::from("/from/env"));
            assert_eq!(config.deadlines.content_ms, 250);
            Ok(())
        });
    }

    #[test]
    fn test_command_line_variables_ignored() {
        Jail::expect_with(|jail| {
            jail.set_env("FETCHBOX_CONFIG", "/etc/fetchbox.toml");
            jail.set_env("FETCHBOX_URL", "http://localhost:8080");
            assert_eq!(Config::load(None).unwrap(), Config::default());
            Ok(())
        });
    }

    #[test]
    fn test_overrides_win() {
        Jail::expect_with(|jail| {
            jail.set_env("FETCHBOX_STORAGE__ROOT", "/from/env");
            let overrides = Overrides {
                listen: Some("127.0.0.1:1234".parse().unwrap()),
                root: Some(PathBuf::from("/from/cli")),
                database: Some(PathBuf::from(crate::IN_MEMORY)),
            };
            let config = Config::load_with(None, &overrides).unwrap();
            assert_eq!(config.server.listen.port(), 1234);
            assert_eq!(config.storage.root, PathBuf::from("/from/cli"));
            assert!(config.metadata.is_in_memory());
            Ok(())
        });
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Missing(_)));
    }

    #[test]
    fn test_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "listen=1").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[test]
    fn test_ill_typed_value() {
        Jail::expect_with(|jail| {
            jail.create_file("fetchbox.toml", "[registry]\nname_length = \"long\"\n")?;
            let err = Config::load(Some(Path::new("fetchbox.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load));
            Ok(())
        });
    }

    #[test]
    fn test_validation_runs_after_loading() {
        Jail::expect_with(|jail| {
            jail.set_env("FETCHBOX_STORAGE__ROOT", "relative/path");
            let err = Config::load(None).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid("storage.root")));
            Ok(())
        });
    }

    #[test]
    fn test_default_path_is_toml() {
        if let Some(path) = default_path() {
            assert!(path.ends_with("config.toml"));
        }
    }
}
