//! Configuration model and validation.

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Database path that selects an in-memory SQLite database.
pub const IN_MEMORY: &str = ":memory:";

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "fetchbox")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
    pub registry: RegistryConfig,
    pub deadlines: DeadlinesConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub listen: SocketAddr,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self { listen: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8080)) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory downloaded content is stored in. Must be absolute.
    pub root: PathBuf,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self { root: PathBuf::from("/tmp/downloads") }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// SQLite database file, or [`IN_MEMORY`].
    pub database: PathBuf,
}
impl Default for MetadataConfig {
    fn default() -> Self {
        let database = match project_dirs() {
            Some(dirs) => dirs.data_dir().join("fetchbox.sqlite"),
            None => PathBuf::from("fetchbox.sqlite"),
        };
        Self { database }
    }
}
impl MetadataConfig {
    pub fn is_in_memory(&self) -> bool {
        self.database == Path::new(IN_MEMORY)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Length of generated content names.
    pub name_length: usize,
    /// Names tried per registration before reporting a conflict.
    pub name_attempts: usize,
}
impl Default for RegistryConfig {
    fn default() -> Self {
        Self { name_length: 10, name_attempts: 5 }
    }
}

/// Per-call deadlines, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadlinesConfig {
    pub metadata_ms: u64,
    pub content_ms: u64,
    pub fetch_ms: u64,
}
impl Default for DeadlinesConfig {
    fn default() -> Self {
        Self { metadata_ms: 5_000, content_ms: 5_000, fetch_ms: 60_000 }
    }
}
impl DeadlinesConfig {
    pub fn metadata(&self) -> Duration {
        Duration::from_millis(self.metadata_ms)
    }

    pub fn content(&self) -> Duration {
        Duration::from_millis(self.content_ms)
    }

    pub fn fetch(&self) -> Duration {
        Duration::from_millis(self.fetch_ms)
    }
}

impl Config {
    /// Check values that deserialized fine but can't be used.
    pub fn validate(&self) -> Result<()> {
        if !self.storage.root.is_absolute() {
            exn::bail!(ErrorKind::Invalid("storage.root"));
        }
        if self.metadata.database.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("metadata.database"));
        }
        if !(1..=64).contains(&self.registry.name_length) {
            exn::bail!(ErrorKind::Invalid("registry.name_length"));
        }
        if self.registry.name_attempts == 0 {
            exn::bail!(ErrorKind::Invalid("registry.name_attempts"));
        }
        for (key, value) in [
            ("deadlines.metadata_ms", self.deadlines.metadata_ms),
            ("deadlines.content_ms", self.deadlines.content_ms),
            ("deadlines.fetch_ms", self.deadlines.fetch_ms),
        ] {
            if value == 0 {
                exn::bail!(ErrorKind::Invalid(key));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.storage.root, PathBuf::from("/tmp/downloads"));
        assert_eq!(config.registry.name_length, 10);
        assert_eq!(config.deadlines.fetch(), Duration::from_secs(60));
        assert!(!config.metadata.is_in_memory());
    }

    #[rstest]
    #[case::relative_root(|c: &mut Config| c.storage.root = PathBuf::from("downloads"), "storage.root")]
    #[case::empty_database(|c: &mut Config| c.metadata.database = PathBuf::new(), "metadata.database")]
    #[case::zero_length(|c: &mut Config| c.registry.name_length = 0, "registry.name_length")]
    #[case::long_names(|c: &mut Config| c.registry.name_length = 65, "registry.name_length")]
    #[case::no_attempts(|c: &mut Config| c.registry.name_attempts = 0, "registry.name_attempts")]
    #[case::zero_fetch(|c: &mut Config| c.deadlines.fetch_ms = 0, "deadlines.fetch_ms")]
    #[case::zero_metadata(|c: &mut Config| c.deadlines.metadata_ms = 0, "deadlines.metadata_ms")]
    fn test_invalid_values(#[case] change: fn(&mut Config), #[case] key: &str) {
        let mut config = Config::default();
        change(&mut config);
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(k) if *k == key));
    }

    #[test]
    fn test_in_memory_database() {
        let metadata = MetadataConfig { database: PathBuf::from(IN_MEMORY) };
        assert!(metadata.is_in_memory());
    }
}
