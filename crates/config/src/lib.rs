//! Configuration loading and validation for fetchbox.
//!
//! Sources are layered, later ones winning:
//!
//! 1. built-in defaults
//! 2. a configuration file (TOML, YAML or JSON, chosen by extension)
//! 3. environment variables prefixed with [`ENV_PREFIX`], nested keys split
//!    on `__` (`FETCHBOX_STORAGE__ROOT=/srv/fetchbox`)
//! 4. command-line [`Overrides`]

pub mod error;
mod load;
mod model;

pub use crate::load::{ENV_PREFIX, Overrides, default_path};
pub use crate::model::{
    Config, DeadlinesConfig, IN_MEMORY, MetadataConfig, RegistryConfig, ServerConfig, StorageConfig,
};
