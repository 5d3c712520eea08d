//! CLI configuration

use dagmod_blockstore::DEFAULT_CHUNK_SIZE;
use dagmod_core::{ModifierConfig, DEFAULT_MAX_LINKS, SPARSE_CHUNK_SIZE, WRITE_BUFFER_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of environment variables that override file settings
pub const ENV_PREFIX: &str = "DAGMOD";

/// Settings shared by every subcommand
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Directory of the filesystem block store
    pub store_path: PathBuf,
    /// Leaf size used when splitting written data
    pub chunk_size: usize,
    /// Max links per internal node
    pub max_links: usize,
    /// Buffered bytes before an implicit flush
    pub write_buffer_size: usize,
    /// Blocks kept in the in-memory read cache
    pub cache_capacity: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(".dagmod"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_links: DEFAULT_MAX_LINKS,
            write_buffer_size: WRITE_BUFFER_SIZE,
            cache_capacity: 1024,
        }
    }
}

impl CliConfig {
    /// Layer defaults, an optional TOML file and `DAGMOD_*` variables
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);
        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Tunables for file handles
    pub fn modifier_config(&self) -> ModifierConfig {
        ModifierConfig {
            write_buffer_size: self.write_buffer_size,
            sparse_chunk_size: SPARSE_CHUNK_SIZE,
            max_links: self.max_links,
        }
    }
}
