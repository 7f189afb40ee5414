//! TOML configuration.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [storage]
//! root = "./media"
//!
//! [streaming]
//! default_chunk_size = 1048576
//! open_ended = "chunked"       # or "remainder"
//! default_content_type = "audio/mpeg"
//!
//! [[media]]
//! id = 1
//! title = "Intro"
//! locator = "intro.mp3"
//! premium = false
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{InMemoryMediaRepository, MediaDescriptor, OpenEnded, RangeResolver, DEFAULT_CONTENT_TYPE};

/// Files tried, in order, when no config path is given.
const DEFAULT_PATHS: [&str; 2] = ["./media-range.toml", "./config.toml"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub streaming: StreamingConfig,
    pub media: Vec<MediaDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory media locators are resolved against.
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            root: PathBuf::from("./media"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Bytes served for `bytes=N-` when `open_ended` is `chunked`.
    pub default_chunk_size: u64,
    pub open_ended: OpenEnded,
    pub default_content_type: String,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        StreamingConfig {
            default_chunk_size: RangeResolver::DEFAULT_CHUNK_SIZE,
            open_ended: OpenEnded::default(),
            default_content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

impl StreamingConfig {
    pub fn resolver(&self) -> RangeResolver {
        RangeResolver::new(self.default_chunk_size).with_open_ended(self.open_ended)
    }
}

impl Config {
    /// Catalog holding the `[[media]]` entries.
    pub fn catalog(&self) -> InMemoryMediaRepository {
        self.media.iter().cloned().collect()
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from `custom_path`, else from the default locations, else
/// return the default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    for path in DEFAULT_PATHS.iter().map(Path::new) {
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.streaming.default_chunk_size == 0 {
        anyhow::bail!("Streaming default_chunk_size must be greater than 0");
    }

    if config.streaming.default_content_type.parse::<mime_guess::Mime>().is_err() {
        anyhow::bail!(
            "Streaming default_content_type is not a valid MIME type: {}",
            config.streaming.default_content_type
        );
    }

    if !config.storage.root.is_dir() {
        tracing::warn!("Storage root does not exist: {:?}", config.storage.root);
    }

    let mut seen = HashSet::new();
    for media in &config.media {
        if !seen.insert(media.id) {
            anyhow::bail!("Media id {} is defined more than once", media.id);
        }
        if media.storage_locator.is_empty() {
            anyhow::bail!("Media '{}' has an empty locator", media.title);
        }
    }

    Ok(())
}
