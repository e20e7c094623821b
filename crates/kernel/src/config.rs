use basemap_common::BasemapLayerKind;
use basemap_stream::TileSource;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of off-screen cells kept before eviction.
pub const DEFAULT_TILE_CACHE_LIMIT: i64 = 36;

fn default_tile_cache_limit() -> i64 {
    DEFAULT_TILE_CACHE_LIMIT
}

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),
}

/// Basemap engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasemapConfig {
    #[serde(default)]
    pub tile_source: TileSource,
    /// Off-screen cells kept for reuse. Zero or less evicts everything off screen.
    #[serde(default = "default_tile_cache_limit")]
    pub tile_cache_limit: i64,
    /// Adds the debug grid layer.
    #[serde(default)]
    pub debug_grid: bool,
}

impl Default for BasemapConfig {
    fn default() -> Self {
        Self {
            tile_source: TileSource::default(),
            tile_cache_limit: DEFAULT_TILE_CACHE_LIMIT,
            debug_grid: false,
        }
    }
}

impl BasemapConfig {
    /// Load from a `.yaml`/`.yml` or `.json` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&text),
            Some("json") => Self::from_json_str(&text),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Layers the engine tracks for this configuration.
    pub fn layers(&self) -> Vec<BasemapLayerKind> {
        let mut layers = self.tile_source.layers();
        if self.debug_grid {
            layers.push(BasemapLayerKind::Debug);
        }
        layers
    }
}
