//! Generator configuration.
//!
//! Configuration is one JSON document describing the projection, the
//! dataset sources and the baker chain. Everything structural is checked
//! by [`GeneratorConfig::validate`] before any generator is built, so an
//! unresolvable URL placeholder or an empty mapping table fails at
//! startup, never during a region bake.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::bake::Baker;
use crate::dataset::BlendMode;
use crate::fetch::template_keys;
use crate::projection::ProjectionSpec;
use crate::vector::MappingRule;

/// Placeholders dataset URL templates may use.
const URL_KEYS: [&str; 2] = ["x", "z"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{section}: at least one source url is required")]
    NoUrls { section: &'static str },
    #[error("{section}: unsupported placeholder ${{{key}}} in {url:?}")]
    UnknownPlaceholder {
        section: &'static str,
        key: String,
        url: String,
    },
    #[error("{section}: {message}")]
    Invalid {
        section: &'static str,
        message: String,
    },
    #[error("features: at least one mapping rule is required")]
    NoRules,
    #[error("bakers: at least one baker is required")]
    NoBakers,
}

/// Retry and timeout settings for dataset fetches.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchSettings {
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    30
}

/// One scalar (raster) dataset source.
#[derive(Debug, Clone, Deserialize)]
pub struct ScalarSourceConfig {
    /// URL templates with `${x}`/`${z}` tile placeholders, tried in
    /// order.
    pub urls: Vec<String>,
    /// Tile edge length in raster cells.
    pub resolution: u32,
    /// Projection from geographic coordinates to this raster's cell
    /// grid.
    pub projection: ProjectionSpec,
    #[serde(default = "default_blend")]
    pub blend: BlendMode,
}

fn default_blend() -> BlendMode {
    BlendMode::Linear
}

/// The vector feature source plus its mapping table.
#[derive(Debug, Clone, Deserialize)]
pub struct VectorSourceConfig {
    pub urls: Vec<String>,
    /// Tile grid pitch in geographic degrees.
    #[serde(default = "default_tile_degrees")]
    pub tile_degrees: f64,
    pub rules: Vec<MappingRule>,
}

fn default_tile_degrees() -> f64 {
    1.0 / 64.0
}

/// Complete generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    /// Projection from geographic coordinates to block coordinates.
    pub projection: ProjectionSpec,
    /// Root directory for the persistent fetch cache.
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub fetch: FetchSettings,
    /// Surface height used where elevation data is missing.
    #[serde(default)]
    pub default_height: i32,
    pub heights: ScalarSourceConfig,
    pub landcover: ScalarSourceConfig,
    pub features: VectorSourceConfig,
    /// Baker execution order. Later bakers see earlier bakers' writes.
    #[serde(default = "default_bakers")]
    pub bakers: Vec<Baker>,
}

fn default_bakers() -> Vec<Baker> {
    vec![Baker::Heights, Baker::Biomes, Baker::Features]
}

impl GeneratorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every structural invariant the type system cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_scalar("heights", &self.heights)?;
        validate_scalar("landcover", &self.landcover)?;

        validate_urls("features", &self.features.urls)?;
        if self.features.rules.is_empty() {
            return Err(ConfigError::NoRules);
        }
        if !(self.features.tile_degrees > 0.0) {
            return Err(ConfigError::Invalid {
                section: "features",
                message: format!("tile_degrees must be positive, got {}", self.features.tile_degrees),
            });
        }

        if self.bakers.is_empty() {
            return Err(ConfigError::NoBakers);
        }
        if self.fetch.retries == 0 {
            return Err(ConfigError::Invalid {
                section: "fetch",
                message: "retries must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn validate_scalar(section: &'static str, source: &ScalarSourceConfig) -> Result<(), ConfigError> {
    validate_urls(section, &source.urls)?;
    if source.resolution == 0 {
        return Err(ConfigError::Invalid {
            section,
            message: "resolution must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_urls(section: &'static str, urls: &[String]) -> Result<(), ConfigError> {
    if urls.is_empty() {
        return Err(ConfigError::NoUrls { section });
    }
    let known: HashSet<&str> = URL_KEYS.into_iter().collect();
    for url in urls {
        for key in template_keys(url) {
            if !known.contains(key) {
                return Err(ConfigError::UnknownPlaceholder {
                    section,
                    key: key.to_string(),
                    url: url.clone(),
                });
            }
        }
    }
    Ok(())
}
