//! # Configuration System
//!
//! Configuration for the runtime and its subsystems. Every section has
//! defaults, so a config file only needs to name what it changes.
//!
//! Files are loaded by extension: `.toml` through `toml`, `.ron` through `ron`.

pub use serde::{Serialize, Deserialize};

use crate::foundation::math::{standard_gravity, Vec3};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Top-level runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Asset lookup settings
    pub assets: AssetConfig,
    /// World save/load settings
    pub serialization: SerializationConfig,
    /// Physics subsystem defaults
    pub physics: PhysicsConfig,
    /// Logging backend settings
    pub logging: LoggingConfig,
}

impl Config for RuntimeConfig {}

/// # Asset Configuration
///
/// Where the file source looks for asset bytes. Identities are resolved
/// against each search path in order, then as a plain path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AssetConfig {
    /// Directories searched for asset files
    pub search_paths: Vec<String>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            search_paths: vec!["assets".to_string(), "resources".to_string()],
        }
    }
}

/// World serializer settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SerializationConfig {
    /// Skip component records whose tag is not registered instead of failing
    pub skip_unknown_components: bool,
}

/// Physics subsystem defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity for physics worlds that have no saved state
    pub default_gravity: Vec3,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            default_gravity: standard_gravity(),
        }
    }
}

/// Logging backend settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directives in `RUST_LOG` syntax
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}
