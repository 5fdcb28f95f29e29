//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/yamltree/yamltree.toml`
//! 3. Local config: an explicitly given TOML file
//! 4. Environment variables: `YAMLTREE__*` prefix (e.g. `YAMLTREE__EMIT__INDENT=4`)

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error_channel;
use crate::errors::{YamlError, YamlResult};

/// Largest indentation step the emitter accepts.
pub const MAX_INDENT: usize = 8;

/// Capacity hints applied when a tree is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TreeSettings {
    /// Initial node table capacity
    pub node_capacity: usize,
    /// Initial arena capacity in bytes
    pub arena_capacity: usize,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            node_capacity: 16,
            arena_capacity: 0,
        }
    }
}

/// Emitter output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmitSettings {
    /// Spaces per nesting level in block output
    pub indent: usize,
    /// Emit JSON instead of YAML
    pub json: bool,
}

impl Default for EmitSettings {
    fn default() -> Self {
        Self {
            indent: 2,
            json: false,
        }
    }
}

/// Raw tree settings for intermediate parsing (`None` → inherit from base).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawTreeSettings {
    pub node_capacity: Option<usize>,
    pub arena_capacity: Option<usize>,
}

/// Raw emit settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawEmitSettings {
    pub indent: Option<usize>,
    pub json: Option<bool>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub tree: RawTreeSettings,
    pub emit: RawEmitSettings,
}

/// Unified configuration for yamltree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Settings {
    pub tree: TreeSettings,
    pub emit: EmitSettings,
}

/// Get the XDG config directory for yamltree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "yamltree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("yamltree.toml"))
}

fn config_err(e: ConfigError) -> YamlError {
    error_channel::raise(YamlError::config(e.to_string()))
}

/// Read one environment key; unset is `None`, a malformed value is an error.
fn env_value<T: DeserializeOwned>(config: &Config, key: &str) -> YamlResult<Option<T>> {
    match config.get::<T>(key) {
        Ok(val) => Ok(Some(val)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(config_err(e)),
    }
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> YamlResult<RawSettings> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        error_channel::raise(YamlError::config(format!("read {}: {}", path.display(), e)))
    })?;
    toml::from_str(&content).map_err(|e| {
        error_channel::raise(YamlError::config(format!("parse {}: {}", path.display(), e)))
    })
}

impl Settings {
    /// Overlay wins wherever it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            tree: TreeSettings {
                node_capacity: overlay
                    .tree
                    .node_capacity
                    .unwrap_or(self.tree.node_capacity),
                arena_capacity: overlay
                    .tree
                    .arena_capacity
                    .unwrap_or(self.tree.arena_capacity),
            },
            emit: EmitSettings {
                indent: overlay.emit.indent.unwrap_or(self.emit.indent),
                json: overlay.emit.json.unwrap_or(self.emit.json),
            },
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local` - Optional TOML file applied on top of the global config
    pub fn load(local: Option<&Path>) -> YamlResult<Self> {
        error_channel::init_once();
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("loading global config {}", global_path.display());
                current = current.merge_with(&load_raw_settings(&global_path)?);
            }
        }

        // 3. Local config
        if let Some(local_path) = local {
            debug!("loading local config {}", local_path.display());
            current = current.merge_with(&load_raw_settings(local_path)?);
        }

        // 4. Environment variables
        current = Self::apply_env_overrides(current)?;

        current.validate()?;
        Ok(current)
    }

    /// Parse settings from TOML text on top of the compiled defaults.
    pub fn from_toml_str(content: &str) -> YamlResult<Self> {
        error_channel::init_once();
        let raw: RawSettings = toml::from_str(content)
            .map_err(|e| error_channel::raise(YamlError::config(e.to_string())))?;
        let settings = Self::default().merge_with(&raw);
        settings.validate()?;
        Ok(settings)
    }

    /// Apply YAMLTREE__* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> YamlResult<Self> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("YAMLTREE").separator("__"))
            .build()
            .map_err(config_err)?;

        if let Some(val) = env_value(&config, "tree.node_capacity")? {
            settings.tree.node_capacity = val;
        }
        if let Some(val) = env_value(&config, "tree.arena_capacity")? {
            settings.tree.arena_capacity = val;
        }
        if let Some(val) = env_value(&config, "emit.indent")? {
            settings.emit.indent = val;
        }
        if let Some(val) = env_value(&config, "emit.json")? {
            settings.emit.json = val;
        }
        Ok(settings)
    }

    fn validate(&self) -> YamlResult<()> {
        if self.emit.indent == 0 || self.emit.indent > MAX_INDENT {
            return Err(error_channel::raise(YamlError::config(format!(
                "emit.indent must be between 1 and {}, got {}",
                MAX_INDENT, self.emit.indent
            ))));
        }
        Ok(())
    }

    /// Serialize the effective settings as TOML.
    pub fn to_toml_string(&self) -> YamlResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| error_channel::raise(YamlError::config(e.to_string())))
    }
}
