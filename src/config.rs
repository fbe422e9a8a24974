//! Configuration types for modstage

use crate::error::{Error, Result};
use crate::guest_path;
use crate::registry;
use crate::types::EngineProfile;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Main configuration for [`ModInstaller`](crate::ModInstaller)
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Guest path where the mod-storage device is mounted (default: "/mods")
    #[serde(default = "default_mount_prefix")]
    pub mount_prefix: String,

    /// Folder names that identify a mod's root for root detection
    /// (default: data, images, songs, scripts)
    #[serde(default = "default_marker_folders")]
    pub marker_folders: Vec<String>,

    /// Environment passed to the engine process, as `KEY=VALUE` pairs
    /// (default: `DISPLAY=:0`)
    #[serde(default = "default_launch_env")]
    pub launch_env: Vec<String>,

    /// Upper bound on in-flight file writes (None = every write at once)
    #[serde(default)]
    pub max_concurrent_writes: Option<usize>,

    /// Event broadcast buffer size (default: 1000)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Engine table (default: the built-in engines)
    #[serde(default = "registry::builtin_engines")]
    pub engines: Vec<EngineProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mount_prefix: default_mount_prefix(),
            marker_folders: default_marker_folders(),
            launch_env: default_launch_env(),
            max_concurrent_writes: None,
            event_capacity: default_event_capacity(),
            engines: registry::builtin_engines(),
        }
    }
}

impl Config {
    /// Parse a configuration from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config {
            message: format!("failed to parse configuration: {}", e),
            key: None,
        })
    }

    /// Load and validate a JSON configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config = Self::from_json_str(&content)?;
        config.validate()?;
        tracing::debug!(
            path = %path.display(),
            engines = config.engines.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    /// Check the configuration for values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.mount_prefix.starts_with('/') || !guest_path::is_normalized(&self.mount_prefix) {
            return Err(config_error(
                format!(
                    "mount prefix must be an absolute normalized path, got {:?}",
                    self.mount_prefix
                ),
                "mount_prefix",
            ));
        }

        if self.marker_folders.is_empty() {
            return Err(config_error(
                "at least one marker folder is required",
                "marker_folders",
            ));
        }
        for marker in &self.marker_folders {
            if marker.is_empty() || marker.contains('/') || marker == "." || marker == ".." {
                return Err(config_error(
                    format!("marker folder {:?} must be a single path segment", marker),
                    "marker_folders",
                ));
            }
        }

        if let Some(0) = self.max_concurrent_writes {
            return Err(config_error(
                "max_concurrent_writes must be at least 1",
                "max_concurrent_writes",
            ));
        }

        if self.event_capacity == 0 {
            return Err(config_error(
                "event_capacity must be at least 1",
                "event_capacity",
            ));
        }

        for var in &self.launch_env {
            if !var.contains('=') {
                return Err(config_error(
                    format!("launch environment entry {:?} is not KEY=VALUE", var),
                    "launch_env",
                ));
            }
        }

        let mut seen = HashSet::new();
        for engine in &self.engines {
            if !seen.insert(engine.id.as_str()) {
                return Err(config_error(
                    format!("duplicate engine id {:?}", engine.id),
                    "engines",
                ));
            }
            if !engine.executable_path.starts_with('/') {
                return Err(config_error(
                    format!(
                        "engine {:?} executable path {:?} is not absolute",
                        engine.id, engine.executable_path
                    ),
                    "engines",
                ));
            }
        }

        Ok(())
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

fn default_mount_prefix() -> String {
    "/mods".to_string()
}

fn default_marker_folders() -> Vec<String> {
    ["data", "images", "songs", "scripts"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_launch_env() -> Vec<String> {
    vec!["DISPLAY=:0".to_string()]
}

fn default_event_capacity() -> usize {
    1000
}
