//! Host configuration (tether.toml)
//!
//! ```toml
//! [host]
//! name = "game"
//! assemblies = ["libscripts.so"]
//! layout_check = "validate"
//!
//! [[signatures]]
//! id = 10
//! returns = "int"
//! params = ["int", "int"]
//! ```

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tether_core::{BridgeOptions, LayoutCheck};
use thiserror::Error;

/// Errors that can occur while loading a host configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or write the configuration file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Host configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HostConfig {
    /// Host settings
    #[serde(default)]
    pub host: HostSection,

    /// Signatures registered at boot
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<SignatureConfig>,
}

/// `[host]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostSection {
    /// Environment name used in diagnostics
    #[serde(default = "default_name")]
    pub name: String,

    /// Shared libraries exporting `tether_assembly_init`
    #[serde(default)]
    pub assemblies: Vec<PathBuf>,

    /// Pointer checking for raw invocations
    #[serde(default)]
    pub layout_check: LayoutCheckSetting,

    /// Directory relative assembly paths resolve against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
}

fn default_name() -> String {
    "tether".to_string()
}

fn default_return() -> String {
    "void".to_string()
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            assemblies: Vec::new(),
            layout_check: LayoutCheckSetting::default(),
            base_dir: None,
        }
    }
}

/// `layout_check` values
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LayoutCheckSetting {
    /// Use pointers as given
    Trust,
    /// Reject null and misaligned pointers
    #[default]
    Validate,
}

impl From<LayoutCheckSetting> for LayoutCheck {
    fn from(setting: LayoutCheckSetting) -> Self {
        match setting {
            LayoutCheckSetting::Trust => LayoutCheck::Trust,
            LayoutCheckSetting::Validate => LayoutCheck::Validate,
        }
    }
}

/// `[[signatures]]` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignatureConfig {
    /// Signature id
    pub id: i32,

    /// Return type name
    #[serde(default = "default_return")]
    pub returns: String,

    /// Parameter type names
    #[serde(default)]
    pub params: Vec<String>,
}

impl HostConfig {
    /// Load a configuration file.
    ///
    /// When `base_dir` is not set, relative assembly paths resolve against
    /// the directory containing the file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_str(&content)?;
        if config.host.base_dir.is_none() {
            config.host.base_dir = path.parent().map(Path::to_path_buf);
        }
        Ok(config)
    }

    /// Parse a configuration from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: HostConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Host name cannot be empty".to_string(),
            ));
        }

        for path in &self.host.assemblies {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::ValidationError(
                    "Assembly path cannot be empty".to_string(),
                ));
            }
        }

        let mut seen = FxHashSet::default();
        for sig in &self.signatures {
            if sig.id < 0 {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid signature id: {}. Must be non-negative",
                    sig.id
                )));
            }
            if !seen.insert(sig.id) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate signature id: {}",
                    sig.id
                )));
            }
        }

        Ok(())
    }

    /// Write the configuration to a file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Serialize the configuration
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Assembly paths with relative entries resolved against `base_dir`
    pub fn assembly_paths(&self) -> Vec<PathBuf> {
        self.host
            .assemblies
            .iter()
            .map(|p| match &self.host.base_dir {
                Some(base) if p.is_relative() => base.join(p),
                _ => p.clone(),
            })
            .collect()
    }

    /// Options for the bridge this configuration boots
    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            name: self.host.name.clone(),
            layout_check: self.host.layout_check.into(),
        }
    }
}
