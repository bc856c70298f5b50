//! Bridge configuration (TOML)
//!
//! ```toml
//! [module]
//! org = "ballerina"
//! name = "grpc"
//! version = "1.0.0"
//!
//! [fields]
//! mismatch = "error"   # or "panic"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};
use crate::types::ModuleId;

/// What typed accessors do with a stored value of the wrong kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Return `BridgeError::TypeMismatch`
    #[default]
    Error,
    /// Panic with the mismatch message
    Panic,
}

/// Field access settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldAccessConfig {
    /// Mismatch policy (default: error)
    #[serde(default)]
    pub mismatch: MismatchPolicy,
}

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Module that owns the bridged types
    #[serde(default = "default_module")]
    pub module: ModuleId,

    /// Field access settings
    #[serde(default)]
    pub fields: FieldAccessConfig,
}

fn default_module() -> ModuleId {
    ModuleId::new("local", "bridge", "0.0.0")
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            module: default_module(),
            fields: FieldAccessConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> BridgeResult<Self> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_str(&content)?;
        tracing::debug!(path = %path.display(), module = %config.module, "loaded bridge config");
        Ok(config)
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> BridgeResult<String> {
        toml::to_string_pretty(self).map_err(|e| BridgeError::Config(e.to_string()))
    }

    /// Check required values
    pub fn validate(&self) -> BridgeResult<()> {
        if self.module.org.trim().is_empty() {
            return Err(BridgeError::Config("module.org must not be empty".to_string()));
        }
        if self.module.name.trim().is_empty() {
            return Err(BridgeError::Config("module.name must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = BridgeConfig::from_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.fields.mismatch, MismatchPolicy::Error);
    }

    #[test]
    fn test_full_config() {
        let config = BridgeConfig::from_str(
            r#"
[module]
org = "ballerina"
name = "grpc"
version = "1.0.0"

[fields]
mismatch = "panic"
"#,
        )
        .unwrap();
        assert_eq!(config.module, ModuleId::new("ballerina", "grpc", "1.0.0"));
        assert_eq!(config.fields.mismatch, MismatchPolicy::Panic);
    }

    #[test]
    fn test_invalid_values() {
        let err = BridgeConfig::from_str("[fields]\nmismatch = \"ignore\"\n").unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));

        let err = BridgeConfig::from_str(
            "[module]\norg = \"\"\nname = \"grpc\"\nversion = \"1.0.0\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("module.org"));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = BridgeConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(BridgeConfig::from_str(&text).unwrap(), config);
    }
}
