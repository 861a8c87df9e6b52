//! UDS client and stack configuration

use std::path::Path;
use std::time::Duration;

use candiag_isotp::{AddressingConfig, IsoTpConfig};
use serde::{Deserialize, Serialize};

use crate::error::UdsError;

/// Client timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdsClientConfig {
    /// P2 response timeout (milliseconds)
    #[serde(default = "default_p2_timeout_ms")]
    pub p2_timeout_ms: u64,
    /// P2* timeout after a response pending NRC (milliseconds)
    #[serde(default = "default_p2_star_timeout_ms")]
    pub p2_star_timeout_ms: u64,
    /// Total time a request may stay pending (milliseconds)
    #[serde(default = "default_pending_limit_ms")]
    pub pending_limit_ms: u64,
    /// How long functional requests collect responses (milliseconds)
    #[serde(default = "default_functional_timeout_ms")]
    pub functional_timeout_ms: u64,
}

fn default_p2_timeout_ms() -> u64 {
    1000
}

fn default_p2_star_timeout_ms() -> u64 {
    5000
}

fn default_pending_limit_ms() -> u64 {
    30_000
}

fn default_functional_timeout_ms() -> u64 {
    1000
}

impl Default for UdsClientConfig {
    fn default() -> Self {
        Self {
            p2_timeout_ms: default_p2_timeout_ms(),
            p2_star_timeout_ms: default_p2_star_timeout_ms(),
            pending_limit_ms: default_pending_limit_ms(),
            functional_timeout_ms: default_functional_timeout_ms(),
        }
    }
}

impl UdsClientConfig {
    pub fn p2_timeout(&self) -> Duration {
        Duration::from_millis(self.p2_timeout_ms)
    }

    pub fn p2_star_timeout(&self) -> Duration {
        Duration::from_millis(self.p2_star_timeout_ms)
    }

    pub fn pending_limit(&self) -> Duration {
        Duration::from_millis(self.pending_limit_ms)
    }

    pub fn functional_timeout(&self) -> Duration {
        Duration::from_millis(self.functional_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), UdsError> {
        if self.p2_timeout_ms == 0 || self.p2_star_timeout_ms == 0 {
            return Err(UdsError::Config("P2 timeouts must be non-zero".to_string()));
        }
        if self.functional_timeout_ms == 0 {
            return Err(UdsError::Config(
                "functional_timeout_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything needed to open a diagnostic channel, as one TOML file
///
/// ```toml
/// [addressing]
/// mode = "normal"
/// tx_id = "0x7E0"
/// rx_id = "0x7E8"
///
/// [isotp]
/// block_size = 8
///
/// [client]
/// p2_timeout_ms = 500
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    #[serde(default)]
    pub addressing: AddressingConfig,
    #[serde(default)]
    pub isotp: IsoTpConfig,
    #[serde(default)]
    pub client: UdsClientConfig,
}

impl StackConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, UdsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| UdsError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, UdsError> {
        let config: Self =
            toml::from_str(content).map_err(|e| UdsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), UdsError> {
        self.addressing.to_addressing()?;
        self.isotp.validate()?;
        self.client.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candiag_isotp::{Addressing, TargetType};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = StackConfig::from_toml_str("").unwrap();
        assert_eq!(config, StackConfig::default());
        assert_eq!(config.client.p2_star_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.addressing.to_addressing().unwrap(),
            Addressing::normal(0x7E0, 0x7E8)
        );
    }

    #[test]
    fn test_full_config() {
        let config = StackConfig::from_toml_str(
            r#"
            [addressing]
            mode = "mixed"
            source = 0xF1
            target = 0x10
            address_extension = 0x55

            [isotp]
            block_size = 8
            st_min = 0xF5

            [client]
            p2_timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(
            config.addressing.to_addressing().unwrap(),
            Addressing::Mixed {
                source: 0xF1,
                target: 0x10,
                address_extension: 0x55,
                target_type: TargetType::Physical,
            }
        );
        assert_eq!(config.isotp.block_size, 8);
        assert_eq!(config.client.p2_timeout(), Duration::from_millis(250));
        assert_eq!(config.client.functional_timeout_ms, 1000);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(matches!(
            StackConfig::from_toml_str("[isotp]\nst_min = 0xFA\n"),
            Err(UdsError::Transport(_))
        ));
        assert!(matches!(
            StackConfig::from_toml_str("[client]\np2_timeout_ms = 0\n"),
            Err(UdsError::Config(_))
        ));
        assert!(matches!(
            StackConfig::from_toml_str("[addressing]\nmode = \"bogus\"\n"),
            Err(UdsError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = StackConfig::load("/nonexistent/candiag.toml").unwrap_err();
        assert!(matches!(err, UdsError::Config(msg) if msg.contains("candiag.toml")));
    }
}
