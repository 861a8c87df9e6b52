//! ISO-TP configuration
//!
//! CAN IDs are written as strings ("0x7E0" or "2016") and parsed when the
//! configuration is turned into an [`Addressing`].

use std::time::Duration;

use candiag_core::frame::{MAX_EXTENDED_ID, MAX_STANDARD_ID};
use serde::{Deserialize, Serialize};

use crate::addressing::{Addressing, TargetType};
use crate::codec::decode_st_min;
use crate::error::IsoTpError;

/// Transport options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsoTpConfig {
    /// Byte used to pad single and flow control frames to 8 bytes
    #[serde(default = "default_padding")]
    pub tx_padding: u8,
    /// Pad consecutive frames to 8 bytes as well
    #[serde(default)]
    pub pad_consecutive_frames: bool,
    /// Block size advertised in our flow control frames (0 = unlimited)
    #[serde(default)]
    pub block_size: u8,
    /// Raw ST_min code advertised in our flow control frames
    #[serde(default)]
    pub st_min: u8,
    /// How long a sender waits for flow control (milliseconds)
    #[serde(default = "default_fc_timeout_ms")]
    pub fc_timeout_ms: u64,
    /// Ask the device to filter on the receive ID
    #[serde(default)]
    pub hardware_filter: bool,
}

fn default_padding() -> u8 {
    0xCC
}

fn default_fc_timeout_ms() -> u64 {
    1000
}

impl Default for IsoTpConfig {
    fn default() -> Self {
        Self {
            tx_padding: default_padding(),
            pad_consecutive_frames: false,
            block_size: 0,
            st_min: 0,
            fc_timeout_ms: default_fc_timeout_ms(),
            hardware_filter: false,
        }
    }
}

impl IsoTpConfig {
    pub fn fc_timeout(&self) -> Duration {
        Duration::from_millis(self.fc_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), IsoTpError> {
        decode_st_min(self.st_min)
            .map_err(|_| IsoTpError::InvalidConfig(format!("invalid st_min 0x{:02X}", self.st_min)))?;
        if self.fc_timeout_ms == 0 {
            return Err(IsoTpError::InvalidConfig(
                "fc_timeout_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Addressing as written in configuration files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AddressingConfig {
    Normal {
        tx_id: String,
        rx_id: String,
        #[serde(default)]
        target_type: TargetType,
    },
    NormalFixed {
        source: u8,
        target: u8,
        #[serde(default)]
        target_type: TargetType,
    },
    Extended {
        tx_id: String,
        rx_id: String,
        target: u8,
        source: u8,
    },
    Mixed {
        source: u8,
        target: u8,
        address_extension: u8,
        #[serde(default)]
        target_type: TargetType,
    },
}

impl Default for AddressingConfig {
    fn default() -> Self {
        Self::Normal {
            tx_id: "0x7E0".to_string(),
            rx_id: "0x7E8".to_string(),
            target_type: TargetType::Physical,
        }
    }
}

impl AddressingConfig {
    pub fn to_addressing(&self) -> Result<Addressing, IsoTpError> {
        let addressing = match self {
            Self::Normal {
                tx_id,
                rx_id,
                target_type,
            } => Addressing::Normal {
                tx_id: parse_can_id(tx_id, MAX_EXTENDED_ID)?,
                rx_id: parse_can_id(rx_id, MAX_EXTENDED_ID)?,
                target_type: *target_type,
            },
            Self::NormalFixed {
                source,
                target,
                target_type,
            } => Addressing::NormalFixed {
                source: *source,
                target: *target,
                target_type: *target_type,
            },
            Self::Extended {
                tx_id,
                rx_id,
                target,
                source,
            } => Addressing::Extended {
                tx_id: parse_can_id(tx_id, MAX_STANDARD_ID)?,
                rx_id: parse_can_id(rx_id, MAX_STANDARD_ID)?,
                target: *target,
                source: *source,
            },
            Self::Mixed {
                source,
                target,
                address_extension,
                target_type,
            } => Addressing::Mixed {
                source: *source,
                target: *target,
                address_extension: *address_extension,
                target_type: *target_type,
            },
        };
        Ok(addressing)
    }
}

/// Parse a CAN ID from hex ("0x7E0") or decimal ("2016")
pub fn parse_can_id(s: &str, max: u32) -> Result<u32, IsoTpError> {
    let s = s.trim();
    let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };

    let id = u32::from_str_radix(digits, radix)
        .map_err(|e| IsoTpError::InvalidConfig(format!("Invalid CAN ID '{}': {}", s, e)))?;
    if id > max {
        return Err(IsoTpError::InvalidConfig(format!(
            "CAN ID '{}' exceeds 0x{:X}",
            s, max
        )));
    }
    Ok(id)
}
