//! ISO-TP addressing modes
//!
//! The addressing mode decides the arbitration IDs used on the bus and
//! whether an address byte precedes the PCI in every frame.

use candiag_core::frame::MAX_STANDARD_ID;
use candiag_core::{Frame, FrameError};
use serde::{Deserialize, Serialize};

use crate::filter::RxFilter;

/// Priority bits used by the 29-bit fixed addressing formats
const FIXED_PRIORITY: u32 = 6;

const PF_NORMAL_FIXED_PHYSICAL: u8 = 0xDA;
const PF_NORMAL_FIXED_FUNCTIONAL: u8 = 0xDB;
const PF_MIXED_PHYSICAL: u8 = 0xCE;
const PF_MIXED_FUNCTIONAL: u8 = 0xCD;

/// Matches priority, PF and target address of a 29-bit fixed ID
const FIXED_RESPONSE_MASK: u32 = 0x1FFF_FF00;

/// OBD/UDS 11-bit response range 0x7E8..=0x7EF
const LEGACY_RESPONSE_BASE: u32 = 0x7E8;
const LEGACY_RESPONSE_MASK: u32 = 0x7F8;
const LEGACY_REQUEST_OFFSET: u32 = 8;

/// Physical (one ECU) or functional (broadcast) target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[default]
    Physical,
    Functional,
}

/// ISO 15765-2 addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Caller supplied IDs, no address byte
    Normal {
        tx_id: u32,
        rx_id: u32,
        target_type: TargetType,
    },
    /// 29-bit IDs built from source and target addresses
    NormalFixed {
        source: u8,
        target: u8,
        target_type: TargetType,
    },
    /// 11-bit IDs, target address as first data byte
    ///
    /// Incoming frames must carry `source` as their first byte.
    Extended {
        tx_id: u32,
        rx_id: u32,
        target: u8,
        source: u8,
    },
    /// 29-bit IDs, address extension as first data byte
    Mixed {
        source: u8,
        target: u8,
        address_extension: u8,
        target_type: TargetType,
    },
}

impl Addressing {
    /// Physical normal addressing with the given IDs
    pub fn normal(tx_id: u32, rx_id: u32) -> Self {
        Self::Normal {
            tx_id,
            rx_id,
            target_type: TargetType::Physical,
        }
    }

    /// Functional normal addressing, e.g. 0x7DF / 0x7E8
    pub fn normal_functional(tx_id: u32, rx_id: u32) -> Self {
        Self::Normal {
            tx_id,
            rx_id,
            target_type: TargetType::Functional,
        }
    }

    pub fn target_type(&self) -> TargetType {
        match *self {
            Self::Normal { target_type, .. }
            | Self::NormalFixed { target_type, .. }
            | Self::Mixed { target_type, .. } => target_type,
            Self::Extended { .. } => TargetType::Physical,
        }
    }

    pub fn is_functional(&self) -> bool {
        self.target_type() == TargetType::Functional
    }

    /// Arbitration ID of outgoing frames
    pub fn tx_id(&self) -> u32 {
        match *self {
            Self::Normal { tx_id, .. } | Self::Extended { tx_id, .. } => tx_id,
            Self::NormalFixed {
                source,
                target,
                target_type,
            } => fixed_id(pf_normal_fixed(target_type), target, source),
            Self::Mixed {
                source,
                target,
                target_type,
                ..
            } => fixed_id(pf_mixed(target_type), target, source),
        }
    }

    /// Arbitration ID of incoming frames
    ///
    /// The fixed formats swap source and target and always answer with the
    /// physical PF.
    pub fn rx_id(&self) -> u32 {
        match *self {
            Self::Normal { rx_id, .. } | Self::Extended { rx_id, .. } => rx_id,
            Self::NormalFixed { source, target, .. } => {
                fixed_id(PF_NORMAL_FIXED_PHYSICAL, source, target)
            }
            Self::Mixed { source, target, .. } => fixed_id(PF_MIXED_PHYSICAL, source, target),
        }
    }

    /// Whether frames use 29-bit identifiers
    pub fn uses_extended_id(&self) -> bool {
        match *self {
            Self::NormalFixed { .. } | Self::Mixed { .. } => true,
            Self::Normal { tx_id, rx_id, .. } | Self::Extended { tx_id, rx_id, .. } => {
                tx_id > MAX_STANDARD_ID || rx_id > MAX_STANDARD_ID
            }
        }
    }

    /// Address byte placed before the PCI, if any
    pub fn address_byte(&self) -> Option<u8> {
        match *self {
            Self::Extended { target, .. } => Some(target),
            Self::Mixed {
                address_extension, ..
            } => Some(address_extension),
            _ => None,
        }
    }

    /// Address byte incoming frames must start with, if any
    ///
    /// Extended replies are addressed to our source; mixed addressing uses
    /// the same extension both ways.
    pub fn rx_address_byte(&self) -> Option<u8> {
        match *self {
            Self::Extended { source, .. } => Some(source),
            Self::Mixed {
                address_extension, ..
            } => Some(address_extension),
            _ => None,
        }
    }

    pub fn has_address_byte(&self) -> bool {
        self.address_byte().is_some()
    }

    /// Largest payload that fits a single frame
    pub fn sf_data_len_limit(&self) -> usize {
        if self.has_address_byte() {
            6
        } else {
            7
        }
    }

    /// Payload bytes carried by a first frame
    pub fn ff_data_len(&self) -> usize {
        self.sf_data_len_limit() - 1
    }

    /// Payload bytes carried by a full consecutive frame
    pub fn cf_data_len(&self) -> usize {
        self.sf_data_len_limit()
    }

    /// ID to send flow control to when a segmented message arrives from `source_id`
    pub fn flow_control_id(&self, source_id: u32) -> u32 {
        match *self {
            Self::Normal {
                tx_id, target_type, ..
            } => {
                if target_type == TargetType::Functional
                    && source_id & LEGACY_RESPONSE_MASK == LEGACY_RESPONSE_BASE
                {
                    source_id - LEGACY_REQUEST_OFFSET
                } else {
                    tx_id
                }
            }
            Self::Extended { tx_id, .. } => tx_id,
            Self::NormalFixed { .. } => swap_fixed(PF_NORMAL_FIXED_PHYSICAL, source_id),
            Self::Mixed { .. } => swap_fixed(PF_MIXED_PHYSICAL, source_id),
        }
    }

    /// Receive filter matching the responses this addressing expects
    ///
    /// Functional fixed addressing accepts any responder talking to our
    /// source address.
    pub fn default_filter(&self) -> RxFilter {
        let rx_id = self.rx_id();
        match *self {
            Self::NormalFixed {
                target_type: TargetType::Functional,
                ..
            }
            | Self::Mixed {
                target_type: TargetType::Functional,
                ..
            } => RxFilter::Mask {
                id: rx_id,
                mask: FIXED_RESPONSE_MASK,
            },
            Self::Normal {
                target_type: TargetType::Functional,
                ..
            } if rx_id & LEGACY_RESPONSE_MASK == LEGACY_RESPONSE_BASE => RxFilter::Mask {
                id: rx_id,
                mask: LEGACY_RESPONSE_MASK,
            },
            _ => RxFilter::Exact(rx_id),
        }
    }

    /// Build a frame to `id` carrying the address byte followed by `body`
    pub fn frame_to(&self, id: u32, body: &[u8]) -> Result<Frame, FrameError> {
        let mut data = Vec::with_capacity(8);
        if let Some(byte) = self.address_byte() {
            data.push(byte);
        }
        data.extend_from_slice(body);
        if self.uses_extended_id() {
            Frame::new_extended(id, &data)
        } else {
            Frame::new(id, &data)
        }
    }

    /// Build an outgoing frame to the transmit ID
    pub fn frame(&self, body: &[u8]) -> Result<Frame, FrameError> {
        self.frame_to(self.tx_id(), body)
    }

    /// Frame data with the address byte removed
    ///
    /// `None` for empty frames and frames carrying another node's address byte.
    pub fn strip<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        if let Some(expected) = self.rx_address_byte() {
            match data.split_first() {
                Some((&byte, rest)) if byte == expected && !rest.is_empty() => Some(rest),
                _ => None,
            }
        } else if data.is_empty() {
            None
        } else {
            Some(data)
        }
    }
}

fn pf_normal_fixed(target_type: TargetType) -> u8 {
    match target_type {
        TargetType::Physical => PF_NORMAL_FIXED_PHYSICAL,
        TargetType::Functional => PF_NORMAL_FIXED_FUNCTIONAL,
    }
}

fn pf_mixed(target_type: TargetType) -> u8 {
    match target_type {
        TargetType::Physical => PF_MIXED_PHYSICAL,
        TargetType::Functional => PF_MIXED_FUNCTIONAL,
    }
}

/// `priority << 26 | PF << 16 | TA << 8 | SA`; reserved and data page bits are 0
fn fixed_id(pf: u8, target: u8, source: u8) -> u32 {
    (FIXED_PRIORITY << 26) | ((pf as u32) << 16) | ((target as u32) << 8) | source as u32
}

/// Reply ID for a fixed-format frame: swap TA and SA
fn swap_fixed(pf: u8, id: u32) -> u32 {
    let sa = (id & 0xFF) as u8;
    let ta = ((id >> 8) & 0xFF) as u8;
    fixed_id(pf, sa, ta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normal_fixed_ids() {
        let physical = Addressing::NormalFixed {
            source: 0xF1,
            target: 0x10,
            target_type: TargetType::Physical,
        };
        assert_eq!(physical.tx_id(), 0x18DA_10F1);
        assert_eq!(physical.rx_id(), 0x18DA_F110);
        assert!(physical.uses_extended_id());
        assert_eq!(physical.sf_data_len_limit(), 7);

        let functional = Addressing::NormalFixed {
            source: 0xF1,
            target: 0x33,
            target_type: TargetType::Functional,
        };
        assert_eq!(functional.tx_id(), 0x18DB_33F1);
        assert_eq!(functional.rx_id(), 0x18DA_F133);
        assert_eq!(functional.flow_control_id(0x18DA_F110), 0x18DA_10F1);
        assert!(functional.default_filter().matches_id(0x18DA_F110));
        assert!(functional.default_filter().matches_id(0x18DA_F122));
        assert!(!functional.default_filter().matches_id(0x18DB_33F1));
    }

    #[test]
    fn test_mixed_ids() {
        let mixed = Addressing::Mixed {
            source: 0xF1,
            target: 0x10,
            address_extension: 0x42,
            target_type: TargetType::Physical,
        };
        assert_eq!(mixed.tx_id(), 0x18CE_10F1);
        assert_eq!(mixed.rx_id(), 0x18CE_F110);
        assert_eq!(mixed.sf_data_len_limit(), 6);
        assert_eq!(mixed.ff_data_len(), 5);

        let frame = mixed.frame(&[0x02, 0x10, 0x03]).unwrap();
        assert!(frame.is_extended());
        assert_eq!(frame.data(), &[0x42, 0x02, 0x10, 0x03]);
        assert_eq!(mixed.strip(&[0x42, 0x02, 0x50, 0x03]), Some(&[0x02, 0x50, 0x03][..]));
        assert_eq!(mixed.strip(&[0x43, 0x02, 0x50, 0x03]), None);

        let functional = Addressing::Mixed {
            source: 0xF1,
            target: 0x33,
            address_extension: 0x42,
            target_type: TargetType::Functional,
        };
        assert_eq!(functional.tx_id(), 0x18CD_33F1);
    }

    #[test]
    fn test_extended_strips_address_byte() {
        let ext = Addressing::Extended {
            tx_id: 0x6F1,
            rx_id: 0x610,
            target: 0x10,
            source: 0xF1,
        };
        assert!(!ext.uses_extended_id());
        assert_eq!(ext.strip(&[0xF1, 0x02, 0x50, 0x03]), Some(&[0x02, 0x50, 0x03][..]));
        assert_eq!(ext.strip(&[0xF1]), None);
        // Reply addressed to another tester on the same ID
        assert_eq!(ext.strip(&[0xF2, 0x02, 0x50, 0x03]), None);

        let frame = ext.frame(&[0x01, 0x3E]).unwrap();
        assert_eq!(frame.id(), 0x6F1);
        assert_eq!(frame.data(), &[0x10, 0x01, 0x3E]);
    }

    #[test]
    fn test_normal_functional_flow_control_id() {
        let obd = Addressing::normal_functional(0x7DF, 0x7E8);
        assert_eq!(obd.flow_control_id(0x7E8), 0x7E0);
        assert_eq!(obd.flow_control_id(0x7E9), 0x7E1);
        assert_eq!(obd.flow_control_id(0x123), 0x7DF);
        assert!(obd.default_filter().matches_id(0x7EA));
        assert!(!obd.default_filter().matches_id(0x7DF));

        let physical = Addressing::normal(0x7E0, 0x7E8);
        assert_eq!(physical.flow_control_id(0x7E8), 0x7E0);
        assert_eq!(physical.default_filter(), RxFilter::Exact(0x7E8));
    }
}
