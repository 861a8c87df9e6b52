//! PCI codec and frame segmentation
//!
//! Everything here is synchronous and device-free: the transport uses it to
//! build and parse frames, and tests can drive it directly.

use std::time::Duration;

use candiag_core::Frame;

use crate::addressing::Addressing;
use crate::config::IsoTpConfig;
use crate::error::IsoTpError;

/// 12-bit first frame length ceiling
pub const MAX_PAYLOAD_LEN: usize = 4095;

/// Classic CAN frame size used for padding
pub const CAN_FRAME_LEN: usize = 8;

/// Frame role from the high nibble of the PCI byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PciType {
    Single = 0,
    First = 1,
    Consecutive = 2,
    FlowControl = 3,
}

impl PciType {
    pub fn of(pci: u8) -> Result<Self, IsoTpError> {
        match pci >> 4 {
            0 => Ok(Self::Single),
            1 => Ok(Self::First),
            2 => Ok(Self::Consecutive),
            3 => Ok(Self::FlowControl),
            other => Err(IsoTpError::InvalidPci(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStatus {
    ContinueToSend = 0,
    Wait = 1,
    Overflow = 2,
}

impl TryFrom<u8> for FlowStatus {
    type Error = IsoTpError;

    fn try_from(value: u8) -> Result<Self, IsoTpError> {
        match value {
            0 => Ok(Self::ContinueToSend),
            1 => Ok(Self::Wait),
            2 => Ok(Self::Overflow),
            other => Err(IsoTpError::InvalidFlowStatus(other)),
        }
    }
}

/// Decoded flow control frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowControl {
    pub status: FlowStatus,
    pub block_size: u8,
    /// Raw ST_min code
    pub st_min: u8,
}

impl FlowControl {
    pub fn continue_to_send(block_size: u8, st_min: u8) -> Self {
        Self {
            status: FlowStatus::ContinueToSend,
            block_size,
            st_min,
        }
    }

    /// Parse a flow control PCI (address byte already removed)
    pub fn parse(body: &[u8]) -> Result<Self, IsoTpError> {
        if body.len() < 3 {
            return Err(IsoTpError::TruncatedFrame(body.len()));
        }
        Ok(Self {
            status: FlowStatus::try_from(body[0] & 0x0F)?,
            block_size: body[1],
            st_min: body[2],
        })
    }

    pub fn encode(&self) -> [u8; 3] {
        [0x30 | self.status as u8, self.block_size, self.st_min]
    }

    pub fn separation_time(&self) -> Result<Duration, IsoTpError> {
        decode_st_min(self.st_min)
    }
}

/// Decode an ST_min code into a delay
///
/// 0x00-0x7F are milliseconds, 0xF1-0xF9 are 100-900 microseconds.
pub fn decode_st_min(code: u8) -> Result<Duration, IsoTpError> {
    match code {
        0x00..=0x7F => Ok(Duration::from_millis(code as u64)),
        0xF1..=0xF9 => Ok(Duration::from_micros((code - 0xF0) as u64 * 100)),
        other => Err(IsoTpError::InvalidSeparationTime(other)),
    }
}

/// Bytes available after the address byte in one classic frame
fn body_len(addressing: &Addressing) -> usize {
    if addressing.has_address_byte() {
        CAN_FRAME_LEN - 1
    } else {
        CAN_FRAME_LEN
    }
}

fn pad(body: &mut Vec<u8>, len: usize, byte: u8) {
    if body.len() < len {
        body.resize(len, byte);
    }
}

/// Encode a flow control frame body, padded to a full frame
pub fn flow_control_body(addressing: &Addressing, config: &IsoTpConfig, fc: FlowControl) -> Vec<u8> {
    let mut body = fc.encode().to_vec();
    pad(&mut body, body_len(addressing), config.tx_padding);
    body
}

/// Check a payload can be sent with this addressing
pub fn check_payload(addressing: &Addressing, payload: &[u8]) -> Result<(), IsoTpError> {
    if payload.is_empty() {
        return Err(IsoTpError::EmptyPayload);
    }
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(IsoTpError::PayloadTooLarge(payload.len()));
    }
    if payload.len() > addressing.sf_data_len_limit() && addressing.is_functional() {
        return Err(IsoTpError::FunctionalSegmentation(payload.len()));
    }
    Ok(())
}

/// Split a payload into the frames that carry it
///
/// A payload that fits yields one padded single frame; otherwise a first
/// frame followed by consecutive frames with sequence numbers 1..15, 0, 1...
pub fn generate_frames(
    addressing: &Addressing,
    config: &IsoTpConfig,
    payload: &[u8],
) -> Result<Vec<Frame>, IsoTpError> {
    check_payload(addressing, payload)?;
    let full = body_len(addressing);

    if payload.len() <= addressing.sf_data_len_limit() {
        let mut body = Vec::with_capacity(full);
        body.push(payload.len() as u8);
        body.extend_from_slice(payload);
        pad(&mut body, full, config.tx_padding);
        return Ok(vec![addressing.frame(&body)?]);
    }

    let ff_len = addressing.ff_data_len();
    let cf_len = addressing.cf_data_len();
    let mut frames = Vec::with_capacity(1 + (payload.len() - ff_len).div_ceil(cf_len));

    let len = payload.len();
    let mut body = vec![0x10 | ((len >> 8) & 0x0F) as u8, (len & 0xFF) as u8];
    body.extend_from_slice(&payload[..ff_len]);
    frames.push(addressing.frame(&body)?);

    let mut sequence: u8 = 1;
    for chunk in payload[ff_len..].chunks(cf_len) {
        let mut body = Vec::with_capacity(full);
        body.push(0x20 | sequence);
        body.extend_from_slice(chunk);
        if config.pad_consecutive_frames {
            pad(&mut body, full, config.tx_padding);
        }
        frames.push(addressing.frame(&body)?);
        sequence = (sequence + 1) & 0x0F;
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::TargetType;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn normal() -> Addressing {
        Addressing::normal(0x123, 0x321)
    }

    #[test]
    fn test_single_frame() {
        let frames =
            generate_frames(&normal(), &IsoTpConfig::default(), &[1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data(), &[0x07, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_single_frame_padding() {
        let frames = generate_frames(&normal(), &IsoTpConfig::default(), &[0x3E, 0x00]).unwrap();
        assert_eq!(frames[0].data(), &[0x02, 0x3E, 0x00, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC]);
    }

    #[test]
    fn test_eight_bytes_needs_two_frames() {
        let frames =
            generate_frames(&normal(), &IsoTpConfig::default(), &[1, 2, 3, 4, 5, 6, 7, 8])
                .unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data(), &[0x10, 8, 1, 2, 3, 4, 5, 6]);
        assert_eq!(frames[1].data(), &[0x21, 7, 8]);
    }

    #[test]
    fn test_padded_consecutive_frames() {
        let config = IsoTpConfig {
            pad_consecutive_frames: true,
            tx_padding: 0xAA,
            ..Default::default()
        };
        let frames = generate_frames(&normal(), &config, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(frames[1].data(), &[0x21, 7, 8, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA]);
    }

    #[test]
    fn test_sequence_number_wraps() {
        // 6 bytes in the first frame plus 17 consecutive frames
        let payload: Vec<u8> = (0..(6 + 7 * 17) as u32).map(|i| i as u8).collect();
        let frames = generate_frames(&normal(), &IsoTpConfig::default(), &payload).unwrap();
        assert_eq!(frames.len(), 18);

        let sequence: Vec<u8> = frames[1..].iter().map(|f| f.data()[0] & 0x0F).collect();
        assert_eq!(
            sequence,
            vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 0, 1]
        );
    }

    #[test]
    fn test_address_byte_reduces_capacity() {
        let ext = Addressing::Extended {
            tx_id: 0x6F1,
            rx_id: 0x610,
            target: 0x10,
            source: 0xF1,
        };
        let frames = generate_frames(&ext, &IsoTpConfig::default(), &[1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data(), &[0x10, 0x10, 0x07, 1, 2, 3, 4, 5]);
        assert_eq!(frames[1].data(), &[0x10, 0x21, 6, 7]);
    }

    #[test]
    fn test_payload_limits() {
        let config = IsoTpConfig::default();
        assert_eq!(
            generate_frames(&normal(), &config, &[]),
            Err(IsoTpError::EmptyPayload)
        );
        assert_eq!(
            generate_frames(&normal(), &config, &vec![0; 4096]),
            Err(IsoTpError::PayloadTooLarge(4096))
        );
        assert_eq!(generate_frames(&normal(), &config, &vec![0; 4095]).unwrap()[0].data()[..2], [0x1F, 0xFF]);

        let functional = Addressing::NormalFixed {
            source: 0xF1,
            target: 0x33,
            target_type: TargetType::Functional,
        };
        assert_eq!(
            generate_frames(&functional, &config, &[0; 8]),
            Err(IsoTpError::FunctionalSegmentation(8))
        );
        assert_eq!(generate_frames(&functional, &config, &[0x3E, 0x80]).unwrap().len(), 1);
    }

    #[rstest]
    #[case(0x00, Duration::ZERO)]
    #[case(0x14, Duration::from_millis(20))]
    #[case(0x7F, Duration::from_millis(127))]
    #[case(0xF1, Duration::from_micros(100))]
    #[case(0xF9, Duration::from_micros(900))]
    fn test_decode_st_min(#[case] code: u8, #[case] expected: Duration) {
        assert_eq!(decode_st_min(code).unwrap(), expected);
    }

    #[rstest]
    #[case(0x80)]
    #[case(0xF0)]
    #[case(0xFA)]
    #[case(0xFF)]
    fn test_decode_st_min_reserved(#[case] code: u8) {
        assert_eq!(decode_st_min(code), Err(IsoTpError::InvalidSeparationTime(code)));
    }

    #[test]
    fn test_flow_control_parse() {
        let fc = FlowControl::parse(&[0x30, 0x08, 0x14, 0xCC]).unwrap();
        assert_eq!(fc, FlowControl::continue_to_send(8, 0x14));
        assert_eq!(
            FlowControl::parse(&[0x31, 0, 0]).unwrap().status,
            FlowStatus::Wait
        );
        assert_eq!(
            FlowControl::parse(&[0x35, 0, 0]),
            Err(IsoTpError::InvalidFlowStatus(5))
        );
        assert_eq!(FlowControl::parse(&[0x30]), Err(IsoTpError::TruncatedFrame(1)));
        assert_eq!(PciType::of(0x40), Err(IsoTpError::InvalidPci(4)));
    }
}
