//! Reassembly state machine
//!
//! [`RxSession`] consumes frames one at a time and reports what the caller
//! has to do next. It never performs I/O; sending flow control is left to
//! the transport.

use candiag_core::Frame;
use tracing::{debug, warn};

use crate::addressing::Addressing;
use crate::codec::{FlowControl, PciType, CAN_FRAME_LEN};
use crate::error::IsoTpError;

/// Outcome of feeding one frame to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RxEvent {
    /// A message was fully reassembled
    Complete(Vec<u8>),
    /// A first frame started a segmented message; answer with flow control
    FirstFrame { total_len: usize },
    /// A block of consecutive frames ended; answer with flow control again
    BlockComplete,
    /// More consecutive frames are expected
    InProgress,
    /// A flow control frame arrived; nothing in this session is sending
    FlowControl(FlowControl),
    /// Frame carried no PCI after addressing was removed, or was addressed
    /// to another node
    Ignored,
}

/// Reassembly state for one sender
#[derive(Debug, Clone)]
pub struct RxSession {
    address_byte: Option<u8>,
    sf_limit: usize,
    ff_len: usize,
    cf_len: usize,
    block_size: u8,
    buffer: Vec<u8>,
    expected: usize,
    next_sequence: u8,
    block_count: u8,
}

impl RxSession {
    pub fn new(addressing: &Addressing) -> Self {
        Self {
            address_byte: addressing.rx_address_byte(),
            sf_limit: addressing.sf_data_len_limit(),
            ff_len: addressing.ff_data_len(),
            cf_len: addressing.cf_data_len(),
            block_size: 0,
            buffer: Vec::new(),
            expected: 0,
            next_sequence: 0,
            block_count: 0,
        }
    }

    /// Block size advertised to the sender; a new flow control is due every
    /// `block_size` consecutive frames (0 = never)
    pub fn set_block_size(&mut self, block_size: u8) {
        self.block_size = block_size;
    }

    /// Whether a segmented message is partially received
    pub fn in_progress(&self) -> bool {
        self.expected > 0
    }

    /// Bytes received so far of the current segmented message
    pub fn received(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial message
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.expected = 0;
        self.next_sequence = 0;
        self.block_count = 0;
    }

    /// Feed one frame; any error resets the session
    pub fn on_frame(&mut self, frame: &Frame) -> Result<RxEvent, IsoTpError> {
        let result = self.handle(frame);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn handle(&mut self, frame: &Frame) -> Result<RxEvent, IsoTpError> {
        let data = frame.data();
        let body = match self.address_byte {
            Some(expected) => match data.split_first() {
                Some((&byte, rest)) if byte == expected => rest,
                _ => return Ok(RxEvent::Ignored),
            },
            None => data,
        };
        let Some(&pci) = body.first() else {
            return Ok(RxEvent::Ignored);
        };
        // Frames shorter than a full CAN frame carry no padding
        let unpadded = data.len() < CAN_FRAME_LEN;

        match PciType::of(pci)? {
            PciType::Single => {
                let len = (pci & 0x0F) as usize;
                if len == 0 || len > self.sf_limit {
                    return Err(IsoTpError::InvalidSingleFrameLength {
                        len,
                        limit: self.sf_limit,
                    });
                }
                if body.len() < 1 + len {
                    return Err(IsoTpError::TruncatedFrame(data.len()));
                }
                if self.in_progress() {
                    warn!(
                        received = self.buffer.len(),
                        expected = self.expected,
                        "Single frame interrupted segmented message"
                    );
                }
                self.reset();
                Ok(RxEvent::Complete(body[1..=len].to_vec()))
            }
            PciType::First => {
                if body.len() < 2 {
                    return Err(IsoTpError::TruncatedFrame(data.len()));
                }
                let total_len = (((pci & 0x0F) as usize) << 8) | body[1] as usize;
                if total_len <= self.sf_limit {
                    return Err(IsoTpError::InvalidFirstFrameLength(total_len));
                }
                let first = &body[2..];
                if first.len() < self.ff_len {
                    return Err(IsoTpError::TruncatedFrame(data.len()));
                }

                self.reset();
                self.expected = total_len;
                self.buffer.reserve(total_len);
                self.buffer.extend_from_slice(&first[..self.ff_len]);
                self.next_sequence = 1;
                debug!(
                    id = format!("0x{:X}", frame.id()),
                    total_len, "ISO-TP first frame"
                );
                Ok(RxEvent::FirstFrame { total_len })
            }
            PciType::Consecutive => {
                if !self.in_progress() {
                    return Err(IsoTpError::ConsecutiveBeforeFirst);
                }
                let sequence = pci & 0x0F;
                if sequence != self.next_sequence {
                    return Err(IsoTpError::SequenceMismatch {
                        expected: self.next_sequence,
                        actual: sequence,
                    });
                }

                let chunk = &body[1..];
                let remaining = self.expected - self.buffer.len();
                if unpadded && chunk.len() > remaining {
                    return Err(IsoTpError::LengthMismatch {
                        expected: self.expected,
                        received: self.buffer.len() + chunk.len(),
                    });
                }
                let take = chunk.len().min(remaining);
                if take < remaining && take < self.cf_len {
                    return Err(IsoTpError::TruncatedFrame(data.len()));
                }
                self.buffer.extend_from_slice(&chunk[..take]);

                if self.buffer.len() == self.expected {
                    let payload = std::mem::take(&mut self.buffer);
                    self.reset();
                    return Ok(RxEvent::Complete(payload));
                }

                self.next_sequence = (self.next_sequence + 1) & 0x0F;
                if self.block_size > 0 {
                    self.block_count += 1;
                    if self.block_count == self.block_size {
                        self.block_count = 0;
                        return Ok(RxEvent::BlockComplete);
                    }
                }
                Ok(RxEvent::InProgress)
            }
            PciType::FlowControl => Ok(RxEvent::FlowControl(FlowControl::parse(body)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::generate_frames;
    use crate::config::IsoTpConfig;
    use pretty_assertions::assert_eq;

    fn addressing() -> Addressing {
        Addressing::normal(0x7E0, 0x7E8)
    }

    fn feed(session: &mut RxSession, frames: &[Frame]) -> Option<Vec<u8>> {
        for frame in frames {
            if let RxEvent::Complete(payload) = session.on_frame(frame).unwrap() {
                return Some(payload);
            }
        }
        None
    }

    #[test]
    fn test_single_frame_roundtrip() {
        let mut session = RxSession::new(&addressing());
        for len in 1..=7 {
            let payload: Vec<u8> = (0..len).collect();
            let frames = generate_frames(&addressing(), &IsoTpConfig::default(), &payload).unwrap();
            assert_eq!(frames.len(), 1);
            assert_eq!(feed(&mut session, &frames), Some(payload));
        }
    }

    #[test]
    fn test_multi_frame_roundtrip() {
        let payload: Vec<u8> = (0..100).collect();
        let frames = generate_frames(&addressing(), &IsoTpConfig::default(), &payload).unwrap();

        let mut session = RxSession::new(&addressing());
        assert_eq!(
            session.on_frame(&frames[0]).unwrap(),
            RxEvent::FirstFrame { total_len: 100 }
        );
        assert_eq!(feed(&mut session, &frames[1..]), Some(payload));
        assert!(!session.in_progress());
    }

    #[test]
    fn test_block_complete_every_block_size() {
        let payload: Vec<u8> = (0..40).collect();
        let frames = generate_frames(&addressing(), &IsoTpConfig::default(), &payload).unwrap();
        // 6 + 5 * 7 = 41 bytes of capacity: five consecutive frames
        assert_eq!(frames.len(), 6);

        let mut session = RxSession::new(&addressing());
        session.set_block_size(2);
        let events: Vec<RxEvent> = frames
            .iter()
            .map(|f| session.on_frame(f).unwrap())
            .collect();
        assert_eq!(events[1], RxEvent::InProgress);
        assert_eq!(events[2], RxEvent::BlockComplete);
        assert_eq!(events[3], RxEvent::InProgress);
        assert_eq!(events[4], RxEvent::BlockComplete);
        assert_eq!(events[5], RxEvent::Complete(payload));
    }

    #[test]
    fn test_sequence_mismatch_discards_message() {
        let payload: Vec<u8> = (0..30).collect();
        let frames = generate_frames(&addressing(), &IsoTpConfig::default(), &payload).unwrap();

        let mut session = RxSession::new(&addressing());
        session.on_frame(&frames[0]).unwrap();
        session.on_frame(&frames[1]).unwrap();
        assert_eq!(
            session.on_frame(&frames[3]),
            Err(IsoTpError::SequenceMismatch {
                expected: 2,
                actual: 3
            })
        );
        assert!(!session.in_progress());
        assert_eq!(
            session.on_frame(&frames[2]),
            Err(IsoTpError::ConsecutiveBeforeFirst)
        );
    }

    #[test]
    fn test_consecutive_before_first() {
        let mut session = RxSession::new(&addressing());
        let cf = Frame::new(0x7E8, &[0x21, 1, 2, 3]).unwrap();
        assert_eq!(session.on_frame(&cf), Err(IsoTpError::ConsecutiveBeforeFirst));
    }

    #[test]
    fn test_invalid_frames() {
        let mut session = RxSession::new(&addressing());

        let sf_zero = Frame::new(0x7E8, &[0x00, 1, 2]).unwrap();
        assert!(matches!(
            session.on_frame(&sf_zero),
            Err(IsoTpError::InvalidSingleFrameLength { len: 0, limit: 7 })
        ));

        let sf_short = Frame::new(0x7E8, &[0x05, 1, 2]).unwrap();
        assert_eq!(session.on_frame(&sf_short), Err(IsoTpError::TruncatedFrame(3)));

        let bad_pci = Frame::new(0x7E8, &[0x45, 1, 2]).unwrap();
        assert_eq!(session.on_frame(&bad_pci), Err(IsoTpError::InvalidPci(4)));

        let ff_small = Frame::new(0x7E8, &[0x10, 0x05, 1, 2, 3, 4, 5, 0]).unwrap();
        assert_eq!(
            session.on_frame(&ff_small),
            Err(IsoTpError::InvalidFirstFrameLength(5))
        );
    }

    #[test]
    fn test_length_mismatch_on_overlong_unpadded_frame() {
        let mut session = RxSession::new(&addressing());
        let ff = Frame::new(0x7E8, &[0x10, 0x09, 1, 2, 3, 4, 5, 6]).unwrap();
        session.on_frame(&ff).unwrap();

        let cf = Frame::new(0x7E8, &[0x21, 7, 8, 9, 10]).unwrap();
        assert_eq!(
            session.on_frame(&cf),
            Err(IsoTpError::LengthMismatch {
                expected: 9,
                received: 10
            })
        );
    }

    #[test]
    fn test_padding_in_full_frames_is_ignored() {
        let mut session = RxSession::new(&addressing());
        let ff = Frame::new(0x7E8, &[0x10, 0x09, 1, 2, 3, 4, 5, 6]).unwrap();
        session.on_frame(&ff).unwrap();

        let cf = Frame::new(0x7E8, &[0x21, 7, 8, 9, 0xCC, 0xCC, 0xCC, 0xCC]).unwrap();
        assert_eq!(
            session.on_frame(&cf).unwrap(),
            RxEvent::Complete(vec![1, 2, 3, 4, 5, 6, 7, 8, 9])
        );
    }

    #[test]
    fn test_flow_control_reported() {
        let mut session = RxSession::new(&addressing());
        let fc = Frame::new(0x7E8, &[0x30, 0x00, 0x05, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC]).unwrap();
        assert_eq!(
            session.on_frame(&fc).unwrap(),
            RxEvent::FlowControl(FlowControl::continue_to_send(0, 5))
        );
    }

    #[test]
    fn test_address_byte_stripped() {
        let mixed = Addressing::Mixed {
            source: 0xF1,
            target: 0x10,
            address_extension: 0x42,
            target_type: Default::default(),
        };
        let payload: Vec<u8> = (0..20).collect();
        let frames = generate_frames(&mixed, &IsoTpConfig::default(), &payload).unwrap();

        let mut session = RxSession::new(&mixed);
        assert_eq!(feed(&mut session, &frames), Some(payload));
    }

    #[test]
    fn test_foreign_address_byte_ignored() {
        let ext = Addressing::Extended {
            tx_id: 0x6F1,
            rx_id: 0x610,
            target: 0x10,
            source: 0xF1,
        };
        let mut session = RxSession::new(&ext);

        let foreign = Frame::new(0x610, &[0xF2, 0x02, 0x50, 0x03]).unwrap();
        assert_eq!(session.on_frame(&foreign).unwrap(), RxEvent::Ignored);

        let own = Frame::new(0x610, &[0xF1, 0x02, 0x50, 0x03]).unwrap();
        assert_eq!(
            session.on_frame(&own).unwrap(),
            RxEvent::Complete(vec![0x50, 0x03])
        );
    }
}
