//! ISO-TP protocol and transport errors

use candiag_core::{DispatcherError, FrameError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IsoTpError {
    #[error("Cannot send an empty ISO-TP message")]
    EmptyPayload,

    #[error("Payload of {0} bytes exceeds the 4095 byte ISO-TP limit")]
    PayloadTooLarge(usize),

    #[error("Functional addressing only supports single frame messages ({0} bytes given)")]
    FunctionalSegmentation(usize),

    #[error("Invalid PCI type: 0x{0:X}")]
    InvalidPci(u8),

    #[error("Invalid single frame length {len} (limit {limit})")]
    InvalidSingleFrameLength { len: usize, limit: usize },

    #[error("Invalid first frame length {0}")]
    InvalidFirstFrameLength(usize),

    #[error("Consecutive frame received before first frame")]
    ConsecutiveBeforeFirst,

    #[error("Invalid sequence number: expected {expected}, got {actual}")]
    SequenceMismatch { expected: u8, actual: u8 },

    #[error("Data length mismatch: expected {expected} bytes, received {received}")]
    LengthMismatch { expected: usize, received: usize },

    #[error("Truncated ISO-TP frame ({0} bytes)")]
    TruncatedFrame(usize),

    #[error("Invalid separation time code: 0x{0:02X}")]
    InvalidSeparationTime(u8),

    #[error("Invalid flow status: {0}")]
    InvalidFlowStatus(u8),

    #[error("Receiver reported overflow")]
    FlowControlOverflow,

    #[error("Timed out waiting for flow control")]
    FlowControlTimeout,

    #[error("Receive queue disconnected from dispatcher")]
    Disconnected,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Dispatcher error: {0}")]
    Dispatcher(#[from] DispatcherError),
}
