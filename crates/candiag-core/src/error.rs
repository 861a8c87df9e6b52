//! Error types for frames, devices and the dispatcher

use thiserror::Error;

/// Frame validation errors
///
/// Raised synchronously by every constructor and setter of
/// [`Frame`](crate::Frame); malformed values are never clamped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Arbitration ID 0x{id:X} out of range for {kind} frame", kind = id_kind(.extended))]
    IdOutOfRange { id: u32, extended: bool },

    #[error("CAN data cannot contain more than 8 bytes (got {0})")]
    DataTooLong(usize),

    #[error("CAN data must consist of bytes: value {value} at index {index}")]
    InvalidByte { index: usize, value: i64 },

    #[error("Invalid frame type: {0}")]
    InvalidFrameType(u8),
}

fn id_kind(extended: &bool) -> &'static str {
    if *extended {
        "extended"
    } else {
        "standard"
    }
}

/// Device I/O errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Device not started")]
    NotStarted,

    #[error("Device disconnected")]
    Disconnected,

    #[error("Device I/O error: {0}")]
    Io(String),
}

/// Dispatcher usage and runtime errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatcherError {
    #[error("Dispatcher already running")]
    AlreadyRunning,

    #[error("Dispatcher not running")]
    NotRunning,

    #[error("Receive queue already registered with dispatcher")]
    DuplicateReceiver,

    #[error("Receive queue not registered with dispatcher")]
    UnknownReceiver,

    #[error("Dispatcher send queue closed")]
    QueueClosed,

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}
