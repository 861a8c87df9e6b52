//! UDS protocol errors

use std::time::Duration;

use candiag_isotp::IsoTpError;
use thiserror::Error;

use crate::nrc::NegativeResponseCode;

/// Extended response timeout (P2*) announced by a response pending NRC
pub const RESPONSE_PENDING_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UdsError {
    #[error("Negative response: {nrc} (0x{nrc:02X}) for service 0x{service_id:02X}")]
    NegativeResponse {
        service_id: u8,
        nrc: NegativeResponseCode,
    },

    #[error("Response pending for service 0x{service_id:02X}, retry within {retry_timeout:?}")]
    ResponsePending {
        service_id: u8,
        retry_timeout: Duration,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unexpected response: expected 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedResponse { expected: u8, actual: u8 },

    #[error("Unknown service 0x{0:02X}")]
    UnknownService(u8),

    #[error("Response timeout")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(#[from] IsoTpError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl UdsError {
    /// Map a negative response to its error
    ///
    /// Response pending becomes the retryable [`UdsError::ResponsePending`].
    pub fn from_negative_response(service_id: u8, nrc: u8) -> Self {
        match NegativeResponseCode::from(nrc) {
            NegativeResponseCode::ResponsePending => Self::ResponsePending {
                service_id,
                retry_timeout: RESPONSE_PENDING_TIMEOUT,
            },
            nrc => Self::NegativeResponse { service_id, nrc },
        }
    }

    /// The NRC carried by this error, if it came from a negative response
    pub fn nrc(&self) -> Option<NegativeResponseCode> {
        match self {
            Self::NegativeResponse { nrc, .. } => Some(*nrc),
            Self::ResponsePending { .. } => Some(NegativeResponseCode::ResponsePending),
            _ => None,
        }
    }

    pub fn is_response_pending(&self) -> bool {
        matches!(self, Self::ResponsePending { .. })
    }
}
