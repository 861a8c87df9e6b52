//! candiag-uds - UDS (ISO 14229) over ISO-TP
//!
//! Every service in the catalog is a pair of plain records: a request that
//! encodes to bytes and a response decoded from them. [`UdsClient`] pairs
//! the two over an [`candiag_isotp::IsoTpTransport`].
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │                UdsClient                  │
//! │  request / request_functional / pending   │
//! │                    │                      │
//! │   services::{Request, Response} records   │
//! │                    │                      │
//! │             IsoTpTransport                │
//! └───────────────────────────────────────────┘
//! ```

pub mod any;
pub mod client;
pub mod config;
pub mod dtc;
pub mod error;
pub mod nrc;
pub mod obd;
pub mod services;

pub use any::{decode_request, decode_response, AnyRequest, AnyResponse};
pub use client::UdsClient;
pub use config::{StackConfig, UdsClientConfig};
pub use dtc::{Dtc, DtcCategory, DtcReport, DtcStatus};
pub use error::UdsError;
pub use nrc::NegativeResponseCode;
pub use obd::ObdClient;
pub use services::{MemoryLocation, Request, Response};
