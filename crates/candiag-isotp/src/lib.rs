//! candiag-isotp - ISO 15765-2 transport protocol
//!
//! Segments payloads of up to 4095 bytes into CAN frames and reassembles
//! them on the other side, running the flow control handshake in between.
//!
//! Four addressing modes are supported: normal, normal fixed (29-bit),
//! extended and mixed. The last two put an address byte in front of the
//! PCI, so single frames carry 6 instead of 7 payload bytes.

pub mod addressing;
pub mod codec;
pub mod config;
pub mod error;
pub mod filter;
pub mod session;
pub mod transport;

pub use addressing::{Addressing, TargetType};
pub use codec::{decode_st_min, generate_frames, FlowControl, FlowStatus, MAX_PAYLOAD_LEN};
pub use config::{AddressingConfig, IsoTpConfig};
pub use error::IsoTpError;
pub use filter::RxFilter;
pub use session::{RxEvent, RxSession};
pub use transport::{IsoTpMessage, IsoTpTransport};
