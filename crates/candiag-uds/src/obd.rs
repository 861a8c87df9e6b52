//! OBD-II (SAE J1979) requests over ISO-TP

use std::sync::Arc;
use std::time::Duration;

use candiag_core::Dispatcher;
use candiag_isotp::{Addressing, IsoTpConfig, IsoTpTransport, RxFilter};
use tokio::time::Instant;
use tracing::debug;

use crate::error::UdsError;

/// Functional broadcast ID for OBD-II requests
pub const OBD_FUNCTIONAL_ID: u32 = 0x7DF;

/// Response ID of the first emissions ECU
pub const OBD_RESPONSE_ID: u32 = 0x7E8;

/// Offset from a request mode to its response mode
const OBD_RESPONSE_OFFSET: u8 = 0x40;

/// PIDs covered by one "supported PIDs" bitmap
const PID_RANGE: u8 = 0x20;

pub mod mode {
    pub const CURRENT_DATA: u8 = 0x01;
    pub const FREEZE_FRAME: u8 = 0x02;
    pub const STORED_DTCS: u8 = 0x03;
    pub const CLEAR_DTCS: u8 = 0x04;
    pub const VEHICLE_INFORMATION: u8 = 0x09;
}

pub struct ObdClient {
    transport: Arc<IsoTpTransport>,
    timeout: Duration,
}

impl ObdClient {
    /// Create a transport on 0x7DF / 0x7E8 and wrap it
    ///
    /// The dispatcher must not be running yet.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Result<Self, UdsError> {
        Self::with_ids(dispatcher, OBD_FUNCTIONAL_ID, OBD_RESPONSE_ID)
    }

    pub fn with_ids(dispatcher: Arc<Dispatcher>, tx_id: u32, rx_id: u32) -> Result<Self, UdsError> {
        let transport = IsoTpTransport::with_filter(
            dispatcher,
            Addressing::normal_functional(tx_id, rx_id),
            IsoTpConfig::default(),
            RxFilter::Exact(rx_id),
        )?;
        Ok(Self::with_transport(Arc::new(transport)))
    }

    pub fn with_transport(transport: Arc<IsoTpTransport>) -> Self {
        Self {
            transport,
            timeout: Duration::from_millis(250),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `[mode, pid]` and return the matching response
    ///
    /// Returns `None` when nothing answers the mode in time.
    pub async fn request(&self, mode: u8, pid: Option<u8>) -> Result<Option<Vec<u8>>, UdsError> {
        let mut request = vec![mode];
        request.extend(pid);
        self.transport.send(&request).await?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(response) = self.transport.recv(remaining).await? else {
                return Ok(None);
            };
            if response.first() == Some(&mode.wrapping_add(OBD_RESPONSE_OFFSET)) {
                return Ok(Some(response));
            }
            debug!(
                mode = format!("0x{:02X}", mode),
                response = hex::encode(&response),
                "Ignoring unrelated OBD response"
            );
        }
    }

    /// Walk the supported PID bitmaps of mode 1 or 9
    ///
    /// Each bitmap covers the next 32 PIDs, most significant bit first; its
    /// last bit announces the following bitmap.
    pub async fn supported_pids(&self, mode: u8) -> Result<Vec<u8>, UdsError> {
        if mode != mode::CURRENT_DATA && mode != mode::VEHICLE_INFORMATION {
            return Err(UdsError::InvalidRequest(format!(
                "supported PIDs are only defined for modes 1 and 9, not {}",
                mode
            )));
        }

        let mut pids = Vec::new();
        let mut base: u8 = 0;
        loop {
            let Some(response) = self.request(mode, Some(base)).await? else {
                break;
            };
            let Some(bits) = parse_supported_bitmap(&response) else {
                break;
            };
            pids.extend(bitmap_pids(base, bits));

            let Some(next) = base.checked_add(PID_RANGE) else {
                break;
            };
            if bits & 1 == 0 {
                break;
            }
            base = next;
        }
        Ok(pids)
    }
}

/// Bitmap of a `[mode + 0x40, pid, a, b, c, d]` response
fn parse_supported_bitmap(response: &[u8]) -> Option<u32> {
    match response {
        [_, _, a, b, c, d] => Some(u32::from_be_bytes([*a, *b, *c, *d])),
        _ => None,
    }
}

/// PIDs set in a bitmap starting after `base`, in ascending order
fn bitmap_pids(base: u8, bits: u32) -> impl Iterator<Item = u8> {
    (0..32u8)
        .filter(move |bit| bits & (0x8000_0000 >> bit) != 0)
        .map(move |bit| base.wrapping_add(bit + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_pids() {
        // 0xBE1FA813: the classic mode 1 answer
        let pids: Vec<u8> = bitmap_pids(0, 0xBE1F_A813).collect();
        assert_eq!(
            pids,
            vec![
                0x01, 0x03, 0x04, 0x05, 0x06, 0x07, 0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0x11, 0x13,
                0x15, 0x1C, 0x1F, 0x20
            ]
        );
        assert_eq!(bitmap_pids(0x20, 0x8000_0000).collect::<Vec<_>>(), vec![0x21]);
    }

    #[test]
    fn test_parse_supported_bitmap() {
        assert_eq!(
            parse_supported_bitmap(&[0x41, 0x00, 0xBE, 0x1F, 0xA8, 0x13]),
            Some(0xBE1F_A813)
        );
        assert_eq!(parse_supported_bitmap(&[0x41, 0x00, 0xBE]), None);
    }

    #[tokio::test]
    async fn test_unsupported_mode() {
        let dispatcher = Arc::new(Dispatcher::new(candiag_core::LoopbackDevice::new()));
        let client = ObdClient::new(dispatcher).unwrap();
        assert!(matches!(
            client.supported_pids(0x02).await,
            Err(UdsError::InvalidRequest(_))
        ));
    }
}
