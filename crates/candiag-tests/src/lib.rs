//! Integration test support for the candiag stack
//!
//! Provides a [`SimulatedEcu`] that answers UDS and OBD-II requests over an
//! ISO-TP transport, so whole request/response exchanges can run on a
//! loopback device.
//!
//! # Running Tests
//!
//! ```bash
//! RUST_LOG=candiag_isotp=debug cargo test -p candiag-tests
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use candiag_isotp::IsoTpTransport;
use candiag_uds::nrc::NegativeResponseCode;
use candiag_uds::services::{service_id, NEGATIVE_RESPONSE_SID, POSITIVE_RESPONSE_OFFSET};
use candiag_uds::{decode_request, AnyRequest, UdsError};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Secret the simulated ECU XORs with its seed to form the expected key
pub const SECURITY_SECRET: [u8; 4] = [0xAB, 0xCD, 0xEF, 0x01];

/// Seed the simulated ECU hands out
pub const SECURITY_SEED: [u8; 4] = [0x12, 0x34, 0x56, 0x78];

/// Key matching a seed from the simulated ECU
pub fn compute_key(seed: &[u8]) -> Vec<u8> {
    seed.iter()
        .enumerate()
        .map(|(i, b)| b ^ SECURITY_SECRET[i % SECURITY_SECRET.len()])
        .collect()
}

/// Install a tracing subscriber once per test binary
///
/// Honours `RUST_LOG`; defaults to debug output for the candiag crates.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "candiag_core=info,candiag_isotp=debug,candiag_uds=debug,candiag_tests=debug".into()
        });
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Create a positive response for a service
pub fn positive_response(service_id: u8, data: &[u8]) -> Vec<u8> {
    let mut response = Vec::with_capacity(1 + data.len());
    response.push(service_id.wrapping_add(POSITIVE_RESPONSE_OFFSET));
    response.extend_from_slice(data);
    response
}

pub fn negative_response(service_id: u8, nrc: NegativeResponseCode) -> Vec<u8> {
    vec![NEGATIVE_RESPONSE_SID, service_id, nrc.code()]
}

/// OBD-II modes with supported-PID bitmaps
const OBD_CURRENT_DATA: u8 = 0x01;
const OBD_VEHICLE_INFORMATION: u8 = 0x09;

/// A minimal UDS server on one ISO-TP transport
pub struct SimulatedEcu {
    transport: Arc<IsoTpTransport>,
    session: AtomicU8,
    security_unlocked: AtomicBool,
    dids: RwLock<HashMap<u16, Vec<u8>>>,
    /// Response pending NRCs to send before answering, per SID
    pending: HashMap<u8, usize>,
    supported_pids: Vec<u8>,
}

impl SimulatedEcu {
    pub fn new(transport: Arc<IsoTpTransport>) -> Self {
        Self {
            transport,
            session: AtomicU8::new(0x01),
            security_unlocked: AtomicBool::new(false),
            dids: RwLock::new(HashMap::new()),
            pending: HashMap::new(),
            supported_pids: Vec::new(),
        }
    }

    pub fn with_did(self, did: u16, data: &[u8]) -> Self {
        self.dids.write().insert(did, data.to_vec());
        self
    }

    /// Answer `sid` with `count` response pending NRCs first
    pub fn with_pending(mut self, sid: u8, count: usize) -> Self {
        self.pending.insert(sid, count);
        self
    }

    pub fn with_supported_pids(mut self, pids: &[u8]) -> Self {
        self.supported_pids = pids.to_vec();
        self
    }

    pub fn session(&self) -> u8 {
        self.session.load(Ordering::SeqCst)
    }

    pub fn did(&self, did: u16) -> Option<Vec<u8>> {
        self.dids.read().get(&did).cloned()
    }

    /// Serve requests until the task is aborted or the transport fails
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.serve().await {
                warn!(error = %e, "Simulated ECU stopped");
            }
        })
    }

    async fn serve(&self) -> Result<(), UdsError> {
        loop {
            let Some(request) = self.transport.recv(Duration::from_secs(3600)).await? else {
                continue;
            };
            let Some(&sid) = request.first() else {
                continue;
            };

            for _ in 0..self.pending.get(&sid).copied().unwrap_or(0) {
                self.transport
                    .send(&negative_response(sid, NegativeResponseCode::ResponsePending))
                    .await?;
                tokio::time::sleep(Duration::from_millis(10)).await;
            }

            let response = self.handle_request(&request);
            if !response.is_empty() {
                self.transport.send(&response).await?;
            }
        }
    }

    /// Build the answer to one request; empty means no response
    pub fn handle_request(&self, request: &[u8]) -> Vec<u8> {
        let Some(&sid) = request.first() else {
            return Vec::new();
        };
        if sid == OBD_CURRENT_DATA || sid == OBD_VEHICLE_INFORMATION {
            return self.handle_obd(request);
        }

        let decoded = match decode_request(request) {
            Ok(decoded) => decoded,
            Err(UdsError::UnknownService(sid)) => {
                debug!(service_id = sid, "Unsupported service");
                return negative_response(sid, NegativeResponseCode::ServiceNotSupported);
            }
            Err(e) => {
                debug!(error = %e, "Malformed request");
                return negative_response(sid, NegativeResponseCode::IncorrectMessageLengthOrFormat);
            }
        };

        match decoded {
            AnyRequest::DiagnosticSessionControl(req) => match req.session_type {
                0x01..=0x03 => {
                    if self.session.swap(req.session_type, Ordering::SeqCst) != req.session_type {
                        self.security_unlocked.store(false, Ordering::SeqCst);
                    }
                    info!(session = format!("0x{:02X}", req.session_type), "Session changed");
                    if req.suppress_response {
                        return Vec::new();
                    }
                    // P2 = 25ms, P2* = 5000ms
                    positive_response(sid, &[req.session_type, 0x00, 0x19, 0x01, 0xF4])
                }
                _ => negative_response(sid, NegativeResponseCode::SubFunctionNotSupported),
            },
            AnyRequest::TesterPresent(req) => {
                if req.suppress_response {
                    Vec::new()
                } else {
                    positive_response(sid, &[0x00])
                }
            }
            AnyRequest::SecurityAccess(req) => {
                if req.is_seed_request() {
                    let mut data = vec![req.security_access_type];
                    data.extend_from_slice(&SECURITY_SEED);
                    positive_response(sid, &data)
                } else if req.data == compute_key(&SECURITY_SEED) {
                    info!("Security access: key accepted");
                    self.security_unlocked.store(true, Ordering::SeqCst);
                    positive_response(sid, &[req.security_access_type])
                } else {
                    negative_response(sid, NegativeResponseCode::InvalidKey)
                }
            }
            AnyRequest::ReadDataByIdentifier(req) => {
                let dids = self.dids.read();
                let mut data = Vec::new();
                for did in &req.data_identifiers {
                    let Some(value) = dids.get(did) else {
                        return negative_response(sid, NegativeResponseCode::RequestOutOfRange);
                    };
                    data.extend_from_slice(&did.to_be_bytes());
                    data.extend_from_slice(value);
                }
                positive_response(sid, &data)
            }
            AnyRequest::WriteDataByIdentifier(req) => {
                if !self.security_unlocked.load(Ordering::SeqCst) {
                    return negative_response(sid, NegativeResponseCode::SecurityAccessDenied);
                }
                self.dids
                    .write()
                    .insert(req.data_identifier, req.data_record.clone());
                positive_response(sid, &req.data_identifier.to_be_bytes())
            }
            AnyRequest::RoutineControl(req) => {
                let mut data = vec![req.control_type];
                data.extend_from_slice(&req.routine_identifier.to_be_bytes());
                data.push(0x00);
                positive_response(sid, &data)
            }
            AnyRequest::EcuReset(req) => {
                self.session.store(0x01, Ordering::SeqCst);
                self.security_unlocked.store(false, Ordering::SeqCst);
                positive_response(service_id::ECU_RESET, &[req.reset_type])
            }
            _ => negative_response(sid, NegativeResponseCode::ServiceNotSupported),
        }
    }

    /// Answer "supported PIDs" requests from the configured PID list
    fn handle_obd(&self, request: &[u8]) -> Vec<u8> {
        let (mode, Some(&base)) = (request[0], request.get(1)) else {
            return Vec::new();
        };
        if base % 0x20 != 0 {
            return Vec::new();
        }
        let bits = self
            .supported_pids
            .iter()
            .filter(|&&pid| pid > base && pid as u16 <= base as u16 + 0x20)
            .fold(0u32, |acc, &pid| acc | (0x8000_0000 >> (pid - base - 1)));
        if bits == 0 {
            return Vec::new();
        }

        let mut response = vec![mode + 0x40, base];
        response.extend_from_slice(&bits.to_be_bytes());
        response
    }
}
