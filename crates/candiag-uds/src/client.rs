//! UDS client over an ISO-TP transport

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use candiag_isotp::IsoTpTransport;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::any::{decode_request, decode_response, AnyRequest, AnyResponse};
use crate::config::UdsClientConfig;
use crate::error::UdsError;
use crate::services::*;

/// Request/response client for one diagnostic channel
///
/// Requests are serialized: a request holds the channel until its final
/// response (or timeout) arrives.
pub struct UdsClient {
    transport: Arc<IsoTpTransport>,
    config: UdsClientConfig,
    channel: Mutex<()>,
}

/// SID a response answers, for positive and negative responses alike
fn answered_sid(payload: &[u8]) -> Option<u8> {
    match payload {
        [NEGATIVE_RESPONSE_SID, sid, ..] => Some(*sid),
        [NEGATIVE_RESPONSE_SID] | [] => None,
        [sid, ..] => sid.checked_sub(POSITIVE_RESPONSE_OFFSET),
    }
}

impl UdsClient {
    pub fn new(transport: Arc<IsoTpTransport>) -> Self {
        Self::with_config(transport, UdsClientConfig::default())
    }

    pub fn with_config(transport: Arc<IsoTpTransport>, config: UdsClientConfig) -> Self {
        Self {
            transport,
            config,
            channel: Mutex::new(()),
        }
    }

    pub fn transport(&self) -> &Arc<IsoTpTransport> {
        &self.transport
    }

    pub fn config(&self) -> &UdsClientConfig {
        &self.config
    }

    /// Send a request and wait for its response
    ///
    /// Response pending (NRC 0x78) re-arms the wait with P2*, up to the
    /// pending limit. Responses to other services are skipped.
    pub async fn request<R: Request>(&self, request: &R) -> Result<R::Response, UdsError> {
        let _channel = self.channel.lock().await;
        let payload = request.encode();
        debug!(
            sid = format!("0x{:02X}", R::SID),
            len = payload.len(),
            "UDS request"
        );
        self.transport.send(&payload).await?;

        let start = Instant::now();
        let pending_limit = start + self.config.pending_limit();
        let mut deadline = start + self.config.p2_timeout();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(response) = self.transport.recv(remaining).await? else {
                warn!(sid = format!("0x{:02X}", R::SID), "UDS response timeout");
                return Err(UdsError::Timeout);
            };

            if answered_sid(&response) != Some(R::SID) {
                debug!(
                    sid = format!("0x{:02X}", R::SID),
                    response = hex::encode(&response),
                    "Skipping response for another service"
                );
                continue;
            }

            match R::Response::decode(&response) {
                Err(UdsError::ResponsePending { .. }) => {
                    let now = Instant::now();
                    if now >= pending_limit {
                        warn!(
                            sid = format!("0x{:02X}", R::SID),
                            "UDS response still pending after limit"
                        );
                        return Err(UdsError::Timeout);
                    }
                    deadline = (now + self.config.p2_star_timeout()).min(pending_limit);
                    debug!(sid = format!("0x{:02X}", R::SID), "UDS response pending");
                }
                result => return result,
            }
        }
    }

    /// Send a request that expects no answer
    pub async fn send_without_response<R: Request>(&self, request: &R) -> Result<(), UdsError> {
        let _channel = self.channel.lock().await;
        self.transport.send(&request.encode()).await?;
        Ok(())
    }

    /// Send a functionally addressed request and collect every answer
    ///
    /// Responses are keyed by the arbitration ID they arrived on. Collection
    /// runs for the functional timeout, extended while any responder is
    /// pending.
    pub async fn request_functional<R: Request>(
        &self,
        request: &R,
    ) -> Result<HashMap<u32, Result<R::Response, UdsError>>, UdsError> {
        let _channel = self.channel.lock().await;
        self.transport.send(&request.encode()).await?;

        let start = Instant::now();
        let pending_limit = start + self.config.pending_limit();
        let mut deadline = start + self.config.functional_timeout();
        let mut responses = HashMap::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(message) = self.transport.recv_message(remaining).await? else {
                break;
            };
            if answered_sid(&message.payload) != Some(R::SID) {
                continue;
            }

            match R::Response::decode(&message.payload) {
                Err(UdsError::ResponsePending { .. }) => {
                    let extended = (Instant::now() + self.config.p2_star_timeout()).min(pending_limit);
                    deadline = deadline.max(extended);
                    debug!(
                        source = format!("0x{:X}", message.source_id),
                        "Functional responder pending"
                    );
                }
                result => {
                    responses.insert(message.source_id, result);
                }
            }
        }

        debug!(
            sid = format!("0x{:02X}", R::SID),
            responders = responses.len(),
            "Functional request complete"
        );
        Ok(responses)
    }

    /// Wait for the next request on this channel, e.g. when acting as a server
    pub async fn next_request(&self, timeout: Duration) -> Result<Option<AnyRequest>, UdsError> {
        match self.transport.recv(timeout).await? {
            Some(payload) => decode_request(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// Wait for the next response on this channel without sending anything
    pub async fn next_response(&self, timeout: Duration) -> Result<Option<AnyResponse>, UdsError> {
        match self.transport.recv(timeout).await? {
            Some(payload) => decode_response(&payload).map(Some),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Convenience wrappers
    // =========================================================================

    pub async fn diagnostic_session_control(
        &self,
        session: u8,
    ) -> Result<DiagnosticSessionControlResponse, UdsError> {
        self.request(&DiagnosticSessionControl::new(session)).await
    }

    pub async fn ecu_reset(&self, reset_type: u8) -> Result<EcuResetResponse, UdsError> {
        self.request(&EcuReset::new(reset_type)).await
    }

    pub async fn tester_present(&self, suppress_response: bool) -> Result<(), UdsError> {
        if suppress_response {
            self.send_without_response(&TesterPresent::suppressed()).await
        } else {
            self.request(&TesterPresent::new()).await?;
            Ok(())
        }
    }

    /// Request the seed for an odd security access type
    pub async fn security_access_request_seed(&self, access_type: u8) -> Result<Vec<u8>, UdsError> {
        let response = self.request(&SecurityAccess::request_seed(access_type)).await?;
        Ok(response.security_seed)
    }

    pub async fn security_access_send_key(&self, access_type: u8, key: &[u8]) -> Result<(), UdsError> {
        self.request(&SecurityAccess::send_key(access_type, key)).await?;
        Ok(())
    }

    pub async fn read_data_by_id(&self, did: u16) -> Result<Vec<u8>, UdsError> {
        let response = self.request(&ReadDataByIdentifier::new(did)).await?;
        if response.data_identifier != did {
            return Err(UdsError::InvalidResponse(format!(
                "expected DID 0x{:04X}, got 0x{:04X}",
                did, response.data_identifier
            )));
        }
        Ok(response.data_record)
    }

    pub async fn write_data_by_id(&self, did: u16, data: &[u8]) -> Result<(), UdsError> {
        self.request(&WriteDataByIdentifier::new(did, data)).await?;
        Ok(())
    }

    pub async fn clear_dtc(&self, group: u32) -> Result<(), UdsError> {
        self.request(&ClearDiagnosticInformation::new(group)).await?;
        Ok(())
    }

    pub async fn read_dtc_by_status_mask(
        &self,
        status_mask: u8,
    ) -> Result<ReadDtcInformationResponse, UdsError> {
        self.request(&ReadDtcInformation::by_status_mask(status_mask)).await
    }

    pub async fn routine_control_start(
        &self,
        routine_id: u16,
        params: &[u8],
    ) -> Result<Vec<u8>, UdsError> {
        let response = self.request(&RoutineControl::start(routine_id, params)).await?;
        Ok(response.routine_status_record)
    }

    /// Returns the maximum TransferData message length
    pub async fn request_download(&self, address: u64, size: u64) -> Result<u64, UdsError> {
        let response = self.request(&RequestDownload::new(address, size)).await?;
        Ok(response.max_number_of_block_length)
    }

    pub async fn transfer_data(
        &self,
        block_sequence_counter: u8,
        data: &[u8],
    ) -> Result<TransferDataResponse, UdsError> {
        let response = self
            .request(&TransferData::new(block_sequence_counter, data))
            .await?;
        if response.block_sequence_counter != block_sequence_counter {
            return Err(UdsError::InvalidResponse(format!(
                "block sequence counter mismatch: sent {}, got {}",
                block_sequence_counter, response.block_sequence_counter
            )));
        }
        Ok(response)
    }

    pub async fn request_transfer_exit(&self) -> Result<Vec<u8>, UdsError> {
        let response = self.request(&RequestTransferExit::default()).await?;
        Ok(response.transfer_response_parameter_record)
    }
}
