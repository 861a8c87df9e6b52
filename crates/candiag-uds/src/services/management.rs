//! Diagnostic and communication management services

use std::time::Duration;

use serde::Serialize;

use super::{join_sub_function, service_id, split_sub_function, Reader, Request, Response};
use crate::error::UdsError;

/// DiagnosticSessionControl (0x10) session types
pub mod session_type {
    pub const DEFAULT: u8 = 0x01;
    pub const PROGRAMMING: u8 = 0x02;
    pub const EXTENDED: u8 = 0x03;
    pub const SAFETY_SYSTEM: u8 = 0x04;
}

/// ECUReset (0x11) sub-functions
pub mod reset_type {
    /// Hard reset - complete shutdown and restart of ECU
    pub const HARD_RESET: u8 = 0x01;
    /// Key off/on reset - simulate ignition cycle
    pub const KEY_OFF_ON_RESET: u8 = 0x02;
    /// Soft reset - application-level restart
    pub const SOFT_RESET: u8 = 0x03;
    pub const ENABLE_RAPID_POWER_SHUTDOWN: u8 = 0x04;
    pub const DISABLE_RAPID_POWER_SHUTDOWN: u8 = 0x05;
}

/// CommunicationControl (0x28) control types
pub mod communication_control_type {
    pub const ENABLE_RX_AND_TX: u8 = 0x00;
    pub const ENABLE_RX_AND_DISABLE_TX: u8 = 0x01;
    pub const DISABLE_RX_AND_ENABLE_TX: u8 = 0x02;
    pub const DISABLE_RX_AND_TX: u8 = 0x03;
    pub const ENABLE_RX_AND_DISABLE_TX_WITH_ENHANCED_ADDRESS: u8 = 0x04;
    pub const ENABLE_RX_AND_TX_WITH_ENHANCED_ADDRESS: u8 = 0x05;
}

/// CommunicationControl (0x28) communication types
pub mod communication_type {
    pub const NORMAL: u8 = 0x01;
    pub const NETWORK_MANAGEMENT: u8 = 0x02;
    pub const NORMAL_AND_NETWORK_MANAGEMENT: u8 = 0x03;
}

/// AccessTimingParameter (0x83) access types
pub mod timing_access_type {
    pub const READ_EXTENDED_TIMING_PARAMETER_SET: u8 = 0x01;
    pub const SET_TIMING_PARAMETERS_TO_DEFAULT_VALUES: u8 = 0x02;
    pub const READ_CURRENTLY_ACTIVE_TIMING_PARAMETERS: u8 = 0x03;
    pub const SET_TIMING_PARAMETERS_TO_GIVEN_VALUES: u8 = 0x04;
}

/// ControlDTCSetting (0x85) setting types
pub mod dtc_setting_type {
    pub const ON: u8 = 0x01;
    pub const OFF: u8 = 0x02;
}

/// ResponseOnEvent (0x86) event types
pub mod event_type {
    pub const STOP_RESPONSE_ON_EVENT: u8 = 0x00;
    pub const ON_DTC_STATUS_CHANGE: u8 = 0x01;
    pub const ON_TIMER_INTERRUPT: u8 = 0x02;
    pub const ON_CHANGE_OF_DATA_IDENTIFIER: u8 = 0x03;
    pub const REPORT_ACTIVATED_EVENTS: u8 = 0x04;
    pub const START_RESPONSE_ON_EVENT: u8 = 0x05;
    pub const CLEAR_RESPONSE_ON_EVENT: u8 = 0x06;
    pub const ON_COMPARISON_OF_VALUES: u8 = 0x07;
    /// Bit asking the server to store the event
    pub const STORE_EVENT: u8 = 0x40;
}

/// LinkControl (0x87) sub-functions
pub mod link_control_type {
    /// Verify fixed baud rate
    pub const VERIFY_FIXED_BAUD_RATE: u8 = 0x01;
    /// Verify specific baud rate
    pub const VERIFY_SPECIFIC_BAUD_RATE: u8 = 0x02;
    /// Transition baud rate
    pub const TRANSITION_BAUD_RATE: u8 = 0x03;
}

/// LinkControl (0x87) baud rate identifiers
pub mod link_baud_rate {
    pub const CAN_125K: u8 = 0x10;
    pub const CAN_250K: u8 = 0x11;
    pub const CAN_500K: u8 = 0x12;
    pub const CAN_1M: u8 = 0x13;
}

const DEFAULT_EVENT_WINDOW_TIME: u8 = 0x02;

// =============================================================================
// DiagnosticSessionControl (0x10)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticSessionControl {
    pub session_type: u8,
    pub suppress_response: bool,
}

impl DiagnosticSessionControl {
    pub fn new(session_type: u8) -> Self {
        Self {
            session_type,
            suppress_response: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticSessionControlResponse {
    pub session_type: u8,
    pub session_parameter_record: Vec<u8>,
}

impl DiagnosticSessionControlResponse {
    /// P2server_max, if the record carries it
    pub fn p2_server_max(&self) -> Option<Duration> {
        let record = self.session_parameter_record.get(0..2)?;
        Some(Duration::from_millis(
            u16::from_be_bytes([record[0], record[1]]) as u64,
        ))
    }

    /// P2*server_max (10 ms resolution), if the record carries it
    pub fn p2_star_server_max(&self) -> Option<Duration> {
        let record = self.session_parameter_record.get(2..4)?;
        Some(Duration::from_millis(
            u16::from_be_bytes([record[0], record[1]]) as u64 * 10,
        ))
    }
}

impl Request for DiagnosticSessionControl {
    const SID: u8 = service_id::DIAGNOSTIC_SESSION_CONTROL;
    type Response = DiagnosticSessionControlResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(join_sub_function(self.session_type, self.suppress_response));
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::request(body);
        let (session_type, suppress_response) = split_sub_function(reader.u8("sessionType")?);
        Ok(Self {
            session_type,
            suppress_response,
        })
    }

    fn suppress_positive_response(&self) -> bool {
        self.suppress_response
    }
}

impl Response for DiagnosticSessionControlResponse {
    const SID: u8 = service_id::DIAGNOSTIC_SESSION_CONTROL;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::response(body);
        Ok(Self {
            session_type: reader.u8("sessionType")?,
            session_parameter_record: reader.rest(),
        })
    }
}

// =============================================================================
// ECUReset (0x11)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EcuReset {
    pub reset_type: u8,
    pub suppress_response: bool,
}

impl EcuReset {
    pub fn new(reset_type: u8) -> Self {
        Self {
            reset_type,
            suppress_response: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EcuResetResponse {
    pub reset_type: u8,
    /// Seconds until power down, only for enableRapidPowerShutDown
    pub power_down_time: Option<u8>,
}

impl Request for EcuReset {
    const SID: u8 = service_id::ECU_RESET;
    type Response = EcuResetResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(join_sub_function(self.reset_type, self.suppress_response));
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::request(body);
        let (reset_type, suppress_response) = split_sub_function(reader.u8("resetType")?);
        Ok(Self {
            reset_type,
            suppress_response,
        })
    }

    fn suppress_positive_response(&self) -> bool {
        self.suppress_response
    }
}

impl Response for EcuResetResponse {
    const SID: u8 = service_id::ECU_RESET;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::response(body);
        let kind = reader.u8("resetType")?;
        let power_down_time = if kind == reset_type::ENABLE_RAPID_POWER_SHUTDOWN {
            reader.optional_u8()
        } else {
            None
        };
        Ok(Self {
            reset_type: kind,
            power_down_time,
        })
    }
}

// =============================================================================
// SecurityAccess (0x27)
// =============================================================================

/// Odd access types request a seed, even ones send the key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityAccess {
    pub security_access_type: u8,
    /// Key for even access types, optional data record for odd ones
    pub data: Vec<u8>,
}

impl SecurityAccess {
    pub fn request_seed(security_access_type: u8) -> Self {
        Self {
            security_access_type,
            data: Vec::new(),
        }
    }

    pub fn send_key(security_access_type: u8, key: &[u8]) -> Self {
        Self {
            security_access_type,
            data: key.to_vec(),
        }
    }

    pub fn is_seed_request(&self) -> bool {
        self.security_access_type % 2 == 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityAccessResponse {
    pub security_access_type: u8,
    /// Empty when answering a key
    pub security_seed: Vec<u8>,
}

impl SecurityAccessResponse {
    /// Seed as a big-endian integer, if it fits in 8 bytes
    pub fn seed_value(&self) -> Option<u64> {
        if self.security_seed.is_empty() || self.security_seed.len() > 8 {
            return None;
        }
        Some(
            self.security_seed
                .iter()
                .fold(0u64, |acc, b| (acc << 8) | *b as u64),
        )
    }
}

impl Request for SecurityAccess {
    const SID: u8 = service_id::SECURITY_ACCESS;
    type Response = SecurityAccessResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(self.security_access_type);
        out.extend_from_slice(&self.data);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::request(body);
        Ok(Self {
            security_access_type: reader.u8("securityAccessType")?,
            data: reader.rest(),
        })
    }
}

impl Response for SecurityAccessResponse {
    const SID: u8 = service_id::SECURITY_ACCESS;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::response(body);
        Ok(Self {
            security_access_type: reader.u8("securityAccessType")?,
            security_seed: reader.rest(),
        })
    }
}

// =============================================================================
// CommunicationControl (0x28)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommunicationControl {
    pub control_type: u8,
    pub communication_type: u8,
    /// Only used by the enhanced address control types (0x04, 0x05)
    pub node_identification_number: Option<u16>,
    pub suppress_response: bool,
}

impl CommunicationControl {
    pub fn new(control_type: u8, communication_type: u8) -> Self {
        Self {
            control_type,
            communication_type,
            node_identification_number: None,
            suppress_response: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommunicationControlResponse {
    pub control_type: u8,
}

impl Request for CommunicationControl {
    const SID: u8 = service_id::COMMUNICATION_CONTROL;
    type Response = CommunicationControlResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(join_sub_function(self.control_type, self.suppress_response));
        out.push(self.communication_type);
        if let Some(node) = self.node_identification_number {
            out.extend_from_slice(&node.to_be_bytes());
        }
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::request(body);
        let (control_type, suppress_response) = split_sub_function(reader.u8("controlType")?);
        let communication_type = reader.u8("communicationType")?;
        let node_identification_number = if reader.remaining() >= 2 {
            Some(reader.u16("nodeIdentificationNumber")?)
        } else {
            None
        };
        Ok(Self {
            control_type,
            communication_type,
            node_identification_number,
            suppress_response,
        })
    }

    fn suppress_positive_response(&self) -> bool {
        self.suppress_response
    }
}

impl Response for CommunicationControlResponse {
    const SID: u8 = service_id::COMMUNICATION_CONTROL;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        Ok(Self {
            control_type: Reader::response(body).u8("controlType")?,
        })
    }
}

// =============================================================================
// TesterPresent (0x3E)
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TesterPresent {
    pub suppress_response: bool,
}

impl TesterPresent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tester present with the suppress positive response bit set
    pub fn suppressed() -> Self {
        Self {
            suppress_response: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TesterPresentResponse {
    pub zero_sub_function: u8,
}

impl Request for TesterPresent {
    const SID: u8 = service_id::TESTER_PRESENT;
    type Response = TesterPresentResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(join_sub_function(0x00, self.suppress_response));
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let (_, suppress_response) = split_sub_function(Reader::request(body).u8("zeroSubFunction")?);
        Ok(Self { suppress_response })
    }

    fn suppress_positive_response(&self) -> bool {
        self.suppress_response
    }
}

impl Response for TesterPresentResponse {
    const SID: u8 = service_id::TESTER_PRESENT;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        Ok(Self {
            zero_sub_function: Reader::response(body).u8("zeroSubFunction")?,
        })
    }
}

// =============================================================================
// AccessTimingParameter (0x83)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessTimingParameter {
    pub access_type: u8,
    pub timing_parameter_request_record: Vec<u8>,
}

impl AccessTimingParameter {
    pub fn new(access_type: u8, record: &[u8]) -> Self {
        Self {
            access_type,
            timing_parameter_request_record: record.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessTimingParameterResponse {
    pub access_type: u8,
    pub timing_parameter_response_record: Vec<u8>,
}

impl Request for AccessTimingParameter {
    const SID: u8 = service_id::ACCESS_TIMING_PARAMETER;
    type Response = AccessTimingParameterResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(self.access_type);
        out.extend_from_slice(&self.timing_parameter_request_record);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::request(body);
        Ok(Self {
            access_type: reader.u8("timingParameterAccessType")?,
            timing_parameter_request_record: reader.rest(),
        })
    }
}

impl Response for AccessTimingParameterResponse {
    const SID: u8 = service_id::ACCESS_TIMING_PARAMETER;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::response(body);
        Ok(Self {
            access_type: reader.u8("timingParameterAccessType")?,
            timing_parameter_response_record: reader.rest(),
        })
    }
}

// =============================================================================
// SecuredDataTransmission (0x84)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecuredDataTransmission {
    pub security_data_request_record: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecuredDataTransmissionResponse {
    pub security_data_response_record: Vec<u8>,
}

impl Request for SecuredDataTransmission {
    const SID: u8 = service_id::SECURED_DATA_TRANSMISSION;
    type Response = SecuredDataTransmissionResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.security_data_request_record);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        Ok(Self {
            security_data_request_record: body.to_vec(),
        })
    }
}

impl Response for SecuredDataTransmissionResponse {
    const SID: u8 = service_id::SECURED_DATA_TRANSMISSION;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        Ok(Self {
            security_data_response_record: body.to_vec(),
        })
    }
}

// =============================================================================
// ControlDTCSetting (0x85)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlDtcSetting {
    pub setting_type: u8,
    pub setting_control_option_record: Vec<u8>,
    pub suppress_response: bool,
}

impl ControlDtcSetting {
    pub fn new(setting_type: u8) -> Self {
        Self {
            setting_type,
            setting_control_option_record: Vec::new(),
            suppress_response: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlDtcSettingResponse {
    pub setting_type: u8,
}

impl Request for ControlDtcSetting {
    const SID: u8 = service_id::CONTROL_DTC_SETTING;
    type Response = ControlDtcSettingResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(join_sub_function(self.setting_type, self.suppress_response));
        out.extend_from_slice(&self.setting_control_option_record);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::request(body);
        let (setting_type, suppress_response) = split_sub_function(reader.u8("DTCSettingType")?);
        Ok(Self {
            setting_type,
            setting_control_option_record: reader.rest(),
            suppress_response,
        })
    }

    fn suppress_positive_response(&self) -> bool {
        self.suppress_response
    }
}

impl Response for ControlDtcSettingResponse {
    const SID: u8 = service_id::CONTROL_DTC_SETTING;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        Ok(Self {
            setting_type: Reader::response(body).u8("DTCSettingType")?,
        })
    }
}

// =============================================================================
// ResponseOnEvent (0x86)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseOnEvent {
    pub event_type: u8,
    pub event_window_time: u8,
    pub event_type_record: Vec<u8>,
    pub service_to_respond_to_record: Vec<u8>,
}

impl ResponseOnEvent {
    /// Event with no records and the default window time
    pub fn new(event_type: u8) -> Self {
        Self {
            event_type,
            event_window_time: DEFAULT_EVENT_WINDOW_TIME,
            event_type_record: Vec::new(),
            service_to_respond_to_record: Vec::new(),
        }
    }

    pub fn stop() -> Self {
        Self::new(event_type::STOP_RESPONSE_ON_EVENT)
    }
}

/// Length of the event type record for each event type
fn event_type_record_len(kind: u8) -> usize {
    match kind & 0x3F {
        event_type::ON_DTC_STATUS_CHANGE | event_type::ON_TIMER_INTERRUPT => 1,
        event_type::ON_CHANGE_OF_DATA_IDENTIFIER => 2,
        event_type::ON_COMPARISON_OF_VALUES => 10,
        _ => 0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseOnEventResponse {
    pub event_type: u8,
    pub number_of_identified_events: Option<u8>,
    pub event_window_time: Option<u8>,
    pub record: Vec<u8>,
}

impl Request for ResponseOnEvent {
    const SID: u8 = service_id::RESPONSE_ON_EVENT;
    type Response = ResponseOnEventResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(self.event_type);
        out.push(self.event_window_time);
        out.extend_from_slice(&self.event_type_record);
        out.extend_from_slice(&self.service_to_respond_to_record);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::request(body);
        let event_type = reader.u8("eventType")?;
        let event_window_time = reader.u8("eventWindowTime")?;
        let event_type_record = reader.bytes(event_type_record_len(event_type), "eventTypeRecord")?;
        Ok(Self {
            event_type,
            event_window_time,
            event_type_record,
            service_to_respond_to_record: reader.rest(),
        })
    }
}

impl Response for ResponseOnEventResponse {
    const SID: u8 = service_id::RESPONSE_ON_EVENT;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::response(body);
        Ok(Self {
            event_type: reader.u8("eventType")?,
            number_of_identified_events: reader.optional_u8(),
            event_window_time: reader.optional_u8(),
            record: reader.rest(),
        })
    }
}

// =============================================================================
// LinkControl (0x87)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkControl {
    pub control_type: u8,
    /// Baud rate identifier (1 byte) or specific baud rate (3 bytes)
    pub link_control_mode_record: Vec<u8>,
}

impl LinkControl {
    pub fn new(control_type: u8) -> Self {
        Self {
            control_type,
            link_control_mode_record: Vec::new(),
        }
    }

    pub fn verify_fixed_baud_rate(baud_rate_identifier: u8) -> Self {
        Self {
            control_type: link_control_type::VERIFY_FIXED_BAUD_RATE,
            link_control_mode_record: vec![baud_rate_identifier],
        }
    }

    pub fn verify_specific_baud_rate(baud_rate: u32) -> Self {
        Self {
            control_type: link_control_type::VERIFY_SPECIFIC_BAUD_RATE,
            link_control_mode_record: baud_rate.to_be_bytes()[1..].to_vec(),
        }
    }

    pub fn transition_baud_rate() -> Self {
        Self::new(link_control_type::TRANSITION_BAUD_RATE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkControlResponse {
    pub control_type: u8,
}

impl Request for LinkControl {
    const SID: u8 = service_id::LINK_CONTROL;
    type Response = LinkControlResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(self.control_type);
        out.extend_from_slice(&self.link_control_mode_record);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::request(body);
        Ok(Self {
            control_type: reader.u8("linkControlType")?,
            link_control_mode_record: reader.rest(),
        })
    }
}

impl Response for LinkControlResponse {
    const SID: u8 = service_id::LINK_CONTROL;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        Ok(Self {
            control_type: Reader::response(body).u8("linkControlType")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_diagnostic_session_control() {
        let req = DiagnosticSessionControl::new(session_type::PROGRAMMING);
        assert_eq!(req.encode(), vec![0x10, 0x02]);

        let resp = DiagnosticSessionControlResponse::decode(&[0x50, 0x02, 0x00, 0x19, 0x01, 0xF4])
            .unwrap();
        assert_eq!(resp.session_type, 2);
        assert_eq!(resp.p2_server_max(), Some(Duration::from_millis(25)));
        assert_eq!(resp.p2_star_server_max(), Some(Duration::from_millis(5000)));

        let bare = DiagnosticSessionControlResponse::decode(&[0x50, 0x02]).unwrap();
        assert_eq!(bare.p2_server_max(), None);

        assert!(matches!(
            DiagnosticSessionControlResponse::decode(&[0x7F, 0x10, 0x78]),
            Err(UdsError::ResponsePending {
                service_id: 0x10,
                ..
            })
        ));
        assert_eq!(
            DiagnosticSessionControlResponse::decode(&[0x7F, 0x10, 0x22]),
            Err(UdsError::NegativeResponse {
                service_id: 0x10,
                nrc: crate::nrc::NegativeResponseCode::ConditionsNotCorrect
            })
        );
    }

    #[test]
    fn test_suppress_bit() {
        let req = DiagnosticSessionControl {
            session_type: session_type::EXTENDED,
            suppress_response: true,
        };
        assert_eq!(req.encode(), vec![0x10, 0x83]);
        assert_eq!(DiagnosticSessionControl::decode(&[0x10, 0x83]).unwrap(), req);
        assert!(req.suppress_positive_response());
    }

    #[test]
    fn test_ecu_reset() {
        assert_eq!(EcuReset::new(reset_type::HARD_RESET).encode(), vec![0x11, 0x01]);

        let resp = EcuResetResponse::decode(&[0x51, 0x02]).unwrap();
        assert_eq!(resp.reset_type, 2);
        assert_eq!(resp.power_down_time, None);

        let resp = EcuResetResponse::decode(&[0x51, 0x04, 0x0A]).unwrap();
        assert_eq!(resp.power_down_time, Some(0x0A));
    }

    #[test]
    fn test_security_access() {
        assert_eq!(SecurityAccess::request_seed(1).encode(), vec![0x27, 0x01]);

        let resp = SecurityAccessResponse::decode(&[0x67, 0x01, 0x12, 0x34]).unwrap();
        assert_eq!(resp.security_access_type, 1);
        assert_eq!(resp.seed_value(), Some(0x1234));

        let key = SecurityAccess::send_key(2, &[0x12, 0x34]);
        assert!(!key.is_seed_request());
        assert_eq!(key.encode(), vec![0x27, 0x02, 0x12, 0x34]);

        let resp = SecurityAccessResponse::decode(&[0x67, 0x02]).unwrap();
        assert_eq!(resp.security_access_type, 2);
        assert!(resp.security_seed.is_empty());
    }

    #[test]
    fn test_communication_control() {
        let req = CommunicationControl::new(
            communication_control_type::DISABLE_RX_AND_TX,
            communication_type::NORMAL,
        );
        assert_eq!(req.encode(), vec![0x28, 0x03, 0x01]);
        assert_eq!(CommunicationControlResponse::decode(&[0x68, 0x01]).unwrap().control_type, 1);

        let enhanced = CommunicationControl {
            node_identification_number: Some(0x0A0B),
            ..CommunicationControl::new(
                communication_control_type::ENABLE_RX_AND_TX_WITH_ENHANCED_ADDRESS,
                communication_type::NORMAL,
            )
        };
        let encoded = enhanced.encode();
        assert_eq!(encoded, vec![0x28, 0x05, 0x01, 0x0A, 0x0B]);
        assert_eq!(CommunicationControl::decode(&encoded).unwrap(), enhanced);
    }

    #[test]
    fn test_tester_present() {
        assert_eq!(TesterPresent::new().encode(), vec![0x3E, 0x00]);
        assert_eq!(TesterPresent::suppressed().encode(), vec![0x3E, 0x80]);
        assert_eq!(
            TesterPresentResponse::decode(&[0x7E, 0x00]).unwrap(),
            TesterPresentResponse {
                zero_sub_function: 0
            }
        );
    }

    #[test]
    fn test_access_timing_parameter() {
        let at = timing_access_type::SET_TIMING_PARAMETERS_TO_GIVEN_VALUES;
        assert_eq!(
            AccessTimingParameter::new(at, &[1, 2, 3]).encode(),
            vec![0x83, at, 1, 2, 3]
        );
        assert_eq!(AccessTimingParameterResponse::decode(&[0xC3, at]).unwrap().access_type, at);

        let at = timing_access_type::READ_CURRENTLY_ACTIVE_TIMING_PARAMETERS;
        assert_eq!(AccessTimingParameter::new(at, &[]).encode(), vec![0x83, at]);
        let resp = AccessTimingParameterResponse::decode(&[0xC3, at, 1, 2, 3]).unwrap();
        assert_eq!(resp.access_type, at);
        assert_eq!(resp.timing_parameter_response_record, vec![1, 2, 3]);
    }

    #[test]
    fn test_secured_data_transmission() {
        let req = SecuredDataTransmission {
            security_data_request_record: vec![1, 2, 3, 4],
        };
        assert_eq!(req.encode(), vec![0x84, 1, 2, 3, 4]);
        let resp = SecuredDataTransmissionResponse::decode(&[0xC4, 1, 2, 3, 4]).unwrap();
        assert_eq!(resp.security_data_response_record, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_control_dtc_setting() {
        assert_eq!(ControlDtcSetting::new(dtc_setting_type::ON).encode(), vec![0x85, 0x01]);
        assert_eq!(ControlDtcSettingResponse::decode(&[0xC5, 0x01]).unwrap().setting_type, 1);
    }

    #[test]
    fn test_response_on_event() {
        assert_eq!(ResponseOnEvent::stop().encode(), vec![0x86, 0x00, 0x02]);

        let req = ResponseOnEvent {
            event_type: event_type::ON_COMPARISON_OF_VALUES,
            event_window_time: 0x10,
            event_type_record: vec![5; 10],
            service_to_respond_to_record: vec![1, 2, 3],
        };
        let encoded = req.encode();
        assert_eq!(
            encoded,
            vec![0x86, 0x07, 0x10, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 1, 2, 3]
        );
        assert_eq!(ResponseOnEvent::decode(&encoded).unwrap(), req);

        let resp = ResponseOnEventResponse::decode(&[0xC6, 0x02]).unwrap();
        assert_eq!(resp.event_type, 2);
        assert_eq!(resp.number_of_identified_events, None);
    }

    #[test]
    fn test_link_control() {
        assert_eq!(LinkControl::transition_baud_rate().encode(), vec![0x87, 0x03]);
        assert_eq!(LinkControlResponse::decode(&[0xC7, 0x03]).unwrap().control_type, 3);

        assert_eq!(LinkControl::verify_fixed_baud_rate(0xFF).encode(), vec![0x87, 0x01, 0xFF]);
        assert_eq!(LinkControlResponse::decode(&[0xC7, 0x02]).unwrap().control_type, 2);

        assert_eq!(
            LinkControl::verify_specific_baud_rate(500_000).encode(),
            vec![0x87, 0x02, 0x07, 0xA1, 0x20]
        );
    }
}
