//! Input/output control and routine services

use serde::Serialize;

use super::{join_sub_function, service_id, split_sub_function, Reader, Request, Response};
use crate::error::UdsError;

/// InputOutputControlParameter values (first byte of the option record)
pub mod io_control_parameter {
    pub const RETURN_CONTROL_TO_ECU: u8 = 0x00;
    pub const RESET_TO_DEFAULT: u8 = 0x01;
    pub const FREEZE_CURRENT_STATE: u8 = 0x02;
    pub const SHORT_TERM_ADJUSTMENT: u8 = 0x03;
}

/// RoutineControl (0x31) sub-functions
pub mod routine_control_type {
    pub const START_ROUTINE: u8 = 0x01;
    pub const STOP_ROUTINE: u8 = 0x02;
    pub const REQUEST_ROUTINE_RESULTS: u8 = 0x03;
}

// =============================================================================
// InputOutputControlByIdentifier (0x2F)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputOutputControlByIdentifier {
    pub data_identifier: u16,
    pub control_option_record: Vec<u8>,
    /// Decoded requests carry the mask inside `control_option_record`
    pub control_enable_mask_record: Vec<u8>,
}

impl InputOutputControlByIdentifier {
    pub fn new(did: u16, option_record: &[u8], enable_mask: &[u8]) -> Self {
        Self {
            data_identifier: did,
            control_option_record: option_record.to_vec(),
            control_enable_mask_record: enable_mask.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputOutputControlByIdentifierResponse {
    pub data_identifier: u16,
    pub control_status_record: Vec<u8>,
}

impl Request for InputOutputControlByIdentifier {
    const SID: u8 = service_id::IO_CONTROL_BY_ID;
    type Response = InputOutputControlByIdentifierResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.data_identifier.to_be_bytes());
        out.extend_from_slice(&self.control_option_record);
        out.extend_from_slice(&self.control_enable_mask_record);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::request(body);
        Ok(Self {
            data_identifier: reader.u16("dataIdentifier")?,
            control_option_record: reader.rest(),
            control_enable_mask_record: Vec::new(),
        })
    }
}

impl Response for InputOutputControlByIdentifierResponse {
    const SID: u8 = service_id::IO_CONTROL_BY_ID;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::response(body);
        Ok(Self {
            data_identifier: reader.u16("dataIdentifier")?,
            control_status_record: reader.rest(),
        })
    }
}

// =============================================================================
// RoutineControl (0x31)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutineControl {
    pub control_type: u8,
    pub routine_identifier: u16,
    pub routine_control_option_record: Vec<u8>,
    pub suppress_response: bool,
}

impl RoutineControl {
    pub fn new(control_type: u8, routine_identifier: u16, option_record: &[u8]) -> Self {
        Self {
            control_type,
            routine_identifier,
            routine_control_option_record: option_record.to_vec(),
            suppress_response: false,
        }
    }

    pub fn start(routine_identifier: u16, option_record: &[u8]) -> Self {
        Self::new(routine_control_type::START_ROUTINE, routine_identifier, option_record)
    }

    pub fn stop(routine_identifier: u16) -> Self {
        Self::new(routine_control_type::STOP_ROUTINE, routine_identifier, &[])
    }

    pub fn results(routine_identifier: u16) -> Self {
        Self::new(routine_control_type::REQUEST_ROUTINE_RESULTS, routine_identifier, &[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutineControlResponse {
    pub control_type: u8,
    pub routine_identifier: u16,
    pub routine_status_record: Vec<u8>,
}

impl Request for RoutineControl {
    const SID: u8 = service_id::ROUTINE_CONTROL;
    type Response = RoutineControlResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(join_sub_function(self.control_type, self.suppress_response));
        out.extend_from_slice(&self.routine_identifier.to_be_bytes());
        out.extend_from_slice(&self.routine_control_option_record);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::request(body);
        let (control_type, suppress_response) = split_sub_function(reader.u8("routineControlType")?);
        Ok(Self {
            control_type,
            routine_identifier: reader.u16("routineIdentifier")?,
            routine_control_option_record: reader.rest(),
            suppress_response,
        })
    }

    fn suppress_positive_response(&self) -> bool {
        self.suppress_response
    }
}

impl Response for RoutineControlResponse {
    const SID: u8 = service_id::ROUTINE_CONTROL;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::response(body);
        Ok(Self {
            control_type: reader.u8("routineControlType")?,
            routine_identifier: reader.u16("routineIdentifier")?,
            routine_status_record: reader.rest(),
        })
    }
}
