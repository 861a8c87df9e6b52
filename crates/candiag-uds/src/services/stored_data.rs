//! Stored data transmission services

use serde::Serialize;

use super::{join_sub_function, push_be, service_id, split_sub_function, Reader, Request, Response};
use crate::dtc::{parse_report, report_type, DtcReport};
use crate::error::UdsError;

// =============================================================================
// ClearDiagnosticInformation (0x14)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClearDiagnosticInformation {
    /// 3-byte DTC group, see [`crate::dtc::dtc_group`]
    pub group_of_dtc: u32,
}

impl ClearDiagnosticInformation {
    pub fn new(group_of_dtc: u32) -> Self {
        Self { group_of_dtc }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClearDiagnosticInformationResponse;

impl Request for ClearDiagnosticInformation {
    const SID: u8 = service_id::CLEAR_DIAGNOSTIC_INFO;
    type Response = ClearDiagnosticInformationResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        push_be(out, self.group_of_dtc as u64, 3);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        Ok(Self {
            group_of_dtc: Reader::request(body).uint(3, "groupOfDTC")? as u32,
        })
    }
}

impl Response for ClearDiagnosticInformationResponse {
    const SID: u8 = service_id::CLEAR_DIAGNOSTIC_INFO;

    fn parse(_body: &[u8]) -> Result<Self, UdsError> {
        Ok(Self)
    }
}

// =============================================================================
// ReadDTCInformation (0x19)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadDtcInformation {
    pub report_type: u8,
    /// Status mask, DTC number and record number, as the report type needs
    pub record: Vec<u8>,
    pub suppress_response: bool,
}

impl ReadDtcInformation {
    pub fn new(report_type: u8, record: &[u8]) -> Self {
        Self {
            report_type,
            record: record.to_vec(),
            suppress_response: false,
        }
    }

    pub fn number_by_status_mask(mask: u8) -> Self {
        Self::new(report_type::REPORT_NUMBER_OF_DTC_BY_STATUS_MASK, &[mask])
    }

    pub fn by_status_mask(mask: u8) -> Self {
        Self::new(report_type::REPORT_DTC_BY_STATUS_MASK, &[mask])
    }

    pub fn snapshot_record(dtc: u32, record_number: u8) -> Self {
        Self::with_dtc(report_type::REPORT_DTC_SNAPSHOT_RECORD_BY_DTC_NUMBER, dtc, record_number)
    }

    pub fn extended_data_record(dtc: u32, record_number: u8) -> Self {
        Self::with_dtc(report_type::REPORT_DTC_EXT_DATA_RECORD_BY_DTC_NUMBER, dtc, record_number)
    }

    pub fn supported() -> Self {
        Self::new(report_type::REPORT_SUPPORTED_DTC, &[])
    }

    fn with_dtc(report: u8, dtc: u32, record_number: u8) -> Self {
        let mut record = Vec::with_capacity(4);
        push_be(&mut record, dtc as u64, 3);
        record.push(record_number);
        Self::new(report, &record)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadDtcInformationResponse {
    pub report_type: u8,
    pub report: DtcReport,
}

impl Request for ReadDtcInformation {
    const SID: u8 = service_id::READ_DTC_INFO;
    type Response = ReadDtcInformationResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(join_sub_function(self.report_type, self.suppress_response));
        out.extend_from_slice(&self.record);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::request(body);
        let (report_type, suppress_response) = split_sub_function(reader.u8("reportType")?);
        Ok(Self {
            report_type,
            record: reader.rest(),
            suppress_response,
        })
    }

    fn suppress_positive_response(&self) -> bool {
        self.suppress_response
    }
}

impl Response for ReadDtcInformationResponse {
    const SID: u8 = service_id::READ_DTC_INFO;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::response(body);
        let report_type = reader.u8("reportType")?;
        let report = parse_report(report_type, &reader.rest())?;
        Ok(Self {
            report_type,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtc::dtc_group;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clear_diagnostic_information() {
        let req = ClearDiagnosticInformation::new(0xAABBCC);
        assert_eq!(req.encode(), vec![0x14, 0xAA, 0xBB, 0xCC]);
        assert_eq!(ClearDiagnosticInformation::decode(&[0x14, 0xAA, 0xBB, 0xCC]).unwrap(), req);
        assert_eq!(
            ClearDiagnosticInformation::new(dtc_group::ALL).encode(),
            vec![0x14, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            ClearDiagnosticInformationResponse::decode(&[0x54]).unwrap(),
            ClearDiagnosticInformationResponse
        );
    }

    #[test]
    fn test_read_dtc_requests() {
        assert_eq!(ReadDtcInformation::by_status_mask(0xFF).encode(), vec![0x19, 0x02, 0xFF]);
        assert_eq!(
            ReadDtcInformation::snapshot_record(0x010100, 0x01).encode(),
            vec![0x19, 0x04, 0x01, 0x01, 0x00, 0x01]
        );
        assert_eq!(ReadDtcInformation::supported().encode(), vec![0x19, 0x0A]);
    }

    #[test]
    fn test_read_dtc_response() {
        let resp =
            ReadDtcInformationResponse::decode(&[0x59, 0x01, 0xFF, 0x01, 0x00, 0x02]).unwrap();
        assert_eq!(resp.report_type, 0x01);
        assert!(matches!(resp.report, DtcReport::Count { count: 2, .. }));

        let resp = ReadDtcInformationResponse::decode(&[0x59, 0x02, 0xFF, 0xC1, 0x00, 0x00, 0x08])
            .unwrap();
        let DtcReport::List { dtcs, .. } = resp.report else {
            panic!("expected a DTC list");
        };
        assert_eq!(dtcs[0].to_code_string(), "U0100");
    }

    #[test]
    fn test_report_serializes_with_kind() {
        let resp = ReadDtcInformationResponse::decode(&[0x59, 0x01, 0xFF, 0x01, 0x00, 0x02]).unwrap();
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["report"]["kind"], "count");
        assert_eq!(json["report"]["count"], 2);
    }
}
