//! DTC (Diagnostic Trouble Code) records for ReadDTCInformation (0x19)
//!
//! Report layouts follow ISO 14229-1; only the report types whose layout is
//! self-describing are decoded into structure, the rest stay raw.

use serde::Serialize;

use crate::error::UdsError;

/// ReadDTCInformation report types
pub mod report_type {
    pub const REPORT_NUMBER_OF_DTC_BY_STATUS_MASK: u8 = 0x01;
    pub const REPORT_DTC_BY_STATUS_MASK: u8 = 0x02;
    pub const REPORT_DTC_SNAPSHOT_IDENTIFICATION: u8 = 0x03;
    pub const REPORT_DTC_SNAPSHOT_RECORD_BY_DTC_NUMBER: u8 = 0x04;
    pub const REPORT_DTC_STORED_DATA_BY_RECORD_NUMBER: u8 = 0x05;
    pub const REPORT_DTC_EXT_DATA_RECORD_BY_DTC_NUMBER: u8 = 0x06;
    pub const REPORT_NUMBER_OF_DTC_BY_SEVERITY_MASK_RECORD: u8 = 0x07;
    pub const REPORT_SUPPORTED_DTC: u8 = 0x0A;
    pub const REPORT_FIRST_TEST_FAILED_DTC: u8 = 0x0B;
    pub const REPORT_FIRST_CONFIRMED_DTC: u8 = 0x0C;
    pub const REPORT_MOST_RECENT_TEST_FAILED_DTC: u8 = 0x0D;
    pub const REPORT_MOST_RECENT_CONFIRMED_DTC: u8 = 0x0E;
    pub const REPORT_MIRROR_MEMORY_DTC_BY_STATUS_MASK: u8 = 0x0F;
    pub const REPORT_NUMBER_OF_MIRROR_MEMORY_DTC_BY_STATUS_MASK: u8 = 0x11;
    pub const REPORT_NUMBER_OF_EMISSIONS_OBD_DTC_BY_STATUS_MASK: u8 = 0x12;
    pub const REPORT_EMISSIONS_OBD_DTC_BY_STATUS_MASK: u8 = 0x13;
    pub const REPORT_DTC_WITH_PERMANENT_STATUS: u8 = 0x15;
}

/// DTC group addresses for ClearDiagnosticInformation (0x14)
pub mod dtc_group {
    pub const ALL: u32 = 0xFFFFFF;
    pub const POWERTRAIN: u32 = 0x000000;
    pub const CHASSIS: u32 = 0x400000;
    pub const BODY: u32 = 0x800000;
    pub const NETWORK: u32 = 0xC00000;
}

/// DTC status byte bits
pub mod status_bit {
    pub const TEST_FAILED: u8 = 0x01;
    pub const TEST_FAILED_THIS_OPERATION_CYCLE: u8 = 0x02;
    /// Test failed but not yet confirmed
    pub const PENDING_DTC: u8 = 0x04;
    pub const CONFIRMED_DTC: u8 = 0x08;
    pub const TEST_NOT_COMPLETED_SINCE_LAST_CLEAR: u8 = 0x10;
    pub const TEST_FAILED_SINCE_LAST_CLEAR: u8 = 0x20;
    pub const TEST_NOT_COMPLETED_THIS_OPERATION_CYCLE: u8 = 0x40;
    /// MIL requested
    pub const WARNING_INDICATOR_REQUESTED: u8 = 0x80;
}

/// DTC category from the top two bits of the high byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DtcCategory {
    Powertrain,
    Chassis,
    Body,
    Network,
}

impl DtcCategory {
    pub fn from_high_byte(high_byte: u8) -> Self {
        match high_byte >> 6 {
            0 => DtcCategory::Powertrain,
            1 => DtcCategory::Chassis,
            2 => DtcCategory::Body,
            _ => DtcCategory::Network,
        }
    }

    /// Letter used in the SAE code string
    pub fn prefix(&self) -> char {
        match self {
            DtcCategory::Powertrain => 'P',
            DtcCategory::Chassis => 'C',
            DtcCategory::Body => 'B',
            DtcCategory::Network => 'U',
        }
    }
}

/// Decoded DTC status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DtcStatus {
    pub test_failed: bool,
    pub test_failed_this_operation_cycle: bool,
    pub pending_dtc: bool,
    pub confirmed_dtc: bool,
    pub test_not_completed_since_last_clear: bool,
    pub test_failed_since_last_clear: bool,
    pub test_not_completed_this_operation_cycle: bool,
    pub warning_indicator_requested: bool,
    pub raw: u8,
}

impl DtcStatus {
    pub fn from_byte(status: u8) -> Self {
        let bit = |mask: u8| status & mask != 0;
        Self {
            test_failed: bit(status_bit::TEST_FAILED),
            test_failed_this_operation_cycle: bit(status_bit::TEST_FAILED_THIS_OPERATION_CYCLE),
            pending_dtc: bit(status_bit::PENDING_DTC),
            confirmed_dtc: bit(status_bit::CONFIRMED_DTC),
            test_not_completed_since_last_clear: bit(
                status_bit::TEST_NOT_COMPLETED_SINCE_LAST_CLEAR,
            ),
            test_failed_since_last_clear: bit(status_bit::TEST_FAILED_SINCE_LAST_CLEAR),
            test_not_completed_this_operation_cycle: bit(
                status_bit::TEST_NOT_COMPLETED_THIS_OPERATION_CYCLE,
            ),
            warning_indicator_requested: bit(status_bit::WARNING_INDICATOR_REQUESTED),
            raw: status,
        }
    }

    /// Failed right now and confirmed
    pub fn is_active(&self) -> bool {
        self.test_failed && self.confirmed_dtc
    }

    pub fn matches_mask(&self, mask: u8) -> bool {
        self.raw & mask != 0
    }
}

/// A 3-byte DTC with its status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dtc {
    /// 24-bit DTC number
    pub number: u32,
    pub status: DtcStatus,
}

impl Dtc {
    pub fn new(high: u8, mid: u8, low: u8, status: u8) -> Self {
        Self {
            number: u32::from_be_bytes([0, high, mid, low]),
            status: DtcStatus::from_byte(status),
        }
    }

    pub fn bytes(&self) -> [u8; 3] {
        let [_, high, mid, low] = self.number.to_be_bytes();
        [high, mid, low]
    }

    pub fn category(&self) -> DtcCategory {
        DtcCategory::from_high_byte(self.bytes()[0])
    }

    /// SAE J2012 code string, e.g. P0101 or U0100
    pub fn to_code_string(&self) -> String {
        let [high, mid, _] = self.bytes();
        format!(
            "{}{:01X}{:01X}{:02X}",
            self.category().prefix(),
            (high >> 4) & 0x03,
            high & 0x0F,
            mid
        )
    }

    fn read(data: &[u8]) -> Self {
        Self::new(data[0], data[1], data[2], data[3])
    }
}

/// A raw snapshot or extended data record
///
/// Record contents depend on ECU-specific DID lengths, so they stay opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DtcDataRecord {
    pub record_number: u8,
    pub data: Vec<u8>,
}

/// Decoded ReadDTCInformation report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DtcReport {
    Count {
        status_availability_mask: u8,
        format_identifier: u8,
        count: u16,
    },
    List {
        status_availability_mask: u8,
        dtcs: Vec<Dtc>,
    },
    Snapshot {
        dtc: Dtc,
        record: Option<DtcDataRecord>,
    },
    ExtendedData {
        dtc: Dtc,
        record: Option<DtcDataRecord>,
    },
    Raw {
        data: Vec<u8>,
    },
}

fn too_short(report: u8, len: usize) -> UdsError {
    UdsError::InvalidResponse(format!(
        "DTC report 0x{:02X} too short: {} bytes",
        report, len
    ))
}

/// Decode a report body, the report type byte already consumed
pub fn parse_report(report: u8, body: &[u8]) -> Result<DtcReport, UdsError> {
    use report_type::*;

    match report {
        REPORT_NUMBER_OF_DTC_BY_STATUS_MASK
        | REPORT_NUMBER_OF_DTC_BY_SEVERITY_MASK_RECORD
        | REPORT_NUMBER_OF_MIRROR_MEMORY_DTC_BY_STATUS_MASK
        | REPORT_NUMBER_OF_EMISSIONS_OBD_DTC_BY_STATUS_MASK => {
            if body.len() < 4 {
                return Err(too_short(report, body.len()));
            }
            Ok(DtcReport::Count {
                status_availability_mask: body[0],
                format_identifier: body[1],
                count: u16::from_be_bytes([body[2], body[3]]),
            })
        }
        REPORT_DTC_BY_STATUS_MASK
        | REPORT_SUPPORTED_DTC
        | REPORT_FIRST_TEST_FAILED_DTC
        | REPORT_FIRST_CONFIRMED_DTC
        | REPORT_MOST_RECENT_TEST_FAILED_DTC
        | REPORT_MOST_RECENT_CONFIRMED_DTC
        | REPORT_MIRROR_MEMORY_DTC_BY_STATUS_MASK
        | REPORT_EMISSIONS_OBD_DTC_BY_STATUS_MASK
        | REPORT_DTC_WITH_PERMANENT_STATUS => {
            let Some((&mask, records)) = body.split_first() else {
                return Err(too_short(report, 0));
            };
            if records.len() % 4 != 0 {
                return Err(UdsError::InvalidResponse(format!(
                    "DTC list length {} is not a multiple of 4",
                    records.len()
                )));
            }
            Ok(DtcReport::List {
                status_availability_mask: mask,
                dtcs: records.chunks_exact(4).map(Dtc::read).collect(),
            })
        }
        REPORT_DTC_SNAPSHOT_RECORD_BY_DTC_NUMBER | REPORT_DTC_EXT_DATA_RECORD_BY_DTC_NUMBER => {
            if body.len() < 4 {
                return Err(too_short(report, body.len()));
            }
            let dtc = Dtc::read(&body[..4]);
            let record = body[4..].split_first().map(|(&record_number, data)| DtcDataRecord {
                record_number,
                data: data.to_vec(),
            });
            if report == REPORT_DTC_SNAPSHOT_RECORD_BY_DTC_NUMBER {
                Ok(DtcReport::Snapshot { dtc, record })
            } else {
                Ok(DtcReport::ExtendedData { dtc, record })
            }
        }
        _ => Ok(DtcReport::Raw {
            data: body.to_vec(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case([0x01, 0x01, 0x00], "P0101", DtcCategory::Powertrain)]
    #[case([0x44, 0x20, 0x00], "C0420", DtcCategory::Chassis)]
    #[case([0x92, 0x34, 0x00], "B1234", DtcCategory::Body)]
    #[case([0xC1, 0x00, 0x00], "U0100", DtcCategory::Network)]
    fn test_code_string(
        #[case] bytes: [u8; 3],
        #[case] code: &str,
        #[case] category: DtcCategory,
    ) {
        let dtc = Dtc::new(bytes[0], bytes[1], bytes[2], 0);
        assert_eq!(dtc.to_code_string(), code);
        assert_eq!(dtc.category(), category);
    }

    #[test]
    fn test_status_bits() {
        let active = DtcStatus::from_byte(0x09);
        assert!(active.is_active());
        assert!(!active.pending_dtc);

        let pending = DtcStatus::from_byte(0x04);
        assert!(pending.pending_dtc);
        assert!(!pending.is_active());
        assert!(pending.matches_mask(status_bit::PENDING_DTC));
    }

    #[test]
    fn test_parse_count() {
        let report = parse_report(0x01, &[0xFF, 0x01, 0x00, 0x05]).unwrap();
        assert_eq!(
            report,
            DtcReport::Count {
                status_availability_mask: 0xFF,
                format_identifier: 0x01,
                count: 5
            }
        );
    }

    #[test]
    fn test_parse_list() {
        let body = [0xFF, 0x01, 0x01, 0x00, 0x09, 0x44, 0x20, 0x00, 0x04];
        let DtcReport::List { dtcs, .. } = parse_report(0x02, &body).unwrap() else {
            panic!("expected a DTC list");
        };
        assert_eq!(dtcs.len(), 2);
        assert_eq!(dtcs[0].to_code_string(), "P0101");
        assert!(dtcs[0].status.is_active());
        assert!(dtcs[1].status.pending_dtc);

        assert!(parse_report(0x02, &[0xFF, 0x01, 0x01]).is_err());
    }

    #[test]
    fn test_parse_snapshot() {
        let report = parse_report(0x04, &[0x01, 0x01, 0x00, 0x09, 0x01, 0xAA, 0xBB]).unwrap();
        let DtcReport::Snapshot { dtc, record } = report else {
            panic!("expected a snapshot");
        };
        assert_eq!(dtc.number, 0x010100);
        assert_eq!(
            record,
            Some(DtcDataRecord {
                record_number: 1,
                data: vec![0xAA, 0xBB]
            })
        );
    }
}
