//! Data transmission services

use serde::Serialize;

use super::{min_bytes, push_be, service_id, MemoryLocation, Reader, Request, Response};
use crate::error::UdsError;

/// DynamicallyDefineDataIdentifier (0x2C) sub-functions
pub mod definition_type {
    pub const DEFINE_BY_IDENTIFIER: u8 = 0x01;
    pub const DEFINE_BY_MEMORY_ADDRESS: u8 = 0x02;
    pub const CLEAR_DYNAMICALLY_DEFINED_DATA_IDENTIFIER: u8 = 0x03;
}

/// ReadDataByPeriodicIdentifier (0x2A) transmission modes
pub mod transmission_mode {
    pub const SEND_AT_SLOW_RATE: u8 = 0x01;
    pub const SEND_AT_MEDIUM_RATE: u8 = 0x02;
    pub const SEND_AT_FAST_RATE: u8 = 0x03;
    pub const STOP_SENDING: u8 = 0x04;
}

// =============================================================================
// ReadDataByIdentifier (0x22)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadDataByIdentifier {
    pub data_identifiers: Vec<u16>,
}

impl ReadDataByIdentifier {
    pub fn new(did: u16) -> Self {
        Self {
            data_identifiers: vec![did],
        }
    }

    pub fn multiple(dids: &[u16]) -> Self {
        Self {
            data_identifiers: dids.to_vec(),
        }
    }
}

/// Positive response for the first requested identifier
///
/// Record lengths are not self-describing, so when several identifiers were
/// requested everything after the first DID lands in `data_record`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadDataByIdentifierResponse {
    pub data_identifier: u16,
    pub data_record: Vec<u8>,
}

impl Request for ReadDataByIdentifier {
    const SID: u8 = service_id::READ_DATA_BY_ID;
    type Response = ReadDataByIdentifierResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        for did in &self.data_identifiers {
            out.extend_from_slice(&did.to_be_bytes());
        }
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        if body.is_empty() || body.len() % 2 != 0 {
            return Err(UdsError::InvalidRequest(format!(
                "dataIdentifier list has odd or zero length {}",
                body.len()
            )));
        }
        Ok(Self {
            data_identifiers: body
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect(),
        })
    }
}

impl Response for ReadDataByIdentifierResponse {
    const SID: u8 = service_id::READ_DATA_BY_ID;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::response(body);
        Ok(Self {
            data_identifier: reader.u16("dataIdentifier")?,
            data_record: reader.rest(),
        })
    }
}

// =============================================================================
// ReadMemoryByAddress (0x23)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadMemoryByAddress {
    pub location: MemoryLocation,
}

impl ReadMemoryByAddress {
    pub fn new(address: u64, size: u64) -> Self {
        Self {
            location: MemoryLocation::new(address, size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadMemoryByAddressResponse {
    pub data_record: Vec<u8>,
}

impl Request for ReadMemoryByAddress {
    const SID: u8 = service_id::READ_MEMORY_BY_ADDRESS;
    type Response = ReadMemoryByAddressResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        self.location.encode(out);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        Ok(Self {
            location: MemoryLocation::read(&mut Reader::request(body))?,
        })
    }
}

impl Response for ReadMemoryByAddressResponse {
    const SID: u8 = service_id::READ_MEMORY_BY_ADDRESS;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        Ok(Self {
            data_record: body.to_vec(),
        })
    }
}

// =============================================================================
// ReadScalingDataByIdentifier (0x24)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadScalingDataByIdentifier {
    pub data_identifier: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadScalingDataByIdentifierResponse {
    pub data_identifier: u16,
    pub scaling_data: Vec<u8>,
}

impl Request for ReadScalingDataByIdentifier {
    const SID: u8 = service_id::READ_SCALING_DATA_BY_ID;
    type Response = ReadScalingDataByIdentifierResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.data_identifier.to_be_bytes());
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        Ok(Self {
            data_identifier: Reader::request(body).u16("dataIdentifier")?,
        })
    }
}

impl Response for ReadScalingDataByIdentifierResponse {
    const SID: u8 = service_id::READ_SCALING_DATA_BY_ID;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::response(body);
        Ok(Self {
            data_identifier: reader.u16("dataIdentifier")?,
            scaling_data: reader.rest(),
        })
    }
}

// =============================================================================
// ReadDataByPeriodicIdentifier (0x2A)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadDataByPeriodicIdentifier {
    pub transmission_mode: u8,
    pub periodic_data_identifiers: Vec<u8>,
}

/// Periodic data itself arrives in separate frames; the acknowledgement is empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadDataByPeriodicIdentifierResponse;

impl Request for ReadDataByPeriodicIdentifier {
    const SID: u8 = service_id::READ_DATA_BY_PERIODIC_ID;
    type Response = ReadDataByPeriodicIdentifierResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(self.transmission_mode);
        out.extend_from_slice(&self.periodic_data_identifiers);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::request(body);
        Ok(Self {
            transmission_mode: reader.u8("transmissionMode")?,
            periodic_data_identifiers: reader.rest(),
        })
    }
}

impl Response for ReadDataByPeriodicIdentifierResponse {
    const SID: u8 = service_id::READ_DATA_BY_PERIODIC_ID;

    fn parse(_body: &[u8]) -> Result<Self, UdsError> {
        Ok(Self)
    }
}

// =============================================================================
// DynamicallyDefineDataIdentifier (0x2C)
// =============================================================================

/// One slice of a source DID copied into a dynamic DID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceDataIdentifier {
    pub data_identifier: u16,
    /// 1-based byte position inside the source record
    pub position: u8,
    pub memory_size: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "sources", rename_all = "snake_case")]
pub enum DynamicDefinition {
    ByIdentifier(Vec<SourceDataIdentifier>),
    ByMemoryAddress(Vec<MemoryLocation>),
    Clear,
}

impl DynamicDefinition {
    pub fn definition_type(&self) -> u8 {
        match self {
            Self::ByIdentifier(_) => definition_type::DEFINE_BY_IDENTIFIER,
            Self::ByMemoryAddress(_) => definition_type::DEFINE_BY_MEMORY_ADDRESS,
            Self::Clear => definition_type::CLEAR_DYNAMICALLY_DEFINED_DATA_IDENTIFIER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DynamicallyDefineDataIdentifier {
    /// Omitted only when clearing every dynamic identifier
    pub dynamic_data_identifier: Option<u16>,
    pub definition: DynamicDefinition,
}

impl DynamicallyDefineDataIdentifier {
    pub fn by_identifier(did: u16, sources: Vec<SourceDataIdentifier>) -> Self {
        Self {
            dynamic_data_identifier: Some(did),
            definition: DynamicDefinition::ByIdentifier(sources),
        }
    }

    pub fn by_memory_address(did: u16, locations: Vec<MemoryLocation>) -> Self {
        Self {
            dynamic_data_identifier: Some(did),
            definition: DynamicDefinition::ByMemoryAddress(locations),
        }
    }

    pub fn clear(did: Option<u16>) -> Self {
        Self {
            dynamic_data_identifier: did,
            definition: DynamicDefinition::Clear,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DynamicallyDefineDataIdentifierResponse {
    pub definition_type: u8,
    pub dynamic_data_identifier: Option<u16>,
}

impl Request for DynamicallyDefineDataIdentifier {
    const SID: u8 = service_id::DYNAMICALLY_DEFINE_DATA_ID;
    type Response = DynamicallyDefineDataIdentifierResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(self.definition.definition_type());
        if let Some(did) = self.dynamic_data_identifier {
            out.extend_from_slice(&did.to_be_bytes());
        }
        match &self.definition {
            DynamicDefinition::ByIdentifier(sources) => {
                for source in sources {
                    out.extend_from_slice(&source.data_identifier.to_be_bytes());
                    out.push(source.position);
                    out.push(source.memory_size);
                }
            }
            DynamicDefinition::ByMemoryAddress(locations) => {
                // One format identifier covers every entry
                let address_len = locations
                    .iter()
                    .map(|l| l.address_len.max(min_bytes(l.address)))
                    .max()
                    .unwrap_or(1);
                let size_len = locations
                    .iter()
                    .map(|l| l.size_len.max(min_bytes(l.size)))
                    .max()
                    .unwrap_or(1);
                out.push(((size_len as u8) << 4) | address_len as u8);
                for location in locations {
                    push_be(out, location.address, address_len);
                    push_be(out, location.size, size_len);
                }
            }
            DynamicDefinition::Clear => {}
        }
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::request(body);
        let kind = reader.u8("definitionType")?;
        match kind {
            definition_type::DEFINE_BY_IDENTIFIER => {
                let did = reader.u16("dynamicallyDefinedDataIdentifier")?;
                let mut sources = Vec::new();
                while reader.remaining() > 0 {
                    sources.push(SourceDataIdentifier {
                        data_identifier: reader.u16("sourceDataIdentifier")?,
                        position: reader.u8("positionInSourceDataRecord")?,
                        memory_size: reader.u8("memorySize")?,
                    });
                }
                Ok(Self::by_identifier(did, sources))
            }
            definition_type::DEFINE_BY_MEMORY_ADDRESS => {
                let did = reader.u16("dynamicallyDefinedDataIdentifier")?;
                let alfid = reader.u8("addressAndLengthFormatIdentifier")?;
                let mut locations = Vec::new();
                while reader.remaining() > 0 {
                    locations.push(MemoryLocation::read_with_format(&mut reader, alfid)?);
                }
                Ok(Self::by_memory_address(did, locations))
            }
            definition_type::CLEAR_DYNAMICALLY_DEFINED_DATA_IDENTIFIER => {
                let did = if reader.remaining() >= 2 {
                    Some(reader.u16("dynamicallyDefinedDataIdentifier")?)
                } else {
                    None
                };
                Ok(Self::clear(did))
            }
            other => Err(reader.error(format!("unknown definitionType 0x{:02X}", other))),
        }
    }
}

impl Response for DynamicallyDefineDataIdentifierResponse {
    const SID: u8 = service_id::DYNAMICALLY_DEFINE_DATA_ID;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::response(body);
        let definition_type = reader.u8("definitionType")?;
        let dynamic_data_identifier = if reader.remaining() >= 2 {
            Some(reader.u16("dynamicallyDefinedDataIdentifier")?)
        } else {
            None
        };
        Ok(Self {
            definition_type,
            dynamic_data_identifier,
        })
    }
}

// =============================================================================
// WriteDataByIdentifier (0x2E)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteDataByIdentifier {
    pub data_identifier: u16,
    pub data_record: Vec<u8>,
}

impl WriteDataByIdentifier {
    pub fn new(did: u16, data: &[u8]) -> Self {
        Self {
            data_identifier: did,
            data_record: data.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteDataByIdentifierResponse {
    pub data_identifier: u16,
}

impl Request for WriteDataByIdentifier {
    const SID: u8 = service_id::WRITE_DATA_BY_ID;
    type Response = WriteDataByIdentifierResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.data_identifier.to_be_bytes());
        out.extend_from_slice(&self.data_record);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::request(body);
        Ok(Self {
            data_identifier: reader.u16("dataIdentifier")?,
            data_record: reader.rest(),
        })
    }
}

impl Response for WriteDataByIdentifierResponse {
    const SID: u8 = service_id::WRITE_DATA_BY_ID;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        Ok(Self {
            data_identifier: Reader::response(body).u16("dataIdentifier")?,
        })
    }
}

// =============================================================================
// WriteMemoryByAddress (0x3D)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteMemoryByAddress {
    pub location: MemoryLocation,
    pub data_record: Vec<u8>,
}

impl WriteMemoryByAddress {
    /// Memory size is taken from the data length
    pub fn new(address: u64, data: &[u8]) -> Self {
        Self {
            location: MemoryLocation::new(address, data.len() as u64),
            data_record: data.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteMemoryByAddressResponse {
    pub location: MemoryLocation,
}

impl Request for WriteMemoryByAddress {
    const SID: u8 = service_id::WRITE_MEMORY_BY_ADDRESS;
    type Response = WriteMemoryByAddressResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        self.location.encode(out);
        out.extend_from_slice(&self.data_record);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::request(body);
        let location = MemoryLocation::read(&mut reader)?;
        // Sizes beyond usize can never be satisfied by the remaining bytes
        let size = usize::try_from(location.size).unwrap_or(usize::MAX);
        let data_record = reader.bytes(size, "dataRecord")?;
        Ok(Self {
            location,
            data_record,
        })
    }
}

impl Response for WriteMemoryByAddressResponse {
    const SID: u8 = service_id::WRITE_MEMORY_BY_ADDRESS;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        Ok(Self {
            location: MemoryLocation::read(&mut Reader::response(body))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_data_by_identifier() {
        assert_eq!(ReadDataByIdentifier::new(0x1234).encode(), vec![0x22, 0x12, 0x34]);
        assert_eq!(
            ReadDataByIdentifier::multiple(&[0xF190, 0xF18C]).encode(),
            vec![0x22, 0xF1, 0x90, 0xF1, 0x8C]
        );

        let resp = ReadDataByIdentifierResponse::decode(&[0x62, 0x12, 0x34, 1, 2, 3]).unwrap();
        assert_eq!(resp.data_identifier, 0x1234);
        assert_eq!(resp.data_record, vec![1, 2, 3]);

        assert!(matches!(
            ReadDataByIdentifier::decode(&[0x22, 0x12]),
            Err(UdsError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_read_memory_by_address() {
        let req = ReadMemoryByAddress::new(0x12345678, 0x10);
        let encoded = req.encode();
        assert_eq!(encoded, vec![0x23, 0x14, 0x12, 0x34, 0x56, 0x78, 0x10]);
        assert_eq!(ReadMemoryByAddress::decode(&encoded).unwrap(), req);

        let resp = ReadMemoryByAddressResponse::decode(&[0x63, 1, 2, 3, 4]).unwrap();
        assert_eq!(resp.data_record, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_read_scaling_data() {
        let req = ReadScalingDataByIdentifier {
            data_identifier: 0xF190,
        };
        assert_eq!(req.encode(), vec![0x24, 0xF1, 0x90]);

        let resp = ReadScalingDataByIdentifierResponse::decode(&[0x64, 0xF1, 0x90, 0x41, 0x7F]).unwrap();
        assert_eq!(resp.data_identifier, 0xF190);
        assert_eq!(resp.scaling_data, vec![0x41, 0x7F]);
    }

    #[test]
    fn test_read_data_by_periodic_identifier() {
        let req = ReadDataByPeriodicIdentifier {
            transmission_mode: transmission_mode::SEND_AT_SLOW_RATE,
            periodic_data_identifiers: vec![0xAA, 0xBB],
        };
        assert_eq!(req.encode(), vec![0x2A, 0x01, 0xAA, 0xBB]);
        assert_eq!(
            ReadDataByPeriodicIdentifierResponse::decode(&[0x6A]).unwrap(),
            ReadDataByPeriodicIdentifierResponse
        );
    }

    #[test]
    fn test_define_by_identifier() {
        let req = DynamicallyDefineDataIdentifier::by_identifier(
            0xF300,
            vec![
                SourceDataIdentifier {
                    data_identifier: 0x1234,
                    position: 1,
                    memory_size: 2,
                },
                SourceDataIdentifier {
                    data_identifier: 0x5678,
                    position: 3,
                    memory_size: 1,
                },
            ],
        );
        let encoded = req.encode();
        assert_eq!(
            encoded,
            vec![0x2C, 0x01, 0xF3, 0x00, 0x12, 0x34, 0x01, 0x02, 0x56, 0x78, 0x03, 0x01]
        );
        assert_eq!(DynamicallyDefineDataIdentifier::decode(&encoded).unwrap(), req);
    }

    #[test]
    fn test_define_by_memory_address_shares_format() {
        let req = DynamicallyDefineDataIdentifier::by_memory_address(
            0xF301,
            vec![
                MemoryLocation::new(0x1000, 4),
                MemoryLocation::new(0x20, 0x100),
            ],
        );
        let encoded = req.encode();
        assert_eq!(
            encoded,
            vec![0x2C, 0x02, 0xF3, 0x01, 0x22, 0x10, 0x00, 0x00, 0x04, 0x00, 0x20, 0x01, 0x00]
        );

        let decoded = DynamicallyDefineDataIdentifier::decode(&encoded).unwrap();
        let DynamicDefinition::ByMemoryAddress(locations) = decoded.definition else {
            panic!("expected memory definition");
        };
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[1].address, 0x20);
        assert_eq!(locations[1].size, 0x100);
    }

    #[test]
    fn test_clear_dynamic_identifier() {
        assert_eq!(
            DynamicallyDefineDataIdentifier::clear(Some(0xF300)).encode(),
            vec![0x2C, 0x03, 0xF3, 0x00]
        );
        assert_eq!(DynamicallyDefineDataIdentifier::clear(None).encode(), vec![0x2C, 0x03]);

        let resp = DynamicallyDefineDataIdentifierResponse::decode(&[0x6C, 0x03]).unwrap();
        assert_eq!(resp.dynamic_data_identifier, None);
        let resp = DynamicallyDefineDataIdentifierResponse::decode(&[0x6C, 0x01, 0xF3, 0x00]).unwrap();
        assert_eq!(resp.dynamic_data_identifier, Some(0xF300));
    }

    #[test]
    fn test_write_data_by_identifier() {
        assert_eq!(
            WriteDataByIdentifier::new(0xBEEF, &[1, 2, 3]).encode(),
            vec![0x2E, 0xBE, 0xEF, 1, 2, 3]
        );
        let resp = WriteDataByIdentifierResponse::decode(&[0x6E, 0xBE, 0xEF]).unwrap();
        assert_eq!(resp.data_identifier, 0xBEEF);
    }

    #[test]
    fn test_write_memory_by_address() {
        let data = [1, 2, 3, 4, 5, 6, 7];
        let req = WriteMemoryByAddress::new(0xBEEF, &data);
        let encoded = req.encode();
        assert_eq!(
            encoded,
            vec![0x3D, 0x12, 0xBE, 0xEF, 0x07, 1, 2, 3, 4, 5, 6, 7]
        );
        assert_eq!(WriteMemoryByAddress::decode(&encoded).unwrap(), req);

        let resp = WriteMemoryByAddressResponse::decode(&[0x7D, 0x12, 0xBE, 0xEF, 0x07]).unwrap();
        assert_eq!(resp.location.address, 0xBEEF);
        assert_eq!(resp.location.size, 7);
    }

    #[test]
    fn test_write_memory_by_address_oversized_length() {
        // 8-byte size field of 0xFFFF_FFFF_FFFF_FFFF with no data behind it
        let request = [0x3D, 0x81, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        assert!(matches!(
            WriteMemoryByAddress::decode(&request),
            Err(UdsError::InvalidRequest(_))
        ));
        assert!(matches!(
            crate::any::decode_request(&request),
            Err(UdsError::InvalidRequest(_))
        ));

        let short = [0x3D, 0x12, 0xBE, 0xEF, 0x07, 1, 2, 3];
        assert!(matches!(
            WriteMemoryByAddress::decode(&short),
            Err(UdsError::InvalidRequest(_))
        ));
    }
}
