//! UDS service catalog
//!
//! Every service is a request struct implementing [`Request`] and a response
//! struct implementing [`Response`]. Both are plain records: encoding and
//! decoding live in the trait impls, so records serialize cleanly.

mod control;
mod data;
mod management;
mod stored_data;
mod transfer;

pub use control::*;
pub use data::*;
pub use management::*;
pub use stored_data::*;
pub use transfer::*;

use crate::error::UdsError;

/// Added to a request SID to form the positive response SID
pub const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;

/// First byte of every negative response
pub const NEGATIVE_RESPONSE_SID: u8 = 0x7F;

/// Sub-function bit asking the server not to send a positive response
pub const SUPPRESS_POSITIVE_RESPONSE: u8 = 0x80;

/// Standard UDS service ID constants
pub mod service_id {
    pub const DIAGNOSTIC_SESSION_CONTROL: u8 = 0x10;
    pub const ECU_RESET: u8 = 0x11;
    pub const CLEAR_DIAGNOSTIC_INFO: u8 = 0x14;
    pub const READ_DTC_INFO: u8 = 0x19;
    pub const READ_DATA_BY_ID: u8 = 0x22;
    pub const READ_MEMORY_BY_ADDRESS: u8 = 0x23;
    pub const READ_SCALING_DATA_BY_ID: u8 = 0x24;
    pub const SECURITY_ACCESS: u8 = 0x27;
    pub const COMMUNICATION_CONTROL: u8 = 0x28;
    pub const READ_DATA_BY_PERIODIC_ID: u8 = 0x2A;
    pub const DYNAMICALLY_DEFINE_DATA_ID: u8 = 0x2C;
    pub const WRITE_DATA_BY_ID: u8 = 0x2E;
    pub const IO_CONTROL_BY_ID: u8 = 0x2F;
    pub const ROUTINE_CONTROL: u8 = 0x31;
    pub const REQUEST_DOWNLOAD: u8 = 0x34;
    pub const REQUEST_UPLOAD: u8 = 0x35;
    pub const TRANSFER_DATA: u8 = 0x36;
    pub const REQUEST_TRANSFER_EXIT: u8 = 0x37;
    pub const WRITE_MEMORY_BY_ADDRESS: u8 = 0x3D;
    pub const TESTER_PRESENT: u8 = 0x3E;
    pub const ACCESS_TIMING_PARAMETER: u8 = 0x83;
    pub const SECURED_DATA_TRANSMISSION: u8 = 0x84;
    pub const CONTROL_DTC_SETTING: u8 = 0x85;
    pub const RESPONSE_ON_EVENT: u8 = 0x86;
    pub const LINK_CONTROL: u8 = 0x87;
}

/// A service request
pub trait Request: Sized {
    /// Service identifier
    const SID: u8;

    /// Positive response record for this request
    type Response: Response;

    /// Append everything after the SID
    fn encode_body(&self, out: &mut Vec<u8>);

    /// Parse everything after the SID
    fn parse(body: &[u8]) -> Result<Self, UdsError>;

    /// Whether the server was asked not to answer positively
    fn suppress_positive_response(&self) -> bool {
        false
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = vec![Self::SID];
        self.encode_body(&mut out);
        out
    }

    /// Decode a captured request, SID included
    fn decode(data: &[u8]) -> Result<Self, UdsError> {
        match data.first() {
            Some(&sid) if sid == Self::SID => Self::parse(&data[1..]),
            Some(&sid) => Err(UdsError::InvalidRequest(format!(
                "expected SID 0x{:02X}, got 0x{:02X}",
                Self::SID,
                sid
            ))),
            None => Err(UdsError::InvalidRequest("empty request".to_string())),
        }
    }
}

/// A positive service response
pub trait Response: Sized {
    /// SID of the request this answers
    const SID: u8;

    /// Parse everything after the response SID
    fn parse(body: &[u8]) -> Result<Self, UdsError>;

    /// Decode a response, SID included
    ///
    /// Negative responses become [`UdsError::NegativeResponse`] or
    /// [`UdsError::ResponsePending`].
    fn decode(data: &[u8]) -> Result<Self, UdsError> {
        let body = check_response(Self::SID, data)?;
        Self::parse(body)
    }
}

/// Validate the response header for `sid` and return the body
pub fn check_response(sid: u8, data: &[u8]) -> Result<&[u8], UdsError> {
    let Some(&first) = data.first() else {
        return Err(UdsError::InvalidResponse("empty response".to_string()));
    };

    if first == NEGATIVE_RESPONSE_SID {
        if data.len() < 3 {
            return Err(UdsError::InvalidResponse(
                "Negative response too short".to_string(),
            ));
        }
        return Err(UdsError::from_negative_response(data[1], data[2]));
    }

    let expected = sid.wrapping_add(POSITIVE_RESPONSE_OFFSET);
    if first != expected {
        return Err(UdsError::UnexpectedResponse {
            expected,
            actual: first,
        });
    }
    Ok(&data[1..])
}

/// Smallest number of big-endian bytes holding `value` (at least one)
pub fn min_bytes(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

/// Append the low `len` bytes of `value`, big-endian
pub(crate) fn push_be(out: &mut Vec<u8>, value: u64, len: usize) {
    out.extend_from_slice(&value.to_be_bytes()[8 - len..]);
}

/// Memory address and size with their addressAndLengthFormatIdentifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MemoryLocation {
    pub address: u64,
    pub size: u64,
    /// Bytes used for the address; minimal when built with [`MemoryLocation::new`]
    pub address_len: usize,
    pub size_len: usize,
}

impl MemoryLocation {
    pub fn new(address: u64, size: u64) -> Self {
        Self {
            address,
            size,
            address_len: min_bytes(address),
            size_len: min_bytes(size),
        }
    }

    /// addressAndLengthFormatIdentifier: size length high nibble, address length low
    pub fn format_identifier(&self) -> u8 {
        ((self.size_len as u8 & 0x0F) << 4) | (self.address_len as u8 & 0x0F)
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.format_identifier());
        push_be(out, self.address, self.address_len);
        push_be(out, self.size, self.size_len);
    }

    pub(crate) fn read(reader: &mut Reader<'_>) -> Result<Self, UdsError> {
        let alfid = reader.u8("addressAndLengthFormatIdentifier")?;
        Self::read_with_format(reader, alfid)
    }

    pub(crate) fn read_with_format(reader: &mut Reader<'_>, alfid: u8) -> Result<Self, UdsError> {
        let address_len = (alfid & 0x0F) as usize;
        let size_len = (alfid >> 4) as usize;
        if !(1..=8).contains(&address_len) || !(1..=8).contains(&size_len) {
            return Err(reader.error(format!(
                "invalid addressAndLengthFormatIdentifier 0x{:02X}",
                alfid
            )));
        }
        Ok(Self {
            address: reader.uint(address_len, "memoryAddress")?,
            size: reader.uint(size_len, "memorySize")?,
            address_len,
            size_len,
        })
    }
}

/// Cursor over a message body producing descriptive errors
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    request: bool,
}

impl<'a> Reader<'a> {
    pub(crate) fn response(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            request: false,
        }
    }

    pub(crate) fn request(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            request: true,
        }
    }

    pub(crate) fn error(&self, message: String) -> UdsError {
        if self.request {
            UdsError::InvalidRequest(message)
        } else {
            UdsError::InvalidResponse(message)
        }
    }

    fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8], UdsError> {
        let available = self.data.len() - self.pos;
        if len > available {
            return Err(self.error(format!(
                "missing {} ({} of {} bytes available)",
                field, available, len
            )));
        }
        let end = self.pos + len;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub(crate) fn u8(&mut self, field: &str) -> Result<u8, UdsError> {
        Ok(self.take(1, field)?[0])
    }

    pub(crate) fn u16(&mut self, field: &str) -> Result<u16, UdsError> {
        let bytes = self.take(2, field)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn uint(&mut self, len: usize, field: &str) -> Result<u64, UdsError> {
        let bytes = self.take(len, field)?;
        Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
    }

    pub(crate) fn bytes(&mut self, len: usize, field: &str) -> Result<Vec<u8>, UdsError> {
        Ok(self.take(len, field)?.to_vec())
    }

    pub(crate) fn optional_u8(&mut self) -> Option<u8> {
        let byte = self.data.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn rest(&mut self) -> Vec<u8> {
        let rest = self.data[self.pos..].to_vec();
        self.pos = self.data.len();
        rest
    }
}

/// Split a sub-function byte into its value and the suppress bit
pub(crate) fn split_sub_function(byte: u8) -> (u8, bool) {
    (
        byte & !SUPPRESS_POSITIVE_RESPONSE,
        byte & SUPPRESS_POSITIVE_RESPONSE != 0,
    )
}

pub(crate) fn join_sub_function(value: u8, suppress: bool) -> u8 {
    if suppress {
        value | SUPPRESS_POSITIVE_RESPONSE
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 1)]
    #[case(0x10, 1)]
    #[case(0xFF, 1)]
    #[case(0x100, 2)]
    #[case(0xBEEF, 2)]
    #[case(0x12345678, 4)]
    #[case(u64::MAX, 8)]
    fn test_min_bytes(#[case] value: u64, #[case] expected: usize) {
        assert_eq!(min_bytes(value), expected);
    }

    #[test]
    fn test_check_response() {
        assert_eq!(check_response(0x22, &[0x62, 0x01]).unwrap(), &[0x01]);
        assert_eq!(
            check_response(0x22, &[0x50]),
            Err(UdsError::UnexpectedResponse {
                expected: 0x62,
                actual: 0x50
            })
        );
        assert!(matches!(
            check_response(0x22, &[0x7F, 0x22]),
            Err(UdsError::InvalidResponse(_))
        ));
        assert!(matches!(
            check_response(0x22, &[]),
            Err(UdsError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_memory_location_roundtrip() {
        let location = MemoryLocation::new(0x12345678, 0x10);
        let mut out = Vec::new();
        location.encode(&mut out);
        assert_eq!(out, vec![0x14, 0x12, 0x34, 0x56, 0x78, 0x10]);

        let mut reader = Reader::request(&out);
        assert_eq!(MemoryLocation::read(&mut reader).unwrap(), location);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_reader_rejects_oversized_length() {
        let mut reader = Reader::request(&[0x01, 0x02]);
        reader.u8("first").unwrap();
        assert!(matches!(
            reader.bytes(usize::MAX, "dataRecord"),
            Err(UdsError::InvalidRequest(_))
        ));
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn test_reader_reports_missing_field() {
        let mut reader = Reader::response(&[0x12]);
        let err = reader.u16("dataIdentifier").unwrap_err();
        assert_eq!(
            err,
            UdsError::InvalidResponse("missing dataIdentifier (1 of 2 bytes available)".to_string())
        );
    }
}
