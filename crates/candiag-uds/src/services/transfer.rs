//! Upload and download services

use serde::Serialize;

use super::{service_id, MemoryLocation, Reader, Request, Response};
use crate::error::UdsError;

/// Shared body of RequestDownload and RequestUpload
fn encode_transfer_request(data_format_identifier: u8, location: &MemoryLocation, out: &mut Vec<u8>) {
    out.push(data_format_identifier);
    location.encode(out);
}

fn parse_transfer_request(body: &[u8]) -> Result<(u8, MemoryLocation), UdsError> {
    let mut reader = Reader::request(body);
    let data_format_identifier = reader.u8("dataFormatIdentifier")?;
    Ok((data_format_identifier, MemoryLocation::read(&mut reader)?))
}

/// Shared body of the RequestDownload and RequestUpload responses
fn parse_transfer_response(body: &[u8]) -> Result<(u8, u64), UdsError> {
    let mut reader = Reader::response(body);
    let length_format_identifier = reader.u8("lengthFormatIdentifier")?;
    let len = (length_format_identifier >> 4) as usize;
    if !(1..=8).contains(&len) {
        return Err(reader.error(format!(
            "invalid lengthFormatIdentifier 0x{:02X}",
            length_format_identifier
        )));
    }
    Ok((length_format_identifier, reader.uint(len, "maxNumberOfBlockLength")?))
}

// =============================================================================
// RequestDownload (0x34)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestDownload {
    /// Compression (high nibble) and encryption (low nibble); 0 is plain
    pub data_format_identifier: u8,
    pub location: MemoryLocation,
}

impl RequestDownload {
    pub fn new(address: u64, size: u64) -> Self {
        Self {
            data_format_identifier: 0x00,
            location: MemoryLocation::new(address, size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestDownloadResponse {
    pub length_format_identifier: u8,
    /// Largest TransferData message the server accepts, SID included
    pub max_number_of_block_length: u64,
}

impl Request for RequestDownload {
    const SID: u8 = service_id::REQUEST_DOWNLOAD;
    type Response = RequestDownloadResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        encode_transfer_request(self.data_format_identifier, &self.location, out);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let (data_format_identifier, location) = parse_transfer_request(body)?;
        Ok(Self {
            data_format_identifier,
            location,
        })
    }
}

impl Response for RequestDownloadResponse {
    const SID: u8 = service_id::REQUEST_DOWNLOAD;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let (length_format_identifier, max_number_of_block_length) = parse_transfer_response(body)?;
        Ok(Self {
            length_format_identifier,
            max_number_of_block_length,
        })
    }
}

// =============================================================================
// RequestUpload (0x35)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestUpload {
    pub data_format_identifier: u8,
    pub location: MemoryLocation,
}

impl RequestUpload {
    pub fn new(address: u64, size: u64) -> Self {
        Self {
            data_format_identifier: 0x00,
            location: MemoryLocation::new(address, size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestUploadResponse {
    pub length_format_identifier: u8,
    pub max_number_of_block_length: u64,
}

impl Request for RequestUpload {
    const SID: u8 = service_id::REQUEST_UPLOAD;
    type Response = RequestUploadResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        encode_transfer_request(self.data_format_identifier, &self.location, out);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let (data_format_identifier, location) = parse_transfer_request(body)?;
        Ok(Self {
            data_format_identifier,
            location,
        })
    }
}

impl Response for RequestUploadResponse {
    const SID: u8 = service_id::REQUEST_UPLOAD;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let (length_format_identifier, max_number_of_block_length) = parse_transfer_response(body)?;
        Ok(Self {
            length_format_identifier,
            max_number_of_block_length,
        })
    }
}

// =============================================================================
// TransferData (0x36)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferData {
    /// Starts at 1 and wraps from 0xFF to 0x00
    pub block_sequence_counter: u8,
    pub transfer_request_parameter_record: Vec<u8>,
}

impl TransferData {
    pub fn new(block_sequence_counter: u8, data: &[u8]) -> Self {
        Self {
            block_sequence_counter,
            transfer_request_parameter_record: data.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferDataResponse {
    pub block_sequence_counter: u8,
    pub transfer_response_parameter_record: Vec<u8>,
}

impl Request for TransferData {
    const SID: u8 = service_id::TRANSFER_DATA;
    type Response = TransferDataResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(self.block_sequence_counter);
        out.extend_from_slice(&self.transfer_request_parameter_record);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::request(body);
        Ok(Self {
            block_sequence_counter: reader.u8("blockSequenceCounter")?,
            transfer_request_parameter_record: reader.rest(),
        })
    }
}

impl Response for TransferDataResponse {
    const SID: u8 = service_id::TRANSFER_DATA;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        let mut reader = Reader::response(body);
        Ok(Self {
            block_sequence_counter: reader.u8("blockSequenceCounter")?,
            transfer_response_parameter_record: reader.rest(),
        })
    }
}

// =============================================================================
// RequestTransferExit (0x37)
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestTransferExit {
    pub transfer_request_parameter_record: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestTransferExitResponse {
    pub transfer_response_parameter_record: Vec<u8>,
}

impl Request for RequestTransferExit {
    const SID: u8 = service_id::REQUEST_TRANSFER_EXIT;
    type Response = RequestTransferExitResponse;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.transfer_request_parameter_record);
    }

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        Ok(Self {
            transfer_request_parameter_record: body.to_vec(),
        })
    }
}

impl Response for RequestTransferExitResponse {
    const SID: u8 = service_id::REQUEST_TRANSFER_EXIT;

    fn parse(body: &[u8]) -> Result<Self, UdsError> {
        Ok(Self {
            transfer_response_parameter_record: body.to_vec(),
        })
    }
}
