//! CAN frame representation
//!
//! A [`Frame`] is validated eagerly: the arbitration ID, data bytes and frame
//! type are checked on construction and on every mutation, so a malformed
//! frame can never exist in memory.

use std::fmt;

use serde::Serialize;

use crate::error::FrameError;

/// Largest 11-bit (standard) arbitration ID
pub const MAX_STANDARD_ID: u32 = 0x7FF;
/// Largest 29-bit (extended) arbitration ID
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;
/// Maximum number of data bytes in a classic CAN frame
pub const MAX_DATA_LEN: usize = 8;

/// CAN frame types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameType {
    #[default]
    Data = 1,
    Remote = 2,
    Error = 3,
    Overload = 4,
}

impl TryFrom<u8> for FrameType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, FrameError> {
        match value {
            1 => Ok(Self::Data),
            2 => Ok(Self::Remote),
            3 => Ok(Self::Error),
            4 => Ok(Self::Overload),
            other => Err(FrameError::InvalidFrameType(other)),
        }
    }
}

/// One CAN bus frame
///
/// `timestamp` and `interface` are reception metadata and take no part in
/// equality.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    id: u32,
    extended: bool,
    data: Vec<u8>,
    frame_type: FrameType,
    /// Reception time in seconds
    pub timestamp: Option<f64>,
    /// Name of the interface the frame was seen on
    pub interface: Option<String>,
}

impl Frame {
    /// Create a standard (11-bit) data frame
    pub fn new(id: u32, data: &[u8]) -> Result<Self, FrameError> {
        Self::build(id, false, data)
    }

    /// Create an extended (29-bit) data frame
    pub fn new_extended(id: u32, data: &[u8]) -> Result<Self, FrameError> {
        Self::build(id, true, data)
    }

    fn build(id: u32, extended: bool, data: &[u8]) -> Result<Self, FrameError> {
        check_id(id, extended)?;
        check_len(data.len())?;
        Ok(Self {
            id,
            extended,
            data: data.to_vec(),
            frame_type: FrameType::Data,
            timestamp: None,
            interface: None,
        })
    }

    /// Set the frame type, consuming the frame
    pub fn with_frame_type(mut self, frame_type: FrameType) -> Self {
        self.frame_type = frame_type;
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Data length code, always the true data length
    pub fn dlc(&self) -> usize {
        self.data.len()
    }

    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    /// Set the arbitration ID, validated against the current extended flag
    pub fn set_id(&mut self, id: u32) -> Result<(), FrameError> {
        check_id(id, self.extended)?;
        self.id = id;
        Ok(())
    }

    /// Switch between standard and extended identifiers
    ///
    /// Leaving extended mode fails when the current ID does not fit in 11 bits.
    pub fn set_extended(&mut self, extended: bool) -> Result<(), FrameError> {
        check_id(self.id, extended)?;
        self.extended = extended;
        Ok(())
    }

    pub fn set_data(&mut self, data: &[u8]) -> Result<(), FrameError> {
        check_len(data.len())?;
        self.data = data.to_vec();
        Ok(())
    }

    /// Set data from untyped integer values, rejecting anything outside 0..=255
    pub fn set_data_from_values<T>(&mut self, values: &[T]) -> Result<(), FrameError>
    where
        T: Copy + Into<i64>,
    {
        check_len(values.len())?;
        let mut data = Vec::with_capacity(values.len());
        for (index, value) in values.iter().enumerate() {
            let value: i64 = (*value).into();
            let byte =
                u8::try_from(value).map_err(|_| FrameError::InvalidByte { index, value })?;
            data.push(byte);
        }
        self.data = data;
        Ok(())
    }

    pub fn set_frame_type(&mut self, frame_type: FrameType) {
        self.frame_type = frame_type;
    }

    /// Set the frame type from its raw discriminant (1-4)
    pub fn set_frame_type_raw(&mut self, raw: u8) -> Result<(), FrameError> {
        self.frame_type = FrameType::try_from(raw)?;
        Ok(())
    }
}

fn check_id(id: u32, extended: bool) -> Result<(), FrameError> {
    let max = if extended {
        MAX_EXTENDED_ID
    } else {
        MAX_STANDARD_ID
    };
    if id > max {
        return Err(FrameError::IdOutOfRange { id, extended });
    }
    Ok(())
}

fn check_len(len: usize) -> Result<(), FrameError> {
    if len > MAX_DATA_LEN {
        return Err(FrameError::DataTooLong(len));
    }
    Ok(())
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.data == other.data
            && self.frame_type == other.frame_type
            && self.extended == other.extended
    }
}

impl Eq for Frame {}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extended {
            write!(f, "ID=0x{:08X}", self.id)?;
        } else {
            write!(f, "ID=0x{:03X}", self.id)?;
        }
        write!(f, ", DLC={}, Data=[", self.dlc())?;
        for (i, byte) in self.data.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        f.write_str("]")
    }
}
