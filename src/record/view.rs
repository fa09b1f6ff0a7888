//! Zero-copy read access to a serialized record.
//!
//! A `RecordView` borrows bytes owned by something else (a page, a
//! [`Record`], a buffer read from disk) and exposes the typed getters.
//! Getters return `Ok(None)` for null positions; array and map getters
//! may additionally fail when the stored bytes do not decode.

use std::borrow::Cow;

use eyre::{ensure, Result};

use crate::config::RECORD_FIXED_HEADER_SIZE;
use crate::element::{self, Array, Map};

use super::Record;

#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    data: &'a [u8],
}

impl<'a> RecordView<'a> {
    /// Wraps a serialized record, validating the stored length against the
    /// buffer.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        ensure!(
            data.len() >= RECORD_FIXED_HEADER_SIZE,
            "buffer too small for record: {} < {}",
            data.len(),
            RECORD_FIXED_HEADER_SIZE
        );
        let length = element::read_u16(data, 0) as usize;
        ensure!(
            length == data.len(),
            "stored record length {} does not match buffer length {}",
            length,
            data.len()
        );
        let header_len = element::read_u16(data, 2) as usize;
        ensure!(
            header_len >= 2 && 2 + header_len <= length,
            "record header of {} bytes does not fit the record length {}",
            header_len,
            length
        );
        Ok(Self { data })
    }

    /// Wraps bytes already known to be a well-formed record.
    pub(crate) fn over(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Total length of the record in bytes.
    pub fn length(&self) -> u16 {
        element::read_u16(self.data, 0)
    }

    /// Number of positions, fixed at the record's creation.
    pub fn num_positions(&self) -> u16 {
        (element::read_u16(self.data, 2) - 2) / 2
    }

    /// An owned copy, detached from the underlying buffer.
    pub fn to_record(&self) -> Record {
        Record::from_buf(self.data.to_vec())
    }

    fn offset_for(&self, position: u16) -> Result<usize> {
        ensure!(
            position < self.num_positions(),
            "position {} out of range for record with {} positions",
            position,
            self.num_positions()
        );
        let offset =
            element::read_u16(self.data, RECORD_FIXED_HEADER_SIZE + 2 * position as usize)
                as usize;
        ensure!(
            offset < self.data.len(),
            "offset {} for position {} points outside the record",
            offset,
            position
        );
        Ok(offset)
    }

    /// True when the position holds no value.
    pub fn is_null(&self, position: u16) -> Result<bool> {
        Ok(self.offset_for(position)? == 0)
    }

    pub fn get_uint32(&self, position: u16) -> Result<Option<u32>> {
        Ok(match self.offset_for(position)? {
            0 => None,
            offset => Some(element::read_u32(self.data, offset)),
        })
    }

    pub fn get_uint64(&self, position: u16) -> Result<Option<u64>> {
        Ok(match self.offset_for(position)? {
            0 => None,
            offset => Some(element::read_u64(self.data, offset)),
        })
    }

    pub fn get_int32(&self, position: u16) -> Result<Option<i32>> {
        Ok(self.get_uint32(position)?.map(|v| v as i32))
    }

    pub fn get_int64(&self, position: u16) -> Result<Option<i64>> {
        Ok(self.get_uint64(position)?.map(|v| v as i64))
    }

    pub fn get_float32(&self, position: u16) -> Result<Option<f32>> {
        Ok(self.get_uint32(position)?.map(f32::from_bits))
    }

    pub fn get_float64(&self, position: u16) -> Result<Option<f64>> {
        Ok(self.get_uint64(position)?.map(f64::from_bits))
    }

    pub fn get_bool(&self, position: u16) -> Result<Option<bool>> {
        Ok(match self.offset_for(position)? {
            0 => None,
            offset => Some(element::read_bool(self.data, offset)),
        })
    }

    /// Timestamp as nanoseconds since the Unix epoch.
    pub fn get_time(&self, position: u16) -> Result<Option<i64>> {
        self.get_int64(position)
    }

    pub fn get_string(&self, position: u16) -> Result<Option<Cow<'a, str>>> {
        Ok(match self.offset_for(position)? {
            0 => None,
            offset => Some(element::read_string(self.data, offset).0),
        })
    }

    pub fn get_array(&self, position: u16) -> Result<Option<Array<'a>>> {
        Ok(match self.offset_for(position)? {
            0 => None,
            offset => Some(element::read_array(self.data, offset)?.0),
        })
    }

    pub fn get_map(&self, position: u16) -> Result<Option<Map<'a>>> {
        Ok(match self.offset_for(position)? {
            0 => None,
            offset => Some(element::read_map(self.data, offset)?.0),
        })
    }
}
