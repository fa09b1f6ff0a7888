//! # Record: Slotted, Mutable, Nullable
//!
//! A record is a contiguous byte buffer storing a fixed number of typed
//! positions, each independently nullable, over the element codec.
//!
//! ## Binary Layout
//!
//! ```text
//! +------------------+------------------+------------------+---------------+
//! | Length L (u16)   | Header len (u16) | Offset table     | Payload       |
//! | total bytes      | 2 + 2N           | [u16; N]         | packed values |
//! +------------------+------------------+------------------+---------------+
//! ```
//!
//! Each offset-table entry points at the first byte of that position's
//! encoded value within the record; `0` means null. Because the payload
//! begins at `4 + 2N >= 6`, zero can never be a legal value offset.
//!
//! ## Update Policy
//!
//! The payload area is append-only with respect to new values: a null
//! position takes its first value by appending the encoding at the tail
//! and writing back the length and the offset. Existing fixed-width values overwrite
//! in place. Existing strings, arrays, and maps overwrite in place only
//! when the new encoding fits the span reserved by the first write;
//! otherwise the setter fails with [`WriteOverflowError`] and the record
//! is left untouched. Surplus bytes from shorter overwrites become dead
//! space; records never shrink.
//!
//! ## Ownership
//!
//! [`Record`] owns its buffer and is the write side. [`RecordView`] is
//! the zero-copy read side, borrowing bytes that may live inside a page;
//! [`Record`] delegates its own getters to a view of itself.

mod view;


use eyre::{ensure, Result};
use thiserror::Error;

use crate::config::{MAX_RECORD_POSITIONS, RECORD_FIXED_HEADER_SIZE};
use crate::element::{
    self, Array, ElementType, Map, TypeMismatchError, UnsupportedTypeError, Value,
};

pub use view::RecordView;

/// Returned when a string, array, or map update does not fit the span
/// reserved by the first write. For strings the quantities are byte
/// lengths; for arrays and maps they are element counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("not enough space for update: available={available}, required={required}")]
pub struct WriteOverflowError {
    pub available: usize,
    pub required: usize,
}

/// Returned when an array is declared with a non-primitive element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid array element type '{element_type}'")]
pub struct InvalidElementTypeError {
    pub element_type: ElementType,
}

/// Returned when a map is declared with a non-primitive key type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid map key type '{key_type}'")]
pub struct InvalidKeyTypeError {
    pub key_type: ElementType,
}

/// Returned when a map is declared with a value type that is neither
/// primitive nor array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid map value type '{value_type}'")]
pub struct InvalidValueTypeError {
    pub value_type: ElementType,
}

/// An owned, mutable record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    buf: Vec<u8>,
}

impl Record {
    /// Creates a record with `num_elements` positions, all null.
    pub fn new(num_elements: u16) -> Result<Self> {
        ensure!(
            num_elements <= MAX_RECORD_POSITIONS,
            "record with {} positions exceeds the maximum of {}",
            num_elements,
            MAX_RECORD_POSITIONS
        );
        let header_len = 2 + 2 * num_elements as usize;
        let len = 2 + header_len;
        let mut buf = vec![0u8; len];
        element::write_u16(&mut buf, 0, len as u16);
        element::write_u16(&mut buf, 2, header_len as u16);
        Ok(Self { buf })
    }

    pub(crate) fn from_buf(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    /// Total length of the record in bytes.
    pub fn length(&self) -> u16 {
        element::read_u16(&self.buf, 0)
    }

    /// Number of positions, fixed at creation.
    pub fn num_positions(&self) -> u16 {
        (element::read_u16(&self.buf, 2) - 2) / 2
    }

    /// The record's bytes, ready to be copied into a page.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// A zero-copy read view over this record.
    pub fn view(&self) -> RecordView<'_> {
        RecordView::over(&self.buf)
    }

    fn check_position(&self, position: u16) -> Result<()> {
        ensure!(
            position < self.num_positions(),
            "position {} out of range for record with {} positions",
            position,
            self.num_positions()
        );
        Ok(())
    }

    fn offset_for(&self, position: u16) -> usize {
        element::read_u16(&self.buf, RECORD_FIXED_HEADER_SIZE + 2 * position as usize) as usize
    }

    fn set_offset(&mut self, position: u16, offset: u16) {
        element::write_u16(
            &mut self.buf,
            RECORD_FIXED_HEADER_SIZE + 2 * position as usize,
            offset,
        );
    }

    fn set_length(&mut self, length: u16) {
        element::write_u16(&mut self.buf, 0, length);
    }

    /// Returns the offset to write a fixed-width value at, reserving a
    /// fresh span at the tail if the position is currently null.
    fn reserve_fixed(&mut self, position: u16, width: usize) -> Result<usize> {
        let offset = self.offset_for(position);
        if offset != 0 {
            return Ok(offset);
        }
        let offset = self.grow(width)?;
        self.set_offset(position, offset as u16);
        Ok(offset)
    }

    /// Extends the record by `extra` zeroed bytes, returning the offset of
    /// the new span and writing back the length.
    fn grow(&mut self, extra: usize) -> Result<usize> {
        let offset = self.length() as usize;
        ensure!(
            offset + extra <= u16::MAX as usize,
            "record of {} bytes cannot grow by {} within the u16 length domain",
            offset,
            extra
        );
        self.buf.resize(offset + extra, 0);
        self.set_length((offset + extra) as u16);
        Ok(offset)
    }

    /// Saves a uint32 at the given position.
    pub fn set_uint32(&mut self, position: u16, value: u32) -> Result<()> {
        self.check_position(position)?;
        let offset = self.reserve_fixed(position, 4)?;
        element::write_u32(&mut self.buf, offset, value);
        Ok(())
    }

    /// Saves a uint64 at the given position.
    pub fn set_uint64(&mut self, position: u16, value: u64) -> Result<()> {
        self.check_position(position)?;
        let offset = self.reserve_fixed(position, 8)?;
        element::write_u64(&mut self.buf, offset, value);
        Ok(())
    }

    /// Saves an int32 at the given position.
    pub fn set_int32(&mut self, position: u16, value: i32) -> Result<()> {
        self.set_uint32(position, value as u32)
    }

    /// Saves an int64 at the given position.
    pub fn set_int64(&mut self, position: u16, value: i64) -> Result<()> {
        self.set_uint64(position, value as u64)
    }

    /// Saves a float32 at the given position.
    pub fn set_float32(&mut self, position: u16, value: f32) -> Result<()> {
        self.set_uint32(position, value.to_bits())
    }

    /// Saves a float64 at the given position.
    pub fn set_float64(&mut self, position: u16, value: f64) -> Result<()> {
        self.set_uint64(position, value.to_bits())
    }

    /// Saves a bool at the given position.
    pub fn set_bool(&mut self, position: u16, value: bool) -> Result<()> {
        self.check_position(position)?;
        let offset = self.reserve_fixed(position, 1)?;
        element::write_bool(&mut self.buf, offset, value);
        Ok(())
    }

    /// Saves a timestamp (nanoseconds since the Unix epoch) at the given
    /// position.
    pub fn set_time(&mut self, position: u16, nanos: i64) -> Result<()> {
        self.set_uint64(position, nanos as u64)
    }

    /// Saves a string at the given position.
    ///
    /// When the position already holds a string, the new value must not be
    /// longer than the stored one; it overwrites in place, leaving any
    /// surplus of the old span as dead bytes. A longer value fails with
    /// [`WriteOverflowError`].
    pub fn set_string(&mut self, position: u16, value: &str) -> Result<()> {
        self.check_position(position)?;
        let needed = element::bytes_needed_for_string(value)?;

        let offset = self.offset_for(position);
        if offset == 0 {
            let offset = self.grow(needed)?;
            element::write_string(&mut self.buf, offset, value)?;
            self.set_offset(position, offset as u16);
        } else {
            let current = element::read_u16(&self.buf, offset) as usize;
            if value.len() > current {
                return Err(WriteOverflowError {
                    available: current,
                    required: value.len(),
                }
                .into());
            }
            element::write_string(&mut self.buf, offset, value)?;
        }
        Ok(())
    }

    /// Saves an array at the given position. Element types must be
    /// primitive.
    ///
    /// When the position already holds an array, the element type must
    /// match, the new element count must not exceed the stored one, and
    /// the new encoding must fit the reserved span.
    pub fn set_array(&mut self, position: u16, array: &Array<'_>) -> Result<()> {
        self.check_position(position)?;
        if !array.element_type.is_primitive() {
            return Err(InvalidElementTypeError {
                element_type: array.element_type,
            }
            .into());
        }
        check_elements(&array.values, array.element_type)?;
        let needed = element::bytes_needed_for_array(array)?;

        let offset = self.offset_for(position);
        if offset == 0 {
            let offset = self.grow(needed)?;
            element::write_array(&mut self.buf, offset, array)?;
            self.set_offset(position, offset as u16);
        } else {
            let stored_byte = self.buf[offset + 2];
            let stored_type =
                ElementType::from_byte(stored_byte).ok_or(UnsupportedTypeError(stored_byte))?;
            if stored_type != array.element_type {
                return Err(TypeMismatchError {
                    expected: stored_type,
                    actual: array.element_type,
                }
                .into());
            }
            let current = element::read_u16(&self.buf, offset) as usize;
            if array.values.len() > current {
                return Err(WriteOverflowError {
                    available: current,
                    required: array.values.len(),
                }
                .into());
            }
            self.check_span(offset, needed, |buf, off| {
                element::read_array(buf, off).map(|(_, end)| end)
            })?;
            element::write_array(&mut self.buf, offset, array)?;
        }
        Ok(())
    }

    /// Saves a map at the given position. Key types must be primitive;
    /// value types may be primitive or array.
    ///
    /// When the position already holds a map, the key and value types must
    /// match, the new entry count must not exceed the stored one, and the
    /// new encoding must fit the reserved span.
    pub fn set_map(&mut self, position: u16, map: &Map<'_>) -> Result<()> {
        self.check_position(position)?;
        if !map.key_type.is_primitive() {
            return Err(InvalidKeyTypeError {
                key_type: map.key_type,
            }
            .into());
        }
        if !map.value_type.is_primitive() && map.value_type != ElementType::Array {
            return Err(InvalidValueTypeError {
                value_type: map.value_type,
            }
            .into());
        }
        check_map_entries(map)?;
        let needed = element::bytes_needed_for_map(map)?;

        let offset = self.offset_for(position);
        if offset == 0 {
            let offset = self.grow(needed)?;
            element::write_map(&mut self.buf, offset, map)?;
            self.set_offset(position, offset as u16);
        } else {
            let stored_key_byte = self.buf[offset + 2];
            let stored_key = ElementType::from_byte(stored_key_byte)
                .ok_or(UnsupportedTypeError(stored_key_byte))?;
            if stored_key != map.key_type {
                return Err(eyre::Report::new(TypeMismatchError {
                    expected: stored_key,
                    actual: map.key_type,
                })
                .wrap_err("map key type mismatch"));
            }
            let stored_value_byte = self.buf[offset + 3];
            let stored_value = ElementType::from_byte(stored_value_byte)
                .ok_or(UnsupportedTypeError(stored_value_byte))?;
            if stored_value != map.value_type {
                return Err(eyre::Report::new(TypeMismatchError {
                    expected: stored_value,
                    actual: map.value_type,
                })
                .wrap_err("map value type mismatch"));
            }
            let current = element::read_u16(&self.buf, offset) as usize;
            if map.data.len() > current {
                return Err(WriteOverflowError {
                    available: current,
                    required: map.data.len(),
                }
                .into());
            }
            self.check_span(offset, needed, |buf, off| {
                element::read_map(buf, off).map(|(_, end)| end)
            })?;
            element::write_map(&mut self.buf, offset, map)?;
        }
        Ok(())
    }

    // The count comparison alone cannot protect a reserved span that holds
    // variable-width elements, so overwrites also require the new byte
    // span to fit the old one.
    fn check_span(
        &self,
        offset: usize,
        needed: usize,
        end_of: impl Fn(&[u8], usize) -> Result<usize>,
    ) -> Result<()> {
        let end = end_of(&self.buf, offset)?;
        let available = end - offset;
        if needed > available {
            return Err(WriteOverflowError {
                available,
                required: needed,
            }
            .into());
        }
        Ok(())
    }

    /// True when the position holds no value.
    pub fn is_null(&self, position: u16) -> Result<bool> {
        self.view().is_null(position)
    }

    pub fn get_uint32(&self, position: u16) -> Result<Option<u32>> {
        self.view().get_uint32(position)
    }

    pub fn get_uint64(&self, position: u16) -> Result<Option<u64>> {
        self.view().get_uint64(position)
    }

    pub fn get_int32(&self, position: u16) -> Result<Option<i32>> {
        self.view().get_int32(position)
    }

    pub fn get_int64(&self, position: u16) -> Result<Option<i64>> {
        self.view().get_int64(position)
    }

    pub fn get_float32(&self, position: u16) -> Result<Option<f32>> {
        self.view().get_float32(position)
    }

    pub fn get_float64(&self, position: u16) -> Result<Option<f64>> {
        self.view().get_float64(position)
    }

    pub fn get_bool(&self, position: u16) -> Result<Option<bool>> {
        self.view().get_bool(position)
    }

    pub fn get_time(&self, position: u16) -> Result<Option<i64>> {
        self.view().get_time(position)
    }

    pub fn get_string(&self, position: u16) -> Result<Option<std::borrow::Cow<'_, str>>> {
        self.view().get_string(position)
    }

    pub fn get_array(&self, position: u16) -> Result<Option<Array<'_>>> {
        self.view().get_array(position)
    }

    pub fn get_map(&self, position: u16) -> Result<Option<Map<'_>>> {
        self.view().get_map(position)
    }
}

fn check_elements(values: &[Value<'_>], element_type: ElementType) -> Result<()> {
    for value in values {
        let actual = value.element_type();
        if !actual.is_primitive() {
            return Err(UnsupportedTypeError(actual.as_byte()).into());
        }
        if actual != element_type {
            return Err(TypeMismatchError {
                expected: element_type,
                actual,
            }
            .into());
        }
    }
    Ok(())
}

fn check_map_entries(map: &Map<'_>) -> Result<()> {
    for (key, value) in &map.data {
        let key_actual = key.element_type();
        if !key_actual.is_primitive() {
            return Err(UnsupportedTypeError(key_actual.as_byte()).into());
        }
        if key_actual != map.key_type {
            return Err(TypeMismatchError {
                expected: map.key_type,
                actual: key_actual,
            }
            .into());
        }

        if map.value_type == ElementType::Array {
            match value {
                Value::Array(a) => {
                    if !a.element_type.is_primitive() {
                        return Err(InvalidElementTypeError {
                            element_type: a.element_type,
                        }
                        .into());
                    }
                    check_elements(&a.values, a.element_type)?;
                }
                other => {
                    return Err(TypeMismatchError {
                        expected: ElementType::Array,
                        actual: other.element_type(),
                    }
                    .into())
                }
            }
        } else {
            let actual = value.element_type();
            if actual != map.value_type {
                return Err(TypeMismatchError {
                    expected: map.value_type,
                    actual,
                }
                .into());
            }
        }
    }
    Ok(())
}
