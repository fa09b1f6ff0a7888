//! Pure encode/decode functions over a byte buffer and an offset.
//!
//! Writers return the offset immediately after the encoding; readers
//! return the decoded value alongside the next offset. Offsets are
//! `usize` at the API; the 16-bit width of stored offsets and length
//! prefixes is a property of the on-disk format, enforced where those
//! fields are written. Buffers must be pre-sized by the caller (use the
//! `bytes_needed_for_*` queries); the fixed-width helpers index directly
//! and will panic on a buffer that breaks that contract, exactly like an
//! out-of-bounds slice access anywhere else.

use std::borrow::Cow;
use std::cmp::Ordering;

use eyre::{ensure, Result};
use smallvec::SmallVec;

use crate::config::MAX_STRING_BYTES;

use super::types::{
    Array, ElementType, Map, StringTooLongError, TypeMismatchError, UnsupportedTypeError, Value,
};

pub fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn write_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

pub fn write_bool(buf: &mut [u8], offset: usize, value: bool) {
    buf[offset] = value as u8;
}

/// Writes a length-prefixed string and returns the offset after it.
pub fn write_string(buf: &mut [u8], offset: usize, value: &str) -> Result<usize> {
    if value.len() > MAX_STRING_BYTES {
        return Err(StringTooLongError {
            length: value.len(),
        }
        .into());
    }
    write_u16(buf, offset, value.len() as u16);
    let start = offset + 2;
    buf[start..start + value.len()].copy_from_slice(value.as_bytes());
    Ok(start + value.len())
}

/// Writes a primitive value, verifying it against the expected type.
pub fn write_primitive(
    buf: &mut [u8],
    offset: usize,
    value: &Value<'_>,
    expected: ElementType,
) -> Result<usize> {
    let actual = value.element_type();
    if !actual.is_primitive() {
        return Err(UnsupportedTypeError(actual.as_byte()).into());
    }
    if actual != expected {
        return Err(TypeMismatchError { expected, actual }.into());
    }

    Ok(match value {
        Value::Uint32(v) => {
            write_u32(buf, offset, *v);
            offset + 4
        }
        Value::Uint64(v) => {
            write_u64(buf, offset, *v);
            offset + 8
        }
        Value::Int32(v) => {
            write_u32(buf, offset, *v as u32);
            offset + 4
        }
        Value::Int64(v) => {
            write_u64(buf, offset, *v as u64);
            offset + 8
        }
        Value::Float32(v) => {
            write_u32(buf, offset, v.to_bits());
            offset + 4
        }
        Value::Float64(v) => {
            write_u64(buf, offset, v.to_bits());
            offset + 8
        }
        Value::Bool(v) => {
            write_bool(buf, offset, *v);
            offset + 1
        }
        Value::Str(s) => write_string(buf, offset, s)?,
        Value::Time(nanos) => {
            write_u64(buf, offset, *nanos as u64);
            offset + 8
        }
        Value::Array(_) | Value::Map(_) => {
            return Err(UnsupportedTypeError(actual.as_byte()).into())
        }
    })
}

/// Writes an array: count, element type, then each element encoding.
pub fn write_array(buf: &mut [u8], offset: usize, array: &Array<'_>) -> Result<usize> {
    ensure!(
        array.values.len() <= u16::MAX as usize,
        "array of {} elements does not fit a u16 count",
        array.values.len()
    );
    write_u16(buf, offset, array.values.len() as u16);
    buf[offset + 2] = array.element_type.as_byte();

    let mut next = offset + 3;
    for value in &array.values {
        next = write_primitive(buf, next, value, array.element_type)?;
    }
    Ok(next)
}

/// Writes a map: count, key type, value type, then (key, value) pairs.
/// Entries go out sorted by key so that equal maps serialize to identical
/// bytes; readers must not rely on any particular order.
pub fn write_map(buf: &mut [u8], offset: usize, map: &Map<'_>) -> Result<usize> {
    ensure!(
        map.data.len() <= u16::MAX as usize,
        "map of {} entries does not fit a u16 count",
        map.data.len()
    );
    write_u16(buf, offset, map.data.len() as u16);
    buf[offset + 2] = map.key_type.as_byte();
    buf[offset + 3] = map.value_type.as_byte();

    let mut entries: SmallVec<[(&Value<'_>, &Value<'_>); 8]> = map.data.iter().collect();
    entries.sort_unstable_by(|a, b| serial_cmp(a.0, b.0));

    let mut next = offset + 4;
    for (key, value) in entries {
        next = write_primitive(buf, next, key, map.key_type)?;
        next = if map.value_type == ElementType::Array {
            match value {
                Value::Array(a) => write_array(buf, next, a)?,
                other => {
                    return Err(TypeMismatchError {
                        expected: ElementType::Array,
                        actual: other.element_type(),
                    }
                    .into())
                }
            }
        } else {
            write_primitive(buf, next, value, map.value_type)?
        };
    }
    Ok(next)
}

pub fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

pub fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

pub fn read_bool(buf: &[u8], offset: usize) -> bool {
    buf[offset] != 0
}

/// Reads a length-prefixed string, returning it together with its
/// declared length (the consumed span is `length + 2`). Decoding borrows
/// from the buffer. Writers take `&str`, so bytes that are not valid
/// UTF-8 can only arise from external corruption; they are replaced
/// lossily rather than failing the read.
pub fn read_string(buf: &[u8], offset: usize) -> (Cow<'_, str>, u16) {
    let len = read_u16(buf, offset);
    let start = offset + 2;
    let value = String::from_utf8_lossy(&buf[start..start + len as usize]);
    (value, len)
}

/// Reads one primitive of the expected type, returning it with the offset
/// after it.
pub fn read_primitive(
    buf: &[u8],
    offset: usize,
    expected: ElementType,
) -> Result<(Value<'_>, usize)> {
    Ok(match expected {
        ElementType::Uint32 => (Value::Uint32(read_u32(buf, offset)), offset + 4),
        ElementType::Uint64 => (Value::Uint64(read_u64(buf, offset)), offset + 8),
        ElementType::Int32 => (Value::Int32(read_u32(buf, offset) as i32), offset + 4),
        ElementType::Int64 => (Value::Int64(read_u64(buf, offset) as i64), offset + 8),
        ElementType::Float32 => (
            Value::Float32(f32::from_bits(read_u32(buf, offset))),
            offset + 4,
        ),
        ElementType::Float64 => (
            Value::Float64(f64::from_bits(read_u64(buf, offset))),
            offset + 8,
        ),
        ElementType::Bool => (Value::Bool(read_bool(buf, offset)), offset + 1),
        ElementType::Str => {
            let (value, len) = read_string(buf, offset);
            (Value::Str(value), offset + len as usize + 2)
        }
        ElementType::Time => (Value::Time(read_u64(buf, offset) as i64), offset + 8),
        ElementType::Null | ElementType::Array | ElementType::Map => {
            return Err(UnsupportedTypeError(expected.as_byte()).into())
        }
    })
}

/// Reads an array, returning it with the offset after it.
pub fn read_array(buf: &[u8], offset: usize) -> Result<(Array<'_>, usize)> {
    let count = read_u16(buf, offset);
    let type_byte = buf[offset + 2];
    let element_type =
        ElementType::from_byte(type_byte).ok_or(UnsupportedTypeError(type_byte))?;

    let mut values = Vec::with_capacity(count as usize);
    let mut next = offset + 3;
    for _ in 0..count {
        let (value, after) = read_primitive(buf, next, element_type)?;
        values.push(value);
        next = after;
    }
    Ok((Array::new(element_type, values), next))
}

/// Reads a map, returning it with the offset after it.
pub fn read_map(buf: &[u8], offset: usize) -> Result<(Map<'_>, usize)> {
    let count = read_u16(buf, offset);
    let key_byte = buf[offset + 2];
    let value_byte = buf[offset + 3];
    let key_type = ElementType::from_byte(key_byte).ok_or(UnsupportedTypeError(key_byte))?;
    let value_type = ElementType::from_byte(value_byte).ok_or(UnsupportedTypeError(value_byte))?;

    let mut data = hashbrown::HashMap::with_capacity(count as usize);
    let mut next = offset + 4;
    for _ in 0..count {
        let (key, after_key) = read_primitive(buf, next, key_type)?;
        let (value, after_value) = if value_type == ElementType::Array {
            let (a, after) = read_array(buf, after_key)?;
            (Value::Array(a), after)
        } else {
            read_primitive(buf, after_key, value_type)?
        };
        data.insert(key, value);
        next = after_value;
    }
    Ok((Map::new(key_type, value_type, data), next))
}

/// Exact encoded size of a string: its bytes plus the 2-byte prefix.
pub fn bytes_needed_for_string(value: &str) -> Result<usize> {
    if value.len() > MAX_STRING_BYTES {
        return Err(StringTooLongError {
            length: value.len(),
        }
        .into());
    }
    Ok(value.len() + 2)
}

/// Exact encoded size of a primitive value.
pub fn bytes_needed_for_primitive(value: &Value<'_>) -> Result<usize> {
    Ok(match value {
        Value::Bool(_) => 1,
        Value::Uint32(_) | Value::Int32(_) | Value::Float32(_) => 4,
        Value::Uint64(_) | Value::Int64(_) | Value::Float64(_) | Value::Time(_) => 8,
        Value::Str(s) => bytes_needed_for_string(s)?,
        Value::Array(_) | Value::Map(_) => {
            return Err(UnsupportedTypeError(value.element_type().as_byte()).into())
        }
    })
}

/// Exact encoded size of an array: 3 header bytes plus its elements.
pub fn bytes_needed_for_array(array: &Array<'_>) -> Result<usize> {
    let mut total = 3usize;
    for value in &array.values {
        total += bytes_needed_for_primitive(value)?;
    }
    Ok(total)
}

/// Exact encoded size of a map: 4 header bytes plus its entries.
pub fn bytes_needed_for_map(map: &Map<'_>) -> Result<usize> {
    let mut total = 4usize;
    for (key, value) in &map.data {
        total += bytes_needed_for_primitive(key)?;
        total += if map.value_type == ElementType::Array {
            match value {
                Value::Array(a) => bytes_needed_for_array(a)?,
                other => {
                    return Err(TypeMismatchError {
                        expected: ElementType::Array,
                        actual: other.element_type(),
                    }
                    .into())
                }
            }
        } else {
            bytes_needed_for_primitive(value)?
        };
    }
    Ok(total)
}

// Total order on primitive values used only to pick a serialization order
// for map entries. Different variants order by type code; maps never
// occur as keys (rejected upstream) and fall back to Equal.
fn serial_cmp(a: &Value<'_>, b: &Value<'_>) -> Ordering {
    match (a, b) {
        (Value::Uint32(x), Value::Uint32(y)) => x.cmp(y),
        (Value::Uint64(x), Value::Uint64(y)) => x.cmp(y),
        (Value::Int32(x), Value::Int32(y)) => x.cmp(y),
        (Value::Int64(x), Value::Int64(y)) => x.cmp(y),
        (Value::Float32(x), Value::Float32(y)) => x.to_bits().cmp(&y.to_bits()),
        (Value::Float64(x), Value::Float64(y)) => x.to_bits().cmp(&y.to_bits()),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::Time(x), Value::Time(y)) => x.cmp(y),
        _ => a
            .element_type()
            .as_byte()
            .cmp(&b.element_type().as_byte()),
    }
}
