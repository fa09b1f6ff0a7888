//! # Element Codec
//!
//! The leaf layer of the storage core: a self-describing binary encoding
//! for typed scalar and composite values, written to and read from a byte
//! buffer at an offset.
//!
//! ## Type Codes
//!
//! Every element type has a one-byte discriminant:
//!
//! | Code | Type | Width (bytes) | Kind |
//! |------|------|---------------|------|
//! | `\0` | null | 0 | sentinel |
//! | `u` | uint32 | 4 | primitive |
//! | `v` | uint64 | 8 | primitive |
//! | `i` | int32 | 4 | primitive |
//! | `l` | int64 | 8 | primitive |
//! | `f` | float32 | 4 | primitive |
//! | `d` | float64 | 8 | primitive |
//! | `b` | bool | 1 | primitive |
//! | `s` | string | 2 + N | primitive |
//! | `t` | timestamp | 8 | primitive |
//! | `a` | array | 3 + Σ | composite |
//! | `m` | map | 4 + Σ | composite |
//!
//! All multi-byte integers are little-endian. A string is a 2-byte length
//! prefix followed by its raw bytes (at most 65,535 of them). A timestamp
//! is nanoseconds since the Unix epoch as a signed 64-bit integer stored
//! in the uint64 slot. An array is a 2-byte element count, a 1-byte
//! element type, then the element encodings; a map is a 2-byte entry
//! count, a key type byte, a value type byte, then (key, value) pairs.
//!
//! ## Design
//!
//! The codec is a set of pure functions over `(buffer, offset)`. Callers
//! pre-size buffers using the `bytes_needed_for_*` queries; the write and
//! read functions assume the buffer is adequately sized and never
//! allocate, except for string decoding. Errors are values, never panics.
//!
//! ## Module Structure
//!
//! - `types`: [`ElementType`], the [`Value`] sum type, [`Array`], [`Map`],
//!   and the codec error types
//! - `codec`: write/read/size functions

mod codec;
mod types;

#[cfg(test)]
mod tests;

pub use codec::{
    bytes_needed_for_array, bytes_needed_for_map, bytes_needed_for_primitive,
    bytes_needed_for_string, read_array, read_bool, read_map, read_primitive, read_string,
    read_u16, read_u32, read_u64, write_array, write_bool, write_map, write_primitive,
    write_string, write_u16, write_u32, write_u64,
};
pub use types::{
    Array, ElementType, Map, StringTooLongError, TypeMismatchError, UnsupportedTypeError, Value,
};
