//! Element type codes, the runtime value representation, and the codec
//! error types.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use hashbrown::HashMap;
use thiserror::Error;

/// One-byte discriminant identifying an element type on disk.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Null = 0,
    Uint32 = b'u',
    Uint64 = b'v',
    Int32 = b'i',
    Int64 = b'l',
    Float32 = b'f',
    Float64 = b'd',
    Bool = b'b',
    Str = b's',
    Time = b't',
    Array = b'a',
    Map = b'm',
}

impl ElementType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(ElementType::Null),
            b'u' => Some(ElementType::Uint32),
            b'v' => Some(ElementType::Uint64),
            b'i' => Some(ElementType::Int32),
            b'l' => Some(ElementType::Int64),
            b'f' => Some(ElementType::Float32),
            b'd' => Some(ElementType::Float64),
            b'b' => Some(ElementType::Bool),
            b's' => Some(ElementType::Str),
            b't' => Some(ElementType::Time),
            b'a' => Some(ElementType::Array),
            b'm' => Some(ElementType::Map),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// True for every type except the null sentinel and the composites.
    pub fn is_primitive(self) -> bool {
        !matches!(
            self,
            ElementType::Null | ElementType::Array | ElementType::Map
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::Null => "null",
            ElementType::Uint32 => "uint32",
            ElementType::Uint64 => "uint64",
            ElementType::Int32 => "int32",
            ElementType::Int64 => "int64",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
            ElementType::Bool => "bool",
            ElementType::Str => "string",
            ElementType::Time => "time",
            ElementType::Array => "array",
            ElementType::Map => "map",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a value disagrees with the type declared for its
/// position, element, key, or value slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected type '{expected}', got '{actual}'")]
pub struct TypeMismatchError {
    pub expected: ElementType,
    pub actual: ElementType,
}

/// Returned when a type byte is outside the closed set, or a composite
/// value turns up where a primitive is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unsupported element type 0x{0:02x}")]
pub struct UnsupportedTypeError(pub u8);

/// Returned when a string does not fit its u16 length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("string of {length} bytes does not fit a u16 length prefix")]
pub struct StringTooLongError {
    pub length: usize,
}

/// Runtime representation of an element. Variants map one-to-one onto the
/// type codes; strings borrow from the underlying buffer when decoded.
#[derive(Debug, Clone)]
pub enum Value<'a> {
    Uint32(u32),
    Uint64(u64),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    Str(Cow<'a, str>),
    /// Nanoseconds since the Unix epoch.
    Time(i64),
    Array(Array<'a>),
    Map(Map<'a>),
}

impl<'a> Value<'a> {
    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Uint32(_) => ElementType::Uint32,
            Value::Uint64(_) => ElementType::Uint64,
            Value::Int32(_) => ElementType::Int32,
            Value::Int64(_) => ElementType::Int64,
            Value::Float32(_) => ElementType::Float32,
            Value::Float64(_) => ElementType::Float64,
            Value::Bool(_) => ElementType::Bool,
            Value::Str(_) => ElementType::Str,
            Value::Time(_) => ElementType::Time,
            Value::Array(_) => ElementType::Array,
            Value::Map(_) => ElementType::Map,
        }
    }

    /// Detaches the value from the buffer it was decoded from.
    pub fn into_owned(self) -> Value<'static> {
        match self {
            Value::Uint32(v) => Value::Uint32(v),
            Value::Uint64(v) => Value::Uint64(v),
            Value::Int32(v) => Value::Int32(v),
            Value::Int64(v) => Value::Int64(v),
            Value::Float32(v) => Value::Float32(v),
            Value::Float64(v) => Value::Float64(v),
            Value::Bool(v) => Value::Bool(v),
            Value::Str(s) => Value::Str(Cow::Owned(s.into_owned())),
            Value::Time(v) => Value::Time(v),
            Value::Array(a) => Value::Array(a.into_owned()),
            Value::Map(m) => Value::Map(m.into_owned()),
        }
    }
}

// Floats compare and hash by bit pattern: two values are equal exactly
// when their encodings are equal, which is the identity the on-disk
// format cares about (and it makes Value a valid hash-map key).
impl PartialEq for Value<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Uint32(a), Value::Uint32(b)) => a == b,
            (Value::Uint64(a), Value::Uint64(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float32(a), Value::Float32(b)) => a.to_bits() == b.to_bits(),
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value<'_> {}

impl Hash for Value<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.element_type().as_byte().hash(state);
        match self {
            Value::Uint32(v) => v.hash(state),
            Value::Uint64(v) => v.hash(state),
            Value::Int32(v) => v.hash(state),
            Value::Int64(v) => v.hash(state),
            Value::Float32(v) => v.to_bits().hash(state),
            Value::Float64(v) => v.to_bits().hash(state),
            Value::Bool(v) => v.hash(state),
            Value::Str(s) => s.hash(state),
            Value::Time(v) => v.hash(state),
            Value::Array(a) => a.hash(state),
            Value::Map(m) => m.hash(state),
        }
    }
}

/// An array of primitive elements, all of one declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Array<'a> {
    pub element_type: ElementType,
    pub values: Vec<Value<'a>>,
}

impl<'a> Array<'a> {
    pub fn new(element_type: ElementType, values: Vec<Value<'a>>) -> Self {
        Self {
            element_type,
            values,
        }
    }

    pub fn into_owned(self) -> Array<'static> {
        Array {
            element_type: self.element_type,
            values: self.values.into_iter().map(Value::into_owned).collect(),
        }
    }
}

/// A map with primitive keys and primitive-or-array values. Iteration
/// order is unspecified; the codec serializes entries in key order so
/// equal maps produce identical bytes.
#[derive(Debug, Clone)]
pub struct Map<'a> {
    pub key_type: ElementType,
    pub value_type: ElementType,
    pub data: HashMap<Value<'a>, Value<'a>>,
}

impl<'a> Map<'a> {
    pub fn new(
        key_type: ElementType,
        value_type: ElementType,
        data: HashMap<Value<'a>, Value<'a>>,
    ) -> Self {
        Self {
            key_type,
            value_type,
            data,
        }
    }

    pub fn into_owned(self) -> Map<'static> {
        Map {
            key_type: self.key_type,
            value_type: self.value_type,
            data: self
                .data
                .into_iter()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }
}

impl PartialEq for Map<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.key_type == other.key_type
            && self.value_type == other.value_type
            && self.data == other.data
    }
}

impl Eq for Map<'_> {}

// Hashing only the shape keeps the impl order-independent; equal maps
// have equal shapes, which is all Hash must guarantee. Maps are rejected
// as map keys before lookups ever hash one.
impl Hash for Map<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key_type.hash(state);
        self.value_type.hash(state);
        self.data.len().hash(state);
    }
}
