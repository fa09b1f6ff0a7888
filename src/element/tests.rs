//! Tests for the element codec

use std::borrow::Cow;

use hashbrown::HashMap;

use super::*;

#[test]
fn type_codes_match_the_wire_format() {
    assert_eq!(ElementType::Null.as_byte(), 0);
    assert_eq!(ElementType::Uint32.as_byte(), b'u');
    assert_eq!(ElementType::Uint64.as_byte(), b'v');
    assert_eq!(ElementType::Int32.as_byte(), b'i');
    assert_eq!(ElementType::Int64.as_byte(), b'l');
    assert_eq!(ElementType::Float32.as_byte(), b'f');
    assert_eq!(ElementType::Float64.as_byte(), b'd');
    assert_eq!(ElementType::Bool.as_byte(), b'b');
    assert_eq!(ElementType::Str.as_byte(), b's');
    assert_eq!(ElementType::Time.as_byte(), b't');
    assert_eq!(ElementType::Array.as_byte(), b'a');
    assert_eq!(ElementType::Map.as_byte(), b'm');
}

#[test]
fn type_codes_round_trip_through_from_byte() {
    for code in [0u8, b'u', b'v', b'i', b'l', b'f', b'd', b'b', b's', b't', b'a', b'm'] {
        let element_type = ElementType::from_byte(code).unwrap();
        assert_eq!(element_type.as_byte(), code);
    }
    assert_eq!(ElementType::from_byte(b'x'), None);
    assert_eq!(ElementType::from_byte(0xFF), None);
}

#[test]
fn primitives_exclude_null_and_composites() {
    assert!(ElementType::Uint32.is_primitive());
    assert!(ElementType::Str.is_primitive());
    assert!(ElementType::Time.is_primitive());
    assert!(!ElementType::Null.is_primitive());
    assert!(!ElementType::Array.is_primitive());
    assert!(!ElementType::Map.is_primitive());
}

#[test]
fn integers_write_little_endian() {
    let mut buf = vec![0u8; 16];

    write_u16(&mut buf, 0, 0x0102);
    assert_eq!(&buf[0..2], &[0x02, 0x01]);
    assert_eq!(read_u16(&buf, 0), 0x0102);

    write_u32(&mut buf, 2, 0xAABBCCDD);
    assert_eq!(&buf[2..6], &[0xDD, 0xCC, 0xBB, 0xAA]);
    assert_eq!(read_u32(&buf, 2), 0xAABBCCDD);

    write_u64(&mut buf, 6, 0x0102030405060708);
    assert_eq!(
        &buf[6..14],
        &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
    );
    assert_eq!(read_u64(&buf, 6), 0x0102030405060708);
}

#[test]
fn bools_write_one_byte() {
    let mut buf = vec![0u8; 2];

    write_bool(&mut buf, 0, true);
    write_bool(&mut buf, 1, false);

    assert_eq!(&buf[..], &[1, 0]);
    assert!(read_bool(&buf, 0));
    assert!(!read_bool(&buf, 1));
}

#[test]
fn empty_string_encodes_as_two_zero_bytes() {
    let mut buf = vec![0xFFu8; 4];

    let next = write_string(&mut buf, 0, "").unwrap();

    assert_eq!(next, 2);
    assert_eq!(&buf[..2], &[0x00, 0x00]);

    let (value, len) = read_string(&buf, 0);
    assert_eq!(value, "");
    assert_eq!(len, 0);
}

#[test]
fn strings_round_trip_with_nul_and_multibyte_bytes() {
    let text = "héllo\0wörld — ❄";
    let mut buf = vec![0u8; 2 + text.len()];

    let next = write_string(&mut buf, 0, text).unwrap();
    assert_eq!(next, 2 + text.len());

    let (value, len) = read_string(&buf, 0);
    assert_eq!(value, text);
    assert_eq!(len as usize, text.len());
}

#[test]
fn string_length_is_capped_at_u16_max() {
    let max = "a".repeat(65535);
    let mut buf = vec![0u8; 2 + max.len()];
    assert!(write_string(&mut buf, 0, &max).is_ok());
    assert_eq!(bytes_needed_for_string(&max).unwrap(), 65535 + 2);

    let too_long = "a".repeat(65536);
    let err = write_string(&mut buf, 0, &too_long).unwrap_err();
    assert_eq!(
        err.downcast_ref::<StringTooLongError>(),
        Some(&StringTooLongError { length: 65536 })
    );
    assert!(bytes_needed_for_string(&too_long).is_err());
}

#[test]
fn write_primitive_checks_the_expected_type() {
    let mut buf = vec![0u8; 8];

    let err = write_primitive(&mut buf, 0, &Value::Uint32(1), ElementType::Int32).unwrap_err();
    assert_eq!(
        err.downcast_ref::<TypeMismatchError>(),
        Some(&TypeMismatchError {
            expected: ElementType::Int32,
            actual: ElementType::Uint32,
        })
    );
    assert!(err.to_string().contains("expected type 'int32'"));
}

#[test]
fn write_primitive_rejects_composites() {
    let mut buf = vec![0u8; 8];
    let value = Value::Array(Array::new(ElementType::Int32, vec![]));

    let err = write_primitive(&mut buf, 0, &value, ElementType::Array).unwrap_err();
    assert!(err.downcast_ref::<UnsupportedTypeError>().is_some());
}

#[test]
fn primitives_round_trip_through_the_codec() {
    let values = [
        Value::Uint32(0xDEADBEEF),
        Value::Uint64(u64::MAX),
        Value::Int32(-2048),
        Value::Int64(i64::MIN),
        Value::Float32(3.5),
        Value::Float64(-0.125),
        Value::Bool(true),
        Value::Str(Cow::Borrowed("hello")),
        Value::Time(1_669_000_000_123_456_789),
    ];

    for value in &values {
        let size = bytes_needed_for_primitive(value).unwrap();
        let mut buf = vec![0u8; size];

        let next = write_primitive(&mut buf, 0, value, value.element_type()).unwrap();
        assert_eq!(next, size);

        let (decoded, after) = read_primitive(&buf, 0, value.element_type()).unwrap();
        assert_eq!(&decoded, value);
        assert_eq!(after, size);
    }
}

#[test]
fn read_primitive_rejects_non_primitive_types() {
    let buf = vec![0u8; 8];

    assert!(read_primitive(&buf, 0, ElementType::Null).is_err());
    assert!(read_primitive(&buf, 0, ElementType::Array).is_err());
    assert!(read_primitive(&buf, 0, ElementType::Map).is_err());
}

#[test]
fn arrays_round_trip_and_lay_out_count_then_type() {
    let array = Array::new(
        ElementType::Int32,
        vec![Value::Int32(1), Value::Int32(-1), Value::Int32(300)],
    );

    let size = bytes_needed_for_array(&array).unwrap();
    assert_eq!(size, 3 + 3 * 4);
    let mut buf = vec![0u8; size];

    let next = write_array(&mut buf, 0, &array).unwrap();
    assert_eq!(next, size);
    assert_eq!(&buf[..3], &[0x03, 0x00, b'i']);

    let (decoded, after) = read_array(&buf, 0).unwrap();
    assert_eq!(decoded, array);
    assert_eq!(after, size);
}

#[test]
fn string_arrays_round_trip() {
    let array = Array::new(
        ElementType::Str,
        vec![
            Value::Str(Cow::Borrowed("foo")),
            Value::Str(Cow::Borrowed("")),
            Value::Str(Cow::Borrowed("hello world")),
        ],
    );

    let size = bytes_needed_for_array(&array).unwrap();
    assert_eq!(size, 3 + (2 + 3) + 2 + (2 + 11));
    let mut buf = vec![0u8; size];

    write_array(&mut buf, 0, &array).unwrap();
    let (decoded, _) = read_array(&buf, 0).unwrap();
    assert_eq!(decoded, array);
}

#[test]
fn array_elements_are_checked_against_the_declared_type() {
    let array = Array::new(
        ElementType::Int32,
        vec![Value::Int32(1), Value::Str(Cow::Borrowed("no"))],
    );
    let mut buf = vec![0u8; 64];

    let err = write_array(&mut buf, 0, &array).unwrap_err();
    assert!(err.downcast_ref::<TypeMismatchError>().is_some());
}

fn sample_map() -> Map<'static> {
    let mut data = HashMap::new();
    data.insert(Value::Str(Cow::Borrowed("a")), Value::Int32(1));
    data.insert(Value::Str(Cow::Borrowed("b")), Value::Int32(2));
    data.insert(Value::Str(Cow::Borrowed("c")), Value::Int32(-3));
    Map::new(ElementType::Str, ElementType::Int32, data)
}

#[test]
fn maps_round_trip() {
    let map = sample_map();

    let size = bytes_needed_for_map(&map).unwrap();
    assert_eq!(size, 4 + 3 * ((2 + 1) + 4));
    let mut buf = vec![0u8; size];

    let next = write_map(&mut buf, 0, &map).unwrap();
    assert_eq!(next, size);
    assert_eq!(&buf[..4], &[0x03, 0x00, b's', b'i']);

    let (decoded, after) = read_map(&buf, 0).unwrap();
    assert_eq!(decoded, map);
    assert_eq!(after, size);
}

#[test]
fn map_serialization_is_deterministic() {
    // Same entries, different insertion order.
    let mut first = HashMap::new();
    first.insert(Value::Str(Cow::Borrowed("x")), Value::Uint64(1));
    first.insert(Value::Str(Cow::Borrowed("y")), Value::Uint64(2));
    first.insert(Value::Str(Cow::Borrowed("z")), Value::Uint64(3));
    let first = Map::new(ElementType::Str, ElementType::Uint64, first);

    let mut second = HashMap::new();
    second.insert(Value::Str(Cow::Borrowed("z")), Value::Uint64(3));
    second.insert(Value::Str(Cow::Borrowed("x")), Value::Uint64(1));
    second.insert(Value::Str(Cow::Borrowed("y")), Value::Uint64(2));
    let second = Map::new(ElementType::Str, ElementType::Uint64, second);

    let size = bytes_needed_for_map(&first).unwrap();
    let mut buf_first = vec![0u8; size];
    let mut buf_second = vec![0u8; size];
    write_map(&mut buf_first, 0, &first).unwrap();
    write_map(&mut buf_second, 0, &second).unwrap();

    assert_eq!(buf_first, buf_second);
}

#[test]
fn maps_with_array_values_round_trip() {
    let mut data = HashMap::new();
    data.insert(
        Value::Uint32(1),
        Value::Array(Array::new(
            ElementType::Str,
            vec![Value::Str(Cow::Borrowed("foo")), Value::Str(Cow::Borrowed("bar"))],
        )),
    );
    data.insert(
        Value::Uint32(2),
        Value::Array(Array::new(ElementType::Int64, vec![Value::Int64(-9)])),
    );
    let map = Map::new(ElementType::Uint32, ElementType::Array, data);

    let size = bytes_needed_for_map(&map).unwrap();
    let mut buf = vec![0u8; size];

    let next = write_map(&mut buf, 0, &map).unwrap();
    assert_eq!(next, size);

    let (decoded, _) = read_map(&buf, 0).unwrap();
    assert_eq!(decoded, map);
}

#[test]
fn values_compare_and_hash_by_bit_pattern() {
    assert_eq!(Value::Float64(1.5), Value::Float64(1.5));
    assert_ne!(Value::Float64(0.0), Value::Float64(-0.0));
    assert_eq!(Value::Float32(f32::NAN), Value::Float32(f32::NAN));

    let mut data = HashMap::new();
    data.insert(Value::Float64(2.5), Value::Bool(true));
    assert_eq!(data.get(&Value::Float64(2.5)), Some(&Value::Bool(true)));
}

#[test]
fn into_owned_detaches_borrowed_strings() {
    let buf = {
        let mut buf = vec![0u8; 7];
        write_string(&mut buf, 0, "hello").unwrap();
        buf
    };

    let owned = {
        let (value, _) = read_primitive(&buf, 0, ElementType::Str).unwrap();
        value.into_owned()
    };
    assert_eq!(owned, Value::Str(Cow::Borrowed("hello")));
}
