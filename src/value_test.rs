use crate::constant::{BINARY_CHARSET, ColumnFlags, ColumnType, UTF8MB4_GENERAL_CI};
use crate::error::Error;
use crate::protocol::command::ColumnDefinition;
use crate::value::Value;

fn column(column_type: ColumnType, flags: ColumnFlags, charset: u16) -> ColumnDefinition {
    ColumnDefinition {
        schema: "test".to_string(),
        table_alias: "t".to_string(),
        name_alias: "c".to_string(),
        name_original: "c".to_string(),
        charset,
        column_length: 255,
        column_type_id: column_type as u8,
        flags,
        decimals: 0,
    }
}

fn text_column(column_type: ColumnType) -> ColumnDefinition {
    column(column_type, ColumnFlags::empty(), UTF8MB4_GENERAL_CI as u16)
}

#[test]
fn test_null_field() {
    let col = text_column(ColumnType::MYSQL_TYPE_LONG);
    let value = Value::from_text(&col, None).unwrap();
    assert_eq!(value, Value::Null);
    assert_eq!(value.to_text().unwrap(), "");
}

#[test]
fn test_signed_and_unsigned_integers() {
    let col = column(ColumnType::MYSQL_TYPE_LONGLONG, ColumnFlags::empty(), BINARY_CHARSET);
    assert_eq!(
        Value::from_text(&col, Some(b"-9223372036854775808")).unwrap(),
        Value::SignedInt(i64::MIN)
    );

    let col = column(
        ColumnType::MYSQL_TYPE_LONGLONG,
        ColumnFlags::UNSIGNED_FLAG,
        BINARY_CHARSET,
    );
    let value = Value::from_text(&col, Some(b"18446744073709551615")).unwrap();
    assert_eq!(value, Value::UnsignedInt(u64::MAX));
    assert_eq!(value.to_text().unwrap(), "18446744073709551615");
}

#[test]
fn test_integer_garbage_is_invalid_packet() {
    let col = column(ColumnType::MYSQL_TYPE_TINY, ColumnFlags::empty(), BINARY_CHARSET);
    assert!(matches!(
        Value::from_text(&col, Some(b"12x")),
        Err(Error::InvalidPacket)
    ));
}

#[test]
fn test_floats() {
    let col = column(ColumnType::MYSQL_TYPE_FLOAT, ColumnFlags::empty(), BINARY_CHARSET);
    let value = Value::from_text(&col, Some(b"3.25")).unwrap();
    assert_eq!(value, Value::Float(3.25));
    assert_eq!(value.to_text().unwrap(), "3.25");

    let col = column(ColumnType::MYSQL_TYPE_DOUBLE, ColumnFlags::empty(), BINARY_CHARSET);
    let value = Value::from_text(&col, Some(b"-0.5")).unwrap();
    assert_eq!(value.to_text().unwrap(), "-0.5");
}

#[test]
fn test_decimal_keeps_exact_text() {
    let col = column(ColumnType::MYSQL_TYPE_NEWDECIMAL, ColumnFlags::empty(), BINARY_CHARSET);
    let value = Value::from_text(&col, Some(b"12345678901234567890.000100")).unwrap();
    assert_eq!(value.to_text().unwrap(), "12345678901234567890.000100");
}

#[test]
fn test_temporal_values() {
    for (column_type, text) in [
        (ColumnType::MYSQL_TYPE_DATE, "2024-02-29"),
        (ColumnType::MYSQL_TYPE_DATETIME, "2024-02-29 13:45:00.250000"),
        (ColumnType::MYSQL_TYPE_TIME, "-838:59:59"),
        (ColumnType::MYSQL_TYPE_YEAR, "2024"),
    ] {
        let col = column(column_type, ColumnFlags::empty(), BINARY_CHARSET);
        let value = Value::from_text(&col, Some(text.as_bytes())).unwrap();
        assert_eq!(value, Value::Temporal(text.to_string()));
        assert_eq!(value.to_text().unwrap(), text);
    }
}

#[test]
fn test_character_data() {
    let col = text_column(ColumnType::MYSQL_TYPE_VAR_STRING);
    let value = Value::from_text(&col, Some("héllo, \"wörld\"".as_bytes())).unwrap();
    assert_eq!(value.to_text().unwrap(), "héllo, \"wörld\"");

    // empty string is not NULL
    let value = Value::from_text(&col, Some(b"")).unwrap();
    assert_eq!(value, Value::Text(Vec::new()));
    assert_eq!(value.to_text().unwrap(), "");
}

#[test]
fn test_invalid_utf8_fails_to_render() {
    let col = text_column(ColumnType::MYSQL_TYPE_BLOB);
    let value = Value::from_text(&col, Some(&[0x61, 0xff, 0x62])).unwrap();
    assert!(matches!(value.to_text(), Err(Error::Encoding(_))));
}

#[test]
fn test_binary_strings_render_as_hex() {
    let col = column(ColumnType::MYSQL_TYPE_BLOB, ColumnFlags::BINARY_FLAG, BINARY_CHARSET);
    let value = Value::from_text(&col, Some(&[0xde, 0xad, 0x00, 0x0f])).unwrap();
    assert_eq!(value, Value::Bytes(vec![0xde, 0xad, 0x00, 0x0f]));
    assert_eq!(value.to_text().unwrap(), "\\xdead000f");

    let col = column(ColumnType::MYSQL_TYPE_BIT, ColumnFlags::UNSIGNED_FLAG, BINARY_CHARSET);
    let value = Value::from_text(&col, Some(&[0x05])).unwrap();
    assert_eq!(value.to_text().unwrap(), "\\x05");
}

#[test]
fn test_json_is_text() {
    let col = column(ColumnType::MYSQL_TYPE_JSON, ColumnFlags::empty(), UTF8MB4_GENERAL_CI as u16);
    let value = Value::from_text(&col, Some(br#"{"a": [1, 2]}"#)).unwrap();
    assert_eq!(value.to_text().unwrap(), r#"{"a": [1, 2]}"#);
}
