use crate::constant::{
    CAPABILITIES_ALWAYS_ENABLED, CAPABILITIES_REQUIRED, CapabilityFlags, ColumnType,
};

#[test]
fn test_required_capabilities_are_requested() {
    assert!(
        CAPABILITIES_ALWAYS_ENABLED.contains(CAPABILITIES_REQUIRED),
        "every capability required from the server must also be requested"
    );
}

#[test]
fn test_unsupported_capabilities_are_never_requested() {
    for flag in [
        CapabilityFlags::CLIENT_SSL,
        CapabilityFlags::CLIENT_COMPRESS,
        CapabilityFlags::CLIENT_LOCAL_FILES,
        CapabilityFlags::CLIENT_MULTI_STATEMENTS,
        CapabilityFlags::CLIENT_FOUND_ROWS,
        CapabilityFlags::CLIENT_OPTIONAL_RESULTSET_METADATA,
    ] {
        assert!(
            !CAPABILITIES_ALWAYS_ENABLED.contains(flag),
            "{flag:?} must not be requested"
        );
    }
}

#[test]
fn test_column_type_round_trips_through_u8() {
    for byte in 0..=u8::MAX {
        if let Some(column_type) = ColumnType::from_u8(byte) {
            assert_eq!(column_type as u8, byte);
        }
    }
}

#[test]
fn test_column_type_gaps_are_unknown() {
    assert_eq!(ColumnType::from_u8(0x15), None);
    assert_eq!(ColumnType::from_u8(0xf0), None);
    assert_eq!(ColumnType::from_u8(0xf4), None);
}

#[test]
fn test_column_type_names() {
    assert_eq!(ColumnType::MYSQL_TYPE_LONGLONG.name(), "BIGINT");
    assert_eq!(ColumnType::MYSQL_TYPE_NEWDECIMAL.name(), "DECIMAL");
    assert_eq!(ColumnType::MYSQL_TYPE_VAR_STRING.name(), "VARCHAR");
    assert_eq!(ColumnType::MYSQL_TYPE_DATETIME2.name(), "DATETIME");
    assert_eq!(ColumnType::MYSQL_TYPE_STRING.name(), "CHAR");
    assert_eq!(ColumnType::MYSQL_TYPE_BLOB.name(), "TEXT");
}

#[test]
fn test_binary_column_type_names() {
    assert_eq!(ColumnType::MYSQL_TYPE_VAR_STRING.binary_name(), "VARBINARY");
    assert_eq!(ColumnType::MYSQL_TYPE_STRING.binary_name(), "BINARY");
    assert_eq!(ColumnType::MYSQL_TYPE_BLOB.binary_name(), "BLOB");
    assert_eq!(ColumnType::MYSQL_TYPE_LONG_BLOB.binary_name(), "LONGBLOB");
    assert_eq!(ColumnType::MYSQL_TYPE_LONGLONG.binary_name(), "BIGINT");
}
