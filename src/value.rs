//! Column values decoded from the MySQL text protocol
use std::borrow::Cow;
use std::fmt::Write as _;

use crate::constant::{BINARY_CHARSET, ColumnFlags, ColumnType};
use crate::error::{Error, Result};
use crate::protocol::command::ColumnDefinition;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value
    Null,
    /// Signed integer (TINYINT, SMALLINT, MEDIUMINT, INT, BIGINT)
    SignedInt(i64),
    /// Any integer column carrying UNSIGNED_FLAG
    UnsignedInt(u64),
    /// FLOAT - 4-byte floating point
    Float(f32),
    /// DOUBLE - 8-byte floating point
    Double(f64),
    /// DECIMAL, kept in the server's exact text form
    Decimal(String),
    /// DATE, TIME, DATETIME, TIMESTAMP, YEAR as formatted by the server
    Temporal(String),
    /// Character data; validated as UTF-8 when rendered
    Text(Vec<u8>),
    /// Binary strings, BIT, GEOMETRY
    Bytes(Vec<u8>),
}

impl Value {
    /// Decode one text protocol field of `column`. `None` is SQL NULL.
    pub fn from_text(column: &ColumnDefinition, data: Option<&[u8]>) -> Result<Self> {
        let Some(data) = data else {
            return Ok(Value::Null);
        };
        let unsigned = column.flags.contains(ColumnFlags::UNSIGNED_FLAG);
        let binary = column.charset == BINARY_CHARSET;

        let Some(column_type) = column.column_type() else {
            return Ok(if binary {
                Value::Bytes(data.to_vec())
            } else {
                Value::Text(data.to_vec())
            });
        };

        match column_type {
            ColumnType::MYSQL_TYPE_NULL => Ok(Value::Null),

            ColumnType::MYSQL_TYPE_TINY
            | ColumnType::MYSQL_TYPE_SHORT
            | ColumnType::MYSQL_TYPE_INT24
            | ColumnType::MYSQL_TYPE_LONG
            | ColumnType::MYSQL_TYPE_LONGLONG => {
                let text = ascii(column, data)?;
                let value = if unsigned {
                    text.parse().map(Value::UnsignedInt)
                } else {
                    text.parse().map(Value::SignedInt)
                };
                value.map_err(|_| Error::InvalidPacket)
            }

            ColumnType::MYSQL_TYPE_FLOAT => ascii(column, data)?
                .parse()
                .map(Value::Float)
                .map_err(|_| Error::InvalidPacket),
            ColumnType::MYSQL_TYPE_DOUBLE => ascii(column, data)?
                .parse()
                .map(Value::Double)
                .map_err(|_| Error::InvalidPacket),

            ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                Ok(Value::Decimal(ascii(column, data)?.to_owned()))
            }

            ColumnType::MYSQL_TYPE_DATE
            | ColumnType::MYSQL_TYPE_NEWDATE
            | ColumnType::MYSQL_TYPE_TIME
            | ColumnType::MYSQL_TYPE_TIME2
            | ColumnType::MYSQL_TYPE_DATETIME
            | ColumnType::MYSQL_TYPE_DATETIME2
            | ColumnType::MYSQL_TYPE_TIMESTAMP
            | ColumnType::MYSQL_TYPE_TIMESTAMP2
            | ColumnType::MYSQL_TYPE_YEAR => Ok(Value::Temporal(ascii(column, data)?.to_owned())),

            ColumnType::MYSQL_TYPE_BIT
            | ColumnType::MYSQL_TYPE_GEOMETRY
            | ColumnType::MYSQL_TYPE_VECTOR => Ok(Value::Bytes(data.to_vec())),

            // VARCHAR, CHAR, BLOB/TEXT, ENUM, SET, JSON
            _ if binary => Ok(Value::Bytes(data.to_vec())),
            _ => Ok(Value::Text(data.to_vec())),
        }
    }

    /// The default textual rendering of the value. NULL renders as the empty string.
    ///
    /// Fails for character data that is not valid UTF-8.
    pub fn to_text(&self) -> Result<Cow<'_, str>> {
        Ok(match self {
            Value::Null => Cow::Borrowed(""),
            Value::SignedInt(v) => Cow::Owned(v.to_string()),
            Value::UnsignedInt(v) => Cow::Owned(v.to_string()),
            Value::Float(v) => Cow::Owned(v.to_string()),
            Value::Double(v) => Cow::Owned(v.to_string()),
            Value::Decimal(s) | Value::Temporal(s) => Cow::Borrowed(s.as_str()),
            Value::Text(bytes) => Cow::Borrowed(simdutf8::basic::from_utf8(bytes).map_err(
                |_| Error::Encoding(format!("{} bytes of invalid UTF-8", bytes.len())),
            )?),
            Value::Bytes(bytes) => {
                let mut hex = String::with_capacity(2 + bytes.len() * 2);
                hex.push_str("\\x");
                for byte in bytes {
                    let _ = write!(hex, "{byte:02x}");
                }
                Cow::Owned(hex)
            }
        })
    }
}

fn ascii<'a>(column: &ColumnDefinition, data: &'a [u8]) -> Result<&'a str> {
    simdutf8::basic::from_utf8(data).map_err(|_| {
        Error::Encoding(format!(
            "column `{}` sent a non-text {:?} value",
            column.name_alias,
            column.column_type()
        ))
    })
}
