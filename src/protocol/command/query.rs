use crate::constant::{CommandByte, ServerStatusFlags};
use crate::error::{Error, Result};
use crate::protocol::TextRowPayload;
use crate::protocol::packet::MAX_PAYLOAD_LENGTH;
use crate::protocol::primitive::*;
use crate::protocol::response::{ErrPayloadBytes, OkPayload, OkPayloadBytes, read_eof_status};

/// Write COM_QUERY command
///
/// The statement bytes are sent verbatim.
pub fn write_query(out: &mut Vec<u8>, sql: &[u8]) {
    write_int_1(out, CommandByte::Query as u8);
    out.extend_from_slice(sql);
}

/// Query response variants
#[derive(Debug)]
pub enum QueryResponse<'a> {
    Ok(OkPayloadBytes<'a>),
    ResultSet { column_count: u64 },
}

/// Read COM_QUERY response
/// This can be:
/// - 0xFF: ERR packet (error occurred)
/// - 0x00: OK packet (query succeeded without result set)
/// - 0xFB: LOCAL INFILE packet (not supported)
/// - Otherwise: Result set (first byte is column count as length-encoded integer)
pub fn read_query_response(payload: &[u8]) -> Result<QueryResponse<'_>> {
    match payload.first() {
        None => Err(Error::InvalidPacket),
        Some(0xFF) => Err(ErrPayloadBytes(payload).into()),
        Some(0x00) => Ok(QueryResponse::Ok(OkPayloadBytes(payload))),
        Some(0xFB) => Err(Error::BadConfigError(
            "LOCAL INFILE queries are not supported".to_string(),
        )),
        Some(_) => {
            let (column_count, _rest) = read_int_lenenc(payload)?;
            Ok(QueryResponse::ResultSet { column_count })
        }
    }
}

/// One packet read while iterating a text result set
#[derive(Debug)]
pub enum RowPacket<'a> {
    Row(TextRowPayload<'a>),
    /// End of the result set
    End {
        affected_rows: u64,
        status_flags: ServerStatusFlags,
    },
}

/// Classify a packet read after the column definitions.
///
/// A valid row's first item is NULL (0xFB) or string<lenenc>, and string<lenenc>
/// cannot start with 0xFF, so 0xFF always means ERR. A row starting with 0xFE
/// needs a string of at least 2^24 bytes, which only fits in a maximum-size packet;
/// any shorter 0xFE packet is the terminator.
pub fn read_row_packet(payload: &[u8], deprecate_eof: bool) -> Result<RowPacket<'_>> {
    match payload.first() {
        None => Err(Error::InvalidPacket),
        Some(0xFF) => Err(ErrPayloadBytes(payload).into()),
        Some(0xFE) if payload.len() < MAX_PAYLOAD_LENGTH => {
            if deprecate_eof {
                let ok = OkPayload::try_from(OkPayloadBytes(payload))?;
                Ok(RowPacket::End {
                    affected_rows: ok.affected_rows,
                    status_flags: ok.status_flags,
                })
            } else {
                Ok(RowPacket::End {
                    affected_rows: 0,
                    status_flags: read_eof_status(payload)?,
                })
            }
        }
        Some(_) => Ok(RowPacket::Row(TextRowPayload(payload))),
    }
}
