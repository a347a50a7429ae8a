use crate::constant::ServerStatusFlags;
use crate::error::{Error, Result};
use crate::protocol::primitive::*;

/// OK packet payload (raw)
///
/// Layout: 0x00 (or 0xFE when it terminates a result set) followed by:
/// - affected_rows: length-encoded integer
/// - last_insert_id: length-encoded integer
/// - status_flags: 2 bytes
/// - warnings: 2 bytes
/// - info: variable-length string
#[derive(Debug, Clone, Copy)]
pub struct OkPayloadBytes<'a>(pub &'a [u8]);

/// ERR packet payload (raw)
#[derive(Debug, Clone, Copy)]
pub struct ErrPayloadBytes<'a>(pub &'a [u8]);

/// OK packet response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OkPayload {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: ServerStatusFlags,
    pub warnings: u16,
}

impl TryFrom<OkPayloadBytes<'_>> for OkPayload {
    type Error = Error;

    fn try_from(bytes: OkPayloadBytes<'_>) -> Result<Self> {
        let (header, data) = read_int_1(bytes.0)?;
        if header != 0x00 && header != 0xFE {
            return Err(Error::InvalidPacket);
        }

        let (affected_rows, rest) = read_int_lenenc(data)?;
        let (last_insert_id, rest) = read_int_lenenc(rest)?;
        let (status_flags, rest) = read_int_2(rest)?;
        let (warnings, _info) = read_int_2(rest)?;

        Ok(OkPayload {
            affected_rows,
            last_insert_id,
            status_flags: ServerStatusFlags::from_bits_truncate(status_flags),
            warnings,
        })
    }
}

/// ERR packet response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("ERROR {} ({}): {}", self.error_code, self.sql_state, self.message)]
pub struct ErrPayload {
    pub error_code: u16,
    pub sql_state: String,
    pub message: String,
}

impl TryFrom<ErrPayloadBytes<'_>> for ErrPayload {
    type Error = Error;

    fn try_from(bytes: ErrPayloadBytes<'_>) -> Result<Self> {
        let (header, data) = read_int_1(bytes.0)?;
        if header != 0xFF {
            return Err(Error::InvalidPacket);
        }

        let (error_code, data) = read_int_2(data)?;

        // Check for SQL state marker '#'
        let (sql_state, rest) = match data.split_first() {
            Some((b'#', rest)) => {
                let (state_bytes, rest) = read_string_fix(rest, 5)?;
                (String::from_utf8_lossy(state_bytes).into_owned(), rest)
            }
            _ => (String::new(), data),
        };

        Ok(ErrPayload {
            error_code,
            sql_state,
            message: String::from_utf8_lossy(rest).into_owned(),
        })
    }
}

/// Status flags of a pre-4.1 style EOF packet (0xFE, warnings, status)
pub fn read_eof_status(payload: &[u8]) -> Result<ServerStatusFlags> {
    let (header, data) = read_int_1(payload)?;
    if header != 0xFE {
        return Err(Error::InvalidPacket);
    }
    let (_warnings, data) = read_int_2(data)?;
    let (status_flags, _) = read_int_2(data)?;
    Ok(ServerStatusFlags::from_bits_truncate(status_flags))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok_packet() {
        // affected_rows=3, last_insert_id=0, status=AUTOCOMMIT, warnings=1
        let payload = [0x00, 0x03, 0x00, 0x02, 0x00, 0x01, 0x00];
        let ok = OkPayload::try_from(OkPayloadBytes(&payload)).unwrap();
        assert_eq!(ok.affected_rows, 3);
        assert_eq!(ok.last_insert_id, 0);
        assert!(ok.status_flags.contains(ServerStatusFlags::SERVER_STATUS_AUTOCOMMIT));
        assert_eq!(ok.warnings, 1);
    }

    #[test]
    fn test_parse_result_set_terminator() {
        let payload = [0xFE, 0x00, 0x00, 0x22, 0x00, 0x00, 0x00];
        let ok = OkPayload::try_from(OkPayloadBytes(&payload)).unwrap();
        assert_eq!(ok.affected_rows, 0);
        assert!(ok.status_flags.contains(ServerStatusFlags::SERVER_STATUS_LAST_ROW_SENT));
    }

    #[test]
    fn test_parse_err_packet() {
        let mut payload = vec![0xFF, 0x7A, 0x04, b'#'];
        payload.extend_from_slice(b"42S02");
        payload.extend_from_slice(b"Table 'test.missing' doesn't exist");
        let err = ErrPayload::try_from(ErrPayloadBytes(&payload)).unwrap();
        assert_eq!(err.error_code, 1146);
        assert_eq!(err.sql_state, "42S02");
        assert_eq!(
            err.to_string(),
            "ERROR 1146 (42S02): Table 'test.missing' doesn't exist"
        );
    }

    #[test]
    fn test_parse_err_packet_without_sql_state() {
        let mut payload = vec![0xFF, 0x15, 0x04];
        payload.extend_from_slice(b"Access denied");
        let err = ErrPayload::try_from(ErrPayloadBytes(&payload)).unwrap();
        assert_eq!(err.error_code, 1045);
        assert!(err.sql_state.is_empty());
        assert_eq!(err.message, "Access denied");
    }

    #[test]
    fn test_eof_status() {
        let status = read_eof_status(&[0xFE, 0x00, 0x00, 0x08, 0x00]).unwrap();
        assert!(status.contains(ServerStatusFlags::SERVER_MORE_RESULTS_EXISTS));
        assert!(read_eof_status(&[0x00, 0x00, 0x00, 0x00, 0x00]).is_err());
    }
}
