use crate::error::Result;
use crate::protocol::primitive::read_string_lenenc;

/// The payload part of a text protocol row packet.
#[derive(Debug, Clone, Copy)]
pub struct TextRowPayload<'a>(pub &'a [u8]);

impl<'a> TextRowPayload<'a> {
    /// Iterate the fields of the row: `None` for NULL (0xFB), otherwise the raw bytes
    pub fn fields(self) -> TextRowFields<'a> {
        TextRowFields { rest: self.0 }
    }
}

#[derive(Debug, Clone)]
pub struct TextRowFields<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for TextRowFields<'a> {
    type Item = Result<Option<&'a [u8]>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rest.split_first() {
            None => None,
            Some((0xFB, rest)) => {
                self.rest = rest;
                Some(Ok(None))
            }
            Some(_) => match read_string_lenenc(self.rest) {
                Ok((field, rest)) => {
                    self.rest = rest;
                    Some(Ok(Some(field)))
                }
                Err(e) => {
                    self.rest = &[];
                    Some(Err(e))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_row_fields() {
        let payload = [0x01, b'7', 0xFB, 0x00, 0x03, b'a', b'b', b'c'];
        let fields: Vec<_> = TextRowPayload(&payload)
            .fields()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            fields,
            vec![Some(&b"7"[..]), None, Some(&b""[..]), Some(&b"abc"[..])]
        );
    }

    #[test]
    fn test_text_row_truncated_field() {
        let payload = [0x05, b'a', b'b'];
        let mut fields = TextRowPayload(&payload).fields();
        assert!(fields.next().unwrap().is_err());
        assert!(fields.next().is_none());
    }
}
