//! Comma-separated records.
//!
//! Quoting follows the classic CSV writer: a field is quoted when it contains a
//! comma, a quote, CR or LF, when it starts with whitespace, or when it is `\.`.
//! Quotes inside a quoted field are doubled. Records end with `\n`.

/// Append `fields` as one record, including the `\n` terminator
pub fn write_record<I, S>(out: &mut Vec<u8>, fields: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    write_fields(out, fields);
    out.push(b'\n');
}

/// Append `fields` separated by commas, without a terminator
///
/// A single empty field is written as `""` so the record is not mistaken for a blank line.
pub fn write_fields<I, S>(out: &mut Vec<u8>, fields: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let start = out.len();
    let mut count = 0usize;
    for field in fields {
        if count > 0 {
            out.push(b',');
        }
        write_field(out, field.as_ref());
        count += 1;
    }
    if count == 1 && out.len() == start {
        out.extend_from_slice(b"\"\"");
    }
}

fn write_field(out: &mut Vec<u8>, field: &str) {
    if !needs_quotes(field) {
        out.extend_from_slice(field.as_bytes());
        return;
    }
    out.push(b'"');
    for (i, chunk) in field.split('"').enumerate() {
        if i > 0 {
            out.extend_from_slice(b"\"\"");
        }
        out.extend_from_slice(chunk.as_bytes());
    }
    out.push(b'"');
}

fn needs_quotes(field: &str) -> bool {
    if field.is_empty() {
        return false;
    }
    if field == r"\." {
        return true;
    }
    if field.bytes().any(|b| matches!(b, b',' | b'"' | b'\r' | b'\n')) {
        return true;
    }
    field.chars().next().is_some_and(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn record(fields: &[&str]) -> String {
        let mut out = Vec::new();
        write_record(&mut out, fields);
        String::from_utf8(out).unwrap()
    }

    /// Minimal reader for the records written above
    fn parse(input: &str) -> Vec<Vec<String>> {
        let mut records = Vec::new();
        let mut record = Vec::new();
        let mut field = String::new();
        let mut chars = input.chars().peekable();
        let mut quoted = false;
        let mut at_field_start = true;

        while let Some(c) = chars.next() {
            if quoted {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        quoted = false;
                    }
                } else {
                    field.push(c);
                }
                continue;
            }
            match c {
                '"' if at_field_start => {
                    quoted = true;
                    at_field_start = false;
                }
                ',' => {
                    record.push(std::mem::take(&mut field));
                    at_field_start = true;
                }
                '\n' => {
                    if !(record.is_empty() && field.is_empty() && at_field_start) {
                        record.push(std::mem::take(&mut field));
                    }
                    records.push(std::mem::take(&mut record));
                    at_field_start = true;
                }
                c => {
                    field.push(c);
                    at_field_start = false;
                }
            }
        }
        records
    }

    #[test]
    fn test_plain_fields() {
        assert_eq!(record(&["id", "name", "42"]), "id,name,42\n");
    }

    #[test]
    fn test_quoting_rules() {
        assert_eq!(record(&["a,b"]), "\"a,b\"\n");
        assert_eq!(record(&["say \"hi\""]), "\"say \"\"hi\"\"\"\n");
        assert_eq!(record(&["line\nbreak", "cr\r"]), "\"line\nbreak\",\"cr\r\"\n");
        assert_eq!(record(&[" lead", "trail "]), "\" lead\",trail \n");
        assert_eq!(record(&["\u{a0}nbsp"]), "\"\u{a0}nbsp\"\n");
        assert_eq!(record(&[r"\."]), "\"\\.\"\n");
        assert_eq!(record(&[r"\.x"]), "\\.x\n");
    }

    #[test]
    fn test_empty_fields() {
        assert_eq!(record(&["", "x", ""]), ",x,\n");
        assert_eq!(record(&[""]), "\"\"\n");
        assert_eq!(record(&["", ""]), ",\n");
        assert_eq!(record(&[]), "\n");
    }

    #[test]
    fn test_fields_without_terminator() {
        let mut out = Vec::new();
        write_fields(&mut out, ["BIGINT", "VARCHAR"]);
        assert_eq!(out, b"BIGINT,VARCHAR");
    }

    #[test]
    fn test_records_parse_back() {
        let rows: Vec<Vec<&str>> = vec![
            vec!["id", "comment", "empty"],
            vec!["1", "plain", ""],
            vec!["2", "with, comma", ""],
            vec!["3", "\"quoted\"", "x"],
            vec!["4", "multi\nline\r\ntext", " padded"],
            vec!["5", "ünïcödé ✓", r"\."],
            vec![""],
        ];
        let mut out = Vec::new();
        for row in &rows {
            write_record(&mut out, row);
        }
        let parsed = parse(&String::from_utf8(out).unwrap());
        let expected: Vec<Vec<String>> = rows
            .iter()
            .map(|row| row.iter().map(|s| s.to_string()).collect())
            .collect();
        assert_eq!(parsed, expected);
    }
}
