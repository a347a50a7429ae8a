//! Turns a row cursor into a size-bounded CSV payload.
use std::fmt;

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::db::{CommandSummary, Cursor, Execution, FieldDescriptor, TypeResolver};
use crate::error::{Error, Result};
use crate::record::{write_fields, write_record};
use crate::value::Value;

/// Ceiling used when the caller does not supply one
pub const DEFAULT_CEILING: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub type_name: String,
}

/// Resolve names and type names for every field before any row is read.
///
/// Fails on the first type identifier the resolver does not know.
pub fn project_metadata(
    fields: &[FieldDescriptor],
    resolver: &dyn TypeResolver,
) -> Result<Vec<ColumnDescriptor>> {
    fields
        .iter()
        .map(|field| {
            let type_name =
                resolver
                    .type_name(field.type_id)
                    .ok_or_else(|| Error::UnknownColumnType {
                        column: field.name.clone(),
                        type_id: field.type_id,
                    })?;
            Ok(ColumnDescriptor {
                name: field.name.clone(),
                type_name: type_name.to_owned(),
            })
        })
        .collect()
}

/// Encode one row into `scratch`, replacing its contents.
///
/// On error `scratch` holds no usable record.
pub fn encode_row(
    scratch: &mut Vec<u8>,
    columns: &[ColumnDescriptor],
    row: &[Value],
) -> Result<()> {
    scratch.clear();
    if row.len() != columns.len() {
        return Err(Error::Encoding(format!(
            "row has {} values for {} columns",
            row.len(),
            columns.len()
        )));
    }
    let fields = row
        .iter()
        .map(|value| value.to_text())
        .collect::<Result<Vec<_>>>()?;
    write_record(scratch, fields);
    Ok(())
}

/// Accumulated records and the ceiling they are checked against
#[derive(Debug)]
pub(crate) struct StreamBuffer {
    buf: BytesMut,
    ceiling: usize,
}

impl StreamBuffer {
    pub fn new(ceiling: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(ceiling.min(DEFAULT_CEILING) + 1024),
            ceiling,
        }
    }

    pub fn append(&mut self, record: &[u8]) {
        self.buf.extend_from_slice(record);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Strictly greater than the ceiling
    pub fn exceeds_ceiling(&self) -> bool {
        self.buf.len() > self.ceiling
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// The cursor was exhausted
    Complete,
    /// The ceiling stopped iteration
    Partial,
}

/// `rows <start>-<end>/<total or *>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: Option<u64>,
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rows {}-{}/", self.start, self.end)?;
        match self.total {
            Some(total) => write!(f, "{total}"),
            None => f.write_str("*"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TabularResult {
    pub status: StreamStatus,
    pub columns: Vec<ColumnDescriptor>,
    /// Type names as one record, without terminator
    pub column_types_record: String,
    pub content_range: ContentRange,
    pub rows_affected: Option<u64>,
    pub body: Bytes,
}

impl TabularResult {
    /// `text/csv; coltypes=<record>`
    pub fn content_type(&self) -> String {
        format!("text/csv; coltypes={}", self.column_types_record)
    }

    pub fn row_count(&self) -> u64 {
        self.content_range.end
    }
}

fn column_types_record(columns: &[ColumnDescriptor]) -> String {
    let mut out = Vec::new();
    write_fields(&mut out, columns.iter().map(|c| c.type_name.as_str()));
    // built from &str fields only
    String::from_utf8_lossy(&out).into_owned()
}

fn rows_affected(summary: &CommandSummary) -> Option<u64> {
    summary.kind.is_mutation().then_some(summary.rows_affected)
}

/// Stream every row of `cursor` into a bounded buffer.
///
/// The ceiling is checked after each appended row, so the row that crosses it is
/// kept and no further row is pulled.
pub async fn stream_rows(cursor: &mut (dyn Cursor + '_), ceiling: usize) -> Result<TabularResult> {
    let columns = project_metadata(cursor.fields(), cursor.type_resolver())?;
    let column_types_record = column_types_record(&columns);

    let mut buffer = StreamBuffer::new(ceiling);
    let mut scratch = Vec::new();
    write_record(&mut scratch, columns.iter().map(|c| c.name.as_str()));
    buffer.append(&scratch);

    let mut current_row = 0u64;
    let mut status = StreamStatus::Complete;
    while let Some(row) = cursor.next_row().await? {
        encode_row(&mut scratch, &columns, &row)?;
        buffer.append(&scratch);
        current_row += 1;
        if buffer.exceeds_ceiling() {
            status = StreamStatus::Partial;
            break;
        }
    }

    let summary = cursor.summary();
    debug!(
        rows = current_row,
        bytes = buffer.len(),
        ceiling,
        ?status,
        "streamed result set"
    );

    Ok(TabularResult {
        status,
        columns,
        column_types_record,
        content_range: ContentRange {
            start: 0,
            end: current_row,
            total: match status {
                StreamStatus::Complete => Some(current_row),
                StreamStatus::Partial => None,
            },
        },
        rows_affected: rows_affected(&summary),
        body: buffer.into_bytes(),
    })
}

/// A statement without a result set: no columns, no rows
pub fn command_result(summary: &CommandSummary) -> TabularResult {
    let mut body = Vec::new();
    write_record(&mut body, std::iter::empty::<&str>());
    TabularResult {
        status: StreamStatus::Complete,
        columns: Vec::new(),
        column_types_record: String::new(),
        content_range: ContentRange {
            start: 0,
            end: 0,
            total: Some(0),
        },
        rows_affected: rows_affected(summary),
        body: Bytes::from(body),
    }
}

/// Finalize whatever the session returned for a statement
pub async fn stream_execution(execution: Execution<'_>, ceiling: usize) -> Result<TabularResult> {
    match execution {
        Execution::Rows(mut cursor) => stream_rows(cursor.as_mut(), ceiling).await,
        Execution::Command(summary) => Ok(command_result(&summary)),
    }
}
