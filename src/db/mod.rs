//! The database collaborator: what the streamer needs from a database, and the
//! MySQL binding of it.
pub mod memory;

use async_trait::async_trait;

use crate::constant::{BINARY_CHARSET, ColumnType};
use crate::error::Result;
use crate::opts::Opts;
use crate::protocol::command::ColumnDefinition;
use crate::tokio::{Conn, QueryResult, ResultSet};
use crate::value::Value;

/// One row, one value per field in field order
pub type Row = Vec<Value>;

/// A column as reported by the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub type_id: u32,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, type_id: u32) -> Self {
        Self {
            name: name.into(),
            type_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl CommandKind {
    /// Insert, Update and Delete report affected rows to the caller
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            CommandKind::Insert | CommandKind::Update | CommandKind::Delete
        )
    }

    /// Classify a statement by its leading keyword
    ///
    /// Leading whitespace, `--` and `#` line comments and `/* */` block comments are skipped.
    /// A `WITH` clause is skipped too, so `WITH c AS (...) DELETE ...` is a Delete.
    pub fn from_statement(sql: &[u8]) -> Self {
        let keyword = statement_keyword(sql);
        let is = |word: &str| keyword.eq_ignore_ascii_case(word.as_bytes());

        if ["SELECT", "SHOW", "VALUES", "TABLE", "DESCRIBE", "DESC", "EXPLAIN"]
            .into_iter()
            .any(is)
        {
            CommandKind::Select
        } else if is("INSERT") || is("REPLACE") {
            CommandKind::Insert
        } else if is("UPDATE") {
            CommandKind::Update
        } else if is("DELETE") {
            CommandKind::Delete
        } else {
            CommandKind::Other
        }
    }
}

/// The keyword of the main statement, after any `WITH` clause
fn statement_keyword(sql: &[u8]) -> &[u8] {
    let (keyword, mut rest) = split_word(skip_trivia(sql));
    if !keyword.eq_ignore_ascii_case(b"WITH") {
        return keyword;
    }

    // WITH [RECURSIVE] name [(columns)] AS (query) [, ...] <statement>
    let mut expect_body = false;
    let mut after_body = false;
    loop {
        rest = skip_trivia(rest);
        match rest.first() {
            None => return &[],
            Some(b'(') => {
                rest = skip_group(rest);
                if expect_body {
                    expect_body = false;
                    after_body = true;
                }
            }
            Some(b',') => {
                rest = &rest[1..];
                after_body = false;
            }
            Some(&quote @ (b'`' | b'"')) => rest = skip_quoted(&rest[1..], quote),
            Some(_) => {
                let (word, tail) = split_word(rest);
                if word.is_empty() {
                    rest = &rest[1..];
                    continue;
                }
                if after_body {
                    return word;
                }
                if word.eq_ignore_ascii_case(b"AS") {
                    expect_body = true;
                }
                rest = tail;
            }
        }
    }
}

fn skip_trivia(mut sql: &[u8]) -> &[u8] {
    loop {
        sql = sql.trim_ascii_start();
        if let Some(rest) = sql.strip_prefix(b"--").or_else(|| sql.strip_prefix(b"#")) {
            sql = match rest.iter().position(|&b| b == b'\n') {
                Some(i) => &rest[i + 1..],
                None => &[],
            };
        } else if let Some(rest) = sql.strip_prefix(b"/*") {
            sql = match rest.windows(2).position(|w| w == b"*/") {
                Some(i) => &rest[i + 2..],
                None => &[],
            };
        } else {
            return sql;
        }
    }
}

/// Split off a leading run of `[A-Za-z0-9_]`
fn split_word(sql: &[u8]) -> (&[u8], &[u8]) {
    let end = sql
        .iter()
        .position(|&b| !(b.is_ascii_alphanumeric() || b == b'_'))
        .unwrap_or(sql.len());
    sql.split_at(end)
}

/// Skip a parenthesised group starting at `sql[0] == b'('`, including nested groups
/// and quoted text
fn skip_group(sql: &[u8]) -> &[u8] {
    let mut depth = 0usize;
    let mut rest = sql;
    while let Some((&b, tail)) = rest.split_first() {
        rest = match b {
            b'(' => {
                depth += 1;
                tail
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return tail;
                }
                tail
            }
            b'\'' | b'"' | b'`' => skip_quoted(tail, b),
            _ => tail,
        };
    }
    rest
}

/// Skip past the closing `quote`; backslash escapes and doubled quotes stay inside
fn skip_quoted(sql: &[u8], quote: u8) -> &[u8] {
    let mut i = 0;
    while i < sql.len() {
        if sql[i] == b'\\' && quote != b'`' {
            i += 2;
        } else if sql[i] == quote {
            if sql.get(i + 1) == Some(&quote) {
                i += 2;
            } else {
                return &sql[i + 1..];
            }
        } else {
            i += 1;
        }
    }
    &[]
}

/// Statement kind and counts, known once the cursor is exhausted or abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSummary {
    pub kind: CommandKind,
    pub rows_affected: u64,
    pub row_count: u64,
}

/// Maps the collaborator's type identifiers to type names
pub trait TypeResolver: Sync {
    fn type_name(&self, type_id: u32) -> Option<&str>;
}

/// Lazy, forward-only row sequence
#[async_trait]
pub trait Cursor: Send {
    /// Known before the first row is pulled
    fn fields(&self) -> &[FieldDescriptor];

    fn type_resolver(&self) -> &dyn TypeResolver;

    /// `Ok(None)` once exhausted
    async fn next_row(&mut self) -> Result<Option<Row>>;

    fn summary(&self) -> CommandSummary;
}

pub enum Execution<'a> {
    Rows(Box<dyn Cursor + 'a>),
    Command(CommandSummary),
}

/// One open database connection
#[async_trait]
pub trait Session: Send {
    async fn execute<'a>(&'a mut self, query: &'a [u8]) -> Result<Execution<'a>>;

    /// Release the connection
    async fn close(self) -> Result<()>;
}

/// Opens sessions against a fixed connection target
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: Session + 'static;

    async fn connect(&self) -> Result<Self::Session>;
}

// MySQL

/// Connects to MySQL with options parsed once at startup
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    opts: Opts,
}

impl MySqlConnector {
    pub fn new(opts: Opts) -> Self {
        Self { opts }
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    type Session = MySqlSession;

    async fn connect(&self) -> Result<MySqlSession> {
        let conn = Conn::new(self.opts.clone()).await?;
        Ok(MySqlSession { conn })
    }
}

pub struct MySqlSession {
    conn: Conn,
}

#[async_trait]
impl Session for MySqlSession {
    async fn execute<'a>(&'a mut self, query: &'a [u8]) -> Result<Execution<'a>> {
        let kind = CommandKind::from_statement(query);
        match self.conn.query(query).await? {
            QueryResult::Ok(ok) => Ok(Execution::Command(CommandSummary {
                kind,
                rows_affected: ok.affected_rows,
                row_count: 0,
            })),
            QueryResult::ResultSet(result_set) => {
                let fields = result_set
                    .columns()
                    .iter()
                    .map(|column| FieldDescriptor::new(&column.name_alias, mysql_type_id(column)))
                    .collect();
                Ok(Execution::Rows(Box::new(MySqlCursor {
                    result_set,
                    fields,
                    kind,
                })))
            }
        }
    }

    async fn close(self) -> Result<()> {
        self.conn.close().await
    }
}

pub struct MySqlCursor<'c> {
    result_set: ResultSet<'c>,
    fields: Vec<FieldDescriptor>,
    kind: CommandKind,
}

#[async_trait]
impl Cursor for MySqlCursor<'_> {
    fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    fn type_resolver(&self) -> &dyn TypeResolver {
        &MySqlTypes
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        self.result_set.next_row().await
    }

    fn summary(&self) -> CommandSummary {
        CommandSummary {
            kind: self.kind,
            rows_affected: self.result_set.affected_rows(),
            row_count: self.result_set.rows_read(),
        }
    }
}

/// Set in a MySQL type id when the column uses the binary charset
pub const MYSQL_BINARY_TYPE_FLAG: u32 = 0x100;

/// The column type byte, plus `MYSQL_BINARY_TYPE_FLAG` for binary-charset columns
pub fn mysql_type_id(column: &ColumnDefinition) -> u32 {
    let type_id = u32::from(column.column_type_id);
    if column.charset == BINARY_CHARSET {
        type_id | MYSQL_BINARY_TYPE_FLAG
    } else {
        type_id
    }
}

/// Names for MySQL type ids built by `mysql_type_id`
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlTypes;

impl TypeResolver for MySqlTypes {
    fn type_name(&self, type_id: u32) -> Option<&str> {
        let byte = u8::try_from(type_id & !MYSQL_BINARY_TYPE_FLAG).ok()?;
        let column_type = ColumnType::from_u8(byte)?;
        Some(if type_id & MYSQL_BINARY_TYPE_FLAG != 0 {
            column_type.binary_name()
        } else {
            column_type.name()
        })
    }
}
