//! A scripted in-memory database.
//!
//! Every query must be registered up front; anything else fails the way a server
//! rejects unknown SQL. Counters record how sessions and rows were used so callers
//! can check that connections are released and that iteration stopped early.
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::protocol::response::ErrPayload;

use super::{
    CommandKind, CommandSummary, Connector, Cursor, Execution, FieldDescriptor, Row, Session,
    TypeResolver,
};

#[derive(Debug, Clone)]
enum Script {
    Rows {
        fields: Vec<FieldDescriptor>,
        rows: Vec<Row>,
        /// Pulling the row at this index fails
        fail_at: Option<(usize, ErrPayload)>,
    },
    Command {
        rows_affected: u64,
    },
    Error(ErrPayload),
}

#[derive(Debug, Clone)]
struct Entry {
    script: Script,
    delay: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
struct Catalog {
    types: BTreeMap<u32, String>,
    entries: HashMap<Vec<u8>, Entry>,
    connect_error: Option<String>,
}

impl TypeResolver for Catalog {
    fn type_name(&self, type_id: u32) -> Option<&str> {
        self.types.get(&type_id).map(String::as_str)
    }
}

/// Usage counters shared by a database and all of its sessions
#[derive(Debug, Default)]
pub struct MemoryStats {
    connects: AtomicU64,
    closes: AtomicU64,
    releases: AtomicU64,
    executions: AtomicU64,
    rows_pulled: AtomicU64,
}

impl MemoryStats {
    /// Sessions successfully opened
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Sessions released through `Session::close`
    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }

    /// Sessions opened and not yet released, whether closed or dropped
    pub fn open_sessions(&self) -> u64 {
        self.connects() - self.releases.load(Ordering::SeqCst)
    }

    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::SeqCst)
    }

    /// Rows handed out by cursors, across all sessions
    pub fn rows_pulled(&self) -> u64 {
        self.rows_pulled.load(Ordering::SeqCst)
    }
}

/// ```rs
/// let db = MemoryDatabase::new()
///     .with_type(23, "INT4")
///     .with_result_set("SELECT id FROM t", vec![FieldDescriptor::new("id", 23)], rows)
///     .with_command("DELETE FROM t", 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    catalog: Arc<Catalog>,
    stats: Arc<MemoryStats>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &MemoryStats {
        &self.stats
    }

    pub fn with_type(mut self, type_id: u32, name: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.catalog)
            .types
            .insert(type_id, name.into());
        self
    }

    pub fn with_result_set(
        self,
        query: impl AsRef<[u8]>,
        fields: Vec<FieldDescriptor>,
        rows: Vec<Row>,
    ) -> Self {
        self.with_script(
            query,
            Script::Rows {
                fields,
                rows,
                fail_at: None,
            },
        )
    }

    /// Like `with_result_set`, but pulling row `index` fails with `error`
    pub fn with_failing_result_set(
        self,
        query: impl AsRef<[u8]>,
        fields: Vec<FieldDescriptor>,
        rows: Vec<Row>,
        index: usize,
        error: ErrPayload,
    ) -> Self {
        self.with_script(
            query,
            Script::Rows {
                fields,
                rows,
                fail_at: Some((index, error)),
            },
        )
    }

    /// A statement that completes without a result set
    pub fn with_command(self, query: impl AsRef<[u8]>, rows_affected: u64) -> Self {
        self.with_script(query, Script::Command { rows_affected })
    }

    pub fn with_query_error(self, query: impl AsRef<[u8]>, error: ErrPayload) -> Self {
        self.with_script(query, Script::Error(error))
    }

    /// Sleep before answering an already registered query
    pub fn with_delay(mut self, query: impl AsRef<[u8]>, delay: Duration) -> Self {
        if let Some(entry) = Arc::make_mut(&mut self.catalog)
            .entries
            .get_mut(query.as_ref())
        {
            entry.delay = Some(delay);
        }
        self
    }

    /// Every connection attempt fails with `message`
    pub fn with_connect_error(mut self, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.catalog).connect_error = Some(message.into());
        self
    }

    fn with_script(mut self, query: impl AsRef<[u8]>, script: Script) -> Self {
        Arc::make_mut(&mut self.catalog).entries.insert(
            query.as_ref().to_vec(),
            Entry {
                script,
                delay: None,
            },
        );
        self
    }
}

#[async_trait]
impl Connector for MemoryDatabase {
    type Session = MemorySession;

    async fn connect(&self) -> Result<MemorySession> {
        if let Some(message) = &self.catalog.connect_error {
            return Err(Error::IoError(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                message.clone(),
            )));
        }
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession {
            catalog: Arc::clone(&self.catalog),
            stats: Arc::clone(&self.stats),
        })
    }
}

pub struct MemorySession {
    catalog: Arc<Catalog>,
    stats: Arc<MemoryStats>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.stats.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn execute<'a>(&'a mut self, query: &'a [u8]) -> Result<Execution<'a>> {
        self.stats.executions.fetch_add(1, Ordering::SeqCst);

        let Some(entry) = self.catalog.entries.get(query) else {
            return Err(Error::ServerError(ErrPayload {
                error_code: 1064,
                sql_state: "42000".to_string(),
                message: format!(
                    "no scripted result for `{}`",
                    String::from_utf8_lossy(query)
                ),
            }));
        };
        if let Some(delay) = entry.delay {
            tokio::time::sleep(delay).await;
        }

        let kind = CommandKind::from_statement(query);
        match &entry.script {
            Script::Error(error) => Err(Error::ServerError(error.clone())),
            Script::Command { rows_affected } => Ok(Execution::Command(CommandSummary {
                kind,
                rows_affected: *rows_affected,
                row_count: 0,
            })),
            Script::Rows {
                fields,
                rows,
                fail_at,
            } => Ok(Execution::Rows(Box::new(MemoryCursor {
                catalog: &self.catalog,
                stats: &self.stats,
                fields,
                rows,
                fail_at: fail_at.as_ref(),
                kind,
                position: 0,
            }))),
        }
    }

    async fn close(self) -> Result<()> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MemoryCursor<'a> {
    catalog: &'a Catalog,
    stats: &'a MemoryStats,
    fields: &'a [FieldDescriptor],
    rows: &'a [Row],
    fail_at: Option<&'a (usize, ErrPayload)>,
    kind: CommandKind,
    position: usize,
}

#[async_trait]
impl Cursor for MemoryCursor<'_> {
    fn fields(&self) -> &[FieldDescriptor] {
        self.fields
    }

    fn type_resolver(&self) -> &dyn TypeResolver {
        self.catalog
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        if let Some((index, error)) = self.fail_at
            && *index == self.position
        {
            return Err(Error::ServerError(error.clone()));
        }
        let Some(row) = self.rows.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        self.stats.rows_pulled.fetch_add(1, Ordering::SeqCst);
        Ok(Some(row.clone()))
    }

    fn summary(&self) -> CommandSummary {
        let row_count = self.position as u64;
        CommandSummary {
            kind: self.kind,
            rows_affected: if self.kind.is_mutation() { row_count } else { 0 },
            row_count,
        }
    }
}
