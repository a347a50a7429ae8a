use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::{debug, instrument};
use zerocopy::{FromZeros, IntoBytes};

use crate::constant::{CapabilityFlags, ServerStatusFlags};
use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::command::query::{
    QueryResponse, RowPacket, read_query_response, read_row_packet, write_query,
};
use crate::protocol::command::utility::write_quit;
use crate::protocol::command::{ColumnDefinition, ColumnDefinitionBytes};
use crate::protocol::connection::{Handshake, HandshakeConfig, HandshakeResult};
use crate::protocol::packet::{MAX_PAYLOAD_LENGTH, PacketHeader, write_packets};
use crate::protocol::response::{ErrPayloadBytes, OkPayload, OkPayloadBytes, read_eof_status};
use crate::value::Value;

use super::stream::Stream;

/// What the server still owes us from the last command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Nothing,
    Rows,
    MoreResults,
}

impl Pending {
    fn after(status_flags: ServerStatusFlags) -> Self {
        if status_flags.contains(ServerStatusFlags::SERVER_MORE_RESULTS_EXISTS) {
            Pending::MoreResults
        } else {
            Pending::Nothing
        }
    }
}

pub struct Conn {
    stream: Stream,
    read_buffer: Vec<u8>,
    write_buffer: Vec<u8>,
    packet_buffer: Vec<u8>,
    capability_flags: CapabilityFlags,
    connection_id: u32,
    server_version: String,
    pending: Pending,
}

/// Response to a text protocol query
pub enum QueryResult<'c> {
    /// The statement produced a result set; rows are pulled lazily
    ResultSet(ResultSet<'c>),
    /// The statement completed without a result set
    Ok(OkPayload),
}

impl Conn {
    /// Create a new MySQL connection from connection options
    pub async fn new<O: TryInto<Opts>>(opts: O) -> Result<Self>
    where
        Error: From<O::Error>,
    {
        let opts: Opts = opts.try_into()?;

        let stream = if let Some(socket_path) = &opts.socket {
            unix_stream(socket_path).await?
        } else {
            let host = opts.host.as_ref().ok_or_else(|| {
                Error::BadConfigError("Missing host in connection options".to_string())
            })?;

            let stream = TcpStream::connect((host.as_str(), opts.port)).await?;
            stream.set_nodelay(opts.tcp_nodelay)?;
            Stream::tcp(stream)
        };

        Self::new_with_stream(stream, &opts).await
    }

    /// Run the handshake over an existing stream
    #[instrument(skip_all)]
    pub async fn new_with_stream(mut stream: Stream, opts: &Opts) -> Result<Self> {
        let mut read_buffer = Vec::new();
        let mut packet_buffer = Vec::new();

        let mut handshake = Handshake::new(HandshakeConfig {
            username: opts.user.clone(),
            password: opts.password.clone().unwrap_or_default(),
            database: opts.db.clone(),
        });

        let (capability_flags, connection_id, server_version) = loop {
            let last_sequence_id = read_payload(&mut stream, &mut read_buffer).await?;

            match handshake.drive(&read_buffer)? {
                HandshakeResult::Write(payload) => {
                    packet_buffer.clear();
                    write_packets(
                        &mut packet_buffer,
                        &payload,
                        last_sequence_id.wrapping_add(1),
                    );
                    stream.write_all(&packet_buffer).await?;
                    stream.flush().await?;
                }
                HandshakeResult::Read => {}
                HandshakeResult::Connected {
                    capability_flags,
                    connection_id,
                    server_version,
                } => break (capability_flags, connection_id, server_version),
            }
        };

        debug!(connection_id, %server_version, "connected");

        Ok(Self {
            stream,
            read_buffer,
            write_buffer: Vec::new(),
            packet_buffer,
            capability_flags,
            connection_id,
            server_version,
            pending: Pending::Nothing,
        })
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Get the connection ID assigned by the server
    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    fn deprecate_eof(&self) -> bool {
        self.capability_flags
            .contains(CapabilityFlags::CLIENT_DEPRECATE_EOF)
    }

    /// Send the command in write_buffer, starting a new sequence
    async fn write_command(&mut self) -> Result<()> {
        self.packet_buffer.clear();
        write_packets(&mut self.packet_buffer, &self.write_buffer, 0);
        self.stream.write_all(&self.packet_buffer).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Execute a text protocol SQL query
    ///
    /// Rows of a result set are not read until the caller asks for them. Only the
    /// first result of a multi-result response is exposed; the rest is discarded
    /// before the next command.
    #[instrument(skip_all)]
    pub async fn query(&mut self, sql: &[u8]) -> Result<QueryResult<'_>> {
        self.discard_pending().await?;

        self.write_buffer.clear();
        write_query(&mut self.write_buffer, sql);
        self.write_command().await?;

        read_payload(&mut self.stream, &mut self.read_buffer).await?;
        match read_query_response(&self.read_buffer)? {
            QueryResponse::Ok(bytes) => {
                let ok = OkPayload::try_from(bytes)?;
                self.pending = Pending::after(ok.status_flags);
                Ok(QueryResult::Ok(ok))
            }
            QueryResponse::ResultSet { column_count } => {
                let columns = self.read_column_definitions(column_count).await?;
                self.pending = Pending::Rows;
                Ok(QueryResult::ResultSet(ResultSet {
                    conn: self,
                    columns,
                    affected_rows: 0,
                    rows_read: 0,
                }))
            }
        }
    }

    async fn read_column_definitions(
        &mut self,
        column_count: u64,
    ) -> Result<Vec<ColumnDefinition>> {
        let mut columns = Vec::with_capacity(column_count.min(4096) as usize);
        for _ in 0..column_count {
            read_payload(&mut self.stream, &mut self.read_buffer).await?;
            columns.push(ColumnDefinition::try_from(ColumnDefinitionBytes(
                &self.read_buffer,
            ))?);
        }
        if !self.deprecate_eof() {
            read_payload(&mut self.stream, &mut self.read_buffer).await?;
            read_eof_status(&self.read_buffer)?;
        }
        Ok(columns)
    }

    /// Read and drop whatever the previous command left on the wire
    async fn discard_pending(&mut self) -> Result<()> {
        loop {
            match self.pending {
                Pending::Nothing => return Ok(()),
                Pending::Rows => {
                    read_payload(&mut self.stream, &mut self.read_buffer).await?;
                    match read_row_packet(&self.read_buffer, self.deprecate_eof()) {
                        Ok(RowPacket::Row(_)) => {}
                        Ok(RowPacket::End { status_flags, .. }) => {
                            self.pending = Pending::after(status_flags);
                        }
                        Err(e) => {
                            self.pending = Pending::Nothing;
                            return Err(e);
                        }
                    }
                }
                Pending::MoreResults => {
                    read_payload(&mut self.stream, &mut self.read_buffer).await?;
                    match read_query_response(&self.read_buffer) {
                        Ok(QueryResponse::Ok(bytes)) => {
                            let ok = OkPayload::try_from(bytes)?;
                            self.pending = Pending::after(ok.status_flags);
                        }
                        Ok(QueryResponse::ResultSet { column_count }) => {
                            self.read_column_definitions(column_count).await?;
                            self.pending = Pending::Rows;
                        }
                        Err(e) => {
                            self.pending = Pending::Nothing;
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Send COM_QUIT and shut the socket down
    ///
    /// The server does not answer COM_QUIT, so unread results are simply abandoned.
    #[instrument(skip_all)]
    pub async fn close(mut self) -> Result<()> {
        self.write_buffer.clear();
        write_quit(&mut self.write_buffer);
        self.write_command().await?;
        self.stream.shutdown().await?;
        debug!(connection_id = self.connection_id, "closed");
        Ok(())
    }
}

/// A text protocol result set borrowed from its connection
pub struct ResultSet<'c> {
    conn: &'c mut Conn,
    columns: Vec<ColumnDefinition>,
    affected_rows: u64,
    rows_read: u64,
}

impl ResultSet<'_> {
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Rows pulled so far
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Affected rows reported by the terminator, once reached
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    pub fn is_finished(&self) -> bool {
        self.conn.pending != Pending::Rows
    }

    /// Pull and decode the next row. `Ok(None)` once the result set is exhausted.
    pub async fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        if self.is_finished() {
            return Ok(None);
        }

        read_payload(&mut self.conn.stream, &mut self.conn.read_buffer).await?;
        let deprecate_eof = self.conn.deprecate_eof();
        match read_row_packet(&self.conn.read_buffer, deprecate_eof) {
            Ok(RowPacket::Row(row)) => {
                let mut values = Vec::with_capacity(self.columns.len());
                let mut fields = row.fields();
                for column in &self.columns {
                    let field = fields.next().ok_or(Error::InvalidPacket)??;
                    values.push(Value::from_text(column, field)?);
                }
                if fields.next().is_some() {
                    return Err(Error::InvalidPacket);
                }
                self.rows_read += 1;
                Ok(Some(values))
            }
            Ok(RowPacket::End {
                affected_rows,
                status_flags,
            }) => {
                self.affected_rows = affected_rows;
                self.conn.pending = Pending::after(status_flags);
                Ok(None)
            }
            Err(e) => {
                self.conn.pending = Pending::Nothing;
                Err(e)
            }
        }
    }
}

#[cfg(unix)]
async fn unix_stream(path: &str) -> Result<Stream> {
    Ok(Stream::unix(UnixStream::connect(path).await?))
}

#[cfg(not(unix))]
async fn unix_stream(_path: &str) -> Result<Stream> {
    Err(Error::BadConfigError(
        "Unix sockets are not supported on this platform".to_string(),
    ))
}

/// Read a complete MySQL payload, concatenating packets if they span multiple 16MB chunks
/// Returns the sequence_id of the last packet read.
async fn read_payload(reader: &mut Stream, buffer: &mut Vec<u8>) -> Result<u8> {
    let mut packet_header = PacketHeader::new_zeroed();

    buffer.clear();
    loop {
        reader.read_exact(packet_header.as_mut_bytes()).await?;
        let length = packet_header.length();

        let start = buffer.len();
        buffer.resize(start + length, 0);
        reader.read_exact(&mut buffer[start..]).await?;

        if length < MAX_PAYLOAD_LENGTH {
            return Ok(packet_header.sequence_id);
        }
    }
}
