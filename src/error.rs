use std::time::Duration;

use thiserror::Error;

use crate::protocol::response::{ErrPayload, ErrPayloadBytes};

pub use color_eyre::eyre::eyre;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Server Error: {0}")]
    ServerError(#[from] ErrPayload),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Bad config error: {0}")]
    BadConfigError(String),

    #[error("Invalid packet")]
    InvalidPacket,

    #[error("Unexpected end of packet")]
    UnexpectedEof,

    #[error("Unsupported authentication plugin: {0}")]
    UnsupportedAuthPlugin(String),

    #[error("Column `{column}` has an unknown type id {type_id}")]
    UnknownColumnType { column: String, type_id: u32 },

    #[error("Cannot encode value: {0}")]
    Encoding(String),

    #[error("Query did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Library bug: {0}")]
    LibraryBug(color_eyre::Report),
}

impl Error {
    /// The raw database message for errors reported by the server
    pub fn server_message(&self) -> Option<String> {
        match self {
            Error::ServerError(payload) => Some(payload.to_string()),
            _ => None,
        }
    }
}

impl<'a> From<ErrPayloadBytes<'a>> for Error {
    fn from(value: ErrPayloadBytes<'a>) -> Self {
        match ErrPayload::try_from(value) {
            Ok(err_payload) => Error::ServerError(err_payload),
            Err(err) => err,
        }
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

pub type Result<T> = std::result::Result<T, Error>;
