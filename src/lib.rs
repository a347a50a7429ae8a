//! Run a SQL query over HTTP and get the result back as size-bounded CSV.

pub mod config;
pub mod constant;
pub mod db;
pub mod error;
pub mod http;
pub mod opts;
pub mod protocol;
pub mod record;
pub mod streamer;
pub mod tokio;
pub mod value;

pub use error::{Error, Result};
pub use opts::Opts;

#[cfg(test)]
mod constant_test;
#[cfg(test)]
mod value_test;
