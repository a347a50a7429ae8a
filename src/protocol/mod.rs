pub mod command;
pub mod connection;
pub mod packet;
pub mod primitive;
pub mod response;
mod row;

pub use row::TextRowPayload;
