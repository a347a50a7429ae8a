mod conn;
mod stream;

pub use conn::{Conn, QueryResult, ResultSet};
pub use stream::Stream;
