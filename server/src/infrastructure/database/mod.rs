//! Database infrastructure: a single-writer WAL-journaled SQLite pool plus
//! versioned schema migrations (§4.1).

pub mod connection_pool;
pub mod schema;

pub use connection_pool::{ConnectionPool, ConnectionPoolConfig};
pub use schema::initialize_schema;
