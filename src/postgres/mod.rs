//! PostgreSQL connection pooling for the document store backend.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
