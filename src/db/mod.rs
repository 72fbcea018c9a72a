//! Database access seam
//!
//! The gateway only needs two things from the database layer: a bounded pool
//! that hands out connections, and a connection that can run one statement and
//! materialize every row. Returning a connection happens when its handle is
//! dropped, so release is tied to scope and cannot be skipped on error paths.

pub mod connection;

pub use connection::{init_pool, MySqlConnectionPool};

use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One result row, keyed by column name. Key order is not meaningful.
pub type Row = Map<String, Value>;

/// Rows in the order the database returned them.
pub type ResultSet = Vec<Row>;

/// A connection checked out of a pool. Dropping it releases it.
#[async_trait]
pub trait PooledConnection: Send {
    /// Execute `sql` once and fetch every resulting row into memory.
    async fn fetch_all(&mut self, sql: &str) -> Result<ResultSet>;
}

/// A bounded, shared pool of database connections.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Check out a connection, waiting while the pool is exhausted.
    async fn acquire(&self) -> Result<Box<dyn PooledConnection>>;
}
