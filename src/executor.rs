//! Statement execution against the shared pool

use crate::db::{ConnectionPool, ResultSet};
use crate::error::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

pub struct QueryExecutor {
    pool: Arc<dyn ConnectionPool>,
}

impl QueryExecutor {
    pub fn new(pool: Arc<dyn ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Run a vetted statement once and materialize its rows.
    ///
    /// The connection is dropped, and so returned to the pool, before the
    /// result or error leaves this function. No retry, no statement timeout.
    pub async fn execute(&self, statement: &str) -> Result<ResultSet> {
        let started = Instant::now();
        let mut conn = self.pool.acquire().await?;
        let outcome = conn.fetch_all(statement).await;
        drop(conn);

        match &outcome {
            Ok(rows) => info!(
                rows = rows.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Executed statement"
            ),
            Err(e) => error!("Statement execution failed: {}", e),
        }
        outcome
    }
}
