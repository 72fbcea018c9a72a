//! MySQL connection pool using sqlx

use super::{ConnectionPool, PooledConnection, ResultSet, Row};
use crate::config::DatabaseConfig;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use std::time::Duration;
use tracing::{debug, info};

/// Initialize the database connection pool
pub async fn init_pool(config: &DatabaseConfig) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.pool_size)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(config.connect_options())
        .await?;

    // Test the connection
    sqlx::query("SELECT 1").execute(&pool).await?;

    info!(
        host = %config.host,
        database = %config.name,
        pool_size = config.pool_size,
        "MySQL pool ready"
    );
    Ok(pool)
}

/// `ConnectionPool` backed by a sqlx MySQL pool.
#[derive(Clone)]
pub struct MySqlConnectionPool {
    pool: MySqlPool,
}

impl MySqlConnectionPool {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self::new(init_pool(config).await?))
    }
}

#[async_trait]
impl ConnectionPool for MySqlConnectionPool {
    async fn acquire(&self) -> Result<Box<dyn PooledConnection>> {
        let conn = self.pool.acquire().await?;
        debug!(
            idle = self.pool.num_idle(),
            size = self.pool.size(),
            "Acquired MySQL connection"
        );
        Ok(Box::new(MySqlPooledConnection { conn }))
    }
}

/// sqlx returns the inner connection to its pool on drop.
struct MySqlPooledConnection {
    conn: PoolConnection<MySql>,
}

#[async_trait]
impl PooledConnection for MySqlPooledConnection {
    async fn fetch_all(&mut self, sql: &str) -> Result<ResultSet> {
        let rows = sqlx::query(sql).fetch_all(&mut *self.conn).await?;
        rows.iter().map(row_to_json).collect()
    }
}

fn row_to_json(row: &MySqlRow) -> Result<Row> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = cell_to_json(row, idx, column.type_info().name())?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn cell_to_json(row: &MySqlRow, idx: usize, type_name: &str) -> Result<Value> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }

    match type_name {
        "BOOLEAN" => {
            if let Ok(v) = row.try_get::<bool, _>(idx) {
                return Ok(Value::Bool(v));
            }
        }
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            if let Ok(v) = row.try_get::<i64, _>(idx) {
                return Ok(Value::from(v));
            }
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => {
            if let Ok(v) = row.try_get::<u64, _>(idx) {
                return Ok(Value::from(v));
            }
        }
        "FLOAT" | "DOUBLE" => {
            if let Ok(v) = row.try_get::<f64, _>(idx) {
                return Ok(serde_json::Number::from_f64(v)
                    .map(Value::Number)
                    .unwrap_or(Value::Null));
            }
        }
        // Decimals stay textual to avoid losing precision.
        "DECIMAL" => {
            if let Ok(v) = row.try_get_unchecked::<String, _>(idx) {
                return Ok(Value::String(v));
            }
        }
        "DATE" => {
            if let Ok(v) = row.try_get::<chrono::NaiveDate, _>(idx) {
                return Ok(Value::String(v.format("%Y-%m-%d").to_string()));
            }
        }
        "DATETIME" => {
            if let Ok(v) = row.try_get::<chrono::NaiveDateTime, _>(idx) {
                return Ok(Value::String(v.format("%Y-%m-%d %H:%M:%S").to_string()));
            }
        }
        "TIMESTAMP" => {
            if let Ok(v) = row.try_get::<chrono::DateTime<chrono::Utc>, _>(idx) {
                return Ok(Value::String(v.format("%Y-%m-%d %H:%M:%S").to_string()));
            }
        }
        "TIME" => {
            if let Ok(v) = row.try_get::<chrono::NaiveTime, _>(idx) {
                return Ok(Value::String(v.format("%H:%M:%S").to_string()));
            }
        }
        "JSON" => {
            if let Ok(v) = row.try_get_unchecked::<String, _>(idx) {
                return Ok(serde_json::from_str(&v).unwrap_or(Value::String(v)));
            }
        }
        _ => {}
    }

    // Fallback: text first, then raw bytes.
    if let Ok(v) = row.try_get::<String, _>(idx) {
        return Ok(Value::String(v));
    }
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Ok(Value::from(v));
    }
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return Ok(serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null));
    }
    if let Ok(bytes) = row.try_get_unchecked::<Vec<u8>, _>(idx) {
        return Ok(match String::from_utf8(bytes) {
            Ok(text) => Value::String(text),
            Err(e) => Value::String(format!("[BINARY {} bytes]", e.as_bytes().len())),
        });
    }

    Err(GatewayError::Database(format!(
        "Unsupported column type {} at position {}",
        type_name, idx
    )))
}
