//! Stub collaborators shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use nlsql_gateway::db::{ConnectionPool, PooledConnection, ResultSet, Row};
use nlsql_gateway::llm::ChatCompletion;
use nlsql_gateway::{GatewayError, Result};
use regex::Regex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Replies with pre-scripted texts, one per call, recording every prompt.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(texts: &[&str]) -> Arc<Self> {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompletion for ScriptedLlm {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Llm("no scripted reply left".to_string())))
    }
}

#[derive(Default)]
pub struct PoolStats {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub statements: Mutex<Vec<String>>,
}

impl PoolStats {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

/// In-memory stand-in for the MySQL pool. Statements filtering on
/// `member_id = N` only see that member's rows.
pub struct StubPool {
    rows: ResultSet,
    fail_fetch: bool,
    pub stats: Arc<PoolStats>,
}

impl StubPool {
    pub fn with_rows(rows: ResultSet) -> Arc<Self> {
        Arc::new(Self {
            rows,
            fail_fetch: false,
            stats: Arc::new(PoolStats::default()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            rows: Vec::new(),
            fail_fetch: true,
            stats: Arc::new(PoolStats::default()),
        })
    }
}

struct StubConnection {
    rows: ResultSet,
    fail_fetch: bool,
    stats: Arc<PoolStats>,
}

impl Drop for StubConnection {
    fn drop(&mut self) {
        self.stats.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PooledConnection for StubConnection {
    async fn fetch_all(&mut self, sql: &str) -> Result<ResultSet> {
        self.stats.statements.lock().unwrap().push(sql.to_string());
        if self.fail_fetch {
            return Err(GatewayError::Database(
                "Lost connection to MySQL server during query".to_string(),
            ));
        }

        let filter = Regex::new(r"(?i)member_id\s*=\s*'?(\w+)'?").unwrap();
        let rows = match filter.captures(sql) {
            Some(caps) => {
                let wanted = caps[1].to_string();
                self.rows
                    .iter()
                    .filter(|row| match row.get("member_id") {
                        Some(serde_json::Value::String(s)) => *s == wanted,
                        Some(other) => other.to_string() == wanted,
                        None => false,
                    })
                    .cloned()
                    .collect()
            }
            None => self.rows.clone(),
        };
        Ok(rows)
    }
}

#[async_trait]
impl ConnectionPool for StubPool {
    async fn acquire(&self) -> Result<Box<dyn PooledConnection>> {
        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubConnection {
            rows: self.rows.clone(),
            fail_fetch: self.fail_fetch,
            stats: self.stats.clone(),
        }))
    }
}

pub fn order_row(num: i64, member_id: i64, option_nm: &str, cus_pay: &str) -> Row {
    let mut row = Row::new();
    row.insert("num".into(), serde_json::json!(num));
    row.insert("member_id".into(), serde_json::json!(member_id));
    row.insert("option_nm".into(), serde_json::json!(option_nm));
    row.insert("cus_pay".into(), serde_json::json!(cus_pay));
    row.insert("wdate".into(), serde_json::json!("2024-05-01 10:00:00"));
    row
}

pub fn sample_orders() -> ResultSet {
    vec![
        order_row(1, 42, "blue / L", "19000.00"),
        order_row(2, 7, "red / M", "12000.00"),
        order_row(3, 42, "black / S", "25000.00"),
    ]
}
