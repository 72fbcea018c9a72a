//! Schema description embedded in the translation prompt
//!
//! The request path only ever uses the static descriptor. [`introspect`] is a
//! one-shot loader for operators who want to see what the live database
//! actually contains; nothing caches or refreshes its output.

use crate::db::{ConnectionPool, Row};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<String>,
}

impl TableSpec {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// The queryable tables and columns the model is told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub tables: Vec<TableSpec>,
    /// Database the tables live in. A qualified name must use this one.
    #[serde(default)]
    pub database: Option<String>,
}

impl SchemaDescriptor {
    pub fn new(tables: Vec<TableSpec>) -> Self {
        Self {
            tables,
            database: None,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// The hand-authored order/product schema served by the gateway.
    pub fn builtin() -> Self {
        Self::new(vec![
            TableSpec::new(
                "onch_product_data",
                &["num", "prd_code", "member_id", "product_id", "wdate"],
            ),
            TableSpec::new(
                "member_order_data",
                &[
                    "num",
                    "prd_code",
                    "member_id",
                    "member_nm",
                    "p_mem_id",
                    "option_nm",
                    "prd_num",
                    "cus_pay",
                    "prd_pay",
                    "onch_pay",
                    "wdate",
                ],
            ),
        ])
    }

    /// Case-insensitive table lookup.
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Resolve a possibly qualified name (`db.table`) against this schema.
    /// The qualifier must name the configured database.
    pub fn has_qualified_table(&self, parts: &[&str]) -> bool {
        match parts {
            [table] => self.has_table(table),
            [database, table] => {
                self.database
                    .as_deref()
                    .map_or(false, |db| db.eq_ignore_ascii_case(database))
                    && self.has_table(table)
            }
            _ => false,
        }
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Prompt rendering: one `Table:` header per table, one bullet per column.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for table in &self.tables {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("Table: {}\n", table.name));
            for column in &table.columns {
                out.push_str(&format!("- {}\n", column));
            }
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableInfo {
    pub columns: Vec<ColumnInfo>,
    pub relations: Vec<Relation>,
}

/// Snapshot of the live database layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub tables: BTreeMap<String, TableInfo>,
}

impl SchemaInfo {
    pub fn to_descriptor(&self) -> SchemaDescriptor {
        SchemaDescriptor::new(
            self.tables
                .iter()
                .map(|(name, info)| TableSpec {
                    name: name.clone(),
                    columns: info.columns.iter().map(|c| c.name.clone()).collect(),
                })
                .collect(),
        )
    }
}

const LIST_TABLES_SQL: &str = "SELECT TABLE_NAME AS table_name \
     FROM INFORMATION_SCHEMA.TABLES \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
     ORDER BY TABLE_NAME";

fn columns_sql(table: &str) -> String {
    format!(
        "SELECT COLUMN_NAME AS column_name, COLUMN_TYPE AS column_type, \
         IS_NULLABLE AS is_nullable, COLUMN_KEY AS column_key \
         FROM INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {} \
         ORDER BY ORDINAL_POSITION",
        quote_literal(table)
    )
}

fn relations_sql(table: &str) -> String {
    format!(
        "SELECT COLUMN_NAME AS column_name, REFERENCED_TABLE_NAME AS referenced_table, \
         REFERENCED_COLUMN_NAME AS referenced_column \
         FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE \
         WHERE REFERENCED_TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {}",
        quote_literal(table)
    )
}

/// Quote a value as a MySQL string literal.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

fn text(row: &Row, key: &str) -> String {
    row.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Load tables, columns and foreign keys of the connected database.
///
/// Uses a single pooled connection, released when this function returns.
pub async fn introspect(pool: &dyn ConnectionPool) -> Result<SchemaInfo> {
    let mut conn = pool.acquire().await?;
    let mut schema = SchemaInfo::default();

    let tables: Vec<String> = conn
        .fetch_all(LIST_TABLES_SQL)
        .await?
        .iter()
        .map(|row| text(row, "table_name"))
        .filter(|name| !name.is_empty())
        .collect();

    for table in tables {
        let columns = conn
            .fetch_all(&columns_sql(&table))
            .await?
            .iter()
            .map(|row| ColumnInfo {
                name: text(row, "column_name"),
                data_type: text(row, "column_type"),
                nullable: text(row, "is_nullable").eq_ignore_ascii_case("YES"),
                key: text(row, "column_key"),
            })
            .collect();

        let relations = conn
            .fetch_all(&relations_sql(&table))
            .await?
            .iter()
            .map(|row| Relation {
                column: text(row, "column_name"),
                referenced_table: text(row, "referenced_table"),
                referenced_column: text(row, "referenced_column"),
            })
            .collect();

        schema.tables.insert(table, TableInfo { columns, relations });
    }

    info!("Loaded schema for {} tables", schema.tables.len());
    Ok(schema)
}
