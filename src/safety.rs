//! Safety gate between model output and execution
//!
//! The denylist is a raw, case-insensitive substring search over the model's
//! full reply, not over the extracted statement. That means a column such as
//! `updated_at` is rejected (false positive) while nothing is learned about
//! the statement's shape. `ValidationStrategy::Strict` keeps the denylist and
//! additionally parses the extracted statement, accepting only a single query
//! over declared tables.

use crate::schema::SchemaDescriptor;
use serde::Serialize;
use sqlparser::ast::{visit_relations, Statement};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use std::collections::HashSet;
use std::fmt;
use std::ops::ControlFlow;
use std::str::FromStr;

pub const FORBIDDEN_KEYWORDS: [&str; 7] = [
    "DELETE", "UPDATE", "INSERT", "DROP", "CREATE", "ALTER", "TRUNCATE",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl ValidationVerdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationStrategy {
    /// Keyword substring denylist over the full model reply.
    #[default]
    Denylist,
    /// Denylist, then a parsed single-SELECT check over the extracted statement.
    Strict,
}

impl FromStr for ValidationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "denylist" => Ok(ValidationStrategy::Denylist),
            "strict" => Ok(ValidationStrategy::Strict),
            other => Err(format!("unknown validation strategy '{}' (expected denylist or strict)", other)),
        }
    }
}

impl fmt::Display for ValidationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStrategy::Denylist => write!(f, "denylist"),
            ValidationStrategy::Strict => write!(f, "strict"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyGate {
    strategy: ValidationStrategy,
}

impl SafetyGate {
    pub fn new(strategy: ValidationStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> ValidationStrategy {
        self.strategy
    }

    /// Denylist check over the translator's full reply.
    pub fn check(&self, translated_text: &str) -> ValidationVerdict {
        let upper = translated_text.to_uppercase();
        let hits: Vec<&str> = FORBIDDEN_KEYWORDS
            .iter()
            .copied()
            .filter(|keyword| upper.contains(keyword))
            .collect();

        if hits.is_empty() {
            ValidationVerdict::allow()
        } else {
            ValidationVerdict::reject(format!("forbidden keyword(s): {}", hits.join(", ")))
        }
    }

    /// Full gate as run by the pipeline: the denylist always, then the
    /// parsed check when the strategy is `Strict`.
    pub fn vet(
        &self,
        translated_text: &str,
        candidate: &str,
        schema: &SchemaDescriptor,
    ) -> ValidationVerdict {
        let verdict = self.check(translated_text);
        if !verdict.allowed {
            return verdict;
        }
        match self.strategy {
            ValidationStrategy::Denylist => verdict,
            ValidationStrategy::Strict => check_parsed(candidate, schema),
        }
    }
}

/// Accept only a single query statement whose relations are declared tables
/// or CTEs it defines itself.
pub fn check_parsed(candidate: &str, schema: &SchemaDescriptor) -> ValidationVerdict {
    let statements = match Parser::parse_sql(&MySqlDialect {}, candidate) {
        Ok(statements) => statements,
        Err(e) => return ValidationVerdict::reject(format!("unparseable statement: {}", e)),
    };

    let statement = match statements.as_slice() {
        [single] => single,
        [] => return ValidationVerdict::reject("empty statement"),
        many => {
            return ValidationVerdict::reject(format!(
                "expected one statement, found {}",
                many.len()
            ))
        }
    };

    let query = match statement {
        Statement::Query(query) => query,
        _ => return ValidationVerdict::reject("only SELECT queries are allowed"),
    };

    let cte_names: HashSet<String> = query
        .with
        .as_ref()
        .map(|with| {
            with.cte_tables
                .iter()
                .map(|cte| cte.alias.name.value.to_lowercase())
                .collect()
        })
        .unwrap_or_default();

    let mut undeclared = Vec::new();
    let _ = visit_relations(statement, |relation| {
        let parts: Vec<&str> = relation.0.iter().map(|ident| ident.value.as_str()).collect();
        let is_cte = match parts.as_slice() {
            [name] => cte_names.contains(&name.to_lowercase()),
            _ => false,
        };
        if !is_cte && !schema.has_qualified_table(&parts) {
            undeclared.push(relation.to_string());
        }
        ControlFlow::<()>::Continue(())
    });

    if undeclared.is_empty() {
        ValidationVerdict::allow()
    } else {
        ValidationVerdict::reject(format!("undeclared table(s): {}", undeclared.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gate() -> SafetyGate {
        SafetyGate::new(ValidationStrategy::Denylist)
    }

    #[test]
    fn plain_select_is_allowed() {
        let verdict = gate().check("```sql\nSELECT * FROM member_order_data\n```");
        assert_eq!(verdict, ValidationVerdict::allow());
    }

    #[test]
    fn drop_table_is_rejected() {
        let verdict = gate().check("SELECT 1; DROP TABLE member_order_data");
        assert!(!verdict.allowed);
        assert!(verdict.reason.unwrap().contains("DROP"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert!(!gate().check("delete from member_order_data").allowed);
        assert!(!gate().check("TrUnCaTe onch_product_data").allowed);
    }

    #[test]
    fn substring_match_rejects_column_names() {
        // Known false positive of the substring denylist.
        assert!(!gate().check("SELECT updated_at FROM member_order_data").allowed);
    }

    #[test]
    fn narrative_outside_the_statement_still_counts() {
        let text = "I will not delete anything.\n```sql\nSELECT 1\n```";
        assert!(!gate().check(text).allowed);
    }

    #[test]
    fn strategy_parses_from_config_strings() {
        assert_eq!(
            "denylist".parse::<ValidationStrategy>(),
            Ok(ValidationStrategy::Denylist)
        );
        assert_eq!(
            " STRICT ".parse::<ValidationStrategy>(),
            Ok(ValidationStrategy::Strict)
        );
        assert!("allowlist".parse::<ValidationStrategy>().is_err());
    }

    #[test]
    fn strict_accepts_select_over_declared_tables() {
        let schema = SchemaDescriptor::builtin();
        let verdict = check_parsed(
            "SELECT o.num, p.product_id FROM member_order_data o \
             JOIN onch_product_data p ON o.prd_code = p.prd_code WHERE o.member_id = 42",
            &schema,
        );
        assert_eq!(verdict, ValidationVerdict::allow());
    }

    #[test]
    fn strict_accepts_cte_names() {
        let schema = SchemaDescriptor::builtin();
        let verdict = check_parsed(
            "WITH mine AS (SELECT * FROM member_order_data WHERE member_id = 1) \
             SELECT COUNT(*) FROM mine",
            &schema,
        );
        assert!(verdict.allowed, "{:?}", verdict.reason);
    }

    #[test]
    fn strict_rejects_unknown_tables_and_subqueries_over_them() {
        let schema = SchemaDescriptor::builtin();
        assert!(!check_parsed("SELECT * FROM users", &schema).allowed);
        assert!(!check_parsed(
            "SELECT * FROM member_order_data WHERE member_id IN (SELECT id FROM admins)",
            &schema
        )
        .allowed);
    }

    #[test]
    fn strict_rejects_tables_qualified_with_another_database() {
        let schema = SchemaDescriptor::builtin().with_database("shop");
        assert!(!check_parsed("SELECT * FROM other_db.member_order_data", &schema).allowed);
        assert!(!check_parsed("SELECT * FROM a.b.member_order_data", &schema).allowed);
        assert!(check_parsed("SELECT * FROM shop.member_order_data", &schema).allowed);
        assert!(check_parsed("SELECT * FROM SHOP.member_order_data", &schema).allowed);

        let unqualified = SchemaDescriptor::builtin();
        assert!(!check_parsed("SELECT * FROM other_db.member_order_data", &unqualified).allowed);
        assert!(!check_parsed("SELECT * FROM shop.member_order_data", &unqualified).allowed);
    }

    #[test]
    fn strict_rejects_multiple_or_non_query_statements() {
        let schema = SchemaDescriptor::builtin();
        assert!(!check_parsed("SELECT 1; SELECT 2", &schema).allowed);
        assert!(!check_parsed("SHOW TABLES", &schema).allowed);
        assert!(!check_parsed("this is not sql", &schema).allowed);
    }

    #[test]
    fn vet_runs_denylist_before_parsing() {
        let schema = SchemaDescriptor::builtin();
        let strict = SafetyGate::new(ValidationStrategy::Strict);
        let verdict = strict.vet("DROP TABLE x", "SELECT * FROM member_order_data", &schema);
        assert!(verdict.reason.unwrap().contains("DROP"));

        let verdict = strict.vet("SELECT * FROM users", "SELECT * FROM users", &schema);
        assert!(verdict.reason.unwrap().contains("undeclared"));

        let lenient = SafetyGate::new(ValidationStrategy::Denylist);
        assert!(lenient.vet("SELECT * FROM users", "SELECT * FROM users", &schema).allowed);
    }

    proptest! {
        #[test]
        fn any_forbidden_keyword_is_rejected(
            prefix in "[a-zA-Z0-9 \n*=,;]{0,30}",
            suffix in "[a-zA-Z0-9 \n*=,;]{0,30}",
            idx in 0usize..FORBIDDEN_KEYWORDS.len(),
            lowercase in any::<bool>(),
        ) {
            let keyword = FORBIDDEN_KEYWORDS[idx];
            let keyword = if lowercase { keyword.to_lowercase() } else { keyword.to_string() };
            let text = format!("{}{}{}", prefix, keyword, suffix);
            prop_assert!(!gate().check(&text).allowed);
        }

        #[test]
        fn keyword_free_text_is_allowed(body in "[abcmnos0-9 \n*=,_()]{0,60}") {
            let text = format!("SELECT {} FROM member_order_data", body);
            prop_assert!(gate().check(&text).allowed);
        }
    }
}
