use crate::db::ResultSet;
use crate::error::Result;
use crate::llm::ChatCompletion;
use std::sync::Arc;
use tracing::info;

const SYSTEM_PROMPT: &str = "You are a SQL query result interpreter. Given a SQL query and its \
     results, present them so that a non-technical user can understand them.";

pub fn user_prompt(statement_text: &str, results: &ResultSet) -> Result<String> {
    let rendered = serde_json::to_string(results)?;
    Ok(format!(
        "SQL query: {}\n\nResults: {}\n\n\
         Convert these results into an HTML table. Show only the data, cleanly, \
         without any explanation.",
        statement_text, rendered
    ))
}

/// Second model call: turns executed rows into presentation HTML.
///
/// The reply is passed through as-is; it is not sanitized.
pub struct ResultInterpreter {
    llm: Arc<dyn ChatCompletion>,
}

impl ResultInterpreter {
    pub fn new(llm: Arc<dyn ChatCompletion>) -> Self {
        Self { llm }
    }

    pub async fn interpret(&self, statement_text: &str, results: &ResultSet) -> Result<String> {
        info!("Interpreting {} result rows", results.len());
        self.llm
            .complete(SYSTEM_PROMPT, &user_prompt(statement_text, results)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Row;

    #[test]
    fn prompt_embeds_statement_and_rows() {
        let mut row = Row::new();
        row.insert("member_id".into(), serde_json::json!(42));
        row.insert("cus_pay".into(), serde_json::json!("15000.00"));

        let prompt = user_prompt("```sql\nSELECT * FROM member_order_data\n```", &vec![row]).unwrap();
        assert!(prompt.starts_with("SQL query: ```sql"));
        assert!(prompt.contains(r#""member_id":42"#));
        assert!(prompt.contains("HTML table"));
    }

    #[test]
    fn empty_results_render_as_empty_array() {
        let prompt = user_prompt("SELECT 1", &Vec::new()).unwrap();
        assert!(prompt.contains("Results: []"));
    }
}
