//! Natural language to SQL translation
//!
//! One model call per request. The reply is returned untouched: whatever the
//! model produced still has to go through extraction and the safety gate.

use crate::error::Result;
use crate::llm::ChatCompletion;
use crate::schema::SchemaDescriptor;
use std::sync::Arc;
use tracing::{debug, info};

/// Rewrite a request so it is limited to rows owned by `caller_id`.
///
/// The scoping is advisory: it only tells the model which rows to target.
pub fn scope_request(query: &str, caller_id: &str) -> String {
    format!(
        "Only rows where member_id = {}, then: {}",
        caller_id.trim(),
        query.trim()
    )
}

pub fn system_prompt(schema: &SchemaDescriptor) -> String {
    format!(
        "You are an AI that converts natural language into SQL.\n\n\
         Here is the database schema:\n{}\n\
         You are a SQL query validator. Review the user's natural-language request and \
         convert it into a safe, read-only SQL query. Never produce DELETE, UPDATE, DROP \
         or CREATE statements.",
        schema.render()
    )
}

pub fn user_prompt(scoped_text: &str) -> String {
    format!(
        "Convert the following request into a safe MySQL query: \"{}\"",
        scoped_text
    )
}

pub struct QueryTranslator {
    llm: Arc<dyn ChatCompletion>,
}

impl QueryTranslator {
    pub fn new(llm: Arc<dyn ChatCompletion>) -> Self {
        Self { llm }
    }

    /// Ask the model for SQL answering `scoped_text` against `schema`.
    pub async fn translate(&self, scoped_text: &str, schema: &SchemaDescriptor) -> Result<String> {
        info!("Translating request: {}", scoped_text);
        let translated = self
            .llm
            .complete(&system_prompt(schema), &user_prompt(scoped_text))
            .await?;
        debug!("Translator replied with {} bytes", translated.len());
        Ok(translated)
    }
}
