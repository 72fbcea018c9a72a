//! Request pipeline: translate -> extract -> vet -> execute -> interpret
//!
//! Stages run strictly in order and any failure aborts the request. The
//! collaborators are injected once at startup and shared read-only between
//! requests.

use crate::db::{ConnectionPool, ResultSet};
use crate::error::{GatewayError, Result};
use crate::executor::QueryExecutor;
use crate::extractor::{Extraction, SqlExtractor};
use crate::interpreter::ResultInterpreter;
use crate::llm::ChatCompletion;
use crate::safety::{SafetyGate, ValidationVerdict};
use crate::schema::SchemaDescriptor;
use crate::translator::{scope_request, QueryTranslator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IncomingRequest {
    pub query: String,
    pub caller_id: String,
}

impl IncomingRequest {
    pub fn new(query: impl Into<String>, caller_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            caller_id: caller_id.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(GatewayError::ClientInput("No query provided".to_string()));
        }
        if self.caller_id.trim().is_empty() {
            return Err(GatewayError::ClientInput("No user_id provided".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponsePayload {
    /// The translator's reply, before extraction.
    pub query: String,
    pub results: ResultSet,
    pub interpretation: String,
}

/// Outcome of running extraction and the gate over one model reply.
#[derive(Debug, Clone, Serialize)]
pub struct VettedReply {
    pub extraction: Extraction,
    pub verdict: ValidationVerdict,
}

pub struct QueryPipeline {
    schema: Arc<SchemaDescriptor>,
    translator: QueryTranslator,
    gate: SafetyGate,
    executor: QueryExecutor,
    interpreter: ResultInterpreter,
}

impl QueryPipeline {
    pub fn new(
        schema: Arc<SchemaDescriptor>,
        llm: Arc<dyn ChatCompletion>,
        pool: Arc<dyn ConnectionPool>,
        gate: SafetyGate,
    ) -> Self {
        Self {
            schema,
            translator: QueryTranslator::new(llm.clone()),
            gate,
            executor: QueryExecutor::new(pool),
            interpreter: ResultInterpreter::new(llm),
        }
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    /// Extraction and gate over a reply, without executing anything.
    pub fn vet_reply(&self, translated: &str) -> VettedReply {
        let extraction = SqlExtractor::extract(translated);
        let verdict = self
            .gate
            .vet(translated, &extraction.statement, &self.schema);
        VettedReply {
            extraction,
            verdict,
        }
    }

    pub async fn run(&self, request: &IncomingRequest) -> Result<ResponsePayload> {
        request.validate()?;

        let scoped = scope_request(&request.query, &request.caller_id);
        let translated = self.translator.translate(&scoped, &self.schema).await?;

        let VettedReply {
            extraction,
            verdict,
        } = self.vet_reply(&translated);
        if !verdict.allowed {
            let reason = verdict.reason.unwrap_or_default();
            warn!(caller_id = %request.caller_id, "Rejected generated query: {}", reason);
            return Err(GatewayError::PolicyRejection(reason));
        }
        info!(
            method = ?extraction.method,
            candidates = extraction.candidates,
            "Executing: {}",
            extraction.statement
        );

        let results = self.executor.execute(&extraction.statement).await?;
        let interpretation = self.interpreter.interpret(&translated, &results).await?;

        Ok(ResponsePayload {
            query: translated,
            results,
            interpretation,
        })
    }
}
