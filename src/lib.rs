pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod extractor;
pub mod interpreter;
pub mod llm;
pub mod pipeline;
pub mod safety;
pub mod schema;
pub mod server;
pub mod translator;

pub use error::{GatewayError, Result};
pub use pipeline::{IncomingRequest, QueryPipeline, ResponsePayload};
