//! HTTP server for the natural-language SQL gateway
//! Serves `POST /query` on a plain tokio listener.

use anyhow::{Context, Result};
use clap::Parser;
use nlsql_gateway::config::GatewayConfig;
use nlsql_gateway::db::MySqlConnectionPool;
use nlsql_gateway::llm::LlmClient;
use nlsql_gateway::safety::SafetyGate;
use nlsql_gateway::schema::SchemaDescriptor;
use nlsql_gateway::server;
use nlsql_gateway::QueryPipeline;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nlsql-server")]
#[command(about = "Natural-language to SQL HTTP gateway")]
#[command(version)]
struct Args {
    /// Listening port (or set PORT env var)
    #[arg(short, long)]
    port: Option<u16>,

    /// Connection pool size (or set DB_POOL_SIZE env var)
    #[arg(long)]
    pool_size: Option<u32>,

    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = GatewayConfig::from_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(pool_size) = args.pool_size {
        config.database.pool_size = pool_size.max(1);
    }
    if args.api_key.is_some() {
        config.llm.api_key = args.api_key;
    }
    info!(?config, "Starting gateway");

    let llm = LlmClient::from_config(&config.llm)?;
    let pool = MySqlConnectionPool::connect(&config.database)
        .await
        .context("Failed to connect to MySQL")?;

    let pipeline = Arc::new(QueryPipeline::new(
        Arc::new(SchemaDescriptor::builtin().with_database(config.database.name.clone())),
        Arc::new(llm),
        Arc::new(pool),
        SafetyGate::new(config.validation),
    ));

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(
        "Server listening on port {} (validation: {})",
        config.port, config.validation
    );

    server::serve(listener, pipeline).await?;
    Ok(())
}
