// Import from library crate
use nlsql_gateway::config::GatewayConfig;
use nlsql_gateway::db::MySqlConnectionPool;
use nlsql_gateway::extractor::SqlExtractor;
use nlsql_gateway::llm::LlmClient;
use nlsql_gateway::safety::{SafetyGate, ValidationStrategy};
use nlsql_gateway::schema::{self, SchemaDescriptor};
use nlsql_gateway::{IncomingRequest, QueryPipeline};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nlsql")]
#[command(about = "Natural-language to SQL gateway tools")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one request through the full pipeline and print the response
    Ask {
        /// The request in natural language
        query: String,

        /// Identifier of the requesting member
        #[arg(short, long)]
        user_id: String,

        /// OpenAI API key (or set OPENAI_API_KEY env var)
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Load the live database schema once and print it
    Schema {
        /// Print the full introspection result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run extraction and the safety gate over a saved model reply ("-" for stdin)
    Check {
        input: PathBuf,

        /// Validation strategy (denylist or strict); defaults to GATEWAY_VALIDATION
        #[arg(long)]
        strategy: Option<ValidationStrategy>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = GatewayConfig::from_env()?;

    match args.command {
        Commands::Ask {
            query,
            user_id,
            api_key,
        } => ask(config, query, user_id, api_key).await,
        Commands::Schema { json } => dump_schema(config, json).await,
        Commands::Check { input, strategy } => {
            let schema = SchemaDescriptor::builtin().with_database(config.database.name.clone());
            check(input, strategy.unwrap_or(config.validation), &schema)
        }
    }
}

async fn ask(
    mut config: GatewayConfig,
    query: String,
    user_id: String,
    api_key: Option<String>,
) -> Result<()> {
    if api_key.is_some() {
        config.llm.api_key = api_key;
    }

    let llm = LlmClient::from_config(&config.llm)?;
    let pool = MySqlConnectionPool::connect(&config.database)
        .await
        .context("Failed to connect to MySQL")?;
    let pipeline = QueryPipeline::new(
        Arc::new(SchemaDescriptor::builtin().with_database(config.database.name.clone())),
        Arc::new(llm),
        Arc::new(pool),
        SafetyGate::new(config.validation),
    );

    info!("Running request for member {}", user_id);
    match pipeline.run(&IncomingRequest::new(query, user_id)).await {
        Ok(payload) => {
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        Err(e) => {
            let body = serde_json::json!({
                "status": e.status_code(),
                "error": e.client_message(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
            std::process::exit(1);
        }
    }
}

async fn dump_schema(config: GatewayConfig, json: bool) -> Result<()> {
    let pool = MySqlConnectionPool::connect(&config.database)
        .await
        .context("Failed to connect to MySQL")?;
    let info = schema::introspect(&pool).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print!("{}", info.to_descriptor().render());
    }
    Ok(())
}

fn check(input: PathBuf, strategy: ValidationStrategy, schema: &SchemaDescriptor) -> Result<()> {
    let text = if input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&input)
            .with_context(|| format!("Failed to read {}", input.display()))?
    };

    let extraction = SqlExtractor::extract(&text);
    let verdict = SafetyGate::new(strategy).vet(&text, &extraction.statement, schema);

    let report = serde_json::json!({
        "strategy": strategy.to_string(),
        "extraction": extraction,
        "verdict": verdict,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
