//! Gateway configuration loaded from the process environment.

use crate::error::{GatewayError, Result};
use crate::safety::ValidationStrategy;
use sqlx::mysql::MySqlConnectOptions;
use std::fmt;
use std::str::FromStr;

#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub pool_size: u32,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("name", &self.name)
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub port: u16,
    pub validation: ValidationStrategy,
}

impl GatewayConfig {
    /// Read configuration from the environment. Call `dotenv::dotenv()` first
    /// if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let database = DatabaseConfig {
            host: string("DB_HOST", "localhost"),
            port: parse_var(&lookup, "DB_PORT", 3306)?,
            user: string("DB_USER", "mcp_readonly"),
            password: string("DB_PASSWORD", ""),
            name: string("DB_NAME", "your_database"),
            pool_size: parse_var(&lookup, "DB_POOL_SIZE", 10)?,
        };
        if database.pool_size == 0 {
            return Err(GatewayError::Config(
                "DB_POOL_SIZE must be at least 1".to_string(),
            ));
        }

        let llm = LlmConfig {
            api_key: lookup("OPENAI_API_KEY").filter(|v| !v.is_empty()),
            model: string("OPENAI_MODEL", "gpt-4o-mini"),
            base_url: string("OPENAI_BASE_URL", "https://api.openai.com/v1"),
        };

        Ok(Self {
            database,
            llm,
            port: parse_var(&lookup, "PORT", 3000)?,
            validation: parse_var(&lookup, "GATEWAY_VALIDATION", ValidationStrategy::Denylist)?,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid {} '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}
