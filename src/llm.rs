use crate::config::LlmConfig;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use tracing::debug;

/// A chat-completion service: one system message, one user message, one reply.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            GatewayError::Config(
                "OpenAI API key not found. Set OPENAI_API_KEY environment variable.".to_string(),
            )
        })?;
        Ok(Self::new(api_key, config.model.clone(), config.base_url.clone()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatCompletion for LlmClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ]
        });

        debug!(model = %self.model, "Calling chat completion API");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            return Err(GatewayError::Llm(format!("LLM API returned {}: {}", status, snippet)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        parse_completion(&response_json)
    }
}

fn parse_completion(response_json: &serde_json::Value) -> Result<String> {
    let content = response_json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| GatewayError::Llm("No content in LLM response".to_string()))?;

    Ok(content.trim().to_string())
}
