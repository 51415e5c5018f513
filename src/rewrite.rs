//! Rewrite service providers.
//!
//! Concrete [`Rewriter`] implementations used by the query normalizer's
//! last tier:
//! - **[`DisabledRewriter`]**: always fails; queries the term table cannot
//!   change are searched verbatim.
//! - **[`OpenAIRewriter`]**: `POST /v1/chat/completions`, authenticated with
//!   `OPENAI_API_KEY`.
//! - **[`OllamaRewriter`]**: `POST {url}/api/chat` on a local Ollama
//!   instance with `stream = false`.
//!
//! Use [`create_rewriter`] to build the provider named in `[rewrite]`.
//!
//! # Retry Strategy
//!
//! Both HTTP providers retry transient errors with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! A rewrite failure is never fatal to a turn: the normalizer falls back to
//! the rule-based text.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use legal_rag_core::rewrite::{DisabledRewriter, Rewriter};

use crate::config::RewriteConfig;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Request settings shared by the HTTP providers.
#[derive(Debug, Clone)]
struct ChatSettings {
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl ChatSettings {
    fn from_config(config: &RewriteConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        }
    }
}

fn build_client(config: &RewriteConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

/// POSTs `body` to `url`, retrying transient failures.
///
/// Returns the parsed JSON body of the first successful response.
async fn post_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
    provider: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            debug!(provider, attempt, ?delay, "retrying rewrite request");
            tokio::time::sleep(delay).await;
        }

        let mut request = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                // Rate limited or server error, retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    warn!(provider, %status, "transient rewrite API error");
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        provider,
                        status,
                        body_text
                    ));
                    continue;
                }

                // Client error (not 429), don't retry
                let body_text = response.text().await.unwrap_or_default();
                bail!("{} API error {}: {}", provider, status, body_text);
            }
            Err(e) => {
                warn!(provider, error = %e, "rewrite request failed");
                last_err = Some(anyhow::anyhow!("{} connection error ({}): {}", provider, url, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} rewrite failed after retries", provider)))
}

fn user_message(prompt: &str) -> serde_json::Value {
    serde_json::json!([{ "role": "user", "content": prompt }])
}

// ============ OpenAI Provider ============

/// Rewriter backed by the OpenAI chat completions API.
pub struct OpenAIRewriter {
    name: String,
    settings: ChatSettings,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIRewriter {
    /// # Errors
    ///
    /// Returns an error if `OPENAI_API_KEY` is not in the environment or
    /// the HTTP client cannot be built.
    pub fn new(config: &RewriteConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let settings = ChatSettings::from_config(config);
        Ok(Self {
            name: format!("openai:{}", settings.model),
            settings,
            api_key,
            client: build_client(config)?,
        })
    }
}

#[async_trait]
impl Rewriter for OpenAIRewriter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn rewrite(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.settings.model,
            "messages": user_message(prompt),
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        });
        let json = post_with_retry(
            &self.client,
            OPENAI_CHAT_URL,
            Some(&self.api_key),
            &body,
            self.settings.max_retries,
            "OpenAI",
        )
        .await?;
        parse_openai_response(&json)
    }
}

/// Extracts `choices[0].message.content`.
fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.pointer("/message/content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content")
        })
}

// ============ Ollama Provider ============

/// Rewriter backed by a local Ollama instance.
///
/// Requires Ollama to be running with the configured model pulled.
pub struct OllamaRewriter {
    name: String,
    settings: ChatSettings,
    url: String,
    client: reqwest::Client,
}

impl OllamaRewriter {
    pub fn new(config: &RewriteConfig) -> Result<Self> {
        let settings = ChatSettings::from_config(config);
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        Ok(Self {
            name: format!("ollama:{}", settings.model),
            settings,
            url: url.trim_end_matches('/').to_string(),
            client: build_client(config)?,
        })
    }
}

#[async_trait]
impl Rewriter for OllamaRewriter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn rewrite(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.settings.model,
            "messages": user_message(prompt),
            "stream": false,
            "options": {
                "temperature": self.settings.temperature,
                "num_predict": self.settings.max_tokens,
            },
        });
        let json = post_with_retry(
            &self.client,
            &format!("{}/api/chat", self.url),
            None,
            &body,
            self.settings.max_retries,
            "Ollama",
        )
        .await?;
        parse_ollama_response(&json)
    }
}

/// Extracts `message.content`.
fn parse_ollama_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message.content"))
}

// ============ Provider Factory ============

/// Builds the rewriter named by `config.provider`.
///
/// # Errors
///
/// Returns an error for an unknown provider name, or if the provider's own
/// constructor fails (e.g. missing API key).
pub fn create_rewriter(config: &RewriteConfig) -> Result<Arc<dyn Rewriter>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledRewriter)),
        "openai" => Ok(Arc::new(OpenAIRewriter::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaRewriter::new(config)?)),
        other => bail!("Unknown rewrite provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_openai_response() {
        let json = serde_json::json!({
            "choices": [{
                "message": { "role": "assistant", "content": "변환된 검색 쿼리: 임대인 보증금 반환" }
            }]
        });
        assert_eq!(
            parse_openai_response(&json).unwrap(),
            "변환된 검색 쿼리: 임대인 보증금 반환"
        );
        assert!(parse_openai_response(&serde_json::json!({ "choices": [] })).is_err());
    }

    #[test]
    fn test_parse_ollama_response() {
        let json = serde_json::json!({
            "message": { "role": "assistant", "content": "임대차 계약 해지" },
            "done": true
        });
        assert_eq!(parse_ollama_response(&json).unwrap(), "임대차 계약 해지");
        assert!(parse_ollama_response(&serde_json::json!({ "done": true })).is_err());
    }

    #[test]
    fn test_create_disabled() {
        let rewriter = create_rewriter(&RewriteConfig::default()).unwrap();
        assert_eq!(rewriter.name(), "disabled");
    }

    #[test]
    fn test_create_ollama_uses_default_url() {
        let config = RewriteConfig {
            provider: "ollama".to_string(),
            model: "llama3".to_string(),
            ..RewriteConfig::default()
        };
        let rewriter = OllamaRewriter::new(&config).unwrap();
        assert_eq!(rewriter.name(), "ollama:llama3");
        assert_eq!(rewriter.url, DEFAULT_OLLAMA_URL);
    }

    #[test]
    fn test_create_unknown_provider_fails() {
        let config = RewriteConfig {
            provider: "bard".to_string(),
            ..RewriteConfig::default()
        };
        assert!(create_rewriter(&config).is_err());
    }

    #[tokio::test]
    async fn test_disabled_rewriter_fails() {
        assert!(DisabledRewriter.rewrite("x").await.is_err());
    }
}
