//! TOML configuration for the `lrag` engine.
//!
//! Every section is optional; an absent section takes the defaults listed
//! below, so an empty file is a valid configuration.
//!
//! ```toml
//! [normalizer]
//! memo_capacity = 1024
//! terms = [{ from = "집주인", to = "임대인" }]
//!
//! [retrieval]
//! legal_k = 5
//! news_k = 4
//! max_legal_docs = 8
//! max_news_docs = 3
//!
//! [format]
//! max_content_chars = 1000
//!
//! [rewrite]
//! provider = "disabled"   # disabled | openai | ollama
//! model = "gpt-4o"
//!
//! [sources]
//! legal = "data/legal.jsonl"
//! news = "data/news.jsonl"
//! ```
//!
//! Relative paths under `[sources]` are resolved against the directory that
//! contains the config file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use legal_rag_core::format::FormatSettings;
use legal_rag_core::normalizer::{default_indicators, default_terms, NormalizerSettings, TermRule};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub rewrite: RewriteConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NormalizerConfig {
    #[serde(default = "default_memo_capacity")]
    pub memo_capacity: usize,
    #[serde(default = "default_indicators")]
    pub indicators: Vec<String>,
    #[serde(default = "default_terms")]
    pub terms: Vec<TermRule>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            memo_capacity: default_memo_capacity(),
            indicators: default_indicators(),
            terms: default_terms(),
        }
    }
}

fn default_memo_capacity() -> usize {
    1024
}

impl NormalizerConfig {
    pub fn to_settings(&self) -> Result<NormalizerSettings> {
        let memo_capacity = NonZeroUsize::new(self.memo_capacity)
            .ok_or_else(|| anyhow::anyhow!("normalizer.memo_capacity must be >= 1"))?;
        Ok(NormalizerSettings {
            indicators: self.indicators.clone(),
            terms: self.terms.clone(),
            memo_capacity,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_legal_k")]
    pub legal_k: usize,
    #[serde(default = "default_news_k")]
    pub news_k: usize,
    #[serde(default = "default_max_legal_docs")]
    pub max_legal_docs: usize,
    #[serde(default = "default_max_news_docs")]
    pub max_news_docs: usize,
    #[serde(default = "default_legal_reliability")]
    pub legal_reliability: f64,
    #[serde(default = "default_news_reliability")]
    pub news_reliability: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            legal_k: default_legal_k(),
            news_k: default_news_k(),
            max_legal_docs: default_max_legal_docs(),
            max_news_docs: default_max_news_docs(),
            legal_reliability: default_legal_reliability(),
            news_reliability: default_news_reliability(),
        }
    }
}

fn default_legal_k() -> usize {
    5
}
fn default_news_k() -> usize {
    4
}
fn default_max_legal_docs() -> usize {
    8
}
fn default_max_news_docs() -> usize {
    3
}
fn default_legal_reliability() -> f64 {
    0.8
}
fn default_news_reliability() -> f64 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct FormatConfig {
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            max_content_chars: default_max_content_chars(),
        }
    }
}

fn default_max_content_chars() -> usize {
    1000
}

impl FormatConfig {
    pub fn to_settings(&self) -> FormatSettings {
        FormatSettings {
            max_content_chars: self.max_content_chars,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RewriteConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "gpt-4o".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    200
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

impl RewriteConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    /// JSON-lines snapshot of the legal collection.
    #[serde(default)]
    pub legal: Option<PathBuf>,
    /// JSON-lines snapshot of the news collection.
    #[serde(default)]
    pub news: Option<PathBuf>,
}

impl SourcesConfig {
    fn resolve_relative_to(&mut self, base: &Path) {
        for path in [&mut self.legal, &mut self.news].into_iter().flatten() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if let Some(base) = path.parent() {
        config.sources.resolve_relative_to(base);
    }

    validate(&config)?;

    Ok(config)
}

/// Loads `path`, or returns the defaults when no config file is given.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load_config(p),
        None => Ok(Config::default()),
    }
}

pub fn validate(config: &Config) -> Result<()> {
    // Normalizer
    if config.normalizer.memo_capacity == 0 {
        anyhow::bail!("normalizer.memo_capacity must be >= 1");
    }
    if let Some(i) = config.normalizer.terms.iter().position(|t| t.from.is_empty()) {
        anyhow::bail!("normalizer.terms[{}].from must not be empty", i);
    }

    // Retrieval
    let r = &config.retrieval;
    for (name, value) in [
        ("legal_k", r.legal_k),
        ("news_k", r.news_k),
        ("max_legal_docs", r.max_legal_docs),
        ("max_news_docs", r.max_news_docs),
    ] {
        if value < 1 {
            anyhow::bail!("retrieval.{} must be >= 1", name);
        }
    }
    for (name, value) in [
        ("legal_reliability", r.legal_reliability),
        ("news_reliability", r.news_reliability),
    ] {
        if !(0.0..=1.0).contains(&value) {
            anyhow::bail!("retrieval.{} must be in [0.0, 1.0]", name);
        }
    }

    // Format
    if config.format.max_content_chars == 0 {
        anyhow::bail!("format.max_content_chars must be > 0");
    }

    // Rewrite
    match config.rewrite.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown rewrite provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.rewrite.is_enabled() && config.rewrite.model.trim().is_empty() {
        anyhow::bail!(
            "rewrite.model must be specified when provider is '{}'",
            config.rewrite.provider
        );
    }
    if !(0.0..=2.0).contains(&config.rewrite.temperature) {
        anyhow::bail!("rewrite.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}
