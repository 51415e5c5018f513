//! Query rewrite service trait.
//!
//! Defines the [`Rewriter`] trait used by the
//! [`QueryNormalizer`](crate::normalizer::QueryNormalizer) as its last,
//! most expensive tier. Concrete providers (OpenAI, Ollama) live in the
//! `legal-rag` app crate.
//!
//! Failures from a rewriter are always recoverable: the normalizer falls
//! back to the rule-based text.

use anyhow::{bail, Result};
use async_trait::async_trait;

/// A text-in, text-out rewrite service (typically an LLM).
#[async_trait]
pub trait Rewriter: Send + Sync {
    /// Returns the provider/model identifier (e.g. `"openai:gpt-4o"`).
    fn name(&self) -> &str;

    /// Sends `prompt` and returns the raw response text.
    async fn rewrite(&self, prompt: &str) -> Result<String>;
}

/// A rewriter that always fails.
///
/// Used when `rewrite.provider = "disabled"`. Queries that the term table
/// cannot change are then searched verbatim.
pub struct DisabledRewriter;

#[async_trait]
impl Rewriter for DisabledRewriter {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn rewrite(&self, _prompt: &str) -> Result<String> {
        bail!("Rewrite provider is disabled")
    }
}
