//! Per-turn pipeline: normalize → retrieve → format.
//!
//! [`Pipeline::normalize_and_retrieve_and_format`] is the entry point used
//! by the host application. It always returns text: either the labeled
//! context block, the no-results sentinel, or a diagnostic string when the
//! turn could not produce any result at all. A panic anywhere in the turn
//! is caught there too.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use anyhow::Result;
use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use legal_rag_core::format::{format_documents, FormatSettings};
use legal_rag_core::models::{
    panic_message, ConversionMethod, DegradeReason, FailureReason, NormalizedQuery, Outcome,
    RetrievalMode,
};
use legal_rag_core::normalizer::QueryNormalizer;

use crate::config::Config;
use crate::retriever::{DualSourceRetriever, RetrievalParams, SourceSummary};
use crate::rewrite::create_rewriter;
use crate::snapshot::open_source;

/// Prefix of the text returned when a turn fails outright.
pub const FAILURE_PREFIX: &str = "검색 중 오류가 발생했습니다: ";

/// Everything produced by one turn.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub query: NormalizedQuery,
    pub sources: SourceSummary,
    pub batch_mode: RetrievalMode,
    pub context: String,
}

pub struct Pipeline {
    normalizer: QueryNormalizer,
    retriever: DualSourceRetriever,
    format: FormatSettings,
}

impl Pipeline {
    pub fn new(
        normalizer: QueryNormalizer,
        retriever: DualSourceRetriever,
        format: FormatSettings,
    ) -> Self {
        Self {
            normalizer,
            retriever,
            format,
        }
    }

    /// Builds the rewriter, opens both snapshots, and wires them together.
    ///
    /// # Errors
    ///
    /// Fails only on configuration problems (bad normalizer settings or a
    /// rewrite provider that cannot be constructed). Unavailable sources
    /// are not an error.
    pub fn from_config(config: &Config) -> Result<Self> {
        let rewriter = create_rewriter(&config.rewrite)?;
        info!(rewriter = rewriter.name(), "rewrite provider ready");

        let normalizer = QueryNormalizer::new(config.normalizer.to_settings()?, rewriter);
        let retriever = DualSourceRetriever::new(
            open_source("legal", config.sources.legal.as_deref()),
            open_source("news", config.sources.news.as_deref()),
            RetrievalParams::from(&config.retrieval),
        );

        Ok(Self::new(normalizer, retriever, config.format.to_settings()))
    }

    pub fn normalizer(&self) -> &QueryNormalizer {
        &self.normalizer
    }

    pub fn retriever(&self) -> &DualSourceRetriever {
        &self.retriever
    }

    /// Runs one turn and reports how each stage went.
    ///
    /// A panic inside the turn is reported as [`FailureReason::Panicked`].
    pub async fn run(&self, raw: &str) -> Outcome<PipelineOutput> {
        guarded(self.run_turn(raw)).await
    }

    async fn run_turn(&self, raw: &str) -> Outcome<PipelineOutput> {
        let (query, mut reasons) = match self.normalizer.normalize_with_outcome(raw).await {
            Outcome::Ok(query) => (query, Vec::new()),
            Outcome::Degraded { value, reasons } => (value, reasons),
            Outcome::Failed(reason) => {
                warn!(error = %reason, "normalization failed, searching raw query");
                (
                    NormalizedQuery::new(raw, ConversionMethod::Error),
                    vec![DegradeReason::NormalizationFailed(reason)],
                )
            }
        };

        let search_text = match query.method {
            ConversionMethod::NoConversionNeeded | ConversionMethod::Error => raw,
            _ => query.text.as_str(),
        };
        if search_text != raw {
            info!(method = %query.method, converted = %search_text, "query normalized");
        }

        let results = self.retriever.search_sources(search_text).await;
        let sources = results.summary();

        let batch = match self.retriever.combine_results(results) {
            Outcome::Failed(reason) => return Outcome::Failed(reason),
            Outcome::Ok(batch) => batch,
            Outcome::Degraded {
                value,
                reasons: more,
            } => {
                reasons.extend(more);
                value
            }
        };

        let context = format_documents(&batch.documents, batch.mode, &self.format);
        debug!(chars = context.chars().count(), "context formatted");

        let output = PipelineOutput {
            query,
            sources,
            batch_mode: batch.mode,
            context,
        };
        Outcome::with_reasons(output, reasons)
    }

    /// Runs one turn and returns the text handed to the answer model.
    ///
    /// Never fails and never panics.
    pub async fn normalize_and_retrieve_and_format(&self, raw: &str) -> String {
        match self.run(raw).await {
            Outcome::Ok(output) | Outcome::Degraded { value: output, .. } => output.context,
            Outcome::Failed(reason) => {
                warn!(error = %reason, "retrieval turn failed");
                format!("{}{}", FAILURE_PREFIX, reason)
            }
        }
    }
}

/// Awaits `turn`, turning a panic into [`FailureReason::Panicked`].
async fn guarded<T>(turn: impl Future<Output = Outcome<T>>) -> Outcome<T> {
    match AssertUnwindSafe(turn).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(&*payload);
            error!(error = %message, "retrieval turn panicked");
            Outcome::Failed(FailureReason::Panicked(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn crash_on_nonblank(raw: &str) -> Outcome<String> {
        if raw.trim().is_empty() {
            return Outcome::Ok(String::new());
        }
        panic!("formatter crashed on {}", raw)
    }

    #[tokio::test]
    async fn test_guarded_passes_outcome_through() {
        let outcome = guarded(crash_on_nonblank(" ")).await;
        assert_eq!(outcome, Outcome::Ok(String::new()));
    }

    #[tokio::test]
    async fn test_guarded_reports_panic_as_failure() {
        let outcome = guarded(crash_on_nonblank("보증금")).await;
        assert_eq!(
            outcome,
            Outcome::Failed(FailureReason::Panicked(
                "formatter crashed on 보증금".to_string()
            ))
        );
        assert_eq!(
            format!("{}{}", FAILURE_PREFIX, FailureReason::Panicked("x".to_string())),
            "검색 중 오류가 발생했습니다: unexpected panic: x"
        );
    }
}
