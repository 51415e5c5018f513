//! Concurrent dual-source retrieval.
//!
//! The [`DualSourceRetriever`] searches the legal and news collections for
//! the same query text. Each search runs in its own tokio task, and every
//! way a source can go wrong is confined to that source:
//!
//! | Situation | Documents | Reliability | Status |
//! |-----------|-----------|-------------|--------|
//! | Handle not configured | empty | 0.0 | [`SourceStatus::Unavailable`] |
//! | `search` returned an error | empty | 0.0 | [`SourceStatus::SearchFailed`] |
//! | Task panicked or was cancelled | empty | 0.0 | [`SourceStatus::Aborted`] |
//! | Success | hits tagged with the source | source constant | [`SourceStatus::Ok`] |
//!
//! Results are combined legal-first by
//! [`combine`](legal_rag_core::combine::combine). Reliability is reported
//! alongside the documents but never used for ordering.

use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use legal_rag_core::combine::{combine, CombineLimits};
use legal_rag_core::index::SearchIndex;
use legal_rag_core::models::{
    DegradeReason, FailureReason, IndexHit, Outcome, RetrievalBatch, RetrievedDocument,
    SourceKind,
};

use crate::config::RetrievalConfig;

/// Per-source result counts and reliability constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    pub legal_k: usize,
    pub news_k: usize,
    pub max_legal_docs: usize,
    pub max_news_docs: usize,
    pub legal_reliability: f64,
    pub news_reliability: f64,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for RetrievalParams {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            legal_k: config.legal_k,
            news_k: config.news_k,
            max_legal_docs: config.max_legal_docs,
            max_news_docs: config.max_news_docs,
            legal_reliability: config.legal_reliability,
            news_reliability: config.news_reliability,
        }
    }
}

impl RetrievalParams {
    pub fn limits(&self) -> CombineLimits {
        CombineLimits {
            max_legal_docs: self.max_legal_docs,
            max_news_docs: self.max_news_docs,
        }
    }

    fn k(&self, kind: SourceKind) -> usize {
        match kind {
            SourceKind::Legal => self.legal_k,
            SourceKind::News => self.news_k,
        }
    }

    fn reliability(&self, kind: SourceKind) -> f64 {
        match kind {
            SourceKind::Legal => self.legal_reliability,
            SourceKind::News => self.news_reliability,
        }
    }
}

/// How one source's search went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Unavailable,
    SearchFailed(String),
    Aborted(String),
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Unavailable => "unavailable",
            Self::SearchFailed(_) => "search_failed",
            Self::Aborted(_) => "aborted",
        }
    }

    /// The degradation this status represents, if any.
    pub fn degrade_reason(&self, kind: SourceKind) -> Option<DegradeReason> {
        match self {
            Self::Ok => None,
            Self::Unavailable => Some(DegradeReason::SourceUnavailable(kind)),
            Self::SearchFailed(message) => Some(DegradeReason::SourceSearchFailed {
                kind,
                message: message.clone(),
            }),
            Self::Aborted(message) => Some(DegradeReason::SourceTaskAborted {
                kind,
                message: message.clone(),
            }),
        }
    }
}

/// Documents returned by one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceResult {
    pub source: SourceKind,
    pub documents: Vec<RetrievedDocument>,
    pub reliability: f64,
    pub status: SourceStatus,
}

impl SourceResult {
    fn empty(source: SourceKind, status: SourceStatus) -> Self {
        Self {
            source,
            documents: Vec::new(),
            reliability: 0.0,
            status,
        }
    }

    pub fn report(&self) -> SourceReport {
        SourceReport {
            source: self.source,
            hits: self.documents.len(),
            reliability: self.reliability,
            status: self.status.clone(),
        }
    }
}

/// Both sources' results for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceResults {
    pub legal: SourceResult,
    pub news: SourceResult,
}

impl SourceResults {
    pub fn reasons(&self) -> Vec<DegradeReason> {
        [&self.legal, &self.news]
            .into_iter()
            .filter_map(|r| r.status.degrade_reason(r.source))
            .collect()
    }

    pub fn all_aborted(&self) -> bool {
        matches!(self.legal.status, SourceStatus::Aborted(_))
            && matches!(self.news.status, SourceStatus::Aborted(_))
    }

    pub fn summary(&self) -> SourceSummary {
        SourceSummary {
            legal: self.legal.report(),
            news: self.news.report(),
        }
    }
}

/// Document-free view of one source's result, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub source: SourceKind,
    pub hits: usize,
    pub reliability: f64,
    pub status: SourceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub legal: SourceReport,
    pub news: SourceReport,
}

/// Searches the legal and news handles concurrently.
pub struct DualSourceRetriever {
    legal: Option<Arc<dyn SearchIndex>>,
    news: Option<Arc<dyn SearchIndex>>,
    params: RetrievalParams,
}

impl DualSourceRetriever {
    pub fn new(
        legal: Option<Arc<dyn SearchIndex>>,
        news: Option<Arc<dyn SearchIndex>>,
        params: RetrievalParams,
    ) -> Self {
        Self {
            legal,
            news,
            params,
        }
    }

    pub fn handle(&self, kind: SourceKind) -> Option<&Arc<dyn SearchIndex>> {
        match kind {
            SourceKind::Legal => self.legal.as_ref(),
            SourceKind::News => self.news.as_ref(),
        }
    }

    fn spawn_search(
        &self,
        kind: SourceKind,
        text: &str,
    ) -> Option<JoinHandle<anyhow::Result<Vec<IndexHit>>>> {
        let index = Arc::clone(self.handle(kind)?);
        let text = text.to_string();
        let k = self.params.k(kind);
        Some(tokio::spawn(async move { index.search(&text, k).await }))
    }

    async fn collect(
        &self,
        kind: SourceKind,
        task: Option<JoinHandle<anyhow::Result<Vec<IndexHit>>>>,
    ) -> SourceResult {
        let Some(task) = task else {
            warn!(source = %kind, "source unavailable, skipping");
            return SourceResult::empty(kind, SourceStatus::Unavailable);
        };

        match task.await {
            Ok(Ok(hits)) => {
                info!(source = %kind, hits = hits.len(), "source search complete");
                SourceResult {
                    source: kind,
                    documents: hits
                        .into_iter()
                        .map(|hit| RetrievedDocument::from_hit(hit, kind))
                        .collect(),
                    reliability: self.params.reliability(kind),
                    status: SourceStatus::Ok,
                }
            }
            Ok(Err(e)) => {
                let message = format!("{:#}", e);
                warn!(source = %kind, error = %message, "source search failed");
                SourceResult::empty(kind, SourceStatus::SearchFailed(message))
            }
            Err(e) => {
                let message = e.to_string();
                warn!(source = %kind, error = %message, "source search task aborted");
                SourceResult::empty(kind, SourceStatus::Aborted(message))
            }
        }
    }

    /// Searches both sources for `text`.
    ///
    /// Never fails; each source reports its own status. Blank text issues
    /// no search and both sources report `Ok` with no documents.
    pub async fn search_sources(&self, text: &str) -> SourceResults {
        if text.trim().is_empty() {
            debug!("blank search text, skipping retrieval");
            return SourceResults {
                legal: SourceResult::empty(SourceKind::Legal, SourceStatus::Ok),
                news: SourceResult::empty(SourceKind::News, SourceStatus::Ok),
            };
        }

        // Both tasks are running before either is awaited.
        let legal_task = self.spawn_search(SourceKind::Legal, text);
        let news_task = self.spawn_search(SourceKind::News, text);

        let (legal, news) = tokio::join!(
            self.collect(SourceKind::Legal, legal_task),
            self.collect(SourceKind::News, news_task)
        );
        SourceResults { legal, news }
    }

    /// Combines already-collected source results into a batch.
    pub fn combine_results(&self, results: SourceResults) -> Outcome<RetrievalBatch> {
        if results.all_aborted() {
            error!("both source search tasks aborted");
            return Outcome::Failed(FailureReason::AllSourcesAborted);
        }

        let reasons = results.reasons();
        let batch = combine(
            results.legal.documents,
            results.news.documents,
            &self.params.limits(),
        );
        info!(mode = %batch.mode, documents = batch.len(), "retrieval combined");
        Outcome::with_reasons(batch, reasons)
    }

    /// Searches both sources and combines the results.
    pub async fn retrieve(&self, text: &str) -> Outcome<RetrievalBatch> {
        let results = self.search_sources(text).await;
        self.combine_results(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use legal_rag_core::index::memory::InMemoryIndex;
    use legal_rag_core::models::{Metadata, RetrievalMode};

    struct FailingIndex;

    #[async_trait]
    impl SearchIndex for FailingIndex {
        fn name(&self) -> &str {
            "failing"
        }
        async fn search(&self, _text: &str, _k: usize) -> anyhow::Result<Vec<IndexHit>> {
            anyhow::bail!("connection refused")
        }
    }

    fn index_with(name: &str, n: usize) -> Arc<dyn SearchIndex> {
        let hits = (0..n).map(|i| IndexHit {
            content: format!("보증금 문서 {}", i),
            metadata: Metadata::new(),
        });
        Arc::new(InMemoryIndex::from_hits(name, hits))
    }

    #[tokio::test]
    async fn test_both_sources_ok() {
        let retriever = DualSourceRetriever::new(
            Some(index_with("legal", 10)),
            Some(index_with("news", 10)),
            RetrievalParams::default(),
        );
        let results = retriever.search_sources("보증금").await;
        assert_eq!(results.legal.documents.len(), 5);
        assert_eq!(results.news.documents.len(), 4);
        assert_eq!(results.legal.reliability, 0.8);
        assert_eq!(results.news.reliability, 0.7);
        assert!(results.reasons().is_empty());

        let outcome = retriever.combine_results(results);
        assert!(outcome.is_ok());
        let batch = outcome.into_value().unwrap();
        assert_eq!(batch.mode, RetrievalMode::LegalAndNews);
        assert_eq!(batch.len(), 5 + 3);
    }

    #[tokio::test]
    async fn test_unavailable_source_degrades() {
        let retriever = DualSourceRetriever::new(
            Some(index_with("legal", 2)),
            None,
            RetrievalParams::default(),
        );
        let outcome = retriever.retrieve("보증금").await;
        assert!(outcome.is_degraded());
        assert_eq!(
            outcome.reasons(),
            &[DegradeReason::SourceUnavailable(SourceKind::News)]
        );
        assert_eq!(outcome.value().unwrap().mode, RetrievalMode::LegalOnly);
    }

    #[tokio::test]
    async fn test_failing_source_is_isolated() {
        let retriever = DualSourceRetriever::new(
            Some(Arc::new(FailingIndex)),
            Some(index_with("news", 2)),
            RetrievalParams::default(),
        );
        let results = retriever.search_sources("보증금").await;
        assert_eq!(results.legal.reliability, 0.0);
        assert!(matches!(
            results.legal.status,
            SourceStatus::SearchFailed(ref m) if m.contains("connection refused")
        ));
        assert_eq!(results.news.status, SourceStatus::Ok);
        assert_eq!(results.news.documents.len(), 2);
    }

    #[tokio::test]
    async fn test_blank_text_skips_search() {
        let retriever = DualSourceRetriever::new(
            Some(Arc::new(FailingIndex)),
            None,
            RetrievalParams::default(),
        );
        let results = retriever.search_sources("   ").await;
        assert_eq!(results.legal.status, SourceStatus::Ok);
        assert_eq!(results.news.status, SourceStatus::Ok);
        let outcome = retriever.combine_results(results);
        assert!(outcome.is_ok());
        assert_eq!(outcome.value().unwrap().mode, RetrievalMode::Empty);
    }

    #[test]
    fn test_status_reasons() {
        assert_eq!(SourceStatus::Ok.degrade_reason(SourceKind::Legal), None);
        assert_eq!(
            SourceStatus::Aborted("panic".into()).degrade_reason(SourceKind::News),
            Some(DegradeReason::SourceTaskAborted {
                kind: SourceKind::News,
                message: "panic".into()
            })
        );
    }
}
