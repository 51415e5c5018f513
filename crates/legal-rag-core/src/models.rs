//! Core data models used throughout Legal RAG.
//!
//! These types represent the normalized queries, retrieved documents, and
//! result batches that flow through one retrieval turn, plus the
//! [`Outcome`] type used to report degraded-but-usable results.

use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Document metadata as returned by a search handle.
///
/// Keys are not guaranteed to be present. Values are usually strings, but
/// sources may also store numbers or booleans.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// How a raw query was turned into a search query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionMethod {
    /// The query already contained domain vocabulary.
    NoConversionNeeded,
    /// Served from the memo table.
    Cached,
    /// Changed by the colloquial → domain term table.
    RuleBased,
    /// Rewritten by the external rewrite service.
    LlmRewritten,
    /// Normalization could not run; the raw query is passed through.
    Error,
}

impl ConversionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoConversionNeeded => "no_conversion",
            Self::Cached => "cached",
            Self::RuleBased => "rule_based",
            Self::LlmRewritten => "llm_rewritten",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConversionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A search query produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedQuery {
    pub text: String,
    pub method: ConversionMethod,
}

impl NormalizedQuery {
    pub fn new(text: impl Into<String>, method: ConversionMethod) -> Self {
        Self {
            text: text.into(),
            method,
        }
    }
}

/// One of the two independent document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Legal,
    News,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legal => "legal",
            Self::News => "news",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw hit returned by a [`SearchIndex`](crate::index::SearchIndex).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexHit {
    pub content: String,
    pub metadata: Metadata,
}

/// A hit tagged with the source it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocument {
    pub content: String,
    pub metadata: Metadata,
    pub source: SourceKind,
}

impl RetrievedDocument {
    pub fn from_hit(hit: IndexHit, source: SourceKind) -> Self {
        Self {
            content: hit.content,
            metadata: hit.metadata,
            source,
        }
    }
}

/// Display grouping assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Precedent,
    Interpretation,
    #[serde(rename = "qa")]
    QA,
    News,
    Generic,
}

/// A document after classification, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedDocument {
    pub category: Category,
    pub display_id: String,
    pub truncated_content: String,
}

/// Which sources contributed to a [`RetrievalBatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    LegalAndNews,
    LegalOnly,
    NewsOnly,
    Empty,
    Error,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LegalAndNews => "legal_and_news",
            Self::LegalOnly => "legal_only",
            Self::NewsOnly => "news_only",
            Self::Empty => "empty",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ordered documents handed to the formatter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalBatch {
    pub documents: Vec<RetrievedDocument>,
    pub mode: RetrievalMode,
}

impl RetrievalBatch {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Outcome
// ═══════════════════════════════════════════════════════════════════════

/// Why a result is usable but incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum DegradeReason {
    #[error("{0} source unavailable")]
    SourceUnavailable(SourceKind),
    #[error("{kind} search failed: {message}")]
    SourceSearchFailed { kind: SourceKind, message: String },
    #[error("{kind} search task aborted: {message}")]
    SourceTaskAborted { kind: SourceKind, message: String },
    #[error("query rewrite failed: {0}")]
    RewriteFailed(String),
    #[error("query normalization failed: {0}")]
    NormalizationFailed(FailureReason),
}

/// Why no usable result could be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum FailureReason {
    #[error("query memo table is unavailable")]
    MemoUnavailable,
    #[error("both retrieval sources aborted")]
    AllSourcesAborted,
    #[error("unexpected panic: {0}")]
    Panicked(String),
}

/// Text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Result of an operation that may degrade instead of failing.
///
/// `Degraded` carries a usable value together with the reasons it is
/// incomplete; `Failed` carries no value.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok(T),
    Degraded { value: T, reasons: Vec<DegradeReason> },
    Failed(FailureReason),
}

impl<T> Outcome<T> {
    /// Builds `Ok` when `reasons` is empty, `Degraded` otherwise.
    pub fn with_reasons(value: T, reasons: Vec<DegradeReason>) -> Self {
        if reasons.is_empty() {
            Outcome::Ok(value)
        } else {
            Outcome::Degraded { value, reasons }
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Ok(v) | Outcome::Degraded { value: v, .. } => Some(v),
            Outcome::Failed(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Ok(v) | Outcome::Degraded { value: v, .. } => Some(v),
            Outcome::Failed(_) => None,
        }
    }

    pub fn reasons(&self) -> &[DegradeReason] {
        match self {
            Outcome::Degraded { reasons, .. } => reasons,
            _ => &[],
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(v) => Outcome::Ok(f(v)),
            Outcome::Degraded { value, reasons } => Outcome::Degraded {
                value: f(value),
                reasons,
            },
            Outcome::Failed(r) => Outcome::Failed(r),
        }
    }
}
