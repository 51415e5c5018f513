//! Colloquial → legal query normalization.
//!
//! Users describe their situation in everyday language ("집주인이 보증금을
//! 안 줘요"), while the legal corpus is written in statutory vocabulary
//! ("임대인", "임대차보증금"). The [`QueryNormalizer`] bridges the two with
//! escalating checks, stopping at the first that applies:
//!
//! 1. **Indicator check**: a query that already contains domain vocabulary
//!    is searched as-is.
//! 2. **Memo lookup**: a query normalized earlier is served from an LRU
//!    memo keyed by the exact raw text.
//! 3. **Term table**: ordered, cumulative substring substitution.
//! 4. **Rewrite service**: only when the term table changed nothing. A
//!    failing or panicking rewrite degrades to the unchanged text and is
//!    not memoized.
//!
//! The memo is owned by the normalizer instance and guarded by a `Mutex`;
//! the lock is never held across the rewrite call.

use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::{
    panic_message, ConversionMethod, DegradeReason, FailureReason, NormalizedQuery, Outcome,
};
use crate::rewrite::Rewriter;

/// Marker after which the rewrite service places the converted query.
pub const REWRITE_MARKER: &str = "변환된 검색 쿼리:";

const REWRITE_TEMPLATE: &str = "다음 일상어 질문을 법률 검색에 적합한 전문 용어로 변환해주세요.
원래 질문: {query}
변환 규칙:
1. 일상어를 정확한 법률 용어로 바꾸기
2. 핵심 법적 쟁점을 부각시키기
3. 검색에 도움이 되는 관련 법률 키워드 추가
4. 원래 의미는 유지하면서 더 정확하고 전문적으로 표현
변환된 검색 쿼리:";

const DEFAULT_MEMO_CAPACITY: usize = 1024;

const DEFAULT_INDICATORS: &[&str] = &[
    "임대인",
    "임차인",
    "임대차",
    "명도",
    "채무불이행",
    "손해배상",
    "민사소송",
    "형사고발",
    "보증금반환",
    "법률",
    "판례",
    "법령",
    "소송",
    "계약서",
];

const DEFAULT_TERMS: &[(&str, &str)] = &[
    ("집주인", "임대인"),
    ("세입자", "임차인"),
    ("전세금", "임대차보증금"),
    ("보증금", "임대차보증금"),
    ("월세", "차임"),
    ("방세", "차임"),
    ("계약서", "임대차계약서"),
    ("집 나가라", "명도청구"),
    ("쫓겨나다", "명도"),
    ("돈 안줘", "채무불이행"),
    ("돈 못받아", "보증금반환청구"),
    ("사기", "사기죄"),
    ("속았다", "기망행위"),
    ("깡통전세", "전세사기"),
    ("이중계약", "중복임대"),
    ("고소", "형사고발"),
    ("고발", "형사고발"),
    ("소송", "민사소송"),
    ("재판", "소송"),
    ("변호사", "법무사"),
    ("상담", "법률상담"),
    ("해결", "분쟁해결"),
    ("보상", "손해배상"),
    ("배상", "손해배상"),
    ("계약", "법률행위"),
    ("약속", "계약"),
    ("위반", "채무불이행"),
    ("어기다", "위반하다"),
];

/// One colloquial → domain substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRule {
    pub from: String,
    pub to: String,
}

impl TermRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Built-in indicator vocabulary.
pub fn default_indicators() -> Vec<String> {
    DEFAULT_INDICATORS.iter().map(|s| s.to_string()).collect()
}

/// Built-in term table, in application order.
pub fn default_terms() -> Vec<TermRule> {
    DEFAULT_TERMS
        .iter()
        .map(|(from, to)| TermRule::new(*from, *to))
        .collect()
}

/// Normalization tuning, decoupled from application config.
#[derive(Debug, Clone)]
pub struct NormalizerSettings {
    /// Terms whose presence means the query is already domain-appropriate.
    pub indicators: Vec<String>,
    /// Ordered substitution table.
    pub terms: Vec<TermRule>,
    /// Maximum number of memoized queries.
    pub memo_capacity: NonZeroUsize,
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        Self {
            indicators: default_indicators(),
            terms: default_terms(),
            memo_capacity: NonZeroUsize::new(DEFAULT_MEMO_CAPACITY).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

/// Returns true if `query` contains any of `indicators`.
pub fn contains_indicator(query: &str, indicators: &[String]) -> bool {
    indicators
        .iter()
        .any(|term| !term.is_empty() && query.contains(term.as_str()))
}

/// Applies `terms` in order. Each rule sees the output of the previous one.
pub fn apply_term_rules(query: &str, terms: &[TermRule]) -> String {
    let mut converted = query.to_string();
    for rule in terms {
        if !rule.from.is_empty() && converted.contains(rule.from.as_str()) {
            converted = converted.replace(rule.from.as_str(), &rule.to);
        }
    }
    converted
}

/// Fills the fixed rewrite instructions with `query`.
pub fn build_rewrite_prompt(query: &str) -> String {
    REWRITE_TEMPLATE.replace("{query}", query)
}

/// Pulls the converted query out of a rewrite response.
///
/// Takes the text after the last [`REWRITE_MARKER`] when present, otherwise
/// the whole response, and trims surrounding whitespace.
pub fn extract_rewritten_query(response: &str) -> String {
    let tail = match response.rfind(REWRITE_MARKER) {
        Some(pos) => &response[pos + REWRITE_MARKER.len()..],
        None => response,
    };
    tail.trim().to_string()
}

/// Tiered query normalizer with an LRU memo.
pub struct QueryNormalizer {
    settings: NormalizerSettings,
    rewriter: Arc<dyn Rewriter>,
    memo: Mutex<LruCache<String, String>>,
}

impl QueryNormalizer {
    pub fn new(settings: NormalizerSettings, rewriter: Arc<dyn Rewriter>) -> Self {
        let memo = Mutex::new(LruCache::new(settings.memo_capacity));
        Self {
            settings,
            rewriter,
            memo,
        }
    }

    pub fn settings(&self) -> &NormalizerSettings {
        &self.settings
    }

    /// Number of memoized queries, or `None` if the memo is unusable.
    pub fn memo_len(&self) -> Option<usize> {
        self.memo.lock().ok().map(|memo| memo.len())
    }

    /// Normalizes `query`. Never fails: if the memo is unusable the raw
    /// query is returned with [`ConversionMethod::Error`].
    pub async fn normalize(&self, query: &str) -> NormalizedQuery {
        match self.normalize_with_outcome(query).await.into_value() {
            Some(normalized) => normalized,
            None => NormalizedQuery::new(query, ConversionMethod::Error),
        }
    }

    /// Normalizes `query`, reporting a rewrite failure as `Degraded` and an
    /// unusable memo as `Failed`.
    pub async fn normalize_with_outcome(&self, query: &str) -> Outcome<NormalizedQuery> {
        if query.trim().is_empty() {
            return Outcome::Ok(NormalizedQuery::new(query, ConversionMethod::NoConversionNeeded));
        }

        if contains_indicator(query, &self.settings.indicators) {
            debug!(query, "query already uses legal vocabulary");
            return Outcome::Ok(NormalizedQuery::new(query, ConversionMethod::NoConversionNeeded));
        }

        match self.memo_get(query) {
            Ok(Some(memoized)) => {
                debug!(query, converted = %memoized, "query served from memo");
                return Outcome::Ok(NormalizedQuery::new(memoized, ConversionMethod::Cached));
            }
            Ok(None) => {}
            Err(reason) => return Outcome::Failed(reason),
        }

        let rule_converted = apply_term_rules(query, &self.settings.terms);
        if rule_converted != query {
            if let Err(reason) = self.memo_put(query, &rule_converted) {
                return Outcome::Failed(reason);
            }
            info!(query, converted = %rule_converted, "query converted by term table");
            return Outcome::Ok(NormalizedQuery::new(rule_converted, ConversionMethod::RuleBased));
        }

        info!(query, rewriter = self.rewriter.name(), "rewriting query");
        let prompt = build_rewrite_prompt(query);
        let rewrite = AssertUnwindSafe(self.rewriter.rewrite(&prompt)).catch_unwind();
        let failure = match rewrite.await {
            Ok(Ok(response)) => {
                let rewritten = extract_rewritten_query(&response);
                if rewritten.is_empty() {
                    "rewrite service returned an empty query".to_string()
                } else {
                    if let Err(reason) = self.memo_put(query, &rewritten) {
                        return Outcome::Failed(reason);
                    }
                    info!(query, converted = %rewritten, "query rewritten");
                    return Outcome::Ok(NormalizedQuery::new(
                        rewritten,
                        ConversionMethod::LlmRewritten,
                    ));
                }
            }
            Ok(Err(e)) => format!("{:#}", e),
            Err(payload) => format!("rewrite service panicked: {}", panic_message(&*payload)),
        };

        warn!(query, error = %failure, "query rewrite failed, using rule-based text");
        Outcome::Degraded {
            value: NormalizedQuery::new(rule_converted, ConversionMethod::RuleBased),
            reasons: vec![DegradeReason::RewriteFailed(failure)],
        }
    }

    fn memo_get(&self, query: &str) -> Result<Option<String>, FailureReason> {
        let mut memo = self
            .memo
            .lock()
            .map_err(|_| FailureReason::MemoUnavailable)?;
        Ok(memo.get(query).cloned())
    }

    fn memo_put(&self, query: &str, converted: &str) -> Result<(), FailureReason> {
        let mut memo = self
            .memo
            .lock()
            .map_err(|_| FailureReason::MemoUnavailable)?;
        memo.put(query.to_string(), converted.to_string());
        Ok(())
    }
}
