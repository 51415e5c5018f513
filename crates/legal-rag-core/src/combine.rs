//! Legal-then-news result combination.
//!
//! Legal and news scores come from different collections and are not on a
//! comparable scale, so results are never re-ranked across sources. The
//! batch is simply the top legal hits in source rank order followed by the
//! top news hits in source rank order. No deduplication is performed.

use crate::models::{RetrievalBatch, RetrievalMode, RetrievedDocument};

const DEFAULT_MAX_LEGAL_DOCS: usize = 8;
const DEFAULT_MAX_NEWS_DOCS: usize = 3;

/// Per-source caps applied by [`combine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombineLimits {
    pub max_legal_docs: usize,
    pub max_news_docs: usize,
}

impl Default for CombineLimits {
    fn default() -> Self {
        Self {
            max_legal_docs: DEFAULT_MAX_LEGAL_DOCS,
            max_news_docs: DEFAULT_MAX_NEWS_DOCS,
        }
    }
}

/// Derives the batch mode from which sources returned anything.
pub fn retrieval_mode(has_legal: bool, has_news: bool) -> RetrievalMode {
    match (has_legal, has_news) {
        (true, true) => RetrievalMode::LegalAndNews,
        (true, false) => RetrievalMode::LegalOnly,
        (false, true) => RetrievalMode::NewsOnly,
        (false, false) => RetrievalMode::Empty,
    }
}

/// Concatenates capped legal results and capped news results.
///
/// The mode reflects which inputs were non-empty before capping.
pub fn combine(
    mut legal: Vec<RetrievedDocument>,
    mut news: Vec<RetrievedDocument>,
    limits: &CombineLimits,
) -> RetrievalBatch {
    let mode = retrieval_mode(!legal.is_empty(), !news.is_empty());

    legal.truncate(limits.max_legal_docs);
    news.truncate(limits.max_news_docs);

    let mut documents = legal;
    documents.append(&mut news);

    RetrievalBatch { documents, mode }
}
