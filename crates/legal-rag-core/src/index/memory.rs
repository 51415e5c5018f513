//! In-memory [`SearchIndex`] implementation for snapshots and tests.
//!
//! Uses a `Vec` behind `std::sync::RwLock` for thread safety. Ranking is
//! brute-force term overlap: a document scores one point for every
//! whitespace-separated query term its content contains (case-insensitive).
//! Documents with no matching term are never returned. Ties keep insertion
//! order, so results are reproducible.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{IndexHit, Metadata};

use super::SearchIndex;

#[derive(Debug)]
struct StoredDoc {
    hit: IndexHit,
    content_lower: String,
}

/// In-memory index over a fixed set of documents.
#[derive(Debug)]
pub struct InMemoryIndex {
    name: String,
    docs: RwLock<Vec<StoredDoc>>,
}

impl InMemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: RwLock::new(Vec::new()),
        }
    }

    /// Builds an index from already-loaded hits, preserving their order.
    pub fn from_hits(name: impl Into<String>, hits: impl IntoIterator<Item = IndexHit>) -> Self {
        let index = Self::new(name);
        {
            let mut docs = index
                .docs
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            docs.extend(hits.into_iter().map(|hit| StoredDoc {
                content_lower: hit.content.to_lowercase(),
                hit,
            }));
        }
        index
    }

    /// Appends a document.
    pub fn insert(&self, content: impl Into<String>, metadata: Metadata) -> Result<()> {
        let content = content.into();
        let mut docs = self
            .docs
            .write()
            .map_err(|_| anyhow!("index '{}' lock poisoned", self.name))?;
        docs.push(StoredDoc {
            content_lower: content.to_lowercase(),
            hit: IndexHit { content, metadata },
        });
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for InMemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> Option<usize> {
        self.docs.read().ok().map(|docs| docs.len())
    }

    async fn search(&self, text: &str, k: usize) -> Result<Vec<IndexHit>> {
        let query_lower = text.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        if terms.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let docs = self
            .docs
            .read()
            .map_err(|_| anyhow!("index '{}' lock poisoned", self.name))?;

        let mut scored: Vec<(usize, &StoredDoc)> = docs
            .iter()
            .filter_map(|doc| {
                let matches = terms
                    .iter()
                    .filter(|t| doc.content_lower.contains(*t))
                    .count();
                (matches > 0).then_some((matches, doc))
            })
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, doc)| doc.hit.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect()
    }

    fn sample_index() -> InMemoryIndex {
        let index = InMemoryIndex::new("legal");
        index
            .insert("임대인은 임대차보증금을 반환하여야 한다", meta(&[("case_id", "1")]))
            .unwrap();
        index
            .insert("임차인의 차임 연체와 계약 해지", meta(&[("case_id", "2")]))
            .unwrap();
        index
            .insert("임대인 임차인 임대차보증금 반환 청구", meta(&[("case_id", "3")]))
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_ranks_by_term_overlap() {
        let index = sample_index();
        let hits = index.search("임대인 임대차보증금 반환", 5).await.unwrap();
        let ids: Vec<&str> = hits
            .iter()
            .map(|h| h.metadata["case_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let index = sample_index();
        let hits = index.search("임대인", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata["case_id"], "1");
        assert_eq!(hits[1].metadata["case_id"], "3");
    }

    #[tokio::test]
    async fn test_respects_k() {
        let index = sample_index();
        let hits = index.search("임대인 임차인", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata["case_id"], "3");
    }

    #[tokio::test]
    async fn test_blank_query_returns_nothing() {
        let index = sample_index();
        assert!(index.search("   ", 5).await.unwrap().is_empty());
        assert!(index.search("임대인", 0).await.unwrap().is_empty());
    }

    #[test]
    fn test_from_hits_preserves_len() {
        let hits = vec![
            IndexHit {
                content: "a".to_string(),
                metadata: Metadata::new(),
            },
            IndexHit {
                content: "b".to_string(),
                metadata: Metadata::new(),
            },
        ];
        let index = InMemoryIndex::from_hits("news", hits);
        assert_eq!(index.len(), Some(2));
        assert_eq!(index.name(), "news");
    }
}
