//! Search handle abstraction for Legal RAG.
//!
//! The [`SearchIndex`] trait is the only thing the retriever knows about a
//! document collection: given a query text and a result count, return
//! ranked hits. Index construction is owned by the host; a handle that
//! could not be opened is represented as `None` by the caller, not as an
//! error from this trait.
//!
//! Implementations must be `Send + Sync` so each source can be searched
//! from its own task.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::IndexHit;

/// A read-only similarity-search handle over one document collection.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`name`](SearchIndex::name) | Label used in logs and status output |
/// | [`len`](SearchIndex::len) | Number of searchable documents, if known |
/// | [`search`](SearchIndex::search) | Top-`k` hits in rank order |
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Returns a short label for this handle (e.g. a file name).
    fn name(&self) -> &str;

    /// Returns the number of documents behind this handle, if the backend
    /// can report it cheaply.
    fn len(&self) -> Option<usize> {
        None
    }

    /// Returns at most `k` hits ordered from most to least similar.
    async fn search(&self, text: &str, k: usize) -> Result<Vec<IndexHit>>;
}
