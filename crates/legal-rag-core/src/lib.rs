//! # Legal RAG Core
//!
//! Runtime-agnostic logic for Legal RAG: data models, query normalization,
//! the search-handle abstraction, result combination, document
//! classification, and context formatting.
//!
//! This crate contains no tokio, network, or filesystem dependencies.
//! Concrete rewrite providers, snapshot loading, and the concurrent
//! dual-source retriever live in the `legal-rag` app crate.

pub mod classify;
pub mod combine;
pub mod format;
pub mod index;
pub mod models;
pub mod normalizer;
pub mod rewrite;
