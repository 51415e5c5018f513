//! # Legal RAG
//!
//! Query normalization and dual-source retrieval for a Korean residential
//! tenancy legal assistant.
//!
//! Each user turn runs a fixed pipeline: the colloquial question is
//! normalized into statutory vocabulary, the legal and news collections
//! are searched concurrently, results are combined legal-first, and the
//! documents are rendered into a labeled context block for the answer
//! model.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────┐   ┌──────────┐   ┌───────────┐
//! │ Normalizer │──▶│ DualSource       │──▶│ Combine  │──▶│ Formatter │
//! │ memo+terms │   │ Retriever        │   │ legal →  │   │ classify  │
//! │ +rewrite   │   │ legal ∥ news     │   │ news     │   │ + label   │
//! └────────────┘   └──────────────────┘   └──────────┘   └───────────┘
//! ```
//!
//! The pure stages live in `legal-rag-core`; this crate adds
//! configuration, rewrite providers, snapshot loading, the concurrent
//! retriever, and the `lrag` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`rewrite`] | OpenAI / Ollama rewrite providers |
//! | [`snapshot`] | JSON-lines snapshot loading |
//! | [`retriever`] | Concurrent dual-source retrieval |
//! | [`pipeline`] | Per-turn entry point |
//! | [`sources`] | Source status listing |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod logging;
pub mod pipeline;
pub mod retriever;
pub mod rewrite;
pub mod snapshot;
pub mod sources;
