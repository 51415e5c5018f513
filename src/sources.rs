use std::path::Path;

use legal_rag_core::index::SearchIndex;
use legal_rag_core::models::SourceKind;

use crate::config::Config;
use crate::snapshot::load_snapshot;

/// Availability of one configured source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatusRow {
    pub source: SourceKind,
    pub status: String,
    pub documents: usize,
    pub healthy: bool,
}

fn check(source: SourceKind, path: Option<&Path>) -> SourceStatusRow {
    let (status, documents, healthy) = match path {
        None => ("NOT CONFIGURED".to_string(), 0, false),
        Some(p) if !p.exists() => ("MISSING".to_string(), 0, false),
        Some(p) => match load_snapshot(p) {
            Ok(index) => ("OK".to_string(), index.len().unwrap_or(0), true),
            Err(_) => ("INVALID".to_string(), 0, false),
        },
    };
    SourceStatusRow {
        source,
        status,
        documents,
        healthy,
    }
}

pub fn source_statuses(config: &Config) -> Vec<SourceStatusRow> {
    vec![
        check(SourceKind::Legal, config.sources.legal.as_deref()),
        check(SourceKind::News, config.sources.news.as_deref()),
    ]
}

pub fn list_sources(config: &Config) {
    println!("{:<16} {:<16} {:<10} HEALTHY", "SOURCE", "STATUS", "DOCUMENTS");
    for row in source_statuses(config) {
        println!(
            "{:<16} {:<16} {:<10} {}",
            row.source.as_str(),
            row.status,
            row.documents,
            row.healthy
        );
    }
    println!("{:<16} {}", "rewrite", config.rewrite.provider);
}
