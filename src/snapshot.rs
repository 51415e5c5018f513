//! JSON-lines snapshot loading.
//!
//! A snapshot is a file of already-retrievable documents, one JSON object
//! per line:
//!
//! ```text
//! {"content": "임대인은 임대차가 종료한 경우 ...", "metadata": {"case_id": "2023다12345"}}
//! {"page_content": "전세사기 피해 ...", "metadata": {"title": "...", "url": "..."}}
//! ```
//!
//! `page_content` is accepted as an alias of `content`. Blank lines are
//! skipped; `metadata` may be omitted. Documents are loaded verbatim into an
//! [`InMemoryIndex`]; nothing is embedded or re-chunked.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use legal_rag_core::index::memory::InMemoryIndex;
use legal_rag_core::index::SearchIndex;
use legal_rag_core::models::{IndexHit, Metadata};

#[derive(Debug, Deserialize)]
struct SnapshotLine {
    #[serde(alias = "page_content")]
    content: String,
    #[serde(default)]
    metadata: Metadata,
}

/// Parses snapshot text. `name` labels the resulting index.
pub fn parse_snapshot(name: &str, text: &str) -> Result<InMemoryIndex> {
    let mut hits = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let doc: SnapshotLine = serde_json::from_str(line)
            .with_context(|| format!("{}: invalid document on line {}", name, i + 1))?;
        hits.push(IndexHit {
            content: doc.content,
            metadata: doc.metadata,
        });
    }
    Ok(InMemoryIndex::from_hits(name, hits))
}

/// Reads a snapshot file into an in-memory index named after the file.
pub fn load_snapshot(path: &Path) -> Result<InMemoryIndex> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_snapshot(&name, &text)
}

/// Opens a source handle, or `None` if the source is unavailable.
///
/// An unset path, a missing file, and a snapshot that fails to load all
/// leave the source unavailable; the failure is logged, never raised.
pub fn open_source(label: &str, path: Option<&Path>) -> Option<Arc<dyn SearchIndex>> {
    let Some(path) = path else {
        info!(source = label, "source not configured");
        return None;
    };
    if !path.exists() {
        warn!(source = label, path = %path.display(), "snapshot does not exist");
        return None;
    }
    match load_snapshot(path) {
        Ok(index) => {
            info!(
                source = label,
                path = %path.display(),
                documents = index.len().unwrap_or(0),
                "snapshot loaded"
            );
            Some(Arc::new(index))
        }
        Err(e) => {
            warn!(source = label, error = %format!("{:#}", e), "snapshot failed to load");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_accepts_both_content_keys() {
        let text = r#"{"content": "보증금 반환", "metadata": {"case_id": "1"}}

{"page_content": "전세사기", "metadata": {"title": "t", "url": "u"}}
{"content": "메타데이터 없음"}
"#;
        let index = parse_snapshot("test", text).unwrap();
        assert_eq!(index.len(), Some(3));
    }

    #[test]
    fn test_parse_reports_line_number() {
        let text = "{\"content\": \"ok\"}\n\nnot json\n";
        let err = parse_snapshot("legal.jsonl", text).unwrap_err();
        assert!(format!("{:#}", err).contains("line 3"));
    }

    #[test]
    fn test_open_source_unavailable_cases() {
        let tmp = TempDir::new().unwrap();
        assert!(open_source("legal", None).is_none());
        assert!(open_source("legal", Some(&tmp.path().join("missing.jsonl"))).is_none());

        let broken = tmp.path().join("broken.jsonl");
        fs::write(&broken, "{").unwrap();
        assert!(open_source("legal", Some(&broken)).is_none());
    }

    #[tokio::test]
    async fn test_open_source_searchable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("legal.jsonl");
        fs::write(
            &path,
            "{\"content\": \"임대차보증금 반환 청구\", \"metadata\": {\"case_id\": \"2023다12345\"}}\n",
        )
        .unwrap();

        let index = open_source("legal", Some(&path)).unwrap();
        assert_eq!(index.name(), "legal.jsonl");
        let hits = index.search("임대차보증금", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata["case_id"], "2023다12345");
    }
}
