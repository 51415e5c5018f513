//! Context block formatting.
//!
//! Turns a [`RetrievalBatch`](crate::models::RetrievalBatch)'s documents
//! into the labeled text block handed to the answer-generating model. Each
//! document is classified (see [`crate::classify`]) and rendered with a
//! category label so the model can cite it precisely:
//!
//! ```text
//! 📋 검색결과: 판례 1개, 뉴스 1개
//! ============================================================
//! ⚠️ AI가 아래 자료 유형을 정확히 확인하고 답변하세요:
//! • 판례 자료: [판례-번호] 🏛️ 판례 형태로 표시됨
//! • 뉴스 자료: [뉴스-번호] 📰 뉴스 형태로 표시됨
//! ============================================================
//!
//! [판례-2023다12345] 🏛️ 판례
//! 내용: ...
//!
//! [뉴스-1] 📰 뉴스
//! 제목: ...
//! ```
//!
//! # Display IDs
//!
//! A document's stable identifier (`case_id`, `interpretation_id`, `qa_id`)
//! is used when non-blank. Otherwise the document gets the next number of a
//! counter kept per category. Counters live inside a single
//! [`format_documents`] call, so numbering never depends on earlier calls.
//!
//! # Failure Handling
//!
//! A document whose rendered metadata fields are not scalar values cannot
//! be rendered; it is replaced by a `[문서-N]` line carrying only its
//! content, where `N` is its position in the batch. The rest of the batch
//! is unaffected.

use thiserror::Error;
use tracing::{debug, warn};

use crate::classify::{classify, generic_label, identifier_key, scalar_text};
use crate::models::{Category, ClassifiedDocument, Metadata, RetrievalMode, RetrievedDocument};

/// Returned for an empty batch.
pub const NO_RESULTS: &str = "관련 자료를 찾을 수 없습니다.";

/// Appended to every rendered content excerpt, truncated or not.
pub const ELLIPSIS: &str = "...";

const DEFAULT_MAX_CONTENT_CHARS: usize = 1000;
const TITLE_MAX_CHARS: usize = 80;
const RULE_WIDTH: usize = 60;

/// Rendering limits, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSettings {
    /// Maximum characters of document content kept per block.
    pub max_content_chars: usize,
}

impl Default for FormatSettings {
    fn default() -> Self {
        Self {
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }
}

/// Why a single document could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("metadata field '{0}' is not a scalar value")]
    NonScalarField(String),
}

/// Keeps the first `max_chars` characters of `content`.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    content.chars().take(max_chars).collect()
}

/// Per-category tallies, used both for numbering and for the header.
#[derive(Debug, Default, Clone, Copy)]
struct CategoryCounts {
    precedent: usize,
    interpretation: usize,
    qa: usize,
    news: usize,
    generic: usize,
}

impl CategoryCounts {
    fn slot(&mut self, category: Category) -> &mut usize {
        match category {
            Category::Precedent => &mut self.precedent,
            Category::Interpretation => &mut self.interpretation,
            Category::QA => &mut self.qa,
            Category::News => &mut self.news,
            Category::Generic => &mut self.generic,
        }
    }

    fn next(&mut self, category: Category) -> usize {
        let slot = self.slot(category);
        *slot += 1;
        *slot
    }
}

/// Category-specific fields needed to render a block.
enum BlockDetail {
    Precedent,
    Interpretation,
    QA,
    News {
        title: String,
        source: String,
        date: String,
    },
    Generic {
        label: String,
    },
}

struct Prepared {
    classified: ClassifiedDocument,
    detail: BlockDetail,
}

/// Reads `key` as text. Absent and `null` values are `None`; arrays and
/// objects are an error.
fn optional_text(metadata: &Metadata, key: &str) -> Result<Option<String>, FormatError> {
    match metadata.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => scalar_text(value)
            .map(Some)
            .ok_or_else(|| FormatError::NonScalarField(key.to_string())),
    }
}

fn text_or(metadata: &Metadata, key: &str, default: &str) -> Result<String, FormatError> {
    Ok(optional_text(metadata, key)?.unwrap_or_else(|| default.to_string()))
}

fn prepare(
    doc: &RetrievedDocument,
    counters: &mut CategoryCounts,
    settings: &FormatSettings,
) -> Result<Prepared, FormatError> {
    let category = classify(&doc.metadata, &doc.content);

    let stable_id = match identifier_key(category) {
        Some(key) => optional_text(&doc.metadata, key)?.filter(|id| !id.trim().is_empty()),
        None => None,
    };

    let detail = match category {
        Category::Precedent => BlockDetail::Precedent,
        Category::Interpretation => BlockDetail::Interpretation,
        Category::QA => BlockDetail::QA,
        Category::News => BlockDetail::News {
            title: truncate_content(
                &text_or(&doc.metadata, "title", "제목없음")?,
                TITLE_MAX_CHARS,
            ),
            source: text_or(&doc.metadata, "source", "뉴스")?,
            date: text_or(&doc.metadata, "date", "날짜미상")?,
        },
        Category::Generic => BlockDetail::Generic {
            label: generic_label(&doc.metadata),
        },
    };

    // Numbers are only handed out once the document is known to render.
    let display_id = match stable_id {
        Some(id) => id,
        None => counters.next(category).to_string(),
    };

    Ok(Prepared {
        classified: ClassifiedDocument {
            category,
            display_id,
            truncated_content: truncate_content(&doc.content, settings.max_content_chars),
        },
        detail,
    })
}

fn render(prepared: &Prepared) -> String {
    let doc = &prepared.classified;
    let id = &doc.display_id;
    let heading = match &prepared.detail {
        BlockDetail::Precedent => format!("[판례-{}] 🏛️ 판례\n", id),
        BlockDetail::Interpretation => format!("[법령해석례-{}] ⚖️ 법령해석례\n", id),
        BlockDetail::QA => format!("[백문백답-{}] 💡 생활법령 Q&A\n", id),
        BlockDetail::News { title, source, date } => format!(
            "[뉴스-{}] 📰 뉴스\n제목: {}\n출처: {} | 날짜: {}\n",
            id, title, source, date
        ),
        BlockDetail::Generic { label } => format!("[법률-{}] 📋 {}\n", id, label),
    };
    format!("{}내용: {}{}\n", heading, doc.truncated_content, ELLIPSIS)
}

fn fallback_line(index: usize, doc: &RetrievedDocument, settings: &FormatSettings) -> String {
    let content = if doc.content.is_empty() {
        "내용 없음".to_string()
    } else {
        truncate_content(&doc.content, settings.max_content_chars)
    };
    format!("[문서-{}] {}{}", index + 1, content, ELLIPSIS)
}

/// Classifies every document the way [`format_documents`] would, skipping
/// documents that cannot be rendered.
pub fn classify_documents(
    documents: &[RetrievedDocument],
    settings: &FormatSettings,
) -> Vec<ClassifiedDocument> {
    let mut counters = CategoryCounts::default();
    documents
        .iter()
        .filter_map(|doc| prepare(doc, &mut counters, settings).ok())
        .map(|p| p.classified)
        .collect()
}

fn header(tally: &CategoryCounts) -> String {
    // Generic documents are reported under 판례, the general legal bucket.
    let precedent = tally.precedent + tally.generic;

    let mut parts = Vec::new();
    if precedent > 0 {
        parts.push(format!("판례 {}개", precedent));
    }
    if tally.interpretation > 0 {
        parts.push(format!("법령해석례 {}개", tally.interpretation));
    }
    if tally.qa > 0 {
        parts.push(format!("생활법령Q&A {}개", tally.qa));
    }
    if tally.news > 0 {
        parts.push(format!("뉴스 {}개", tally.news));
    }

    let rule = "=".repeat(RULE_WIDTH);
    let mut out = format!("📋 검색결과: {}\n", parts.join(", "));
    out.push_str(&rule);
    out.push('\n');
    out.push_str("⚠️ AI가 아래 자료 유형을 정확히 확인하고 답변하세요:\n");
    if precedent > 0 {
        out.push_str("• 판례 자료: [판례-번호] 🏛️ 판례 형태로 표시됨\n");
    }
    if tally.interpretation > 0 {
        out.push_str("• 법령해석례 자료: [법령해석례-번호] ⚖️ 법령해석례 형태로 표시됨\n");
    }
    if tally.qa > 0 {
        out.push_str("• 생활법령 자료: [백문백답-번호] 💡 생활법령 Q&A 형태로 표시됨\n");
    }
    if tally.news > 0 {
        out.push_str("• 뉴스 자료: [뉴스-번호] 📰 뉴스 형태로 표시됨\n");
    }
    out.push_str(&rule);
    out.push_str("\n\n");
    out
}

/// Renders `documents` into a labeled context block.
///
/// Returns [`NO_RESULTS`] for an empty slice. Never fails: documents that
/// cannot be rendered are replaced by a fallback line.
pub fn format_documents(
    documents: &[RetrievedDocument],
    mode: RetrievalMode,
    settings: &FormatSettings,
) -> String {
    if documents.is_empty() {
        return NO_RESULTS.to_string();
    }

    let mut counters = CategoryCounts::default();
    let mut tally = CategoryCounts::default();
    let mut blocks = Vec::with_capacity(documents.len());

    for (index, doc) in documents.iter().enumerate() {
        match prepare(doc, &mut counters, settings) {
            Ok(prepared) => {
                *tally.slot(prepared.classified.category) += 1;
                blocks.push(render(&prepared));
            }
            Err(e) => {
                warn!(index, error = %e, "document could not be formatted, using fallback line");
                blocks.push(fallback_line(index, doc, settings));
            }
        }
    }

    debug!(
        %mode,
        documents = documents.len(),
        precedent = tally.precedent,
        interpretation = tally.interpretation,
        qa = tally.qa,
        news = tally.news,
        generic = tally.generic,
        "formatted context"
    );

    let mut out = header(&tally);
    out.push_str(&blocks.join("\n\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;
    use serde_json::{json, Value};

    fn doc(source: SourceKind, content: &str, metadata: Value) -> RetrievedDocument {
        RetrievedDocument {
            content: content.to_string(),
            metadata: metadata
                .as_object()
                .unwrap()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            source,
        }
    }

    fn legal(content: &str, metadata: Value) -> RetrievedDocument {
        doc(SourceKind::Legal, content, metadata)
    }

    fn settings() -> FormatSettings {
        FormatSettings::default()
    }

    #[test]
    fn test_empty_returns_sentinel() {
        let out = format_documents(&[], RetrievalMode::Empty, &settings());
        assert_eq!(out, NO_RESULTS);
        assert!(!out.is_empty());
    }

    #[test]
    fn test_precedent_uses_case_id() {
        let docs = vec![legal("임대차보증금 반환 사건", json!({"case_id": "2023다12345"}))];
        let out = format_documents(&docs, RetrievalMode::LegalOnly, &settings());
        assert!(out.contains("[판례-2023다12345] 🏛️ 판례\n내용: 임대차보증금 반환 사건...\n"));
        assert!(out.starts_with("📋 검색결과: 판례 1개\n"));
    }

    #[test]
    fn test_blank_qa_id_is_numbered() {
        let docs = vec![
            legal("첫 번째", json!({"qa_id": "", "question": "q1", "answer": "a1"})),
            legal("두 번째", json!({"qa_id": "  ", "question": "q2", "answer": "a2"})),
        ];
        let classified = classify_documents(&docs, &settings());
        assert_eq!(classified[0].category, Category::QA);
        assert_eq!(classified[0].display_id, "1");
        assert_eq!(classified[1].display_id, "2");

        let out = format_documents(&docs, RetrievalMode::LegalOnly, &settings());
        assert!(out.contains("[백문백답-1] 💡 생활법령 Q&A"));
        assert!(out.contains("[백문백답-2] 💡 생활법령 Q&A"));
        assert!(out.contains("생활법령Q&A 2개"));
    }

    #[test]
    fn test_counters_are_per_category() {
        let docs = vec![
            legal("a", json!({"doc_type": "판례"})),
            legal("b", json!({"doc_type": "법령해석례"})),
            legal("c", json!({"doc_type": "판례"})),
        ];
        let ids: Vec<String> = classify_documents(&docs, &settings())
            .into_iter()
            .map(|d| d.display_id)
            .collect();
        assert_eq!(ids, vec!["1", "1", "2"]);
    }

    #[test]
    fn test_counters_reset_between_calls() {
        let docs = vec![legal("a", json!({"doc_type": "판례"}))];
        let first = format_documents(&docs, RetrievalMode::LegalOnly, &settings());
        let second = format_documents(&docs, RetrievalMode::LegalOnly, &settings());
        assert_eq!(first, second);
        assert!(second.contains("[판례-1]"));
    }

    #[test]
    fn test_news_block() {
        let docs = vec![doc(
            SourceKind::News,
            "전세사기 피해가 늘고 있다",
            json!({"url": "https://news.example/1", "title": "전세사기 급증", "date": "2024-03-01"}),
        )];
        let out = format_documents(&docs, RetrievalMode::NewsOnly, &settings());
        assert!(out.contains(
            "[뉴스-1] 📰 뉴스\n제목: 전세사기 급증\n출처: 뉴스 | 날짜: 2024-03-01\n내용: 전세사기 피해가 늘고 있다...\n"
        ));
        assert!(out.contains("• 뉴스 자료: [뉴스-번호] 📰 뉴스 형태로 표시됨"));
        assert!(!out.contains("• 판례 자료"));
    }

    #[test]
    fn test_news_title_is_capped() {
        let long_title = "가".repeat(100);
        let docs = vec![doc(
            SourceKind::News,
            "본문",
            json!({"url": "u", "title": long_title}),
        )];
        let out = format_documents(&docs, RetrievalMode::NewsOnly, &settings());
        assert!(out.contains(&format!("제목: {}\n", "가".repeat(80))));
        assert!(!out.contains(&"가".repeat(81)));
    }

    #[test]
    fn test_content_truncated_and_ellipsis_always_appended() {
        let long = "나".repeat(1500);
        let docs = vec![
            legal(&long, json!({"case_id": "1"})),
            legal("짧은 내용", json!({"case_id": "2"})),
        ];
        let out = format_documents(&docs, RetrievalMode::LegalOnly, &settings());
        assert!(out.contains(&format!("내용: {}...\n", "나".repeat(1000))));
        assert!(!out.contains(&"나".repeat(1001)));
        assert!(out.contains("내용: 짧은 내용...\n"));
    }

    #[test]
    fn test_generic_label_and_header_bucket() {
        let docs = vec![legal("조문", json!({"doc_type": "주택임대차보호법 조문"}))];
        let out = format_documents(&docs, RetrievalMode::LegalOnly, &settings());
        assert!(out.contains("[법률-1] 📋 주택임대차보호법 조문\n"));
        assert!(out.starts_with("📋 검색결과: 판례 1개\n"));
    }

    #[test]
    fn test_header_order_and_layout() {
        let docs = vec![
            doc(SourceKind::News, "n", json!({"date": "d", "title": "t"})),
            legal("q", json!({"question": "q"})),
            legal("i", json!({"interpretation_id": "21-0001"})),
            legal("p", json!({"case_id": "2020다1"})),
        ];
        let out = format_documents(&docs, RetrievalMode::LegalAndNews, &settings());
        let rule = "=".repeat(60);
        let expected_header = format!(
            "📋 검색결과: 판례 1개, 법령해석례 1개, 생활법령Q&A 1개, 뉴스 1개\n{rule}\n\
             ⚠️ AI가 아래 자료 유형을 정확히 확인하고 답변하세요:\n\
             • 판례 자료: [판례-번호] 🏛️ 판례 형태로 표시됨\n\
             • 법령해석례 자료: [법령해석례-번호] ⚖️ 법령해석례 형태로 표시됨\n\
             • 생활법령 자료: [백문백답-번호] 💡 생활법령 Q&A 형태로 표시됨\n\
             • 뉴스 자료: [뉴스-번호] 📰 뉴스 형태로 표시됨\n{rule}\n\n"
        );
        assert!(out.starts_with(&expected_header));

        // Blocks keep batch order; each ends in a newline and they are
        // joined by a blank line.
        let body = &out[expected_header.len()..];
        let blocks: Vec<&str> = body.split("\n\n\n").collect();
        assert_eq!(blocks.len(), 4);
        assert!(blocks[0].starts_with("[뉴스-1]"));
        assert!(blocks[1].starts_with("[백문백답-1]"));
        assert!(blocks[2].starts_with("[법령해석례-21-0001]"));
        assert!(blocks[3].starts_with("[판례-2020다1]"));
    }

    #[test]
    fn test_unrenderable_document_falls_back() {
        let docs = vec![
            legal("정상 판례", json!({"case_id": "1"})),
            legal("깨진 판례", json!({"case_id": ["a", "b"]})),
            legal("", json!({"case_id": {"nested": true}})),
        ];
        let out = format_documents(&docs, RetrievalMode::LegalOnly, &settings());
        assert!(out.contains("[판례-1] 🏛️ 판례"));
        assert!(out.contains("[문서-2] 깨진 판례..."));
        assert!(out.contains("[문서-3] 내용 없음..."));
        assert!(out.starts_with("📋 검색결과: 판례 1개\n"));
    }

    #[test]
    fn test_fallback_does_not_consume_numbers() {
        let docs = vec![
            doc(SourceKind::News, "a", json!({"url": "u", "title": ["bad"]})),
            doc(SourceKind::News, "b", json!({"url": "u", "title": "ok"})),
        ];
        let out = format_documents(&docs, RetrievalMode::NewsOnly, &settings());
        assert!(out.contains("[문서-1] a..."));
        assert!(out.contains("[뉴스-1] 📰 뉴스\n제목: ok"));
    }

    #[test]
    fn test_numeric_identifier_is_rendered() {
        let docs = vec![legal("p", json!({"case_id": 194950}))];
        let out = format_documents(&docs, RetrievalMode::LegalOnly, &settings());
        assert!(out.contains("[판례-194950]"));
    }

    #[test]
    fn test_custom_content_limit() {
        let docs = vec![legal("abcdef", json!({"case_id": "1"}))];
        let out = format_documents(
            &docs,
            RetrievalMode::LegalOnly,
            &FormatSettings {
                max_content_chars: 3,
            },
        );
        assert!(out.contains("내용: abc...\n"));
    }
}
