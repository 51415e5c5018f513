//! Rule-table document classification.
//!
//! Documents from the legal collection come in several schemas (court
//! precedents, statutory interpretations, Q&A entries) with no reliable
//! shared type field, and news articles have a schema of their own. Each
//! document is assigned a [`Category`] by walking [`RULES`] in order; the
//! first rule with a matching condition wins and [`Category::Generic`] is
//! the fallback.
//!
//! # Rules
//!
//! | Priority | Category | `doc_type` contains | Metadata keys |
//! |----------|----------|---------------------|---------------|
//! | 1 | News | (none) | (`url` and `title`) or (`date` and `title`) |
//! | 2 | Precedent | 판례, 판결, 대법원, 고등법원, 지방법원 | any of 판결요지, 판시사항, `case_id`, `court` |
//! | 3 | Interpretation | 법령해석, 해석례, 유권해석, 행정해석 | any of 해석내용, 법령명, `interpretation_id` |
//! | 4 | QA | 백문백답, 생활법령, qa, 질의응답, faq | any of 질문, 답변, `question`, `answer`, `qa_id` |
//!
//! Classification is a pure function of the document: no counters or other
//! state are involved, so the same document always lands in the same
//! category.

use serde_json::Value;

use crate::models::{Category, Metadata};

/// Metadata key holding the source's free-form document type.
pub const DOC_TYPE_KEY: &str = "doc_type";

/// Label used for generic documents without a `doc_type`.
pub const DEFAULT_GENERIC_LABEL: &str = "법률자료";

/// A single test against a document's metadata.
#[derive(Debug, Clone, Copy)]
pub enum Condition {
    /// Every key is present.
    AllKeys(&'static [&'static str]),
    /// At least one key is present.
    AnyKey(&'static [&'static str]),
    /// The lowercased `doc_type` value contains at least one keyword.
    DocTypeContains(&'static [&'static str]),
}

impl Condition {
    fn matches(&self, metadata: &Metadata, doc_type: &str) -> bool {
        match self {
            Condition::AllKeys(keys) => keys.iter().all(|k| metadata.contains_key(*k)),
            Condition::AnyKey(keys) => keys.iter().any(|k| metadata.contains_key(*k)),
            Condition::DocTypeContains(keywords) => keywords.iter().any(|k| doc_type.contains(k)),
        }
    }
}

/// Assigns `category` when any of `conditions` holds.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRule {
    pub category: Category,
    pub conditions: &'static [Condition],
}

impl ClassificationRule {
    pub fn matches(&self, metadata: &Metadata, doc_type: &str) -> bool {
        self.conditions
            .iter()
            .any(|c| c.matches(metadata, doc_type))
    }
}

/// Classification rules in priority order.
pub const RULES: &[ClassificationRule] = &[
    ClassificationRule {
        category: Category::News,
        conditions: &[
            Condition::AllKeys(&["url", "title"]),
            Condition::AllKeys(&["date", "title"]),
        ],
    },
    ClassificationRule {
        category: Category::Precedent,
        conditions: &[
            Condition::DocTypeContains(&["판례", "판결", "대법원", "고등법원", "지방법원"]),
            Condition::AnyKey(&["판결요지", "판시사항", "case_id", "court"]),
        ],
    },
    ClassificationRule {
        category: Category::Interpretation,
        conditions: &[
            Condition::DocTypeContains(&["법령해석", "해석례", "유권해석", "행정해석"]),
            Condition::AnyKey(&["해석내용", "법령명", "interpretation_id"]),
        ],
    },
    ClassificationRule {
        category: Category::QA,
        conditions: &[
            Condition::DocTypeContains(&["백문백답", "생활법령", "qa", "질의응답", "faq"]),
            Condition::AnyKey(&["질문", "답변", "question", "answer", "qa_id"]),
        ],
    },
];

/// Renders a scalar metadata value as text.
///
/// Strings are returned as-is, numbers and booleans via their JSON text.
/// `null`, arrays, and objects have no text form and return `None`.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn doc_type_lower(metadata: &Metadata) -> String {
    metadata
        .get(DOC_TYPE_KEY)
        .and_then(scalar_text)
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// Assigns a category to a document.
///
/// Only metadata drives the current rules; `content` is accepted so that
/// content-based rules can be added without changing callers.
pub fn classify(metadata: &Metadata, _content: &str) -> Category {
    let doc_type = doc_type_lower(metadata);
    RULES
        .iter()
        .find(|rule| rule.matches(metadata, &doc_type))
        .map(|rule| rule.category)
        .unwrap_or(Category::Generic)
}

/// Metadata key carrying a stable identifier for `category`, if any.
///
/// News and generic documents have no identifier and are always numbered.
pub fn identifier_key(category: Category) -> Option<&'static str> {
    match category {
        Category::Precedent => Some("case_id"),
        Category::Interpretation => Some("interpretation_id"),
        Category::QA => Some("qa_id"),
        Category::News | Category::Generic => None,
    }
}

/// Display label for a generic document: its `doc_type`, or
/// [`DEFAULT_GENERIC_LABEL`].
pub fn generic_label(metadata: &Metadata) -> String {
    metadata
        .get(DOC_TYPE_KEY)
        .and_then(scalar_text)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_GENERIC_LABEL.to_string())
}
