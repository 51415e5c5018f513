use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use legal_rag::config::{load_config, load_or_default};
use legal_rag::pipeline::Pipeline;

fn write_config(content: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("lrag.toml");
    fs::write(&path, content).unwrap();
    (tmp, path)
}

fn load_err(content: &str) -> String {
    let (_tmp, path) = write_config(content);
    format!("{:#}", load_config(&path).unwrap_err())
}

#[test]
fn test_full_config_loads() {
    let (tmp, path) = write_config(
        r#"
[normalizer]
memo_capacity = 16
indicators = ["임대인"]
terms = [{ from = "집주인", to = "임대인" }]

[retrieval]
legal_k = 3
news_k = 2
max_legal_docs = 4
max_news_docs = 1
legal_reliability = 0.9
news_reliability = 0.5

[format]
max_content_chars = 200

[rewrite]
provider = "ollama"
model = "llama3"
url = "http://127.0.0.1:11434"

[sources]
legal = "data/legal.jsonl"
"#,
    );

    let config = load_config(&path).unwrap();
    assert_eq!(config.normalizer.memo_capacity, 16);
    assert_eq!(config.normalizer.terms.len(), 1);
    assert_eq!(config.retrieval.legal_k, 3);
    assert_eq!(config.format.max_content_chars, 200);
    assert_eq!(config.rewrite.provider, "ollama");
    assert_eq!(config.rewrite.max_retries, 2);
    assert_eq!(
        config.sources.legal.unwrap(),
        tmp.path().join("data/legal.jsonl")
    );
    assert!(config.sources.news.is_none());
}

#[test]
fn test_empty_file_is_valid() {
    let (_tmp, path) = write_config("");
    let config = load_config(&path).unwrap();
    assert_eq!(config.retrieval.max_legal_docs, 8);
    assert!(!config.rewrite.is_enabled());
}

#[test]
fn test_validation_errors() {
    assert!(load_err("[normalizer]\nmemo_capacity = 0\n").contains("memo_capacity"));
    assert!(load_err("[retrieval]\nnews_k = 0\n").contains("retrieval.news_k"));
    assert!(load_err("[retrieval]\nmax_legal_docs = 0\n").contains("retrieval.max_legal_docs"));
    assert!(load_err("[retrieval]\nlegal_reliability = 1.5\n").contains("legal_reliability"));
    assert!(load_err("[format]\nmax_content_chars = 0\n").contains("max_content_chars"));
    assert!(load_err("[rewrite]\nprovider = \"bard\"\n").contains("Unknown rewrite provider"));
    assert!(load_err("[rewrite]\nprovider = \"openai\"\nmodel = \"\"\n").contains("rewrite.model"));
    assert!(
        load_err("[normalizer]\nterms = [{ from = \"\", to = \"x\" }]\n").contains("terms[0].from")
    );
}

#[test]
fn test_malformed_toml_is_reported() {
    assert!(load_err("[retrieval\nlegal_k = 1").contains("Failed to parse config file"));
}

#[test]
fn test_missing_file_is_reported() {
    let tmp = TempDir::new().unwrap();
    let err = load_config(&tmp.path().join("missing.toml")).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to read config file"));
}

#[test]
fn test_default_config_builds_pipeline() {
    let config = load_or_default(None).unwrap();
    let pipeline = Pipeline::from_config(&config).unwrap();
    assert!(pipeline.retriever().handle(legal_rag_core::models::SourceKind::Legal).is_none());
    assert_eq!(pipeline.normalizer().settings().memo_capacity.get(), 1024);
}
