//! # Legal RAG CLI (`lrag`)
//!
//! Runs the query normalization and dual-source retrieval pipeline from the
//! command line, against JSON-lines snapshots of the legal and news
//! collections.
//!
//! ## Usage
//!
//! ```bash
//! lrag --config ./config/lrag.toml <command>
//! ```
//!
//! Without `--config`, built-in defaults are used and no source is
//! configured.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lrag ask "<query>"` | Print the formatted context block for a query |
//! | `lrag normalize "<query>"` | Print the search query and how it was derived |
//! | `lrag sources` | List configured sources and their status |
//!
//! ## Examples
//!
//! ```bash
//! # Context block, with per-stage diagnostics on stderr
//! lrag ask "집주인이 보증금을 안 줘요" --explain --config ./config/lrag.toml
//!
//! # Full turn result as JSON
//! lrag ask "전세사기 대처 방법" --json --config ./config/lrag.toml
//!
//! # Debug logging
//! LRAG_LOG=legal_rag=debug,legal_rag_core=debug lrag ask "..."
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use legal_rag::config::{self, Config};
use legal_rag::logging;
use legal_rag::pipeline::{Pipeline, PipelineOutput, FAILURE_PREFIX};
use legal_rag::retriever::SourceReport;
use legal_rag::rewrite::create_rewriter;
use legal_rag::sources;
use legal_rag_core::models::{ConversionMethod, NormalizedQuery, Outcome, RetrievalMode};
use legal_rag_core::normalizer::QueryNormalizer;

/// Legal RAG CLI: query normalization and dual-source retrieval for a
/// Korean tenancy legal assistant.
#[derive(Parser)]
#[command(
    name = "lrag",
    about = "Legal RAG: query normalization and dual-source retrieval context engine",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Relative source paths in the file are resolved against its directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Normalize, retrieve, and format context for a query.
    ///
    /// Prints the labeled context block that would be handed to the answer
    /// model.
    Ask {
        /// The user's question.
        query: String,

        /// Print the normalization method, per-source status, and batch
        /// mode to stderr.
        #[arg(long)]
        explain: bool,

        /// Print the full turn result as JSON instead of the context block.
        #[arg(long)]
        json: bool,
    },

    /// Show how a query would be normalized, without searching.
    Normalize {
        /// The user's question.
        query: String,
    },

    /// List configured sources and their status.
    Sources,
}

fn print_report(report: &SourceReport) {
    eprintln!(
        "{:<16} {:<16} hits={} reliability={}",
        report.source.as_str(),
        report.status.as_str(),
        report.hits,
        report.reliability
    );
}

fn explain(output: &PipelineOutput) {
    eprintln!("method:  {}", output.query.method);
    eprintln!("search:  {}", output.query.text);
    eprintln!("mode:    {}", output.batch_mode);
    print_report(&output.sources.legal);
    print_report(&output.sources.news);
}

async fn run_ask(cfg: &Config, query: &str, show_explain: bool, json: bool) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(cfg)?;
    let outcome = pipeline.run(query).await;

    for reason in outcome.reasons() {
        eprintln!("warning: {}", reason);
    }

    match outcome {
        Outcome::Ok(output) | Outcome::Degraded { value: output, .. } => {
            if show_explain {
                explain(&output);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{}", output.context);
            }
        }
        Outcome::Failed(reason) => {
            if show_explain {
                eprintln!("mode:    {}", RetrievalMode::Error);
            }
            println!("{}{}", FAILURE_PREFIX, reason);
        }
    }
    Ok(())
}

async fn run_normalize(cfg: &Config, query: &str) -> anyhow::Result<()> {
    let rewriter = create_rewriter(&cfg.rewrite)?;
    let normalizer = QueryNormalizer::new(cfg.normalizer.to_settings()?, rewriter);
    let outcome = normalizer.normalize_with_outcome(query).await;

    for reason in outcome.reasons() {
        eprintln!("warning: {}", reason);
    }
    let normalized = match outcome {
        Outcome::Ok(n) | Outcome::Degraded { value: n, .. } => n,
        Outcome::Failed(reason) => {
            eprintln!("warning: {}", reason);
            NormalizedQuery::new(query, ConversionMethod::Error)
        }
    };
    println!("method: {}", normalized.method);
    println!("query:  {}", normalized.text);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let cli = Cli::parse();

    let cfg = config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Ask {
            query,
            explain,
            json,
        } => {
            run_ask(&cfg, &query, explain, json).await?;
        }
        Commands::Normalize { query } => {
            run_normalize(&cfg, &query).await?;
        }
        Commands::Sources => {
            sources::list_sources(&cfg);
        }
    }

    Ok(())
}
