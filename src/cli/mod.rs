//! CLI support for streamy
//!
//! Provides programmatic access to the streamy CLI commands so they can be
//! embedded in other tools.

mod check;
mod docs;
mod riddles;

pub use check::{CheckOptions, CheckResult, execute_check};
pub use docs::{DocTopic, doc_topic, docs_overview};
pub use riddles::{JudgeOptions, RiddleSummary, execute_judge, list_riddles, load_catalogue};

use std::io;

use thiserror::Error;

use crate::{CatalogueError, JudgeError, ParseError, PolicyError, RuntimeError, SchemaError};

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Validation error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Timeout: execution exceeded {0} ms")]
    Timeout(u128),

    #[error("Input error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Catalogue error: {0}")]
    Catalogue(#[from] CatalogueError),

    #[error("{0}")]
    Judge(#[from] JudgeError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("No input provided. Use --input or pipe JSON to stdin.")]
    NoInput,

    #[error("Unknown topic: '{0}'\nRun 'streamy docs' to see available topics.")]
    UnknownTopic(String),
}
