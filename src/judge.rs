//! Turns a (riddle, script) pair into a verdict.

use std::{fmt, sync::Arc};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::{
    catalogue::{CatalogueError, Riddle, RiddleRepository},
    evaluator::Evaluator,
    result::ResultValue,
    sandbox::{Engine, ExecutionOutcome, Sandbox, SandboxConfig},
};

pub const CORRECT_MESSAGE: &str = "Correct solution";
pub const INCORRECT_MESSAGE: &str = "Incorrect result, try again";

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("riddle '{0}' not found")]
    RiddleNotFound(String),

    #[error(transparent)]
    Catalogue(CatalogueError),
}

impl From<CatalogueError> for JudgeError {
    fn from(e: CatalogueError) -> Self {
        match e {
            CatalogueError::NotFound(id) => JudgeError::RiddleNotFound(id),
            other => JudgeError::Catalogue(other),
        }
    }
}

/// Category of a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Accepted,
    WrongAnswer,
    ValidationError,
    CompileError,
    RuntimeError,
    Timeout,
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerdictKind::Accepted => "accepted",
            VerdictKind::WrongAnswer => "wrong_answer",
            VerdictKind::ValidationError => "validation_error",
            VerdictKind::CompileError => "compile_error",
            VerdictKind::RuntimeError => "runtime_error",
            VerdictKind::Timeout => "timeout",
        };
        write!(f, "{}", s)
    }
}

/// The judge's decision for one submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub success: bool,
    pub kind: VerdictKind,
    /// Value the script produced, when it ran to completion
    pub actual: Option<ResultValue>,
    pub message: String,
}

impl Verdict {
    fn from_outcome(outcome: ExecutionOutcome, expected: &ResultValue) -> Self {
        let (kind, actual, message) = match outcome {
            ExecutionOutcome::Success(actual) if actual == *expected => {
                (VerdictKind::Accepted, Some(actual), CORRECT_MESSAGE.to_string())
            }
            ExecutionOutcome::Success(actual) => {
                (VerdictKind::WrongAnswer, Some(actual), INCORRECT_MESSAGE.to_string())
            }
            failure => {
                let kind = match failure {
                    ExecutionOutcome::ValidationError(_) => VerdictKind::ValidationError,
                    ExecutionOutcome::CompileError(_) => VerdictKind::CompileError,
                    ExecutionOutcome::Timeout(_) => VerdictKind::Timeout,
                    _ => VerdictKind::RuntimeError,
                };
                (kind, None, failure.to_string())
            }
        };

        Verdict {
            success: kind == VerdictKind::Accepted,
            kind,
            actual,
            message,
        }
    }
}

/// Judges scripts against riddles from a repository.
pub struct Judge<R: RiddleRepository, E: Engine = Evaluator> {
    repository: Arc<R>,
    sandbox: Sandbox<E>,
}

impl<R: RiddleRepository> Judge<R, Evaluator> {
    pub fn new(repository: Arc<R>, config: SandboxConfig) -> Self {
        Judge {
            repository,
            sandbox: Sandbox::new(config),
        }
    }
}

impl<R: RiddleRepository, E: Engine> Judge<R, E> {
    pub fn with_sandbox(repository: Arc<R>, sandbox: Sandbox<E>) -> Self {
        Judge { repository, sandbox }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn sandbox(&self) -> &Sandbox<E> {
        &self.sandbox
    }

    /// Judge a script against a riddle.
    ///
    /// Every failure of the script itself becomes an unsuccessful verdict.
    pub fn judge(&self, riddle: &Riddle, script: &str) -> Verdict {
        let outcome = self.sandbox.submit(script, &riddle.element_type, &riddle.input);
        let verdict = Verdict::from_outcome(outcome, &riddle.expected_output);
        info!(riddle = %riddle.id, verdict = %verdict.kind, "judged submission");
        verdict
    }

    /// Look up a riddle and judge a script against it.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use streamy::{Catalogue, Judge, SandboxConfig};
    ///
    /// let judge = Judge::new(Arc::new(Catalogue::safari().unwrap()), SandboxConfig::default());
    ///
    /// let verdict = judge.judge_by_id("5", ".sum(weight)").unwrap();
    /// assert!(verdict.success);
    ///
    /// assert!(judge.judge_by_id("missing", ".sum(weight)").is_err());
    /// ```
    pub fn judge_by_id(&self, id: &str, script: &str) -> Result<Verdict, JudgeError> {
        let riddle = self.repository.get_riddle(id)?;
        Ok(self.judge(&riddle, script))
    }
}
