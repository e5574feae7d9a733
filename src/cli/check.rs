//! Run streamy scripts against JSON input

use super::CliError;
use crate::{
    ExecutionOutcome, Sandbox, SandboxConfig, convert::decode_dataset, parser::parse,
};

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The streamy script to run
    pub script: String,
    /// JSON array input
    pub input: Option<String>,
    /// Record type name for object elements
    pub record_name: Option<String>,
    /// Natural ordering field for object elements
    pub natural_key: Option<String>,
    /// Only validate syntax, don't execute
    pub syntax_only: bool,
    /// Sandbox limits
    pub config: SandboxConfig,
}

/// Result of a check operation
#[derive(Debug)]
pub enum CheckResult {
    /// Syntax validation passed
    SyntaxValid,
    /// Script ran successfully with JSON output
    Success(serde_json::Value),
}

/// Execute a streamy check operation
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    if options.syntax_only {
        parse(&options.script)?;
        return Ok(CheckResult::SyntaxValid);
    }

    let json_str = options.input.as_ref().ok_or(CliError::NoInput)?;
    let json: serde_json::Value = serde_json::from_str(json_str)?;
    let (element_type, input) = decode_dataset(
        &json,
        options.record_name.as_deref(),
        options.natural_key.as_deref(),
    )?;

    let sandbox = Sandbox::new(options.config.clone());
    match sandbox.submit(&options.script, &element_type, &input) {
        ExecutionOutcome::Success(value) => Ok(CheckResult::Success(value.to_json())),
        ExecutionOutcome::ValidationError(e) => Err(CliError::Policy(e)),
        ExecutionOutcome::CompileError(e) => Err(CliError::Parse(e)),
        ExecutionOutcome::RuntimeError(e) => Err(CliError::Runtime(e)),
        ExecutionOutcome::Timeout(deadline) => Err(CliError::Timeout(deadline.as_millis())),
    }
}
