//! Isolated, deadline-bounded execution of validated chains.

use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, warn};

use crate::{
    ast::OperationChain,
    evaluator::{DEFAULT_MAX_ELEMENTS, Evaluator, RuntimeError},
    parser::{ParseError, parse},
    policy::{DEFAULT_MAX_SCRIPT_LEN, Policy, PolicyError},
    result::ResultValue,
    schema::ElementType,
    value::Value,
};

const WORKER_NAME: &str = "streamy-worker";

/// Runtime limits for one sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Wall-clock budget for one execution
    pub deadline: Duration,
    /// Maximum number of elements a stage may materialize
    pub max_elements: usize,
    /// Maximum script length in bytes
    pub max_script_len: usize,
    /// Stack size of the worker thread
    pub worker_stack_size: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        SandboxConfig {
            deadline: Duration::from_secs(2),
            max_elements: DEFAULT_MAX_ELEMENTS,
            max_script_len: DEFAULT_MAX_SCRIPT_LEN,
            worker_stack_size: 8 * 1024 * 1024,
        }
    }
}

/// One-way cancellation flag shared with a worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Fail once cancellation has been requested
    pub fn check(&self) -> Result<(), RuntimeError> {
        if self.is_cancelled() {
            Err(RuntimeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Something that can run a chain over input.
///
/// [`Evaluator`] is the production engine.
pub trait Engine: Send + Sync + 'static {
    fn run(&self, chain: &OperationChain, input: Vec<Value>, cancel: &CancelToken) -> Result<Value, RuntimeError>;
}

/// Outcome of one submission.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success(ResultValue),
    ValidationError(PolicyError),
    CompileError(ParseError),
    RuntimeError(RuntimeError),
    Timeout(Duration),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success(_))
    }

    /// Short name of the outcome kind
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionOutcome::Success(_) => "success",
            ExecutionOutcome::ValidationError(_) => "validation error",
            ExecutionOutcome::CompileError(_) => "compile error",
            ExecutionOutcome::RuntimeError(_) => "runtime error",
            ExecutionOutcome::Timeout(_) => "timeout",
        }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::Success(value) => write!(f, "{}", value),
            ExecutionOutcome::ValidationError(e) => write!(f, "Validation error: {}", e),
            ExecutionOutcome::CompileError(e) => write!(f, "Compile error: {}", e),
            ExecutionOutcome::RuntimeError(e) => write!(f, "Runtime error: {}", e),
            ExecutionOutcome::Timeout(deadline) => {
                write!(f, "Timeout: execution exceeded {} ms", deadline.as_millis())
            }
        }
    }
}

/// Runs chains on a dedicated worker thread under a deadline.
///
/// The chain and input are moved into the worker. The caller waits on a
/// channel with a receive timeout; when the deadline passes it trips the
/// worker's cancellation token and abandons it.
pub struct Sandbox<E: Engine = Evaluator> {
    engine: Arc<E>,
    config: SandboxConfig,
}

impl Sandbox<Evaluator> {
    pub fn new(config: SandboxConfig) -> Self {
        let engine = Evaluator::with_max_elements(config.max_elements);
        Sandbox::with_engine(engine, config)
    }
}

impl Default for Sandbox<Evaluator> {
    fn default() -> Self {
        Sandbox::new(SandboxConfig::default())
    }
}

impl<E: Engine> Sandbox<E> {
    pub fn with_engine(engine: E, config: SandboxConfig) -> Self {
        Sandbox {
            engine: Arc::new(engine),
            config,
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Screen, parse, validate and execute a script.
    ///
    /// # Examples
    ///
    /// ```
    /// use streamy::{ElementType, ExecutionOutcome, Sandbox, Value};
    ///
    /// let sandbox = Sandbox::default();
    /// let input = vec![Value::Integer(3), Value::Integer(1), Value::Integer(2)];
    ///
    /// let outcome = sandbox.submit(".sorted().limit(2)", &ElementType::Number, &input);
    /// assert!(outcome.is_success());
    ///
    /// let outcome = sandbox.submit(".parallel().toList()", &ElementType::Number, &input);
    /// assert!(matches!(outcome, ExecutionOutcome::ValidationError(_)));
    /// ```
    pub fn submit(&self, script: &str, element_type: &ElementType, input: &[Value]) -> ExecutionOutcome {
        let policy = Policy::new(element_type.clone()).with_max_script_len(self.config.max_script_len);

        if let Err(e) = policy.screen(script) {
            warn!(error = %e, "script rejected before parsing");
            return ExecutionOutcome::ValidationError(e);
        }

        let chain = match parse(script) {
            Ok(chain) => chain,
            Err(e) => return ExecutionOutcome::CompileError(e),
        };
        debug!(chain = %chain.describe(), "parsed pipeline");

        if let Err(e) = policy.check_chain(&chain) {
            warn!(error = %e, "chain rejected by policy");
            return ExecutionOutcome::ValidationError(e);
        }

        self.execute(chain, input.to_vec())
    }

    /// Execute an already validated chain.
    pub fn execute(&self, chain: OperationChain, input: Vec<Value>) -> ExecutionOutcome {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let engine = Arc::clone(&self.engine);
        let started = Instant::now();

        let spawned = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .stack_size(self.config.worker_stack_size)
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| -> Result<ResultValue, RuntimeError> {
                    let value = engine.run(&chain, input, &worker_cancel)?;
                    Ok(ResultValue::of(value)?)
                }))
                .unwrap_or_else(|payload| Err(RuntimeError::Aborted(panic_message(payload.as_ref()))));

                // The receiver is gone if the caller already timed out
                let _ = tx.send(result);
            });

        if let Err(e) = spawned {
            return ExecutionOutcome::RuntimeError(RuntimeError::Aborted(format!("failed to spawn worker: {}", e)));
        }
        debug!(worker = WORKER_NAME, deadline_ms = self.config.deadline.as_millis() as u64, "worker spawned");

        match rx.recv_timeout(self.config.deadline) {
            Ok(Ok(value)) => {
                debug!(elapsed_ms = started.elapsed().as_millis() as u64, "worker finished");
                ExecutionOutcome::Success(value)
            }
            Ok(Err(e)) => ExecutionOutcome::RuntimeError(e),
            Err(RecvTimeoutError::Timeout) => {
                cancel.cancel();
                warn!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "deadline exceeded, abandoning worker"
                );
                ExecutionOutcome::Timeout(self.config.deadline)
            }
            Err(RecvTimeoutError::Disconnected) => ExecutionOutcome::RuntimeError(RuntimeError::Aborted(
                "worker exited without a result".to_string(),
            )),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
