//! Pre-execution policy checks.
//!
//! Two layers run before any script is evaluated:
//!
//! 1. a raw-text deny-list that rejects tokens naming concurrency, object
//!    construction, ambient I/O or reflection, matched as whole words outside
//!    string literals;
//! 2. a structural allow-list over the parsed chain: only the lambda
//!    parameter may be referenced, only library methods and functions may be
//!    called, and field access must name a declared field.
//!
//! The first violation found is reported.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use thiserror::Error;

use crate::{
    ast::{Aggregator, BinOp, Comparator, Expr, Lambda, Operation, OperationChain, Selector, UnaryOp},
    evaluator::{FUNCTIONS, METHODS},
    schema::{ElementType, FieldKind, RecordSchema},
};

/// Default upper bound on script length, in bytes.
pub const DEFAULT_MAX_SCRIPT_LEN: usize = 4096;

/// Tokens rejected anywhere outside string literals.
pub const FORBIDDEN_TOKENS: &[&str] = &[
    "parallel",
    "parallelStream",
    "forEach",
    "peek",
    "new",
    "System",
    "Runtime",
    "Thread",
    "Class",
    "getClass",
    "reflect",
    "exec",
    "spawn",
    "unsafe",
    "std",
    "env",
    "process",
    "File",
];

static DENY_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(&format!(r"\b(?:{})\b", FORBIDDEN_TOKENS.join("|"))));

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("Forbidden construct detected: {0}")]
    Forbidden(String),

    #[error("script is {length} bytes long; the limit is {limit}")]
    TooLong { length: usize, limit: usize },

    #[error("unknown reference '{name}': only the lambda parameter '{param}' is in scope")]
    UnknownReference { name: String, param: String },

    #[error("unknown method: .{0}()")]
    UnknownMethod(String),

    #[error("unknown function: {0}()")]
    UnknownFunction(String),

    #[error("{record} has no field '{field}'")]
    UnknownField { record: String, field: String },

    #[error("cannot access field '{field}' on {shape}")]
    FieldOnScalar { field: String, shape: &'static str },

    #[error("deny-list pattern failed to compile: {0}")]
    Pattern(String),
}

/// Statically known shape of a value flowing through the chain
#[derive(Debug, Clone)]
enum Shape {
    Number,
    Text,
    Boolean,
    Record(Arc<RecordSchema>),
    Unknown,
}

impl Shape {
    fn of(element_type: &ElementType) -> Self {
        match element_type {
            ElementType::Number => Shape::Number,
            ElementType::Text => Shape::Text,
            ElementType::Record(schema) => Shape::Record(Arc::clone(schema)),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Shape::Number => "number",
            Shape::Text => "text",
            Shape::Boolean => "boolean",
            Shape::Record(_) => "record",
            Shape::Unknown => "value",
        }
    }

    /// Shape of a value that may come from either branch
    fn join(self, other: Shape) -> Shape {
        match (self, other) {
            (Shape::Number, Shape::Number) => Shape::Number,
            (Shape::Text, Shape::Text) => Shape::Text,
            (Shape::Boolean, Shape::Boolean) => Shape::Boolean,
            (Shape::Record(a), Shape::Record(b)) if a == b => Shape::Record(a),
            _ => Shape::Unknown,
        }
    }
}

impl From<FieldKind> for Shape {
    fn from(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Number => Shape::Number,
            FieldKind::Text => Shape::Text,
            FieldKind::Boolean => Shape::Boolean,
        }
    }
}

/// Policy for scripts over one declared element type.
///
/// # Examples
///
/// ```
/// use streamy::{ElementType, Policy};
///
/// let policy = Policy::new(ElementType::Number);
/// let err = policy.screen(".peek(x -> x).toList()").unwrap_err();
/// assert!(err.to_string().contains("Forbidden"));
/// ```
#[derive(Debug, Clone)]
pub struct Policy {
    element_type: ElementType,
    max_script_len: usize,
}

impl Policy {
    pub fn new(element_type: ElementType) -> Self {
        Policy {
            element_type,
            max_script_len: DEFAULT_MAX_SCRIPT_LEN,
        }
    }

    pub fn with_max_script_len(mut self, max_script_len: usize) -> Self {
        self.max_script_len = max_script_len;
        self
    }

    pub fn element_type(&self) -> &ElementType {
        &self.element_type
    }

    /// Run both layers.
    pub fn validate(&self, script: &str, chain: &OperationChain) -> Result<(), PolicyError> {
        self.screen(script)?;
        self.check_chain(chain)
    }

    /// Raw-text layer: length limit and deny-listed tokens.
    pub fn screen(&self, script: &str) -> Result<(), PolicyError> {
        if script.len() > self.max_script_len {
            return Err(PolicyError::TooLong {
                length: script.len(),
                limit: self.max_script_len,
            });
        }

        let pattern = DENY_PATTERN
            .as_ref()
            .map_err(|e| PolicyError::Pattern(e.to_string()))?;

        match pattern.find(&mask_string_literals(script)) {
            Some(found) => Err(PolicyError::Forbidden(found.as_str().to_string())),
            None => Ok(()),
        }
    }

    /// Structural layer over the parsed chain.
    pub fn check_chain(&self, chain: &OperationChain) -> Result<(), PolicyError> {
        let mut shape = Shape::of(&self.element_type);
        for operation in chain.iter() {
            shape = self.check_operation(operation, shape)?;
        }
        Ok(())
    }

    /// Returns the shape of the elements flowing out of `operation`
    fn check_operation(&self, operation: &Operation, shape: Shape) -> Result<Shape, PolicyError> {
        match operation {
            Operation::Filter(selector) => {
                self.check_selector(selector, &shape)?;
                Ok(shape)
            }
            Operation::Map(selector) => self.check_selector(selector, &shape),
            Operation::FlatMap(lambda) => {
                self.check_lambda(lambda, &shape)?;
                match &lambda.body {
                    Expr::Call { function, .. } if function == "range" => Ok(Shape::Number),
                    _ => Ok(Shape::Unknown),
                }
            }
            Operation::Sort(Some(comparator))
            | Operation::MaxBy(comparator)
            | Operation::MinBy(comparator) => {
                self.check_comparator(comparator, &shape)?;
                Ok(shape)
            }
            Operation::Sort(None) | Operation::Distinct | Operation::Limit(_) | Operation::Skip(_) => {
                Ok(shape)
            }
            Operation::SumBy(selector) => {
                self.check_selector(selector, &shape)?;
                Ok(Shape::Number)
            }
            Operation::GroupBy(selector) => {
                self.check_selector(selector, &shape)?;
                Ok(shape)
            }
            Operation::Collect(aggregator) => match aggregator {
                Aggregator::Summing(selector) => {
                    self.check_selector(selector, &shape)?;
                    Ok(Shape::Number)
                }
                Aggregator::Counting => Ok(Shape::Number),
                Aggregator::Joining(_) => Ok(Shape::Text),
                Aggregator::ToList | Aggregator::ToSet => Ok(Shape::Unknown),
            },
        }
    }

    fn check_comparator(&self, comparator: &Comparator, shape: &Shape) -> Result<(), PolicyError> {
        for key in &comparator.keys {
            self.check_selector(&key.selector, shape)?;
        }
        Ok(())
    }

    fn check_selector(&self, selector: &Selector, shape: &Shape) -> Result<Shape, PolicyError> {
        match selector {
            Selector::Identity => Ok(shape.clone()),
            Selector::Field(name) => field_shape(shape, name),
            Selector::Lambda(lambda) => self.check_lambda(lambda, shape),
        }
    }

    fn check_lambda(&self, lambda: &Lambda, shape: &Shape) -> Result<Shape, PolicyError> {
        self.check_expr(&lambda.body, &lambda.param, shape)
    }

    /// Check an expression and infer its shape
    fn check_expr(&self, expr: &Expr, param: &str, shape: &Shape) -> Result<Shape, PolicyError> {
        match expr {
            Expr::Integer(_) | Expr::Float(_) => Ok(Shape::Number),
            Expr::String(_) => Ok(Shape::Text),
            Expr::Boolean(_) => Ok(Shape::Boolean),
            Expr::Variable(name) if name == param => Ok(shape.clone()),
            Expr::Variable(name) => Err(PolicyError::UnknownReference {
                name: name.clone(),
                param: param.to_string(),
            }),
            Expr::Field { object, name } => {
                let object = self.check_expr(object, param, shape)?;
                field_shape(&object, name)
            }
            Expr::Unary { op, operand } => {
                self.check_expr(operand, param, shape)?;
                Ok(match op {
                    UnaryOp::Negate => Shape::Number,
                    UnaryOp::Not => Shape::Boolean,
                })
            }
            Expr::BinaryOp { op, left, right } => {
                let left = self.check_expr(left, param, shape)?;
                let right = self.check_expr(right, param, shape)?;
                Ok(match op {
                    _ if op.is_comparison() => Shape::Boolean,
                    BinOp::And | BinOp::Or => Shape::Boolean,
                    BinOp::Add => match (left, right) {
                        (Shape::Text, _) | (_, Shape::Text) => Shape::Text,
                        (Shape::Number, Shape::Number) => Shape::Number,
                        _ => Shape::Unknown,
                    },
                    _ => Shape::Number,
                })
            }
            Expr::Conditional { condition, then, otherwise } => {
                self.check_expr(condition, param, shape)?;
                let then = self.check_expr(then, param, shape)?;
                let otherwise = self.check_expr(otherwise, param, shape)?;
                Ok(then.join(otherwise))
            }
            Expr::MethodCall { object, method, args } => {
                let object = self.check_expr(object, param, shape)?;
                for arg in args {
                    self.check_expr(arg, param, shape)?;
                }

                // Record accessor style: a.name()
                if let Shape::Record(schema) = &object
                    && args.is_empty()
                    && let Some(field) = schema.field(method)
                {
                    return Ok(field.kind.into());
                }

                if !METHODS.contains(&method.as_str()) {
                    return Err(PolicyError::UnknownMethod(method.clone()));
                }
                Ok(match method.as_str() {
                    "length" | "abs" => Shape::Number,
                    "contains" | "startsWith" | "endsWith" => Shape::Boolean,
                    _ => Shape::Text,
                })
            }
            Expr::Call { function, args } => {
                if !FUNCTIONS.contains(&function.as_str()) {
                    return Err(PolicyError::UnknownFunction(function.clone()));
                }
                for arg in args {
                    self.check_expr(arg, param, shape)?;
                }
                Ok(match function.as_str() {
                    "range" => Shape::Unknown,
                    _ => Shape::Number,
                })
            }
        }
    }
}

fn field_shape(shape: &Shape, name: &str) -> Result<Shape, PolicyError> {
    match shape {
        Shape::Record(schema) => schema
            .field(name)
            .map(|field| field.kind.into())
            .ok_or_else(|| PolicyError::UnknownField {
                record: schema.name.clone(),
                field: name.to_string(),
            }),
        Shape::Unknown => Ok(Shape::Unknown),
        scalar => Err(PolicyError::FieldOnScalar {
            field: name.to_string(),
            shape: scalar.name(),
        }),
    }
}

/// Blank out the contents of string literals, keeping byte offsets intact.
fn mask_string_literals(script: &str) -> String {
    let mut masked = String::with_capacity(script.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in script.chars() {
        match quote {
            None => {
                if ch == '"' || ch == '\'' {
                    quote = Some(ch);
                }
                masked.push(ch);
            }
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                    masked.push(ch);
                    continue;
                }
                for _ in 0..ch.len_utf8() {
                    masked.push(' ');
                }
            }
        }
    }
    masked
}
