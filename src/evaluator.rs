use std::{cmp::Ordering, collections::BTreeMap, iter};

use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::{
    ast::{Aggregator, BinOp, Comparator, Direction, Expr, Lambda, Operation, OperationChain, Selector, UnaryOp},
    result::ConversionError,
    sandbox::{CancelToken, Engine},
    value::{Key, Value},
};

/// Default cap on the number of elements a stage may materialize.
pub const DEFAULT_MAX_ELEMENTS: usize = 1_000_000;

/// Methods callable on values inside expressions.
pub const METHODS: &[&str] = &[
    "upper",
    "toUpperCase",
    "lower",
    "toLowerCase",
    "trim",
    "length",
    "contains",
    "startsWith",
    "endsWith",
    "abs",
];

/// Free functions callable inside expressions.
pub const FUNCTIONS: &[&str] = &["abs", "min", "max", "range"];

/// Errors that can occur while running a pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// Type mismatch or invalid operation for the given type
    #[error("Type error: {0}")]
    TypeError(String),

    #[error("numeric overflow in {0}")]
    Overflow(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("empty input to {0}")]
    EmptyInput(&'static str),

    #[error("sequence exceeds the limit of {0} elements")]
    TooManyElements(usize),

    #[error("execution cancelled")]
    Cancelled,

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The interpreter panicked; always a bug
    #[error("interpreter aborted: {0}")]
    Aborted(String),
}

type Sequence<'a> = Box<dyn Iterator<Item = Result<Value, RuntimeError>> + 'a>;

/// Intermediate state between stages.
enum Flow<'a> {
    /// Lazy element sequence
    Seq(Sequence<'a>),
    /// Result of a reducing stage
    Single(Value),
    /// Partitions produced by `groupBy`; later stages apply per group
    Groups(BTreeMap<Key, Flow<'a>>),
}

/// Binding of the lambda parameter while evaluating an expression
struct Scope<'v> {
    param: &'v str,
    value: &'v Value,
}

/// Tree-walking interpreter for operation chains.
///
/// Sequences flow lazily from stage to stage; only stages that need the whole
/// sequence (sorting, distinct, grouping, max/min) materialize it, and those
/// are capped by `max_elements`.
#[derive(Debug, Clone)]
pub struct Evaluator {
    max_elements: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator {
            max_elements: DEFAULT_MAX_ELEMENTS,
        }
    }
}

impl Engine for Evaluator {
    fn run(&self, chain: &OperationChain, input: Vec<Value>, cancel: &CancelToken) -> Result<Value, RuntimeError> {
        Evaluator::run(self, chain, input, cancel)
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_elements(max_elements: usize) -> Self {
        Evaluator { max_elements }
    }

    /// Runs a chain against its input.
    ///
    /// # Examples
    ///
    /// ```
    /// use streamy::{CancelToken, Evaluator, Value};
    /// use streamy::parser::parse;
    ///
    /// let chain = parse(".filter(x -> x > 2).sum()").unwrap();
    /// let input = vec![Value::Integer(1), Value::Integer(3), Value::Integer(4)];
    ///
    /// let result = Evaluator::new().run(&chain, input, &CancelToken::new()).unwrap();
    /// assert_eq!(result, Value::Integer(7));
    /// ```
    pub fn run(&self, chain: &OperationChain, input: Vec<Value>, cancel: &CancelToken) -> Result<Value, RuntimeError> {
        debug!(stages = chain.len(), elements = input.len(), "evaluating pipeline");

        let token = cancel.clone();
        let source: Sequence = Box::new(input.into_iter().map(move |item| {
            token.check()?;
            Ok(item)
        }));

        let mut flow = Flow::Seq(source);
        for operation in chain.iter() {
            flow = self.apply(operation, flow, cancel)?;
        }
        self.finish(flow, cancel)
    }

    fn apply<'a>(&'a self, operation: &'a Operation, flow: Flow<'a>, cancel: &'a CancelToken) -> Result<Flow<'a>, RuntimeError> {
        match flow {
            Flow::Seq(seq) => self.apply_stage(operation, seq, cancel),
            Flow::Groups(groups) => groups
                .into_iter()
                .map(|(key, group)| Ok((key, self.apply(operation, group, cancel)?)))
                .collect::<Result<BTreeMap<_, _>, RuntimeError>>()
                .map(Flow::Groups),
            Flow::Single(value) => Err(RuntimeError::TypeError(format!(
                "{}() requires a sequence, got {}",
                operation.name(),
                value.type_name()
            ))),
        }
    }

    fn apply_stage<'a>(&'a self, operation: &'a Operation, seq: Sequence<'a>, cancel: &'a CancelToken) -> Result<Flow<'a>, RuntimeError> {
        let flow = match operation {
            Operation::Filter(selector) => Flow::Seq(Box::new(seq.filter_map(move |item| {
                match item.and_then(|value| Ok((self.predicate(selector, &value)?, value))) {
                    Ok((true, value)) => Some(Ok(value)),
                    Ok((false, _)) => None,
                    Err(e) => Some(Err(e)),
                }
            }))),
            Operation::Map(selector) => {
                Flow::Seq(Box::new(seq.map(move |item| item.and_then(|value| self.select(selector, &value)))))
            }
            Operation::FlatMap(lambda) => Flow::Seq(Box::new(seq.flat_map(move |item| -> Sequence<'a> {
                match item.and_then(|value| self.expand(lambda, &value, cancel)) {
                    Ok(expanded) => expanded,
                    Err(e) => Box::new(iter::once(Err(e))),
                }
            }))),
            Operation::Sort(comparator) => {
                let natural = Comparator::natural();
                let items = self.materialize(seq, cancel)?;
                let sorted = self.sort(items, comparator.as_ref().unwrap_or(&natural), cancel)?;
                Flow::Seq(Box::new(sorted.into_iter().map(Ok)))
            }
            Operation::Distinct => {
                let unique = distinct(self.materialize(seq, cancel)?, cancel)?;
                Flow::Seq(Box::new(unique.into_iter().map(Ok)))
            }
            Operation::MaxBy(comparator) => {
                Flow::Single(self.extreme(seq, comparator, Ordering::Greater, "max", cancel)?)
            }
            Operation::MinBy(comparator) => Flow::Single(self.extreme(seq, comparator, Ordering::Less, "min", cancel)?),
            Operation::SumBy(selector) => Flow::Single(self.sum(seq, selector, cancel)?),
            Operation::GroupBy(selector) => Flow::Groups(self.group(seq, selector, cancel)?),
            Operation::Collect(aggregator) => Flow::Single(self.collect(seq, aggregator, cancel)?),
            Operation::Limit(n) => Flow::Seq(Box::new(seq.take(*n))),
            Operation::Skip(n) => {
                // Errors are never skipped over
                let mut remaining = *n;
                Flow::Seq(Box::new(seq.filter(move |item| {
                    if item.is_ok() && remaining > 0 {
                        remaining -= 1;
                        false
                    } else {
                        true
                    }
                })))
            }
        };
        Ok(flow)
    }

    fn finish(&self, flow: Flow<'_>, cancel: &CancelToken) -> Result<Value, RuntimeError> {
        match flow {
            Flow::Seq(seq) => Ok(Value::List(self.materialize(seq, cancel)?)),
            Flow::Single(value) => Ok(value),
            Flow::Groups(groups) => groups
                .into_iter()
                .map(|(key, group)| Ok((key, self.finish(group, cancel)?)))
                .collect::<Result<BTreeMap<_, _>, RuntimeError>>()
                .map(Value::Map),
        }
    }

    /// Drain a sequence into memory, respecting the element cap
    fn materialize(&self, seq: Sequence<'_>, cancel: &CancelToken) -> Result<Vec<Value>, RuntimeError> {
        let mut items = Vec::new();
        for item in seq {
            cancel.check()?;
            if items.len() >= self.max_elements {
                return Err(RuntimeError::TooManyElements(self.max_elements));
            }
            items.push(item?);
        }
        Ok(items)
    }

    /// Sequence produced by one `flatMap` lambda
    fn expand<'a>(&'a self, lambda: &'a Lambda, element: &Value, cancel: &'a CancelToken) -> Result<Sequence<'a>, RuntimeError> {
        let scope = Scope {
            param: &lambda.param,
            value: element,
        };

        // range() stays lazy so huge spans never allocate
        if let Expr::Call { function, args } = &lambda.body
            && function == "range"
        {
            let (from, to) = self.range_bounds(args, &scope)?;
            let token = cancel.clone();
            return Ok(Box::new((from..to).map(move |n| {
                token.check()?;
                Ok(Value::Integer(n))
            })));
        }

        match self.eval_expr(&lambda.body, &scope)? {
            Value::List(items) => Ok(Box::new(items.into_iter().map(Ok))),
            other => Err(RuntimeError::TypeError(format!(
                "flatMap() lambda must produce a list, got {}",
                other.type_name()
            ))),
        }
    }

    // ========================================
    // Selectors
    // ========================================

    fn select(&self, selector: &Selector, element: &Value) -> Result<Value, RuntimeError> {
        match selector {
            Selector::Identity => Ok(element.clone()),
            Selector::Field(name) => access_field(element, name),
            Selector::Lambda(lambda) => self.eval_lambda(lambda, element),
        }
    }

    fn predicate(&self, selector: &Selector, element: &Value) -> Result<bool, RuntimeError> {
        let value = self.select(selector, element)?;
        value.as_bool().ok_or_else(|| {
            RuntimeError::TypeError(format!("filter() predicate must be boolean, got {}", value.type_name()))
        })
    }

    fn eval_lambda(&self, lambda: &Lambda, element: &Value) -> Result<Value, RuntimeError> {
        let scope = Scope {
            param: &lambda.param,
            value: element,
        };
        self.eval_expr(&lambda.body, &scope)
    }

    /// Key used for one comparator column
    fn sort_key(&self, selector: &Selector, element: &Value) -> Result<Value, RuntimeError> {
        match (selector, element) {
            (Selector::Identity, Value::Record(record)) => {
                let schema = record.schema();
                schema
                    .natural_key
                    .as_deref()
                    .and_then(|field| record.get(field))
                    .cloned()
                    .ok_or_else(|| {
                        RuntimeError::TypeError(format!(
                            "{} has no natural ordering; pass a comparator",
                            schema.name
                        ))
                    })
            }
            _ => self.select(selector, element),
        }
    }

    /// Pair every element with its comparator keys
    fn keyed(
        &self,
        items: Vec<Value>,
        comparator: &Comparator,
        cancel: &CancelToken,
    ) -> Result<Vec<(Vec<Value>, Value)>, RuntimeError> {
        let keyed = items
            .into_iter()
            .map(|item| {
                cancel.check()?;
                let keys = comparator
                    .keys
                    .iter()
                    .map(|key| self.sort_key(&key.selector, &item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((keys, item))
            })
            .collect::<Result<Vec<_>, RuntimeError>>()?;

        // Every column must be comparable across elements before sorting
        if let Some((first, _)) = keyed.first() {
            for (keys, _) in &keyed {
                cancel.check()?;
                for (a, b) in first.iter().zip(keys) {
                    compare_values(a, b)?;
                }
            }
        }
        Ok(keyed)
    }

    // ========================================
    // Sequence stages
    // ========================================

    fn sort(&self, items: Vec<Value>, comparator: &Comparator, cancel: &CancelToken) -> Result<Vec<Value>, RuntimeError> {
        let mut keyed = self.keyed(items, comparator, cancel)?;
        // sort_by is stable: ties keep input order
        keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, comparator));
        Ok(keyed.into_iter().map(|(_, item)| item).collect())
    }

    /// max()/min(): first occurrence wins ties
    fn extreme(
        &self,
        seq: Sequence<'_>,
        comparator: &Comparator,
        wanted: Ordering,
        stage: &'static str,
        cancel: &CancelToken,
    ) -> Result<Value, RuntimeError> {
        let keyed = self.keyed(self.materialize(seq, cancel)?, comparator, cancel)?;
        let mut best: Option<(Vec<Value>, Value)> = None;

        for (keys, item) in keyed {
            best = match best {
                Some((best_keys, best_item)) if compare_keys(&keys, &best_keys, comparator) != wanted => {
                    Some((best_keys, best_item))
                }
                _ => Some((keys, item)),
            };
        }

        best.map(|(_, item)| item).ok_or(RuntimeError::EmptyInput(stage))
    }

    fn sum(&self, seq: Sequence<'_>, selector: &Selector, cancel: &CancelToken) -> Result<Value, RuntimeError> {
        let mut total = Value::Integer(0);
        for item in seq {
            cancel.check()?;
            let value = self.select(selector, &item?)?;
            if !value.is_number() {
                return Err(RuntimeError::TypeError(format!("sum() requires numbers, got {}", value.type_name())));
            }
            total = self.apply_binop(BinOp::Add, &total, &value).map_err(|e| match e {
                RuntimeError::Overflow(_) => RuntimeError::Overflow("sum".to_string()),
                other => other,
            })?;
        }
        Ok(total)
    }

    fn group<'a>(
        &self,
        seq: Sequence<'a>,
        selector: &Selector,
        cancel: &CancelToken,
    ) -> Result<BTreeMap<Key, Flow<'a>>, RuntimeError> {
        let mut groups: BTreeMap<Key, Vec<Value>> = BTreeMap::new();
        let mut count = 0usize;

        for item in seq {
            cancel.check()?;
            let item = item?;
            count += 1;
            if count > self.max_elements {
                return Err(RuntimeError::TooManyElements(self.max_elements));
            }

            let key = Key::try_from(self.select(selector, &item)?).map_err(|found| {
                RuntimeError::TypeError(format!("groupBy() key must be a number, text or boolean, got {}", found))
            })?;
            groups.entry(key).or_default().push(item);
        }

        Ok(groups
            .into_iter()
            .map(|(key, items)| (key, Flow::Seq(Box::new(items.into_iter().map(Ok)) as Sequence<'a>)))
            .collect())
    }

    fn collect(&self, seq: Sequence<'_>, aggregator: &Aggregator, cancel: &CancelToken) -> Result<Value, RuntimeError> {
        match aggregator {
            Aggregator::ToList => Ok(Value::List(self.materialize(seq, cancel)?)),
            Aggregator::ToSet => {
                let unique = distinct(self.materialize(seq, cancel)?, cancel)?;
                Ok(Value::List(self.sort(unique, &Comparator::natural(), cancel)?))
            }
            Aggregator::Counting => {
                let mut count: i64 = 0;
                for item in seq {
                    cancel.check()?;
                    item?;
                    count = count
                        .checked_add(1)
                        .ok_or_else(|| RuntimeError::Overflow("count".to_string()))?;
                }
                Ok(Value::Integer(count))
            }
            Aggregator::Joining(separator) => {
                let parts = self
                    .materialize(seq, cancel)?
                    .into_iter()
                    .map(|item| match item {
                        Value::Text(s) => Ok(s),
                        other => Err(RuntimeError::TypeError(format!(
                            "joining() requires text, got {}",
                            other.type_name()
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Text(parts.join(separator)))
            }
            Aggregator::Summing(selector) => self.sum(seq, selector, cancel),
        }
    }

    // ========================================
    // Expressions
    // ========================================

    fn eval_expr(&self, expr: &Expr, scope: &Scope<'_>) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Integer(n) => Ok(Value::Integer(*n)),
            Expr::Float(n) => Ok(Value::Float(*n)),
            Expr::String(s) => Ok(Value::Text(s.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::Variable(name) if name == scope.param => Ok(scope.value.clone()),
            Expr::Variable(name) => Err(RuntimeError::TypeError(format!("unknown reference: {}", name))),
            Expr::Field { object, name } => {
                let object = self.eval_expr(object, scope)?;
                access_field(&object, name)
            }
            Expr::Unary { op, operand } => {
                let value = self.eval_expr(operand, scope)?;
                match (op, value) {
                    (UnaryOp::Negate, Value::Integer(n)) => n
                        .checked_neg()
                        .map(Value::Integer)
                        .ok_or_else(|| RuntimeError::Overflow(format!("-({})", n))),
                    (UnaryOp::Negate, Value::Float(n)) => Ok(Value::Float(-n)),
                    (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
                    (UnaryOp::Negate, other) => Err(RuntimeError::TypeError(format!(
                        "Cannot negate {}",
                        other.type_name()
                    ))),
                    (UnaryOp::Not, other) => Err(RuntimeError::TypeError(format!(
                        "'not' requires boolean, got {}",
                        other.type_name()
                    ))),
                }
            }
            Expr::BinaryOp { op: op @ (BinOp::And | BinOp::Or), left, right } => {
                let left = self.eval_bool(left, scope, *op)?;
                // Short-circuit
                match (op, left) {
                    (BinOp::And, false) => Ok(Value::Boolean(false)),
                    (BinOp::Or, true) => Ok(Value::Boolean(true)),
                    _ => self.eval_bool(right, scope, *op).map(Value::Boolean),
                }
            }
            Expr::BinaryOp { op, left, right } => {
                let left = self.eval_expr(left, scope)?;
                let right = self.eval_expr(right, scope)?;
                self.apply_binop(*op, &left, &right)
            }
            Expr::Conditional { condition, then, otherwise } => {
                let value = self.eval_expr(condition, scope)?;
                match value.as_bool() {
                    Some(true) => self.eval_expr(then, scope),
                    Some(false) => self.eval_expr(otherwise, scope),
                    None => Err(RuntimeError::TypeError(format!(
                        "'?' condition must be boolean, got {}",
                        value.type_name()
                    ))),
                }
            }
            Expr::MethodCall { object, method, args } => {
                let object = self.eval_expr(object, scope)?;
                let args = self.eval_args(args, scope)?;
                self.eval_method_call(&object, method, &args)
            }
            Expr::Call { function, args } => {
                if function == "range" {
                    let (from, to) = self.range_bounds(args, scope)?;
                    return self.range_list(from, to);
                }
                let args = self.eval_args(args, scope)?;
                self.eval_function(function, &args)
            }
        }
    }

    fn eval_bool(&self, expr: &Expr, scope: &Scope<'_>, op: BinOp) -> Result<bool, RuntimeError> {
        let value = self.eval_expr(expr, scope)?;
        value.as_bool().ok_or_else(|| {
            RuntimeError::TypeError(format!("'{}' requires boolean operands, got {}", op.symbol(), value.type_name()))
        })
    }

    fn eval_args(&self, args: &[Expr], scope: &Scope<'_>) -> Result<Vec<Value>, RuntimeError> {
        args.iter().map(|arg| self.eval_expr(arg, scope)).collect()
    }

    fn range_bounds(&self, args: &[Expr], scope: &Scope<'_>) -> Result<(i64, i64), RuntimeError> {
        match self.eval_args(args, scope)?.as_slice() {
            [Value::Integer(from), Value::Integer(to)] => Ok((*from, *to)),
            _ => Err(RuntimeError::TypeError(
                "range() requires two integer arguments".to_string(),
            )),
        }
    }

    /// Eager range, used outside flatMap
    fn range_list(&self, from: i64, to: i64) -> Result<Value, RuntimeError> {
        let len = (to as i128 - from as i128).max(0);
        if len > self.max_elements as i128 {
            return Err(RuntimeError::TooManyElements(self.max_elements));
        }
        Ok(Value::List((from..to).map(Value::Integer).collect()))
    }

    // ========================================
    // Arithmetic
    // ========================================

    fn apply_binop(&self, op: BinOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
        if op.is_comparison() {
            return compare_op(op, left, right);
        }

        match (left, right) {
            (Value::Integer(a), Value::Integer(b)) => integer_op(op, *a, *b),
            (Value::Float(a), Value::Float(b)) => float_op(op, *a, *b),
            (Value::Integer(a), Value::Float(b)) => match (Decimal::from_i64(*a), Decimal::from_f64(*b)) {
                (Some(ad), Some(bd)) => decimal_op(op, ad, bd),
                _ => float_op(op, *a as f64, *b),
            },
            (Value::Float(a), Value::Integer(b)) => match (Decimal::from_f64(*a), Decimal::from_i64(*b)) {
                (Some(ad), Some(bd)) => decimal_op(op, ad, bd),
                _ => float_op(op, *a, *b as f64),
            },
            (Value::Text(_), _) | (_, Value::Text(_)) if op == BinOp::Add => {
                Ok(Value::Text(format!("{}{}", left.to_text(), right.to_text())))
            }
            (a, b) => Err(RuntimeError::TypeError(format!(
                "Cannot apply '{}' to {} and {}",
                op.symbol(),
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    // ========================================
    // Method and function library
    // ========================================

    /// Dispatch method calls to their implementations
    fn eval_method_call(&self, object: &Value, method: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        // Record accessor style: a.name()
        if let Value::Record(record) = object
            && args.is_empty()
            && let Some(value) = record.get(method)
        {
            return Ok(value.clone());
        }

        match (method, object, args) {
            ("upper" | "toUpperCase", Value::Text(s), []) => Ok(Value::Text(s.to_uppercase())),
            ("lower" | "toLowerCase", Value::Text(s), []) => Ok(Value::Text(s.to_lowercase())),
            ("trim", Value::Text(s), []) => Ok(Value::Text(s.trim().to_string())),
            ("length", Value::Text(s), []) => Ok(Value::Integer(s.chars().count() as i64)),
            ("length", Value::List(items), []) => Ok(Value::Integer(items.len() as i64)),
            ("contains", Value::Text(s), [Value::Text(sub)]) => Ok(Value::Boolean(s.contains(sub.as_str()))),
            ("contains", Value::List(items), [needle]) => Ok(Value::Boolean(items.contains(needle))),
            ("startsWith", Value::Text(s), [Value::Text(prefix)]) => {
                Ok(Value::Boolean(s.starts_with(prefix.as_str())))
            }
            ("endsWith", Value::Text(s), [Value::Text(suffix)]) => Ok(Value::Boolean(s.ends_with(suffix.as_str()))),
            ("abs", value, []) => self.eval_function("abs", std::slice::from_ref(value)),
            _ if METHODS.contains(&method) => Err(RuntimeError::TypeError(format!(
                ".{}() cannot be applied to {} with {} argument(s)",
                method,
                object.type_name(),
                args.len()
            ))),
            _ => Err(RuntimeError::TypeError(format!("Unknown method: {}", method))),
        }
    }

    fn eval_function(&self, function: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        match (function, args) {
            ("abs", [Value::Integer(n)]) => n
                .checked_abs()
                .map(Value::Integer)
                .ok_or_else(|| RuntimeError::Overflow(format!("abs({})", n))),
            ("abs", [Value::Float(n)]) => Ok(Value::Float(n.abs())),
            ("min" | "max", [a, b]) if a.is_number() && b.is_number() => {
                let ordering = compare_values(a, b)?;
                let pick_left = match function {
                    "min" => ordering != Ordering::Greater,
                    _ => ordering != Ordering::Less,
                };
                Ok(if pick_left { a.clone() } else { b.clone() })
            }
            _ if FUNCTIONS.contains(&function) => Err(RuntimeError::TypeError(format!(
                "{}() cannot be applied to ({})",
                function,
                args.iter().map(Value::type_name).collect::<Vec<_>>().join(", ")
            ))),
            _ => Err(RuntimeError::TypeError(format!("Unknown function: {}", function))),
        }
    }
}

fn access_field(value: &Value, name: &str) -> Result<Value, RuntimeError> {
    match value {
        Value::Record(record) => record.get(name).cloned().ok_or_else(|| {
            RuntimeError::TypeError(format!("{} has no field '{}'", record.type_name(), name))
        }),
        other => Err(RuntimeError::TypeError(format!(
            "Cannot access field '{}' on {}",
            name,
            other.type_name()
        ))),
    }
}

/// Keep the first occurrence of each structurally equal element
fn distinct(items: Vec<Value>, cancel: &CancelToken) -> Result<Vec<Value>, RuntimeError> {
    // fingerprint -> indices into `unique`
    let mut seen: FxHashMap<u64, Vec<usize>> = FxHashMap::default();
    let mut unique: Vec<Value> = Vec::with_capacity(items.len());

    for item in items {
        cancel.check()?;
        let bucket = seen.entry(item.fingerprint()).or_default();
        if bucket.iter().all(|&index| unique[index] != item) {
            bucket.push(unique.len());
            unique.push(item);
        }
    }
    Ok(unique)
}

/// Compare two scalar values; mismatched kinds are an error
fn compare_values(a: &Value, b: &Value) -> Result<Ordering, RuntimeError> {
    match (a, b) {
        (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => Ok(a.total_cmp(b)),
        (Value::Integer(a), Value::Float(b)) => Ok(compare_mixed(*a, *b)),
        (Value::Float(a), Value::Integer(b)) => Ok(compare_mixed(*b, *a).reverse()),
        (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
        (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
        (a, b) => Err(RuntimeError::TypeError(format!(
            "Cannot compare {} with {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Integer against float without rounding the integer through f64
fn compare_mixed(int: i64, float: f64) -> Ordering {
    match Decimal::from_f64_retain(float) {
        Some(exact) => Decimal::from(int).cmp(&exact),
        // NaN, infinities and magnitudes beyond Decimal
        None => (int as f64).total_cmp(&float),
    }
}

/// Lexicographic comparison over comparator columns
fn compare_keys(a: &[Value], b: &[Value], comparator: &Comparator) -> Ordering {
    for ((x, y), key) in a.iter().zip(b).zip(&comparator.keys) {
        // Columns were checked comparable when the keys were built
        let ordering = compare_values(x, y).unwrap_or(Ordering::Equal);
        let ordering = match key.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_op(op: BinOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let result = match op {
        BinOp::Equal | BinOp::NotEqual => {
            let equal = if left.is_number() && right.is_number() {
                compare_values(left, right)? == Ordering::Equal
            } else {
                left == right
            };
            equal == (op == BinOp::Equal)
        }
        BinOp::LessThan => compare_values(left, right)? == Ordering::Less,
        BinOp::GreaterThan => compare_values(left, right)? == Ordering::Greater,
        BinOp::LessEqual => compare_values(left, right)? != Ordering::Greater,
        BinOp::GreaterEqual => compare_values(left, right)? != Ordering::Less,
        _ => {
            return Err(RuntimeError::TypeError(format!("'{}' is not a comparison", op.symbol())));
        }
    };
    Ok(Value::Boolean(result))
}

fn overflow(op: BinOp, a: impl ToString, b: impl ToString) -> RuntimeError {
    RuntimeError::Overflow(format!("{} {} {}", a.to_string(), op.symbol(), b.to_string()))
}

fn integer_op(op: BinOp, a: i64, b: i64) -> Result<Value, RuntimeError> {
    let result = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Subtract => a.checked_sub(b),
        BinOp::Multiply => a.checked_mul(b),
        BinOp::Divide => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            // Truncates toward zero
            a.checked_div(b)
        }
        BinOp::Modulo => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            a.checked_rem(b)
        }
        _ => {
            return Err(RuntimeError::TypeError(format!("'{}' is not arithmetic", op.symbol())));
        }
    };
    result.map(Value::Integer).ok_or_else(|| overflow(op, a, b))
}

fn float_op(op: BinOp, a: f64, b: f64) -> Result<Value, RuntimeError> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        BinOp::Multiply => a * b,
        BinOp::Divide | BinOp::Modulo if b == 0.0 => return Err(RuntimeError::DivisionByZero),
        BinOp::Divide => a / b,
        BinOp::Modulo => a % b,
        _ => {
            return Err(RuntimeError::TypeError(format!("'{}' is not arithmetic", op.symbol())));
        }
    };
    if result.is_finite() {
        Ok(Value::Float(result))
    } else {
        Err(overflow(op, a, b))
    }
}

/// Mixed integer/float arithmetic, computed exactly where possible
fn decimal_op(op: BinOp, a: Decimal, b: Decimal) -> Result<Value, RuntimeError> {
    let result = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Subtract => a.checked_sub(b),
        BinOp::Multiply => a.checked_mul(b),
        BinOp::Divide | BinOp::Modulo if b.is_zero() => return Err(RuntimeError::DivisionByZero),
        BinOp::Divide => a.checked_div(b),
        BinOp::Modulo => a.checked_rem(b),
        _ => {
            return Err(RuntimeError::TypeError(format!("'{}' is not arithmetic", op.symbol())));
        }
    };

    let rd = result.ok_or_else(|| overflow(op, a, b))?;
    if rd.is_integer()
        && let Some(r) = rd.to_i64()
    {
        return Ok(Value::Integer(r));
    }
    rd.to_f64().map(Value::Float).ok_or_else(|| overflow(op, a, b))
}
