use crate::ast::{BinOp, UnaryOp};

/// Abstract Syntax Tree node representing an expression embedded in a stage.
///
/// Expressions are evaluated against one element at a time. They can read
/// fields of that element, compute with literals, and call into a fixed
/// library of methods and functions. They cannot construct new records.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    /// Literal integer (bounds-checked at parse time)
    ///
    /// # Example
    /// ```text
    /// 42
    /// ```
    Integer(i64),

    /// Literal floating point number
    Float(f64),

    /// String literal
    ///
    /// # Example
    /// ```text
    /// "LION"
    /// ```
    String(String),

    /// Boolean literal
    Boolean(bool),

    // References
    /// Bare identifier
    ///
    /// Inside a lambda this is normally the lambda parameter; any other name
    /// is rejected by the policy before evaluation.
    Variable(String),

    /// Field access
    ///
    /// # Examples
    /// ```text
    /// a.weight
    /// a.name
    /// ```
    Field { object: Box<Expr>, name: String },

    // Operations
    /// Unary operation (negation, logical not)
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Binary operation (arithmetic, comparison, logical)
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Conditional; only the chosen branch is evaluated
    ///
    /// # Examples
    /// ```text
    /// a.weight < 200 ? "light" : "heavy"
    /// ```
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },

    /// Method call on a value
    ///
    /// # Examples
    /// ```text
    /// a.name.upper()
    /// a.name().toUpperCase()
    /// a.species.startsWith("L")
    /// ```
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },

    /// Library function call
    ///
    /// # Examples
    /// ```text
    /// abs(a.age - 10)
    /// range(0, x)
    /// ```
    Call { function: String, args: Vec<Expr> },
}

/// A single-parameter lambda, `x -> body`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub param: String,
    pub body: Expr,
}

/// Extracts a value from an element: a key for sorting or grouping, a number
/// for summing, a predicate or a mapped value.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// The element itself
    Identity,

    /// Named field of a record element (`weight`)
    Field(String),

    /// Arbitrary expression over the element (`a -> a.weight / 100`)
    Lambda(Lambda),
}
