#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Integer literal, kept as its raw digits
    ///
    /// The parser performs the bounds check so that a leading minus sign can
    /// be folded into the literal first.
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 9223372036854775807
    /// ```
    Integer(String),

    /// Floating-point literal
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// 0.5
    /// ```
    Float(f64),

    /// String literal enclosed in double or single quotes
    ///
    /// # Examples
    /// ```text
    /// "HYENA"
    /// 'Leo the Lion'
    /// ```
    String(String),

    /// Boolean values
    Boolean(bool),

    // Identifiers
    /// Stage name, field name, lambda parameter, method or function name
    ///
    /// Must start with a letter or underscore, followed by letters, digits,
    /// or underscores.
    ///
    /// # Examples
    /// ```text
    /// filter
    /// weight
    /// animal
    /// ```
    Identifier(String),

    // Operators
    /// Lambda arrow
    ///
    /// # Examples
    /// ```text
    /// a -> a.age > 10
    /// ```
    Arrow,

    // Comparison
    /// Equality operator
    EqEq,

    /// Inequality operator
    NotEq,

    /// Less than
    Lt,

    /// Greater than
    Gt,

    /// Less than or equal
    LtEq,

    /// Greater than or equal
    GtEq,

    // Arithmetic
    /// Addition or string concatenation
    Plus,

    /// Subtraction or negation
    Minus,

    /// Multiplication
    Star,

    /// Division
    Slash,

    /// Modulo
    Percent,

    // Logical
    /// Logical AND (`and` or `&&`)
    And,

    /// Logical OR (`or` or `||`)
    Or,

    /// Logical NOT (`not` or `!`)
    Not,

    // Delimiters
    /// Left parenthesis for grouping, stage arguments, or calls
    LParen,

    /// Right parenthesis
    RParen,

    /// Dot: stage marker at the top level, field access or method call inside
    /// expressions
    Dot,

    /// Comma separating call arguments
    Comma,

    /// Conditional operator, `cond ? a : b`
    Question,

    /// Separates the branches of a conditional
    Colon,

    /// End of input
    Eof,
}
