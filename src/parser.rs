use std::mem;

use thiserror::Error;

use crate::{
    ast::{
        Aggregator, BinOp, Comparator, Direction, Expr, Lambda, Operation, OperationChain,
        Selector, SortKey, Token, UnaryOp,
    },
    lexer::{LexError, Lexer},
};

/// Maximum nesting of parenthesized or prefixed sub-expressions.
pub const MAX_NESTING_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("Pipeline must start with a stage call (.)")]
    MissingStage,

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("unknown aggregator: {0}")]
    UnknownAggregator(String),

    #[error("integer literal out of range: {0}")]
    IntegerOutOfRange(String),

    #[error("Expected {expected}, got {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Invalid argument to {stage}(): {message}")]
    InvalidArgument { stage: &'static str, message: String },

    #[error("expression nesting too deep (limit {0})")]
    TooDeep(usize),
}

/// Parse a complete script into an operation chain.
///
/// # Examples
///
/// ```
/// use streamy::parser::parse;
///
/// let chain = parse(".filter(a -> a.predator).sorted(by age)").unwrap();
/// assert_eq!(chain.len(), 2);
/// ```
pub fn parse(script: &str) -> Result<OperationChain, ParseError> {
    if !script.trim_start().starts_with('.') {
        return Err(ParseError::MissingStage);
    }
    let mut parser = Parser::new(Lexer::new(script))?;
    parser.parse_chain()
}

pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    peek_token: Token,
    depth: usize,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Result<Self, ParseError> {
        let current_token = lexer.next_token()?;
        let peek_token = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current_token,
            peek_token,
            depth: 0,
        })
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        let next = self.lexer.next_token()?;
        self.current_token = mem::replace(&mut self.peek_token, next);
        Ok(())
    }

    fn unexpected(&self, expected: impl Into<String>) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.into(),
            found: format!("{:?}", self.current_token),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if !self.check(&expected) {
            return Err(self.unexpected(format!("{:?}", expected)));
        }
        self.advance()
    }

    fn check(&self, token: &Token) -> bool {
        mem::discriminant(&self.current_token) == mem::discriminant(token)
    }

    fn check_identifier(&self, word: &str) -> bool {
        matches!(&self.current_token, Token::Identifier(name) if name == word)
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        match mem::replace(&mut self.current_token, Token::Eof) {
            Token::Identifier(name) => {
                self.advance()?;
                Ok(name)
            }
            other => {
                self.current_token = other;
                Err(self.unexpected(what))
            }
        }
    }

    /// Run `f` one nesting level deeper, failing once the limit is exceeded.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::TooDeep(MAX_NESTING_DEPTH));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}

// ============================================================================
// Chain and stages
// ============================================================================

impl Parser {
    /// Parse a complete chain of stages up to end of input
    pub fn parse_chain(&mut self) -> Result<OperationChain, ParseError> {
        if !self.check(&Token::Dot) {
            return Err(ParseError::MissingStage);
        }

        let mut operations = vec![];
        while self.check(&Token::Dot) {
            self.advance()?;
            if self.check_identifier("orElseThrow") {
                self.parse_or_else_throw(operations.last())?;
                continue;
            }
            operations.push(self.parse_operation()?);
        }

        self.expect(Token::Eof)?;
        Ok(OperationChain::new(operations))
    }

    fn parse_operation(&mut self) -> Result<Operation, ParseError> {
        let name = self.expect_identifier("stage name after '.'")?;

        // Resolve the name before touching the arguments so unknown stages fail fast.
        let operation = match name.as_str() {
            "filter" => self.stage_args(|p| p.parse_selector().map(Operation::Filter)),
            "map" => self.stage_args(|p| p.parse_selector().map(Operation::Map)),
            "flatMap" => self.stage_args(|p| p.parse_lambda().map(Operation::FlatMap)),
            "sorted" | "sort" => self.stage_args(|p| {
                if p.check(&Token::RParen) {
                    Ok(Operation::Sort(None))
                } else {
                    p.parse_comparator().map(|c| Operation::Sort(Some(c)))
                }
            }),
            "distinct" => self.stage_args(|_| Ok(Operation::Distinct)),
            "max" | "maxBy" => self.stage_args(|p| p.parse_optional_comparator().map(Operation::MaxBy)),
            "min" | "minBy" => self.stage_args(|p| p.parse_optional_comparator().map(Operation::MinBy)),
            "sum" | "sumBy" => self.stage_args(|p| {
                if p.check(&Token::RParen) {
                    Ok(Operation::SumBy(Selector::Identity))
                } else {
                    p.parse_selector().map(Operation::SumBy)
                }
            }),
            "groupBy" | "groupingBy" => {
                self.stage_args(|p| p.parse_selector().map(Operation::GroupBy))
            }
            "collect" => self.stage_args(|p| p.parse_aggregator().map(Operation::Collect)),
            "toList" => self.stage_args(|_| Ok(Operation::Collect(Aggregator::ToList))),
            "count" => self.stage_args(|_| Ok(Operation::Collect(Aggregator::Counting))),
            "limit" => self.stage_args(|p| p.parse_count("limit").map(Operation::Limit)),
            "skip" => self.stage_args(|p| p.parse_count("skip").map(Operation::Skip)),
            _ => return Err(ParseError::UnknownOperation(name)),
        }?;

        Ok(operation)
    }

    /// `max()` and `min()` already fail on empty input, so `.orElseThrow()`
    /// after them adds no stage.
    fn parse_or_else_throw(&mut self, previous: Option<&Operation>) -> Result<(), ParseError> {
        self.advance()?;
        self.expect(Token::LParen)?;
        self.expect(Token::RParen)?;
        match previous {
            Some(Operation::MaxBy(_) | Operation::MinBy(_)) => Ok(()),
            _ => Err(ParseError::InvalidArgument {
                stage: "orElseThrow",
                message: "only allowed directly after max() or min()".to_string(),
            }),
        }
    }

    /// Parse `( ... )` around a stage's arguments.
    fn stage_args(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<Operation, ParseError>,
    ) -> Result<Operation, ParseError> {
        self.expect(Token::LParen)?;
        let operation = f(self)?;
        self.expect(Token::RParen)?;
        Ok(operation)
    }

    fn parse_count(&mut self, stage: &'static str) -> Result<usize, ParseError> {
        match &self.current_token {
            Token::Integer(raw) => {
                let n = raw
                    .parse::<usize>()
                    .map_err(|_| ParseError::IntegerOutOfRange(raw.clone()))?;
                self.advance()?;
                Ok(n)
            }
            other => Err(ParseError::InvalidArgument {
                stage,
                message: format!("expected a non-negative integer, got {:?}", other),
            }),
        }
    }

    /// Selector: `field` or `x -> expr`
    fn parse_selector(&mut self) -> Result<Selector, ParseError> {
        match (&self.current_token, &self.peek_token) {
            (Token::Identifier(_), Token::Arrow) => self.parse_lambda().map(Selector::Lambda),
            (Token::Identifier(_), _) => self.expect_identifier("field name").map(Selector::Field),
            _ => Err(self.unexpected("field name or lambda")),
        }
    }

    pub fn parse_lambda(&mut self) -> Result<Lambda, ParseError> {
        let param = self.expect_identifier("lambda parameter")?;
        self.expect(Token::Arrow)?;
        let body = self.parse_expression()?;
        Ok(Lambda { param, body })
    }

    fn parse_optional_comparator(&mut self) -> Result<Comparator, ParseError> {
        if self.check(&Token::RParen) {
            Ok(Comparator::natural())
        } else {
            self.parse_comparator()
        }
    }

    /// Comparator: `key (then key)*`
    fn parse_comparator(&mut self) -> Result<Comparator, ParseError> {
        let mut keys = vec![self.parse_sort_key()?];
        while self.check_identifier("then") {
            self.advance()?;
            keys.push(self.parse_sort_key()?);
        }
        Ok(Comparator { keys })
    }

    fn direction_keyword(&self) -> Option<Direction> {
        match &self.current_token {
            Token::Identifier(word) => match word.as_str() {
                "asc" | "ascending" => Some(Direction::Ascending),
                "desc" | "descending" => Some(Direction::Descending),
                _ => None,
            },
            _ => None,
        }
    }

    /// Sort key: `[by] selector [direction]` or a bare direction
    fn parse_sort_key(&mut self) -> Result<SortKey, ParseError> {
        if self.check_identifier("Comparator") && self.peek_token == Token::Dot {
            return self.parse_comparator_factory();
        }

        if let Some(direction) = self.direction_keyword() {
            self.advance()?;
            return Ok(SortKey {
                selector: Selector::Identity,
                direction,
            });
        }

        // `by -> ...` is a lambda whose parameter happens to be named `by`
        if self.check_identifier("by") && self.peek_token != Token::Arrow {
            self.advance()?;
        }

        let selector = self.parse_selector()?;
        let direction = match self.direction_keyword() {
            Some(direction) => {
                self.advance()?;
                direction
            }
            None => Direction::Ascending,
        };

        Ok(SortKey {
            selector,
            direction,
        })
    }

    /// `Comparator.comparing(selector)[.reversed()]`, `Comparator.naturalOrder()`
    /// and `Comparator.reverseOrder()`
    fn parse_comparator_factory(&mut self) -> Result<SortKey, ParseError> {
        self.advance()?;
        self.advance()?;
        let factory = self.expect_identifier("Comparator factory")?;
        self.expect(Token::LParen)?;

        let selector = match factory.as_str() {
            "comparing" | "comparingInt" | "comparingLong" | "comparingDouble" => self.parse_selector()?,
            "naturalOrder" => Selector::Identity,
            "reverseOrder" => {
                self.expect(Token::RParen)?;
                return Ok(SortKey {
                    selector: Selector::Identity,
                    direction: Direction::Descending,
                });
            }
            _ => {
                return Err(ParseError::InvalidArgument {
                    stage: "Comparator",
                    message: format!("unsupported factory '{}'", factory),
                });
            }
        };
        self.expect(Token::RParen)?;

        let mut direction = Direction::Ascending;
        while self.check(&Token::Dot) && self.peek_token == Token::Identifier("reversed".to_string()) {
            self.advance()?;
            self.advance()?;
            self.expect(Token::LParen)?;
            self.expect(Token::RParen)?;
            direction = match direction {
                Direction::Ascending => Direction::Descending,
                Direction::Descending => Direction::Ascending,
            };
        }

        Ok(SortKey { selector, direction })
    }

    fn parse_aggregator(&mut self) -> Result<Aggregator, ParseError> {
        // Accept the `Collectors.` prefix familiar from Java streams
        if self.check_identifier("Collectors") && self.peek_token == Token::Dot {
            self.advance()?;
            self.advance()?;
        }

        let name = self.expect_identifier("aggregator")?;
        self.expect(Token::LParen)?;

        let aggregator = match name.as_str() {
            "toList" => Aggregator::ToList,
            "toSet" => Aggregator::ToSet,
            "counting" => Aggregator::Counting,
            "joining" => match mem::replace(&mut self.current_token, Token::Eof) {
                Token::String(separator) => {
                    self.advance()?;
                    Aggregator::Joining(separator)
                }
                other => {
                    self.current_token = other;
                    Aggregator::Joining(String::new())
                }
            },
            "summing" => Aggregator::Summing(self.parse_selector()?),
            _ => return Err(ParseError::UnknownAggregator(name)),
        };

        self.expect(Token::RParen)?;
        Ok(aggregator)
    }
}

// ============================================================================
// Expressions
// ============================================================================

impl Parser {
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.nested(|p| p.parse_conditional())
    }

    /// Parse a standalone expression that must span the whole input
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expression()?;
        self.expect(Token::Eof)?;
        Ok(expr)
    }

    /// `cond ? a : b`; the else branch nests to the right
    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let condition = self.parse_or()?;
        if !self.check(&Token::Question) {
            return Ok(condition);
        }
        self.advance()?;

        let then = self.parse_expression()?;
        self.expect(Token::Colon)?;
        let otherwise = self.parse_expression()?;

        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    /// Fold the left-associative links of one precedence level.
    ///
    /// Each link sits one level deeper in the tree, so each one counts
    /// against the nesting limit.
    fn binary_chain(
        &mut self,
        left: Expr,
        operator: fn(&Token) -> Option<BinOp>,
        operand: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let Some(op) = operator(&self.current_token) else {
            return Ok(left);
        };
        self.advance()?;
        let right = operand(self)?;

        let expr = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        self.nested(|p| p.binary_chain(expr, operator, operand))
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_and()?;
        self.binary_chain(
            left,
            |token| matches!(token, Token::Or).then_some(BinOp::Or),
            Self::parse_and,
        )
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_not()?;
        self.binary_chain(
            left,
            |token| matches!(token, Token::And).then_some(BinOp::And),
            Self::parse_not,
        )
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.check(&Token::Not) {
            self.advance()?;
            let operand = self.nested(|p| p.parse_not())?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;

        if let Some(op) = match &self.current_token {
            Token::EqEq => Some(BinOp::Equal),
            Token::NotEq => Some(BinOp::NotEqual),
            Token::Lt => Some(BinOp::LessThan),
            Token::Gt => Some(BinOp::GreaterThan),
            Token::LtEq => Some(BinOp::LessEqual),
            Token::GtEq => Some(BinOp::GreaterEqual),
            _ => None,
        } {
            self.advance()?;
            let right = self.parse_additive()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_multiplicative()?;
        self.binary_chain(
            left,
            |token| match token {
                Token::Plus => Some(BinOp::Add),
                Token::Minus => Some(BinOp::Subtract),
                _ => None,
            },
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_unary()?;
        self.binary_chain(
            left,
            |token| match token {
                Token::Star => Some(BinOp::Multiply),
                Token::Slash => Some(BinOp::Divide),
                Token::Percent => Some(BinOp::Modulo),
                _ => None,
            },
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if !self.check(&Token::Minus) {
            return self.parse_postfix();
        }
        self.advance()?;

        // Fold the sign into a literal so i64::MIN is representable
        match mem::replace(&mut self.current_token, Token::Eof) {
            Token::Integer(raw) => {
                let literal = format!("-{}", raw);
                let n = literal
                    .parse::<i64>()
                    .map_err(|_| ParseError::IntegerOutOfRange(literal))?;
                self.advance()?;
                self.parse_postfix_from(Expr::Integer(n))
            }
            Token::Float(f) => {
                self.advance()?;
                self.parse_postfix_from(Expr::Float(-f))
            }
            other => {
                self.current_token = other;
                let operand = self.nested(|p| p.parse_unary())?;
                Ok(Expr::Unary {
                    op: UnaryOp::Negate,
                    operand: Box::new(operand),
                })
            }
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let primary = self.parse_primary()?;
        self.parse_postfix_from(primary)
    }

    /// Parse `.field` and `.method(args)` suffixes, one nesting level each
    fn parse_postfix_from(&mut self, expr: Expr) -> Result<Expr, ParseError> {
        if !self.check(&Token::Dot) {
            return Ok(expr);
        }
        self.advance()?;
        let name = self.expect_identifier("field or method name after '.'")?;

        let expr = if self.check(&Token::LParen) {
            let args = self.parse_call_args()?;
            Expr::MethodCall {
                object: Box::new(expr),
                method: name,
                args,
            }
        } else {
            Expr::Field {
                object: Box::new(expr),
                name,
            }
        };
        self.nested(|p| p.parse_postfix_from(expr))
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(Token::LParen)?;
        let mut args = vec![];

        while !self.check(&Token::RParen) {
            args.push(self.parse_expression()?);

            if !self.check(&Token::RParen) {
                self.expect(Token::Comma)?;
            }
        }

        self.expect(Token::RParen)?;
        Ok(args)
    }

    /// Parse primary expressions: literals, identifiers, calls, parentheses
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match mem::replace(&mut self.current_token, Token::Eof) {
            Token::Integer(raw) => {
                let n = raw
                    .parse::<i64>()
                    .map_err(|_| ParseError::IntegerOutOfRange(raw))?;
                self.advance()?;
                Ok(Expr::Integer(n))
            }
            Token::Float(n) => {
                self.advance()?;
                Ok(Expr::Float(n))
            }
            Token::String(s) => {
                self.advance()?;
                Ok(Expr::String(s))
            }
            Token::Boolean(b) => {
                self.advance()?;
                Ok(Expr::Boolean(b))
            }
            Token::Identifier(name) => {
                self.advance()?;
                if self.check(&Token::LParen) {
                    let args = self.parse_call_args()?;
                    Ok(Expr::Call {
                        function: name,
                        args,
                    })
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Token::LParen => {
                self.advance()?;
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            token => {
                self.current_token = token;
                Err(self.unexpected("expression"))
            }
        }
    }
}
