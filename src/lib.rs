pub mod ast;
pub mod catalogue;
pub mod convert;
pub mod evaluator;
pub mod judge;
pub mod lexer;
pub mod parser;
pub mod policy;
pub mod result;
pub mod sandbox;
pub mod schema;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{BinOp, Expr, Operation, OperationChain, Token};
pub use catalogue::{Catalogue, CatalogueError, Riddle, RiddleRepository};
pub use evaluator::{Evaluator, RuntimeError};
pub use judge::{Judge, JudgeError, Verdict, VerdictKind};
pub use lexer::{LexError, Lexer, Position};
pub use parser::{ParseError, Parser, parse};
pub use policy::{Policy, PolicyError};
pub use result::{ConversionError, Number, ResultValue};
pub use sandbox::{CancelToken, Engine, ExecutionOutcome, Sandbox, SandboxConfig};
pub use schema::{ElementType, FieldDef, FieldKind, RecordSchema, SchemaError};
pub use value::{Key, Record, Value};
