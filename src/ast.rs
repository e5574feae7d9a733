//! # Streamy Pipeline Language - Abstract Syntax Tree
//!
//! This module defines the Abstract Syntax Tree (AST) for Streamy scripts: a
//! declarative chain of collection stages applied to one fixed dataset.
//!
//! ## Architecture Overview
//!
//! The AST module is organized into focused submodules:
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes, lambdas and selectors
//! - **[operators]** - Binary and unary operators
//! - **[operations]** - Pipeline stages, comparators and aggregators
//! - **[chain]** - The complete ordered chain of stages
//!
//! ## Quick Start
//!
//! ```text
//! .filter(a -> a.predator)
//! .sorted(by weight descending)
//! .toList()
//! ```
//!
//! This script keeps the predators and orders them heaviest first.
//!
//! ## Core Concepts
//!
//! ### Chain Structure
//!
//! Every script is a chain of stage calls, each introduced by a dot:
//!
//! ```text
//! .stage(args) .stage(args) ...
//! ```
//!
//! ### Stages
//!
//! - **Filter / Map / FlatMap** - per-element predicates and transforms
//! - **Sort / Distinct / Limit / Skip** - reshape the sequence
//! - **Max / Min / Sum / Collect** - reduce the sequence to one value
//! - **GroupBy** - partition into a map; later stages run per group
//!
//! ### Closed Vocabulary
//!
//! Expressions can only read fields of the current element and call the fixed
//! method and function library. There is no construct for creating objects,
//! touching the environment, or starting concurrent work.
//!
//! ## Examples
//!
//! ### Heaviest Animal Per Species
//!
//! ```text
//! .groupBy(species).max(by weight)
//! ```
//!
//! ### Total Weight
//!
//! ```text
//! .sum(weight)
//! ```
//!
//! ### Tie-broken Ordering
//!
//! ```text
//! .sorted(by predator descending then by name)
//! ```
pub mod chain;
pub mod expressions;
pub mod operations;
pub mod operators;
pub mod tokens;

pub use chain::OperationChain;
pub use expressions::{Expr, Lambda, Selector};
pub use operations::{Aggregator, Comparator, Direction, Operation, SortKey};
pub use operators::{BinOp, UnaryOp};
pub use tokens::Token;
