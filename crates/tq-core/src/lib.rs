//! # tq-core
//!
//! A jq-style query engine for **TOON (Token-Oriented Object Notation)**
//! documents. Queries are written in a small functional language with
//! pipelines, path navigation, arithmetic, conditionals, and a large
//! library of named operators; evaluating one produces a stream of result
//! values.
//!
//! ## Quick start
//!
//! ```rust
//! use tq_core::query;
//!
//! let doc = "users[2]{email}:\n  a@x\n  b@y";
//! let results = query(".users[].email", doc).unwrap();
//! assert_eq!(results, vec!["a@x", "b@y"]);
//! ```
//!
//! ## Modules
//!
//! - [`lexer`] — query text → token stream
//! - [`parser`] — token stream → expression AST (precedence climbing)
//! - [`eval`] — AST + input value → stream of output values
//! - [`toon`] — TOON reader/writer for the document side
//! - [`value`] — the shared value model with its total order
//! - [`json`] — `serde_json` interop for host bindings
//! - [`error`] — error types (`Error` for the surface, `EvalError` for
//!   `try`-catchable runtime failures)

pub mod ast;
pub mod error;
pub mod eval;
pub mod json;
pub mod lexer;
pub mod parser;
pub mod toon;
pub mod value;

pub use ast::{Expr, Query};
pub use error::{Error, EvalError, Result};
pub use eval::Evaluator;
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;
pub use value::Value;

/// Run a query over a TOON document, returning each result serialized as
/// TOON.
pub fn query(expression: &str, document: &str) -> Result<Vec<String>> {
    let data = toon::decode(document)?;
    let results = query_values(expression, &data)?;
    Ok(results.iter().map(Value::to_toon).collect())
}

/// Run a query over an already-parsed value, returning the raw result
/// values. This is the entry point host bindings use to skip both codecs.
pub fn query_values(expression: &str, document: &Value) -> Result<Vec<Value>> {
    let parsed = Parser::parse_query(expression)?;
    let mut evaluator = Evaluator::new();
    Ok(evaluator.eval(&parsed.root, document)?)
}
