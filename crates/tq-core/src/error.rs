//! Error types for query compilation and evaluation.

use thiserror::Error;

/// A runtime evaluation failure.
///
/// This is the engine's structured error condition: it unwinds to the
/// nearest enclosing `try` in the query, which either converts it into the
/// empty stream or hands the original input to its `catch` branch. Only if
/// no `try` encloses the failing expression does it surface to the caller
/// (wrapped in [`Error::Eval`]).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        EvalError {
            message: message.into(),
        }
    }
}

/// Errors that can occur while compiling or running a query.
#[derive(Error, Debug)]
pub enum Error {
    /// The query text contained an invalid token.
    /// Fatal for the query; cannot be caught by `try`.
    #[error("Lexer error at position {position}: {message}")]
    Lex { position: usize, message: String },

    /// The token stream did not form a valid expression.
    /// Fatal for the query; cannot be caught by `try`.
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// An uncaught runtime failure.
    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// The input document was not valid TOON.
    /// Includes the 1-based line number where the error was detected.
    #[error("TOON parse error at line {line}: {message}")]
    Toon { line: usize, message: String },
}

/// Convenience alias used throughout tq-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Alias for evaluator-internal results, which fail with the catchable
/// [`EvalError`] rather than the top-level [`Error`].
pub type EvalResult<T> = std::result::Result<T, EvalError>;
