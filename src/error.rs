//! Error types
//!
//! `ParseError` and `QueryError` are kept apart so a caller scanning many
//! jobs can tell a broken configuration from a broken query.

use std::path::PathBuf;
use thiserror::Error;

/// The input is not a usable XML document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    pub message: String,
    /// Byte offset into the input
    pub position: usize,
    /// 1-based line
    pub line: usize,
    /// 1-based column, in characters
    pub column: usize,
}

impl ParseError {
    /// Build an error for `position` in `input`, deriving line and column
    pub fn new(message: impl Into<String>, input: &str, position: usize) -> Self {
        let bytes = input.as_bytes();
        let position = position.min(bytes.len());
        let before = &bytes[..position];
        let line_start = memchr::memrchr(b'\n', before).map_or(0, |nl| nl + 1);
        let line = memchr::memchr_iter(b'\n', before).count() + 1;
        // Count characters, not bytes: skip UTF-8 continuation bytes
        let column = before[line_start..].iter().filter(|&&b| b & 0xC0 != 0x80).count() + 1;

        ParseError {
            message: message.into(),
            position,
            line,
            column,
        }
    }
}

/// The query could not be compiled or evaluated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("invalid query at offset {position}: {message}")]
    Syntax { message: String, position: usize },

    #[error("unknown function {0}()")]
    UnknownFunction(String),

    #[error("function {name}() expects {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: &'static str,
        found: usize,
    },

    #[error("undefined variable ${0}")]
    UndefinedVariable(String),

    #[error("undefined namespace prefix '{0}'")]
    UndefinedPrefix(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("{0} is not supported")]
    Unsupported(String),
}

impl QueryError {
    pub(crate) fn syntax(message: impl Into<String>, position: usize) -> Self {
        QueryError::Syntax {
            message: message.into(),
            position,
        }
    }
}

/// Failure of one engine evaluation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("query error: {0}")]
    Query(#[from] QueryError),
}

/// Failure of one job inside a config scan
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}
