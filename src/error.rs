
use thiserror::Error;

use crate::sse::Rule;

#[derive(Error, Debug)]
pub enum LeapjoinError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Parse error: {message}")]
    Parse { message: String, line: Option<usize>, col: Option<usize> },
    #[error("Unsupported operator: {operator}")]
    Unsupported { operator: String },
    #[error("Scan error: {0}")]
    Scan(String),
    #[error("Unknown term: {0}")]
    UnknownTerm(String),
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, LeapjoinError>;

// Helper conversions
impl From<config::ConfigError> for LeapjoinError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}

impl From<pest::error::Error<Rule>> for LeapjoinError {
    fn from(e: pest::error::Error<Rule>) -> Self {
        let (line, col) = match e.line_col {
            pest::error::LineColLocation::Pos((l, c)) => (l, c),
            pest::error::LineColLocation::Span((l, c), _) => (l, c),
        };
        Self::Parse { message: e.variant.message().to_string(), line: Some(line), col: Some(col) }
    }
}

impl From<regex::Error> for LeapjoinError {
    fn from(e: regex::Error) -> Self { Self::Parse { message: e.to_string(), line: None, col: None } }
}

impl<T> From<std::sync::PoisonError<T>> for LeapjoinError {
    fn from(e: std::sync::PoisonError<T>) -> Self { Self::Lock(e.to_string()) }
}
