use std::fmt;

pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error taxonomy. Every failure is a deterministic function of the
/// input and is reported synchronously with a specific reason; nothing is
/// retried or silently corrected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Recoverable input problem: schedule conflict, score/result
    /// incoherence, invalid rule configuration.
    Validation(String),
    /// Operation rejected in the current state: regenerating an existing
    /// bracket round, advancing before a round is complete.
    State(String),
    /// A referenced team, venue, referee, group or fixture does not exist.
    NotFound(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "Validation error: {msg}"),
            EngineError::State(msg) => write!(f, "State error: {msg}"),
            EngineError::NotFound(msg) => write!(f, "Not found: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
