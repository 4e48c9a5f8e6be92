//! Error types for the orchestration core.
//!
//! Local problems (an unknown tool, an out-of-range weight) are absorbed by the
//! loop and only logged. Failures of an external collaborator abort the
//! current turn and reach the caller as a [`TurnFailure`] together with the
//! partial message log.

use thiserror::Error;

use crate::backend::ChatMessage;

/// Errors from the strict scheduling API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("event not found: {0}")]
    EventNotFound(String),
    #[error("event already exists: {0}")]
    DuplicateEvent(String),
    #[error("unknown resource: {0}")]
    UnknownResource(String),
    #[error("event {0} ends before it starts")]
    EmptyInterval(String),
}

/// Non-fatal problems with a single tool call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("missing argument `{argument}` for {tool}")]
    MissingArgument { tool: String, argument: String },
    #[error("invalid weight value for {tool}: {value}")]
    InvalidWeightValue { tool: String, value: String },
}

/// Failure reported by a collaborator implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Failures that abort a turn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    #[error("chat backend failed: {0}")]
    ChatFailed(String),
    #[error("solve failed: {0}")]
    SolveFailed(String),
}

/// A failed turn, carrying whatever message log had been built.
#[derive(Debug, Clone, Error)]
#[error("turn {turn_id} failed: {error}")]
pub struct TurnFailure {
    pub turn_id: String,
    #[source]
    pub error: TurnError,
    pub messages: Vec<ChatMessage>,
}
