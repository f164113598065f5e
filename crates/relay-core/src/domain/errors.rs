//! Errors - エラー型と分類
//!
//! Routing failures (unknown lambda, consumed callback, unknown bridge) are
//! not errors: they are dropped where they are detected. The types here cover
//! only what a caller can act on.

use thiserror::Error;

use super::ids::LambdaId;

/// Failure to serialize a value for the boundary.
#[derive(Debug, Error)]
#[error("payload encode failed: {0}")]
pub struct CodecError(#[from] serde_json::Error);

/// Failures reported by a host engine when asked to launch a program.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no remote task registered for entry {0:?}")]
    UnknownEntry(String),

    #[error("malformed program text: {0}")]
    MalformedProgram(String),

    #[error("lambda {0} is already running")]
    LambdaInUse(LambdaId),

    #[error("engine is not running inside a tokio runtime")]
    NoRuntime,

    #[error("{0}")]
    Other(String),
}

/// Caller-facing error of the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Encode(#[from] CodecError),

    #[error("engine refused the task: {0}")]
    Engine(#[from] EngineError),

    #[error("lambda {0} is already registered")]
    DuplicateLambda(LambdaId),

    #[error("engine launched {assigned} instead of the reserved {reserved}")]
    LambdaIdMismatch {
        reserved: LambdaId,
        assigned: LambdaId,
    },

    #[error("config: {0}")]
    Config(String),
}
