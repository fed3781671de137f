//! Runner and pipeline errors.

use thiserror::Error;

/// Failures of the runner itself, as opposed to failures of a unit of work.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The async runtime backing a synchronous invocation could not be built.
    #[error("Failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// The barrier lost track of a unit.
    #[error("Unit {index} never reported an outcome")]
    MissingOutcome { index: usize },

    /// A synchronous invocation was started on a thread that already drives
    /// an async runtime.
    #[error("Cannot block on an invocation from inside an async runtime")]
    NestedRuntime,
}

/// Errors returned by a [`Pipeline`](crate::Pipeline) host when writing output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The host asked the invocation to stop producing output.
    #[error("Pipeline stopped")]
    Stopped,

    /// The downstream consumer went away.
    #[error("Pipeline closed")]
    Closed,

    /// Writing to the host failed.
    #[error("Pipeline write failed: {0}")]
    Write(String),
}

impl PipelineError {
    /// Returns true for host lifecycle signals that end an invocation silently.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Stopped | Self::Closed)
    }
}
