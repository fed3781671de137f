//! Status enums for invocations.

use serde::{Deserialize, Serialize};

/// Final status of one runner invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvocationStatus {
    /// Every unit finished and the barrier completed.
    #[default]
    Completed,
    /// The invocation was stopped before the barrier completed.
    Cancelled,
}

impl InvocationStatus {
    /// Returns true if the invocation was stopped early.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
