//! Invocation identifiers.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Identifies one runner invocation.
///
/// Every record produced by a run carries the id of that run, so errors from
/// concurrent invocations can be told apart in logs and output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct InvocationId(String);

impl InvocationId {
    /// Use a caller-chosen id, e.g. one assigned by the host.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random (UUID v4) id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
