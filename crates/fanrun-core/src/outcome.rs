//! Per-unit outcomes and the report of a whole run.

use crate::ids::InvocationId;
use crate::record::ErrorRecord;
use crate::status::InvocationStatus;

/// Outcome of a single unit of work.
#[derive(Debug)]
pub enum UnitOutcome<I, O> {
    /// The unit produced a value.
    Completed(O),
    /// The unit failed; the record carries the cause.
    Failed(ErrorRecord<I>),
    /// The unit was cancelled by the runtime before it finished.
    Cancelled,
}

/// Everything one invocation produced.
///
/// Results are in submission order. Errors are in the order the barrier
/// observed the failing units finish.
#[derive(Debug)]
pub struct RunReport<I, O> {
    /// Invocation this report belongs to.
    pub invocation_id: InvocationId,
    /// Whether the barrier completed.
    pub status: InvocationStatus,
    /// Values of successful units.
    pub results: Vec<O>,
    /// Failures of units, and of the invocation itself.
    pub errors: Vec<ErrorRecord<I>>,
}

impl<I, O> RunReport<I, O> {
    /// A report for an invocation that was stopped before the barrier.
    pub fn cancelled(invocation_id: InvocationId) -> Self {
        Self {
            invocation_id,
            status: InvocationStatus::Cancelled,
            results: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Returns true if the invocation was stopped before the barrier.
    pub fn is_cancelled(&self) -> bool {
        self.status.is_cancelled()
    }

    /// Total number of outcomes (results plus errors).
    pub fn outcome_count(&self) -> usize {
        self.results.len() + self.errors.len()
    }
}
