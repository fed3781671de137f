//! fanrun core
//!
//! Runs a single-item processing function over zero, one or many inputs:
//! - one concurrent unit of work per input (one unit with no input if there
//!   are none),
//! - a single barrier waiting for every unit,
//! - successes delivered to the host first, then failures as error records
//!   when error reporting is enabled.
//!
//! Failures never escape an invocation as `Err`: they become error records
//! or, for host lifecycle signals and cancellation, end the invocation
//! silently.

pub mod blocking;
pub mod config;
pub mod error;
pub mod ids;
pub mod inputs;
pub mod outcome;
pub mod pipeline;
pub mod record;
pub mod runner;
pub mod status;

// Re-export commonly used types
pub use blocking::invoke_sync;
pub use config::RunConfig;
pub use error::{PipelineError, RunnerError};
pub use ids::InvocationId;
pub use inputs::Inputs;
pub use outcome::{RunReport, UnitOutcome};
pub use pipeline::{emit, CollectingPipeline, DeliverySummary, Pipeline};
pub use record::{category_of, Categorized, ErrorRecord, ErrorSource, PANIC_CATEGORY};
pub use runner::TaskRunner;
pub use status::InvocationStatus;
pub use tokio_util::sync::CancellationToken;
