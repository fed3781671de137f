//! Synchronous entry point for hosts without an async runtime.

use std::error::Error as StdError;

use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::config::RunConfig;
use crate::error::{PipelineError, RunnerError};
use crate::ids::InvocationId;
use crate::inputs::Inputs;
use crate::outcome::RunReport;
use crate::pipeline::{DeliverySummary, Pipeline};
use crate::runner::TaskRunner;

/// Run blocking `work` over `inputs` and deliver the report, blocking the
/// calling thread until done.
///
/// A private multi-thread runtime is started for the call. Failing to start
/// it is reported to `pipeline` as a single invocation-level record (subject
/// to `config.write_errors`) rather than returned. Calling it from a thread
/// that already runs an async runtime is reported the same way, as
/// [`RunnerError::NestedRuntime`]; use [`TaskRunner::invoke_blocking`] there.
pub fn invoke_sync<I, O, E, F, P, D>(
    config: &RunConfig,
    inputs: Inputs<I>,
    work: F,
    pipeline: &mut P,
    deliver: D,
) -> DeliverySummary
where
    I: Clone + Send + 'static,
    O: Send + 'static,
    E: StdError + Send + Sync + 'static,
    F: Fn(Option<I>) -> Result<O, E> + Send + Sync + 'static,
    P: Pipeline<Input = I>,
    D: FnMut(O, &mut P) -> Result<(), PipelineError>,
{
    if tokio::runtime::Handle::try_current().is_ok() {
        error!("Synchronous invocation started inside an async runtime");
        let report = RunReport::<I, O>::runner_failure(
            InvocationId::generate(),
            RunnerError::NestedRuntime,
        );
        return report.deliver(config.write_errors, pipeline, deliver);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start runtime for invocation");
            let report = RunReport::<I, O>::runner_failure(
                InvocationId::generate(),
                RunnerError::Runtime(e),
            );
            return report.deliver(config.write_errors, pipeline, deliver);
        }
    };

    let runner = TaskRunner::new(config.clone());
    let cancel = CancellationToken::new();
    let summary = runtime.block_on(runner.invoke_blocking(inputs, work, pipeline, deliver, &cancel));

    // Units detached by cancellation must not hold the caller.
    runtime.shutdown_background();

    summary
}
