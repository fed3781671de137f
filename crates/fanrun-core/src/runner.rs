//! Fan-out/fan-in task runner.
//!
//! The runner schedules one unit of work per input item, waits for every
//! unit at a single barrier and partitions the outcomes into results and
//! error records. Units never share state: each returns its own outcome and
//! the barrier loop is the only place records are collected.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;

use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::{PipelineError, RunnerError};
use crate::ids::InvocationId;
use crate::inputs::Inputs;
use crate::outcome::{RunReport, UnitOutcome};
use crate::pipeline::{DeliverySummary, Pipeline};
use crate::record::ErrorRecord;
use crate::status::InvocationStatus;

type Joined<O, E> = Result<(task::Id, (usize, Result<O, E>)), JoinError>;

/// Runs a processing function over a set of inputs, one concurrent unit per
/// input.
///
/// The runner only holds its configuration, so one instance can serve any
/// number of invocations.
#[derive(Debug, Clone, Default)]
pub struct TaskRunner {
    config: RunConfig,
}

impl TaskRunner {
    /// Create a runner with the given configuration.
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Run `work` once per input as async tasks and wait for all of them.
    ///
    /// If there are no inputs, `work` runs once with `None`. If `cancel`
    /// fires before every unit has finished, the returned report is
    /// cancelled and empty; units still running are detached.
    ///
    /// `work` is called inside the spawned unit, so a panic while building
    /// the future is recorded against that unit like any other panic.
    pub async fn run<I, O, E, F, Fut>(
        &self,
        inputs: Inputs<I>,
        work: F,
        cancel: &CancellationToken,
    ) -> RunReport<I, O>
    where
        I: Clone + Send + 'static,
        O: Send + 'static,
        E: StdError + Send + Sync + 'static,
        F: Fn(Option<I>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
    {
        let invocation_id = InvocationId::generate();
        let source = inputs.kind();
        let items = inputs.into_work_items();
        let work = Arc::new(work);

        let mut set = JoinSet::new();
        let mut units = HashMap::with_capacity(items.len());
        for (index, item) in items.iter().cloned().enumerate() {
            let work = Arc::clone(&work);
            let handle = set.spawn(async move { (index, work(item).await) });
            units.insert(handle.id(), index);
        }

        info!(
            invocation_id = %invocation_id,
            inputs = source,
            units = items.len(),
            "Dispatched units"
        );

        barrier(invocation_id, items, set, units, cancel).await
    }

    /// Run a blocking `work` once per input on the blocking thread pool and
    /// wait for all of them.
    ///
    /// Same contract as [`TaskRunner::run`].
    pub async fn run_blocking<I, O, E, F>(
        &self,
        inputs: Inputs<I>,
        work: F,
        cancel: &CancellationToken,
    ) -> RunReport<I, O>
    where
        I: Clone + Send + 'static,
        O: Send + 'static,
        E: StdError + Send + Sync + 'static,
        F: Fn(Option<I>) -> Result<O, E> + Send + Sync + 'static,
    {
        let invocation_id = InvocationId::generate();
        let source = inputs.kind();
        let items = inputs.into_work_items();
        let work = Arc::new(work);

        let mut set = JoinSet::new();
        let mut units = HashMap::with_capacity(items.len());
        for (index, item) in items.iter().cloned().enumerate() {
            let work = Arc::clone(&work);
            let handle = set.spawn_blocking(move || (index, work(item)));
            units.insert(handle.id(), index);
        }

        info!(
            invocation_id = %invocation_id,
            inputs = source,
            units = items.len(),
            "Dispatched blocking units"
        );

        barrier(invocation_id, items, set, units, cancel).await
    }

    /// Run async `work` and deliver the report to `pipeline`.
    ///
    /// Results go through `deliver` in submission order; errors follow only
    /// when this runner writes errors. Failures never escape as `Err`.
    pub async fn invoke<I, O, E, F, Fut, P, D>(
        &self,
        inputs: Inputs<I>,
        work: F,
        pipeline: &mut P,
        deliver: D,
        cancel: &CancellationToken,
    ) -> DeliverySummary
    where
        I: Clone + Send + 'static,
        O: Send + 'static,
        E: StdError + Send + Sync + 'static,
        F: Fn(Option<I>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
        P: Pipeline<Input = I>,
        D: FnMut(O, &mut P) -> Result<(), PipelineError>,
    {
        let report = self.run(inputs, work, cancel).await;
        report.deliver(self.config.write_errors, pipeline, deliver)
    }

    /// Run blocking `work` and deliver the report to `pipeline`.
    pub async fn invoke_blocking<I, O, E, F, P, D>(
        &self,
        inputs: Inputs<I>,
        work: F,
        pipeline: &mut P,
        deliver: D,
        cancel: &CancellationToken,
    ) -> DeliverySummary
    where
        I: Clone + Send + 'static,
        O: Send + 'static,
        E: StdError + Send + Sync + 'static,
        F: Fn(Option<I>) -> Result<O, E> + Send + Sync + 'static,
        P: Pipeline<Input = I>,
        D: FnMut(O, &mut P) -> Result<(), PipelineError>,
    {
        let report = self.run_blocking(inputs, work, cancel).await;
        report.deliver(self.config.write_errors, pipeline, deliver)
    }
}

/// Wait for every unit in `set`, or for `cancel`.
async fn barrier<I, O, E>(
    invocation_id: InvocationId,
    items: Vec<Option<I>>,
    mut set: JoinSet<(usize, Result<O, E>)>,
    units: HashMap<task::Id, usize>,
    cancel: &CancellationToken,
) -> RunReport<I, O>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
    E: StdError + Send + Sync + 'static,
{
    let mut results: Vec<Option<O>> = items.iter().map(|_| None).collect();
    let mut seen = vec![false; items.len()];
    let mut errors = Vec::new();
    let mut cancelled_units = 0usize;

    loop {
        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(
                    invocation_id = %invocation_id,
                    pending = set.len(),
                    "Invocation cancelled before barrier"
                );
                set.detach_all();
                return RunReport::cancelled(invocation_id);
            }
            joined = set.join_next_with_id() => joined,
        };

        let Some(joined) = joined else {
            break;
        };

        let Some((index, outcome)) = classify(&invocation_id, &items, &units, joined) else {
            continue;
        };
        seen[index] = true;

        match outcome {
            UnitOutcome::Completed(value) => {
                debug!(invocation_id = %invocation_id, unit = index, "Unit completed");
                results[index] = Some(value);
            }
            UnitOutcome::Failed(record) => {
                warn!(
                    invocation_id = %invocation_id,
                    unit = index,
                    category = %record.category,
                    error = %record.message,
                    "Unit failed"
                );
                errors.push(record);
            }
            UnitOutcome::Cancelled => {
                debug!(invocation_id = %invocation_id, unit = index, "Unit cancelled");
                cancelled_units += 1;
            }
        }
    }

    if cancelled_units > 0 {
        info!(
            invocation_id = %invocation_id,
            cancelled_units,
            "Units cancelled by runtime, dropping invocation output"
        );
        return RunReport::cancelled(invocation_id);
    }

    for (index, _) in seen.iter().enumerate().filter(|(_, seen)| !**seen) {
        errors.push(ErrorRecord::invocation(
            invocation_id.clone(),
            RunnerError::MissingOutcome { index },
        ));
    }

    let results: Vec<O> = results.into_iter().flatten().collect();

    info!(
        invocation_id = %invocation_id,
        results = results.len(),
        errors = errors.len(),
        "Barrier completed"
    );

    RunReport {
        invocation_id,
        status: InvocationStatus::Completed,
        results,
        errors,
    }
}

/// Turn a joined task into the outcome of the unit it ran.
///
/// Returns `None` if the task cannot be matched to a unit.
fn classify<I, O, E>(
    invocation_id: &InvocationId,
    items: &[Option<I>],
    units: &HashMap<task::Id, usize>,
    joined: Joined<O, E>,
) -> Option<(usize, UnitOutcome<I, O>)>
where
    I: Clone,
    E: StdError + Send + Sync + 'static,
{
    let input_at = |index: usize| items.get(index).cloned().flatten();

    match joined {
        Ok((_, (index, Ok(value)))) => Some((index, UnitOutcome::Completed(value))),
        Ok((_, (index, Err(cause)))) => {
            let record = ErrorRecord::unit(invocation_id.clone(), index, input_at(index), cause);
            Some((index, UnitOutcome::Failed(record)))
        }
        Err(join_error) => {
            let Some(&index) = units.get(&join_error.id()) else {
                warn!(
                    invocation_id = %invocation_id,
                    error = %join_error,
                    "Joined a task that belongs to no unit"
                );
                return None;
            };

            if join_error.is_panic() {
                let payload = join_error.into_panic();
                let record = ErrorRecord::panic(
                    invocation_id.clone(),
                    index,
                    input_at(index),
                    payload.as_ref(),
                );
                Some((index, UnitOutcome::Failed(record)))
            } else {
                Some((index, UnitOutcome::Cancelled))
            }
        }
    }
}
