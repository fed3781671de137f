//! Delivery of a run report to a pipeline host.
//!
//! After the barrier, results are handed to a deliver callback in order.
//! Errors follow only once every result has been delivered, and only when
//! error reporting is enabled for the invocation.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, RunnerError};
use crate::ids::InvocationId;
use crate::outcome::RunReport;
use crate::record::ErrorRecord;

/// A host that consumes the output of an invocation.
pub trait Pipeline {
    /// Objects written to the host's output stream.
    type Object;
    /// Input item type referenced by error records.
    type Input;

    /// Write one output object.
    fn write_object(&mut self, object: Self::Object) -> Result<(), PipelineError>;

    /// Write one error notification.
    fn write_error(&mut self, record: ErrorRecord<Self::Input>) -> Result<(), PipelineError>;
}

/// Default deliverer: writes each result to the pipeline unchanged.
pub fn emit<P: Pipeline>(object: P::Object, pipeline: &mut P) -> Result<(), PipelineError> {
    pipeline.write_object(object)
}

/// Counts of what a delivery did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliverySummary {
    /// Results handed to the deliver callback successfully.
    pub delivered: usize,
    /// Error records written to the pipeline.
    pub errors_reported: usize,
    /// Error records dropped (reporting disabled, or delivery cut short).
    pub errors_discarded: usize,
    /// The host or the caller stopped the invocation.
    pub stopped: bool,
}

impl<I, O> RunReport<I, O> {
    /// A completed report carrying a single runner failure.
    pub fn runner_failure(invocation_id: InvocationId, error: RunnerError) -> Self {
        let record = ErrorRecord::invocation(invocation_id.clone(), error);
        Self {
            invocation_id,
            status: Default::default(),
            results: Vec::new(),
            errors: vec![record],
        }
    }

    /// Deliver this report to `pipeline`.
    ///
    /// Each result goes through `deliver` in order. If `write_errors` is set,
    /// every error record is then written with [`Pipeline::write_error`];
    /// otherwise records are discarded. A lifecycle signal from the host ends
    /// delivery silently. Any other host failure stops delivery and is
    /// reported as one invocation-level record in place of the unit errors.
    pub fn deliver<P, D>(self, write_errors: bool, pipeline: &mut P, mut deliver: D) -> DeliverySummary
    where
        P: Pipeline<Input = I>,
        D: FnMut(O, &mut P) -> Result<(), PipelineError>,
    {
        let mut summary = DeliverySummary::default();

        if self.is_cancelled() {
            debug!(invocation_id = %self.invocation_id, "Skipping delivery of cancelled invocation");
            summary.stopped = true;
            return summary;
        }

        let RunReport {
            invocation_id,
            results,
            errors,
            ..
        } = self;

        for result in results {
            match deliver(result, pipeline) {
                Ok(()) => summary.delivered += 1,
                Err(signal) if signal.is_lifecycle() => {
                    debug!(invocation_id = %invocation_id, signal = %signal, "Pipeline stopped during delivery");
                    summary.stopped = true;
                    summary.errors_discarded += errors.len();
                    return summary;
                }
                Err(error) => {
                    warn!(invocation_id = %invocation_id, error = %error, "Failed to deliver result");
                    summary.errors_discarded += errors.len();
                    let failure = ErrorRecord::invocation(invocation_id.clone(), error);
                    report_errors(write_errors, pipeline, vec![failure], &mut summary);
                    return summary;
                }
            }
        }

        report_errors(write_errors, pipeline, errors, &mut summary);

        info!(
            invocation_id = %invocation_id,
            delivered = summary.delivered,
            errors_reported = summary.errors_reported,
            errors_discarded = summary.errors_discarded,
            "Delivery completed"
        );

        summary
    }
}

fn report_errors<P: Pipeline>(
    write_errors: bool,
    pipeline: &mut P,
    errors: Vec<ErrorRecord<P::Input>>,
    summary: &mut DeliverySummary,
) {
    if !write_errors {
        summary.errors_discarded += errors.len();
        return;
    }

    let mut remaining = errors.len();
    for record in errors {
        remaining -= 1;
        match pipeline.write_error(record) {
            Ok(()) => summary.errors_reported += 1,
            Err(signal) => {
                if signal.is_lifecycle() {
                    summary.stopped = true;
                } else {
                    warn!(error = %signal, "Failed to write error record");
                    summary.errors_discarded += 1;
                }
                summary.errors_discarded += remaining;
                return;
            }
        }
    }
}

/// In-memory pipeline host that keeps everything written to it.
#[derive(Debug)]
pub struct CollectingPipeline<T, I> {
    /// Objects written so far.
    pub objects: Vec<T>,
    /// Error records written so far.
    pub errors: Vec<ErrorRecord<I>>,
    stop_after: Option<usize>,
    fail_objects: Option<PipelineError>,
}

impl<T, I> Default for CollectingPipeline<T, I> {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            errors: Vec::new(),
            stop_after: None,
            fail_objects: None,
        }
    }
}

impl<T, I> CollectingPipeline<T, I> {
    /// Create an empty pipeline that accepts every write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal [`PipelineError::Stopped`] once `count` objects have been written.
    pub fn stop_after(mut self, count: usize) -> Self {
        self.stop_after = Some(count);
        self
    }

    /// Fail every object write with `error`.
    pub fn fail_objects_with(mut self, error: PipelineError) -> Self {
        self.fail_objects = Some(error);
        self
    }
}

impl<T, I> Pipeline for CollectingPipeline<T, I> {
    type Object = T;
    type Input = I;

    fn write_object(&mut self, object: T) -> Result<(), PipelineError> {
        if let Some(error) = &self.fail_objects {
            return Err(error.clone());
        }
        if self.stop_after.is_some_and(|limit| self.objects.len() >= limit) {
            return Err(PipelineError::Stopped);
        }
        self.objects.push(object);
        Ok(())
    }

    fn write_error(&mut self, record: ErrorRecord<I>) -> Result<(), PipelineError> {
        self.errors.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::inputs::Inputs;
    use crate::record::ErrorSource;
    use crate::runner::TaskRunner;
    use tokio_util::sync::CancellationToken;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    fn report_with(results: Vec<&'static str>, failures: &[&'static str]) -> RunReport<&'static str, &'static str> {
        let invocation_id = InvocationId::generate();
        let errors = failures
            .iter()
            .enumerate()
            .map(|(i, input)| ErrorRecord::unit(invocation_id.clone(), i, Some(*input), Boom))
            .collect();
        RunReport {
            invocation_id,
            status: Default::default(),
            results,
            errors,
        }
    }

    #[test]
    fn test_results_then_errors() {
        let report = report_with(vec!["a", "b"], &["c"]);
        let mut pipeline = CollectingPipeline::<&str, &str>::new();

        let summary = report.deliver(true, &mut pipeline, emit);

        assert_eq!(pipeline.objects, vec!["a", "b"]);
        assert_eq!(pipeline.errors.len(), 1);
        assert_eq!(pipeline.errors[0].category, "Boom");
        assert_eq!(
            summary,
            DeliverySummary {
                delivered: 2,
                errors_reported: 1,
                errors_discarded: 0,
                stopped: false,
            }
        );
    }

    #[test]
    fn test_errors_discarded_when_disabled() {
        let report = report_with(vec!["a"], &["b", "c"]);
        let mut pipeline = CollectingPipeline::<&str, &str>::new();

        let summary = report.deliver(false, &mut pipeline, emit);

        assert_eq!(pipeline.objects, vec!["a"]);
        assert!(pipeline.errors.is_empty());
        assert_eq!(summary.errors_discarded, 2);
        assert_eq!(summary.errors_reported, 0);
    }

    #[test]
    fn test_deliver_can_expand_results() {
        let report: RunReport<&str, Vec<u8>> = RunReport {
            invocation_id: InvocationId::generate(),
            status: Default::default(),
            results: vec![vec![1, 2], vec![], vec![3]],
            errors: Vec::new(),
        };
        let mut pipeline = CollectingPipeline::<String, &str>::new();

        let summary = report.deliver(true, &mut pipeline, |values, pipeline| {
            for value in values {
                pipeline.write_object(format!("#{value}"))?;
            }
            Ok(())
        });

        assert_eq!(pipeline.objects, vec!["#1", "#2", "#3"]);
        assert_eq!(summary.delivered, 3);
    }

    #[test]
    fn test_stop_signal_ends_delivery_silently() {
        let report = report_with(vec!["a", "b", "c"], &["d"]);
        let mut pipeline = CollectingPipeline::<&str, &str>::new().stop_after(1);

        let summary = report.deliver(true, &mut pipeline, emit);

        assert_eq!(pipeline.objects, vec!["a"]);
        assert!(pipeline.errors.is_empty());
        assert!(summary.stopped);
        assert_eq!(summary.errors_discarded, 1);
    }

    #[test]
    fn test_host_write_failure_becomes_single_record() {
        let report = report_with(vec!["a", "b"], &["c", "d"]);
        let mut pipeline =
            CollectingPipeline::<&str, &str>::new().fail_objects_with(PipelineError::Write("disk full".into()));

        let summary = report.deliver(true, &mut pipeline, emit);

        assert!(pipeline.objects.is_empty());
        assert_eq!(pipeline.errors.len(), 1);
        assert_eq!(pipeline.errors[0].category, "PipelineError");
        assert!(matches!(pipeline.errors[0].source, ErrorSource::Invocation));
        assert_eq!(summary.errors_discarded, 2);
        assert_eq!(summary.errors_reported, 1);
    }

    #[test]
    fn test_cancelled_report_delivers_nothing() {
        let report = RunReport::<&str, &str>::cancelled(InvocationId::generate());
        let mut pipeline = CollectingPipeline::<&str, &str>::new();

        let summary = report.deliver(true, &mut pipeline, emit);

        assert!(pipeline.objects.is_empty());
        assert!(pipeline.errors.is_empty());
        assert!(summary.stopped);
    }

    #[test]
    fn test_runner_failure_report() {
        let report = RunReport::<&str, &str>::runner_failure(
            InvocationId::new("inv-9"),
            RunnerError::MissingOutcome { index: 0 },
        );
        let mut pipeline = CollectingPipeline::<&str, &str>::new();

        report.deliver(true, &mut pipeline, emit);

        assert_eq!(pipeline.errors.len(), 1);
        assert_eq!(pipeline.errors[0].category, "RunnerError");
        assert_eq!(pipeline.errors[0].invocation_id.as_str(), "inv-9");
    }

    #[tokio::test]
    async fn test_invoke_reports_failures_when_enabled() {
        let runner = TaskRunner::new(RunConfig::default());
        let cancel = CancellationToken::new();
        let mut pipeline = CollectingPipeline::<String, String>::new();

        let work = |item: Option<String>| async move {
            match item.as_deref() {
                Some("fail") => Err(Boom),
                _ => Ok(item.unwrap_or_default()),
            }
        };

        let summary = runner
            .invoke(
                Inputs::Named(vec!["ok".to_string(), "fail".to_string()]),
                work,
                &mut pipeline,
                emit,
                &cancel,
            )
            .await;

        assert_eq!(pipeline.objects, vec!["ok"]);
        assert_eq!(pipeline.errors.len(), 1);
        assert_eq!(pipeline.errors[0].category, "Boom");
        assert_eq!(pipeline.errors[0].source.input().map(String::as_str), Some("fail"));
        assert_eq!(summary.errors_reported, 1);
    }

    #[tokio::test]
    async fn test_invoke_never_reports_when_disabled() {
        let runner = TaskRunner::new(RunConfig::default().with_write_errors(false));
        let cancel = CancellationToken::new();
        let mut pipeline = CollectingPipeline::<u32, u32>::new();

        let summary = runner
            .invoke(
                Inputs::Piped((0..10).collect()),
                |_item: Option<u32>| async move { Err::<u32, _>(Boom) },
                &mut pipeline,
                emit,
                &cancel,
            )
            .await;

        assert!(pipeline.objects.is_empty());
        assert!(pipeline.errors.is_empty());
        assert_eq!(summary.errors_discarded, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_invoke_blocking_no_input() {
        let runner = TaskRunner::default();
        let cancel = CancellationToken::new();
        let mut pipeline = CollectingPipeline::<String, String>::new();

        let summary = runner
            .invoke_blocking(
                Inputs::None,
                |item: Option<String>| Ok::<_, Boom>(item.unwrap_or_else(|| "x".to_string())),
                &mut pipeline,
                emit,
                &cancel,
            )
            .await;

        assert_eq!(pipeline.objects, vec!["x"]);
        assert_eq!(summary.delivered, 1);
    }
}
