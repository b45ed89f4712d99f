//! Ordered, skippable, fail-fast validation
//!
//! A pipeline is a list of named checks with contiguous 1-based ordinals.
//! `run` invokes them strictly in order against one snapshot, bypasses the
//! ordinals in the caller's skip set and stops at the first failure.

pub mod rules;
pub mod standard;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::logging::LogScope;
use crate::models::{ConfigurationSnapshot, StepFailure, ValidationOutcome, ValidationReport};

/// `Ok(None)` passes, `Ok(Some(message))` fails with a message for the user,
/// `Err` is an unexpected error that the pipeline wraps with the step name
pub type CheckResult = Result<Option<String>>;

type CheckFn<'a> = Box<dyn FnMut(&mut ConfigurationSnapshot) -> CheckResult + Send + 'a>;

/// One named check at a fixed position
pub struct ValidationStep<'a> {
    ordinal: usize,
    name: String,
    check: CheckFn<'a>,
}

impl ValidationStep<'_> {
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for ValidationStep<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationStep")
            .field("ordinal", &self.ordinal)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordinals the caller wants bypassed for this run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipSet(BTreeSet<usize>);

impl SkipSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ordinal: usize) -> bool {
        self.0.insert(ordinal)
    }

    pub fn contains(&self, ordinal: usize) -> bool {
        self.0.contains(&ordinal)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<usize> for SkipSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Sequential validation steps sharing one snapshot
#[derive(Debug, Default)]
pub struct ValidationPipeline<'a> {
    steps: Vec<ValidationStep<'a>>,
}

impl<'a> ValidationPipeline<'a> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step; it receives the next ordinal
    pub fn step<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: FnMut(&mut ConfigurationSnapshot) -> CheckResult + Send + 'a,
    {
        let ordinal = self.steps.len() + 1;
        self.steps.push(ValidationStep {
            ordinal,
            name: name.into(),
            check: Box::new(check),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[ValidationStep<'a>] {
        &self.steps
    }

    /// Run every non-skipped step in order and stop at the first failure
    ///
    /// Format steps update the validity markers on `snapshot` as they go; the
    /// markers stay as they were left when the run stops.
    pub fn run(&mut self, snapshot: &mut ConfigurationSnapshot, skip: &SkipSet) -> ValidationReport {
        self.run_tracked(snapshot, skip, &AtomicUsize::new(0))
    }

    /// `run`, publishing the ordinal of the step in progress through `current`
    fn run_tracked(
        &mut self,
        snapshot: &mut ConfigurationSnapshot,
        skip: &SkipSet,
        current: &AtomicUsize,
    ) -> ValidationReport {
        let _scope = LogScope::new("Validate");
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let mut passed = Vec::new();
        let mut skipped = Vec::new();

        info!("[{}] Validating {} steps", run_id, self.steps.len());

        let mut outcome = ValidationOutcome::Passed;
        for step in &mut self.steps {
            if skip.contains(step.ordinal) {
                info!("[{}] Skipping validation {}: {}...", run_id, step.ordinal, step.name);
                skipped.push(step.ordinal);
                continue;
            }

            debug!("[{}] Validation {}: {}", run_id, step.ordinal, step.name);
            current.store(step.ordinal, Ordering::SeqCst);
            let message = match (step.check)(snapshot) {
                Ok(None) => {
                    passed.push(step.ordinal);
                    continue;
                }
                Ok(Some(message)) => message,
                Err(err) => format!("Error validating {}: {:#}", step.name, err),
            };

            warn!(
                "[{}] Validation {} ({}) failed: {}",
                run_id, step.ordinal, step.name, message
            );
            outcome = ValidationOutcome::Failed(StepFailure {
                ordinal: step.ordinal,
                name: step.name.clone(),
                message,
            });
            break;
        }

        if outcome == ValidationOutcome::Passed {
            info!("[{}] Validation passed", run_id);
        }

        ValidationReport {
            run_id,
            outcome,
            passed,
            skipped,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Run a whole pipeline on the blocking pool, bounded by `deadline`
///
/// Steps still execute one after another on a single worker; only the final
/// report and the marked snapshot come back. A run that outlives `deadline`
/// fails at the step that was executing, and the snapshot comes back as it
/// was handed in.
pub async fn run_in_background(
    mut pipeline: ValidationPipeline<'static>,
    snapshot: ConfigurationSnapshot,
    skip: SkipSet,
    deadline: Duration,
) -> Result<(ValidationReport, ConfigurationSnapshot)> {
    let names: Vec<String> = pipeline.steps().iter().map(|step| step.name.clone()).collect();
    let current = Arc::new(AtomicUsize::new(0));
    let original = snapshot.clone();
    let started = Instant::now();

    let worker = {
        let current = Arc::clone(&current);
        let mut snapshot = snapshot;
        let skip = skip.clone();
        tokio::task::spawn_blocking(move || {
            let report = pipeline.run_tracked(&mut snapshot, &skip, &current);
            (report, snapshot)
        })
    };

    match tokio::time::timeout(deadline, worker).await {
        Ok(joined) => joined.context("Validation worker failed"),
        Err(_) => {
            let ordinal = current.load(Ordering::SeqCst);
            let name = ordinal
                .checked_sub(1)
                .and_then(|index| names.get(index))
                .cloned()
                .unwrap_or_else(|| "Validation".to_string());
            let message = format!(
                "{} did not finish within {} seconds",
                name,
                deadline.as_secs_f64()
            );
            warn!("Validation {} ({}) timed out: {}", ordinal, name, message);

            let (skipped, passed): (Vec<usize>, Vec<usize>) =
                (1..ordinal).partition(|earlier| skip.contains(*earlier));
            let report = ValidationReport {
                run_id: Uuid::new_v4(),
                outcome: ValidationOutcome::Failed(StepFailure { ordinal, name, message }),
                passed,
                skipped,
                duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            };
            Ok((report, original))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pass(_: &mut ConfigurationSnapshot) -> CheckResult {
        Ok(None)
    }

    fn fail(message: &'static str) -> impl FnMut(&mut ConfigurationSnapshot) -> CheckResult {
        move |_| Ok(Some(message.to_string()))
    }

    #[test]
    fn test_ordinals_are_contiguous() {
        let pipeline = ValidationPipeline::new()
            .step("One", pass)
            .step("Two", pass)
            .step("Three", pass);

        let ordinals: Vec<usize> = pipeline.steps().iter().map(ValidationStep::ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
        assert_eq!(pipeline.steps()[1].name(), "Two");
    }

    #[test]
    fn test_stops_at_first_failure() {
        let fourth_calls = AtomicUsize::new(0);
        let mut pipeline = ValidationPipeline::new()
            .step("One", pass)
            .step("Two", fail("second failed"))
            .step("Three", pass)
            .step("Four", |_: &mut ConfigurationSnapshot| {
                fourth_calls.fetch_add(1, Ordering::SeqCst);
                Ok(Some("fourth failed".to_string()))
            })
            .step("Five", pass);

        let report = pipeline.run(&mut ConfigurationSnapshot::default(), &SkipSet::new());
        drop(pipeline);

        let failure = report.failure().unwrap();
        assert_eq!(failure.ordinal, 2);
        assert_eq!(failure.name, "Two");
        assert_eq!(failure.message, "second failed");
        assert_eq!(report.passed, vec![1]);
        assert_eq!(fourth_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_skipped_failure_lets_run_pass() {
        let mut pipeline = ValidationPipeline::new()
            .step("One", pass)
            .step("Two", fail("second failed"))
            .step("Three", pass);

        let skip: SkipSet = [2].into_iter().collect();
        let report = pipeline.run(&mut ConfigurationSnapshot::default(), &skip);

        assert!(report.is_success());
        assert_eq!(report.passed, vec![1, 3]);
        assert_eq!(report.skipped, vec![2]);
    }

    #[test]
    fn test_unexpected_error_is_wrapped_and_stops() {
        let later_calls = AtomicUsize::new(0);
        let mut pipeline = ValidationPipeline::new()
            .step("Certificate", |_: &mut ConfigurationSnapshot| {
                Err(anyhow::anyhow!("no such file")).context("loading primary.cert")
            })
            .step("Later", |_: &mut ConfigurationSnapshot| {
                later_calls.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            });

        let report = pipeline.run(&mut ConfigurationSnapshot::default(), &SkipSet::new());
        drop(pipeline);

        let failure = report.failure().unwrap();
        assert_eq!(
            failure.message,
            "Error validating Certificate: loading primary.cert: no such file"
        );
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_steps_mark_snapshot_fields() {
        let mut pipeline = ValidationPipeline::new().step("Suffix", |snapshot: &mut ConfigurationSnapshot| {
            let valid = snapshot.suffix.mark(false);
            Ok((!valid).then(|| "Invalid suffix".to_string()))
        });

        let mut snapshot = ConfigurationSnapshot::default();
        let report = pipeline.run(&mut snapshot, &SkipSet::new());

        assert!(!report.is_success());
        assert_eq!(snapshot.invalid_fields(), vec!["suffix"]);
    }

    #[test]
    fn test_empty_pipeline_passes() {
        let mut pipeline = ValidationPipeline::new();
        assert!(pipeline.is_empty());
        let report = pipeline.run(&mut ConfigurationSnapshot::default(), &SkipSet::new());
        assert!(report.is_success());
        assert!(report.passed.is_empty());
    }

    #[tokio::test]
    async fn test_background_run_returns_marked_snapshot() {
        let pipeline = ValidationPipeline::new().step("Host", |snapshot: &mut ConfigurationSnapshot| {
            snapshot.primary.host.mark(false);
            Ok(Some("Invalid primary host".to_string()))
        });

        let (report, snapshot) = run_in_background(
            pipeline,
            ConfigurationSnapshot::default(),
            SkipSet::new(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(report.failure().unwrap().message, "Invalid primary host");
        assert!(!snapshot.primary.host.is_valid);
    }

    #[tokio::test]
    async fn test_background_timeout_names_running_step() {
        let pipeline = ValidationPipeline::new()
            .step("Primary Host", pass)
            .step("Skipped Step", pass)
            .step("Primary Host Connectivity", |_: &mut ConfigurationSnapshot| {
                std::thread::sleep(Duration::from_millis(500));
                Ok(None)
            });

        let skip: SkipSet = [2].into_iter().collect();
        let (report, snapshot) = run_in_background(
            pipeline,
            ConfigurationSnapshot::default(),
            skip,
            Duration::from_millis(50),
        )
        .await
        .unwrap();

        let failure = report.failure().unwrap();
        assert_eq!(failure.ordinal, 3);
        assert_eq!(failure.name, "Primary Host Connectivity");
        assert!(failure.message.contains("did not finish"));
        assert_eq!(report.passed, vec![1]);
        assert_eq!(report.skipped, vec![2]);
        assert_eq!(snapshot, ConfigurationSnapshot::default());
    }

    #[test]
    fn test_ordinals_stay_unique_past_255_steps() {
        let pipeline = (0..300).fold(ValidationPipeline::new(), |pipeline, _| pipeline.step("Step", pass));

        let ordinals: Vec<usize> = pipeline.steps().iter().map(ValidationStep::ordinal).collect();
        assert_eq!(ordinals, (1..=300).collect::<Vec<_>>());
    }
}
