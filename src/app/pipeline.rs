use std::time::Instant;

use tracing::{error, info};

use crate::app::error::ProvisionError;
use crate::app::models::StepRecord;
use crate::app::present::Reporter;

pub type StepAction<C> = Box<dyn FnMut(&mut C, &dyn Reporter) -> Result<(), ProvisionError>>;

struct Step<C> {
    name: String,
    action: StepAction<C>,
}

/// Ordered named steps run strictly in sequence; the first failure ends the run.
pub struct Pipeline<C> {
    steps: Vec<Step<C>>,
}

impl<C> Default for Pipeline<C> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<C> Pipeline<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: FnMut(&mut C, &dyn Reporter) -> Result<(), ProvisionError> + 'static,
    {
        self.steps.push(Step {
            name: name.into(),
            action: Box::new(action),
        });
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name.as_str()).collect()
    }

    /// Returns the records of every finished step, or the failing step's
    /// error wrapped with its name.
    pub fn run(
        self,
        ctx: &mut C,
        reporter: &dyn Reporter,
        trace_id: &str,
    ) -> Result<Vec<StepRecord>, ProvisionError> {
        let total = self.steps.len();
        let mut records = Vec::with_capacity(total);
        for (index, mut step) in self.steps.into_iter().enumerate() {
            reporter.step_started(index, total, &step.name);
            info!(trace_id = %trace_id, step = %step.name, index, total, "step started");
            let started = Instant::now();
            match (step.action)(ctx, reporter) {
                Ok(()) => {
                    let record = StepRecord {
                        name: step.name,
                        duration_ms: started.elapsed().as_millis(),
                    };
                    info!(
                        trace_id = %trace_id,
                        step = %record.name,
                        duration_ms = record.duration_ms as u64,
                        "step finished"
                    );
                    reporter.step_finished(&record);
                    records.push(record);
                }
                Err(err) => {
                    error!(
                        trace_id = %trace_id,
                        step = %step.name,
                        code = err.code(),
                        error = %err,
                        "step failed"
                    );
                    let err = err.in_step(step.name);
                    if let Some(name) = err.step_name() {
                        reporter.step_failed(name, &err);
                    }
                    return Err(err);
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::RecordingReporter;

    #[test]
    fn failing_step_halts_the_run() {
        let pipeline = Pipeline::<Vec<&'static str>>::new()
            .step("A", |ran, _| {
                ran.push("A");
                Ok(())
            })
            .step("B", |ran, _| {
                ran.push("B");
                Err(ProvisionError::dependency("git not found"))
            })
            .step("C", |ran, _| {
                ran.push("C");
                Ok(())
            });
        let reporter = RecordingReporter::new();
        let mut ran = Vec::new();

        let err = pipeline
            .run(&mut ran, &reporter, "trace-pipeline")
            .expect_err("B fails");

        assert_eq!(ran, vec!["A", "B"]);
        assert_eq!(err.step_name(), Some("B"));
        assert_eq!(err.to_string(), "Setup failed at: B");
        assert_eq!(err.code(), "ERR_DEPENDENCY");
        assert_eq!(
            reporter.events(),
            vec!["start:A", "done:A", "start:B", "failed:B"]
        );
    }

    #[test]
    fn records_every_step_in_order() {
        let pipeline = Pipeline::<u32>::new()
            .step("first", |count, reporter| {
                *count += 1;
                reporter.info("one");
                Ok(())
            })
            .step("second", |count, _| {
                *count += 1;
                Ok(())
            });
        assert_eq!(pipeline.names(), vec!["first", "second"]);
        let mut count = 0;

        let records = pipeline
            .run(&mut count, &RecordingReporter::new(), "trace-pipeline")
            .expect("run");

        assert_eq!(count, 2);
        let names: Vec<&str> = records.iter().map(|record| record.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
