pub mod console;
pub mod progress;

use std::time::Duration;

use crate::app::error::ProvisionError;
use crate::app::models::{CompletionSummary, StepRecord};
use crate::app::poller::WaitPhase;

/// Presentation seam between the pipeline and a terminal adapter.
pub trait Reporter {
    fn step_started(&self, index: usize, total: usize, name: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    /// One call per poll tick while a wait is in progress.
    fn waiting(&self, phase: WaitPhase, elapsed: Duration);
    fn step_finished(&self, record: &StepRecord);
    fn step_failed(&self, name: &str, err: &ProvisionError);
    fn completed(&self, summary: &CompletionSummary);
}

/// Folds the error chain into display lines: the step header is dropped,
/// the remaining messages become `Error:` lines, then the raw output.
pub fn failure_lines(err: &ProvisionError) -> Vec<String> {
    let mut lines: Vec<String> = err
        .chain()
        .into_iter()
        .skip(usize::from(err.step_name().is_some()))
        .map(|message| format!("Error: {message}"))
        .collect();
    if let Some(output) = err.command_output() {
        lines.push(format!("Output: {output}"));
    }
    lines
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("[{:02}:{:02}]", secs / 60, secs % 60)
}

pub fn summary_lines(summary: &CompletionSummary) -> Vec<String> {
    vec![
        format!("AVD Name: {}", summary.avd_name),
        format!(
            "Android Version: {} (API {})",
            summary.android_version, summary.api_level
        ),
        format!("Device: {}", summary.device_label),
        format!("Architecture: {}", summary.architecture),
    ]
}
