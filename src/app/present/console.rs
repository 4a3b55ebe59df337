use std::cell::RefCell;
use std::io::{self, Stdout, Write};
use std::time::{Duration, Instant};

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor, Stylize};
use crossterm::QueueableCommand;
use tracing::debug;

use crate::app::error::ProvisionError;
use crate::app::models::{CompletionSummary, StepRecord};
use crate::app::poller::WaitPhase;
use crate::app::present::{failure_lines, format_elapsed, summary_lines, Reporter};

/// Line-oriented output: a header per step and indented sub-lines.
pub struct ConsoleReporter<W: Write = Stdout> {
    out: RefCell<W>,
    started: Instant,
}

impl ConsoleReporter<Stdout> {
    pub fn stdout() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            out: RefCell::new(out),
            started: Instant::now(),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn timing(&self) -> String {
        format_elapsed(self.started.elapsed())
    }

    fn header(&self, color: Color, message: &str, leading_blank: bool) -> io::Result<()> {
        let timing = self.timing();
        let mut out = self.out.borrow_mut();
        if leading_blank {
            out.queue(Print("\n"))?;
        }
        out.queue(SetForegroundColor(color))?;
        out.queue(Print(message.bold()))?;
        out.queue(ResetColor)?;
        out.queue(Print(" "))?;
        out.queue(Print(timing.dark_grey().italic()))?;
        out.queue(Print("\n"))?;
        out.flush()
    }

    fn sub_line(&self, color: Color, marker: &str, message: &str) -> io::Result<()> {
        let mut out = self.out.borrow_mut();
        out.queue(SetForegroundColor(color))?;
        out.queue(Print(format!("  {marker} {message}\n")))?;
        out.queue(ResetColor)?;
        out.flush()
    }
}

fn report(result: io::Result<()>) {
    if let Err(err) = result {
        debug!(error = %err, "console write failed");
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn step_started(&self, _index: usize, _total: usize, name: &str) {
        report(self.header(Color::Cyan, &format!("[+] {name}"), true));
    }

    fn info(&self, message: &str) {
        report(self.sub_line(Color::DarkGrey, "[+]", message));
    }

    fn warn(&self, message: &str) {
        report(self.sub_line(Color::Yellow, "[!]", message));
    }

    fn waiting(&self, _phase: WaitPhase, _elapsed: Duration) {}

    fn step_finished(&self, _record: &StepRecord) {}

    fn step_failed(&self, name: &str, err: &ProvisionError) {
        report(self.header(Color::Red, &format!("[!] Setup failed at: {name}"), false));
        for line in failure_lines(err) {
            self.warn(&line);
        }
    }

    fn completed(&self, summary: &CompletionSummary) {
        let minutes = summary.elapsed.as_secs_f64() / 60.0;
        report(self.header(
            Color::Green,
            &format!("[+] Configuration complete ({minutes:.1} minutes)"),
            true,
        ));
        for line in summary_lines(summary) {
            self.info(&line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(reporter: ConsoleReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).expect("utf8")
    }

    #[test]
    fn prints_step_header_and_sub_lines() {
        let reporter = ConsoleReporter::with_writer(Vec::new());
        reporter.step_started(1, 11, "Java");
        reporter.info("Java detected");
        reporter.warn("JAVA_HOME not found");

        let text = rendered(reporter);
        assert!(text.contains("[+] Java"));
        assert!(text.contains("[00:00]"));
        assert!(text.contains("  [+] Java detected"));
        assert!(text.contains("  [!] JAVA_HOME not found"));
    }

    #[test]
    fn failure_lists_step_and_command_output() {
        let reporter = ConsoleReporter::with_writer(Vec::new());
        let err = ProvisionError::command(
            "avdmanager",
            &["create".to_string()],
            "Error: Package path is not valid",
            Some(1),
        )
        .context("AVD creation failed")
        .in_step("Emulator");
        reporter.step_failed("Emulator", &err);

        let text = rendered(reporter);
        assert!(text.contains("[!] Setup failed at: Emulator"));
        assert!(text.contains("Error: AVD creation failed"));
        assert!(text.contains("Output: Error: Package path is not valid"));
    }

    #[test]
    fn completion_prints_summary() {
        let reporter = ConsoleReporter::with_writer(Vec::new());
        reporter.completed(&CompletionSummary {
            avd_name: "Pixel_7_Pro_API_33".to_string(),
            android_version: "13".to_string(),
            api_level: "33".to_string(),
            device_label: "Pixel 7 Pro".to_string(),
            architecture: "x86_64".to_string(),
            elapsed: Duration::from_secs(90),
        });

        let text = rendered(reporter);
        assert!(text.contains("Configuration complete (1.5 minutes)"));
        assert!(text.contains("AVD Name: Pixel_7_Pro_API_33"));
        assert!(text.contains("Android Version: 13 (API 33)"));
        assert!(text.contains("Architecture: x86_64"));
    }
}
