use std::cell::{Cell, RefCell};
use std::io::{self, Stdout, Write};
use std::time::{Duration, Instant};

use crossterm::cursor::MoveToColumn;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor, Stylize};
use crossterm::terminal::{Clear, ClearType};
use crossterm::QueueableCommand;
use tracing::debug;

use crate::app::error::ProvisionError;
use crate::app::models::{CompletionSummary, StepRecord};
use crate::app::poller::WaitPhase;
use crate::app::present::{failure_lines, format_elapsed, summary_lines, Reporter};

const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Redraws one spinner line for the running step; finished steps scroll up.
pub struct ProgressReporter<W: Write = Stdout> {
    out: RefCell<W>,
    started: Instant,
    frame: Cell<usize>,
    current: RefCell<Option<String>>,
    status: RefCell<String>,
}

impl ProgressReporter<Stdout> {
    pub fn stdout() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl<W: Write> ProgressReporter<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            out: RefCell::new(out),
            started: Instant::now(),
            frame: Cell::new(0),
            current: RefCell::new(None),
            status: RefCell::new(String::new()),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn clear_line(out: &mut W) -> io::Result<()> {
        out.queue(MoveToColumn(0))?;
        out.queue(Clear(ClearType::CurrentLine))?;
        Ok(())
    }

    fn redraw(&self) -> io::Result<()> {
        let current = self.current.borrow();
        let Some(name) = current.as_deref() else {
            return Ok(());
        };
        let frame = FRAMES[self.frame.get() % FRAMES.len()];
        let status = self.status.borrow();
        let mut out = self.out.borrow_mut();
        Self::clear_line(&mut out)?;
        out.queue(SetForegroundColor(Color::Cyan))?;
        out.queue(Print(format!("{frame} ")))?;
        out.queue(ResetColor)?;
        out.queue(Print(name.bold()))?;
        if !status.is_empty() {
            out.queue(Print(format!(" {}", status.as_str()).dark_grey()))?;
        }
        out.queue(Print(format!(" {}", format_elapsed(self.started.elapsed())).dark_grey()))?;
        out.flush()
    }

    /// Prints a permanent line above the spinner, then restores the spinner.
    fn above(&self, color: Color, line: &str) -> io::Result<()> {
        {
            let mut out = self.out.borrow_mut();
            Self::clear_line(&mut out)?;
            out.queue(SetForegroundColor(color))?;
            out.queue(Print(line))?;
            out.queue(ResetColor)?;
            out.queue(Print("\n"))?;
        }
        self.redraw()
    }

    fn finish_line(&self, mark: &str, color: Color, text: &str) -> io::Result<()> {
        self.current.borrow_mut().take();
        self.status.borrow_mut().clear();
        let mut out = self.out.borrow_mut();
        Self::clear_line(&mut out)?;
        out.queue(SetForegroundColor(color))?;
        out.queue(Print(format!("{mark} ")))?;
        out.queue(ResetColor)?;
        out.queue(Print(text))?;
        out.queue(Print("\n"))?;
        out.flush()
    }
}

fn report(result: io::Result<()>) {
    if let Err(err) = result {
        debug!(error = %err, "progress write failed");
    }
}

impl<W: Write> Reporter for ProgressReporter<W> {
    fn step_started(&self, index: usize, total: usize, name: &str) {
        *self.current.borrow_mut() = Some(format!("[{}/{}] {name}", index + 1, total));
        self.status.borrow_mut().clear();
        self.frame.set(0);
        report(self.redraw());
    }

    fn info(&self, message: &str) {
        *self.status.borrow_mut() = message.to_string();
        report(self.redraw());
    }

    fn warn(&self, message: &str) {
        report(self.above(Color::Yellow, &format!("  ! {message}")));
    }

    fn waiting(&self, phase: WaitPhase, elapsed: Duration) {
        self.frame.set(self.frame.get().wrapping_add(1));
        *self.status.borrow_mut() = format!("waiting for {phase} ({}s)", elapsed.as_secs());
        report(self.redraw());
    }

    fn step_finished(&self, record: &StepRecord) {
        let seconds = record.duration_ms as f64 / 1000.0;
        report(self.finish_line(
            "✔",
            Color::Green,
            &format!("{} ({seconds:.1}s)", record.name),
        ));
    }

    fn step_failed(&self, name: &str, err: &ProvisionError) {
        report(self.finish_line(
            "✘",
            Color::Red,
            &format!("Setup failed at: {name} {}", format_elapsed(self.started.elapsed())),
        ));
        for line in failure_lines(err) {
            report(self.above(Color::Yellow, &format!("  {line}")));
        }
    }

    fn completed(&self, summary: &CompletionSummary) {
        let minutes = summary.elapsed.as_secs_f64() / 60.0;
        report(self.finish_line(
            "✔",
            Color::Green,
            &format!("Configuration complete ({minutes:.1} minutes)"),
        ));
        for line in summary_lines(summary) {
            report(self.above(Color::DarkGrey, &format!("  {line}")));
        }
    }
}
