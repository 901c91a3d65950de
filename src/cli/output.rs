//! CLI output formatting

use crate::{
    cli::terminal_output::write_separator,
    core::Stage,
    execution::{ExecutionEvent, FollowOutcome, ProcessExitStatus},
    tooling::{LogLine, LogSink},
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a spinner for a stage that runs to completion
pub fn create_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// `[n/3] name` header for a stage
pub fn format_stage(stage: Stage) -> String {
    format!(
        "[{}/{}] {}",
        style(stage.position()).cyan(),
        style(Stage::ALL.len()).dim(),
        style(stage.name()).bold()
    )
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}.{}s", secs, duration.subsec_millis() / 100)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Format an execution status for display
pub fn format_status(status: ProcessExitStatus) -> String {
    match status {
        ProcessExitStatus::Success => style("OK").green().to_string(),
        ProcessExitStatus::Error => style("ERROR").red().to_string(),
        ProcessExitStatus::BuildFailed => style("BUILD FAILED").red().to_string(),
        ProcessExitStatus::RecreateFailed => style("RECREATE FAILED").red().to_string(),
        ProcessExitStatus::FollowFailed => style("FOLLOW FAILED").red().to_string(),
    }
}

/// Format an execution event for display
///
/// Returns `None` for events that only drive the spinner.
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            service,
            image_tag,
        } => Some(format!(
            "{} Deploying {} as {} ({})",
            ROCKET,
            style(image_tag).bold(),
            style(service).cyan(),
            style(&execution_id.to_string()[..8]).dim()
        )),
        ExecutionEvent::StageStarted { .. } => None,
        ExecutionEvent::ImageBuilt { image } => {
            Some(format!("{} Image {}", INFO, style(image).dim()))
        }
        ExecutionEvent::ServiceRecreated { container } => Some(format!(
            "{} Service {} recreated",
            INFO,
            style(&container.service).cyan()
        )),
        ExecutionEvent::StageCompleted { stage, duration } => Some(format!(
            "{} {} {}",
            CHECK,
            format_stage(*stage),
            style(format_duration(*duration)).dim()
        )),
        ExecutionEvent::StageFailed { stage, error } => Some(format!(
            "{} {}: {}",
            CROSS,
            format_stage(*stage),
            style(error).red()
        )),
        ExecutionEvent::FollowEnded { outcome } => {
            let lines = outcome.lines();
            Some(match outcome {
                FollowOutcome::Cancelled { .. } => format!(
                    "{} Interrupted after {} lines, container left running",
                    INFO, lines
                ),
                FollowOutcome::StreamClosed { .. } => {
                    format!("{} Log stream closed after {} lines", INFO, lines)
                }
                FollowOutcome::StreamFailed { error, .. } => format!(
                    "{} Log stream failed after {} lines: {}",
                    WARN,
                    lines,
                    style(error).yellow()
                ),
                FollowOutcome::OutputClosed { .. } => format!(
                    "{} Output closed after {} lines, container left running",
                    INFO, lines
                ),
            })
        }
        ExecutionEvent::PipelineFinished { status, .. } => Some(format!(
            "{} Finished: {} (exit {})",
            if status.is_success() { CHECK } else { CROSS },
            format_status(*status),
            status.code()
        )),
    }
}

/// Prints pipeline events, with a spinner while build and recreate run
///
/// Also takes the image builder's output lines, shown above the spinner.
#[derive(Default)]
pub struct ConsoleReporter {
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `event` on stdout
    ///
    /// A closed stdout only loses the status line; the run carries on.
    pub fn handle(&self, event: &ExecutionEvent) {
        if let Err(e) = self.report(&mut io::stdout().lock(), event) {
            debug!("Could not write pipeline event: {}", e);
        }
    }

    /// Update the spinner and write the event's status line to `out`
    pub fn report<W: Write>(&self, out: &mut W, event: &ExecutionEvent) -> io::Result<()> {
        match event {
            ExecutionEvent::StageStarted { stage } if *stage != Stage::Follow => {
                let spinner = create_spinner(format!("{} {}", SPINNER, format_stage(*stage)));
                self.replace_spinner(Some(spinner));
            }
            ExecutionEvent::StageStarted { .. } => {
                self.replace_spinner(None);
                write_separator(out)?;
            }
            ExecutionEvent::StageCompleted { .. } | ExecutionEvent::StageFailed { .. } => {
                self.replace_spinner(None);
            }
            _ => {}
        }

        if let Some(line) = format_execution_event(event) {
            writeln!(out, "{}", line)?;
            out.flush()?;
        }
        Ok(())
    }

    fn spinner(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.spinner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn replace_spinner(&self, next: Option<ProgressBar>) {
        let mut current = self.spinner();
        if let Some(previous) = current.take() {
            previous.finish_and_clear();
        }
        *current = next;
    }
}

impl LogSink for ConsoleReporter {
    fn on_line(&self, line: &LogLine) -> io::Result<()> {
        let text = format!("  {}", style(&line.text).dim());
        match self.spinner().as_ref() {
            Some(spinner) if !spinner.is_hidden() => {
                spinner.println(text);
                Ok(())
            }
            _ => writeln!(io::stderr(), "{}", text),
        }
    }
}
