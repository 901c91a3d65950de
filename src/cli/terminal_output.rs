//! Terminal sink for followed service logs
//!
//! Each line is written to stdout and flushed straight away, so the operator
//! sees container output as soon as compose emits it. A write error (stdout
//! closed by `head`, say) is passed back so following stops.
//!
//! # Example
//!
//! ```no_run
//! use devdb::cli::terminal_output::TerminalLogSink;
//! use devdb::tooling::{LogLine, LogSink};
//!
//! let sink = TerminalLogSink::new(false);
//! sink.on_line(&LogLine::new("database system is ready to accept connections"))
//!     .expect("stdout is open");
//! ```

use crate::tooling::{LogLine, LogSink};
use console::style;
use std::io::{self, Write};

/// Writes log lines to the terminal
#[derive(Debug)]
pub struct TerminalLogSink {
    /// Prefix each line with the time it was received
    timestamps: bool,
}

impl TerminalLogSink {
    pub fn new(timestamps: bool) -> Self {
        Self { timestamps }
    }

    /// Render a line the way it is printed
    pub fn render(&self, line: &LogLine) -> String {
        if self.timestamps {
            format!(
                "{} {}",
                style(line.received_at.format("%H:%M:%S%.3f")).dim(),
                line.text
            )
        } else {
            line.text.clone()
        }
    }

    /// Write one rendered line to `out` and flush it
    pub fn write_line<W: Write>(&self, out: &mut W, line: &LogLine) -> io::Result<()> {
        writeln!(out, "{}", self.render(line))?;
        out.flush()
    }
}

/// Write a horizontal rule spanning the terminal width
pub fn write_separator<W: Write>(out: &mut W) -> io::Result<()> {
    // Get terminal width, default to 80 if unavailable
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80);
    writeln!(out, "{}", style("─".repeat(width)).dim())
}

impl LogSink for TerminalLogSink {
    fn on_line(&self, line: &LogLine) -> io::Result<()> {
        self.write_line(&mut io::stdout().lock(), line)
    }
}
