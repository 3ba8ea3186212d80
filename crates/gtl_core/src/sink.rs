use std::fmt::Display;
use std::sync::mpsc::Sender;

use owo_colors::OwoColorize;

/// One line of output relayed from the external process.
///
/// # Variants
/// - `Message(String)`: a normal output line (stdout), or one of
///   the session's own banner/sentinel lines.
/// - `Error(String)`: a line the process wrote to stderr, or an
///   error summary produced by the core itself.
pub enum LogLine {
    Message(String),
    Error(String),
}

impl LogLine {
    #[must_use]
    pub fn print_colored(&self) -> String {
        match self {
            LogLine::Message(message) => message.clone(),
            LogLine::Error(error) => error.bright_red().to_string(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            LogLine::Message(line) | LogLine::Error(line) => line,
        }
    }
}

impl Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLine::Message(message) => write!(f, "{message}"),
            LogLine::Error(error) => write!(f, "{error}"),
        }
    }
}

/// Where the session delivers its output: one callback for relayed
/// lines, one for short lifecycle/status text ("Started logging...",
/// error summaries).
///
/// The real front-end plugs in a [`ChannelSink`]; tests plug in a
/// recording fake. The core never talks to presentation objects
/// directly.
pub trait OutputSink: Send + Sync {
    fn emit_line(&self, line: LogLine);
    fn emit_status(&self, message: &str);
}

/// [`OutputSink`] backed by unbounded mpsc channels, drained by the
/// front-end's fixed-interval poll loop.
///
/// Send failures are ignored on purpose: a dropped receiver just
/// means nobody is watching anymore.
pub struct ChannelSink {
    pub lines: Sender<LogLine>,
    pub status: Sender<String>,
}

impl OutputSink for ChannelSink {
    fn emit_line(&self, line: LogLine) {
        _ = self.lines.send(line);
    }

    fn emit_status(&self, message: &str) {
        _ = self.status.send(message.to_owned());
    }
}
