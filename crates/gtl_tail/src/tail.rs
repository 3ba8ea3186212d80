//! Process supervisor: spawns the external log producer and relays
//! its output into the sink and the rotating log file.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use gtl_core::{LogLine, OutputSink, err, info};

use crate::rotate::RotatingWriter;

use thiserror::Error;

const TAIL_ERR_PREFIX: &str = "while tailing logs:\n";

pub const TOOL_NOT_FOUND_HELP: &str = "Error: could not find the gcloud CLI.\n\
Please install Google Cloud SDK and ensure 'gcloud' is on your PATH.";

#[derive(Debug, Error)]
pub enum TailError {
    #[error("{TOOL_NOT_FOUND_HELP}")]
    ToolNotFound,
    #[error("{TAIL_ERR_PREFIX}couldn't launch the log tail command:\n{0}")]
    Launch(std::io::Error),
    #[error("{TAIL_ERR_PREFIX}couldn't wait on the log tail process:\n{0}")]
    Process(std::io::Error),
    #[error("{TAIL_ERR_PREFIX}couldn't join reader task:\n{0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A concrete command line to run, prebuilt so tests can substitute
/// a fake producer for the real gcloud CLI.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalCommand {
    #[must_use]
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    /// A gcloud invocation. On Windows gcloud is a batch wrapper, so
    /// it goes through pwsh like the original tool did.
    #[must_use]
    pub fn gcloud(args: &[&str]) -> Self {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "windows")] {
                Self {
                    program: "pwsh".to_owned(),
                    args: vec![
                        "-NoLogo".to_owned(),
                        "-NoProfile".to_owned(),
                        "-NonInteractive".to_owned(),
                        "-Command".to_owned(),
                        format!("gcloud {}", args.join(" ")),
                    ],
                }
            } else {
                Self::new("gcloud", args)
            }
        }
    }

    pub(crate) fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

/// What a logging session runs: an optional best-effort version
/// probe, then the long-running tail command.
#[derive(Debug, Clone)]
pub struct TailTarget {
    pub probe: Option<ExternalCommand>,
    pub tail: ExternalCommand,
}

impl TailTarget {
    /// The real thing: `gcloud --version` followed by
    /// `gcloud app logs tail --project=<id>`.
    #[must_use]
    pub fn gcloud(project_id: &str) -> Self {
        Self {
            probe: Some(ExternalCommand::gcloud(&["--version"])),
            tail: ExternalCommand::gcloud(&[
                "app",
                "logs",
                "tail",
                &format!("--project={project_id}"),
            ]),
        }
    }
}

/// Runs the tail until cancellation or process exit.
///
/// The child's stdout and stderr are captured as one combined stream:
/// a single relay task drains both pipes and emits into the sink and
/// the rotating writer in one FIFO, so lines arrive in the order they
/// were emitted. Cancellation is observed at every line boundary, and
/// additionally kills the child outright so a silent process can't
/// stall `stop()` indefinitely.
///
/// Mid-stream read errors are not distinguished from EOF; either way
/// the process is treated as terminated.
pub(crate) async fn tail_logs(
    target: TailTarget,
    sink: Arc<dyn OutputSink>,
    writer: Arc<Mutex<RotatingWriter>>,
    cancel: CancellationToken,
) -> Result<(), TailError> {
    if let Some(probe) = &target.probe {
        run_probe(probe, &sink, &writer).await?;
    }

    sink.emit_line(LogLine::Message("Waiting for new log entries...".to_owned()));

    let mut child = target
        .tail
        .to_command()
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                TailError::ToolNotFound
            } else {
                TailError::Launch(error)
            }
        })?;

    info!("started log tail: {} {:?}", target.tail.program, target.tail.args);

    let reader = match (child.stdout.take(), child.stderr.take()) {
        (Some(stdout), Some(stderr)) => Some(tokio::spawn(relay_combined(
            BufReader::new(stdout),
            BufReader::new(stderr),
            sink.clone(),
            writer.clone(),
            cancel.clone(),
        ))),
        _ => None,
    };

    let mut killed = false;
    let status = loop {
        if cancel.is_cancelled() && !killed {
            if let Err(error) = child.start_kill() {
                err!("couldn't kill log tail process: {error}");
            }
            killed = true;
        }
        if let Some(status) = child.try_wait().map_err(TailError::Process)? {
            break status;
        }
        tokio::select! {
            () = cancel.cancelled(), if !killed => {}
            () = tokio::time::sleep(Duration::from_millis(500)) => {}
        }
    };

    let mut relayed = 0;
    if let Some(handle) = reader {
        relayed = handle.await?;
    }

    info!("log tail process exited ({status}), {relayed} lines relayed");
    Ok(())
}

/// Best-effort `gcloud --version`. A missing binary aborts the
/// session with [`TailError::ToolNotFound`]; any other failure is
/// only a warning since the tail itself may still work.
async fn run_probe(
    probe: &ExternalCommand,
    sink: &Arc<dyn OutputSink>,
    writer: &Arc<Mutex<RotatingWriter>>,
) -> Result<(), TailError> {
    match probe.to_command().output().await {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout).trim().to_owned();
            let line = LogLine::Message(format!("gcloud version:\n{version}"));
            if let Err(error) = writer.lock().await.write_line(&line) {
                err!("couldn't write to log file: {error}");
            }
            sink.emit_line(line);
            Ok(())
        }
        Ok(output) => {
            sink.emit_line(LogLine::Message(format!(
                "Warning: could not get gcloud version ({})",
                output.status
            )));
            Ok(())
        }
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            Err(TailError::ToolNotFound)
        }
        Err(error) => {
            sink.emit_line(LogLine::Message(format!(
                "Warning: could not get gcloud version ({error})"
            )));
            Ok(())
        }
    }
}

/// Drains stdout and stderr as one merged stream: a single consumer
/// pulls whichever pipe has a line ready, so everything downstream
/// sees one FIFO and stderr output isn't reordered around stdout
/// output. Returns how many lines were relayed.
async fn relay_combined<O, E>(
    stdout: O,
    stderr: E,
    sink: Arc<dyn OutputSink>,
    writer: Arc<Mutex<RotatingWriter>>,
    cancel: CancellationToken,
) -> u64
where
    O: AsyncBufRead + Unpin,
    E: AsyncBufRead + Unpin,
{
    let mut out_lines = stdout.lines();
    let mut err_lines = stderr.lines();
    let mut out_done = false;
    let mut err_done = false;
    let mut relayed = 0;
    // Prevents horrible log spam if the disk fills up mid-session.
    let mut write_failed = false;

    while !(out_done && err_done) {
        let line = tokio::select! {
            () = cancel.cancelled() => break,
            line = out_lines.next_line(), if !out_done => match line {
                Ok(Some(line)) => line,
                // EOF and read errors both mean the stream is done.
                Ok(None) | Err(_) => {
                    out_done = true;
                    continue;
                }
            },
            line = err_lines.next_line(), if !err_done => match line {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => {
                    err_done = true;
                    continue;
                }
            },
        };

        let line = LogLine::Message(line);
        if let Err(error) = writer.lock().await.write_line(&line) {
            if !write_failed {
                err!("couldn't write to log file: {error}");
                write_failed = true;
            }
        }
        sink.emit_line(line);
        relayed += 1;
    }
    relayed
}

/// Forwards one output stream line-by-line until EOF or
/// cancellation. Returns how many lines were relayed.
pub(crate) async fn relay_stream<R: AsyncBufRead + Unpin>(
    stream: R,
    sink: Arc<dyn OutputSink>,
    cancel: CancellationToken,
    is_stderr: bool,
) -> u64 {
    let mut lines = stream.lines();
    let mut relayed = 0;

    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                // EOF and read errors both mean the process is done.
                Ok(None) | Err(_) => break,
            },
        };

        sink.emit_line(if is_stderr {
            LogLine::Error(line)
        } else {
            LogLine::Message(line)
        });
        relayed += 1;
    }
    relayed
}
