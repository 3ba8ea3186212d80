//! Session controller: the start/stop lifecycle around one tailing
//! worker.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use gtl_core::{IoError, LogLine, OutputSink};

use thiserror::Error;

use crate::rotate::{RotatingWriter, RotationConfig};
use crate::tail::{TailTarget, tail_logs};

/// The terminal line pushed to the sink after every session, no
/// matter how it ended.
pub const STOP_SENTINEL: &str = "-- Logging stopped --";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Missing Project ID")]
    MissingProjectId,
    #[error("{0}")]
    Io(#[from] IoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
}

/// Owns the lifecycle of the tailing worker: at most one worker is
/// live at a time, `start` is a no-op unless idle, and `stop` is
/// cooperative and never blocks.
///
/// Replaces the original tool's module-level logger/thread/queue
/// globals with one explicit object the presentation layer holds.
pub struct LogSession {
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
    writer: Option<Arc<Mutex<RotatingWriter>>>,
}

impl LogSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            worker: None,
            writer: None,
        }
    }

    /// Derived, not stored: the join handle is the source of truth,
    /// so a worker that exits on its own (process crash, EOF) brings
    /// the session back to `Idle` without any shared mutation.
    #[must_use]
    pub fn state(&self) -> SessionState {
        match &self.worker {
            None => SessionState::Idle,
            Some(worker) if worker.is_finished() => SessionState::Idle,
            Some(_) if self.cancel.is_cancelled() => SessionState::Stopping,
            Some(_) => SessionState::Running,
        }
    }

    /// Starts tailing `gcloud app logs tail` for the given project.
    ///
    /// See [`LogSession::start_with`] for the full contract.
    pub fn start(
        &mut self,
        project_id: &str,
        config: RotationConfig,
        sink: Arc<dyn OutputSink>,
    ) -> Result<(), SessionError> {
        let target = TailTarget::gcloud(project_id.trim());
        self.start_with(project_id, target, config, sink)
    }

    /// Starts a session running an explicit [`TailTarget`] (tests
    /// substitute a fake producer here).
    ///
    /// - No-op if a session is already running or stopping.
    /// - A blank `project_id` is rejected before any resource is
    ///   allocated.
    /// - Failure to open the rotating log file aborts before the
    ///   process is spawned.
    ///
    /// Every failure is also reported as human-readable text through
    /// the sink's status callback; none of them poison the session.
    pub fn start_with(
        &mut self,
        project_id: &str,
        target: TailTarget,
        config: RotationConfig,
        sink: Arc<dyn OutputSink>,
    ) -> Result<(), SessionError> {
        if self.state() != SessionState::Idle {
            return Ok(());
        }

        let project_id = project_id.trim();
        if project_id.is_empty() {
            sink.emit_status("Error: Missing Project ID");
            return Err(SessionError::MissingProjectId);
        }

        let writer = match RotatingWriter::open(config) {
            Ok(writer) => Arc::new(Mutex::new(writer)),
            Err(error) => {
                sink.emit_status(&format!("Error: {error}"));
                return Err(error.into());
            }
        };

        // Fresh token: the previous session's cancellation must not
        // leak into this one.
        self.cancel = CancellationToken::new();
        self.writer = Some(writer.clone());

        // Banner goes out before the worker exists, so nothing the
        // worker emits can get ahead of it.
        sink.emit_line(LogLine::Message(format!(
            "-- Started logging for project: {project_id} --"
        )));
        sink.emit_status(&format!("Started logging for project: {project_id}"));

        let cancel = self.cancel.clone();
        let worker_sink = sink;
        self.worker = Some(tokio::spawn(async move {
            if let Err(error) = tail_logs(target, worker_sink.clone(), writer, cancel).await {
                worker_sink.emit_line(LogLine::Error(error.to_string()));
                worker_sink.emit_status(&format!("Error: {error}"));
            }
            worker_sink.emit_line(LogLine::Message(STOP_SENTINEL.to_owned()));
            worker_sink.emit_status("Logging stopped");
        }));

        Ok(())
    }

    /// Signals the worker to stop and returns immediately; the
    /// worker kills the child, emits the sentinel and winds down on
    /// its own. No-op when idle.
    pub fn stop(&mut self) {
        if self.state() == SessionState::Idle {
            return;
        }
        self.cancel.cancel();
    }

    /// Applies new rotation parameters to the live writer, if any.
    /// The writer itself decides whether anything actually changed.
    pub async fn reconfigure(&self, config: RotationConfig) -> Result<(), IoError> {
        if let Some(writer) = &self.writer {
            writer.lock().await.reconfigure(config)?;
        }
        Ok(())
    }

    /// Waits for the current worker to finish. Used on app exit and
    /// by tests (wrap in a timeout to bound the grace period).
    pub async fn wait(&mut self) {
        if let Some(worker) = self.worker.take() {
            _ = worker.await;
        }
    }
}

impl Default for LogSession {
    fn default() -> Self {
        Self::new()
    }
}
