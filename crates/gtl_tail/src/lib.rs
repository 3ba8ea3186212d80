//! # Log tailing and rotation for GCloud Tray Logger
//!
//! The core subsystem of the tool: supervises a long-running
//! `gcloud app logs tail` process, relays its output safely to a
//! consumer on another thread, and manages rotating log storage.
//!
//! The moving parts, leaves first:
//!
//! - [`effective_path`] / [`RotatingWriter`] — rotation policy:
//!   which file is active, and size/daily rollover with retained
//!   backups.
//! - the process supervisor (internal) — probe, spawn, relay,
//!   cooperative cancellation with a kill fallback.
//! - [`LogSession`] — the start/stop lifecycle the presentation
//!   layer drives; at most one live worker per session object.
//!
//! Lines travel from the supervisor through an
//! [`OutputSink`](gtl_core::OutputSink) (usually a channel drained
//! by a UI poll loop) and, in parallel, into the rotating file.
//!
//! Also here, because they drive the same external CLI: the
//! [`login`] flow and the log export helpers
//! ([`export_log_file`], [`batch_export_logs`]).

mod auth;
mod export;
mod rotate;
mod session;
mod tail;

pub use auth::{AuthError, login};
pub use export::{
    ExportError, batch_export_logs, default_archive_name, export_log_file,
};
pub use rotate::{RotatingWriter, RotationConfig, RotationMode, effective_path};
pub use session::{LogSession, STOP_SENTINEL, SessionError, SessionState};
pub use tail::{ExternalCommand, TOOL_NOT_FOUND_HELP, TailError, TailTarget};
