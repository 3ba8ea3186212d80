//! Runs `gcloud auth login` and sets the active project, streaming
//! all process output through the sink.

use std::process::Stdio;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use gtl_core::{LogLine, OutputSink};

use thiserror::Error;

use crate::tail::{ExternalCommand, TOOL_NOT_FOUND_HELP, relay_stream};

const AUTH_ERR_PREFIX: &str = "while authenticating with gcloud:\n";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{TOOL_NOT_FOUND_HELP}")]
    ToolNotFound,
    #[error("{AUTH_ERR_PREFIX}couldn't launch command:\n{0}")]
    Launch(std::io::Error),
    #[error("{AUTH_ERR_PREFIX}`{command}` exited with code {code}")]
    ExitCode { command: String, code: i32 },
    #[error("{AUTH_ERR_PREFIX}couldn't join reader task:\n{0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Interactive `gcloud auth login --brief`, then (if a project id is
/// given) `gcloud config set project <id>`.
///
/// Both steps stream their output through `sink`; lifecycle
/// transitions go through the status callback, mirroring the
/// original tool's messages.
pub async fn login(project_id: &str, sink: Arc<dyn OutputSink>) -> Result<(), AuthError> {
    sink.emit_status("Starting gcloud authentication...");
    let code = run_streamed(
        &ExternalCommand::gcloud(&["auth", "login", "--brief"]),
        &sink,
    )
    .await
    .inspect_err(|_| sink.emit_status("Authentication failed"))?;

    if code != 0 {
        sink.emit_status(&format!("Auth exited with code {code}"));
        sink.emit_line(LogLine::Error(format!(
            ">>> gcloud auth login exited with code {code}"
        )));
        return Err(AuthError::ExitCode {
            command: "gcloud auth login".to_owned(),
            code,
        });
    }

    sink.emit_status("Authentication succeeded");
    sink.emit_line(LogLine::Message(
        "gcloud auth login completed successfully.".to_owned(),
    ));

    let project_id = project_id.trim();
    if project_id.is_empty() {
        sink.emit_line(LogLine::Message(
            "No Project ID provided; skipping `gcloud config set project`.".to_owned(),
        ));
        sink.emit_status("No project to set");
        return Ok(());
    }

    sink.emit_status(&format!("Setting project -> {project_id}..."));
    let code = run_streamed(
        &ExternalCommand::gcloud(&["config", "set", "project", project_id]),
        &sink,
    )
    .await
    .inspect_err(|_| sink.emit_status("Failed to set project"))?;

    if code == 0 {
        sink.emit_status(&format!("Project set to {project_id}"));
        sink.emit_line(LogLine::Message(format!(
            "gcloud config set project {project_id} completed."
        )));
        Ok(())
    } else {
        sink.emit_status(&format!("Config set exited {code}"));
        Err(AuthError::ExitCode {
            command: "gcloud config set project".to_owned(),
            code,
        })
    }
}

/// Spawns the command, relays stdout and stderr through the sink,
/// and returns the exit code (-1 if killed by a signal).
async fn run_streamed(
    command: &ExternalCommand,
    sink: &Arc<dyn OutputSink>,
) -> Result<i32, AuthError> {
    let mut child = command
        .to_command()
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                AuthError::ToolNotFound
            } else {
                AuthError::Launch(error)
            }
        })?;

    // Never cancelled: auth is short-lived and user-driven.
    let cancel = CancellationToken::new();

    let stdout = child.stdout.take().map(|stream| {
        tokio::spawn(relay_stream(
            BufReader::new(stream),
            sink.clone(),
            cancel.clone(),
            false,
        ))
    });
    let stderr = child.stderr.take().map(|stream| {
        tokio::spawn(relay_stream(
            BufReader::new(stream),
            sink.clone(),
            cancel.clone(),
            true,
        ))
    });

    let status = child.wait().await.map_err(AuthError::Launch)?;
    if let Some(handle) = stdout {
        handle.await?;
    }
    if let Some(handle) = stderr {
        handle.await?;
    }
    Ok(status.code().unwrap_or(-1))
}
