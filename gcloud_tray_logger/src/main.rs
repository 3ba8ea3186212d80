//! Headless front-end for the tailing core: loads preferences,
//! starts a logging session and drains the relay queue to the
//! terminal on a fixed 100 ms tick (the same poll interval the
//! original tray app used for its log panel).

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, channel};
use std::time::Duration;

use clap::{Parser, Subcommand};

use gtl_core::{ChannelSink, IntoStringError, LogLine, Preferences, err, file_utils, info, pt};
use gtl_tail::{
    LogSession, RotationConfig, SessionState, batch_export_logs, default_archive_name,
    export_log_file, login,
};

#[derive(Parser)]
#[command(
    name = "gcloud-tray-logger",
    about = "Tails gcloud app logs into a rotating local file"
)]
struct Cli {
    /// GCP project ID (defaults to the saved preference, saved back
    /// when given)
    #[arg(short, long)]
    project: Option<String>,

    /// Override the log file path (saved back to preferences)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Rotate by calendar day instead of by size
    #[arg(long)]
    daily: bool,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Start tailing logs (the default)
    Tail,
    /// Run `gcloud auth login` and set the active project
    Login,
    /// Copy the current log file to a destination
    Export { dest: PathBuf },
    /// Zip the whole logs directory into one archive
    BatchExport { dest: Option<PathBuf> },
    /// Open the active log file in the system viewer
    OpenLog,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        err!("{error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();

    let mut prefs = Preferences::load().strerr()?;
    let mut changed = false;
    if let Some(project) = &cli.project {
        prefs.default_project = project.trim().to_owned();
        changed = true;
    }
    if let Some(log_file) = &cli.log_file {
        prefs.log_file = log_file.clone();
        changed = true;
    }
    if cli.daily && !prefs.is_daily() {
        prefs.daily_rotation = Some(true);
        changed = true;
    }
    if changed {
        prefs.save().await.strerr()?;
    }

    match cli.command.unwrap_or(CliCommand::Tail) {
        CliCommand::Tail => tail(&prefs).await,
        CliCommand::Login => auth_login(&prefs).await,
        CliCommand::Export { dest } => {
            export_log_file(&prefs.log_file, &dest).await.strerr()?;
            info!("Logs exported to {}", dest.display());
            Ok(())
        }
        CliCommand::BatchExport { dest } => batch_export(&prefs, dest).await,
        CliCommand::OpenLog => {
            file_utils::open_in_default_viewer(&prefs.log_file).strerr()?;
            info!("Opened log file: {}", prefs.log_file.display());
            Ok(())
        }
    }
}

async fn tail(prefs: &Preferences) -> Result<(), String> {
    let config = RotationConfig::from_preferences(prefs).strerr()?;
    info!("writing logs to {}", config.path.display());

    let (line_tx, line_rx) = channel();
    let (status_tx, status_rx) = channel();
    let sink = Arc::new(ChannelSink {
        lines: line_tx,
        status: status_tx,
    });

    let mut session = LogSession::new();
    session
        .start(&prefs.default_project, config, sink)
        .strerr()?;

    let mut poll = tokio::time::interval(Duration::from_millis(100));
    let mut stopping = false;
    loop {
        tokio::select! {
            _ = poll.tick() => {
                drain(&line_rx, &status_rx);
                if session.state() == SessionState::Idle {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if stopping {
                    // Second Ctrl-C: stop waiting for the worker.
                    std::process::exit(130);
                }
                info!("stopping (Ctrl-C again to force quit)");
                session.stop();
                stopping = true;
            }
        }
    }
    session.wait().await;
    // Catch whatever arrived after the last tick, sentinel included.
    drain(&line_rx, &status_rx);
    Ok(())
}

async fn auth_login(prefs: &Preferences) -> Result<(), String> {
    let (line_tx, line_rx) = channel();
    let (status_tx, status_rx) = channel();
    let sink = Arc::new(ChannelSink {
        lines: line_tx,
        status: status_tx,
    });

    let project = prefs.default_project.clone();
    let mut task = tokio::spawn(async move { login(&project, sink).await });

    let mut poll = tokio::time::interval(Duration::from_millis(100));
    let result = loop {
        poll.tick().await;
        drain(&line_rx, &status_rx);
        if task.is_finished() {
            break (&mut task).await;
        }
    };
    drain(&line_rx, &status_rx);
    result.strerr()?.strerr()
}

async fn batch_export(prefs: &Preferences, dest: Option<PathBuf>) -> Result<(), String> {
    let dest = dest.unwrap_or_else(|| PathBuf::from(default_archive_name()));

    let (line_tx, line_rx) = channel();
    let (status_tx, status_rx) = channel();
    let sink = Arc::new(ChannelSink {
        lines: line_tx,
        status: status_tx,
    });

    batch_export_logs(&prefs.log_file, &dest, sink).await.strerr()?;
    // Per-file progress ("added app.log.1" and friends) as steps.
    for line in line_rx.try_iter() {
        pt!("{line}");
    }
    for status in status_rx.try_iter() {
        info!("{status}");
    }
    Ok(())
}

fn drain(lines: &Receiver<LogLine>, statuses: &Receiver<String>) {
    for line in lines.try_iter() {
        println!("{}", line.print_colored());
    }
    for status in statuses.try_iter() {
        info!("{status}");
    }
}
