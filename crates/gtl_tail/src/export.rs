//! Export helpers: copy out the active log file, or zip the whole
//! logs directory.

use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use gtl_core::{IntoIoError, IoError, LogLine, OutputSink};

use thiserror::Error;

const EXPORT_ERR_PREFIX: &str = "while exporting logs:\n";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No logs folder at {0:?}")]
    NoLogsFolder(PathBuf),
    #[error("{EXPORT_ERR_PREFIX}{0}")]
    Io(#[from] IoError),
    #[error("{EXPORT_ERR_PREFIX}couldn't build zip archive:\n{0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Copies the current log file to a user-chosen destination.
pub async fn export_log_file(log_file: &Path, dest: &Path) -> Result<(), IoError> {
    tokio::fs::copy(log_file, dest).await.path(log_file)?;
    Ok(())
}

/// Default archive name for a batch export:
/// `gcloud_logs_<YYYY-MM-DD>.zip`.
#[must_use]
pub fn default_archive_name() -> String {
    format!("gcloud_logs_{}.zip", Local::now().format("%Y-%m-%d"))
}

/// Zips the entire directory containing `base_log_file` (the active
/// file plus all rotated backups) into `dest`, emitting one sink
/// line per archived file.
pub async fn batch_export_logs(
    base_log_file: &Path,
    dest: &Path,
    sink: Arc<dyn OutputSink>,
) -> Result<(), ExportError> {
    let logs_dir = base_log_file
        .parent()
        .filter(|dir| dir.is_dir())
        .ok_or_else(|| {
            ExportError::NoLogsFolder(
                base_log_file.parent().unwrap_or(Path::new("")).to_owned(),
            )
        })?
        .to_owned();

    sink.emit_status(&format!("Exporting logs to {}...", dest.display()));

    let bytes = zip_directory(&logs_dir, &sink)?;
    tokio::fs::write(dest, bytes).await.path(dest)?;

    sink.emit_status(&format!("All logs exported to {}", dest.display()));
    Ok(())
}

fn zip_directory(dir: &Path, sink: &Arc<dyn OutputSink>) -> Result<Vec<u8>, ExportError> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|error| {
            ExportError::Io(IoError::Io {
                error: error.to_string(),
                path: dir.to_owned(),
            })
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let full = entry.path();
        let rel = full
            .strip_prefix(dir)
            .unwrap_or(full)
            .to_string_lossy()
            .replace('\\', "/");

        zip.start_file(rel.as_str(), options)?;
        let mut file = std::fs::File::open(full).path(full)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).path(full)?;
        zip.write_all(&buf).path(full)?;

        sink.emit_line(LogLine::Message(format!("added {rel}")));
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::mpsc::channel;

    use gtl_core::ChannelSink;

    struct NullSink;
    impl OutputSink for NullSink {
        fn emit_line(&self, _line: LogLine) {}
        fn emit_status(&self, _message: &str) {}
    }

    // Recording sink for asserting per-file progress lines.
    struct RecordingSink {
        lines: Mutex<Vec<String>>,
    }
    impl OutputSink for RecordingSink {
        fn emit_line(&self, line: LogLine) {
            self.lines.lock().unwrap().push(line.as_str().to_owned());
        }
        fn emit_status(&self, _message: &str) {}
    }

    #[tokio::test]
    async fn export_copies_the_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let src = dir.path().join("app.log");
        let dest = dir.path().join("exported.log");
        std::fs::write(&src, "hello\n").unwrap();

        export_log_file(&src, &dest).await.unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn batch_export_zips_every_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let logs = dir.path().join("logs");
        std::fs::create_dir(&logs).unwrap();
        let base = logs.join("app.log");
        std::fs::write(&base, "active\n").unwrap();
        std::fs::write(logs.join("app.log.1"), "backup\n").unwrap();

        let dest = dir.path().join("out.zip");
        let sink = Arc::new(RecordingSink {
            lines: Mutex::new(Vec::new()),
        });
        batch_export_logs(&base, &dest, sink.clone()).await.unwrap();

        let lines = sink.lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().any(|l| l == "added app.log"));
        assert!(lines.iter().any(|l| l == "added app.log.1"));

        let bytes = std::fs::read(&dest).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut content = String::new();
        archive
            .by_name("app.log")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "active\n");
    }

    #[tokio::test]
    async fn batch_export_rejects_missing_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let base = dir.path().join("nope").join("app.log");
        let dest = dir.path().join("out.zip");

        let result = batch_export_logs(&base, &dest, Arc::new(NullSink)).await;
        assert!(matches!(result, Err(ExportError::NoLogsFolder(_))));
    }

    #[test]
    fn archive_name_is_dated() {
        let name = default_archive_name();
        assert!(name.starts_with("gcloud_logs_"));
        assert!(name.ends_with(".zip"));
    }

    #[tokio::test]
    async fn channel_sink_relays_progress() {
        let dir = tempfile::TempDir::new().unwrap();
        let logs = dir.path().join("logs");
        std::fs::create_dir(&logs).unwrap();
        let base = logs.join("app.log");
        std::fs::write(&base, "x\n").unwrap();

        let (line_tx, line_rx) = channel();
        let (status_tx, status_rx) = channel();
        let sink = Arc::new(ChannelSink {
            lines: line_tx,
            status: status_tx,
        });

        batch_export_logs(&base, &dir.path().join("out.zip"), sink)
            .await
            .unwrap();

        assert!(line_rx.try_iter().any(|l| l.as_str() == "added app.log"));
        let statuses: Vec<String> = status_rx.try_iter().collect();
        assert!(statuses.last().unwrap().starts_with("All logs exported"));
    }
}
