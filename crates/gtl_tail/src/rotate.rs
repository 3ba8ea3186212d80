//! Rotation policy: where the active log file lives, and the
//! rotating file handler that writes tailed lines to it.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

use gtl_core::{IntoIoError, IoError, LogLine, Preferences};

/// Resolves the file path currently active for writing.
///
/// With `daily` off this is the base path unchanged. With `daily` on,
/// a year-month directory is created next to the base path and the
/// file gets an ISO date suffix:
/// `logs/app.log` -> `logs/2026-08/app-2026-08-29.log`.
///
/// Calling this twice on the same day returns the same path; once a
/// day's file has been opened, earlier days' files are never reopened
/// for writing.
pub fn effective_path(base_path: &Path, daily: bool) -> Result<PathBuf, IoError> {
    effective_path_on(base_path, daily, Local::now().date_naive())
}

fn effective_path_on(base_path: &Path, daily: bool, today: NaiveDate) -> Result<PathBuf, IoError> {
    if !daily {
        return Ok(base_path.to_owned());
    }

    let parent = base_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let month_dir = parent.join(today.format("%Y-%m").to_string());
    std::fs::create_dir_all(&month_dir).path(&month_dir)?;

    let stem = base_path
        .file_stem()
        .map_or_else(|| "log".to_owned(), |s| s.to_string_lossy().into_owned());
    let date = today.format("%Y-%m-%d");
    let name = match base_path.extension() {
        Some(ext) => format!("{stem}-{date}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{date}"),
    };
    Ok(month_dir.join(name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationMode {
    /// Roll over when the active file would exceed `max_bytes` on the
    /// next write. `max_bytes == 0` disables rotation.
    Size { max_bytes: u64 },
    /// Roll over at local midnight.
    Daily,
}

/// Immutable rotation parameters. A preference change produces a new
/// value wholesale; see [`RotatingWriter::reconfigure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationConfig {
    /// The active file path (already the *effective* path in daily
    /// mode).
    pub path: PathBuf,
    pub mode: RotationMode,
    /// How many rotated backups to retain; the oldest beyond this
    /// count are discarded.
    pub backup_count: usize,
}

impl RotationConfig {
    /// Builds the config from saved preferences, resolving the
    /// effective path for daily mode.
    pub fn from_preferences(prefs: &Preferences) -> Result<Self, IoError> {
        let daily = prefs.is_daily();
        Ok(Self {
            path: effective_path(&prefs.log_file, daily)?,
            mode: if daily {
                RotationMode::Daily
            } else {
                RotationMode::Size {
                    max_bytes: prefs.max_log_size,
                }
            },
            backup_count: prefs.backup_count,
        })
    }
}

struct ActiveFile {
    file: File,
    written: u64,
    opened_day: NaiveDate,
}

impl ActiveFile {
    fn open(path: &Path) -> Result<Self, IoError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).path(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .path(path)?;
        let written = file.metadata().path(path)?.len();
        Ok(Self {
            file,
            written,
            opened_day: Local::now().date_naive(),
        })
    }
}

/// The rotating log file handler. Owns the active file handle
/// exclusively; rotation and reconfiguration always close the old
/// handle before opening a new one, so two writers never share a
/// path.
pub struct RotatingWriter {
    config: RotationConfig,
    // `None` only transiently inside rollover/reconfigure.
    active: Option<ActiveFile>,
}

impl RotatingWriter {
    pub fn open(config: RotationConfig) -> Result<Self, IoError> {
        let active = ActiveFile::open(&config.path)?;
        Ok(Self {
            config,
            active: Some(active),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Appends one relayed line, timestamped like the original
    /// tool's `asctime levelname: message` records, flushing so the
    /// file stays durable if the host dies.
    pub fn write_line(&mut self, line: &LogLine) -> Result<(), IoError> {
        let level = match line {
            LogLine::Message(_) => "INFO",
            LogLine::Error(_) => "ERROR",
        };
        let entry = format!(
            "{} {level}: {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            line.as_str()
        );
        self.write_entry(&entry)
    }

    /// Replaces the rotation parameters. A no-op when nothing
    /// rotation-relevant changed, so unrelated preference saves don't
    /// churn the file handle; otherwise the old handle is flushed and
    /// fully closed before the replacement opens.
    pub fn reconfigure(&mut self, config: RotationConfig) -> Result<(), IoError> {
        if config == self.config {
            return Ok(());
        }
        if let Some(mut active) = self.active.take() {
            active.file.flush().path(&self.config.path)?;
            drop(active);
        }
        self.config = config;
        self.active = Some(ActiveFile::open(&self.config.path)?);
        Ok(())
    }

    fn write_entry(&mut self, entry: &str) -> Result<(), IoError> {
        if self.needs_rollover(entry.len() as u64) {
            self.rollover()?;
        }
        if self.active.is_none() {
            // Self-heal after a failed rollover or reconfigure left
            // the handler without a file.
            self.active = Some(ActiveFile::open(&self.config.path)?);
        }
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        active.file.write_all(entry.as_bytes()).path(&self.config.path)?;
        active.file.flush().path(&self.config.path)?;
        active.written += entry.len() as u64;
        Ok(())
    }

    fn needs_rollover(&self, incoming: u64) -> bool {
        let Some(active) = self.active.as_ref() else {
            return false;
        };
        match self.config.mode {
            RotationMode::Size { max_bytes } => {
                max_bytes > 0 && active.written + incoming > max_bytes
            }
            RotationMode::Daily => Local::now().date_naive() > active.opened_day,
        }
    }

    fn rollover(&mut self) -> Result<(), IoError> {
        if let Some(active) = self.active.take() {
            let closed_day = active.opened_day;
            // Close before renaming; Windows refuses to move an open
            // file.
            drop(active);
            self.archive_closed(closed_day)?;
        }
        self.active = Some(ActiveFile::open(&self.config.path)?);
        Ok(())
    }

    fn archive_closed(&self, closed_day: NaiveDate) -> Result<(), IoError> {
        let path = &self.config.path;
        match self.config.mode {
            RotationMode::Size { .. } => {
                if self.config.backup_count == 0 {
                    return std::fs::remove_file(path).path(path);
                }
                let oldest = numbered_backup(path, self.config.backup_count);
                if oldest.exists() {
                    std::fs::remove_file(&oldest).path(&oldest)?;
                }
                // Shift app.log.1 -> app.log.2 and so on; .1 is the
                // newest backup.
                for i in (1..self.config.backup_count).rev() {
                    let from = numbered_backup(path, i);
                    if from.exists() {
                        std::fs::rename(&from, numbered_backup(path, i + 1)).path(&from)?;
                    }
                }
                std::fs::rename(path, numbered_backup(path, 1)).path(path)?;
            }
            RotationMode::Daily => {
                std::fs::rename(path, dated_backup(path, closed_day)).path(path)?;
                self.prune_dated()?;
            }
        }
        Ok(())
    }

    fn prune_dated(&self) -> Result<(), IoError> {
        let Some(parent) = self.config.path.parent() else {
            return Ok(());
        };
        let Some(file_name) = self.config.path.file_name() else {
            return Ok(());
        };
        let prefix = format!("{}.", file_name.to_string_lossy());

        let mut dated = Vec::new();
        for entry in std::fs::read_dir(parent).path(parent)? {
            let entry = entry.path(parent)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(suffix) = name.strip_prefix(&prefix) {
                if NaiveDate::parse_from_str(suffix, "%Y-%m-%d").is_ok() {
                    dated.push(entry.path());
                }
            }
        }
        // ISO dates sort lexicographically, oldest first.
        dated.sort();
        while dated.len() > self.config.backup_count {
            let oldest = dated.remove(0);
            std::fs::remove_file(&oldest).path(&oldest)?;
        }
        Ok(())
    }
}

fn numbered_backup(path: &Path, i: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{i}"));
    PathBuf::from(name)
}

fn dated_backup(path: &Path, day: NaiveDate) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}", day.format("%Y-%m-%d")));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn size_config(path: PathBuf, max_bytes: u64, backup_count: usize) -> RotationConfig {
        RotationConfig {
            path,
            mode: RotationMode::Size { max_bytes },
            backup_count,
        }
    }

    #[test]
    fn effective_path_identity_when_not_daily() {
        let base = Path::new("/some/where/app.log");
        assert_eq!(effective_path(base, false).unwrap(), base);
    }

    #[test]
    fn effective_path_daily_uses_month_dir_and_date_suffix() {
        let dir = tempfile::TempDir::new().unwrap();
        let base = dir.path().join("app.log");
        let today = date("2026-08-29");

        let path = effective_path_on(&base, true, today).unwrap();
        assert_eq!(
            path,
            dir.path().join("2026-08").join("app-2026-08-29.log")
        );
        assert!(path.parent().unwrap().is_dir());

        // Idempotent on the same day.
        assert_eq!(effective_path_on(&base, true, today).unwrap(), path);
    }

    #[test]
    fn effective_path_daily_without_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let base = dir.path().join("applog");
        let path = effective_path_on(&base, true, date("2026-01-05")).unwrap();
        assert_eq!(path, dir.path().join("2026-01").join("applog-2026-01-05"));
    }

    #[test]
    fn size_rotation_keeps_at_most_backup_count() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let mut writer = RotatingWriter::open(size_config(path.clone(), 150, 2)).unwrap();

        for i in 0..5 {
            let payload = format!("line-{i}-{}", "x".repeat(100));
            writer.write_line(&LogLine::Message(payload)).unwrap();
        }

        assert!(path.exists());
        assert!(numbered_backup(&path, 1).exists());
        assert!(numbered_backup(&path, 2).exists());
        assert!(!numbered_backup(&path, 3).exists());

        // .1 is the newest backup, so it holds the line written just
        // before the active file's.
        let active = std::fs::read_to_string(&path).unwrap();
        let newest = std::fs::read_to_string(numbered_backup(&path, 1)).unwrap();
        assert!(active.contains("line-4"));
        assert!(newest.contains("line-3"));
    }

    #[test]
    fn size_rotation_with_zero_backups_discards_closed_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let mut writer = RotatingWriter::open(size_config(path.clone(), 100, 0)).unwrap();

        for i in 0..4 {
            let payload = format!("line-{i}-{}", "y".repeat(80));
            writer.write_line(&LogLine::Message(payload)).unwrap();
        }

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["app.log".to_owned()]);

        let active = std::fs::read_to_string(&path).unwrap();
        assert!(active.contains("line-3"));
        assert!(!active.contains("line-2"));
    }

    #[test]
    fn zero_max_bytes_never_rotates() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let mut writer = RotatingWriter::open(size_config(path.clone(), 0, 3)).unwrap();

        for i in 0..20 {
            writer
                .write_line(&LogLine::Message(format!("line-{i}")))
                .unwrap();
        }
        assert!(!numbered_backup(&path, 1).exists());
    }

    #[test]
    fn error_lines_are_written_with_error_level() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let mut writer = RotatingWriter::open(size_config(path.clone(), 0, 0)).unwrap();

        writer
            .write_line(&LogLine::Error("boom".to_owned()))
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("ERROR: boom"));
    }

    #[test]
    fn daily_rollover_archives_with_closed_day() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let config = RotationConfig {
            path: path.clone(),
            mode: RotationMode::Daily,
            backup_count: 2,
        };
        let mut writer = RotatingWriter::open(config).unwrap();
        writer
            .write_line(&LogLine::Message("old-day".to_owned()))
            .unwrap();

        // Pretend the file was opened yesterday.
        let yesterday = Local::now().date_naive().pred_opt().unwrap();
        writer.active.as_mut().unwrap().opened_day = yesterday;
        writer
            .write_line(&LogLine::Message("new-day".to_owned()))
            .unwrap();

        let archived = std::fs::read_to_string(dated_backup(&path, yesterday)).unwrap();
        assert!(archived.contains("old-day"));
        let active = std::fs::read_to_string(&path).unwrap();
        assert!(active.contains("new-day"));
        assert!(!active.contains("old-day"));
    }

    #[test]
    fn daily_backups_are_pruned_oldest_first() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let config = RotationConfig {
            path: path.clone(),
            mode: RotationMode::Daily,
            backup_count: 1,
        };
        let mut writer = RotatingWriter::open(config).unwrap();

        let today = Local::now().date_naive();
        let two_ago = today.pred_opt().unwrap().pred_opt().unwrap();
        let yesterday = today.pred_opt().unwrap();

        writer.write_line(&LogLine::Message("a".to_owned())).unwrap();
        writer.active.as_mut().unwrap().opened_day = two_ago;
        writer.write_line(&LogLine::Message("b".to_owned())).unwrap();
        writer.active.as_mut().unwrap().opened_day = yesterday;
        writer.write_line(&LogLine::Message("c".to_owned())).unwrap();

        assert!(!dated_backup(&path, two_ago).exists());
        assert!(dated_backup(&path, yesterday).exists());
    }

    #[test]
    fn reconfigure_switches_files_without_duplicates() {
        let dir = tempfile::TempDir::new().unwrap();
        let first = dir.path().join("first.log");
        let second = dir.path().join("second.log");
        let mut writer = RotatingWriter::open(size_config(first.clone(), 0, 1)).unwrap();

        writer
            .write_line(&LogLine::Message("before".to_owned()))
            .unwrap();
        writer
            .reconfigure(size_config(second.clone(), 0, 1))
            .unwrap();
        writer
            .write_line(&LogLine::Message("after".to_owned()))
            .unwrap();

        let a = std::fs::read_to_string(&first).unwrap();
        let b = std::fs::read_to_string(&second).unwrap();
        assert!(a.contains("before") && !a.contains("after"));
        assert!(b.contains("after") && !b.contains("before"));
    }

    #[test]
    fn reconfigure_with_unchanged_config_is_a_noop() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let config = size_config(path.clone(), 1024, 1);
        let mut writer = RotatingWriter::open(config.clone()).unwrap();

        writer.write_line(&LogLine::Message("one".to_owned())).unwrap();
        writer.reconfigure(config).unwrap();
        writer.write_line(&LogLine::Message("two".to_owned())).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("one") && content.contains("two"));
    }

    #[test]
    fn from_preferences_picks_mode() {
        let dir = tempfile::TempDir::new().unwrap();
        let prefs = Preferences {
            log_file: dir.path().join("app.log"),
            max_log_size: 2048,
            backup_count: 4,
            daily_rotation: None,
            ..Preferences::default()
        };

        let config = RotationConfig::from_preferences(&prefs).unwrap();
        assert_eq!(config.mode, RotationMode::Size { max_bytes: 2048 });
        assert_eq!(config.path, prefs.log_file);

        let daily = Preferences {
            daily_rotation: Some(true),
            ..prefs
        };
        let config = RotationConfig::from_preferences(&daily).unwrap();
        assert_eq!(config.mode, RotationMode::Daily);
        assert_ne!(config.path, daily.log_file);
    }
}
