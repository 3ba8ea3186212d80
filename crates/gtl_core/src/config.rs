use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    IntoIoError, IntoJsonError, JsonFileError, err, file_utils,
};

pub const DEFAULT_MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;
pub const DEFAULT_BACKUP_COUNT: usize = 3;

const PREFERENCES_FILE: &str = "GCloudTrayLogger_preferences.json";
const DEFAULT_LOG_FILE: &str = "gcloud_tray_logger.log";

/// User preferences stored in
/// `<config dir>/GCloudTrayLogger/GCloudTrayLogger_preferences.json`.
///
/// # Why `Option`?
///
/// Fields added after the first release are `Option`s so configs
/// written by older versions still deserialize; `None` is treated
/// as the default.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Preferences {
    /// GCP project whose logs get tailed, e.g. `my-project-12345`.
    pub default_project: String,
    /// Where the tailed output is written and rotated.
    pub log_file: PathBuf,
    /// Size-mode rotation threshold in bytes.
    pub max_log_size: u64,
    /// How many rotated backups to keep.
    pub backup_count: usize,
    /// Rotate by calendar day instead of by size, writing into a
    /// year-month directory with a date-stamped filename.
    // Since: v0.2
    pub daily_rotation: Option<bool>,
}

impl Preferences {
    /// Load preferences from disk, or write out and return defaults.
    ///
    /// Designed to *not* fail fast: a corrupt file is backed up to
    /// `.bak` and replaced with defaults (with an error log message).
    ///
    /// # Errors
    /// - if the user config directory can't be created or accessed
    pub fn load() -> Result<Self, JsonFileError> {
        let dir = file_utils::config_dir()?;
        let mut prefs = Self::load_from(&dir.join(PREFERENCES_FILE))?;
        prefs.normalize(&dir)?;
        Ok(prefs)
    }

    pub async fn save(&self) -> Result<(), JsonFileError> {
        let path = file_utils::config_dir()?.join(PREFERENCES_FILE);
        let config = serde_json::to_string_pretty(&self).json_to()?;

        tokio::fs::write(&path, config.as_bytes())
            .await
            .path(path)?;
        Ok(())
    }

    /// Whether `other` differs in any rotation-relevant field.
    /// A change to `default_project` alone doesn't require touching
    /// the log handler.
    #[must_use]
    pub fn rotation_changed(&self, other: &Self) -> bool {
        self.log_file != other.log_file
            || self.max_log_size != other.max_log_size
            || self.backup_count != other.backup_count
            || self.daily_rotation != other.daily_rotation
    }

    #[must_use]
    pub fn is_daily(&self) -> bool {
        self.daily_rotation.unwrap_or(false)
    }

    fn load_from(path: &Path) -> Result<Self, JsonFileError> {
        if !path.exists() {
            return Self::create(path);
        }

        let config = std::fs::read_to_string(path).path(path)?;
        match serde_json::from_str(&config) {
            Ok(prefs) => Ok(prefs),
            Err(err) => {
                err!(
                    "Invalid preferences file! This may be a sign of corruption.\nError: {err}"
                );
                let old_path = path.with_extension("json.bak");
                _ = std::fs::copy(path, &old_path);
                Self::create(path)
            }
        }
    }

    fn create(path: &Path) -> Result<Self, JsonFileError> {
        let prefs = Self::default();
        std::fs::write(
            path,
            serde_json::to_string_pretty(&prefs).json_to()?.as_bytes(),
        )
        .path(path)?;
        Ok(prefs)
    }

    /// Makes `log_file` absolute (anchored under the config dir) and
    /// ensures its parent directory exists, like the original tool
    /// did on every load.
    fn normalize(&mut self, config_dir: &Path) -> Result<(), JsonFileError> {
        if self.log_file.as_os_str().is_empty() {
            self.log_file = file_utils::logs_dir()?.join(DEFAULT_LOG_FILE);
        } else if self.log_file.is_relative() {
            self.log_file = config_dir.join(&self.log_file);
        }
        if let Some(parent) = self.log_file.parent() {
            std::fs::create_dir_all(parent).path(parent)?;
        }
        Ok(())
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_project: std::env::var("GCLOUD_PROJECT")
                .unwrap_or_else(|_| "your-project-id".to_owned()),
            log_file: PathBuf::from("logs").join(DEFAULT_LOG_FILE),
            max_log_size: DEFAULT_MAX_LOG_SIZE,
            backup_count: DEFAULT_BACKUP_COUNT,
            daily_rotation: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_creates_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(PREFERENCES_FILE);

        let prefs = Preferences::load_from(&path).unwrap();
        assert_eq!(prefs.max_log_size, DEFAULT_MAX_LOG_SIZE);
        assert_eq!(prefs.backup_count, DEFAULT_BACKUP_COUNT);
        assert!(path.exists());

        // A second load round-trips the file we just wrote.
        let again = Preferences::load_from(&path).unwrap();
        assert_eq!(again, prefs);
    }

    #[test]
    fn corrupt_file_is_backed_up_and_reset() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(PREFERENCES_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        let prefs = Preferences::load_from(&path).unwrap();
        assert_eq!(prefs.backup_count, DEFAULT_BACKUP_COUNT);
        assert!(path.with_extension("json.bak").exists());
    }

    #[test]
    fn missing_daily_flag_defaults_off() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(PREFERENCES_FILE);
        // Config written by a version that predates daily_rotation.
        std::fs::write(
            &path,
            r#"{
                "default_project": "p",
                "log_file": "logs/out.log",
                "max_log_size": 1024,
                "backup_count": 2
            }"#,
        )
        .unwrap();

        let prefs = Preferences::load_from(&path).unwrap();
        assert_eq!(prefs.daily_rotation, None);
        assert!(!prefs.is_daily());
    }

    #[test]
    fn normalize_anchors_relative_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut prefs = Preferences {
            log_file: PathBuf::from("logs").join("out.log"),
            ..Preferences::default()
        };
        prefs.normalize(dir.path()).unwrap();
        assert!(prefs.log_file.is_absolute());
        assert!(prefs.log_file.parent().unwrap().is_dir());
    }

    #[test]
    fn rotation_changed_ignores_project() {
        let a = Preferences::default();
        let mut b = a.clone();
        b.default_project = "other-project".to_owned();
        assert!(!a.rotation_changed(&b));

        b.max_log_size = 1;
        assert!(a.rotation_changed(&b));
    }
}
