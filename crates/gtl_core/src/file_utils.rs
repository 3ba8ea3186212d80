//! Paths and small filesystem helpers.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{APP_DIR_NAME, IntoIoError, IoError};

/// Returns `<platform config dir>/GCloudTrayLogger`, creating it if
/// missing. Preferences live here; logs default to a subdirectory.
pub fn config_dir() -> Result<PathBuf, IoError> {
    let dir = dirs::config_dir()
        .ok_or(IoError::ConfigDirNotFound)?
        .join(APP_DIR_NAME);
    std::fs::create_dir_all(&dir).path(&dir)?;
    Ok(dir)
}

/// Returns the default logs directory (`<config_dir>/logs`),
/// creating it if missing.
pub fn logs_dir() -> Result<PathBuf, IoError> {
    let dir = config_dir()?.join("logs");
    std::fs::create_dir_all(&dir).path(&dir)?;
    Ok(dir)
}

/// Opens a file with the platform's default viewer
/// (`open` / `explorer` / `xdg-open`).
pub fn open_in_default_viewer(path: &Path) -> Result<(), IoError> {
    let program = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    };
    Command::new(program).arg(path).spawn().path(path)?;
    Ok(())
}
