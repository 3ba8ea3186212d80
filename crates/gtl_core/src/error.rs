use std::path::PathBuf;

use thiserror::Error;

/// An IO error that remembers which path it happened at.
///
/// Raw [`std::io::Error`]s don't tell you *where* something went
/// wrong, which makes "permission denied" reports useless. Attach
/// the path with [`IntoIoError::path`]:
///
/// ```no_run
/// use gtl_core::IntoIoError;
///
/// # fn f() -> Result<(), gtl_core::IoError> {
/// let path = std::path::Path::new("prefs.json");
/// let text = std::fs::read_to_string(path).path(path)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Error, Clone)]
pub enum IoError {
    #[error("at path: {path:?}\n{error}")]
    Io { error: String, path: PathBuf },
    #[error("couldn't find the user config directory")]
    ConfigDirNotFound,
}

pub trait IntoIoError<T> {
    fn path(self, path: impl Into<PathBuf>) -> Result<T, IoError>;
}

impl<T> IntoIoError<T> for Result<T, std::io::Error> {
    fn path(self, path: impl Into<PathBuf>) -> Result<T, IoError> {
        self.map_err(|error| IoError::Io {
            error: error.to_string(),
            path: path.into(),
        })
    }
}

#[derive(Debug, Error)]
pub enum JsonError {
    #[error("couldn't serialize json:\n{0}")]
    To(serde_json::Error),
    #[error("couldn't deserialize json:\n{0}")]
    From(serde_json::Error),
}

pub trait IntoJsonError<T> {
    fn json_to(self) -> Result<T, JsonError>;
    fn json_from(self) -> Result<T, JsonError>;
}

impl<T> IntoJsonError<T> for Result<T, serde_json::Error> {
    fn json_to(self) -> Result<T, JsonError> {
        self.map_err(JsonError::To)
    }

    fn json_from(self) -> Result<T, JsonError> {
        self.map_err(JsonError::From)
    }
}

/// Either of the two things that can go wrong with a JSON file
/// on disk.
#[derive(Debug, Error)]
pub enum JsonFileError {
    #[error("{0}")]
    SerdeError(#[from] JsonError),
    #[error("{0}")]
    Io(#[from] IoError),
}

/// Flattens any displayable error into a `String`, for callers
/// that only want to show the message (status bars, tests).
pub trait IntoStringError<T> {
    fn strerr(self) -> Result<T, String>;
}

impl<T, E: std::fmt::Display> IntoStringError<T> for Result<T, E> {
    fn strerr(self) -> Result<T, String> {
        self.map_err(|err| err.to_string())
    }
}
