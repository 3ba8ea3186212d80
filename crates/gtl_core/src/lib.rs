//! # Shared plumbing for GCloud Tray Logger
//!
//! This crate holds everything the tailing core and the front-end
//! both need:
//!
//! - Error types with path context ([`IoError`], [`JsonFileError`])
//! - Terminal print macros ([`info!`], [`err!`], [`pt!`])
//! - User preferences ([`Preferences`])
//! - The output sink abstraction ([`OutputSink`], [`LogLine`],
//!   [`ChannelSink`])
//! - Config/logs directory helpers ([`file_utils`])

mod config;
mod error;
pub mod file_utils;
pub mod print;
mod sink;

pub use config::{DEFAULT_BACKUP_COUNT, DEFAULT_MAX_LOG_SIZE, Preferences};
pub use error::{
    IntoIoError, IntoJsonError, IntoStringError, IoError, JsonError, JsonFileError,
};
pub use sink::{ChannelSink, LogLine, OutputSink};

/// Directory name under the platform config dir, shared by
/// preferences and the default logs location.
pub const APP_DIR_NAME: &str = "GCloudTrayLogger";
