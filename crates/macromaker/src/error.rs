//! Library errors
//!
//! Only I/O and structural failures surface here. Bad individual events and
//! unresolvable labels are dropped or skipped where they occur.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid JSON: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} is not a macro file: {reason}", .path.display())]
    Format { path: PathBuf, reason: String },

    #[error("{} has unsupported macro version {version}", .path.display())]
    UnsupportedVersion { path: PathBuf, version: String },

    #[error("input hook unavailable: {0}")]
    Hook(String),

    #[error("input injection failed: {0}")]
    Injection(String),

    #[error("HOME not set and MACROMAKER_HOME not given")]
    NoHome,
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
