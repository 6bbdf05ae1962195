//! Common error types used throughout vidpress.
//!
//! Per-job failures (tool errors, missing inputs) end up inside a job's
//! outcome. Only [`Error::Prerequisite`] is meant to abort a whole batch.

use std::path::PathBuf;

/// Common error type for vidpress.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A directory shared by the batch could not be prepared.
    #[error("Cannot prepare {}: {source}", path.display())]
    Prerequisite {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An external tool (ffmpeg) failed or could not be started.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// The input file does not exist.
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// An upload form was malformed or incomplete.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An uploaded file could not be staged for processing.
    #[error("Staging error: {0}")]
    Staging(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new Prerequisite error.
    pub fn prerequisite(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Prerequisite {
            path: path.into(),
            source,
        }
    }

    /// Create a new Tool error.
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a new FileNotFound error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Staging error.
    pub fn staging<S: Into<String>>(msg: S) -> Self {
        Self::Staging(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Map this error to an HTTP status code for the upload front end.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidInput(_) => 400,
            Error::FileNotFound { .. }
            | Error::Tool { .. }
            | Error::Prerequisite { .. }
            | Error::Staging(_)
            | Error::Internal(_) => 500,
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::tool("ffmpeg", "exited with status 1");
        assert_eq!(err.to_string(), "Tool error [ffmpeg]: exited with status 1");

        let err = Error::file_not_found("/videos/missing.mp4");
        assert_eq!(err.to_string(), "File not found: /videos/missing.mp4");

        let err = Error::invalid_input("no file uploaded");
        assert_eq!(err.to_string(), "Invalid input: no file uploaded");

        let err = Error::staging("disk full");
        assert_eq!(err.to_string(), "Staging error: disk full");

        let err = Error::internal("unexpected state");
        assert_eq!(err.to_string(), "Internal error: unexpected state");
    }

    #[test]
    fn test_prerequisite_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::prerequisite("/root/out", io_err);
        assert_eq!(err.to_string(), "Cannot prepare /root/out: denied");
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn test_http_status() {
        assert_eq!(Error::invalid_input("x").http_status(), 400);
        assert_eq!(Error::file_not_found("a.mp4").http_status(), 500);
        assert_eq!(Error::tool("ffmpeg", "boom").http_status(), 500);
        assert_eq!(Error::staging("copy failed").http_status(), 500);
    }
}
