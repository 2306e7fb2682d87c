//! Error types shared across Smear crates.

use std::path::PathBuf;

/// Top-level error type for Smear operations.
///
/// A user-requested stop is deliberately not represented here; it is a
/// distinct terminal outcome of a render, not an error.
#[derive(Debug, thiserror::Error)]
pub enum SmearError {
    /// An explicitly supplied config path does not exist or cannot be read.
    /// Fatal for the job it was supplied for, never for the whole queue.
    #[error("Config error: {message}")]
    Config { message: String },

    /// The input could not be probed or contains no video stream.
    /// The job is skipped and never queued.
    #[error("Probe error: {message}")]
    Probe { message: String },

    /// The settings snapshot could not be turned into the producer's blob.
    /// Raised before any process is spawned.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// The OS failed to create a child process.
    #[error("Failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    /// A child process exited nonzero. Carries the buffered diagnostic text.
    #[error("{program} exited with status {status}: {diagnostics}")]
    ProcessExit {
        program: String,
        status: i32,
        diagnostics: String,
    },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SmearError.
pub type SmearResult<T> = Result<T, SmearError>;

impl SmearError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe {
            message: msg.into(),
        }
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    pub fn spawn(program: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Spawn {
            program: program.into(),
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }
}
