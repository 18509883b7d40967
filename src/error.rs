//! Error handling for the Boost backend
//!
//! Malformed scripts and headers are not errors: the codec returns the invalid
//! variant for those. The variants here cover caller preconditions, bad
//! submissions from workers and the ambient I/O of the binary.

use thiserror::Error;

/// Result type alias for Boost operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Boost backend
#[derive(Error, Debug)]
pub enum Error {
    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Target validation errors
    #[error("Invalid target: {message}")]
    Target { message: String },

    /// Script construction errors
    #[error("Script error: {message}")]
    Script { message: String },

    /// Job derivation errors
    #[error("Job error: {message}")]
    Job { message: String },

    /// A submitted solution does not satisfy its puzzle
    #[error("Invalid solution for job {id}: {message}")]
    InvalidSolution { id: String, message: String },

    /// The job is not tracked
    #[error("Unknown job: {id}")]
    UnknownJob { id: String },

    /// Logic whose algorithm has not been settled yet
    #[error("Not implemented: {operation}")]
    NotImplemented { operation: String },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a target error
    pub fn target(message: impl Into<String>) -> Self {
        Self::Target {
            message: message.into(),
        }
    }

    /// Create a script error
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Create a job error
    pub fn job(message: impl Into<String>) -> Self {
        Self::Job {
            message: message.into(),
        }
    }

    /// Create an invalid solution error
    pub fn invalid_solution(id: impl ToString, message: impl Into<String>) -> Self {
        Self::InvalidSolution {
            id: id.to_string(),
            message: message.into(),
        }
    }

    /// Create an unknown job error
    pub fn unknown_job(id: impl ToString) -> Self {
        Self::UnknownJob { id: id.to_string() }
    }

    /// Create a not-implemented error
    pub fn not_implemented(operation: impl Into<String>) -> Self {
        Self::NotImplemented {
            operation: operation.into(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Io(_) => "io",
            Error::Config { .. } => "config",
            Error::Target { .. } => "target",
            Error::Script { .. } => "script",
            Error::Job { .. } => "job",
            Error::InvalidSolution { .. } => "invalid_solution",
            Error::UnknownJob { .. } => "unknown_job",
            Error::NotImplemented { .. } => "not_implemented",
        }
    }
}
