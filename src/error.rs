//! Unified error type hierarchy for the build driver
//!
//! Two error kinds exist: `ConfigError` (a precondition on the options is violated,
//! always detected before any external process runs) and `BuildError` (an external
//! tool failed or could not be located). `AppError` wraps both for the driver.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration resolution, matrix and scheduling errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("--{option} is required: {reason}")]
    MissingOption { option: String, reason: String },

    /// Several options missing for the same precondition; every one of them is named.
    #[error("{context} canceled due to missing required arguments: {}", format_options(.options))]
    MissingOptions { context: String, options: Vec<String> },

    #[error("--{option} '{}' is invalid: {reason}", .path.display())]
    InvalidPath {
        option: String,
        path: PathBuf,
        reason: String,
    },

    #[error("--{option} has invalid value '{value}': {reason}")]
    InvalidValue {
        option: String,
        value: String,
        reason: String,
    },

    #[error("conflicting options {}: {reason}", format_options(.options))]
    Conflict { options: Vec<String>, reason: String },

    #[error("invalid phase order: {0}")]
    PhaseOrder(String),

    #[error("cannot expand argument file '{}': {reason}", .path.display())]
    ArgFile { path: PathBuf, reason: String },

    #[error("argument {position} is not valid UTF-8: '{lossy}'")]
    NonUtf8Argument { position: usize, lossy: String },
}

impl ConfigError {
    pub fn missing(option: &str, reason: impl Into<String>) -> Self {
        ConfigError::MissingOption {
            option: option.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_path(option: &str, path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidPath {
            option: option.to_string(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_value(option: &str, value: impl ToString, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            option: option.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn conflict(options: &[&str], reason: impl Into<String>) -> Self {
        ConfigError::Conflict {
            options: options.iter().map(|o| o.to_string()).collect(),
            reason: reason.into(),
        }
    }

    /// Option names blamed by this error.
    pub fn options(&self) -> Vec<&str> {
        match self {
            ConfigError::MissingOption { option, .. }
            | ConfigError::InvalidPath { option, .. }
            | ConfigError::InvalidValue { option, .. } => vec![option.as_str()],
            ConfigError::MissingOptions { options, .. } | ConfigError::Conflict { options, .. } => {
                options.iter().map(String::as_str).collect()
            }
            ConfigError::PhaseOrder(_)
            | ConfigError::ArgFile { .. }
            | ConfigError::NonUtf8Argument { .. } => Vec::new(),
        }
    }
}

fn format_options(options: &[String]) -> String {
    options
        .iter()
        .map(|o| format!("--{}", o))
        .collect::<Vec<_>>()
        .join(", ")
}

/// External tool execution errors.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("command failed with {status}: {command}")]
    InvocationFailed { command: String, status: String },

    #[error("failed to resolve executable path for '{program}': {command}")]
    ToolNotFound { program: String, command: String },

    #[error("failed to start '{command}': {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("command exceeded {seconds}s timeout: {command}")]
    TimedOut { command: String, seconds: u64 },

    #[error("IO error during build: {0}")]
    Io(#[from] io::Error),
}

impl BuildError {
    /// The failing command line, when the error originates from an invocation.
    pub fn command(&self) -> Option<&str> {
        match self {
            BuildError::InvocationFailed { command, .. }
            | BuildError::SpawnFailed { command, .. }
            | BuildError::TimedOut { command, .. }
            | BuildError::ToolNotFound { command, .. } => Some(command),
            BuildError::Io(_) => None,
        }
    }
}

/// Top-level driver error.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

impl AppError {
    /// Single-line diagnostic for the operator.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(e) => format!("Configuration error: {}", e),
            AppError::Build(e) => format!("Build failed: {}", e),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
