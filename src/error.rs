//! Centralized error types for compose-hook
//!
//! Uses thiserror for typed errors that can be matched on,
//! while still being compatible with anyhow for propagation.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Top-level error type for hook operations
#[derive(Error, Debug)]
pub enum HookError {
    #[error(transparent)]
    RefUpdate(#[from] RefUpdateError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Ref update input errors
#[derive(Error, Debug)]
pub enum RefUpdateError {
    #[error("invalid pre-receive line: expected 3 fields, got {fields}")]
    InvalidLine { fields: usize },

    #[error("please run no args for stdin or args old new ref")]
    InvalidArgs,

    #[error("failed to read ref updates from stdin: {0}")]
    Read(#[source] std::io::Error),
}

/// Deployment configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{branch}: no project name")]
    MissingProject { branch: String },
}

/// Workspace materialization errors
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("failed to create temp directory: {0}")]
    TempRoot(#[source] std::io::Error),

    #[error("invalid commit hash: {hash:?}")]
    InvalidHash { hash: String },

    #[error("failed to create workspace {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk workspace {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to reset file times of {path}: {source}")]
    Timestamps {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Subprocess errors
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed: {status}")]
    Exit { command: String, status: ExitStatus },
}
