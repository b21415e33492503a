// mirror-guard: Snapshot & anomaly protection for mirrored git repositories
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Error handling module.
//!
//! ```text
//!                GuardError (~24 bytes)
//!                       |
//!   +--------+-------+--+-----+--------+-------+------+
//!   |        |       |        |        |       |      |
//!   v        v       v        v        v       v      v
//! Bailed  Config  Process  RepoOps  Snapshot Archive  Fs / Io / Other
//!          Box     Box      Box      Box      Box     Box
//!
//! Severity (what the caller does with it):
//!   Warning     log, keep going
//!   Repository  abort this repository's pipeline, continue the run
//!   Run         abort the run (startup validation only)
//! ```
//!
//! All variants boxed => `GuardError` fits in 24 bytes.

use thiserror::Error;

/// Convenience alias for `anyhow::Result`.
pub type Result<T> = anyhow::Result<T>;

/// Result type using [`GuardError`].
pub type GuardResult<T> = std::result::Result<T, GuardError>;

/// How far a failure propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Logged; the current step continues with a default value.
    Warning,
    /// The current repository's pipeline stops; the run continues.
    Repository,
    /// The whole run stops before any repository is touched.
    Run,
}

impl Severity {
    /// Short label used in log fields and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Repository => "repository",
            Self::Run => "run",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level application error type.
///
/// All sub-errors are boxed to keep this enum at ~24 bytes on the stack.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Fatal error that should terminate the run.
    #[error("fatal error: {0}")]
    Bailed(Box<str>),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] Box<ConfigError>),

    /// External process error.
    #[error("process error: {0}")]
    Process(#[from] Box<ProcessError>),

    /// Repository operation error (commit count, bundle export, ...).
    #[error("repository operation error: {0}")]
    RepoOps(#[from] Box<RepoOpsError>),

    /// Snapshot creation error.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] Box<SnapshotError>),

    /// Monthly archive error.
    #[error("archive error: {0}")]
    Archive(#[from] Box<ArchiveError>),

    /// Filesystem error.
    #[error("filesystem error: {0}")]
    Fs(#[from] Box<FsError>),

    /// I/O error.
    #[error("io error: {0}")]
    Io(Box<std::io::Error>),

    /// Generic error with message.
    #[error("{0}")]
    Other(Box<str>),
}

/// Create a fatal [`GuardError::Bailed`] that terminates the run.
pub fn bail_out(message: impl Into<String>) -> GuardError {
    GuardError::Bailed(message.into().into_boxed_str())
}

impl GuardError {
    /// Classifies how far this error propagates.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::Bailed(_) | Self::Config(_) => Severity::Run,
            Self::Snapshot(_) | Self::Fs(_) | Self::Io(_) | Self::Other(_) => {
                Severity::Repository
            }
            Self::Process(_) | Self::RepoOps(_) | Self::Archive(_) => Severity::Warning,
        }
    }

    /// Returns true if the error was caused by a process timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Process(err) => matches!(**err, ProcessError::Timeout { .. }),
            Self::RepoOps(err) => matches!(
                &**err,
                RepoOpsError::Process(ProcessError::Timeout { .. })
            ),
            _ => false,
        }
    }
}

// --- From implementations for boxing ---

/// Macro to generate `From` implementations that box the source error.
macro_rules! impl_from_boxed {
    ($($error:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$error> for GuardError {
                fn from(err: $error) -> Self {
                    GuardError::$variant(Box::new(err))
                }
            }
        )+
    };
}

impl_from_boxed! {
    ConfigError => Config,
    ProcessError => Process,
    RepoOpsError => RepoOps,
    SnapshotError => Snapshot,
    ArchiveError => Archive,
    FsError => Fs,
    std::io::Error => Io,
}

// --- Config Errors ---

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse configuration sources.
    #[error("failed to load configuration: {message}")]
    ParseError { message: String },

    /// Missing required configuration key.
    #[error("missing required config key '{key}' in section '[{section}]'")]
    MissingKey { section: String, key: String },

    /// Invalid configuration value.
    #[error("invalid value for '{key}' in section '[{section}]': {message}")]
    InvalidValue {
        section: String,
        key: String,
        message: String,
    },

    /// A configured path does not exist.
    #[error("path for '{key}' in section '[{section}]' does not exist: {path}")]
    PathNotFound {
        section: String,
        key: String,
        path: String,
    },

    /// Several validation problems at once.
    #[error("{} configuration problem(s): {}", .0.len(), join_errors(.0))]
    Invalid(Vec<Self>),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// --- Process Errors ---

/// Process execution errors.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Executable not found in PATH.
    #[error("executable not found: '{name}' (not in PATH)")]
    ExecutableNotFound { name: String },

    /// Failed to spawn process.
    #[error("failed to spawn process '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Process exited with non-zero status.
    #[error("process '{command}' exited with code {code}: {stderr}")]
    NonZeroExit {
        command: String,
        code: i32,
        stderr: String,
    },

    /// Process timed out.
    #[error("process '{command}' timed out after {timeout_secs} seconds")]
    Timeout { command: String, timeout_secs: u64 },

    /// Failed to read process output or wait for it.
    #[error("failed to read output from process '{command}': {message}")]
    OutputError { command: String, message: String },
}

// --- Repository operation Errors ---

/// Errors from the repository operations boundary.
#[derive(Debug, Error)]
pub enum RepoOpsError {
    /// The underlying process failed.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The command succeeded but its output made no sense.
    #[error("unexpected output from '{command}': {output}")]
    UnexpectedOutput { command: String, output: String },

    /// The container is not running.
    #[error("container '{container}' is not running")]
    ContainerNotRunning { container: String },

    /// Tree copy failed.
    #[error("failed to copy {src} to {dst}: {source}")]
    CopyFailed {
        src: String,
        dst: String,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem walk failed.
    #[error("failed to measure {path}: {message}")]
    SizeFailed { path: String, message: String },
}

// --- Snapshot Errors ---

/// Snapshot creation errors. Always fatal for the repository's run.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot root could not be created.
    #[error("failed to create snapshot directory {path}: {source}")]
    DirectoryFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Both the hardlink copy and the full-copy fallback failed.
    #[error("snapshot of {repo} failed: {source}")]
    CopyFailed {
        repo: String,
        #[source]
        source: RepoOpsError,
    },

    /// Writing the metadata record failed.
    #[error("failed to write snapshot metadata {path}: {source}")]
    MetadataFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// --- Archive Errors ---

/// Monthly archive errors.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The bundle export failed.
    #[error("bundle export for {repo} failed: {source}")]
    ExportFailed {
        repo: String,
        #[source]
        source: RepoOpsError,
    },

    /// Persisting the finished bundle failed.
    #[error("failed to persist archive {path}: {source}")]
    PersistFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// --- Filesystem Errors ---

/// Filesystem operation errors.
#[derive(Debug, Error)]
pub enum FsError {
    /// Path not found.
    #[error("path not found: {0}")]
    NotFound(String),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// General I/O error.
    #[error("I/O error on '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FsError {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        let path = path.display().to_string();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::IoError { path, source },
        }
    }
}

#[cfg(test)]
mod tests;
