//! Error types shared across the diagnostics pipeline.

use std::path::PathBuf;

use url::Url;

/// Failure to obtain a file's text for range resolution.
#[derive(Debug, thiserror::Error)]
pub enum TextSourceError {
    #[error("cannot convert {uri} to a file path")]
    NotAFile { uri: Url },
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to run the compiler process at all.
#[derive(Debug, thiserror::Error)]
pub enum CompilerError {
    #[error("failed to launch `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a version check did not yield a usable compiler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("`{binary}` could not be run: {reason}")]
    Missing { binary: String, reason: String },
    #[error("unrecognized version output: {0:?}")]
    Malformed(String),
    #[error("Clue {found} is not supported, {minimum} or newer is required")]
    Unsupported { found: String, minimum: String },
}

/// Cycle-level failures of one reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("compiler is unavailable")]
    Unavailable,
    #[error("compiler failed ({status}) without a recognizable error:\n{}", failure_summary(.stdout, .stderr))]
    UnrecognizedFailure {
        status: String,
        stdout: String,
        stderr: String,
    },
    #[error(transparent)]
    Compiler(#[from] CompilerError),
}

impl ReconcileError {
    pub(crate) fn unrecognized(status: String, stdout: &str, stderr: &str) -> Self {
        Self::UnrecognizedFailure {
            status,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }
}

/// The stream shown to the user: stderr, or stdout when stderr is empty.
fn failure_summary<'a>(stdout: &'a str, stderr: &'a str) -> &'a str {
    let output = if stderr.trim().is_empty() { stdout } else { stderr };
    output.trim_end()
}
