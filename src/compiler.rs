//! # Compiler Collaborator
//!
//! Runs the Clue binary and interprets its version check:
//! - **Invocation**: `<binary> -D <target>` with the configured environment overlay
//! - **Version check**: `<binary> -V`, expected to print `clue <major>.<minor>.<patch>[-<pre>][+<build>]`
//! - **Availability**: derived from the version check, gating every reconciliation

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;
use tower_lsp::async_trait;

use crate::config::Settings;
use crate::error::{CompilerError, VersionError};
use crate::scope::Scope;

/// Oldest supported release line: major 3, minor 2 or newer.
pub const MINIMUM_MAJOR: u64 = 3;
pub const MINIMUM_MINOR: u64 = 2;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^clue (\d+)\.(\d+)\.(\d+)(?:-([0-9A-Za-z.-]+))?(?:\+([0-9A-Za-z.-]+))?$")
        .expect("Compiler: regex failure")
});

/// The captured result of one compiler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub target: PathBuf,
    pub is_directory: bool,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl Invocation {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn status_text(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Abstraction over the compiler binary so the pipeline can run against a fake.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Compiles `scope` and captures both output streams.
    async fn compile(&self, settings: &Settings, scope: &Scope) -> Result<Invocation, CompilerError>;

    /// Runs the version check and returns its raw stdout.
    async fn version(&self, settings: &Settings) -> Result<String, CompilerError>;
}

/// The real compiler, launched as a child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClueCompiler;

impl ClueCompiler {
    fn command(settings: &Settings) -> Command {
        let mut cmd = Command::new(&settings.binary);
        cmd.envs(&settings.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Compiler for ClueCompiler {
    async fn compile(&self, settings: &Settings, scope: &Scope) -> Result<Invocation, CompilerError> {
        let output = Self::command(settings)
            .arg("-D")
            .arg(&scope.path)
            .output()
            .await
            .map_err(|source| CompilerError::Spawn {
                binary: settings.binary.clone(),
                source,
            })?;

        Ok(Invocation {
            target: scope.path.clone(),
            is_directory: scope.is_directory,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }

    async fn version(&self, settings: &Settings) -> Result<String, CompilerError> {
        let output = Self::command(settings)
            .arg("-V")
            .output()
            .await
            .map_err(|source| CompilerError::Spawn {
                binary: settings.binary.clone(),
                source,
            })?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// A parsed `clue x.y.z[-pre][+build]` version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClueVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
    pub build: Option<String>,
}

impl ClueVersion {
    pub fn parse(output: &str) -> Result<Self, VersionError> {
        let trimmed = output.trim();
        let malformed = || VersionError::Malformed(trimmed.to_string());
        let caps = VERSION_RE.captures(trimmed).ok_or_else(malformed)?;
        let number = |i: usize| -> Result<u64, VersionError> {
            caps.get(i)
                .and_then(|m| m.as_str().parse().ok())
                .ok_or_else(malformed)
        };
        Ok(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            pre: caps.get(4).map(|m| m.as_str().to_string()),
            build: caps.get(5).map(|m| m.as_str().to_string()),
        })
    }

    pub fn is_supported(&self) -> bool {
        self.major == MINIMUM_MAJOR && self.minor >= MINIMUM_MINOR
    }
}

impl fmt::Display for ClueVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

/// Whether reconciliation may run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CompilerAvailability {
    #[default]
    Unknown,
    Available(ClueVersion),
    Unavailable(VersionError),
}

impl CompilerAvailability {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Derives availability from the raw output of a version check.
    pub fn from_version_output(output: &str) -> Self {
        match ClueVersion::parse(output) {
            Ok(version) if version.is_supported() => Self::Available(version),
            Ok(version) => Self::Unavailable(VersionError::Unsupported {
                found: version.to_string(),
                minimum: format!("{MINIMUM_MAJOR}.{MINIMUM_MINOR}.0"),
            }),
            Err(err) => Self::Unavailable(err),
        }
    }
}

/// Runs the version check with `settings` and classifies the result.
pub async fn check_version(compiler: &dyn Compiler, settings: &Settings) -> CompilerAvailability {
    match compiler.version(settings).await {
        Ok(output) => CompilerAvailability::from_version_output(&output),
        Err(err) => CompilerAvailability::Unavailable(VersionError::Missing {
            binary: settings.binary.clone(),
            reason: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_version_policy() {
        assert!(!CompilerAvailability::from_version_output("clue 3.1.9").is_available());
        assert!(CompilerAvailability::from_version_output("clue 3.2.0-beta\n").is_available());
        assert!(CompilerAvailability::from_version_output("clue 3.10.2+abc.1").is_available());
        assert!(!CompilerAvailability::from_version_output("clue 4.0.0").is_available());
        assert!(!CompilerAvailability::from_version_output("clue 2.9.0").is_available());
    }

    #[test]
    fn malformed_output_is_unavailable() {
        assert_eq!(
            CompilerAvailability::from_version_output("command not found"),
            CompilerAvailability::Unavailable(VersionError::Malformed("command not found".to_string()))
        );
        assert!(!CompilerAvailability::from_version_output("clue 3.2").is_available());
    }

    #[test]
    fn unsupported_reports_found_version() {
        let availability = CompilerAvailability::from_version_output("clue 3.1.9");
        assert_eq!(
            availability,
            CompilerAvailability::Unavailable(VersionError::Unsupported {
                found: "3.1.9".to_string(),
                minimum: "3.2.0".to_string(),
            })
        );
    }

    #[test]
    fn version_round_trips_through_display() {
        let version = ClueVersion::parse("clue 3.2.1-rc.1+build.7").expect("valid version");
        assert_eq!(version.pre.as_deref(), Some("rc.1"));
        assert_eq!(version.build.as_deref(), Some("build.7"));
        assert_eq!(version.to_string(), "3.2.1-rc.1+build.7");
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let settings = Settings {
            binary: "/definitely/not/a/clue/binary".to_string(),
            ..Settings::default()
        };
        let availability = check_version(&ClueCompiler, &settings).await;
        assert!(matches!(
            availability,
            CompilerAvailability::Unavailable(VersionError::Missing { .. })
        ));
    }
}
