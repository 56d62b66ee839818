//! Error types for azf-bundler.
//!
//! Every failure the packager can surface is a variant of [`Error`]. Variants
//! carry enough context (paths, violations, bundler messages) to render an
//! actionable message without consulting logs.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::bundler::Message;
use crate::config::Violation;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while loading configuration, preparing a build or running the bundler.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration value failed validation.
    #[error(transparent)]
    InvalidConfig(#[from] InvalidConfigError),

    /// The configured project root is missing or not a directory.
    #[error("The project directory \"{}\" could not be found.", .0.display())]
    ProjectDirectoryNotFound(PathBuf),

    /// Discovery found nothing and no explicit entry points were supplied.
    #[error(
        "The project directory \"{}\" did not contain any entry points and none were supplied.\n\nHint: Make sure your project contains at least one index.ts file or supply entry points manually through config.entryPoints.",
        .0.display()
    )]
    NoEntryPoints(PathBuf),

    /// A file system operation failed.
    #[error("An error occurred while accessing \"{}\": {}.", .path.display(), error_code(.source))]
    FileSystem {
        /// Path that was being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON.
    #[error("The config file \"{}\" does not contain valid JSON.", .path.display())]
    InvalidJson {
        /// Path of the config file
        path: PathBuf,
        /// Parser error
        #[source]
        source: serde_json::Error,
    },

    /// The bundler finished with errors.
    #[error("Build failed with {} error(s):{}", .errors.len(), format_messages(.errors))]
    BuildFailed {
        /// Errors reported by the bundler or a plugin
        errors: Vec<Message>,
    },

    /// `bundlerOptions` could not be merged into typed build options.
    #[error("Invalid bundlerOptions: {0}\n\nHint: Check the option names and value types against the esbuild documentation")]
    InvalidBundlerOptions(#[source] serde_json::Error),

    /// No esbuild executable could be located.
    #[error(
        "esbuild executable not found\n\nHint: Install it with 'npm install --save-dev esbuild', put it on PATH, or set AZF_ESBUILD_PATH"
    )]
    EsbuildNotFound,

    /// The esbuild process could not be run.
    #[error("Failed to run esbuild at {}: {source}", .program.display())]
    Esbuild {
        /// Executable that was spawned
        program: PathBuf,
        /// Spawn or wait error
        #[source]
        source: std::io::Error,
    },

    /// A glob pattern could not be compiled.
    #[error("Invalid glob pattern '{pattern}': {message}")]
    Glob {
        /// The offending pattern
        pattern: String,
        /// Parser message
        message: String,
    },

    /// The file watcher could not be started.
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl Error {
    /// Wrap an I/O error with the path it concerns.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileSystem {
            path: path.into(),
            source,
        }
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::ProjectDirectoryNotFound(_) => "PROJECT_DIR_NOT_FOUND",
            Error::NoEntryPoints(_) => "NO_ENTRY_POINTS",
            Error::FileSystem { .. } => "FILE_SYSTEM",
            Error::InvalidJson { .. } => "INVALID_JSON",
            Error::BuildFailed { .. } => "BUILD_FAILED",
            Error::InvalidBundlerOptions(_) => "INVALID_BUNDLER_OPTIONS",
            Error::EsbuildNotFound => "ESBUILD_NOT_FOUND",
            Error::Esbuild { .. } => "ESBUILD_ERROR",
            Error::Glob { .. } => "INVALID_GLOB",
            Error::Watch(_) => "WATCH_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }
}

/// The configuration failed validation.
///
/// Holds every violation found, not only the first one, so a user can fix the
/// whole file in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidConfigError {
    violations: Vec<Violation>,
}

impl InvalidConfigError {
    /// Build an error from a non-empty list of violations.
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Violations in the order they were detected.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

impl fmt::Display for InvalidConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(
            f,
            "The config file is invalid. Check the following properties for validity:"
        )?;
        for violation in &self.violations {
            writeln!(f, "- {violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for InvalidConfigError {}

impl miette::Diagnostic for InvalidConfigError {
    fn code(&self) -> Option<Box<dyn fmt::Display + '_>> {
        Some(Box::new("INVALID_CONFIG"))
    }
}

/// Node-style name for an I/O failure (`NotFound`, `PermissionDenied`, ...).
fn error_code(err: &std::io::Error) -> String {
    format!("{:?}", err.kind())
}

fn format_messages(messages: &[Message]) -> String {
    messages.iter().map(|m| format!("\n  {m}")).collect()
}
