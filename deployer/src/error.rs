//! Error types for the fractal deployer.
//!
//! Every variant here is fatal: it aborts the deployment and maps to a
//! non-zero exit code. Recoverable problems (missing optional files, failed
//! backups, unresponsive probes) are recorded as warnings on the
//! [`crate::report::DeploymentResult`] instead.

use crate::manifest::ArtifactKind;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that abort a deployment run.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The source directory does not exist.
    #[error("source directory {path} not found; nothing was deployed")]
    SourceDirMissing {
        /// Path that was expected to hold the deployment files.
        path: Utf8PathBuf,
    },

    /// The operator chose not to continue with missing files.
    #[error("deployment aborted by operator; missing: {}", format_kinds(.missing))]
    OperatorDeclined {
        /// Manifest entries that were absent from the source directory.
        missing: Vec<ArtifactKind>,
    },

    /// Reading the operator's answer failed.
    #[error("failed to read operator response: {0}")]
    Prompt(#[source] std::io::Error),

    /// A package could not be installed.
    #[error("failed to install {package}: {message}")]
    PackageInstall {
        /// Name of the package that failed to install.
        package: String,
        /// Trimmed stderr of the package manager.
        message: String,
    },

    /// The web-server configuration test rejected the deployed configuration.
    #[error("web server configuration test failed; web server was not restarted: {message}")]
    ConfigTestFailed {
        /// Output of the configuration test.
        message: String,
    },

    /// A required service-manager command failed.
    #[error("`{command}` failed: {message}")]
    ServiceCommand {
        /// The command line that failed.
        command: String,
        /// Trimmed stderr of the failed command.
        message: String,
    },

    /// An external command did not finish within its timeout.
    #[error("`{command}` timed out after {seconds} seconds")]
    CommandTimeout {
        /// The command line that timed out.
        command: String,
        /// Timeout that elapsed.
        seconds: u64,
    },

    /// A manifest file could not be copied to its destination.
    #[error("failed to copy {from} to {to}: {reason}")]
    CopyFailed {
        /// Source path.
        from: Utf8PathBuf,
        /// Destination path.
        to: Utf8PathBuf,
        /// Description of the underlying I/O error.
        reason: String,
    },

    /// The configuration file could not be read or parsed.
    #[error("invalid configuration at {path}: {reason}")]
    InvalidConfig {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Description of the read or parse error.
        reason: String,
    },

    /// The deployment receipt could not be written.
    #[error("failed to write receipt {path}")]
    ReceiptWrite {
        /// Receipt destination.
        path: Utf8PathBuf,
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },

    /// The log file could not be opened.
    #[error("failed to open log file {path}")]
    LogFile {
        /// Log file path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_kinds(kinds: &[ArtifactKind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias using [`DeployError`].
pub type Result<T> = std::result::Result<T, DeployError>;
