//! Command execution and package installation.
//!
//! Every external process the deployer starts goes through
//! [`CommandExecutor`], so the package manager, service manager and web
//! server can be replaced in tests. This module also owns the install step:
//! OS prerequisites are installed only when their binary is missing, language
//! packages are installed unconditionally.

use crate::config::PackagesConfig;
use crate::error::{DeployError, Result};
use log::{debug, info};
use std::io::{self, Read};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Default timeout for external commands (5 minutes).
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the
    /// command, or [`DeployError::CommandTimeout`] if it does not finish.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fractal_deployer::deps::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor::default();
    /// let output = executor.run("nginx", &["-t"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), fractal_deployer::error::DeployError>(())
    /// ```
    fn run<'a>(&self, cmd: &str, args: &'a [&'a str]) -> Result<Output>;
}

/// Executes commands on the host system, killing them after a timeout.
#[derive(Debug, Clone, Copy)]
pub struct SystemCommandExecutor {
    timeout: Duration,
}

impl SystemCommandExecutor {
    /// Creates an executor with the given per-command timeout.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemCommandExecutor {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run<'a>(&self, cmd: &str, args: &'a [&'a str]) -> Result<Output> {
        debug!("running {}", command_line(cmd, args));
        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Both pipes are drained while waiting so a chatty child never blocks
        // on a full pipe buffer.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        match child.wait_timeout(self.timeout)? {
            Some(status) => Ok(Output {
                status,
                stdout: collect(stdout)?,
                stderr: collect(stderr)?,
            }),
            None => {
                if let Err(err) = child.kill() {
                    debug!("failed to kill timed-out command: {err}");
                }
                if let Err(err) = child.wait() {
                    debug!("failed to reap timed-out command: {err}");
                }
                // The reader threads are left to finish on their own: a
                // grandchild may still hold the pipes open.
                Err(DeployError::CommandTimeout {
                    command: command_line(cmd, args),
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}

type PipeReader = JoinHandle<io::Result<Vec<u8>>>;

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> PipeReader {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut bytes)?;
        }
        Ok(bytes)
    })
}

fn collect(reader: PipeReader) -> io::Result<Vec<u8>> {
    reader
        .join()
        .map_err(|_| io::Error::other("output reader thread panicked"))?
}

/// Formats a command and its arguments for logs and error messages.
///
/// # Examples
///
/// ```
/// use fractal_deployer::deps::command_line;
///
/// assert_eq!(command_line("systemctl", &["enable", "fractal"]), "systemctl enable fractal");
/// ```
#[must_use]
pub fn command_line(cmd: &str, args: &[&str]) -> String {
    std::iter::once(cmd)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns the trimmed stderr of `output`, falling back to stdout when stderr
/// is empty.
#[must_use]
pub fn failure_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let text = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout)
    } else {
        stderr
    };
    text.trim().to_owned()
}

/// Returns true if the given command executes successfully.
pub fn command_succeeds(executor: &dyn CommandExecutor, cmd: &str, args: &[&str]) -> bool {
    executor.run(cmd, args).is_ok_and(|o| o.status.success())
}

/// Availability of the OS-level prerequisites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrerequisiteStatus {
    /// Packages whose binary was not found.
    pub missing: Vec<String>,
}

impl PrerequisiteStatus {
    /// Returns `true` if every prerequisite is installed.
    ///
    /// # Examples
    ///
    /// ```
    /// use fractal_deployer::deps::PrerequisiteStatus;
    ///
    /// assert!(PrerequisiteStatus { missing: vec![] }.all_installed());
    /// assert!(!PrerequisiteStatus { missing: vec!["nginx".to_owned()] }.all_installed());
    /// ```
    #[must_use]
    pub fn all_installed(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Checks which OS prerequisites are missing by probing for their binaries.
pub fn check_prerequisites(
    executor: &dyn CommandExecutor,
    packages: &PackagesConfig,
) -> PrerequisiteStatus {
    let missing = packages
        .prerequisites
        .iter()
        .filter(|prereq| !command_succeeds(executor, "which", &[prereq.binary.as_str()]))
        .map(|prereq| prereq.package.clone())
        .collect();
    PrerequisiteStatus { missing }
}

/// Installs the missing OS prerequisites through the package manager.
///
/// The package index is refreshed once before the first install. Nothing runs
/// when every prerequisite is already present.
///
/// # Errors
///
/// Returns [`DeployError::PackageInstall`] if the package manager fails.
pub fn install_prerequisites(
    executor: &dyn CommandExecutor,
    packages: &PackagesConfig,
    status: &PrerequisiteStatus,
) -> Result<()> {
    if status.all_installed() {
        return Ok(());
    }

    let manager = packages.package_manager.as_str();
    let refresh = executor.run(manager, &["update"])?;
    ensure_installed(&refresh, "package index")?;

    for package in &status.missing {
        info!("Installing {package}...");
        let output = executor.run(manager, &["install", "-y", package.as_str()])?;
        ensure_installed(&output, package)?;
    }

    Ok(())
}

/// Installs every language package in a single installer invocation.
///
/// # Errors
///
/// Returns [`DeployError::PackageInstall`] if the installer fails.
pub fn install_language_packages(
    executor: &dyn CommandExecutor,
    packages: &PackagesConfig,
) -> Result<()> {
    if packages.language_packages.is_empty() {
        return Ok(());
    }

    let args: Vec<&str> = std::iter::once("install")
        .chain(packages.language_installer_args.iter().map(String::as_str))
        .chain(packages.language_packages.iter().map(String::as_str))
        .collect();

    info!(
        "Installing language packages: {}",
        packages.language_packages.join(", ")
    );
    let output = executor.run(&packages.language_installer, &args)?;
    ensure_installed(&output, &packages.language_packages.join(" "))
}

fn ensure_installed(output: &Output, package: &str) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(DeployError::PackageInstall {
        package: package.to_owned(),
        message: failure_text(output),
    })
}
