//! Deployment steps and the result record.
//!
//! [`DeploymentResult`] collects what each step did so the summary and the
//! receipt can be rendered at the end. Nothing here is persisted except the
//! receipt text.

use crate::manifest::ArtifactKind;
use crate::probe::ProbeOutcome;
use crate::stager::DeployedFile;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use log::warn;
use serde::Serialize;
use std::fmt;
use std::fs;

/// The ordered steps of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Source directory and manifest presence checks.
    PreconditionCheck,
    /// Timestamped copies of existing configuration.
    Backup,
    /// OS prerequisites and language packages.
    Install,
    /// File placement and static asset sweep.
    Deploy,
    /// Service manager and web-server activation.
    Activate,
    /// Smoke-test probes.
    Verify,
    /// Summary and receipt.
    Report,
}

impl Step {
    /// The first step of every run.
    pub const FIRST: Self = Self::PreconditionCheck;

    /// The step that follows this one, or `None` after [`Step::Report`].
    ///
    /// # Examples
    ///
    /// ```
    /// use fractal_deployer::report::Step;
    ///
    /// assert_eq!(Step::Backup.next(), Some(Step::Install));
    /// assert_eq!(Step::Report.next(), None);
    /// ```
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::PreconditionCheck => Some(Self::Backup),
            Self::Backup => Some(Self::Install),
            Self::Install => Some(Self::Deploy),
            Self::Deploy => Some(Self::Activate),
            Self::Activate => Some(Self::Verify),
            Self::Verify => Some(Self::Report),
            Self::Report => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::PreconditionCheck => "precondition check",
            Self::Backup => "backup",
            Self::Install => "install",
            Self::Deploy => "deploy",
            Self::Activate => "activate",
            Self::Verify => "verify",
            Self::Report => "report",
        };
        f.write_str(label)
    }
}

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step completed, possibly with warnings.
    Succeeded,
    /// The step hit a fatal error.
    Failed,
    /// The step was not run.
    Skipped,
}

/// One step's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    /// The step.
    pub step: Step,
    /// How it ended.
    pub status: StepStatus,
    /// Optional detail, such as a skip reason or failure message.
    pub message: Option<String>,
}

/// Everything a run did, in the order it happened.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentResult {
    /// When the run started.
    pub started_at: DateTime<Local>,
    /// Directory the files were taken from.
    pub source_dir: Utf8PathBuf,
    /// Step outcomes in execution order.
    pub steps: Vec<StepRecord>,
    /// Manifest files absent from the source directory.
    pub missing: Vec<ArtifactKind>,
    /// Backups taken before overwriting.
    pub backups: Vec<Utf8PathBuf>,
    /// Manifest files placed on the host.
    pub deployed: Vec<DeployedFile>,
    /// Static assets copied into the application directory.
    pub assets: Vec<Utf8PathBuf>,
    /// Probe outcomes.
    pub probes: Vec<ProbeOutcome>,
    /// Non-fatal problems encountered along the way.
    pub warnings: Vec<String>,
}

impl DeploymentResult {
    /// Starts an empty result for a run reading from `source_dir`.
    #[must_use]
    pub fn new(source_dir: &Utf8Path, started_at: DateTime<Local>) -> Self {
        Self {
            started_at,
            source_dir: source_dir.to_owned(),
            steps: Vec::new(),
            missing: Vec::new(),
            backups: Vec::new(),
            deployed: Vec::new(),
            assets: Vec::new(),
            probes: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Records the outcome of a step.
    pub fn record(&mut self, step: Step, status: StepStatus, message: Option<String>) {
        self.steps.push(StepRecord {
            step,
            status,
            message,
        });
    }

    /// Logs a warning and keeps it for the summary.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(message);
    }

    /// Status of `step`, if it has been recorded.
    #[must_use]
    pub fn status_of(&self, step: Step) -> Option<StepStatus> {
        self.steps
            .iter()
            .find(|record| record.step == step)
            .map(|record| record.status)
    }

    /// Number of probes that returned a 2xx response.
    #[must_use]
    pub fn probes_passed(&self) -> usize {
        self.probes.iter().filter(|p| p.succeeded()).count()
    }

    /// Where the manifest file of `kind` was placed, if it was deployed.
    #[must_use]
    pub fn destination_of(&self, kind: ArtifactKind) -> Option<&Utf8Path> {
        self.deployed
            .iter()
            .find(|file| file.kind == kind)
            .map(|file| file.destination.as_path())
    }
}

/// Renders the plaintext receipt.
#[must_use]
pub fn receipt_text(result: &DeploymentResult, log_file: &Utf8Path) -> String {
    let mut lines = vec![
        "Fractal generator deployment receipt".to_owned(),
        format!(
            "Deployed at: {}",
            result.started_at.format("%Y-%m-%d %H:%M:%S %z")
        ),
        format!("Source directory: {}", result.source_dir),
        String::new(),
        "Files:".to_owned(),
    ];
    lines.extend(result.deployed.iter().map(|file| {
        format!(
            "  {} -> {} (mode {:o}, sha256 {})",
            file.kind, file.destination, file.mode, file.sha256
        )
    }));
    if !result.missing.is_empty() {
        lines.push(String::new());
        lines.push("Missing from source:".to_owned());
        lines.extend(result.missing.iter().map(|kind| format!("  {kind}")));
    }
    if !result.assets.is_empty() {
        lines.push(String::new());
        lines.push("Static assets:".to_owned());
        lines.extend(result.assets.iter().map(|path| format!("  {path}")));
    }
    if !result.backups.is_empty() {
        lines.push(String::new());
        lines.push("Backups:".to_owned());
        lines.extend(result.backups.iter().map(|path| format!("  {path}")));
    }
    lines.push(String::new());
    lines.push(format!(
        "Verification: {}/{} probes passed",
        result.probes_passed(),
        result.probes.len()
    ));
    lines.extend(result.probes.iter().map(|probe| {
        let verdict = if probe.succeeded() { "ok" } else { "FAILED" };
        format!("  {verdict:<6} {} {}", probe.name, probe.url)
    }));
    lines.push(String::new());
    lines.push(format!("Log: {log_file}"));
    lines.push(String::new());
    lines.join("\n")
}

/// Writes the receipt to `path`, creating parent directories.
///
/// # Errors
///
/// Returns any I/O error from creating the directory or writing the file.
pub fn write_receipt(path: &Utf8Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)
}
