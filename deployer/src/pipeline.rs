//! Deployment pipeline orchestration.
//!
//! [`Deployer`] walks the steps of [`Step`] in order: precondition check,
//! backup, install, deploy, activate, verify and report. A fatal error in any
//! step stops the walk and is returned; best-effort problems are recorded as
//! warnings on the [`DeploymentResult`] and the walk continues. There are no
//! retries and no rollback; the timestamped backups are the recovery path.

use crate::backup::{backup_existing, backup_stamp};
use crate::config::DeployConfig;
use crate::deps::{
    CommandExecutor, check_prerequisites, install_language_packages, install_prerequisites,
};
use crate::error::{DeployError, Result};
use crate::manifest::{ArtifactKind, DeploymentManifest};
use crate::output::{dry_run_text, summary_text, write_stderr_line};
use crate::probe::{HttpProber, run_probes};
use crate::prompt::OperatorPrompt;
use crate::report::{DeploymentResult, Step, StepStatus, receipt_text, write_receipt};
use crate::service::{is_active, reload_web_server, start_app_service};
use crate::stager::{enable_site, stage_entry, sweep_static_assets};
use chrono::Local;
use log::{debug, info};
use std::io::Write;
use std::time::Duration;

/// Switches that alter a run without changing the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Skip the install step entirely.
    pub skip_install: bool,
    /// Write the colour-coded summary during the report step.
    pub print_summary: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_install: false,
            print_summary: true,
        }
    }
}

/// Runs one deployment against injected command, HTTP and prompt seams.
pub struct Deployer<'a> {
    config: &'a DeployConfig,
    executor: &'a dyn CommandExecutor,
    prober: &'a dyn HttpProber,
    prompt: &'a dyn OperatorPrompt,
    options: RunOptions,
    sleep: fn(Duration),
}

impl<'a> Deployer<'a> {
    /// Creates a deployer with default options and real sleeps.
    #[must_use]
    pub fn new(
        config: &'a DeployConfig,
        executor: &'a dyn CommandExecutor,
        prober: &'a dyn HttpProber,
        prompt: &'a dyn OperatorPrompt,
    ) -> Self {
        Self {
            config,
            executor,
            prober,
            prompt,
            options: RunOptions::default(),
            sleep: std::thread::sleep,
        }
    }

    /// Replaces the run options.
    #[must_use]
    pub const fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the settle-delay sleep, for tests.
    #[must_use]
    pub const fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    /// Runs every step in order and returns what was done.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`DeployError`]: a missing source directory,
    /// an operator declining to continue, a package install failure, a failed
    /// manifest copy, a failed web-server configuration test or restart.
    pub fn run(&self, stderr: &mut dyn Write) -> Result<DeploymentResult> {
        let manifest = DeploymentManifest::from_config(self.config);
        let mut result = DeploymentResult::new(manifest.source_dir(), Local::now());

        let mut step = Some(Step::FIRST);
        while let Some(current) = step {
            info!("==> {current}");
            if let Err(err) = self.run_step(current, &manifest, &mut result, stderr) {
                result.record(current, StepStatus::Failed, Some(err.to_string()));
                return Err(err);
            }
            step = current.next();
        }
        Ok(result)
    }

    /// Checks preconditions and prints the plan without changing anything.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::SourceDirMissing`] when the source directory
    /// does not exist.
    pub fn dry_run(&self, stderr: &mut dyn Write) -> Result<()> {
        let manifest = DeploymentManifest::from_config(self.config);
        ensure_source_dir(&manifest)?;
        write_stderr_line(stderr, dry_run_text(self.config, &manifest));
        Ok(())
    }

    fn run_step(
        &self,
        step: Step,
        manifest: &DeploymentManifest,
        result: &mut DeploymentResult,
        stderr: &mut dyn Write,
    ) -> Result<()> {
        match step {
            Step::PreconditionCheck => self.check_preconditions(manifest, result),
            Step::Backup => {
                self.back_up(manifest, result);
                Ok(())
            }
            Step::Install => self.install(result),
            Step::Deploy => self.deploy(manifest, result),
            Step::Activate => self.activate(result),
            Step::Verify => {
                self.verify(result);
                Ok(())
            }
            Step::Report => {
                self.report(result, stderr);
                Ok(())
            }
        }
    }

    fn check_preconditions(
        &self,
        manifest: &DeploymentManifest,
        result: &mut DeploymentResult,
    ) -> Result<()> {
        ensure_source_dir(manifest)?;

        let presence = manifest.check_presence();
        for kind in &presence.present {
            info!("found {kind}");
        }
        for kind in &presence.missing {
            result.warn(format!("{kind} not found in {}", manifest.source_dir()));
        }
        result.missing.clone_from(&presence.missing);

        if !presence.is_complete() {
            let question = format!(
                "{} of {} deployment files are missing. Continue anyway?",
                presence.missing.len(),
                manifest.entries().len()
            );
            if !self.prompt.confirm(&question)? {
                return Err(DeployError::OperatorDeclined {
                    missing: presence.missing,
                });
            }
        }

        result.record(Step::PreconditionCheck, StepStatus::Succeeded, None);
        Ok(())
    }

    fn back_up(&self, manifest: &DeploymentManifest, result: &mut DeploymentResult) {
        let stamp = backup_stamp(&Local::now());
        let targets = manifest
            .entries()
            .iter()
            .filter(|entry| entry.kind.is_configuration())
            .map(|entry| entry.destination.as_path())
            .chain(std::iter::once(self.config.paths.app_dir.as_path()));

        for target in targets {
            match backup_existing(target, &stamp) {
                Ok(Some(path)) => {
                    info!("backed up {target} to {path}");
                    result.backups.push(path);
                }
                Ok(None) => debug!("nothing to back up at {target}"),
                Err(e) => result.warn(format!("could not back up {target}: {e}")),
            }
        }
        result.record(Step::Backup, StepStatus::Succeeded, None);
    }

    fn install(&self, result: &mut DeploymentResult) -> Result<()> {
        if self.options.skip_install {
            info!("skipping package installation");
            result.record(
                Step::Install,
                StepStatus::Skipped,
                Some("--skip-install".to_owned()),
            );
            return Ok(());
        }

        let packages = &self.config.packages;
        let status = check_prerequisites(self.executor, packages);
        if status.all_installed() {
            info!("system prerequisites already installed");
        }
        install_prerequisites(self.executor, packages, &status)?;
        install_language_packages(self.executor, packages)?;

        result.record(Step::Install, StepStatus::Succeeded, None);
        Ok(())
    }

    fn deploy(&self, manifest: &DeploymentManifest, result: &mut DeploymentResult) -> Result<()> {
        for entry in manifest.entries() {
            if !entry.is_present() {
                debug!("skipping missing {}", entry.kind);
                continue;
            }
            let deployed = stage_entry(entry)?;
            info!("deployed {} to {}", entry.kind, deployed.destination);
            result.deployed.push(deployed);
        }

        let paths = &self.config.paths;
        if result.destination_of(ArtifactKind::SiteConfig).is_some() {
            if let Err(e) = enable_site(&paths.site_available, &paths.site_enabled) {
                result.warn(format!("could not enable site at {}: {e}", paths.site_enabled));
            }
        }

        let sweep = sweep_static_assets(manifest, &paths.app_dir);
        for failure in sweep.failures {
            result.warn(failure);
        }
        if !sweep.copied.is_empty() {
            info!("copied {} static asset(s) to {}", sweep.copied.len(), paths.app_dir);
        }
        result.assets = sweep.copied;

        result.record(Step::Deploy, StepStatus::Succeeded, None);
        Ok(())
    }

    fn activate(&self, result: &mut DeploymentResult) -> Result<()> {
        let warnings = start_app_service(self.executor, &self.config.services);
        result.warnings.extend(warnings);

        (self.sleep)(self.config.verify.service_settle());
        reload_web_server(self.executor, &self.config.services)?;

        result.record(Step::Activate, StepStatus::Succeeded, None);
        Ok(())
    }

    fn verify(&self, result: &mut DeploymentResult) {
        (self.sleep)(self.config.verify.web_settle());

        let services = &self.config.services;
        for unit in [&services.app_service, &services.web_service] {
            if is_active(self.executor, services, unit) {
                info!("{unit} is active");
            } else {
                result.warn(format!("service {unit} is not active"));
            }
        }

        let outcomes = run_probes(self.prober, &self.config.verify.probes);
        for outcome in &outcomes {
            if outcome.succeeded() {
                info!("probe {} ok ({})", outcome.name, outcome.url);
            } else {
                let reason = outcome.error.as_deref().unwrap_or("unexpected response");
                result.warn(format!("probe {} failed: {reason}", outcome.name));
            }
        }
        result.probes = outcomes;

        result.record(Step::Verify, StepStatus::Succeeded, None);
    }

    fn report(&self, result: &mut DeploymentResult, stderr: &mut dyn Write) {
        let paths = &self.config.paths;
        let text = receipt_text(result, &paths.log_file);
        match write_receipt(&paths.receipt, &text) {
            Ok(()) => info!("receipt written to {}", paths.receipt),
            Err(source) => {
                let reason = source.to_string();
                let err = DeployError::ReceiptWrite {
                    path: paths.receipt.clone(),
                    source,
                };
                result.warn(format!("{err}: {reason}"));
            }
        }

        result.record(Step::Report, StepStatus::Succeeded, None);
        if self.options.print_summary {
            write_stderr_line(stderr, "");
            write_stderr_line(stderr, summary_text(result, self.config));
        }
    }
}

fn ensure_source_dir(manifest: &DeploymentManifest) -> Result<()> {
    if manifest.source_dir().is_dir() {
        return Ok(());
    }
    Err(DeployError::SourceDirMissing {
        path: manifest.source_dir().to_owned(),
    })
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
