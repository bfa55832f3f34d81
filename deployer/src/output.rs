//! Console output for the deployer CLI.
//!
//! This module renders the colour-coded deployment summary, the dry-run plan,
//! and the list of diagnostic commands an operator can run afterwards.
//! Colour is applied through `colored`, which honours `NO_COLOR` and the
//! global override set by `--no-color`.

use crate::config::DeployConfig;
use crate::deps::command_line;
use crate::manifest::DeploymentManifest;
use crate::report::{DeploymentResult, StepStatus};
use colored::Colorize;
use std::io::Write;

const RULE: &str = "==================================================";

/// Writes one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}

/// Commands an operator can run to inspect the deployment.
#[must_use]
pub fn diagnostic_commands(config: &DeployConfig) -> Vec<String> {
    let services = &config.services;
    let manager = services.service_manager.as_str();
    vec![
        command_line(manager, &["status", services.app_service.as_str()]),
        format!("journalctl -u {} -f", services.app_service),
        command_line(&services.web_server_binary, &["-t"]),
        command_line(manager, &["status", services.web_service.as_str()]),
        format!("tail -f {}", config.paths.log_file),
    ]
}

/// Renders the end-of-run summary.
#[must_use]
pub fn summary_text(result: &DeploymentResult, config: &DeployConfig) -> String {
    let mut lines = vec![
        RULE.to_owned(),
        " Fractal generator deployment summary".bold().to_string(),
        RULE.to_owned(),
        String::new(),
        "Steps:".bold().to_string(),
    ];
    lines.extend(result.steps.iter().map(|record| {
        let marker = match record.status {
            StepStatus::Succeeded => "✓".green(),
            StepStatus::Failed => "✗".red(),
            StepStatus::Skipped => "-".yellow(),
        };
        match &record.message {
            Some(message) => format!("  {marker} {} ({message})", record.step),
            None => format!("  {marker} {}", record.step),
        }
    }));

    lines.push(String::new());
    lines.push("Deployed files:".bold().to_string());
    lines.extend(result.deployed.iter().map(|file| {
        format!(
            "  {} -> {} ({:o})",
            file.kind.to_string().green(),
            file.destination,
            file.mode
        )
    }));
    lines.extend(
        result
            .missing
            .iter()
            .map(|kind| format!("  {} (missing from source)", kind.to_string().yellow())),
    );
    if !result.assets.is_empty() {
        lines.push(format!("  {} static asset(s)", result.assets.len()));
    }
    if !result.backups.is_empty() {
        lines.push(String::new());
        lines.push("Backups:".bold().to_string());
        lines.extend(result.backups.iter().map(|path| format!("  {path}")));
    }

    lines.push(String::new());
    lines.push(format!(
        "{} {}/{} probes passed",
        "Verification:".bold(),
        result.probes_passed(),
        result.probes.len()
    ));
    lines.extend(result.probes.iter().map(|probe| {
        if probe.succeeded() {
            format!("  {} {} {}", "✓".green(), probe.name, probe.url)
        } else {
            let reason = probe.error.as_deref().unwrap_or("no response");
            format!("  {} {} ({reason})", "⚠".yellow(), probe.name)
        }
    }));

    if !result.warnings.is_empty() {
        lines.push(String::new());
        lines.push(format!("{} {}", "Warnings:".yellow().bold(), result.warnings.len()));
        lines.extend(result.warnings.iter().map(|w| format!("  - {w}")));
    }

    lines.push(String::new());
    lines.push(format!("Receipt: {}", config.paths.receipt));
    lines.push(format!("Log: {}", config.paths.log_file));
    lines.push(String::new());
    lines.push("Useful commands:".bold().to_string());
    lines.extend(diagnostic_commands(config).into_iter().map(|c| format!("  {c}")));
    lines.join("\n")
}

/// Renders the dry-run plan: what would be copied and run.
#[must_use]
pub fn dry_run_text(config: &DeployConfig, manifest: &DeploymentManifest) -> String {
    let mut lines = vec![
        "Dry run - no files will be modified".to_owned(),
        String::new(),
        format!("Source directory: {}", manifest.source_dir()),
        String::new(),
        "Files:".to_owned(),
    ];
    lines.extend(manifest.entries().iter().map(|entry| {
        let presence = if entry.is_present() { "" } else { " [missing]" };
        format!(
            "  {} -> {} ({:o}){presence}",
            entry.source,
            entry.destination,
            entry.mode()
        )
    }));
    lines.push(format!(
        "  site link: {} -> {}",
        config.paths.site_enabled, config.paths.site_available
    ));

    let services = &config.services;
    let packages = &config.packages;
    lines.push(String::new());
    lines.push("Commands:".to_owned());
    for prereq in &packages.prerequisites {
        lines.push(format!(
            "  {} (if `{}` is missing)",
            command_line(&packages.package_manager, &["install", "-y", prereq.package.as_str()]),
            prereq.binary
        ));
    }
    if !packages.language_packages.is_empty() {
        lines.push(format!(
            "  {} install {}",
            packages.language_installer,
            packages.language_packages.join(" ")
        ));
    }
    let manager = services.service_manager.as_str();
    lines.push(format!("  {}", command_line(manager, &["daemon-reload"])));
    lines.push(format!("  {}", command_line(manager, &["enable", services.app_service.as_str()])));
    lines.push(format!("  {}", command_line(manager, &["restart", services.app_service.as_str()])));
    lines.push(format!("  {}", command_line(&services.web_server_binary, &["-t"])));
    lines.push(format!("  {}", command_line(manager, &["restart", services.web_service.as_str()])));

    lines.push(String::new());
    lines.push("Probes:".to_owned());
    lines.extend(
        config
            .verify
            .probes
            .iter()
            .map(|probe| format!("  {} {}", probe.name, probe.url)),
    );
    lines.join("\n")
}
