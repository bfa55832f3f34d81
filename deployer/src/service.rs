//! Service activation through the service manager.
//!
//! The application service is reloaded, enabled and restarted best effort.
//! The web server is only restarted after its configuration test passes; a
//! failing test aborts the run with the running web server untouched.

use crate::config::ServicesConfig;
use crate::deps::{CommandExecutor, command_line, failure_text};
use crate::error::{DeployError, Result};
use log::{info, warn};

/// Reloads unit definitions, then enables and restarts the application
/// service.
///
/// Each failure is logged and returned as a warning; none is fatal.
pub fn start_app_service(executor: &dyn CommandExecutor, services: &ServicesConfig) -> Vec<String> {
    let manager = services.service_manager.as_str();
    let app = services.app_service.as_str();
    let steps: [&[&str]; 3] = [&["daemon-reload"], &["enable", app], &["restart", app]];

    steps
        .into_iter()
        .filter_map(|args| {
            let line = command_line(manager, args);
            info!("{line}");
            match executor.run(manager, args) {
                Ok(output) if output.status.success() => None,
                Ok(output) => Some(format!("`{line}` failed: {}", failure_text(&output))),
                Err(err) => Some(format!("`{line}` could not run: {err}")),
            }
        })
        .inspect(|warning| warn!("{warning}"))
        .collect()
}

/// Tests the web-server configuration and restarts the web server only when
/// the test passes.
///
/// # Errors
///
/// Returns [`DeployError::ConfigTestFailed`] when the configuration test
/// fails, in which case the restart command is never issued, and
/// [`DeployError::ServiceCommand`] when the restart itself fails.
pub fn reload_web_server(executor: &dyn CommandExecutor, services: &ServicesConfig) -> Result<()> {
    let binary = services.web_server_binary.as_str();
    info!("{}", command_line(binary, &["-t"]));
    let test = executor.run(binary, &["-t"])?;
    if !test.status.success() {
        return Err(DeployError::ConfigTestFailed {
            message: failure_text(&test),
        });
    }

    let manager = services.service_manager.as_str();
    let args = ["restart", services.web_service.as_str()];
    let line = command_line(manager, &args);
    info!("{line}");
    let restart = executor.run(manager, &args)?;
    if !restart.status.success() {
        return Err(DeployError::ServiceCommand {
            command: line,
            message: failure_text(&restart),
        });
    }
    Ok(())
}

/// Returns `true` when the service manager reports `unit` as active.
pub fn is_active(executor: &dyn CommandExecutor, services: &ServicesConfig, unit: &str) -> bool {
    executor
        .run(&services.service_manager, &["is-active", unit])
        .is_ok_and(|output| output.status.success())
}
