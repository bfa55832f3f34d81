//! Fractal deployer CLI entrypoint.
//!
//! This binary deploys the fractal generator web application onto the local
//! host, then prints a summary of what was placed, backed up and verified.

use clap::Parser;
use fractal_deployer::cli::Cli;
use fractal_deployer::config::DeployConfig;
use fractal_deployer::deps::SystemCommandExecutor;
use fractal_deployer::error::Result;
use fractal_deployer::logging::{self, console_level, log_file_for, open_log_file};
use fractal_deployer::output::write_stderr_line;
use fractal_deployer::pipeline::Deployer;
use fractal_deployer::probe::UreqProber;
use fractal_deployer::prompt::{AssumeYes, OperatorPrompt, TerminalPrompt};
use fractal_deployer::report::DeploymentResult;
use log::{LevelFilter, error};
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<()> {
    let config = cli.resolve_config()?;
    init_logging(cli, &config, stderr);

    let executor = SystemCommandExecutor::with_timeout(config.command_timeout());
    let prober = UreqProber::new(config.verify.probe_timeout());
    let prompt: &dyn OperatorPrompt = if cli.assume_yes {
        &AssumeYes
    } else {
        &TerminalPrompt
    };
    let deployer =
        Deployer::new(&config, &executor, &prober, prompt).with_options(cli.run_options());

    // Dry-run mode: show the plan without side effects
    if cli.dry_run {
        return deployer.dry_run(stderr);
    }

    let result = deployer.run(stderr)?;
    if cli.json {
        write_json(&result, &mut std::io::stdout())?;
    }
    Ok(())
}

/// Installs the console and log-file subscriber. The log file is only opened
/// for a real run against an existing source directory.
fn init_logging(cli: &Cli, config: &DeployConfig, stderr: &mut dyn Write) {
    let level = console_level(cli.verbosity, cli.quiet);
    let file = log_file_for(config, cli.dry_run).and_then(|path| {
        open_log_file(path)
            .map_err(|err| {
                write_stderr_line(stderr, format!("warning: {err}; logging to console only"));
            })
            .ok()
    });
    if let Err(err) = logging::init_logging(level, !cli.no_color, file) {
        write_stderr_line(stderr, format!("warning: logging unavailable: {err}"));
    }
}

fn write_json(result: &DeploymentResult, stdout: &mut dyn Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *stdout, result).map_err(std::io::Error::from)?;
    writeln!(stdout)?;
    Ok(())
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            if log::max_level() >= LevelFilter::Error {
                error!("{err}");
            } else {
                write_stderr_line(stderr, format!("error: {err}"));
            }
            1
        }
    }
}
