//! CLI argument definitions for the fractal deployer.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::config::DeployConfig;
use crate::error::Result;
use crate::pipeline::RunOptions;
use camino::Utf8PathBuf;
use clap::Parser;

/// Deploy the fractal generator web application to this host.
#[derive(Parser, Debug, Clone)]
#[command(name = "fractal-deploy")]
#[command(version, about)]
#[command(long_about = concat!(
    "Deploy the fractal generator web application to this host.\n\n",
    "Copies the application, its systemd unit and the nginx configuration from ",
    "the source directory to their fixed locations, backing up whatever was ",
    "there first. Then installs the Python dependencies, restarts the services ",
    "and probes the application directly and through nginx.\n\n",
    "nginx is only restarted when `nginx -t` accepts the deployed configuration.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Deploy from ./deploy, asking before continuing with missing files:\n",
    "    $ sudo fractal-deploy\n\n",
    "  Unattended deploy from another directory:\n",
    "    $ sudo fractal-deploy --source-dir /srv/release --assume-yes\n\n",
    "  Preview without changing anything:\n",
    "    $ fractal-deploy --dry-run\n\n",
    "  Stage into a scratch tree instead of /:\n",
    "    $ fractal-deploy --root /tmp/stage --skip-install --assume-yes",
))]
pub struct Cli {
    /// Directory holding the files to deploy [default: deploy].
    #[arg(short, long, value_name = "DIR")]
    pub source_dir: Option<Utf8PathBuf>,

    /// TOML configuration file [env: FRACTAL_DEPLOY_CONFIG].
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Prefix every destination path with DIR.
    #[arg(long, value_name = "DIR")]
    pub root: Option<Utf8PathBuf>,

    /// Running log file [default: /var/log/fractal-deploy.log].
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<Utf8PathBuf>,

    /// Deployment receipt [default: /opt/fractal/DEPLOYMENT.txt].
    #[arg(long, value_name = "FILE")]
    pub receipt: Option<Utf8PathBuf>,

    /// Continue without asking when deployment files are missing.
    #[arg(short = 'y', long)]
    pub assume_yes: bool,

    /// Skip system and Python package installation.
    #[arg(long)]
    pub skip_install: bool,

    /// Show what would be done and exit without changing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the deployment result as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Disable coloured output.
    #[arg(long)]
    pub no_color: bool,

    /// Increase console log detail (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Only show warnings and errors on the console.
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

impl Default for Cli {
    /// Creates a `Cli` with every flag off and no overrides.
    ///
    /// # Examples
    ///
    /// ```
    /// use fractal_deployer::cli::Cli;
    ///
    /// let cli = Cli::default();
    /// assert!(!cli.dry_run);
    /// assert!(cli.source_dir.is_none());
    /// ```
    fn default() -> Self {
        Self {
            source_dir: None,
            config: None,
            root: None,
            log_file: None,
            receipt: None,
            assume_yes: false,
            skip_install: false,
            dry_run: false,
            json: false,
            no_color: false,
            verbosity: 0,
            quiet: false,
        }
    }
}

impl Cli {
    /// Loads the configuration and applies the command-line overrides.
    ///
    /// `--root` is applied after the path overrides, so `--log-file` and
    /// `--receipt` are re-rooted too.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DeployError::InvalidConfig`] when the
    /// configuration file cannot be read or parsed.
    pub fn resolve_config(&self) -> Result<DeployConfig> {
        let mut config = DeployConfig::load(self.config.as_deref())?;
        if let Some(source_dir) = &self.source_dir {
            config.source_dir.clone_from(source_dir);
        }
        if let Some(log_file) = &self.log_file {
            config.paths.log_file.clone_from(log_file);
        }
        if let Some(receipt) = &self.receipt {
            config.paths.receipt.clone_from(receipt);
        }
        Ok(match &self.root {
            Some(root) => config.rooted(root),
            None => config,
        })
    }

    /// Pipeline options selected by the flags.
    ///
    /// The summary is suppressed when `--json` or `--quiet` is given.
    #[must_use]
    pub const fn run_options(&self) -> RunOptions {
        RunOptions {
            skip_install: self.skip_install,
            print_summary: !self.json && !self.quiet,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
