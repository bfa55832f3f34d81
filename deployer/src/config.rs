//! Deployment configuration.
//!
//! The defaults reproduce the fixed single-host layout: the application under
//! `/opt/fractal`, a systemd unit, an nginx site definition and the main nginx
//! configuration. A TOML file can override any field; every table uses
//! `#[serde(default)]` so partial files are valid. The file is located via
//! `--config` or the `FRACTAL_DEPLOY_CONFIG` environment variable.

use crate::error::{DeployError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV_VAR: &str = "FRACTAL_DEPLOY_CONFIG";

/// Top-level deployment configuration.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DeployConfig {
    /// Directory holding the files to deploy.
    pub source_dir: Utf8PathBuf,
    /// Destination layout on the host.
    pub paths: PathsConfig,
    /// Service and web-server names.
    pub services: ServicesConfig,
    /// OS and language package requirements.
    pub packages: PackagesConfig,
    /// Post-activation verification settings.
    pub verify: VerifyConfig,
    /// Timeout applied to every external command, in seconds.
    pub command_timeout_secs: u64,
}

/// Source file names and their fixed destinations.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// File name of the web application in the source directory.
    pub app_file: String,
    /// File name of the service unit in the source directory.
    pub unit_file: String,
    /// File name of the site definition in the source directory.
    pub site_file: String,
    /// File name of the main web-server configuration in the source directory.
    pub main_config_file: String,
    /// Directory the application and static assets are installed into.
    pub app_dir: Utf8PathBuf,
    /// Directory holding service unit definitions.
    pub unit_dir: Utf8PathBuf,
    /// Destination of the site definition.
    pub site_available: Utf8PathBuf,
    /// Symlink that enables the site definition.
    pub site_enabled: Utf8PathBuf,
    /// Destination of the main web-server configuration.
    pub main_config: Utf8PathBuf,
    /// Running log file.
    pub log_file: Utf8PathBuf,
    /// Plaintext deployment receipt.
    pub receipt: Utf8PathBuf,
}

/// Names of the managed services.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServicesConfig {
    /// Service manager binary.
    pub service_manager: String,
    /// Unit name of the deployed application service.
    pub app_service: String,
    /// Unit name of the web server.
    pub web_service: String,
    /// Web-server binary used for the configuration test.
    pub web_server_binary: String,
}

/// A system package guarded by a presence probe.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Prerequisite {
    /// Package name passed to the package manager.
    pub package: String,
    /// Binary whose presence on `PATH` means the package is installed.
    pub binary: String,
}

/// Package requirements.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PackagesConfig {
    /// OS package manager binary.
    pub package_manager: String,
    /// OS packages installed only when absent.
    pub prerequisites: Vec<Prerequisite>,
    /// Language package installer binary.
    pub language_installer: String,
    /// Extra arguments passed to the language installer before the package list.
    pub language_installer_args: Vec<String>,
    /// Language packages installed unconditionally.
    pub language_packages: Vec<String>,
}

/// A smoke-test HTTP probe.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProbeTarget {
    /// Human-readable label used in the summary.
    pub name: String,
    /// URL requested by the probe.
    pub url: String,
}

/// Verification step settings.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct VerifyConfig {
    /// Delay after starting the application service.
    pub service_settle_secs: u64,
    /// Delay after restarting the web server.
    pub web_settle_secs: u64,
    /// Per-request probe timeout.
    pub probe_timeout_secs: u64,
    /// Probes against the application and the web-server front end.
    pub probes: Vec<ProbeTarget>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            source_dir: Utf8PathBuf::from("deploy"),
            paths: PathsConfig::default(),
            services: ServicesConfig::default(),
            packages: PackagesConfig::default(),
            verify: VerifyConfig::default(),
            command_timeout_secs: 300,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            app_file: "fractal_app.py".to_owned(),
            unit_file: "fractal.service".to_owned(),
            site_file: "fractal_nginx.conf".to_owned(),
            main_config_file: "nginx.conf".to_owned(),
            app_dir: Utf8PathBuf::from("/opt/fractal"),
            unit_dir: Utf8PathBuf::from("/etc/systemd/system"),
            site_available: Utf8PathBuf::from("/etc/nginx/sites-available/fractal"),
            site_enabled: Utf8PathBuf::from("/etc/nginx/sites-enabled/fractal"),
            main_config: Utf8PathBuf::from("/etc/nginx/nginx.conf"),
            log_file: Utf8PathBuf::from("/var/log/fractal-deploy.log"),
            receipt: Utf8PathBuf::from("/opt/fractal/DEPLOYMENT.txt"),
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            service_manager: "systemctl".to_owned(),
            app_service: "fractal".to_owned(),
            web_service: "nginx".to_owned(),
            web_server_binary: "nginx".to_owned(),
        }
    }
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            package_manager: "apt-get".to_owned(),
            prerequisites: vec![
                Prerequisite {
                    package: "nginx".to_owned(),
                    binary: "nginx".to_owned(),
                },
                Prerequisite {
                    package: "python3-pip".to_owned(),
                    binary: "pip3".to_owned(),
                },
            ],
            language_installer: "pip3".to_owned(),
            language_installer_args: Vec::new(),
            language_packages: ["flask", "numpy", "matplotlib", "werkzeug"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            service_settle_secs: 3,
            web_settle_secs: 2,
            probe_timeout_secs: 10,
            probes: vec![
                ProbeTarget {
                    name: "application status".to_owned(),
                    url: "http://127.0.0.1:5000/status".to_owned(),
                },
                ProbeTarget {
                    name: "application light render".to_owned(),
                    url: "http://127.0.0.1:5000/light".to_owned(),
                },
                ProbeTarget {
                    name: "nginx status".to_owned(),
                    url: "http://localhost/status".to_owned(),
                },
                ProbeTarget {
                    name: "nginx light render".to_owned(),
                    url: "http://localhost/light".to_owned(),
                },
            ],
        }
    }
}

impl DeployConfig {
    /// Loads configuration from `explicit`, then from the path named by
    /// [`CONFIG_ENV_VAR`], falling back to the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::InvalidConfig`] when the file cannot be read or
    /// does not parse.
    pub fn load(explicit: Option<&Utf8Path>) -> Result<Self> {
        let from_env = std::env::var(CONFIG_ENV_VAR)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(Utf8PathBuf::from);

        match explicit.map(Utf8Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::InvalidConfig`] on read or parse failure.
    pub fn from_file(path: &Utf8Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| DeployError::InvalidConfig {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        Self::parse(&contents).map_err(|reason| DeployError::InvalidConfig {
            path: path.to_owned(),
            reason,
        })
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns the parser's message when the document is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use fractal_deployer::config::DeployConfig;
    ///
    /// let config = DeployConfig::parse("source_dir = \"/srv/fractal\"").unwrap();
    /// assert_eq!(config.source_dir, "/srv/fractal");
    /// assert_eq!(config.services.app_service, "fractal");
    /// ```
    pub fn parse(contents: &str) -> std::result::Result<Self, String> {
        toml::from_str(contents).map_err(|e| e.to_string())
    }

    /// Returns a copy with every host path re-rooted under `root`.
    ///
    /// Used to stage a deployment into a scratch tree. The source directory
    /// is left untouched.
    #[must_use]
    pub fn rooted(&self, root: &Utf8Path) -> Self {
        let reroot = |path: &Utf8Path| -> Utf8PathBuf {
            root.join(path.strip_prefix("/").unwrap_or(path))
        };
        let paths = &self.paths;
        Self {
            paths: PathsConfig {
                app_dir: reroot(&paths.app_dir),
                unit_dir: reroot(&paths.unit_dir),
                site_available: reroot(&paths.site_available),
                site_enabled: reroot(&paths.site_enabled),
                main_config: reroot(&paths.main_config),
                log_file: reroot(&paths.log_file),
                receipt: reroot(&paths.receipt),
                ..paths.clone()
            },
            ..self.clone()
        }
    }

    /// Timeout applied to external commands.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl VerifyConfig {
    /// Delay after starting the application service.
    #[must_use]
    pub const fn service_settle(&self) -> Duration {
        Duration::from_secs(self.service_settle_secs)
    }

    /// Delay after restarting the web server.
    #[must_use]
    pub const fn web_settle(&self) -> Duration {
        Duration::from_secs(self.web_settle_secs)
    }

    /// Per-request probe timeout.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
