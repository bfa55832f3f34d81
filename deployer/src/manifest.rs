//! The deployment manifest.
//!
//! A manifest is the ordered list of artefacts the deployer knows about, each
//! with a source path inside the source directory, a fixed destination and a
//! permission mode. Presence in the source directory is optional but tracked
//! so the operator can decide whether to continue.

use crate::config::DeployConfig;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fmt;

/// File extensions owned by manifest entries. Any other regular file in the
/// source directory is treated as a static asset.
pub const KNOWN_EXTENSIONS: [&str; 3] = ["py", "service", "conf"];

/// The four artefacts a deployment places on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// The web application entry point.
    Application,
    /// The service-manager unit running the application.
    ServiceUnit,
    /// The web-server site definition fronting the application.
    SiteConfig,
    /// The main web-server configuration file.
    MainConfig,
}

impl ArtifactKind {
    /// All kinds in deployment order.
    pub const ALL: [Self; 4] = [
        Self::Application,
        Self::ServiceUnit,
        Self::SiteConfig,
        Self::MainConfig,
    ];

    /// Permission bits applied to the deployed copy.
    #[must_use]
    pub const fn mode(self) -> u32 {
        match self {
            Self::Application => 0o755,
            Self::ServiceUnit | Self::SiteConfig | Self::MainConfig => 0o644,
        }
    }

    /// Whether the destination is configuration that must be backed up before
    /// it is overwritten.
    #[must_use]
    pub const fn is_configuration(self) -> bool {
        !matches!(self, Self::Application)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Application => "application",
            Self::ServiceUnit => "service unit",
            Self::SiteConfig => "site config",
            Self::MainConfig => "main web server config",
        };
        f.write_str(label)
    }
}

/// One artefact with its source and destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    /// Which artefact this is.
    pub kind: ArtifactKind,
    /// Path inside the source directory.
    pub source: Utf8PathBuf,
    /// Fixed destination on the host.
    pub destination: Utf8PathBuf,
}

impl ManifestEntry {
    /// Permission bits for the deployed copy.
    #[must_use]
    pub const fn mode(&self) -> u32 {
        self.kind.mode()
    }

    /// Whether the source file exists.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.source.is_file()
    }
}

/// Ordered set of artefacts for one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentManifest {
    source_dir: Utf8PathBuf,
    entries: Vec<ManifestEntry>,
}

/// Result of checking the source directory against the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceReport {
    /// Entries whose source file exists.
    pub present: Vec<ArtifactKind>,
    /// Entries whose source file is absent.
    pub missing: Vec<ArtifactKind>,
}

impl PresenceReport {
    /// Returns `true` when every manifest file is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

impl DeploymentManifest {
    /// Builds the manifest described by `config`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fractal_deployer::config::DeployConfig;
    /// use fractal_deployer::manifest::{ArtifactKind, DeploymentManifest};
    ///
    /// let manifest = DeploymentManifest::from_config(&DeployConfig::default());
    /// let unit = manifest.entry(ArtifactKind::ServiceUnit).unwrap();
    /// assert_eq!(unit.destination, "/etc/systemd/system/fractal.service");
    /// ```
    #[must_use]
    pub fn from_config(config: &DeployConfig) -> Self {
        let paths = &config.paths;
        let source_dir = config.source_dir.clone();
        let entries = ArtifactKind::ALL
            .into_iter()
            .map(|kind| {
                let (file_name, destination) = match kind {
                    ArtifactKind::Application => {
                        (&paths.app_file, paths.app_dir.join(&paths.app_file))
                    }
                    ArtifactKind::ServiceUnit => {
                        (&paths.unit_file, paths.unit_dir.join(&paths.unit_file))
                    }
                    ArtifactKind::SiteConfig => (&paths.site_file, paths.site_available.clone()),
                    ArtifactKind::MainConfig => {
                        (&paths.main_config_file, paths.main_config.clone())
                    }
                };
                ManifestEntry {
                    kind,
                    source: source_dir.join(file_name),
                    destination,
                }
            })
            .collect();

        Self {
            source_dir,
            entries,
        }
    }

    /// Directory the manifest sources live in.
    #[must_use]
    pub fn source_dir(&self) -> &Utf8Path {
        &self.source_dir
    }

    /// All entries in deployment order.
    #[must_use]
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Looks up the entry for `kind`.
    #[must_use]
    pub fn entry(&self, kind: ArtifactKind) -> Option<&ManifestEntry> {
        self.entries.iter().find(|entry| entry.kind == kind)
    }

    /// Returns `true` when `path` should be swept up as a static asset: it
    /// has no manifest extension and its name is not a manifest source.
    #[must_use]
    pub fn is_static_asset(&self, path: &Utf8Path) -> bool {
        let is_source = self
            .entries
            .iter()
            .any(|entry| entry.source.file_name() == path.file_name());
        !is_source && is_static_asset(path)
    }

    /// Records which entries are present in the source directory.
    #[must_use]
    pub fn check_presence(&self) -> PresenceReport {
        let (present, missing): (Vec<_>, Vec<_>) =
            self.entries.iter().partition(|entry| entry.is_present());
        PresenceReport {
            present: present.into_iter().map(|entry| entry.kind).collect(),
            missing: missing.into_iter().map(|entry| entry.kind).collect(),
        }
    }
}

/// Returns `true` when `path` should be swept up as a static asset.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use fractal_deployer::manifest::is_static_asset;
///
/// assert!(is_static_asset(Utf8Path::new("favicon.ico")));
/// assert!(is_static_asset(Utf8Path::new("README")));
/// assert!(!is_static_asset(Utf8Path::new("fractal_app.py")));
/// ```
#[must_use]
pub fn is_static_asset(path: &Utf8Path) -> bool {
    path.extension()
        .is_none_or(|ext| !KNOWN_EXTENSIONS.contains(&ext))
}
