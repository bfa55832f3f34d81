//! File placement for the deploy step.
//!
//! Manifest files are copied to their fixed destinations with fixed
//! permission modes; a failed copy aborts the run. Everything else in the
//! source directory that is neither a manifest source nor carries a manifest
//! extension is copied into the application directory as a static asset, best
//! effort.

use crate::error::{DeployError, Result};
use crate::manifest::{ArtifactKind, DeploymentManifest, ManifestEntry};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;

/// A manifest file placed on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployedFile {
    /// Which artefact was placed.
    pub kind: ArtifactKind,
    /// Where it was placed.
    pub destination: Utf8PathBuf,
    /// Permission bits applied.
    pub mode: u32,
    /// Lowercase hex SHA-256 of the deployed content.
    pub sha256: String,
}

/// Static assets swept from the source directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetSweep {
    /// Assets copied into the application directory.
    pub copied: Vec<Utf8PathBuf>,
    /// Assets that could not be copied, with the reason.
    pub failures: Vec<String>,
}

/// Copies a manifest entry to its destination and applies its mode.
///
/// Parent directories are created as needed.
///
/// # Errors
///
/// Returns [`DeployError::CopyFailed`] if the copy, the directory creation or
/// the permission change fails.
pub fn stage_entry(entry: &ManifestEntry) -> Result<DeployedFile> {
    let copy_failed = |e: io::Error| DeployError::CopyFailed {
        from: entry.source.clone(),
        to: entry.destination.clone(),
        reason: e.to_string(),
    };

    if let Some(parent) = entry.destination.parent() {
        fs::create_dir_all(parent).map_err(copy_failed)?;
    }
    fs::copy(&entry.source, &entry.destination).map_err(copy_failed)?;
    set_mode(&entry.destination, entry.mode()).map_err(copy_failed)?;
    let sha256 = file_sha256(&entry.destination).map_err(copy_failed)?;

    debug!(
        "placed {} at {} ({:o})",
        entry.kind,
        entry.destination,
        entry.mode()
    );
    Ok(DeployedFile {
        kind: entry.kind,
        destination: entry.destination.clone(),
        mode: entry.mode(),
        sha256,
    })
}

/// Copies every non-manifest regular file from the manifest's source
/// directory into `app_dir`.
///
/// Hidden files are skipped. Failures are collected for the caller to report
/// as warnings.
#[must_use]
pub fn sweep_static_assets(manifest: &DeploymentManifest, app_dir: &Utf8Path) -> AssetSweep {
    let mut sweep = AssetSweep::default();
    let source_dir = manifest.source_dir();

    let entries = match source_dir.read_dir_utf8() {
        Ok(entries) => entries,
        Err(e) => {
            sweep
                .failures
                .push(format!("could not list {source_dir}: {e}"));
            return sweep;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file()
            || entry.file_name().starts_with('.')
            || !manifest.is_static_asset(path)
        {
            continue;
        }
        let destination = app_dir.join(entry.file_name());
        let copied = fs::create_dir_all(app_dir).and_then(|()| fs::copy(path, &destination));
        match copied {
            Ok(_) => sweep.copied.push(destination),
            Err(e) => sweep
                .failures
                .push(format!("could not copy static asset {path}: {e}")),
        }
    }

    sweep.copied.sort();
    sweep
}

/// Points `enabled` at `available`, replacing whatever was there.
///
/// # Errors
///
/// Returns any I/O error; callers treat this as a warning.
pub fn enable_site(available: &Utf8Path, enabled: &Utf8Path) -> io::Result<()> {
    if let Some(parent) = enabled.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::symlink_metadata(enabled).is_ok() {
        fs::remove_file(enabled)?;
    }
    link(available, enabled)
}

#[cfg(unix)]
fn link(original: &Utf8Path, link_path: &Utf8Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link_path)
}

#[cfg(not(unix))]
fn link(original: &Utf8Path, link_path: &Utf8Path) -> io::Result<()> {
    fs::copy(original, link_path).map(|_| ())
}

#[cfg(unix)]
fn set_mode(path: &Utf8Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Utf8Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Computes the lowercase hex SHA-256 digest of a file.
///
/// # Errors
///
/// Returns any I/O error from reading the file.
pub fn file_sha256(path: &Utf8Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}
