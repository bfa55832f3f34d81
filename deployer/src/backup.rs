//! Timestamped backups of configuration that is about to be overwritten.
//!
//! A backup is a verbatim copy placed next to the original as
//! `<name>.backup.<YYYYmmdd_HHMMSS>`. Backups are additive: if that name is
//! already taken (two runs within the same second) a numeric suffix is
//! appended, so every run leaves its own copy behind.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, TimeZone};
use std::fs;
use std::io;

/// Formats the timestamp used in backup names.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use fractal_deployer::backup::backup_stamp;
///
/// let at = Utc.with_ymd_and_hms(2026, 3, 9, 14, 5, 7).unwrap();
/// assert_eq!(backup_stamp(&at), "20260309_140507");
/// ```
#[must_use]
pub fn backup_stamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Returns the first free backup path for `target` and `stamp`.
#[must_use]
pub fn backup_path(target: &Utf8Path, stamp: &str) -> Utf8PathBuf {
    let base = Utf8PathBuf::from(format!("{target}.backup.{stamp}"));
    if !exists(&base) {
        return base;
    }
    (1_u32..)
        .map(|n| Utf8PathBuf::from(format!("{base}.{n}")))
        .find(|candidate| !exists(candidate))
        .unwrap_or(base)
}

/// Copies `target` aside if it exists.
///
/// Returns the backup path, or `None` when there was nothing to back up.
/// Directories are copied recursively; symlinks inside them are recreated
/// rather than followed.
///
/// # Errors
///
/// Returns any I/O error from the copy. Callers treat this as a warning.
pub fn backup_existing(target: &Utf8Path, stamp: &str) -> io::Result<Option<Utf8PathBuf>> {
    let Ok(metadata) = fs::metadata(target) else {
        return Ok(None);
    };

    let destination = backup_path(target, stamp);
    if metadata.is_dir() {
        copy_dir(target, &destination)?;
    } else {
        fs::copy(target, &destination)?;
    }
    Ok(Some(destination))
}

fn exists(path: &Utf8Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn copy_dir(from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in from.read_dir_utf8()? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let destination = to.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir(entry.path(), &destination)?;
        } else if file_type.is_symlink() {
            copy_link(entry.path(), &destination)?;
        } else {
            fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_link(from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
    let link_target = fs::read_link(from)?;
    std::os::unix::fs::symlink(link_target, to)
}

#[cfg(not(unix))]
fn copy_link(from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}
