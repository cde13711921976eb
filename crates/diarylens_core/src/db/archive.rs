//! One-shot extraction of archived stores.
//!
//! # Responsibility
//! - Detect archive locations and verify they are well-formed zip files.
//! - Extract (and decrypt, when a secret is given) the single store file next
//!   to the archive.
//!
//! # Invariants
//! - Extraction is skipped when the target file already exists, so running
//!   this on every startup is safe.
//! - Only the final path component of the entry name is used; extraction
//!   never writes outside the archive's directory.
//! - The target name only ever appears once the whole entry has been written.

use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use zip::result::ZipError;
use zip::ZipArchive;

const ARCHIVE_EXTENSION: &str = "zip";
const PARTIAL_SUFFIX: &str = ".partial";

/// Failure while unpacking an archived store.
#[derive(Debug)]
pub enum ArchiveError {
    /// Location looks like an archive but is not a readable zip file.
    Format { path: PathBuf, message: String },
    /// Archive has no entries to extract.
    Empty(PathBuf),
    /// Entry could not be decrypted with the supplied secret (or none was
    /// supplied for an encrypted entry).
    Decryption {
        entry: String,
        password_supplied: bool,
    },
    Io { path: PathBuf, source: io::Error },
    Zip { entry: String, source: ZipError },
}

impl Display for ArchiveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Format { path, message } => {
                write!(f, "{} is not a valid store archive: {message}", path.display())
            }
            Self::Empty(path) => write!(f, "store archive {} contains no entries", path.display()),
            Self::Decryption {
                entry,
                password_supplied: true,
            } => write!(f, "wrong password for archive entry `{entry}`"),
            Self::Decryption {
                entry,
                password_supplied: false,
            } => write!(f, "archive entry `{entry}` is encrypted and no password was given"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Zip { entry, source } => {
                write!(f, "failed to extract archive entry `{entry}`: {source}")
            }
        }
    }
}

impl Error for ArchiveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Zip { source, .. } => Some(source),
            Self::Format { .. } | Self::Empty(_) | Self::Decryption { .. } => None,
        }
    }
}

/// Whether `location` names an archive rather than a plain store file.
pub fn is_archive_path(location: &Path) -> bool {
    location
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}

/// Resolves the path of the store file the connection should open.
///
/// Plain locations are returned unchanged. Archive locations are verified,
/// their first entry is extracted into the same directory (unless a file of
/// that name already exists) and the extracted path is returned.
///
/// # Errors
/// - [`ArchiveError::Format`] when the archive is unreadable or its first
///   entry is not a regular file.
/// - [`ArchiveError::Empty`] when the archive has no entries.
/// - [`ArchiveError::Decryption`] on a wrong or missing secret.
/// - [`ArchiveError::Io`] / [`ArchiveError::Zip`] when writing the entry fails.
pub fn provision_store(location: &Path, password: Option<&str>) -> Result<PathBuf, ArchiveError> {
    if !is_archive_path(location) {
        return Ok(location.to_path_buf());
    }

    let started_at = Instant::now();
    let file = File::open(location).map_err(|source| ArchiveError::Io {
        path: location.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(file).map_err(|err| ArchiveError::Format {
        path: location.to_path_buf(),
        message: err.to_string(),
    })?;

    if archive.is_empty() {
        return Err(ArchiveError::Empty(location.to_path_buf()));
    }

    let (entry_name, file_name) = first_entry_name(&mut archive, location)?;
    let directory = location.parent().unwrap_or_else(|| Path::new(""));
    let target = directory.join(file_name);

    if target.exists() {
        info!(
            "event=archive_extract module=db status=skipped reason=target_exists target={}",
            target.display()
        );
        return Ok(target);
    }

    info!(
        "event=archive_extract module=db status=start archive={} entry={} password_supplied={}",
        location.display(),
        entry_name,
        password.is_some()
    );

    match extract_entry(&mut archive, &entry_name, password, &target) {
        Ok(bytes) => {
            info!(
                "event=archive_extract module=db status=ok target={} bytes={} duration_ms={}",
                target.display(),
                bytes,
                started_at.elapsed().as_millis()
            );
            Ok(target)
        }
        Err(err) => {
            error!(
                "event=archive_extract module=db status=error archive={} duration_ms={} error={}",
                location.display(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn first_entry_name(
    archive: &mut ZipArchive<File>,
    location: &Path,
) -> Result<(String, PathBuf), ArchiveError> {
    let raw = archive.by_index_raw(0).map_err(|err| ArchiveError::Format {
        path: location.to_path_buf(),
        message: err.to_string(),
    })?;
    let entry_name = raw.name().to_string();

    if raw.is_dir() {
        return Err(ArchiveError::Format {
            path: location.to_path_buf(),
            message: format!("first entry `{entry_name}` is a directory"),
        });
    }

    let file_name = raw
        .enclosed_name()
        .and_then(|path| path.file_name().map(PathBuf::from))
        .ok_or_else(|| ArchiveError::Format {
            path: location.to_path_buf(),
            message: format!("entry name `{entry_name}` is not a safe file name"),
        })?;

    Ok((entry_name, file_name))
}

fn extract_entry(
    archive: &mut ZipArchive<File>,
    entry_name: &str,
    password: Option<&str>,
    target: &Path,
) -> Result<u64, ArchiveError> {
    let opened = match password {
        Some(secret) => archive.by_index_decrypt(0, secret.as_bytes()),
        None => archive.by_index(0),
    };
    let mut entry = opened.map_err(|err| classify_open_error(err, entry_name, password))?;

    let partial = partial_path(target);
    let written = File::create(&partial)
        .map_err(|source| ArchiveError::Io {
            path: partial.clone(),
            source,
        })
        .and_then(|file| {
            let mut writer = BufWriter::new(file);
            let bytes = io::copy(&mut entry, &mut writer).map_err(|source| ArchiveError::Io {
                path: partial.clone(),
                source,
            })?;
            writer.flush().map_err(|source| ArchiveError::Io {
                path: partial.clone(),
                source,
            })?;
            Ok(bytes)
        });

    let bytes = match written {
        Ok(bytes) => bytes,
        Err(err) => {
            let _ = fs::remove_file(&partial);
            return Err(err);
        }
    };

    fs::rename(&partial, target).map_err(|source| {
        let _ = fs::remove_file(&partial);
        ArchiveError::Io {
            path: target.to_path_buf(),
            source,
        }
    })?;

    Ok(bytes)
}

fn classify_open_error(err: ZipError, entry_name: &str, password: Option<&str>) -> ArchiveError {
    match err {
        ZipError::InvalidPassword => ArchiveError::Decryption {
            entry: entry_name.to_string(),
            password_supplied: password.is_some(),
        },
        ZipError::UnsupportedArchive(message) if message == ZipError::PASSWORD_REQUIRED => {
            ArchiveError::Decryption {
                entry: entry_name.to_string(),
                password_supplied: false,
            }
        }
        other => ArchiveError::Zip {
            entry: entry_name.to_string(),
            source: other,
        },
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}
