use std::fs::File;
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};
use zip::ZipArchive;

use crate::core::cancel::CancellationToken;
use crate::error::ExtractError;

/// What an extraction wrote to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub files: usize,
    pub directories: usize,
    pub bytes_written: u64,
}

/// Expands ZIP archives into a destination directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct Extractor;

impl Extractor {
    pub fn new() -> Self {
        Self
    }

    /// Writes every entry of `archive_path` below `destination`.
    ///
    /// Entry paths are sanitized before anything is written; an entry that
    /// would land outside `destination` aborts the extraction. Entries written
    /// before a failure stay on disk.
    pub fn extract(
        &self,
        archive_path: &Path,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExtractReport, ExtractError> {
        info!("Extracting {archive_path:?} to {destination:?}");

        let file = File::open(archive_path).map_err(|source| ExtractError::Open {
            path: archive_path.to_path_buf(),
            source,
        })?;
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|source| ExtractError::Corrupt {
                path: archive_path.to_path_buf(),
                source,
            })?;

        create_dir(destination)?;

        let mut report = ExtractReport::default();
        for i in 0..archive.len() {
            if cancel.is_cancelled() {
                return Err(ExtractError::Cancelled {
                    path: archive_path.to_path_buf(),
                });
            }

            let mut entry = archive
                .by_index(i)
                .map_err(|source| ExtractError::Corrupt {
                    path: archive_path.to_path_buf(),
                    source,
                })?;

            let name = entry.name().to_string();
            let relative = sanitize_entry_path(&name)?;
            if relative.as_os_str().is_empty() {
                continue;
            }
            let outpath = destination.join(&relative);

            if entry.is_dir() {
                create_dir(&outpath)?;
                report.directories += 1;
            } else {
                if let Some(parent) = outpath.parent() {
                    create_dir(parent)?;
                }
                let mut outfile = File::create(&outpath).map_err(|source| ExtractError::Write {
                    path: outpath.clone(),
                    source,
                })?;
                let written =
                    std::io::copy(&mut entry, &mut outfile).map_err(|source| {
                        ExtractError::Write {
                            path: outpath.clone(),
                            source,
                        }
                    })?;
                report.files += 1;
                report.bytes_written += written;
            }

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    // Owner keeps access so later entries and cleanup still work.
                    let owner = if entry.is_dir() { 0o700 } else { 0o600 };
                    let perms = std::fs::Permissions::from_mode((mode & 0o777) | owner);
                    std::fs::set_permissions(&outpath, perms).map_err(|source| {
                        ExtractError::Write {
                            path: outpath.clone(),
                            source,
                        }
                    })?;
                }
            }
        }

        debug!(
            "Extracted {} files and {} directories ({} bytes)",
            report.files, report.directories, report.bytes_written
        );
        Ok(report)
    }
}

/// Turns a raw archive entry name into a path relative to the destination.
///
/// Backslashes count as separators, `.` is dropped and `..` pops the previous
/// component. Absolute names, drive prefixes, NUL bytes and any `..` that
/// would climb above the destination are rejected.
pub fn sanitize_entry_path(name: &str) -> Result<PathBuf, ExtractError> {
    let unsafe_entry = || ExtractError::UnsafeEntry {
        entry: name.to_string(),
    };

    if name.contains('\0') {
        return Err(unsafe_entry());
    }

    let normalized = name.replace('\\', "/");
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();

    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(unsafe_entry());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(unsafe_entry()),
        }
    }

    // "C:foo" is not a prefix on Unix but must not become a relative path either.
    if parts
        .first()
        .and_then(|p| p.to_str())
        .is_some_and(|p| {
            let bytes = p.as_bytes();
            bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
        })
    {
        return Err(unsafe_entry());
    }

    Ok(parts.iter().collect())
}

fn create_dir(path: &Path) -> Result<(), ExtractError> {
    std::fs::create_dir_all(path).map_err(|source| ExtractError::CreateDirectory {
        path: path.to_path_buf(),
        source,
    })
}
