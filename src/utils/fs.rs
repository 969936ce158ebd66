use crate::error::{CleanupError, DatasetError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => DatasetError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => DatasetError::from(e),
        })?;
    }
    Ok(())
}

/// Recursively deletes `path` and everything below it.
///
/// A path that does not exist is reported as [`CleanupError::NotFound`] on
/// every call; callers that consider "already gone" a success must match on
/// it themselves.
pub fn remove_tree(path: &Path) -> std::result::Result<(), CleanupError> {
    if std::fs::symlink_metadata(path).is_err() {
        return Err(CleanupError::NotFound {
            path: path.to_path_buf(),
        });
    }

    info!("Deleting temporary directory {}", path.display());
    std::fs::remove_dir_all(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => CleanupError::NotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => CleanupError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => CleanupError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

/// Moves every entry of `src` into `dst`, merging directories that exist on
/// both sides and replacing files with the same name.
pub fn merge_dir_into(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;

    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            if dst_path.is_dir() {
                merge_dir_into(&src_path, &dst_path)?;
                continue;
            }
            if dst_path.exists() {
                std::fs::remove_file(&dst_path)?;
            }
        } else if dst_path.is_dir() {
            std::fs::remove_dir_all(&dst_path)?;
        }

        std::fs::rename(&src_path, &dst_path)?;
    }

    Ok(())
}

/// Resolves `path` against the current directory without touching the disk.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}

/// Total size in bytes of all files below `path`.
pub fn dir_size(path: &Path) -> Result<u64> {
    let mut total = 0;

    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let metadata = entry.metadata()?;

        if metadata.is_file() {
            total += metadata.len();
        } else if metadata.is_dir() {
            total += dir_size(&entry.path())?;
        }
    }

    Ok(total)
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} bytes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populate(root: &Path) {
        std::fs::create_dir_all(root.join("sub").join("deeper")).unwrap();
        std::fs::write(root.join("top.txt"), "top").unwrap();
        std::fs::write(root.join("sub").join("mid.txt"), "mid").unwrap();
        std::fs::write(root.join("sub").join("deeper").join("low.txt"), "low").unwrap();
    }

    #[test]
    fn test_remove_tree_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        populate(&staging);

        remove_tree(&staging).unwrap();
        assert!(!staging.exists());
        assert!(dir.path().exists());
    }

    #[test]
    fn test_remove_tree_twice_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        populate(&staging);

        remove_tree(&staging).unwrap();
        for _ in 0..2 {
            let err = remove_tree(&staging).unwrap_err();
            assert!(matches!(err, CleanupError::NotFound { .. }));
        }
    }

    #[test]
    fn test_merge_dir_into_merges_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        populate(&src);
        std::fs::create_dir_all(dst.join("sub")).unwrap();
        std::fs::write(dst.join("top.txt"), "old").unwrap();
        std::fs::write(dst.join("sub").join("keep.txt"), "keep").unwrap();

        merge_dir_into(&src, &dst).unwrap();

        assert_eq!(std::fs::read_to_string(dst.join("top.txt")).unwrap(), "top");
        assert_eq!(std::fs::read_to_string(dst.join("sub").join("keep.txt")).unwrap(), "keep");
        assert_eq!(std::fs::read_to_string(dst.join("sub").join("mid.txt")).unwrap(), "mid");
        assert!(dst.join("sub").join("deeper").join("low.txt").exists());
        assert!(!src.join("top.txt").exists());
    }

    #[test]
    fn test_dir_size_and_format() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());
        assert_eq!(dir_size(dir.path()).unwrap(), 9);
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
