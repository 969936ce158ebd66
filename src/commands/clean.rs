use crate::error::{CleanupError, Result};
use crate::utils::fs::{absolute, remove_tree};
use std::path::Path;

/// Removes a leftover staging (or any other) directory tree.
pub fn clean_directory(path: &Path, missing_ok: bool) -> Result<()> {
    let path = absolute(path)?;

    match remove_tree(&path) {
        Ok(()) => {
            println!("✅ Removed {}", path.display());
            Ok(())
        }
        Err(CleanupError::NotFound { .. }) if missing_ok => {
            println!("Nothing to remove at {}", path.display());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
