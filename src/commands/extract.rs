use crate::core::cancel::CancellationToken;
use crate::core::extract::Extractor;
use crate::error::Result;
use crate::utils::fs::{absolute, format_size};
use std::path::Path;

pub fn extract_archive(archive: &Path, destination: &Path, cancel: &CancellationToken) -> Result<()> {
    let archive = absolute(archive)?;
    let destination = absolute(destination)?;

    println!("Extracting {} into {}", archive.display(), destination.display());
    let report = Extractor::new().extract(&archive, &destination, cancel)?;

    println!(
        "✅ {} files, {} directories, {}",
        report.files,
        report.directories,
        format_size(report.bytes_written)
    );
    Ok(())
}
