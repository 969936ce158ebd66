use crate::core::cancel::CancellationToken;
use crate::core::config::Config;
use crate::core::dataset::{DatasetSource, Pipeline};
use crate::core::download::Downloader;
use crate::error::Result;
use crate::utils::console::ConsoleProgress;
use crate::utils::fs::format_size;
use std::path::Path;

pub fn download_dataset(
    name: &str,
    destination: Option<&Path>,
    force: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let config = Config::load()?;
    let registry = config.registry()?;
    let dataset = registry.find(name)?;

    let destination = match destination {
        Some(path) => path.to_path_buf(),
        None => config.get_dataset_dir(dataset.name()),
    };

    println!("Acquiring dataset: {}", dataset.name());

    let downloader = Downloader::with_options(config.download_options())?;
    let mut progress = ConsoleProgress::stdout();
    // Only atomic downloads guarantee an existing archive is complete.
    let reuse = config.atomic_downloads && !force;
    let mut pipeline = Pipeline::new(&downloader, &mut progress)
        .with_cancellation(cancel.clone())
        .with_archive_dir(&config.archive_dir)
        .reuse_existing_archives(reuse);

    let acquired = dataset.download_and_extract(&destination, &mut pipeline)?;

    println!(
        "✅ Extracted {} files ({}) into {}",
        acquired.report.files,
        format_size(acquired.report.bytes_written),
        acquired.destination.display()
    );
    println!("   Archive kept at {}", acquired.archive.display());

    Ok(())
}
