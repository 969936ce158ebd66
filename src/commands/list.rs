use crate::core::config::Config;
use crate::core::dataset::{DatasetSource, StagingPolicy};
use crate::error::Result;
use crate::utils::fs::{dir_size, format_size};

pub fn list_datasets() -> Result<()> {
    let config = Config::load()?;
    let registry = config.registry()?;

    if registry.is_empty() {
        println!("No datasets registered.");
        return Ok(());
    }

    println!("Known datasets:");
    println!();

    for dataset in registry.iter() {
        let archive = config.archive_dir.join(dataset.archive_filename());
        let extracted = config.get_dataset_dir(dataset.name());

        let mut status = Vec::new();
        if let Ok(metadata) = std::fs::metadata(&archive) {
            status.push(format!("archive {}", format_size(metadata.len())));
        }
        if extracted.is_dir() {
            let size = dir_size(&extracted).unwrap_or(0);
            status.push(format!("extracted {}", format_size(size)));
        }

        let staging = match dataset.staging() {
            StagingPolicy::Staged => "staged",
            StagingPolicy::Direct => "direct",
        };

        println!("  {} ({}, {staging})", dataset.name(), dataset.archive_filename());
        if let Some(description) = &dataset.description {
            println!("    {description}");
        }
        println!("    {}", dataset.download_url());
        if !status.is_empty() {
            println!("    ✅ {}", status.join(", "));
        }
    }

    println!();
    println!("To download a dataset, run:");
    println!("  omr-datasets download <name>");

    Ok(())
}
