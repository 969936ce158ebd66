use crate::core::cancel::CancellationToken;
use crate::core::config::Config;
use crate::core::download::Downloader;
use crate::error::Result;
use crate::utils::console::ConsoleProgress;
use std::path::Path;

pub fn fetch_url(url: &str, output: Option<&Path>, cancel: &CancellationToken) -> Result<()> {
    let config = Config::load()?;
    let downloader = Downloader::with_options(config.download_options())?;
    let mut progress = ConsoleProgress::stdout();

    let path = downloader.download_file(url, output, &mut progress, cancel)?;

    println!("✅ Saved to {}", path.display());
    Ok(())
}
