use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use omr_datasets::{commands, CancellationToken};

#[derive(Parser)]
#[clap(name = "omr-datasets")]
#[clap(about = "Download and extract Optical Music Recognition datasets")]
#[clap(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Show debug logging (RUST_LOG takes precedence)
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the known datasets
    List,
    /// Download a dataset and extract it
    Download {
        /// Dataset name (see `list`)
        name: String,
        /// Directory to extract into (default: <data_dir>/<name>)
        #[clap(short, long)]
        destination: Option<PathBuf>,
        /// Download again even if the archive already exists
        #[clap(long)]
        force: bool,
    },
    /// Download a single URL to a local file
    Fetch {
        url: String,
        /// Output file (default: last segment of the URL path)
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Extract a local ZIP archive
    Extract {
        archive: PathBuf,
        destination: PathBuf,
    },
    /// Remove a directory tree such as a leftover staging directory
    Clean {
        path: PathBuf,
        /// Treat a missing directory as success
        #[clap(long)]
        missing_ok: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        // A second Ctrl-C exits even if the current step is stuck.
        if handler_token.is_cancelled() {
            std::process::exit(130);
        }
        eprintln!("Cancelling, press Ctrl-C again to exit immediately");
        handler_token.cancel();
    })?;

    let result = match cli.command {
        Commands::List => commands::list::list_datasets().map_err(|e| anyhow::anyhow!(e)),
        Commands::Download {
            name,
            destination,
            force,
        } => commands::download::download_dataset(&name, destination.as_deref(), force, &cancel)
            .map_err(|e| anyhow::anyhow!(e)),
        Commands::Fetch { url, output } => {
            commands::fetch::fetch_url(&url, output.as_deref(), &cancel)
                .map_err(|e| anyhow::anyhow!(e))
        }
        Commands::Extract {
            archive,
            destination,
        } => commands::extract::extract_archive(&archive, &destination, &cancel)
            .map_err(|e| anyhow::anyhow!(e)),
        Commands::Clean { path, missing_ok } => {
            commands::clean::clean_directory(&path, missing_ok).map_err(|e| anyhow::anyhow!(e))
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    Ok(())
}
