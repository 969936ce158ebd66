//! OMR dataset acquisition library
//!
//! Streams dataset archives over HTTP, extracts them with path sanitization and
//! removes temporary staging directories. The `omr-datasets` binary is a thin
//! command layer over these modules.

pub mod commands;
pub mod core;
pub mod error;
pub mod utils;

pub use crate::core::cancel::CancellationToken;
pub use crate::core::dataset::{
    Acquired, Acquisition, AcquisitionState, DatasetSource, Pipeline, StagingPolicy,
};
pub use crate::core::download::{DownloadOptions, Downloader};
pub use crate::core::extract::{ExtractReport, Extractor};
pub use crate::core::progress::{NoProgress, ProgressObserver, TransferProgress};
pub use crate::core::registry::{ArchiveDataset, Registry};
pub use crate::error::{AcquisitionError, CleanupError, DownloadError, ExtractError, Stage};
