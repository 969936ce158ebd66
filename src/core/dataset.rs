//! Dataset acquisition: download an archive, extract it, clean up staging.
//!
//! A [`DatasetSource`] names a URL and an archive filename. A [`Pipeline`]
//! owns the shared mechanics and drives each acquisition through the
//! [`AcquisitionState`] machine. Failures abort the remaining stages and leave
//! whatever was written on disk.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::cancel::CancellationToken;
use crate::core::download::Downloader;
use crate::core::extract::{ExtractReport, Extractor};
use crate::core::progress::ProgressObserver;
use crate::error::{AcquisitionError, DownloadError, ExtractError, Stage};
use crate::utils::fs::{merge_dir_into, remove_tree};

/// Where an archive is expanded before its contents reach the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingPolicy {
    /// Extract into a hidden directory inside the destination, merge, then
    /// remove the staging directory.
    #[default]
    Staged,
    /// Extract straight into the destination.
    Direct,
}

/// One acquirable dataset.
pub trait DatasetSource {
    fn name(&self) -> &str;

    fn download_url(&self) -> &str;

    /// File name the archive is stored under.
    fn archive_filename(&self) -> &str;

    fn staging(&self) -> StagingPolicy {
        StagingPolicy::Staged
    }

    /// Downloads the archive and places its contents under `destination`.
    ///
    /// Overrides must keep the same guarantee: on success every archive file
    /// exists below `destination` and no staging directory is left behind.
    fn download_and_extract(
        &self,
        destination: &Path,
        pipeline: &mut Pipeline<'_>,
    ) -> Result<Acquired, AcquisitionError> {
        pipeline.acquire(self, destination)
    }
}

/// Outcome of a successful acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquired {
    pub dataset: String,
    pub archive: PathBuf,
    pub destination: PathBuf,
    pub report: ExtractReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Idle,
    Downloading,
    Downloaded,
    Extracting,
    Extracted,
    CleaningUp,
    Done,
    Failed(Stage),
}

impl AcquisitionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AcquisitionState::Done | AcquisitionState::Failed(_))
    }

    pub fn can_transition_to(&self, next: AcquisitionState) -> bool {
        use AcquisitionState::*;

        if self.is_terminal() {
            return false;
        }

        matches!(
            (*self, next),
            (_, Failed(_))
                | (Idle, Downloading)
                | (Downloading, Downloaded)
                | (Downloaded, Extracting)
                | (Extracting, Extracted)
                | (Extracted, CleaningUp)
                | (Extracted, Done)
                | (CleaningUp, Done)
        )
    }
}

/// State record of one acquisition.
#[derive(Debug, Clone)]
pub struct Acquisition {
    dataset: String,
    history: Vec<AcquisitionState>,
}

impl Acquisition {
    pub fn new(dataset: &str) -> Self {
        Self {
            dataset: dataset.to_string(),
            history: vec![AcquisitionState::Idle],
        }
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn state(&self) -> AcquisitionState {
        self.history
            .last()
            .copied()
            .unwrap_or(AcquisitionState::Idle)
    }

    /// Every state visited so far, starting with `Idle`.
    pub fn history(&self) -> &[AcquisitionState] {
        &self.history
    }

    /// Moves to `next`; returns `false` and stays put if the move is illegal.
    pub fn advance(&mut self, next: AcquisitionState) -> bool {
        let current = self.state();
        if !current.can_transition_to(next) {
            warn!(
                "{}: refusing transition {current:?} -> {next:?}",
                self.dataset
            );
            return false;
        }
        debug!("{}: {current:?} -> {next:?}", self.dataset);
        self.history.push(next);
        true
    }
}

/// Shared download/extract/cleanup mechanics for dataset sources.
pub struct Pipeline<'a> {
    downloader: &'a Downloader,
    extractor: Extractor,
    observer: &'a mut dyn ProgressObserver,
    cancel: CancellationToken,
    archive_dir: Option<PathBuf>,
    reuse_existing: bool,
    last: Option<Acquisition>,
}

impl<'a> Pipeline<'a> {
    pub fn new(downloader: &'a Downloader, observer: &'a mut dyn ProgressObserver) -> Self {
        Self {
            downloader,
            extractor: Extractor::new(),
            observer,
            cancel: CancellationToken::new(),
            archive_dir: None,
            reuse_existing: false,
            last: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Directory archives are written to. Defaults to the current directory.
    pub fn with_archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }

    /// Skip the download when the archive file already exists.
    ///
    /// Only safe together with atomic downloads, which never leave a partial
    /// file under the final name.
    pub fn reuse_existing_archives(mut self, reuse: bool) -> Self {
        self.reuse_existing = reuse;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// State record of the most recent acquisition, successful or not.
    pub fn last_acquisition(&self) -> Option<&Acquisition> {
        self.last.as_ref()
    }

    /// Absolute path the archive of `source` is stored at.
    pub fn archive_path<S: DatasetSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<PathBuf, DownloadError> {
        let path = match &self.archive_dir {
            Some(dir) => dir.join(source.archive_filename()),
            None => PathBuf::from(source.archive_filename()),
        };
        std::path::absolute(&path).map_err(|e| DownloadError::Write { path, source: e })
    }

    /// Runs the default composition for `source`.
    pub fn acquire<S: DatasetSource + ?Sized>(
        &mut self,
        source: &S,
        destination: &Path,
    ) -> Result<Acquired, AcquisitionError> {
        let mut acquisition = Acquisition::new(source.name());
        let result = self.run(source, destination, &mut acquisition);

        match &result {
            Ok(acquired) => info!(
                "{} ready in {:?} ({} files)",
                acquired.dataset, acquired.destination, acquired.report.files
            ),
            Err(e) => {
                acquisition.advance(AcquisitionState::Failed(e.stage()));
                warn!("{}: {} stage failed: {e}", source.name(), e.stage());
            }
        }

        self.last = Some(acquisition);
        result
    }

    fn run<S: DatasetSource + ?Sized>(
        &mut self,
        source: &S,
        destination: &Path,
        acquisition: &mut Acquisition,
    ) -> Result<Acquired, AcquisitionError> {
        let destination =
            std::path::absolute(destination).map_err(|e| ExtractError::CreateDirectory {
                path: destination.to_path_buf(),
                source: e,
            })?;

        acquisition.advance(AcquisitionState::Downloading);
        let archive = self.fetch_archive(source)?;
        acquisition.advance(AcquisitionState::Downloaded);

        acquisition.advance(AcquisitionState::Extracting);
        let staging = match source.staging() {
            StagingPolicy::Staged => Some(staging_dir(&destination, source.archive_filename())),
            StagingPolicy::Direct => None,
        };

        if let Some(staging) = &staging {
            if staging.exists() {
                warn!("Removing stale staging directory {staging:?}");
                remove_tree(staging).map_err(|source| ExtractError::StaleStaging { source })?;
            }
        }

        let target = staging.as_deref().unwrap_or(&destination);
        let report = self.extractor.extract(&archive, target, &self.cancel)?;

        if let Some(staging) = &staging {
            // An entry with the staging directory's own name would merge back into it.
            if let Some(name) = staging.file_name() {
                if staging.join(name).exists() {
                    return Err(ExtractError::StagingCollision {
                        entry: name.to_string_lossy().into_owned(),
                    }
                    .into());
                }
            }
            merge_dir_into(staging, &destination).map_err(|e| ExtractError::Write {
                path: destination.clone(),
                source: e,
            })?;
        }
        acquisition.advance(AcquisitionState::Extracted);

        if let Some(staging) = &staging {
            acquisition.advance(AcquisitionState::CleaningUp);
            remove_tree(staging)?;
        }
        acquisition.advance(AcquisitionState::Done);

        Ok(Acquired {
            dataset: source.name().to_string(),
            archive,
            destination,
            report,
        })
    }

    fn fetch_archive<S: DatasetSource + ?Sized>(
        &mut self,
        source: &S,
    ) -> Result<PathBuf, DownloadError> {
        let archive = self.archive_path(source)?;

        if self.reuse_existing && archive.is_file() {
            info!("Reusing existing archive {archive:?}");
            return Ok(archive);
        }

        if let Some(parent) = archive.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DownloadError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        self.downloader.download_file(
            source.download_url(),
            Some(&archive),
            &mut *self.observer,
            &self.cancel,
        )
    }
}

/// Hidden staging directory for `archive_filename` inside `destination`.
pub fn staging_dir(destination: &Path, archive_filename: &str) -> PathBuf {
    destination.join(format!(".{archive_filename}.staging"))
}
