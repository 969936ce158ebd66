use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatasetError>;

/// Failure while streaming a remote resource to disk.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Transfer from {url} interrupted after {received} bytes: {source}")]
    Stream {
        url: String,
        received: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("Transfer from {url} ended after {received} of {expected} bytes")]
    Incomplete {
        url: String,
        expected: u64,
        received: u64,
    },

    #[error("Cannot write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download of {url} was cancelled")]
    Cancelled { url: String },
}

/// Failure while expanding an archive.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Cannot open archive {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Archive entry '{entry}' escapes the destination directory")]
    UnsafeEntry { entry: String },

    #[error("Cannot create directory {path:?}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot clear stale staging directory: {source}")]
    StaleStaging {
        #[source]
        source: CleanupError,
    },

    #[error("Archive entry '{entry}' collides with the staging directory")]
    StagingCollision { entry: String },

    #[error("Extraction of {path:?} was cancelled")]
    Cancelled { path: PathBuf },
}

/// Failure while removing a directory tree.
#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("Directory not found: {path:?}")]
    NotFound { path: PathBuf },

    #[error("Permission denied: {path:?}")]
    PermissionDenied { path: PathBuf },

    #[error("Cannot remove {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Stage of an acquisition at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Download,
    Extract,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Download => "download",
            Stage::Extract => "extract",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Failure of a whole dataset acquisition, tagged with the stage that failed.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Download stage failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Extract stage failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Cleanup stage failed: {0}")]
    Cleanup(#[from] CleanupError),
}

impl AcquisitionError {
    pub fn stage(&self) -> Stage {
        match self {
            AcquisitionError::Download(_) => Stage::Download,
            AcquisitionError::Extract(_) => Stage::Extract,
            AcquisitionError::Cleanup(_) => Stage::Cleanup,
        }
    }
}

/// Errors surfaced by configuration, the registry and the command layer.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dataset '{name}' not found")]
    DatasetNotFound { name: String },

    #[error("Registry error: {message}")]
    RegistryError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Home directory not found")]
    HomeDirectoryNotFound,

    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Cleanup(#[from] CleanupError),

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
}

impl DatasetError {
    pub fn config_error<S: Into<String>>(message: S) -> Self {
        DatasetError::ConfigError {
            message: message.into(),
        }
    }

    pub fn registry_error<S: Into<String>>(message: S) -> Self {
        DatasetError::RegistryError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquisition_error_keeps_stage() {
        let err: AcquisitionError = DownloadError::Status {
            url: "http://host/set.zip".to_string(),
            status: 404,
        }
        .into();
        assert_eq!(err.stage(), Stage::Download);
        assert!(err.to_string().contains("HTTP 404"));

        let err: AcquisitionError = ExtractError::UnsafeEntry {
            entry: "../evil.txt".to_string(),
        }
        .into();
        assert_eq!(err.stage(), Stage::Extract);

        let err: AcquisitionError = CleanupError::NotFound {
            path: PathBuf::from("/tmp/gone"),
        }
        .into();
        assert_eq!(err.stage(), Stage::Cleanup);
        assert_eq!(err.stage().to_string(), "cleanup");
    }
}
