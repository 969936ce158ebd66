use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, info};
use url::Url;

use crate::core::cancel::CancellationToken;
use crate::core::progress::{ProgressObserver, ReportThrottle, TransferProgress};
use crate::error::DownloadError;

/// Name used when the URL path has no final segment.
pub const DEFAULT_FILENAME: &str = "downloaded.file";
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;
pub const DEFAULT_REPORT_INTERVAL: u32 = 100;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENT: &str = concat!("omr-datasets/", env!("CARGO_PKG_VERSION"));
const PARTIAL_SUFFIX: &str = ".part";
/// How often a waiting transfer looks at its cancellation token.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Chunks buffered between the network thread and the file writer.
const CHUNK_QUEUE_DEPTH: usize = 4;

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Bytes requested per read from the response body.
    pub chunk_size: usize,
    /// Number of chunks between two progress reports.
    pub report_interval: u32,
    pub connect_timeout: Duration,
    /// Deadline for the whole request, body included. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Longest wait for the response head or the next chunk. `None` waits
    /// until the server hangs up or the transfer is cancelled.
    pub stall_timeout: Option<Duration>,
    /// Stream into `<name>.part` and rename once the body is complete.
    pub atomic: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            report_interval: DEFAULT_REPORT_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: None,
            stall_timeout: Some(DEFAULT_STALL_TIMEOUT),
            atomic: false,
        }
    }
}

/// Streams HTTP resources to local files in fixed-size chunks.
pub struct Downloader {
    client: Client,
    options: DownloadOptions,
}

impl Downloader {
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_options(DownloadOptions::default())
    }

    pub fn with_options(options: DownloadOptions) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(options.connect_timeout)
            .timeout(options.timeout)
            .build()
            .map_err(DownloadError::Client)?;

        Ok(Self { client, options })
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    /// Downloads `url` and returns the absolute path of the written file.
    ///
    /// Without `destination`, the file is named after the last segment of the
    /// URL path (or [`DEFAULT_FILENAME`]) in the current directory. On failure
    /// the partially written file is left where it is.
    pub fn download_file(
        &self,
        url: &str,
        destination: Option<&Path>,
        observer: &mut dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, DownloadError> {
        let parsed = Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let target = resolve_destination(&parsed, destination)?;

        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled {
                url: url.to_string(),
            });
        }

        let transfer = spawn_transfer(self.client.clone(), parsed, self.options.chunk_size);

        let head = self.wait(url, &transfer.head, cancel, 0)?;
        let (status, total) = head.map_err(|source| DownloadError::Request {
            url: url.to_string(),
            source,
        })?;
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let write_path = if self.options.atomic {
            partial_path(&target)
        } else {
            target.clone()
        };

        info!("Downloading {url} ({total:?} bytes) into {write_path:?}");
        observer.on_start(url, total, &target);

        let mut file = File::create(&write_path).map_err(|source| DownloadError::Write {
            path: write_path.clone(),
            source,
        })?;

        let progress = self.stream_body(
            url,
            &transfer.body,
            &mut file,
            &write_path,
            total,
            observer,
            cancel,
        )?;

        file.flush()
            .and_then(|_| file.sync_all())
            .map_err(|source| DownloadError::Write {
                path: write_path.clone(),
                source,
            })?;
        drop(file);

        if let Some(expected) = total {
            if progress.bytes_transferred < expected {
                return Err(DownloadError::Incomplete {
                    url: url.to_string(),
                    expected,
                    received: progress.bytes_transferred,
                });
            }
        }

        if write_path != target {
            std::fs::rename(&write_path, &target).map_err(|source| DownloadError::Write {
                path: target.clone(),
                source,
            })?;
        }

        observer.on_finish(&progress);
        debug!(
            "Finished {url}: {} bytes written to {target:?}",
            progress.bytes_transferred
        );

        Ok(target)
    }

    #[allow(clippy::too_many_arguments)]
    fn stream_body(
        &self,
        url: &str,
        body: &Receiver<BodyEvent>,
        file: &mut File,
        path: &Path,
        total: Option<u64>,
        observer: &mut dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<TransferProgress, DownloadError> {
        let mut progress = TransferProgress::new(total);
        let mut throttle = ReportThrottle::new(self.options.report_interval);

        loop {
            let chunk = match self.wait(url, body, cancel, progress.bytes_transferred)? {
                BodyEvent::Chunk(chunk) => chunk,
                BodyEvent::End => break,
                BodyEvent::Failed(source) => {
                    return Err(DownloadError::Stream {
                        url: url.to_string(),
                        received: progress.bytes_transferred,
                        source,
                    })
                }
            };

            file.write_all(&chunk).map_err(|source| DownloadError::Write {
                path: path.to_path_buf(),
                source,
            })?;
            progress.advance(chunk.len());

            if throttle.tick() {
                observer.on_progress(&progress);
            }
        }

        Ok(progress)
    }

    /// Blocks until the network thread delivers the next message.
    ///
    /// The token is polled while waiting, so a cancel takes effect even when
    /// the connection has gone silent.
    fn wait<T>(
        &self,
        url: &str,
        events: &Receiver<T>,
        cancel: &CancellationToken,
        received: u64,
    ) -> Result<T, DownloadError> {
        let started = Instant::now();

        loop {
            if cancel.is_cancelled() {
                return Err(DownloadError::Cancelled {
                    url: url.to_string(),
                });
            }

            match events.recv_timeout(CANCEL_POLL_INTERVAL) {
                Ok(event) => return Ok(event),
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(limit) = self.options.stall_timeout {
                        if started.elapsed() >= limit {
                            return Err(DownloadError::Stream {
                                url: url.to_string(),
                                received,
                                source: io::Error::new(
                                    ErrorKind::TimedOut,
                                    format!("no data received for {limit:?}"),
                                ),
                            });
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(DownloadError::Stream {
                        url: url.to_string(),
                        received,
                        source: io::Error::new(
                            ErrorKind::BrokenPipe,
                            "transfer thread stopped unexpectedly",
                        ),
                    })
                }
            }
        }
    }
}

enum BodyEvent {
    Chunk(Vec<u8>),
    End,
    Failed(io::Error),
}

struct Transfer {
    head: Receiver<Result<(StatusCode, Option<u64>), reqwest::Error>>,
    body: Receiver<BodyEvent>,
}

/// Runs the blocking request on its own thread and forwards the response head
/// and body chunks. The thread stops as soon as the receiving side is gone.
fn spawn_transfer(client: Client, url: Url, chunk_size: usize) -> Transfer {
    let (head_tx, head) = mpsc::sync_channel(1);
    let (body_tx, body) = mpsc::sync_channel(CHUNK_QUEUE_DEPTH);

    thread::spawn(move || {
        let mut response = match client.get(url).send() {
            Ok(response) => response,
            Err(e) => {
                let _ = head_tx.send(Err(e));
                return;
            }
        };

        let status = response.status();
        if head_tx.send(Ok((status, response.content_length()))).is_err() || !status.is_success() {
            return;
        }

        let mut buffer = vec![0u8; chunk_size.max(1)];
        loop {
            let event = match response.read(&mut buffer) {
                Ok(0) => BodyEvent::End,
                Ok(n) => BodyEvent::Chunk(buffer[..n].to_vec()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => BodyEvent::Failed(e),
            };
            let last = !matches!(event, BodyEvent::Chunk(_));
            if body_tx.send(event).is_err() || last {
                return;
            }
        }
    });

    Transfer { head, body }
}

/// Last non-empty segment of the URL path, or [`DEFAULT_FILENAME`].
pub fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

fn resolve_destination(url: &Url, destination: Option<&Path>) -> Result<PathBuf, DownloadError> {
    let name = match destination {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(filename_from_url(url)),
    };

    std::path::absolute(&name).map_err(|source| DownloadError::Write { path: name, source })
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| DEFAULT_FILENAME.into());
    name.push(PARTIAL_SUFFIX);
    target.with_file_name(name)
}
