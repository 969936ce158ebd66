#![allow(dead_code)]

use std::io::{BufRead, BufReader, Cursor, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use omr_datasets::{ProgressObserver, TransferProgress};
use zip::write::SimpleFileOptions;

/// How the test server answers the single request it accepts.
pub enum Reply {
    /// 200 with a `Content-Length` header.
    Body(Vec<u8>),
    /// 200 without `Content-Length`; the body ends when the connection closes.
    Unsized(Vec<u8>),
    /// Declares `declared` bytes but sends only `body` before hanging up.
    Truncated { body: Vec<u8>, declared: u64 },
    /// Like `Truncated`, but keeps the connection open and silent for `hold`.
    Stalled {
        body: Vec<u8>,
        declared: u64,
        hold: Duration,
    },
    Status(u16),
}

pub struct TestServer {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn join(self) {
        let _ = self.handle.join();
    }
}

/// Serves exactly one HTTP request on a random local port.
pub fn serve(reply: Reply) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            let _ = respond(stream, reply);
        }
    });

    TestServer {
        base_url: format!("http://{addr}"),
        handle,
    }
}

fn respond(mut stream: TcpStream, reply: Reply) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line == "\r\n" {
            break;
        }
    }

    match reply {
        Reply::Body(body) => {
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/zip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            )?;
            stream.write_all(&body)?;
        }
        Reply::Unsized(body) => {
            write!(stream, "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n")?;
            stream.write_all(&body)?;
        }
        Reply::Truncated { body, declared } => {
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Length: {declared}\r\nConnection: close\r\n\r\n"
            )?;
            stream.write_all(&body)?;
        }
        Reply::Stalled {
            body,
            declared,
            hold,
        } => {
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Length: {declared}\r\nConnection: close\r\n\r\n"
            )?;
            stream.write_all(&body)?;
            stream.flush()?;
            thread::sleep(hold);
        }
        Reply::Status(status) => {
            write!(
                stream,
                "HTTP/1.1 {status} Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            )?;
        }
    }

    stream.flush()?;
    stream.shutdown(std::net::Shutdown::Write)
}

/// Deterministic non-repeating-looking payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Builds an in-memory ZIP archive; names ending in `/` become directories.
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// Relative paths of all files below `root`, sorted, with `/` separators.
pub fn list_files(root: &Path) -> Vec<String> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let relative = path.strip_prefix(root).unwrap();
                found.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    found.sort();
    found
}

/// Records every report together with the file size on disk at that moment.
pub struct RecordingObserver {
    pub path: PathBuf,
    pub started: Option<(Option<u64>, PathBuf)>,
    pub reports: Vec<(TransferProgress, u64)>,
    pub finished: Option<TransferProgress>,
}

impl RecordingObserver {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            started: None,
            reports: Vec::new(),
            finished: None,
        }
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_start(&mut self, _url: &str, total_bytes: Option<u64>, path: &Path) {
        self.started = Some((total_bytes, path.to_path_buf()));
    }

    fn on_progress(&mut self, progress: &TransferProgress) {
        let on_disk = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        self.reports.push((*progress, on_disk));
    }

    fn on_finish(&mut self, progress: &TransferProgress) {
        self.finished = Some(*progress);
    }
}
