use crate::core::progress::{ProgressObserver, TransferProgress};
use std::io::{Stdout, Write};
use std::path::Path;
use tracing::warn;

/// Prints one progress line per report.
pub struct ConsoleProgress<W: Write = Stdout> {
    out: W,
    failed: bool,
}

impl ConsoleProgress<Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out, failed: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    // Output errors are logged once and otherwise ignored.
    fn emit(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}").and_then(|_| self.out.flush()) {
            if !self.failed {
                warn!("Progress output failed: {e}");
                self.failed = true;
            }
        }
    }
}

impl<W: Write> ProgressObserver for ConsoleProgress<W> {
    fn on_start(&mut self, url: &str, total_bytes: Option<u64>, path: &Path) {
        let size = total_bytes
            .map(|b| b.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        self.emit(&format!(
            "Downloading: {url} Bytes: {size} into {}",
            path.display()
        ));
    }

    fn on_progress(&mut self, progress: &TransferProgress) {
        self.emit(&format_progress(progress));
    }

    fn on_finish(&mut self, progress: &TransferProgress) {
        self.emit(&format_progress(progress));
    }
}

/// `"<bytes>   [<percent>%]"`, or just the byte count when the total is unknown.
pub fn format_progress(progress: &TransferProgress) -> String {
    let mut line = format!("{:>16}", progress.bytes_transferred);
    if let Some(percent) = progress.percentage() {
        line.push_str(&format!("   [{percent:6.2}%]"));
    }
    line
}
