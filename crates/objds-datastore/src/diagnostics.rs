//! Injectable diagnostic sinks.
//!
//! The datastore writes one line per public operation to a
//! [`DiagnosticSink`]. The default [`DiscardSink`] drops everything;
//! [`FileSink`] appends timestamped lines to a file and [`TracingSink`]
//! forwards them to `tracing`.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// A destination for diagnostic lines.
pub trait DiagnosticSink: Send + Sync {
    /// Record one line. Sinks never fail the calling operation.
    fn write_line(&self, line: fmt::Arguments<'_>);

    /// Push buffered lines to their destination.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Write a formatted line to a sink.
macro_rules! diag {
    ($sink:expr, $($arg:tt)*) => {
        $sink.write_line(format_args!($($arg)*))
    };
}
pub(crate) use diag;

/// Drops every line.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardSink;

impl DiagnosticSink for DiscardSink {
    fn write_line(&self, _line: fmt::Arguments<'_>) {}
}

/// Appends `YYYY/MM/DD HH:MM:SS <line>` to a file.
#[derive(Debug)]
pub struct FileSink {
    file: Mutex<LineWriter<File>>,
}

impl FileSink {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(LineWriter::new(file)),
        })
    }
}

impl DiagnosticSink for FileSink {
    fn write_line(&self, line: fmt::Arguments<'_>) {
        let stamp = chrono::Local::now().format("%Y/%m/%d %H:%M:%S");
        if let Ok(mut file) = self.file.lock() {
            // Diagnostics are best effort.
            let _ = writeln!(file, "{stamp} {line}");
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self.file.lock() {
            Ok(mut file) => file.flush(),
            Err(_) => Err(io::Error::new(io::ErrorKind::Other, "log file lock poisoned")),
        }
    }
}

/// Forwards each line as a `tracing` debug event under `objds::diag`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn write_line(&self, line: fmt::Arguments<'_>) {
        tracing::debug!(target: "objds::diag", "{line}");
    }
}
