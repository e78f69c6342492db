//! Atomic output files with automatic cleanup on failure.
//!
//! Everything is written to a temporary file in the same directory as the
//! destination, then atomically renamed over it on `finish()`. If dropped
//! before finishing, the temporary file is removed and the destination is
//! left untouched.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, Terminator, Writer, WriterBuilder};
use tempfile::NamedTempFile;

use crate::error::SplitError;
use crate::streaming::record::Record;

/// Write buffer for CSV output (256 KB).
const CSV_WRITE_BUFFER: usize = 256 * 1024;

/// A temporary file that becomes `final_path` on `persist()`.
pub struct AtomicFile {
    temp: NamedTempFile,
    final_path: PathBuf,
}

impl AtomicFile {
    /// Creates the temporary file next to `final_path`.
    ///
    /// The temporary file lives in the destination directory so the final
    /// rename never crosses filesystems.
    ///
    /// # Errors
    ///
    /// Returns `SplitError::WriteFailure` if the parent directory cannot be
    /// determined or the temporary file cannot be created.
    pub fn new(final_path: impl AsRef<Path>) -> Result<Self, SplitError> {
        let final_path = final_path.as_ref().to_path_buf();

        let parent_dir = final_path
            .parent()
            .ok_or_else(|| SplitError::write(&final_path, "cannot determine parent directory"))?;
        // A bare file name has an empty parent: use the working directory
        let parent_dir = if parent_dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent_dir
        };

        let temp = NamedTempFile::new_in(parent_dir).map_err(|e| {
            SplitError::write(&final_path, format!("failed to create temporary file: {}", e))
        })?;

        Ok(Self { temp, final_path })
    }

    pub fn as_file_mut(&mut self) -> &mut File {
        self.temp.as_file_mut()
    }

    /// Syncs the data and atomically moves the file into place.
    pub fn persist(self) -> Result<PathBuf, SplitError> {
        self.temp
            .as_file()
            .sync_all()
            .map_err(|e| SplitError::write(&self.final_path, e))?;

        self.temp.persist(&self.final_path).map_err(|e| {
            SplitError::write(&self.final_path, format!("failed to persist file: {}", e.error))
        })?;

        Ok(self.final_path)
    }
}

/// CSV writer for one chunk file, published atomically on `finish()`.
///
/// Fields are quoted only when they contain a comma, a quote or a line break;
/// embedded quotes are doubled. Records use CRLF terminators and may have
/// differing lengths.
pub struct AtomicCsvWriter {
    writer: Writer<BufWriter<NamedTempFile>>,
    final_path: PathBuf,
}

impl AtomicCsvWriter {
    /// Opens a writer whose output will land at `final_path`.
    ///
    /// # Errors
    ///
    /// Returns `SplitError::WriteFailure` if the temporary file cannot be
    /// created.
    pub fn new(final_path: impl AsRef<Path>) -> Result<Self, SplitError> {
        let AtomicFile { temp, final_path } = AtomicFile::new(final_path)?;

        let buf_writer = BufWriter::with_capacity(CSV_WRITE_BUFFER, temp);
        let writer = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::CRLF)
            .from_writer(buf_writer);

        Ok(Self { writer, final_path })
    }

    pub fn write_record(&mut self, record: &Record) -> Result<(), SplitError> {
        self.writer
            .write_record(record.iter())
            .map_err(|e| SplitError::write(&self.final_path, e))
    }

    /// Flushes, syncs and renames the finished chunk into place.
    ///
    /// On error the temporary file is cleaned up automatically.
    pub fn finish(self) -> Result<PathBuf, SplitError> {
        let final_path = self.final_path;

        let buf_writer = self.writer.into_inner().map_err(|e| {
            SplitError::write(&final_path, format!("failed to flush CSV writer: {}", e.error()))
        })?;

        let named_temp = buf_writer.into_inner().map_err(|e| {
            SplitError::write(&final_path, format!("failed to flush buffer: {}", e.error()))
        })?;

        AtomicFile {
            temp: named_temp,
            final_path,
        }
        .persist()
    }
}
