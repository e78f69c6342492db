//! Chunk serialization to CSV or XLSX output files.

use std::fmt;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, FormatAlign, Workbook};
use serde::{Deserialize, Serialize};

use super::atomic_writer::{AtomicCsvWriter, AtomicFile};
use super::record::Chunk;
use crate::error::SplitError;

/// Maximum rows in one worksheet.
pub const XLSX_MAX_ROWS: usize = 1_048_576;

/// Maximum columns in one worksheet.
pub const XLSX_MAX_COLS: usize = 16_384;

/// Column width applied to the leading columns of each worksheet.
const XLSX_COLUMN_WIDTH: f64 = 12.0;

/// Only this many leading columns get an explicit width.
const XLSX_SIZED_COLUMNS: usize = 100;

/// Format of a generated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Csv,
    Spreadsheet,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Spreadsheet => "xlsx",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A generated file and its format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: PathBuf,
    pub format: OutputFormat,
}

/// Deterministic `{stem}_{index}.{ext}` names for one run.
///
/// The index is zero-padded to a width fixed up front, so lexicographic and
/// numeric order of the generated names agree.
#[derive(Debug, Clone)]
pub struct OutputNaming {
    dir: PathBuf,
    stem: String,
    width: usize,
    format: OutputFormat,
}

impl OutputNaming {
    /// Picks the index width from an upper bound on the number of chunks.
    ///
    /// Every record takes at least two bytes (one character and a terminator)
    /// except possibly the last, so `ceil(source_len / 2)` bounds the record
    /// count and `ceil(that / rows_per_file)` bounds the chunk count.
    pub fn for_source(
        source: &Path,
        source_len: u64,
        output_dir: &Path,
        rows_per_file: usize,
        format: OutputFormat,
    ) -> Self {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "output".to_string());

        let max_records = source_len.div_ceil(2);
        let max_chunks = max_records.div_ceil(rows_per_file.max(1) as u64).max(1);

        Self {
            dir: output_dir.to_path_buf(),
            stem,
            width: max_chunks.to_string().len(),
            format,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn file(&self, index: usize) -> OutputFile {
        let name = format!(
            "{}_{:0width$}.{}",
            self.stem,
            index,
            self.format.extension(),
            width = self.width
        );
        OutputFile {
            path: self.dir.join(name),
            format: self.format,
        }
    }
}

/// Writes one chunk to `target`, replacing any existing file atomically.
///
/// # Errors
///
/// Returns `SplitError::WriteFailure` carrying the target path on any I/O or
/// encoding failure. Nothing is left at the target path in that case.
pub fn write_chunk(chunk: &Chunk, target: &OutputFile) -> Result<(), SplitError> {
    match target.format {
        OutputFormat::Csv => write_csv(chunk, &target.path),
        OutputFormat::Spreadsheet => write_xlsx(chunk, &target.path),
    }
}

fn write_csv(chunk: &Chunk, path: &Path) -> Result<(), SplitError> {
    let mut writer = AtomicCsvWriter::new(path)?;

    if let Some(header) = &chunk.header {
        writer.write_record(header)?;
    }
    for record in &chunk.records {
        writer.write_record(record)?;
    }

    writer.finish()?;
    Ok(())
}

/// Writes the chunk as a single-sheet workbook with every cell stored as text.
fn write_xlsx(chunk: &Chunk, path: &Path) -> Result<(), SplitError> {
    let total_rows = chunk.records.len() + usize::from(chunk.header.is_some());
    if total_rows > XLSX_MAX_ROWS {
        return Err(SplitError::write(
            path,
            format!("{} rows exceed the worksheet limit of {}", total_rows, XLSX_MAX_ROWS),
        ));
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let header_format = Format::new().set_bold().set_align(FormatAlign::Center);

    let mut row: u32 = 0;
    let mut widest = 0usize;

    let rows = chunk
        .header
        .iter()
        .map(|h| (h, true))
        .chain(chunk.records.iter().map(|r| (r, false)));

    for (record, is_header) in rows {
        if record.len() > XLSX_MAX_COLS {
            return Err(SplitError::write(
                path,
                format!(
                    "row {} has {} columns, the worksheet limit is {}",
                    row + 1,
                    record.len(),
                    XLSX_MAX_COLS
                ),
            ));
        }
        widest = widest.max(record.len());

        for (col, field) in record.iter().enumerate() {
            let col = col as u16;
            let written = if is_header {
                worksheet.write_string_with_format(row, col, field, &header_format)
            } else {
                worksheet.write_string(row, col, field)
            };
            written.map_err(|e| SplitError::write(path, e))?;
        }
        row += 1;
    }

    for col in 0..widest.min(XLSX_SIZED_COLUMNS) {
        worksheet
            .set_column_width(col as u16, XLSX_COLUMN_WIDTH)
            .map_err(|e| SplitError::write(path, e))?;
    }

    let mut file = AtomicFile::new(path)?;
    workbook
        .save_to_writer(file.as_file_mut())
        .map_err(|e| SplitError::write(path, e))?;
    file.persist()?;

    Ok(())
}
