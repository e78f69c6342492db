//! Split request payloads and their validation.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::SplitError;
use crate::streaming::{OutputFormat, XLSX_MAX_ROWS};

/// Request payload as sent by the shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitParams {
    pub input_path: String,
    pub output_dir: String,
    pub rows_per_file: usize,
    pub has_header: bool,
    pub convert_to_excel: bool,
    /// Identifier the shell can later pass to `cancel_split`.
    #[serde(default)]
    pub job_id: Option<String>,
}

/// A validated split request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRequest {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub rows_per_file: NonZeroUsize,
    pub has_header: bool,
    pub convert_to_excel: bool,
}

impl SplitRequest {
    /// Checks `params` before any output is produced.
    ///
    /// The input must be an existing, non-empty regular file. The output
    /// directory is created when missing and checked for writability.
    ///
    /// # Errors
    ///
    /// Returns `SplitError::InvalidRequest` describing the first problem found.
    pub fn validate(params: &SplitParams) -> Result<Self, SplitError> {
        let rows_per_file = NonZeroUsize::new(params.rows_per_file).ok_or_else(|| {
            SplitError::InvalidRequest("rows per file must be at least 1".into())
        })?;

        // One worksheet row is reserved for the header
        let header_rows = usize::from(params.has_header);
        if params.convert_to_excel && rows_per_file.get() > XLSX_MAX_ROWS - header_rows {
            return Err(SplitError::InvalidRequest(format!(
                "rows per file cannot exceed {} when converting to Excel",
                XLSX_MAX_ROWS - header_rows
            )));
        }

        if params.input_path.trim().is_empty() {
            return Err(SplitError::InvalidRequest("no input file selected".into()));
        }
        if params.output_dir.trim().is_empty() {
            return Err(SplitError::InvalidRequest("no output folder selected".into()));
        }

        let input_path = PathBuf::from(&params.input_path);
        let output_dir = PathBuf::from(&params.output_dir);

        check_input(&input_path)?;
        prepare_output_dir(&output_dir)?;

        Ok(Self {
            input_path,
            output_dir,
            rows_per_file,
            has_header: params.has_header,
            convert_to_excel: params.convert_to_excel,
        })
    }

    pub fn output_format(&self) -> OutputFormat {
        if self.convert_to_excel {
            OutputFormat::Spreadsheet
        } else {
            OutputFormat::Csv
        }
    }
}

fn check_input(path: &Path) -> Result<(), SplitError> {
    let metadata = fs::metadata(path).map_err(|e| {
        SplitError::InvalidRequest(format!("input file {} is not accessible: {}", path.display(), e))
    })?;

    if !metadata.is_file() {
        return Err(SplitError::InvalidRequest(format!(
            "input {} is not a file",
            path.display()
        )));
    }
    if metadata.len() == 0 {
        return Err(SplitError::InvalidRequest(format!(
            "input file {} is empty",
            path.display()
        )));
    }

    fs::File::open(path).map_err(|e| {
        SplitError::InvalidRequest(format!("input file {} cannot be opened: {}", path.display(), e))
    })?;

    Ok(())
}

fn prepare_output_dir(dir: &Path) -> Result<(), SplitError> {
    if dir.exists() && !dir.is_dir() {
        return Err(SplitError::InvalidRequest(format!(
            "output path {} is not a directory",
            dir.display()
        )));
    }

    fs::create_dir_all(dir).map_err(|e| {
        SplitError::InvalidRequest(format!(
            "cannot create output directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    // Scratch file is removed on drop
    NamedTempFile::new_in(dir).map_err(|e| {
        SplitError::InvalidRequest(format!(
            "output directory {} is not writable: {}",
            dir.display(),
            e
        ))
    })?;

    Ok(())
}
