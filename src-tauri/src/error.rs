use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// User-friendly error presentation for the shell.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPresentation {
    pub title: String,
    pub message: String,
    pub action: Option<String>,
}

/// Error type shared by the reader, partitioner, writer and orchestrator.
#[derive(Debug, Error)]
pub enum SplitError {
    // ── Request ───────────────────────────────────────────────────────────────
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── Input ─────────────────────────────────────────────────────────────────
    #[error("Malformed CSV at byte {offset}: {reason}")]
    MalformedRecord { offset: u64, reason: String },

    #[error("Failed to read input: {0}")]
    ReadFailure(String),

    // ── Output ────────────────────────────────────────────────────────────────
    #[error("Failed to write {}: {message}", path.display())]
    WriteFailure { path: PathBuf, message: String },

    // ── Control ───────────────────────────────────────────────────────────────
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SplitError {
    /// Builds a `WriteFailure` for `path` from any displayable cause.
    pub(crate) fn write(path: &Path, cause: impl std::fmt::Display) -> Self {
        SplitError::WriteFailure {
            path: path.to_path_buf(),
            message: cause.to_string(),
        }
    }

    pub(crate) fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        SplitError::MalformedRecord {
            offset,
            reason: reason.into(),
        }
    }

    /// Converts the error into a presentation suitable for UI display.
    pub fn to_presentation(&self) -> ErrorPresentation {
        match self {
            SplitError::InvalidRequest(msg) => ErrorPresentation {
                title: "Invalid Settings".into(),
                message: msg.clone(),
                action: Some("Check the selected file, folder and row count".into()),
            },

            SplitError::MalformedRecord { offset, reason } => ErrorPresentation {
                title: "Invalid CSV".into(),
                message: format!(
                    "The CSV file has a formatting problem near byte {}: {}",
                    offset, reason
                ),
                action: Some("Fix the CSV file and try again".into()),
            },

            SplitError::ReadFailure(_) => ErrorPresentation {
                title: "Cannot Read File".into(),
                message: "The input file could not be read.".into(),
                action: Some("Make sure the file is accessible and try again".into()),
            },

            SplitError::WriteFailure { path, .. } => ErrorPresentation {
                title: "Cannot Write Output".into(),
                message: format!(
                    "Could not write {}. Files completed before this one were kept.",
                    path.display()
                ),
                action: Some("Check disk space and folder permissions, then retry".into()),
            },

            SplitError::Cancelled => ErrorPresentation {
                title: "Cancelled".into(),
                message: "The split was cancelled. Files already written were kept.".into(),
                action: None,
            },

            SplitError::Internal(_) => ErrorPresentation {
                title: "Unexpected Error".into(),
                message: "Something went wrong. Please try again.".into(),
                action: Some("Try again".into()),
            },
        }
    }
}

// Allow SplitError to be returned from Tauri commands
impl Serialize for SplitError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_presentation().serialize(serializer)
    }
}
