//! Streaming CSV splitter with optional XLSX output.
//!
//! [`splitter::split_csv`] is the entry point: it validates a [`SplitParams`],
//! streams the input one record at a time and writes numbered chunk files
//! next to each other in the output directory.

pub mod error;
pub mod splitter;
pub mod state;
pub mod streaming;

#[cfg(feature = "tauri")]
pub mod commands;

pub use error::{ErrorPresentation, SplitError};
pub use splitter::{
    execute, split_csv, ProgressEvent, ProgressFn, ProgressReporter, SplitConfig, SplitOutcome,
    SplitParams, SplitRequest, SplitResult, Splitter,
};
pub use state::{JobTicket, SplitJobs};
pub use streaming::{OutputFile, OutputFormat};

// ── Tauri wiring ──────────────────────────────────────────────────────────────

/// Registers the split commands and their shared state on a Tauri builder.
#[cfg(feature = "tauri")]
pub fn register(builder: tauri::Builder<tauri::Wry>) -> tauri::Builder<tauri::Wry> {
    builder
        .manage(SplitJobs::new())
        .invoke_handler(tauri::generate_handler![
            commands::split_csv,
            commands::cancel_split,
        ])
}
