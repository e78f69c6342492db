//! Split orchestration
//!
//! Validates a request, streams the input through the record reader and
//! partitioner, and commits each chunk as a numbered output file while
//! reporting progress.

mod config;
mod orchestrator;
mod progress;
mod request;

pub use config::SplitConfig;
pub use orchestrator::{execute, split_csv, SplitOutcome, SplitResult, Splitter};
pub use progress::{ProgressEvent, ProgressFn, ProgressReporter};
pub use request::{SplitParams, SplitRequest};
