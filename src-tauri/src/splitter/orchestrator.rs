//! Drives reader → partitioner → writer for one split request.

use std::fs;
use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::SplitConfig;
use super::progress::{ProgressReporter, ProgressTracker};
use super::request::{SplitParams, SplitRequest};
use crate::error::SplitError;
use crate::streaming::{
    write_chunk, Chunk, ChunkPartitioner, OutputFile, OutputNaming, RecordReader,
};

// ─────────────────────────────────────────────────────────────────────────────
// Result Types
// ─────────────────────────────────────────────────────────────────────────────

/// Result returned to the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitResult {
    pub success: bool,
    /// Files completed, including those written before a failure.
    pub file_count: usize,
    pub error: Option<String>,
}

impl SplitResult {
    fn failed(file_count: usize, error: &SplitError) -> Self {
        Self {
            success: false,
            file_count,
            error: Some(error.to_string()),
        }
    }
}

/// Everything a finished run produced.
///
/// Files written before a failure are listed and left on disk.
#[derive(Debug, Default)]
pub struct SplitOutcome {
    pub files: Vec<OutputFile>,
    /// Data rows written, headers excluded.
    pub data_rows: u64,
    pub error: Option<SplitError>,
}

impl SplitOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl From<SplitOutcome> for SplitResult {
    fn from(outcome: SplitOutcome) -> Self {
        match outcome.error {
            None => SplitResult {
                success: true,
                file_count: outcome.files.len(),
                error: None,
            },
            Some(ref e) => SplitResult::failed(outcome.files.len(), e),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chunk Committer
// ─────────────────────────────────────────────────────────────────────────────

/// Writes chunks in order and keeps the per-run counters.
struct ChunkCommitter<'a> {
    naming: OutputNaming,
    progress: ProgressTracker<'a>,
    files: Vec<OutputFile>,
    data_rows: u64,
}

impl ChunkCommitter<'_> {
    fn commit(&mut self, chunk: &Chunk, bytes_consumed: u64) -> Result<(), SplitError> {
        let target = self.naming.file(chunk.index);
        write_chunk(chunk, &target)?;

        debug!(
            chunk_index = chunk.index,
            rows = chunk.data_rows(),
            path = %target.path.display(),
            "Completed chunk"
        );

        self.data_rows += chunk.data_rows() as u64;
        self.files.push(target);

        let (file_count, data_rows) = (self.files.len(), self.data_rows);
        self.progress.advance(bytes_consumed, || {
            format!("Wrote {} file(s), {} row(s)", file_count, data_rows)
        });
        Ok(())
    }

    fn into_outcome(self, error: Option<SplitError>) -> SplitOutcome {
        SplitOutcome {
            files: self.files,
            data_rows: self.data_rows,
            error,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Splitter
// ─────────────────────────────────────────────────────────────────────────────

/// Splits one CSV file into numbered chunk files.
///
/// All counters live in the run itself; a `Splitter` holds only configuration
/// and can serve any number of requests.
#[derive(Debug, Clone, Default)]
pub struct Splitter {
    config: SplitConfig,
}

impl Splitter {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Runs a validated request to completion, failure or cancellation.
    ///
    /// Blocking. Cancellation is honoured between chunks only, so every file
    /// reported in the outcome is complete.
    pub fn run(
        &self,
        request: &SplitRequest,
        reporter: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> SplitOutcome {
        info!(
            "[SPLIT] Splitting {} into {} ({} rows per file, header: {}, format: {})",
            request.input_path.display(),
            request.output_dir.display(),
            request.rows_per_file,
            request.has_header,
            request.output_format()
        );

        let total_bytes = match fs::metadata(&request.input_path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                let error = SplitError::ReadFailure(format!(
                    "cannot stat {}: {}",
                    request.input_path.display(),
                    e
                ));
                return SplitOutcome {
                    error: Some(error),
                    ..SplitOutcome::default()
                };
            }
        };

        let naming = OutputNaming::for_source(
            &request.input_path,
            total_bytes,
            &request.output_dir,
            request.rows_per_file.get(),
            request.output_format(),
        );

        let mut committer = ChunkCommitter {
            naming,
            progress: ProgressTracker::new(reporter, total_bytes),
            files: Vec::new(),
            data_rows: 0,
        };
        committer.progress.emit(0, "Reading input".to_string());

        let outcome = if self.config.is_pipelined() {
            self.run_pipelined(request, committer, cancel)
        } else {
            self.run_sequential(request, committer, cancel)
        };

        match &outcome.error {
            None => info!(
                "[SPLIT] Completed: {} file(s), {} data row(s)",
                outcome.files.len(),
                outcome.data_rows
            ),
            Some(SplitError::Cancelled) => info!(
                "[SPLIT] Cancelled after {} file(s)",
                outcome.files.len()
            ),
            Some(e) => warn!(
                "[SPLIT] Failed after {} file(s): {}",
                outcome.files.len(),
                e
            ),
        }

        outcome
    }

    fn open_partitioner(
        &self,
        request: &SplitRequest,
    ) -> Result<ChunkPartitioner<RecordReader<fs::File>>, SplitError> {
        let reader = RecordReader::from_path(
            &request.input_path,
            self.config.read_buffer_bytes,
            self.config.max_record_bytes,
        )?;
        let partitioner =
            ChunkPartitioner::new(reader, request.rows_per_file, request.has_header)?;

        if let Some(header) = partitioner.header() {
            debug!(columns = header.len(), "Read header");
        }
        Ok(partitioner)
    }

    /// Feeds chunks to `sink` in order until the input ends, `sink` returns
    /// `false`, or cancellation is observed between chunks.
    fn for_each_chunk(
        &self,
        request: &SplitRequest,
        cancel: &CancellationToken,
        mut sink: impl FnMut(Chunk, u64) -> Result<bool, SplitError>,
    ) -> Result<(), SplitError> {
        let mut partitioner = self.open_partitioner(request)?;
        loop {
            if cancel.is_cancelled() {
                return Err(SplitError::Cancelled);
            }
            let Some(chunk) = partitioner.next_chunk()? else {
                return Ok(());
            };
            let consumed = partitioner.source().bytes_consumed();
            if !sink(chunk, consumed)? {
                return Ok(());
            }
        }
    }

    fn run_sequential(
        &self,
        request: &SplitRequest,
        mut committer: ChunkCommitter<'_>,
        cancel: &CancellationToken,
    ) -> SplitOutcome {
        let result = self.for_each_chunk(request, cancel, |chunk, consumed| {
            committer.commit(&chunk, consumed)?;
            Ok(true)
        });

        finish(committer, result.err())
    }

    /// Reads on the calling thread and writes on a scoped background thread,
    /// with at most `write_queue_depth` chunks in flight.
    fn run_pipelined(
        &self,
        request: &SplitRequest,
        committer: ChunkCommitter<'_>,
        cancel: &CancellationToken,
    ) -> SplitOutcome {
        let (tx, mut rx) = mpsc::channel::<(Chunk, u64)>(self.config.write_queue_depth);

        thread::scope(|scope| {
            let writer = scope.spawn(move || {
                let mut committer = committer;
                while let Some((chunk, consumed)) = rx.blocking_recv() {
                    if cancel.is_cancelled() {
                        return (committer, Some(SplitError::Cancelled));
                    }
                    if let Err(e) = committer.commit(&chunk, consumed) {
                        // Dropping the receiver stops the reader
                        return (committer, Some(e));
                    }
                }
                (committer, None)
            });

            let read_result = self.for_each_chunk(request, cancel, |chunk, consumed| {
                if tx.blocking_send((chunk, consumed)).is_err() {
                    debug!("[SPLIT-WRITER] Writer stopped, no more chunks will be read");
                    return Ok(false);
                }
                Ok(true)
            });
            drop(tx);

            match writer.join() {
                // A write failure happened on an earlier chunk than any read failure
                Ok((committer, Some(write_error))) => finish(committer, Some(write_error)),
                Ok((committer, None)) => finish(committer, read_result.err()),
                Err(_) => SplitOutcome {
                    error: Some(SplitError::Internal("writer thread panicked".into())),
                    ..SplitOutcome::default()
                },
            }
        })
    }
}

fn finish(mut committer: ChunkCommitter<'_>, error: Option<SplitError>) -> SplitOutcome {
    if error.is_none() {
        let message = format!("Split complete: {} file(s)", committer.files.len());
        committer.progress.emit(100, message);
    }
    committer.into_outcome(error)
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry Points
// ─────────────────────────────────────────────────────────────────────────────

/// Validates `params` and runs the split on the current thread.
pub fn execute(
    params: &SplitParams,
    config: &SplitConfig,
    reporter: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> SplitResult {
    match SplitRequest::validate(params) {
        Ok(request) => Splitter::new(config.clone())
            .run(&request, reporter, cancel)
            .into(),
        Err(e) => {
            warn!("[SPLIT] Rejected request: {}", e);
            SplitResult::failed(0, &e)
        }
    }
}

/// Async entry point: runs [`execute`] on the blocking thread pool.
pub async fn split_csv(
    params: SplitParams,
    config: SplitConfig,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
) -> SplitResult {
    let joined = tokio::task::spawn_blocking(move || {
        execute(&params, &config, reporter.as_ref(), &cancel)
    })
    .await;

    joined.unwrap_or_else(|e| {
        SplitResult::failed(0, &SplitError::Internal(format!("Task join error: {}", e)))
    })
}
