//! CSV split commands.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tauri::{AppHandle, Emitter};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::SplitError;
use crate::splitter::{self, ProgressEvent, ProgressReporter, SplitConfig, SplitParams, SplitResult};
use crate::state::SplitJobs;

/// Event name for split progress updates.
pub const SPLIT_PROGRESS_EVENT: &str = "split-progress";

/// Payload of a `split-progress` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitProgressPayload {
    pub job_id: Option<String>,
    pub percent: u8,
    pub message: String,
}

/// Forwards progress events to the frontend.
struct TauriProgress {
    app: AppHandle,
    job_id: Option<String>,
}

impl ProgressReporter for TauriProgress {
    fn report(&self, event: &ProgressEvent) {
        let payload = SplitProgressPayload {
            job_id: self.job_id.clone(),
            percent: event.percent,
            message: event.message.clone(),
        };
        // Best-effort: a closed window must not fail the split
        let _ = self.app.emit(SPLIT_PROGRESS_EVENT, payload);
    }
}

/// Splits a CSV file into numbered chunk files.
///
/// Failures are reported inside the returned [`SplitResult`]; the command
/// itself only errors if Tauri cannot deliver the call.
#[tauri::command]
pub async fn split_csv(
    app: AppHandle,
    jobs: tauri::State<'_, SplitJobs>,
    params: SplitParams,
) -> Result<SplitResult, SplitError> {
    let ticket = match &params.job_id {
        Some(job_id) => Some(jobs.register(job_id.clone()).await),
        None => None,
    };
    let cancel = ticket
        .as_ref()
        .map_or_else(CancellationToken::new, |t| t.token.clone());
    let job_id = params.job_id.clone();

    let reporter = Arc::new(TauriProgress {
        app,
        job_id: job_id.clone(),
    });
    let result = splitter::split_csv(params, SplitConfig::default(), reporter, cancel).await;

    if let (Some(job_id), Some(ticket)) = (job_id, ticket) {
        jobs.finish(&job_id, &ticket).await;
    }
    Ok(result)
}

/// Cancels an in-progress split.
///
/// Takes effect at the next chunk boundary; files already written are kept.
#[tauri::command]
pub async fn cancel_split(
    jobs: tauri::State<'_, SplitJobs>,
    job_id: String,
) -> Result<(), SplitError> {
    if jobs.cancel(&job_id).await {
        info!("[SPLIT] Cancellation requested for job {}", job_id);
        Ok(())
    } else {
        Err(SplitError::InvalidRequest(format!(
            "No active split found for job {}",
            job_id
        )))
    }
}
