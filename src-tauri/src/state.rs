//! Shared state for running split jobs.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

// ─────────────────────────────────────────────────────────────────────────────
// Split Jobs
// ─────────────────────────────────────────────────────────────────────────────

/// Registration of one running job, returned by [`SplitJobs::register`].
///
/// The generation tells this registration apart from a later one that reused
/// the same job id.
#[derive(Debug, Clone)]
pub struct JobTicket {
    pub token: CancellationToken,
    generation: u64,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<String, JobTicket>,
    next_generation: u64,
}

/// Cancellation tokens for in-flight splits, keyed by job id.
///
/// Managed by Tauri and injected into commands via `tauri::State<SplitJobs>`.
#[derive(Default)]
pub struct SplitJobs {
    registry: Mutex<Registry>,
}

impl SplitJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a job and returns its ticket.
    ///
    /// Re-registering an id that is still running cancels the older job.
    pub async fn register(&self, job_id: String) -> JobTicket {
        let mut registry = self.registry.lock().await;
        registry.next_generation += 1;
        let ticket = JobTicket {
            token: CancellationToken::new(),
            generation: registry.next_generation,
        };
        if let Some(previous) = registry.entries.insert(job_id, ticket.clone()) {
            previous.token.cancel();
        }
        ticket
    }

    pub async fn get(&self, job_id: &str) -> Option<CancellationToken> {
        let registry = self.registry.lock().await;
        registry.entries.get(job_id).map(|t| t.token.clone())
    }

    /// Drops the registration held by `ticket`.
    ///
    /// A newer registration under the same id is left in place.
    pub async fn finish(&self, job_id: &str, ticket: &JobTicket) {
        let mut registry = self.registry.lock().await;
        if registry
            .entries
            .get(job_id)
            .is_some_and(|current| current.generation == ticket.generation)
        {
            registry.entries.remove(job_id);
        }
    }

    /// Signals cancellation. Returns `false` when no such job is running.
    pub async fn cancel(&self, job_id: &str) -> bool {
        match self.get(job_id).await {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn active(&self) -> usize {
        self.registry.lock().await.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_cancel() {
        let jobs = SplitJobs::new();
        let ticket = jobs.register("job-1".into()).await;

        assert!(!ticket.token.is_cancelled());
        assert!(jobs.cancel("job-1").await);
        assert!(ticket.token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_unknown_job() {
        let jobs = SplitJobs::new();
        assert!(!jobs.cancel("missing").await);
    }

    #[tokio::test]
    async fn test_finish_removes_own_registration() {
        let jobs = SplitJobs::new();
        let ticket = jobs.register("job-1".into()).await;
        assert_eq!(jobs.active().await, 1);

        jobs.finish("job-1", &ticket).await;
        assert!(jobs.get("job-1").await.is_none());
        assert_eq!(jobs.active().await, 0);
    }

    #[tokio::test]
    async fn test_reregister_cancels_previous() {
        let jobs = SplitJobs::new();
        let first = jobs.register("job-1".into()).await;
        let second = jobs.register("job-1".into()).await;

        assert!(first.token.is_cancelled());
        assert!(!second.token.is_cancelled());
    }

    #[tokio::test]
    async fn test_stale_finish_keeps_newer_job_cancellable() {
        let jobs = SplitJobs::new();
        let first = jobs.register("x".into()).await;
        let second = jobs.register("x".into()).await;

        // The replaced job winds down after the new one started
        jobs.finish("x", &first).await;

        assert_eq!(jobs.active().await, 1);
        assert!(jobs.cancel("x").await);
        assert!(second.token.is_cancelled());

        jobs.finish("x", &second).await;
        assert!(!jobs.cancel("x").await);
    }
}
