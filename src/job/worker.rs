//! Job execution wrapper around the render engine.
//!
//! Enforces the soft time limit and retry policy, republishes progress to the
//! shared result store, and translates cancellation into the engine's
//! cooperative token. The *hard* time limit is not implemented here: the
//! hosting queue kills the worker process outright when it fires, and
//! late-ack re-delivery takes care of the rest.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    engine::{CancelToken, RenderControl, RenderEngine},
    error::ReelforgeError,
    job::{spec::parse_job, store::ResultStore},
    model::{RenderProgress, RenderResult},
};

/// Bounded retry for transient failures. Permanent errors (validation,
/// missing files, timeouts) are never retried.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_secs(60),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Termination signal delivered; the job aborts at its next checkpoint.
    Requested,
    /// The job already finished; cancellation is a no-op.
    AlreadyCompleted,
    /// No running task under that id.
    NotFound,
}

/// Runs deserialized jobs through the engine on the calling thread, exactly
/// one job at a time per worker. Cross-job parallelism comes from running
/// more workers.
pub struct JobWorker {
    store: Arc<dyn ResultStore>,
    retry: RetryPolicy,
    soft_time_limit: Option<Duration>,
    active: Mutex<HashMap<String, CancelToken>>,
}

impl JobWorker {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            soft_time_limit: None,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_soft_time_limit(mut self, limit: Duration) -> Self {
        self.soft_time_limit = Some(limit);
        self
    }

    /// Execute one serialized job payload under `task_id`. Always publishes a
    /// terminal state and returns the final result, best-effort cost included.
    pub fn run(&self, task_id: &str, payload: &str) -> RenderResult {
        tracing::info!(task_id, "starting render task");
        self.store.mark_started(task_id);

        let job = match parse_job(payload) {
            Ok(job) => job,
            Err(error) => {
                // Schema violation: fail fast, permanent, no retry.
                let job_id = job_id_from_payload(payload).unwrap_or_else(|| task_id.to_string());
                tracing::error!(task_id, %error, "job spec rejected");
                let result = RenderResult::failure(job_id, error.to_string());
                self.store.publish_result(task_id, &result);
                return result;
            }
        };

        let cancel = CancelToken::new();
        self.active
            .lock()
            .expect("worker registry poisoned")
            .insert(task_id.to_string(), cancel.clone());
        let ctrl = RenderControl {
            deadline: self
                .soft_time_limit
                .map(|limit| std::time::Instant::now() + limit),
            cancel,
        };

        let result = self.run_attempts(task_id, &job, &ctrl);

        self.active
            .lock()
            .expect("worker registry poisoned")
            .remove(task_id);
        result
    }

    fn run_attempts(
        &self,
        task_id: &str,
        job: &crate::model::RenderJob,
        ctrl: &RenderControl,
    ) -> RenderResult {
        let mut attempt = 0u32;
        loop {
            let engine = RenderEngine::new(job.settings.clone())
                .with_progress(self.progress_callback(task_id));

            match engine.render_classified(job, ctrl) {
                Ok(result) => {
                    tracing::info!(task_id, job_id = %result.job_id, "task completed successfully");
                    self.store.publish_result(task_id, &result);
                    return result;
                }
                Err(failure) => {
                    if matches!(failure.error, ReelforgeError::Cancelled(_)) {
                        tracing::warn!(task_id, "task revoked");
                        self.store.mark_revoked(task_id);
                        return failure.result;
                    }
                    if failure.error.is_permanent() || attempt >= self.retry.max_retries {
                        tracing::error!(
                            task_id,
                            error = %failure.error,
                            attempts = attempt + 1,
                            "task failed"
                        );
                        self.store.publish_result(task_id, &failure.result);
                        return failure.result;
                    }

                    attempt += 1;
                    tracing::warn!(
                        task_id,
                        error = %failure.error,
                        attempt,
                        max_retries = self.retry.max_retries,
                        "transient failure, retrying after delay"
                    );
                    std::thread::sleep(self.retry.retry_delay);
                }
            }
        }
    }

    fn progress_callback(&self, task_id: &str) -> Box<dyn Fn(&RenderProgress) + Send + Sync> {
        let store = Arc::clone(&self.store);
        let task_id = task_id.to_string();
        Box::new(move |progress| store.publish_progress(&task_id, progress))
    }

    /// Deliver a termination signal to a running task. Cancelling a finished
    /// job is a no-op reporting "already completed".
    pub fn cancel(&self, task_id: &str) -> CancelOutcome {
        if let Some(snapshot) = self.store.snapshot(task_id)
            && snapshot.state.is_finished()
        {
            tracing::info!(task_id, "cancel requested for already completed task");
            return CancelOutcome::AlreadyCompleted;
        }

        let active = self.active.lock().expect("worker registry poisoned");
        match active.get(task_id) {
            Some(token) => {
                token.cancel();
                tracing::warn!(task_id, "cancellation requested");
                CancelOutcome::Requested
            }
            None => CancelOutcome::NotFound,
        }
    }
}

fn job_id_from_payload(payload: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(payload)
        .ok()?
        .get("job_id")?
        .as_str()
        .map(|s| s.to_string())
}
