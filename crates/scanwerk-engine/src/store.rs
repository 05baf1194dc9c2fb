// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory job registry and progress subscriptions.
//
// Job records live only for the process lifetime. The store is the single
// owner of all job state and of the per-job subscriber lists; one coarse
// lock guards both maps, and every mutation goes through a store method —
// callers never see the raw maps. Subscriber delivery is a non-blocking
// channel send performed after the lock is released, so the lock is never
// held across anything slower than the handoff itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use scanwerk_core::config::ProcessingConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{Job, JobId, JobStatus, ProcessingOutcome, ProgressUpdate};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, error, info, warn};

/// Handle for removing a progress subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    sender: UnboundedSender<ProgressUpdate>,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    subscribers: HashMap<JobId, Vec<Subscription>>,
}

/// Concurrency-safe registry of job records and their progress subscribers.
///
/// Cheaply cloneable; all clones share the same state.
#[derive(Clone)]
pub struct JobStore {
    inner: Arc<Mutex<Inner>>,
    next_subscription: Arc<AtomicU64>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            next_subscription: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a new Pending job and return its id.
    pub fn create(&self, filename: &str, config: ProcessingConfig) -> JobId {
        let job = Job::new(filename.to_string(), config);
        let id = job.id;
        self.lock().jobs.insert(id, job);
        info!(job_id = %id, filename, "job created");
        id
    }

    /// Update a job's progress and optionally its status, then deliver a
    /// snapshot to every subscriber for the job.
    ///
    /// Unknown job ids and jobs already in a terminal state are logged and
    /// ignored — the latter keeps late worker events from resurrecting a
    /// finished job.
    pub fn update_progress(
        &self,
        job_id: JobId,
        progress: u8,
        step: &str,
        status: Option<JobStatus>,
    ) {
        let (update, senders) = {
            let mut inner = self.lock();
            let Some(job) = inner.jobs.get_mut(&job_id) else {
                error!(job_id = %job_id, "job not found for progress update");
                return;
            };
            if job.status.is_terminal() {
                debug!(job_id = %job_id, progress, "ignoring progress update for terminal job");
                return;
            }

            job.progress = progress;
            job.current_step = step.to_string();
            job.updated_at = Utc::now();
            if let Some(status) = status {
                job.status = status;
            }

            debug!(job_id = %job_id, progress, step, "job progress updated");

            let update = ProgressUpdate {
                job_id,
                status: job.status,
                progress,
                current_step: step.to_string(),
            };
            let senders: Vec<UnboundedSender<ProgressUpdate>> = inner
                .subscribers
                .get(&job_id)
                .map(|subs| subs.iter().map(|s| s.sender.clone()).collect())
                .unwrap_or_default();
            (update, senders)
        };

        // Delivery happens outside the lock; a failed send (subscriber went
        // away) never affects the update or the other subscribers.
        for sender in senders {
            if sender.send(update.clone()).is_err() {
                debug!(job_id = %job_id, "subscriber gone, skipping delivery");
            }
        }
    }

    /// Mark a job Completed with its result.
    pub fn complete(&self, job_id: JobId, outcome: ProcessingOutcome) {
        let mut inner = self.lock();
        let Some(job) = inner.jobs.get_mut(&job_id) else {
            error!(job_id = %job_id, "job not found for completion");
            return;
        };
        if job.status.is_terminal() {
            warn!(job_id = %job_id, status = ?job.status, "ignoring completion of terminal job");
            return;
        }

        job.status = JobStatus::Completed;
        job.progress = 100;
        job.current_step = "processing completed".into();
        job.result = Some(outcome);
        job.updated_at = Utc::now();
        info!(job_id = %job_id, "job completed");
    }

    /// Mark a job Failed, recording the error and whatever partial result
    /// the pipeline computed before failing.
    pub fn fail(&self, job_id: JobId, error_message: &str, partial: Option<ProcessingOutcome>) {
        let mut inner = self.lock();
        let Some(job) = inner.jobs.get_mut(&job_id) else {
            error!(job_id = %job_id, "job not found for failure");
            return;
        };
        if job.status.is_terminal() {
            warn!(job_id = %job_id, status = ?job.status, "ignoring failure of terminal job");
            return;
        }

        job.status = JobStatus::Failed;
        job.error = Some(error_message.to_string());
        job.current_step = "processing failed".into();
        job.result = partial;
        job.updated_at = Utc::now();
        error!(job_id = %job_id, error = error_message, "job failed");
    }

    /// Snapshot of a single job.
    pub fn get(&self, job_id: JobId) -> Option<Job> {
        self.lock().jobs.get(&job_id).cloned()
    }

    /// Snapshot of all jobs.
    pub fn list(&self) -> Vec<Job> {
        self.lock().jobs.values().cloned().collect()
    }

    /// Delete a job and all its subscriptions. Returns whether it existed.
    pub fn delete(&self, job_id: JobId) -> bool {
        let mut inner = self.lock();
        let existed = inner.jobs.remove(&job_id).is_some();
        inner.subscribers.remove(&job_id);
        if existed {
            info!(job_id = %job_id, "job deleted");
        }
        existed
    }

    /// Register a progress subscriber for a job.
    ///
    /// The receiver yields one [`ProgressUpdate`] per store update until the
    /// subscription is removed (explicitly, or with the job's deletion).
    pub fn subscribe(
        &self,
        job_id: JobId,
    ) -> Result<(SubscriptionId, UnboundedReceiver<ProgressUpdate>)> {
        let mut inner = self.lock();
        if !inner.jobs.contains_key(&job_id) {
            return Err(ScanwerkError::JobNotFound(job_id));
        }

        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = unbounded_channel();
        inner
            .subscribers
            .entry(job_id)
            .or_default()
            .push(Subscription { id, sender });

        debug!(job_id = %job_id, subscription = id.0, "progress subscriber registered");
        Ok((id, receiver))
    }

    /// Remove one subscription. Returns whether it existed.
    pub fn unsubscribe(&self, job_id: JobId, subscription: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let Some(subs) = inner.subscribers.get_mut(&job_id) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|s| s.id != subscription);
        let removed = subs.len() < before;
        if subs.is_empty() {
            inner.subscribers.remove(&job_id);
        }
        removed
    }

    /// Number of live subscriptions for a job.
    pub fn subscriber_count(&self, job_id: JobId) -> usize {
        self.lock()
            .subscribers
            .get(&job_id)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// Remove terminal jobs whose last update is older than `max_age_hours`.
    ///
    /// Pending and Processing jobs are never touched, regardless of age.
    /// Returns the number of jobs removed.
    pub fn reap(&self, max_age_hours: i64) -> usize {
        let cutoff = Utc::now() - Duration::hours(max_age_hours);
        let mut inner = self.lock();

        let stale: Vec<JobId> = inner
            .jobs
            .values()
            .filter(|job| job.status.is_terminal() && job.updated_at < cutoff)
            .map(|job| job.id)
            .collect();

        for id in &stale {
            inner.jobs.remove(id);
            inner.subscribers.remove(id);
        }

        if !stale.is_empty() {
            info!(count = stale.len(), "reaped old jobs");
        }
        stale.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("job store lock poisoned")
    }

    /// Test support: rewrite a job's `updated_at` so age-based behaviour can
    /// be exercised without waiting.
    #[cfg(test)]
    pub(crate) fn backdate(&self, job_id: JobId, hours: i64) {
        let mut inner = self.lock();
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            job.updated_at = Utc::now() - Duration::hours(hours);
        }
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
