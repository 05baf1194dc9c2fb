// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — the surface external callers drive.
//
// Owns the job store, the progress bridge, the pipeline collaborators, and
// a bounded pool of worker slots (one job per slot). Submissions return
// immediately with a job id; the pipeline runs on the blocking pool and all
// lifecycle transitions flow through the progress bridge so subscriber
// delivery stays on the scheduler.
//
// There is no cancellation of an in-flight run: deleting a job removes its
// record and subscriptions, and any later events for it are logged no-ops.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use scanwerk_core::config::{ConfigOverrides, ProcessingConfig};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{Job, JobId, JobStatus, ProgressUpdate};
use scanwerk_document::segment::TextExtractor;
use scanwerk_document::source::PageSource;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::broadcast::ProgressBroadcaster;
use crate::pipeline::PipelineCoordinator;
use crate::store::{JobStore, SubscriptionId};

/// Default number of concurrently running pipeline jobs.
const DEFAULT_WORKER_SLOTS: usize = 4;

/// How often the background reaper runs.
const REAP_INTERVAL: Duration = Duration::from_secs(3600);

/// Age in hours past which terminal jobs are reaped.
const REAP_MAX_AGE_HOURS: i64 = 24;

/// Submission, query, and subscription surface over the processing engine.
///
/// Cheaply cloneable; all clones share the same store, bridge, and worker
/// pool.
#[derive(Clone)]
pub struct ProcessingService {
    store: JobStore,
    defaults: ProcessingConfig,
    coordinator: Arc<PipelineCoordinator>,
    broadcaster: Arc<ProgressBroadcaster>,
    slots: Arc<Semaphore>,
}

impl ProcessingService {
    /// Build the service. Must be called within a tokio runtime (the
    /// progress bridge task is spawned here).
    pub fn new(
        store: JobStore,
        defaults: ProcessingConfig,
        source: Arc<dyn PageSource>,
        extractor: Option<Arc<dyn TextExtractor>>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let broadcaster = Arc::new(ProgressBroadcaster::spawn(store.clone()));
        let coordinator = Arc::new(PipelineCoordinator::new(source, extractor, output_dir));

        info!("processing service initialised");
        Self {
            store,
            defaults,
            coordinator,
            broadcaster,
            slots: Arc::new(Semaphore::new(DEFAULT_WORKER_SLOTS)),
        }
    }

    /// Replace the worker slot count (defaults to 4).
    pub fn with_worker_slots(mut self, slots: usize) -> Self {
        self.slots = Arc::new(Semaphore::new(slots.max(1)));
        self
    }

    /// Submit a document for processing.
    ///
    /// Creates a Pending job whose config snapshot is the service defaults
    /// merged with `overrides`, then hands the pipeline to a worker slot.
    /// Returns the job id immediately.
    #[instrument(skip(self, overrides), fields(input = %input.display()))]
    pub fn submit(&self, input: PathBuf, overrides: Option<&ConfigOverrides>) -> JobId {
        let config = match overrides {
            Some(overrides) => self.defaults.with_overrides(overrides),
            None => self.defaults.clone(),
        };

        let filename = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.display().to_string());
        let job_id = self.store.create(&filename, config.clone());

        let sender = self.broadcaster.sender(job_id);
        let coordinator = Arc::clone(&self.coordinator);
        let slots = Arc::clone(&self.slots);

        tokio::spawn(async move {
            let Ok(_permit) = slots.acquire_owned().await else {
                // Semaphore closed: the process is shutting down.
                warn!(job_id = %job_id, "worker pool closed, job abandoned");
                return;
            };

            sender.update_status(0, "starting document processing", JobStatus::Processing);

            let worker_sender = sender.clone();
            let worker = tokio::task::spawn_blocking(move || {
                coordinator.run(&input, &config, &worker_sender)
            });

            match worker.await {
                Ok(Ok(outcome)) => sender.completed(outcome),
                Ok(Err(failure)) => {
                    sender.failed(failure.error.to_string(), Some(failure.partial));
                }
                Err(join_error) => {
                    sender.failed(format!("pipeline worker panicked: {join_error}"), None);
                }
            }
        });

        job_id
    }

    /// Snapshot of one job.
    pub fn status(&self, job_id: JobId) -> Result<Job> {
        self.store
            .get(job_id)
            .ok_or(ScanwerkError::JobNotFound(job_id))
    }

    /// Snapshots of all jobs.
    pub fn list(&self) -> Vec<Job> {
        self.store.list()
    }

    /// Delete a job record (and its subscriptions). The pipeline run, if
    /// still in flight, continues and its late events are dropped.
    pub fn delete(&self, job_id: JobId) -> Result<()> {
        if self.store.delete(job_id) {
            Ok(())
        } else {
            Err(ScanwerkError::JobNotFound(job_id))
        }
    }

    /// Register for a job's progress stream.
    pub fn subscribe(
        &self,
        job_id: JobId,
    ) -> Result<(SubscriptionId, UnboundedReceiver<ProgressUpdate>)> {
        self.store.subscribe(job_id)
    }

    /// Remove a progress subscription.
    pub fn unsubscribe(&self, job_id: JobId, subscription: SubscriptionId) -> bool {
        self.store.unsubscribe(job_id, subscription)
    }

    /// Run one reap pass immediately. Returns the number of jobs removed.
    pub fn reap_now(&self, max_age_hours: i64) -> usize {
        self.store.reap(max_age_hours)
    }

    /// Spawn the hourly background reaper (terminal jobs older than 24h).
    pub fn spawn_reaper(&self) -> JoinHandle<()> {
        let store = self.store.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(REAP_INTERVAL);
            // The first tick fires immediately; consume it so reaping
            // starts one full interval after launch.
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = store.reap(REAP_MAX_AGE_HOURS);
                info!(removed, "scheduled job reaping complete");
            }
        })
    }

    /// The underlying job store (e.g. for transport adapters).
    pub fn store(&self) -> &JobStore {
        &self.store
    }
}
