// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Worker-to-scheduler progress bridge.
//
// Pipeline stages run on blocking worker threads, but subscriber delivery
// must happen on the async scheduler. Every job event therefore crosses one
// unbounded mpsc channel into a single forwarder task, which alone applies
// events to the job store (and thereby fans out to subscribers). The single
// channel + single consumer preserves per-job event order, and because
// completion flows through the same channel, no late progress event can
// overtake a terminal transition.

use scanwerk_core::types::{JobId, JobStatus, ProcessingOutcome};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::JobStore;

/// An event produced by a pipeline worker for one job.
#[derive(Debug)]
pub enum JobEvent {
    Progress {
        job_id: JobId,
        progress: u8,
        step: String,
        status: Option<JobStatus>,
    },
    Completed {
        job_id: JobId,
        outcome: ProcessingOutcome,
    },
    Failed {
        job_id: JobId,
        error: String,
        partial: Option<ProcessingOutcome>,
    },
}

/// Fans worker events out to job-store subscribers from the scheduler side.
pub struct ProgressBroadcaster {
    tx: UnboundedSender<JobEvent>,
    handle: JoinHandle<()>,
}

impl ProgressBroadcaster {
    /// Spawn the forwarder task. Must be called within a tokio runtime.
    pub fn spawn(store: JobStore) -> Self {
        let (tx, mut rx) = unbounded_channel::<JobEvent>();

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    JobEvent::Progress {
                        job_id,
                        progress,
                        step,
                        status,
                    } => store.update_progress(job_id, progress, &step, status),
                    JobEvent::Completed { job_id, outcome } => store.complete(job_id, outcome),
                    JobEvent::Failed {
                        job_id,
                        error,
                        partial,
                    } => store.fail(job_id, &error, partial),
                }
            }
            info!("progress bridge drained, forwarder exiting");
        });

        Self { tx, handle }
    }

    /// A cloneable sender bound to one job, for handing into the worker.
    pub fn sender(&self, job_id: JobId) -> ProgressSender {
        ProgressSender {
            job_id,
            tx: self.tx.clone(),
        }
    }

    /// Stop the forwarder immediately. Events sent afterwards are dropped
    /// with a diagnostic log by their senders.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

/// Worker-side handle that pushes events for one job across the bridge.
///
/// Sending never blocks. If the scheduler side is gone (shutdown), the
/// event is dropped with a debug log — never an error that could abort the
/// worker.
#[derive(Clone)]
pub struct ProgressSender {
    job_id: JobId,
    tx: UnboundedSender<JobEvent>,
}

impl ProgressSender {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Report a progress percentage and step description.
    pub fn update(&self, progress: u8, step: impl Into<String>) {
        self.send(JobEvent::Progress {
            job_id: self.job_id,
            progress,
            step: step.into(),
            status: None,
        });
    }

    /// Report progress together with a status transition.
    pub fn update_status(&self, progress: u8, step: impl Into<String>, status: JobStatus) {
        self.send(JobEvent::Progress {
            job_id: self.job_id,
            progress,
            step: step.into(),
            status: Some(status),
        });
    }

    /// Report successful completion with the final outcome.
    pub fn completed(&self, outcome: ProcessingOutcome) {
        self.send(JobEvent::Completed {
            job_id: self.job_id,
            outcome,
        });
    }

    /// Report failure with the error message and any partial outcome.
    pub fn failed(&self, error: impl Into<String>, partial: Option<ProcessingOutcome>) {
        self.send(JobEvent::Failed {
            job_id: self.job_id,
            error: error.into(),
            partial,
        });
    }

    fn send(&self, event: JobEvent) {
        if self.tx.send(event).is_err() {
            debug!(job_id = %self.job_id, "scheduler unavailable, dropping job event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanwerk_core::config::ProcessingConfig;

    async fn settled(store: &JobStore, job_id: JobId, predicate: impl Fn(&scanwerk_core::types::Job) -> bool) {
        for _ in 0..100 {
            if store.get(job_id).as_ref().is_some_and(&predicate) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("store never reached expected state for job {job_id}");
    }

    #[tokio::test]
    async fn events_are_applied_to_the_store_in_order() {
        let store = JobStore::new();
        let job_id = store.create("batch.pdf", ProcessingConfig::default());
        let broadcaster = ProgressBroadcaster::spawn(store.clone());
        let sender = broadcaster.sender(job_id);

        sender.update_status(0, "starting", JobStatus::Processing);
        sender.update(40, "filtering");
        sender.completed(ProcessingOutcome::new("batch.pdf"));

        settled(&store, job_id, |job| job.status == JobStatus::Completed).await;
        let job = store.get(job_id).expect("found");
        assert_eq!(job.progress, 100);
        assert!(job.result.is_some());
    }

    #[tokio::test]
    async fn late_progress_cannot_overtake_completion() {
        let store = JobStore::new();
        let job_id = store.create("batch.pdf", ProcessingConfig::default());
        let broadcaster = ProgressBroadcaster::spawn(store.clone());
        let sender = broadcaster.sender(job_id);

        sender.update(85, "writing output");
        sender.completed(ProcessingOutcome::new("batch.pdf"));
        // Ordered behind the completion on the same channel, so it must be
        // ignored by the store's terminal guard.
        sender.update(90, "stale");

        settled(&store, job_id, |job| job.status == JobStatus::Completed).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let job = store.get(job_id).expect("found");
        assert_eq!(job.progress, 100);
        assert_eq!(job.current_step, "processing completed");
    }

    #[tokio::test]
    async fn failure_event_records_partial_outcome() {
        let store = JobStore::new();
        let job_id = store.create("batch.pdf", ProcessingConfig::default());
        let broadcaster = ProgressBroadcaster::spawn(store.clone());
        let sender = broadcaster.sender(job_id);

        let mut partial = ProcessingOutcome::new("batch.pdf");
        partial.total_pages = 12;
        sender.failed("render exploded", Some(partial));

        settled(&store, job_id, |job| job.status == JobStatus::Failed).await;
        let job = store.get(job_id).expect("found");
        assert_eq!(job.error.as_deref(), Some("render exploded"));
        assert_eq!(job.result.expect("partial").total_pages, 12);
    }

    #[tokio::test]
    async fn sending_after_shutdown_is_silent() {
        let store = JobStore::new();
        let job_id = store.create("batch.pdf", ProcessingConfig::default());
        let broadcaster = ProgressBroadcaster::spawn(store.clone());
        let sender = broadcaster.sender(job_id);

        broadcaster.shutdown();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // Must not panic; the event is simply dropped.
        sender.update(50, "into the void");
        assert_eq!(store.get(job_id).expect("found").progress, 0);
    }
}
