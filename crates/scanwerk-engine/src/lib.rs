// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-engine — Job lifecycle, progress broadcasting, and pipeline
// orchestration for the Scanwerk batch engine.
//
// The engine bridges between the async scheduler (job store, subscriptions,
// service surface) and the blocking pipeline work (rendering, analysis,
// hashing, writing) running on a bounded worker pool.

pub mod broadcast;
pub mod pipeline;
pub mod service;
pub mod store;

pub use broadcast::{JobEvent, ProgressBroadcaster, ProgressSender};
pub use pipeline::{PipelineCoordinator, PipelineFailure};
pub use service::ProcessingService;
pub use store::{JobStore, SubscriptionId};
