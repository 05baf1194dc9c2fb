// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page analysis — pixel signal metrics and blank page classification.

pub mod blank;
pub mod metrics;

pub use blank::BlankClassifier;
pub use metrics::{SignalBundle, compute_signals};
