//! Run-State Controller
//!
//! Owns the process-wide [`RunState`] and guarantees at most one analysis
//! pass is in flight.
//!
//! ```text
//! idle ──trigger──> processing ──pass ends──> done ──trigger──> processing
//! ```
//!
//! The only mutation is [`RunStateController::try_begin`], a check-and-set
//! under one lock acquisition. The returned [`RunGuard`] moves the state to
//! `done` when dropped, so a pass that ends in an error (or a panic) still
//! completes the transition.

use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, warn};

use super::scheduler::{PassSummary, Scheduler};
use crate::types::RunState;

#[derive(Debug, Default)]
struct Inner {
    state: RunState,
    last_pass: Option<PassSummary>,
}

/// Outcome of a trigger request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A new pass was launched
    Started,
    /// A pass is already running; nothing was launched
    AlreadyRunning,
}

/// Shared owner of the run state.
#[derive(Debug, Default)]
pub struct RunStateController {
    inner: Mutex<Inner>,
}

impl RunStateController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state. No side effects.
    pub fn status(&self) -> RunState {
        self.lock().state
    }

    /// Summary of the most recently finished pass, if any.
    pub fn last_pass(&self) -> Option<PassSummary> {
        self.lock().last_pass.clone()
    }

    /// Move to `processing` unless a pass is already running.
    ///
    /// Returns `None` when the state was already `processing`.
    pub fn try_begin(self: &Arc<Self>) -> Option<RunGuard> {
        let mut inner = self.lock();
        if inner.state == RunState::Processing {
            return None;
        }
        inner.state = RunState::Processing;
        Some(RunGuard {
            controller: Arc::clone(self),
            summary: None,
        })
    }

    /// Launch a pass of `scheduler` on the blocking thread pool.
    ///
    /// Returns immediately; the state becomes `done` once the pass has fully
    /// finished, whether or not it succeeded. Must be called inside a tokio
    /// runtime.
    pub fn trigger(self: &Arc<Self>, scheduler: Arc<Scheduler>) -> TriggerOutcome {
        let Some(mut guard) = self.try_begin() else {
            info!("Run requested while a pass is in progress, ignoring");
            return TriggerOutcome::AlreadyRunning;
        };

        info!("Analysis pass started");
        tokio::task::spawn_blocking(move || match scheduler.run_pass() {
            Ok(summary) => guard.complete(summary),
            Err(e) => error!(error = %e, "Analysis pass aborted"),
        });
        TriggerOutcome::Started
    }

    // Poisoning only happens if a holder panicked mid-update; the data is
    // plain enum state, so recover it.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Run state lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Held for the duration of a pass. Dropping it marks the run `done`.
#[derive(Debug)]
pub struct RunGuard {
    controller: Arc<RunStateController>,
    summary: Option<PassSummary>,
}

impl RunGuard {
    /// Attach the pass summary to be published when the guard drops.
    pub fn complete(&mut self, summary: PassSummary) {
        self.summary = Some(summary);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut inner = self.controller.lock();
        inner.state = RunState::Done;
        if let Some(summary) = self.summary.take() {
            inner.last_pass = Some(summary);
        }
    }
}
