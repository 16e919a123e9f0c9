//! Submission controller — the capture-to-decision state machine.
//!
//! Owns one comparison attempt at a time: `Idle → Submitting → {MatchFound |
//! NoMatchFound | SubmissionFailed}`. Terminal outcomes are handed over
//! exactly once via [`SubmissionController::take_outcome`] or
//! [`SubmissionController::take_route`], which return the controller to Idle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use crate::registry::Registry;
use crate::routing::{self, Route};
use crate::types::{ComparisonOutcome, ImageHandle};

/// Minimum time between the service answering and the terminal phase.
pub const DEFAULT_PACING: Duration = Duration::from_secs(1);

/// Observable phase of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting,
    MatchFound,
    NoMatchFound,
    SubmissionFailed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Phase::MatchFound | Phase::NoMatchFound | Phase::SubmissionFailed
        )
    }

    fn of(outcome: &ComparisonOutcome) -> Self {
        match outcome {
            ComparisonOutcome::Match { .. } => Phase::MatchFound,
            ComparisonOutcome::NoMatch => Phase::NoMatchFound,
            ComparisonOutcome::Failure { .. } => Phase::SubmissionFailed,
        }
    }
}

/// How a submitted attempt ended from the submitter's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    /// The outcome was stored and the controller is in a terminal phase.
    Resolved,
    /// The attempt was reset while in flight; its result was discarded.
    Aborted,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("a comparison is already in flight")]
    InFlight,
    #[error("previous outcome ({0:?}) has not been consumed or reset")]
    Unconsumed(Phase),
}

/// A submission the controller refused, with the image handed back.
#[derive(Error, Debug, PartialEq)]
#[error("{reason}")]
pub struct Rejected {
    pub reason: SubmitError,
    pub image: ImageHandle,
}

/// A terminal outcome together with the image that produced it.
#[derive(Debug)]
pub struct Settled {
    pub image: ImageHandle,
    pub outcome: ComparisonOutcome,
}

enum Slot {
    Idle,
    Submitting { attempt: u64 },
    Resolved(Settled),
}

struct State {
    slot: Slot,
    /// Set from `submit` until the registry call settles, even if the
    /// attempt was reset in the meantime.
    in_flight: bool,
    last_attempt: u64,
}

pub struct SubmissionController<R: ?Sized> {
    registry: Arc<R>,
    pacing: Duration,
    state: Mutex<State>,
    phase_tx: watch::Sender<Phase>,
}

impl<R: Registry + ?Sized> SubmissionController<R> {
    pub fn new(registry: Arc<R>) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Idle);
        Self {
            registry,
            pacing: DEFAULT_PACING,
            state: Mutex::new(State {
                slot: Slot::Idle,
                in_flight: false,
                last_attempt: 0,
            }),
            phase_tx,
        }
    }

    /// Override the pacing delay applied before a terminal phase is published.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    pub fn phase(&self) -> Phase {
        *self.phase_tx.borrow()
    }

    /// Receive every phase transition.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    /// Submit `image` for comparison and wait for the attempt to settle.
    ///
    /// Rejected while another comparison is in flight or while a terminal
    /// outcome is still waiting to be consumed; the image comes back in
    /// [`Rejected`]. Dropping the returned future
    /// aborts the attempt and returns the controller to Idle.
    pub async fn submit(&self, image: ImageHandle) -> Result<AttemptStatus, Rejected> {
        let attempt = match self.begin() {
            Ok(attempt) => attempt,
            Err(reason) => return Err(Rejected { reason, image }),
        };
        let guard = InFlight {
            controller: self,
            attempt,
            settled: false,
        };

        tracing::info!(attempt, image = %image, "comparison submitted");
        let outcome = ComparisonOutcome::from(self.registry.compare(&image).await);

        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }

        Ok(guard.settle(image, outcome))
    }

    /// Hand over the terminal outcome, returning the controller to Idle.
    pub fn take_outcome(&self) -> Option<Settled> {
        let mut state = self.lock();
        match std::mem::replace(&mut state.slot, Slot::Idle) {
            Slot::Resolved(settled) => {
                self.publish(Phase::Idle);
                Some(settled)
            }
            other => {
                state.slot = other;
                None
            }
        }
    }

    /// Consume the terminal outcome and decide where the presentation goes next.
    pub fn take_route(&self) -> Option<Route> {
        self.take_outcome()
            .map(|settled| routing::route(self.registry.as_ref(), settled))
    }

    /// Discard any outcome and return to Idle.
    ///
    /// Resetting while Submitting abandons the attempt: the request still runs
    /// to completion but its result is dropped, and new submissions are
    /// refused until it has settled.
    pub fn reset(&self) {
        let mut state = self.lock();
        match std::mem::replace(&mut state.slot, Slot::Idle) {
            Slot::Idle => return,
            Slot::Submitting { attempt } => {
                tracing::info!(attempt, "in-flight comparison abandoned");
            }
            Slot::Resolved(settled) => {
                tracing::debug!(image = %settled.image, "outcome discarded");
            }
        }
        self.publish(Phase::Idle);
    }

    fn begin(&self) -> Result<u64, SubmitError> {
        let mut state = self.lock();
        if state.in_flight {
            tracing::warn!("submit rejected: comparison already in flight");
            return Err(SubmitError::InFlight);
        }
        if let Slot::Resolved(settled) = &state.slot {
            return Err(SubmitError::Unconsumed(Phase::of(&settled.outcome)));
        }

        state.last_attempt += 1;
        let attempt = state.last_attempt;
        state.in_flight = true;
        state.slot = Slot::Submitting { attempt };
        self.publish(Phase::Submitting);
        Ok(attempt)
    }

    fn publish(&self, phase: Phase) {
        self.phase_tx.send_replace(phase);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight flag however `submit` exits.
struct InFlight<'a, R: Registry + ?Sized> {
    controller: &'a SubmissionController<R>,
    attempt: u64,
    settled: bool,
}

impl<R: Registry + ?Sized> InFlight<'_, R> {
    fn settle(mut self, image: ImageHandle, outcome: ComparisonOutcome) -> AttemptStatus {
        self.settled = true;
        let mut state = self.controller.lock();
        state.in_flight = false;

        let current = matches!(state.slot, Slot::Submitting { attempt } if attempt == self.attempt);
        if !current {
            tracing::debug!(attempt = self.attempt, "stale comparison result discarded");
            return AttemptStatus::Aborted;
        }

        let phase = Phase::of(&outcome);
        match &outcome {
            ComparisonOutcome::Match { similarity, person } => tracing::info!(
                attempt = self.attempt,
                user_id = %person.user_id,
                similarity = %similarity,
                "match found"
            ),
            ComparisonOutcome::NoMatch => {
                tracing::info!(attempt = self.attempt, "no match found")
            }
            ComparisonOutcome::Failure { reason } => tracing::warn!(
                attempt = self.attempt,
                class = ?reason.class(),
                error = %reason,
                "comparison failed"
            ),
        }

        state.slot = Slot::Resolved(Settled { image, outcome });
        self.controller.publish(phase);
        AttemptStatus::Resolved
    }
}

impl<R: Registry + ?Sized> Drop for InFlight<'_, R> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.controller.lock();
        state.in_flight = false;
        if matches!(state.slot, Slot::Submitting { attempt } if attempt == self.attempt) {
            state.slot = Slot::Idle;
            self.controller.publish(Phase::Idle);
            tracing::warn!(attempt = self.attempt, "submission dropped before resolution");
        }
    }
}
