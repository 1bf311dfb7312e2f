//! Pacing between emitted fixes.
//!
//! After a fix is broadcast the emission loop parks in the
//! [`PacingController`] until the fix's transition condition is met: its hold
//! duration elapses (auto) or an [`AdvanceSignal`] is triggered (manual).

use crate::fix::{Fix, TransitionMode};
use std::sync::Arc;
use tokio::sync::watch;

/// Injectable "advance" signal, typically fed by operator keypresses.
///
/// Each trigger bumps a generation counter. A wait only returns for a trigger
/// raised after it started, so presses made while nobody is waiting are
/// dropped. Use [`AdvanceSignal::waiter`] to also catch presses made before
/// the wait begins.
#[derive(Debug, Clone)]
pub struct AdvanceSignal {
    generation: Arc<watch::Sender<u64>>,
}

impl Default for AdvanceSignal {
    fn default() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            generation: Arc::new(generation),
        }
    }
}

impl AdvanceSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release everyone currently waiting.
    pub fn trigger(&self) {
        self.generation.send_modify(|g| *g = g.wrapping_add(1));
    }

    /// Wait for a trigger raised after this call.
    pub async fn wait(&self) {
        self.waiter().wait().await;
    }

    /// A waiter that remembers triggers from the moment it is created.
    pub fn waiter(&self) -> AdvanceWaiter {
        AdvanceWaiter {
            rx: self.generation.subscribe(),
        }
    }
}

/// Receiving end of an [`AdvanceSignal`] that latches triggers.
#[derive(Debug)]
pub struct AdvanceWaiter {
    rx: watch::Receiver<u64>,
}

impl AdvanceWaiter {
    /// Wait for a trigger newer than the last one this waiter saw.
    pub async fn wait(&mut self) {
        if self.rx.changed().await.is_err() {
            // Every signal handle is gone; nothing can advance us
            std::future::pending::<()>().await;
        }
    }
}

/// Controller state for the fix most recently emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingState {
    /// Ready to emit the next fix
    Idle,
    /// Holding on an emitted fix until its transition condition is met
    Waiting(TransitionMode),
}

/// Gates the transition from one emitted fix to the next.
#[derive(Debug)]
pub struct PacingController {
    advance: AdvanceSignal,
    state: PacingState,
}

impl PacingController {
    /// Create a controller that uses `advance` for manual transitions.
    pub fn new(advance: AdvanceSignal) -> Self {
        Self {
            advance,
            state: PacingState::Idle,
        }
    }

    /// Handle to the signal that releases manual transitions.
    pub fn advance_signal(&self) -> AdvanceSignal {
        self.advance.clone()
    }

    pub fn state(&self) -> PacingState {
        self.state
    }

    /// Hold on an emitted fix until it may be left.
    ///
    /// Auto fixes sleep for their hold duration; manual fixes wait for an
    /// advance trigger raised after the hold began, with no timer running.
    pub async fn hold(&mut self, fix: &Fix) {
        let mode = fix.transition();
        self.state = PacingState::Waiting(mode);

        match mode {
            TransitionMode::Auto => tokio::time::sleep(fix.hold_duration()).await,
            TransitionMode::Manual => {
                tracing::debug!(index = fix.sequence_index(), "Waiting for manual advance");
                self.advance.wait().await;
            }
        }

        self.state = PacingState::Idle;
    }
}
