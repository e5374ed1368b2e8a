use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use taskdesk_storage::CancellationToken;

#[derive(Debug, Default)]
struct ControlState {
    paused: AtomicBool,
    cancelled: AtomicBool,
    token: Mutex<CancellationToken>,
}

/// Cloneable pause/cancel switch for a running orchestrator.
///
/// Handles can be moved into signal handlers or UI tasks while the run itself
/// holds the queue.
#[derive(Debug, Clone, Default)]
pub struct UploadHandle {
    state: Arc<ControlState>,
}

impl UploadHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop before the next record starts. The transfer in flight finishes.
    pub fn pause(&self) {
        if !self.state.paused.swap(true, Ordering::SeqCst) {
            tracing::info!("Upload pause requested");
        }
    }

    /// Stop and abort the transfer in flight.
    pub fn cancel(&self) {
        if !self.state.cancelled.swap(true, Ordering::SeqCst) {
            tracing::info!("Upload cancel requested");
        }
        self.token().cancel();
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Token for the current run. Replaced on [`reset`](Self::reset).
    pub fn token(&self) -> CancellationToken {
        match self.state.token.lock() {
            Ok(token) => token.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Clear both flags and arm a fresh token for the next run.
    pub(crate) fn reset(&self) {
        let mut token = match self.state.token.lock() {
            Ok(token) => token,
            Err(poisoned) => poisoned.into_inner(),
        };
        *token = CancellationToken::new();
        self.state.paused.store(false, Ordering::SeqCst);
        self.state.cancelled.store(false, Ordering::SeqCst);
    }
}
