//! Loading Gate
//!
//! A process-wide counter of in-flight asynchronous loads. Change tracking
//! waits for the counter to reach zero before capturing baselines, so data
//! arriving from an initial load is never reported as a user edit.
//!
//! # Pairing
//!
//! Every [`LoadingGate::increment`] must be matched by exactly one
//! [`LoadingGate::decrement`]. [`LoadingGate::begin`] and
//! [`LoadingGate::track`] do the pairing with a drop guard, which is the
//! preferred way to report a load.
//!
//! # Deferred callbacks
//!
//! Callbacks queued with [`LoadingGate::run_when_done_loading`] run once, in
//! FIFO order, on the transition to "not loading", and are then discarded.
//! They run after the lock is released, so a callback may itself increment,
//! decrement or queue more work.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, warn};

/// A one-shot callback waiting for loading to finish.
pub type DoneLoading = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct GateState {
    pending: usize,
    waiting: VecDeque<DoneLoading>,
}

/// Shared loading counter.
///
/// Clones share the same counter.
#[derive(Clone, Default)]
pub struct LoadingGate {
    state: Arc<Mutex<GateState>>,
}

static GLOBAL_GATE: OnceLock<LoadingGate> = OnceLock::new();

impl LoadingGate {
    /// Create an independent gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide gate.
    pub fn global() -> &'static LoadingGate {
        GLOBAL_GATE.get_or_init(LoadingGate::new)
    }

    /// Check if any load is in flight.
    pub fn is_loading(&self) -> bool {
        self.state.lock().pending > 0
    }

    /// Number of loads in flight.
    pub fn pending(&self) -> usize {
        self.state.lock().pending
    }

    /// Record that a load started.
    pub fn increment(&self) {
        let mut state = self.state.lock();
        state.pending += 1;
        debug!(pending = state.pending, "load started");
    }

    /// Record that a load finished.
    ///
    /// Reaching zero drains the deferred callbacks. Unpaired decrements are
    /// ignored.
    pub fn decrement(&self) {
        let drained = {
            let mut state = self.state.lock();
            if state.pending == 0 {
                warn!("loading gate decremented without a matching increment");
                return;
            }
            state.pending -= 1;
            debug!(pending = state.pending, "load finished");
            if state.pending > 0 {
                return;
            }
            std::mem::take(&mut state.waiting)
        };

        if !drained.is_empty() {
            debug!(callbacks = drained.len(), "running deferred callbacks");
        }
        for callback in drained {
            callback();
        }
    }

    /// Run `callback` once no load is in flight.
    ///
    /// Runs immediately when nothing is loading.
    pub fn run_when_done_loading<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.state.lock();
            if state.pending > 0 {
                state.waiting.push_back(Box::new(callback));
                return;
            }
        }
        callback();
    }

    /// Number of callbacks waiting for loading to finish.
    pub fn waiting(&self) -> usize {
        self.state.lock().waiting.len()
    }

    /// Start a load that ends when the returned guard is dropped.
    pub fn begin(&self) -> LoadingGuard {
        self.increment();
        LoadingGuard { gate: self.clone() }
    }

    /// Count `future` as a load while it runs.
    pub async fn track<F>(&self, future: F) -> F::Output
    where
        F: Future,
    {
        let _guard = self.begin();
        future.await
    }
}

impl fmt::Debug for LoadingGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LoadingGate")
            .field("pending", &state.pending)
            .field("waiting", &state.waiting.len())
            .finish()
    }
}

/// Ends one load when dropped.
#[must_use = "dropping the guard ends the load immediately"]
pub struct LoadingGuard {
    gate: LoadingGate,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.gate.decrement();
    }
}
