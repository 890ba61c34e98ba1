//! Submit Gating
//!
//! A submit first marks the form and every nested form with the outcome of
//! the validity check. An invalid tree blocks the action. A valid one runs it
//! inside a busy window: the indicator's `before` fires first, and `after`
//! fires once the action's result has settled. For a plain value that is
//! right away. For a deferred value it is when the returned future finishes,
//! or when it is dropped.
//!
//! While a form has a deferred submit in flight, further submits on that form
//! report [`SubmitOutcome::Busy`] without running the action.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::{FutureExt, LocalBoxFuture};
use indexmap::IndexMap;
use tracing::debug;

use crate::error::{FormError, Result};
use crate::graph::{FormId, FormTree};
use crate::strategy::BusyIndicator;

/// What an action hands back.
pub enum ActionResult<T> {
    /// Settled immediately.
    Ready(T),
    /// Settles when the future completes.
    Deferred(LocalBoxFuture<'static, T>),
}

impl<T> ActionResult<T> {
    /// Wrap a future.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = T> + 'static,
    {
        ActionResult::Deferred(future.boxed_local())
    }
}

impl<T> From<T> for ActionResult<T> {
    fn from(value: T) -> Self {
        ActionResult::Ready(value)
    }
}

/// What a submit attempt did.
pub enum SubmitOutcome<T> {
    /// The form was invalid; the action did not run.
    Blocked,
    /// A previous submit of the same form is still pending.
    Busy,
    /// The action ran and settled immediately.
    Completed(T),
    /// The action ran and settles with this future.
    Pending(LocalBoxFuture<'static, T>),
}

impl<T> SubmitOutcome<T> {
    /// True when the action was invoked.
    pub fn ran(&self) -> bool {
        matches!(self, SubmitOutcome::Completed(_) | SubmitOutcome::Pending(_))
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, SubmitOutcome::Blocked)
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, SubmitOutcome::Busy)
    }

    /// Wait for the action's value, if it ran.
    pub async fn settle(self) -> Option<T> {
        match self {
            SubmitOutcome::Completed(value) => Some(value),
            SubmitOutcome::Pending(future) => Some(future.await),
            SubmitOutcome::Blocked | SubmitOutcome::Busy => None,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SubmitOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitOutcome::Blocked => f.write_str("Blocked"),
            SubmitOutcome::Busy => f.write_str("Busy"),
            SubmitOutcome::Completed(value) => f.debug_tuple("Completed").field(value).finish(),
            SubmitOutcome::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Ends a busy window when dropped.
struct BusyWindow {
    indicator: Arc<dyn BusyIndicator>,
    in_flight: Option<Arc<AtomicBool>>,
}

impl BusyWindow {
    fn open(indicator: Arc<dyn BusyIndicator>, in_flight: Option<Arc<AtomicBool>>) -> Self {
        indicator.before();
        if let Some(flag) = &in_flight {
            flag.store(true, Ordering::SeqCst);
        }
        Self {
            indicator,
            in_flight,
        }
    }
}

impl Drop for BusyWindow {
    fn drop(&mut self) {
        self.indicator.after();
        if let Some(flag) = &self.in_flight {
            flag.store(false, Ordering::SeqCst);
        }
    }
}

fn run_in_window<T, F>(window: BusyWindow, action: F) -> SubmitOutcome<T>
where
    T: 'static,
    F: FnOnce() -> ActionResult<T>,
{
    match action() {
        ActionResult::Ready(value) => {
            drop(window);
            SubmitOutcome::Completed(value)
        }
        ActionResult::Deferred(future) => SubmitOutcome::Pending(
            async move {
                let _window = window;
                future.await
            }
            .boxed_local(),
        ),
    }
}

/// Run `action` inside a busy window without any validation gate.
pub fn run_busy<T, F>(indicator: Arc<dyn BusyIndicator>, action: F) -> SubmitOutcome<T>
where
    T: 'static,
    F: FnOnce() -> ActionResult<T>,
{
    run_in_window(BusyWindow::open(indicator, None), action)
}

/// Per-form submit state.
#[derive(Debug, Default)]
pub struct SubmitController {
    in_flight: IndexMap<FormId, Arc<AtomicBool>>,
}

impl SubmitController {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a deferred submit of `form` has not settled.
    pub fn is_pending(&self, form: FormId) -> bool {
        self.in_flight
            .get(&form)
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Gate `action` on the validity of `form_id`'s subtree.
    pub fn attempt_submit<T, F>(
        &mut self,
        tree: &mut FormTree,
        form_id: FormId,
        indicator: Arc<dyn BusyIndicator>,
        action: F,
    ) -> Result<SubmitOutcome<T>>
    where
        T: 'static,
        F: FnOnce() -> ActionResult<T>,
    {
        if tree.form(form_id).is_none() {
            return Err(FormError::UnknownForm(form_id));
        }
        if self.is_pending(form_id) {
            debug!(form = form_id.raw(), "submit ignored while previous submit is pending");
            return Ok(SubmitOutcome::Busy);
        }

        let invalid = tree.is_invalid(form_id);
        for id in tree.descendants(form_id) {
            if let Some(form) = tree.form_mut(id) {
                form.invalid_attempt = invalid;
            }
        }

        if invalid {
            debug!(form = form_id.raw(), "submit blocked by validation errors");
            return Ok(SubmitOutcome::Blocked);
        }

        let flag = self.in_flight.entry(form_id).or_default().clone();
        debug!(form = form_id.raw(), "submitting");
        Ok(run_in_window(BusyWindow::open(indicator, Some(flag)), action))
    }

    /// Drop the state of forms that were torn down.
    pub fn forget(&mut self, forms: &[FormId]) {
        for form in forms {
            self.in_flight.shift_remove(form);
        }
    }
}
