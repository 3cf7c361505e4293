use super::CallState;
use crate::error::{Error, Failure};
use crate::handoff::Producer;
use crate::policy::{ErrorPolicy, Propagate};

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::thread;

/// One-shot resolver handed to the setup closure of
/// [`Call::with_callback`](super::Call::with_callback).
///
/// Exactly one of [`success`](Completion::success) or
/// [`failure`](Completion::failure) may be called; both consume the
/// completion. Dropping it unresolved delivers [`Error::Unresolved`] under
/// [`Propagate`] and aborts under [`Abort`](crate::Abort).
pub struct Completion<T: Send, P: ErrorPolicy = Propagate> {
    state: Option<Arc<CallState<T, P>>>,
}

impl<T: Send + 'static, P: ErrorPolicy> Completion<T, P> {
    pub(crate) fn new(state: Arc<CallState<T, P>>) -> Self {
        Self { state: Some(state) }
    }

    /// Resolves the call with `value`.
    pub fn success(mut self, value: T) {
        if let Some(state) = self.state.take() {
            // SAFETY: the producer holds the active role until `settle`.
            unsafe { state.handoff().carrier_mut().emplace(value) };
            state.settle();
        }
    }
}

impl<T: Send + 'static> Completion<T, Propagate> {
    /// Resolves the call with an error, re-raised where the call is awaited.
    pub fn failure<E: Any + Send>(mut self, error: E) {
        if let Some(state) = self.state.take() {
            // SAFETY: the producer holds the active role until `settle`.
            unsafe { state.handoff().carrier_mut().store_failure(Failure::new(error)) };
            state.settle();
        }
    }
}

impl<T: Send, P: ErrorPolicy> fmt::Debug for Completion<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("resolved", &self.state.is_none())
            .finish()
    }
}

impl<T: Send, P: ErrorPolicy> Drop for Completion<T, P> {
    fn drop(&mut self) {
        let Some(state) = self.state.as_ref() else {
            return;
        };

        // Unwinding out of the setup closure: the setup's own panic is
        // delivered instead, once it is caught.
        if thread::panicking() && state.defer_to_setup_panic() {
            self.state = None;
            return;
        }

        log::warn!("completion dropped without a result");
        if let Some(state) = self.state.take() {
            // SAFETY: the producer holds the active role until `settle`.
            unsafe { state.handoff().carrier_mut().fail(Failure::new(Error::Unresolved)) };
            state.settle();
        }
    }
}
