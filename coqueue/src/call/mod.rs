//! Adapters that turn a closure on a queue, or a completion callback, into
//! something a task can await.

mod completion;

pub use completion::Completion;

use crate::error::{Error, Failure};
use crate::handoff::{Consumer, Handoff, Producer};
use crate::policy::{ErrorPolicy, Propagate, guard};
use crate::queue::{Queue, Work};

use std::fmt;
use std::future::IntoFuture;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::thread::{self, ThreadId};
use std::time::Instant;

/// No setup closure is running.
const SETUP_DONE: u8 = 0;

/// The setup closure of a callback call is running.
const SETUP_RUNNING: u8 = 1;

/// The completion was dropped while the setup closure unwound; the caught
/// panic becomes the result.
const SETUP_DEFERRED: u8 = 2;

/// Shared state of one async call.
pub(crate) struct CallState<T: Send, P: ErrorPolicy> {
    handoff: Handoff<T, P>,

    /// SETUP_DONE, SETUP_RUNNING or SETUP_DEFERRED.
    setup: AtomicU8,

    /// Thread running the setup closure, for callback calls.
    setup_thread: Option<ThreadId>,
}

impl<T: Send, P: ErrorPolicy> CallState<T, P> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            handoff: Handoff::running(),
            setup: AtomicU8::new(SETUP_DONE),
            setup_thread: None,
        })
    }

    fn in_setup() -> Arc<Self> {
        Arc::new(Self {
            handoff: Handoff::running(),
            setup: AtomicU8::new(SETUP_RUNNING),
            setup_thread: Some(thread::current().id()),
        })
    }

    /// Returns `true` if a completion dropped now should leave the result
    /// to the panic escaping the setup closure.
    ///
    /// Only a drop on the setup thread itself qualifies. Whoever loses the
    /// race against [`finish_setup`](Self::finish_setup) settles the call.
    fn defer_to_setup_panic(&self) -> bool {
        self.setup_thread == Some(thread::current().id())
            && self
                .setup
                .compare_exchange(
                    SETUP_RUNNING,
                    SETUP_DEFERRED,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
    }

    /// Ends the setup phase. Returns `true` if a completion deferred to it.
    fn finish_setup(&self) -> bool {
        match self
            .setup
            .compare_exchange(SETUP_RUNNING, SETUP_DONE, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => false,
            Err(previous) => {
                debug_assert_eq!(previous, SETUP_DEFERRED);
                true
            }
        }
    }
}

impl<T: Send, P: ErrorPolicy> Producer for CallState<T, P> {
    type Output = T;
    type Policy = P;

    fn handoff(&self) -> &Handoff<T, P> {
        &self.handoff
    }

    fn destroy(&self) {
        self.handoff.release();
    }
}

/// An asynchronous call that can be awaited once.
///
/// Built by [`call_on`] or [`Call::with_callback`]. The operation starts as
/// soon as the call is created; awaiting only collects the result.
///
/// # Examples
///
/// ```rust,ignore
/// let sum = call_on(&worker, || 2 + 2).resume_on(&main).await;
/// ```
#[must_use = "dropping a call discards its result"]
pub struct Call<T: Send, P: ErrorPolicy = Propagate> {
    consumer: Consumer<CallState<T, P>>,
}

impl<T: Send + 'static, P: ErrorPolicy> Call<T, P> {
    /// Runs `f` inside a work item of `queue`.
    ///
    /// A panic in `f` is handled according to `P`.
    pub fn on<F>(queue: &Queue, f: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let state = CallState::new();
        let producer = state.clone();

        queue.dispatch(
            Work::new(move || {
                match guard(f) {
                    // SAFETY: the producer holds the active role until
                    // `settle`.
                    Ok(value) => unsafe { producer.handoff.carrier_mut().emplace(value) },
                    Err(failure) => unsafe { producer.handoff.carrier_mut().fail(failure) },
                }
                producer.settle();
            }),
            None,
        );

        Self {
            consumer: Consumer::new(state),
        }
    }

    /// Wraps a callback based operation.
    ///
    /// `setup` runs synchronously and receives a [`Completion`] that must
    /// eventually be resolved, typically from a callback on another thread.
    /// If `setup` panics while still owning the completion, the panic
    /// becomes the call's result right away, without any queue hop.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let bytes = Call::with_callback(|done| {
    ///     legacy_read(path, move |data| done.success(data));
    /// })
    /// .await;
    /// ```
    pub fn with_callback<S>(setup: S) -> Self
    where
        S: FnOnce(Completion<T, P>),
    {
        let state = CallState::in_setup();
        let completion = Completion::new(state.clone());

        let outcome = guard(|| setup(completion));
        let deferred = state.finish_setup();
        match outcome {
            Err(failure) if deferred => {
                // SAFETY: the completion is gone, this is the producer now.
                unsafe { state.handoff.carrier_mut().fail(failure) };
                state.settle();
            }
            Err(failure) => {
                log::warn!("call setup panicked after handing off its completion: {failure}");
            }
            Ok(()) if deferred => {
                // SAFETY: as above.
                unsafe { state.handoff.carrier_mut().fail(Failure::new(Error::Unresolved)) };
                state.settle();
            }
            Ok(()) => {}
        }

        Self {
            consumer: Consumer::new(state),
        }
    }

    /// Makes the awaiting task continue on `queue`.
    pub fn resume_on(self, queue: &Queue) -> Self {
        self.consumer
            .producer()
            .handoff()
            .set_resume_target(Some(queue.clone()), None);
        self
    }

    /// Makes the awaiting task continue on `queue`, no earlier than
    /// `deadline`.
    pub fn resume_on_after(self, queue: &Queue, deadline: Instant) -> Self {
        self.consumer
            .producer()
            .handoff()
            .set_resume_target(Some(queue.clone()), Some(deadline));
        self
    }
}

impl<T: Send + 'static> Call<T, Propagate> {
    /// Awaits the result, returning a failure instead of re-raising it.
    pub fn into_result(self) -> CallResult<T> {
        CallResult {
            consumer: self.consumer,
        }
    }
}

impl<T: Send, P: ErrorPolicy> fmt::Debug for Call<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call").finish_non_exhaustive()
    }
}

impl<T: Send + 'static, P: ErrorPolicy> IntoFuture for Call<T, P> {
    type Output = T;
    type IntoFuture = CallFuture<T, P>;

    fn into_future(self) -> Self::IntoFuture {
        CallFuture {
            consumer: self.consumer,
        }
    }
}

/// Future awaiting a [`Call`].
pub struct CallFuture<T: Send, P: ErrorPolicy = Propagate> {
    consumer: Consumer<CallState<T, P>>,
}

impl<T: Send, P: ErrorPolicy> Future for CallFuture<T, P> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        ready!(self.consumer.poll_ready(cx));

        // SAFETY: `poll_ready` resolved, the consumer holds the active role.
        Poll::Ready(unsafe { self.consumer.carrier() }.move_out())
    }
}

/// Future returned by [`Call::into_result`].
pub struct CallResult<T: Send> {
    consumer: Consumer<CallState<T, Propagate>>,
}

impl<T: Send> Future for CallResult<T> {
    type Output = Result<T, Failure>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        ready!(self.consumer.poll_ready(cx));

        // SAFETY: `poll_ready` resolved, the consumer holds the active role.
        Poll::Ready(unsafe { self.consumer.carrier() }.try_move_out())
    }
}

/// Runs `f` inside a work item of `queue` and returns an awaitable
/// [`Call`] for its result.
pub fn call_on<T, F>(queue: &Queue, f: F) -> Call<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    Call::on(queue, f)
}

/// Like [`call_on`], with an explicit error policy.
///
/// ```rust,ignore
/// let checksum = call_on_with::<Abort, _, _>(&worker, move || crc32(&bytes)).await;
/// ```
pub fn call_on_with<P, T, F>(queue: &Queue, f: F) -> Call<T, P>
where
    P: ErrorPolicy,
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    Call::on(queue, f)
}

/// Shorthand for [`Call::with_callback`] with the default error policy.
pub fn call_with_callback<T, S>(setup: S) -> Call<T>
where
    T: Send + 'static,
    S: FnOnce(Completion<T>),
{
    Call::with_callback(setup)
}
