use super::state::{DONE, IDLE, NOTIFIED, POLLING};
use crate::error::Failure;
use crate::policy::guard;

use std::cell::{Cell, UnsafeCell};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll, Waker};

thread_local! {
    /// Owner of the body this thread is polling right now, 0 when none.
    static DRIVING: Cell<usize> = const { Cell::new(0) };
}

/// Returns the owner passed to the innermost [`Body::drive`] running on
/// this thread.
pub(crate) fn driving() -> Option<usize> {
    match DRIVING.with(Cell::get) {
        0 => None,
        owner => Some(owner),
    }
}

fn enter_body<R>(owner: usize, f: impl FnOnce() -> R) -> R {
    let previous = DRIVING.with(|current| current.replace(owner));
    let out = f();
    DRIVING.with(|current| current.set(previous));

    out
}

/// Outcome of [`Body::drive`].
pub(crate) enum Step<T> {
    /// The body returned.
    Ready(T),

    /// The body panicked.
    Failed(Failure),

    /// The body is suspended and waits for a wake.
    Pending,

    /// Another thread is polling the body, or it is already done.
    Busy,
}

/// A suspended computation stored inside a frame.
///
/// The poll state serializes access to the future: only the thread that
/// moved it from IDLE to POLLING touches the future, and a wake that
/// arrives meanwhile is folded into one more poll by that same thread.
pub(crate) struct Body<F> {
    future: UnsafeCell<Option<F>>,
    state: AtomicUsize,
}

unsafe impl<F: Send> Send for Body<F> {}
unsafe impl<F: Send> Sync for Body<F> {}

impl<F: Future> Body<F> {
    pub(crate) fn new(future: F) -> Self {
        Self {
            future: UnsafeCell::new(Some(future)),
            state: AtomicUsize::new(IDLE),
        }
    }

    /// Polls the body until it suspends, returns or panics.
    ///
    /// `waker` must resume the frame that owns this body. `owner` is a
    /// non-zero identity of that frame, visible through [`driving`] while
    /// the body is polled.
    pub(crate) fn drive(&self, owner: usize, waker: &Waker) -> Step<F::Output> {
        loop {
            match self
                .state
                .compare_exchange(IDLE, POLLING, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(POLLING) => {
                    if self
                        .state
                        .compare_exchange(POLLING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return Step::Busy;
                    }
                }
                Err(_) => return Step::Busy,
            }
        }

        let mut cx = Context::from_waker(waker);

        loop {
            let poll = enter_body(owner, || {
                guard(|| {
                    // SAFETY: POLLING grants exclusive access. The body lives
                    // inside an `Arc` and is never moved until it is dropped.
                    let slot = unsafe { &mut *self.future.get() };
                    match slot.as_mut() {
                        Some(future) => unsafe { Pin::new_unchecked(future) }.poll(&mut cx),
                        None => Poll::Pending,
                    }
                })
            });

            match poll {
                Ok(Poll::Ready(output)) => {
                    self.finish();
                    return Step::Ready(output);
                }
                Err(failure) => {
                    self.finish();
                    return Step::Failed(failure);
                }
                Ok(Poll::Pending) => {}
            }

            match self
                .state
                .compare_exchange(POLLING, IDLE, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Step::Pending,
                Err(NOTIFIED) => self.state.store(POLLING, Ordering::Release),
                Err(_) => {
                    // Destroyed while polling; the poller drops the future.
                    self.drop_future();
                    return Step::Busy;
                }
            }
        }
    }

    /// Destroys the body without running it further.
    ///
    /// If a thread is polling it right now, that thread drops the future
    /// once its poll returns.
    pub(crate) fn cancel(&self) {
        if self.state.swap(DONE, Ordering::AcqRel) == IDLE {
            self.drop_future();
        }
    }

    fn finish(&self) {
        self.drop_future();
        self.state.store(DONE, Ordering::Release);
    }

    fn drop_future(&self) {
        // SAFETY: called by the only thread allowed to touch the future.
        unsafe {
            *self.future.get() = None;
        }
    }
}
