use crate::queue::{Queue, Work};

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};
use std::time::Instant;

/// Future returned by [`switch_to`] and [`switch_to_after`].
pub struct SwitchTo {
    queue: Queue,
    deadline: Option<Instant>,
    fired: Option<Arc<AtomicBool>>,
}

impl Future for SwitchTo {
    type Output = ();

    /// On the first poll, submits a work item to the target queue and
    /// suspends. The future completes once that work item ran, which means
    /// the awaiting task now executes on the target queue.
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(fired) = &self.fired {
            return if fired.load(Ordering::Acquire) {
                Poll::Ready(())
            } else {
                Poll::Pending
            };
        }

        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let waker = cx.waker().clone();

        self.queue.dispatch(
            Work::new(move || {
                flag.store(true, Ordering::Release);
                waker.wake();
            }),
            self.deadline,
        );
        self.fired = Some(fired);

        Poll::Pending
    }
}

/// Moves the awaiting task onto `queue`.
///
/// The task always suspends, even if it already runs on `queue`, and
/// continues inside a work item of `queue`.
///
/// # Examples
///
/// ```rust,ignore
/// let task = spawn_task(async move {
///     switch_to(&background).await;
///     expensive_computation()
/// });
/// ```
pub fn switch_to(queue: &Queue) -> SwitchTo {
    SwitchTo {
        queue: queue.clone(),
        deadline: None,
        fired: None,
    }
}

/// Moves the awaiting task onto `queue`, no earlier than `deadline`.
pub fn switch_to_after(queue: &Queue, deadline: Instant) -> SwitchTo {
    SwitchTo {
        queue: queue.clone(),
        deadline: Some(deadline),
        fired: None,
    }
}

/// Wakes `waker` from a work item on `queue`.
///
/// `arrived` is raised right before the wake, inside the work item.
pub(crate) fn resume_via(
    queue: &Queue,
    deadline: Option<Instant>,
    waker: Waker,
    arrived: Arc<AtomicBool>,
) {
    log::trace!("resuming consumer via queue `{}`", queue.label());
    queue.dispatch(Work::resume(waker, arrived), deadline);
}
