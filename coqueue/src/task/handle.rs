use crate::error::Failure;
use crate::handoff::{Consumer, Producer};
use crate::policy::{ErrorPolicy, Propagate};
use crate::queue::Queue;

use std::fmt;
use std::future::IntoFuture;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Instant;

type TaskCore<T, P> = dyn Producer<Output = T, Policy = P>;

/// Handle to an eagerly started task.
///
/// The body is already running (or done) by the time the handle exists.
/// Awaiting the handle yields the body's result, re-raising its panic under
/// [`Propagate`]. Dropping the handle without awaiting it lets the body
/// finish on its own and discards the result.
///
/// # Examples
///
/// ```rust,ignore
/// let task = spawn_task(async { 40 + 2 });
/// assert_eq!(task.await, 42);
/// ```
#[must_use = "dropping a task discards its result"]
pub struct Task<T, P: ErrorPolicy = Propagate> {
    consumer: Consumer<TaskCore<T, P>>,
}

impl<T: Send + 'static, P: ErrorPolicy> Task<T, P> {
    pub(crate) fn from_core(core: std::sync::Arc<TaskCore<T, P>>) -> Self {
        Self {
            consumer: Consumer::new(core),
        }
    }

    /// Makes the awaiting task continue on `queue`.
    ///
    /// If the awaiter already runs on `queue` and the result is there, it
    /// continues without a queue hop.
    pub fn resume_on(self, queue: &Queue) -> Self {
        self.handoff_target(Some(queue.clone()), None)
    }

    /// Makes the awaiting task continue on `queue`, no earlier than
    /// `deadline`.
    pub fn resume_on_after(self, queue: &Queue, deadline: Instant) -> Self {
        self.handoff_target(Some(queue.clone()), Some(deadline))
    }

    fn handoff_target(self, queue: Option<Queue>, deadline: Option<Instant>) -> Self {
        self.consumer
            .producer()
            .handoff()
            .set_resume_target(queue, deadline);
        self
    }
}

impl<T: Send + 'static> Task<T, Propagate> {
    /// Awaits the result, returning the body's panic as a [`Failure`]
    /// instead of re-raising it.
    pub fn into_result(self) -> TaskResult<T> {
        TaskResult {
            consumer: self.consumer,
        }
    }
}

impl<T, P: ErrorPolicy> fmt::Debug for Task<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

impl<T: Send + 'static, P: ErrorPolicy> IntoFuture for Task<T, P> {
    type Output = T;
    type IntoFuture = TaskFuture<T, P>;

    fn into_future(self) -> Self::IntoFuture {
        TaskFuture {
            consumer: self.consumer,
        }
    }
}

/// Future awaiting a [`Task`].
pub struct TaskFuture<T, P: ErrorPolicy = Propagate> {
    consumer: Consumer<TaskCore<T, P>>,
}

impl<T, P: ErrorPolicy> Future for TaskFuture<T, P> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        ready!(self.consumer.poll_ready(cx));

        // SAFETY: `poll_ready` resolved, the consumer holds the active role.
        Poll::Ready(unsafe { self.consumer.carrier() }.move_out())
    }
}

/// Future returned by [`Task::into_result`].
pub struct TaskResult<T> {
    consumer: Consumer<TaskCore<T, Propagate>>,
}

impl<T> Future for TaskResult<T> {
    type Output = Result<T, Failure>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        ready!(self.consumer.poll_ready(cx));

        // SAFETY: `poll_ready` resolved, the consumer holds the active role.
        Poll::Ready(unsafe { self.consumer.carrier() }.try_move_out())
    }
}
