//! Eager tasks.

mod body;
mod frame;
mod handle;
mod state;

pub(crate) use body::{Body, Step, driving};
pub use handle::{Task, TaskFuture, TaskResult};

use crate::policy::{ErrorPolicy, Propagate};
use frame::TaskFrame;

/// Starts `future` immediately on the calling thread and returns a handle
/// to its result.
///
/// The body runs inline until its first suspension point before this
/// function returns. Afterwards it continues wherever it is woken: on the
/// queue it switched to, or on the thread that completed what it awaited.
/// A panic in the body is captured and re-raised when the task is awaited.
///
/// # Examples
///
/// ```rust,ignore
/// let task = spawn_task(async move {
///     switch_to(&worker).await;
///     compute()
/// });
/// let value = task.await;
/// ```
pub fn spawn_task<F>(future: F) -> Task<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    spawn_task_with::<Propagate, F>(future)
}

/// Like [`spawn_task`], with an explicit error policy.
///
/// Under [`Abort`](crate::Abort) a panic in the body terminates the
/// process.
pub fn spawn_task_with<P, F>(future: F) -> Task<F::Output, P>
where
    P: ErrorPolicy,
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    Task::from_core(TaskFrame::<F, P>::start(future))
}
