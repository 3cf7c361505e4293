//! Execution queues.
//!
//! A [`Queue`] is a cheap, clonable handle to anything implementing
//! [`Executor`]: a place that runs submitted closures, possibly after a
//! deadline, and can tell whether the calling thread is currently running
//! its work. [`SerialQueue`], built through [`QueueBuilder`], is the
//! reference implementation.

mod builder;
mod context;
mod serial;
mod timer;

pub use builder::QueueBuilder;
pub use serial::SerialQueue;

use crate::switch::switch_to;
use crate::task::spawn_task;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::task::Waker;
use std::time::Instant;

/// A unit of work submitted to an executor.
pub struct Work(Box<dyn FnOnce() + Send + 'static>);

impl Work {
    /// Boxes a closure as a work item.
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    /// Work that raises `arrived`, then wakes `waker`.
    pub(crate) fn resume(waker: Waker, arrived: Arc<AtomicBool>) -> Self {
        Self::new(move || {
            arrived.store(true, Ordering::Release);
            waker.wake();
        })
    }

    /// Consumes and executes the work on the calling thread.
    ///
    /// Executors call this from the thread that reports
    /// [`is_current`](Executor::is_current) for them.
    pub fn run(self) {
        (self.0)()
    }
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Work")
    }
}

/// The contract every queue backend fulfils.
///
/// Implementations may be serial or concurrent. Work submitted with
/// [`submit_after`](Executor::submit_after) must not run before its
/// deadline.
pub trait Executor: Send + Sync + 'static {
    /// Runs `work` asynchronously, as soon as possible.
    fn submit(&self, work: Work);

    /// Runs `work` asynchronously, no earlier than `deadline`.
    fn submit_after(&self, deadline: Instant, work: Work);

    /// Returns `true` if the calling thread is currently running work of
    /// this executor.
    fn is_current(&self) -> bool;

    /// Human readable name used in logs.
    fn label(&self) -> &str {
        "external"
    }
}

/// Shared handle to an [`Executor`].
///
/// Equality and hashing use the identity of the executor, not its label.
#[derive(Clone)]
pub struct Queue {
    executor: Arc<dyn Executor>,
}

impl Queue {
    /// Wraps an executor in a queue handle.
    pub fn new<E: Executor>(executor: E) -> Self {
        Self {
            executor: Arc::new(executor),
        }
    }

    /// Wraps an already shared executor.
    pub fn from_arc(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// Submits a closure to the queue.
    pub fn submit(&self, f: impl FnOnce() + Send + 'static) {
        self.executor.submit(Work::new(f));
    }

    /// Submits a closure that must not run before `deadline`.
    pub fn submit_after(&self, deadline: Instant, f: impl FnOnce() + Send + 'static) {
        self.executor.submit_after(deadline, Work::new(f));
    }

    pub(crate) fn dispatch(&self, work: Work, deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => self.executor.submit_after(deadline, work),
            None => self.executor.submit(work),
        }
    }

    /// Returns `true` if the calling thread is running work of this queue.
    pub fn is_current(&self) -> bool {
        self.executor.is_current()
    }

    /// The executor's label, as shown by `Debug`.
    pub fn label(&self) -> &str {
        self.executor.label()
    }

    /// Runs a future on this queue, blocking the current thread until it
    /// finishes. See [`block_on`].
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        block_on(self, future)
    }

    fn identity(&self) -> *const () {
        Arc::as_ptr(&self.executor) as *const ()
    }
}

impl PartialEq for Queue {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Queue {}

impl Hash for Queue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("label", &self.label())
            .finish()
    }
}

/// Runs a future to completion on `queue`, blocking the current thread.
///
/// This is the synchronous entry point for `main` functions and tests. The
/// future starts on `queue`, and a panic inside it is re-raised here.
///
/// Must not be called from a thread that runs work of `queue` itself: a
/// serial queue would deadlock.
///
/// # Panics
///
/// Panics if the queue drops the future without finishing it, or re-raises
/// the future's own panic.
///
/// # Examples
///
/// ```rust,ignore
/// let queue = QueueBuilder::new().label("main").build();
/// let answer = block_on(&queue, async { 42 });
/// assert_eq!(answer, 42);
/// ```
pub fn block_on<F>(queue: &Queue, future: F) -> F::Output
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let (transmitter, receiver) = mpsc::channel();
    let target = queue.clone();

    let driver = spawn_task(async move {
        switch_to(&target).await;
        let outcome = spawn_task(future).into_result().await;
        let _ = transmitter.send(outcome);
    });
    drop(driver);

    match receiver.recv() {
        Ok(Ok(value)) => value,
        Ok(Err(failure)) => failure.resume(),
        Err(_) => panic!("queue `{}` dropped the future before it finished", queue.label()),
    }
}
