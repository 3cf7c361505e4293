//! Lazy generators.
//!
//! A generator body does not run until its consumer begins it. Each time
//! the body yields, the consumer observes one value through a [`Cursor`],
//! and the body stays suspended until the cursor advances.

mod cursor;
mod frame;
mod yielder;

pub use cursor::{Advance, Cursor};
pub use yielder::{YieldNow, Yielder};

use crate::handoff::Consumer;
use crate::policy::{ErrorPolicy, Propagate};
use crate::queue::Queue;
use frame::{GenFrame, GenShared, GeneratorCore};

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

type GenCore<T, P> = dyn GeneratorCore<Output = T, Policy = P>;

/// A lazily started sequence of values.
///
/// Nothing runs until [`begin_on`](Generator::begin_on) or
/// [`begin_sync`](Generator::begin_sync). Dropping a generator that was
/// never begun never runs its body.
///
/// # Examples
///
/// ```rust,ignore
/// let numbers = spawn_generator(|co| async move {
///     for i in 1..=3 {
///         co.yield_(i).await;
///     }
/// });
///
/// let mut cursor = numbers.resume_on(&main).begin_on(&worker).await;
/// while let Some(value) = cursor.take() {
///     println!("{value}");
///     cursor.advance().await?;
/// }
/// ```
#[must_use = "a generator does nothing until it is begun"]
pub struct Generator<T, P: ErrorPolicy = Propagate> {
    consumer: Consumer<GenCore<T, P>>,
}

impl<T: Send + 'static, P: ErrorPolicy> Generator<T, P> {
    /// Creates a generator from a body closure.
    ///
    /// The closure receives the [`Yielder`] and returns the body future. It
    /// is called right away, but the returned future is not polled until
    /// the generator is begun.
    pub fn new<B, F>(body: B) -> Self
    where
        B: FnOnce(Yielder<T, P>) -> F,
        F: Future<Output = ()> + Send + 'static,
    {
        let shared = GenShared::new();
        let future = body(Yielder::new(shared.clone()));

        Self {
            consumer: Consumer::new(GenFrame::new(shared, future)),
        }
    }

    /// Makes the consumer continue on `queue` after every cycle.
    ///
    /// Without it, the consumer continues wherever the body last ran.
    pub fn resume_on(self, queue: &Queue) -> Self {
        self.consumer
            .producer()
            .handoff()
            .set_resume_target(Some(queue.clone()), None);
        self
    }

    /// Starts the body inside a work item of `queue`.
    ///
    /// Every later [`Cursor::advance`] runs the body on `queue` as well.
    pub fn begin_on(self, queue: &Queue) -> Begin<T, P> {
        self.begin(Some(queue.clone()))
    }

    /// Starts the body inline on the calling thread.
    ///
    /// Every later [`Cursor::advance`] runs the body inline too.
    pub fn begin_sync(self) -> Begin<T, P> {
        self.begin(None)
    }

    fn begin(self, queue: Option<Queue>) -> Begin<T, P> {
        self.consumer.producer().clone().restart(queue.as_ref());

        Begin {
            consumer: Some(self.consumer),
            queue,
        }
    }
}

impl<T, P: ErrorPolicy> fmt::Debug for Generator<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator").finish_non_exhaustive()
    }
}

/// Starts a [`Generator`] with the default error policy.
///
/// A panic in the body is re-raised on the consumer when it reaches the
/// cycle that panicked.
pub fn spawn_generator<T, B, F>(body: B) -> Generator<T>
where
    T: Send + 'static,
    B: FnOnce(Yielder<T>) -> F,
    F: Future<Output = ()> + Send + 'static,
{
    Generator::new(body)
}

/// Future returned by [`Generator::begin_on`] and
/// [`Generator::begin_sync`].
///
/// Resolves to a [`Cursor`] positioned at the first yielded value, or at
/// the end if the body returned without yielding.
pub struct Begin<T, P: ErrorPolicy = Propagate> {
    consumer: Option<Consumer<GenCore<T, P>>>,
    queue: Option<Queue>,
}

impl<T, P: ErrorPolicy> Future for Begin<T, P> {
    type Output = Cursor<T, P>;

    /// # Panics
    ///
    /// Re-raises a panic of the generator body, and panics if polled after
    /// completion.
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let Some(mut consumer) = this.consumer.take() else {
            panic!("`Begin` polled after completion");
        };

        if consumer.poll_ready(cx).is_pending() {
            this.consumer = Some(consumer);
            return Poll::Pending;
        }

        // SAFETY: `poll_ready` resolved, the consumer holds the active role.
        let token = unsafe { consumer.carrier() }.token();

        Poll::Ready(Cursor::new(consumer, this.queue.take(), token))
    }
}
