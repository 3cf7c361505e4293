use super::frame::GenShared;
use crate::policy::{ErrorPolicy, Propagate};
use crate::task::driving;

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::task::{Context, Poll};

/// The body is running between two yields.
pub(crate) const ACTIVE: u8 = 0;

/// The body stored a value and is about to suspend.
pub(crate) const YIELDED: u8 = 1;

/// The frame published the yielded value to the consumer.
pub(crate) const SUSPENDED: u8 = 2;

/// The consumer asked for the next value.
pub(crate) const RESUMED: u8 = 3;

pub(crate) fn phase() -> AtomicU8 {
    AtomicU8::new(ACTIVE)
}

/// The generator body's way to hand values to its consumer.
///
/// Passed to the closure given to [`spawn_generator`](crate::spawn_generator).
/// Must only be awaited by that generator's own body: a yield polled from a
/// nested task, another thread or another generator panics.
pub struct Yielder<T, P: ErrorPolicy = Propagate> {
    shared: Arc<GenShared<T, P>>,
}

impl<T, P: ErrorPolicy> Yielder<T, P> {
    pub(crate) fn new(shared: Arc<GenShared<T, P>>) -> Self {
        Self { shared }
    }

    /// Hands `value` to the consumer and suspends the body until the
    /// consumer advances.
    ///
    /// If the consumer goes away instead, the body is destroyed at this
    /// point and never resumes.
    pub fn yield_(&self, value: T) -> YieldNow<'_, T, P> {
        YieldNow {
            shared: &self.shared,
            value: Some(value),
        }
    }
}

/// Future returned by [`Yielder::yield_`].
#[must_use = "a value is only yielded when the future is awaited"]
pub struct YieldNow<'a, T, P: ErrorPolicy = Propagate> {
    shared: &'a GenShared<T, P>,
    value: Option<T>,
}

impl<T, P: ErrorPolicy> Unpin for YieldNow<'_, T, P> {}

impl<T, P: ErrorPolicy> Future for YieldNow<'_, T, P> {
    type Output = ();

    /// # Panics
    ///
    /// Panics if polled outside of the generator body that owns the
    /// yielder.
    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();

        if driving() != Some(this.shared.owner()) {
            panic!("yield awaited outside of its generator body");
        }

        if let Some(value) = this.value.take() {
            // SAFETY: the body is being polled, so the producer holds the
            // active role.
            unsafe { this.shared.handoff.carrier_mut().emplace(value) };
            this.shared.phase.store(YIELDED, Ordering::Release);
            return Poll::Pending;
        }

        match this.shared.phase.compare_exchange(
            RESUMED,
            ACTIVE,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Poll::Ready(()),
            Err(_) => Poll::Pending,
        }
    }
}
