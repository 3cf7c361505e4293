use super::GenCore;
use crate::error::Error;
use crate::handoff::{Consumer, ValueToken};
use crate::policy::{ErrorPolicy, Propagate};
use crate::queue::Queue;

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

/// Position of a consumer inside a running [`Generator`](super::Generator).
///
/// Between two advances the body is suspended at a yield, and the cursor
/// owns the yielded value. Dropping the cursor destroys a suspended body
/// without resuming it.
pub struct Cursor<T, P: ErrorPolicy = Propagate> {
    consumer: Consumer<GenCore<T, P>>,
    queue: Option<Queue>,
    token: Option<ValueToken>,
    finished: bool,
    in_flight: bool,
}

impl<T, P: ErrorPolicy> Cursor<T, P> {
    pub(crate) fn new(
        consumer: Consumer<GenCore<T, P>>,
        queue: Option<Queue>,
        token: Option<ValueToken>,
    ) -> Self {
        Self {
            consumer,
            queue,
            finished: token.is_none(),
            token,
            in_flight: false,
        }
    }

    /// Returns `true` once the body returned.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Token for the value of the current cycle, `None` when finished.
    pub fn token(&self) -> Option<ValueToken> {
        if self.in_flight { None } else { self.token }
    }

    /// Takes the value behind `token`.
    ///
    /// # Errors
    ///
    /// [`Error::StaleToken`] if the token is from an earlier cycle,
    /// [`Error::TokenConsumed`] if the value was already taken.
    pub fn read(&mut self, token: ValueToken) -> Result<T, Error> {
        if self.in_flight {
            return Err(Error::StaleToken);
        }

        // SAFETY: no cycle is in flight, the consumer holds the active role.
        unsafe { self.consumer.carrier() }.read(token)
    }

    /// Takes the current value, if there is one left.
    pub fn take(&mut self) -> Option<T> {
        let token = self.token()?;
        self.read(token).ok()
    }

    /// Changes where the consumer continues after each later cycle.
    pub fn resume_on(&mut self, queue: &Queue) {
        if !self.in_flight {
            self.consumer
                .producer()
                .handoff()
                .set_resume_target(Some(queue.clone()), None);
        }
    }

    /// Resumes the body until its next yield or its end.
    ///
    /// The current value, read or not, is discarded. The body runs on the
    /// queue the generator was begun on, inline for
    /// [`begin_sync`](super::Generator::begin_sync).
    ///
    /// If a previous `Advance` was dropped before it resolved, the new one
    /// waits for that same cycle instead of starting another.
    ///
    /// # Errors
    ///
    /// The future resolves to [`Error::Finished`] if the body already
    /// returned.
    ///
    /// # Panics
    ///
    /// The future re-raises a panic of the body.
    pub fn advance(&mut self) -> Advance<'_, T, P> {
        if self.finished {
            return Advance {
                cursor: self,
                early: Some(Error::Finished),
            };
        }

        if !self.in_flight {
            self.in_flight = true;
            self.token = None;
            self.consumer.rearm();
            self.consumer
                .producer()
                .clone()
                .restart(self.queue.as_ref());
        }

        Advance {
            cursor: self,
            early: None,
        }
    }
}

impl<T, P: ErrorPolicy> fmt::Debug for Cursor<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("token", &self.token)
            .field("finished", &self.finished)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

/// Future returned by [`Cursor::advance`].
#[must_use = "the cursor only moves when the future is awaited"]
pub struct Advance<'a, T, P: ErrorPolicy = Propagate> {
    cursor: &'a mut Cursor<T, P>,
    early: Option<Error>,
}

impl<T, P: ErrorPolicy> Future for Advance<'_, T, P> {
    type Output = Result<(), Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(error) = self.early.take() {
            return Poll::Ready(Err(error));
        }

        let cursor = &mut *self.cursor;
        if !cursor.in_flight {
            return Poll::Ready(Ok(()));
        }

        ready!(cursor.consumer.poll_ready(cx));
        cursor.in_flight = false;

        // SAFETY: `poll_ready` resolved, the consumer holds the active role.
        let token = unsafe { cursor.consumer.carrier() }.token();
        cursor.finished = token.is_none();
        cursor.token = token;

        Poll::Ready(Ok(()))
    }
}
