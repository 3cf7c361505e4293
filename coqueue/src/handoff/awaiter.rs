use super::Producer;
use super::carrier::Carrier;
use super::exchange::Registration;

use std::sync::Arc;
use std::task::{Context, Poll};

/// The consumer's end of a handoff.
///
/// Dropping it abandons the producer.
pub(crate) struct Consumer<C: ?Sized + Producer> {
    producer: Arc<C>,
    registered: bool,
}

impl<C: ?Sized + Producer> Consumer<C> {
    pub(crate) fn new(producer: Arc<C>) -> Self {
        Self {
            producer,
            registered: false,
        }
    }

    pub(crate) fn producer(&self) -> &Arc<C> {
        &self.producer
    }

    /// Resolves once the producer finished its current cycle and the
    /// consumer runs where it asked to be resumed.
    pub(crate) fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let handoff = self.producer.handoff();

        if self.registered {
            return handoff.repoll(cx.waker());
        }

        if handoff.try_ready() {
            return Poll::Ready(());
        }

        self.registered = true;
        match handoff.register(cx.waker()) {
            Registration::Continue => Poll::Ready(()),
            Registration::Suspended => Poll::Pending,
        }
    }

    /// Prepares for awaiting the next cycle.
    pub(crate) fn rearm(&mut self) {
        self.registered = false;
    }

    /// # Safety
    ///
    /// Only valid after [`poll_ready`](Self::poll_ready) resolved for the
    /// current cycle.
    pub(crate) unsafe fn carrier(&mut self) -> &mut Carrier<C::Output, C::Policy> {
        unsafe { self.producer.handoff().carrier_mut() }
    }
}

impl<C: ?Sized + Producer> Drop for Consumer<C> {
    fn drop(&mut self) {
        if self.producer.handoff().abandon() {
            log::trace!("producer already finished, releasing on abandon");
            self.producer.destroy();
        }
    }
}
