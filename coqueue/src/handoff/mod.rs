//! Producer/consumer rendezvous shared by tasks, generators and async
//! calls.

mod awaiter;
mod carrier;
mod exchange;
mod state;

pub(crate) use awaiter::Consumer;
pub use carrier::ValueToken;
pub(crate) use exchange::{Handoff, Settled};

use crate::policy::ErrorPolicy;

/// Shared state of a producer, seen through its handoff.
pub(crate) trait Producer: Send + Sync {
    type Output;
    type Policy: ErrorPolicy;

    fn handoff(&self) -> &Handoff<Self::Output, Self::Policy>;

    /// Releases the producer's resources once both sides are done with it.
    fn destroy(&self);

    /// Finishes the current producer cycle and acts on the outcome.
    fn settle(&self) {
        match self.handoff().complete() {
            Settled::Resume(waker) => waker.wake(),
            Settled::Abandoned => {
                log::trace!("consumer left before completion, releasing producer");
                self.destroy();
            }
            Settled::Detached => {}
        }
    }
}
