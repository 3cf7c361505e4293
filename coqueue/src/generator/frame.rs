use super::yielder::{RESUMED, SUSPENDED, YIELDED, phase};
use crate::handoff::{Handoff, Producer};
use crate::policy::ErrorPolicy;
use crate::queue::{Queue, Work};
use crate::task::{Body, Step};

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::task::{Wake, Waker};

/// State shared between a generator frame and its [`Yielder`](super::Yielder).
pub(crate) struct GenShared<T, P: ErrorPolicy> {
    pub(crate) handoff: Handoff<T, P>,
    pub(crate) phase: AtomicU8,
}

/// Operations a generator handle needs from its frame.
pub(crate) trait GeneratorCore: Producer {
    /// Starts the next cycle: the body runs until it yields or returns.
    ///
    /// With a queue the body continues inside a work item of that queue,
    /// otherwise inline on the calling thread.
    fn restart(self: Arc<Self>, queue: Option<&Queue>);
}

/// Heap frame of a lazily started generator.
pub(crate) struct GenFrame<F, T, P: ErrorPolicy> {
    shared: Arc<GenShared<T, P>>,
    body: Body<F>,
}

impl<F, T, P> GenFrame<F, T, P>
where
    F: Future<Output = ()> + Send + 'static,
    T: Send + 'static,
    P: ErrorPolicy,
{
    /// Allocates the frame without running anything.
    pub(crate) fn new(shared: Arc<GenShared<T, P>>, future: F) -> Arc<Self> {
        Arc::new(Self {
            shared,
            body: Body::new(future),
        })
    }
}

impl<T, P: ErrorPolicy> GenShared<T, P> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            handoff: Handoff::not_started(),
            phase: phase(),
        })
    }

    /// Identity under which the frame drives its body.
    pub(crate) fn owner(&self) -> usize {
        self as *const Self as usize
    }
}

impl<F, T, P> GenFrame<F, T, P>
where
    F: Future<Output = ()> + Send + 'static,
    T: Send + 'static,
    P: ErrorPolicy,
{
    fn resume(self: Arc<Self>) {
        let waker = Waker::from(self.clone());

        match self.body.drive(self.shared.owner(), &waker) {
            Step::Pending => {
                // Only a suspension at a yield ends the cycle; any other
                // await inside the body keeps the producer running.
                if self
                    .shared
                    .phase
                    .compare_exchange(YIELDED, SUSPENDED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.settle();
                }
            }
            Step::Ready(()) => self.settle(),
            Step::Failed(failure) => {
                // SAFETY: the body just finished; the producer holds the
                // active role until `settle`.
                unsafe { self.shared.handoff.carrier_mut().fail(failure) };
                self.settle();
            }
            Step::Busy => {}
        }
    }
}

impl<F, T, P> Wake for GenFrame<F, T, P>
where
    F: Future<Output = ()> + Send + 'static,
    T: Send + 'static,
    P: ErrorPolicy,
{
    fn wake(self: Arc<Self>) {
        self.resume();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.clone().resume();
    }
}

impl<F, T, P> Producer for GenFrame<F, T, P>
where
    F: Future<Output = ()> + Send + 'static,
    T: Send + 'static,
    P: ErrorPolicy,
{
    type Output = T;
    type Policy = P;

    fn handoff(&self) -> &Handoff<T, P> {
        &self.shared.handoff
    }

    fn destroy(&self) {
        self.body.cancel();
        self.shared.handoff.release();
    }
}

impl<F, T, P> GeneratorCore for GenFrame<F, T, P>
where
    F: Future<Output = ()> + Send + 'static,
    T: Send + 'static,
    P: ErrorPolicy,
{
    fn restart(self: Arc<Self>, queue: Option<&Queue>) {
        self.shared.handoff.restart();
        let _ = self.shared.phase.compare_exchange(
            SUSPENDED,
            RESUMED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        match queue {
            Some(queue) => queue.dispatch(Work::new(move || self.resume()), None),
            None => self.resume(),
        }
    }
}
