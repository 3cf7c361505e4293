use super::body::{Body, Step};
use crate::handoff::{Handoff, Producer};
use crate::policy::ErrorPolicy;

use std::sync::Arc;
use std::task::{Wake, Waker};

/// Heap frame of an eagerly started task.
///
/// Holds the body and the handoff to whoever awaits the result. The task
/// handle and every outstanding waker share the frame.
pub(crate) struct TaskFrame<F: Future, P: ErrorPolicy> {
    handoff: Handoff<F::Output, P>,
    body: Body<F>,
}

impl<F, P> TaskFrame<F, P>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    P: ErrorPolicy,
{
    /// Allocates the frame and runs the body inline up to its first
    /// suspension point.
    pub(crate) fn start(future: F) -> Arc<Self> {
        let frame = Arc::new(Self {
            handoff: Handoff::running(),
            body: Body::new(future),
        });

        frame.clone().resume();
        frame
    }

    /// Polls the body on the calling thread and publishes its outcome.
    fn resume(self: Arc<Self>) {
        let owner = Arc::as_ptr(&self) as usize;
        let waker = Waker::from(self.clone());

        match self.body.drive(owner, &waker) {
            Step::Ready(value) => {
                // SAFETY: the body just returned; the producer still holds
                // the active role until `settle` publishes completion.
                unsafe { self.handoff.carrier_mut().emplace(value) };
                self.settle();
            }
            Step::Failed(failure) => {
                // SAFETY: as above.
                unsafe { self.handoff.carrier_mut().fail(failure) };
                self.settle();
            }
            Step::Pending | Step::Busy => {}
        }
    }
}

/// Waking a task resumes its body inline, on the waking thread.
impl<F, P> Wake for TaskFrame<F, P>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    P: ErrorPolicy,
{
    fn wake(self: Arc<Self>) {
        self.resume();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.clone().resume();
    }
}

impl<F, P> Producer for TaskFrame<F, P>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    P: ErrorPolicy,
{
    type Output = F::Output;
    type Policy = P;

    fn handoff(&self) -> &Handoff<F::Output, P> {
        &self.handoff
    }

    fn destroy(&self) {
        self.body.cancel();
        self.handoff.release();
    }
}
