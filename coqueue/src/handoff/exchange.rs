use super::carrier::Carrier;
use super::state::{COMPLETED, Lifecycle, NOT_STARTED, PARKED, RUNNING};
use crate::policy::ErrorPolicy;
use crate::queue::Queue;
use crate::switch::resume_via;

use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Poll, Waker};
use std::time::Instant;

/// Where the consumer wants to be resumed.
#[derive(Default)]
pub(crate) struct ResumeTarget {
    pub(crate) queue: Option<Queue>,
    pub(crate) deadline: Option<Instant>,
}

/// Outcome of [`Handoff::register`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Registration {
    /// The consumer is parked; the producer will wake it.
    Suspended,
    /// The producer already finished; the consumer proceeds inline.
    Continue,
}

/// Outcome of [`Handoff::complete`].
pub(crate) enum Settled {
    /// The producer must wake this continuation inline.
    Resume(Waker),
    /// Nothing left for the producer to do.
    Detached,
    /// The consumer left; the producer must release the shared state.
    Abandoned,
}

/// Synchronization point between one producer and one consumer.
///
/// A single atomic word decides, for every race between "the consumer
/// waits" and "the producer finishes", which side continues and who
/// releases the shared state. Exactly one side holds the active role at any
/// time, and only the active side touches the carrier.
pub(crate) struct Handoff<T, P: ErrorPolicy> {
    state: AtomicUsize,
    continuation: UnsafeCell<Option<Waker>>,
    resume: UnsafeCell<ResumeTarget>,
    on_resume_queue: AtomicBool,

    /// Set by a continuation work item when it runs on the resume queue.
    arrived: Arc<AtomicBool>,
    carrier: UnsafeCell<Carrier<T, P>>,
}

unsafe impl<T: Send, P: ErrorPolicy> Send for Handoff<T, P> {}
unsafe impl<T: Send, P: ErrorPolicy> Sync for Handoff<T, P> {}

impl<T, P: ErrorPolicy> Handoff<T, P> {
    /// State for an eagerly started producer.
    pub(crate) fn running() -> Self {
        Self::with_state(RUNNING)
    }

    /// State for a lazily started generator.
    pub(crate) fn not_started() -> Self {
        Self::with_state(NOT_STARTED)
    }

    fn with_state(word: usize) -> Self {
        Self {
            state: AtomicUsize::new(word),
            continuation: UnsafeCell::new(None),
            resume: UnsafeCell::new(ResumeTarget::default()),
            on_resume_queue: AtomicBool::new(false),
            arrived: Arc::new(AtomicBool::new(false)),
            carrier: UnsafeCell::new(Carrier::new()),
        }
    }

    fn swap(&self, next: Lifecycle) -> Lifecycle {
        Lifecycle::from_word(self.state.swap(next.into_word(), Ordering::AcqRel))
    }

    fn target(&self) -> &ResumeTarget {
        // SAFETY: the target is written only by the consumer while it is not
        // registered, and read by the producer only after PARKED published it.
        unsafe { &*self.resume.get() }
    }

    /// Posts `waker` to `queue` and marks the continuation as delivered
    /// once the work item runs.
    fn redispatch(&self, queue: &Queue, deadline: Option<Instant>, waker: Waker) {
        self.arrived.store(false, Ordering::Release);
        resume_via(queue, deadline, waker, self.arrived.clone());
    }

    /// Sets where the consumer resumes.
    ///
    /// Must only be called by the consumer while it is not registered.
    pub(crate) fn set_resume_target(&self, queue: Option<Queue>, deadline: Option<Instant>) {
        // SAFETY: see `target`; the consumer is not registered here so the
        // producer cannot be reading the target.
        unsafe {
            *self.resume.get() = ResumeTarget { queue, deadline };
        }
    }

    /// Gives mutable access to the carrier.
    ///
    /// # Safety
    ///
    /// The caller must hold the active role: it is the running producer, or
    /// the consumer after the handoff reached COMPLETED for this cycle.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn carrier_mut(&self) -> &mut Carrier<T, P> {
        unsafe { &mut *self.carrier.get() }
    }

    /// Consumer-side check for whether awaiting can proceed without parking.
    pub(crate) fn try_ready(&self) -> bool {
        let target = self.target();

        if let Some(queue) = &target.queue {
            if target.deadline.is_some() {
                return false;
            }

            let here = queue.is_current();
            self.on_resume_queue.store(here, Ordering::Relaxed);
            if !here {
                return false;
            }
        }

        let state = Lifecycle::from_word(self.state.load(Ordering::Acquire));
        debug_assert!(
            matches!(state, Lifecycle::Running | Lifecycle::Completed),
            "awaited a handoff in state {state:?}"
        );
        state == Lifecycle::Completed
    }

    /// Parks the consumer's continuation.
    pub(crate) fn register(&self, waker: &Waker) -> Registration {
        // SAFETY: the consumer owns the slot until the swap below publishes it.
        unsafe {
            *self.continuation.get() = Some(waker.clone());
        }

        let previous = self.swap(Lifecycle::Parked);
        debug_assert!(
            matches!(previous, Lifecycle::Running | Lifecycle::Completed),
            "registered on a handoff in state {previous:?}"
        );
        if previous == Lifecycle::Running {
            return Registration::Suspended;
        }

        // The producer finished in between; the slot is ours again.
        self.state.store(COMPLETED, Ordering::Release);
        // SAFETY: the producer is done and never reads the slot after COMPLETED.
        let continuation = unsafe { (*self.continuation.get()).take() };

        let target = self.target();
        match (&target.queue, continuation) {
            (Some(queue), Some(waker)) if !self.on_resume_queue.load(Ordering::Relaxed) => {
                self.redispatch(queue, target.deadline, waker);
                Registration::Suspended
            }
            _ => Registration::Continue,
        }
    }

    /// Consumer-side poll after a successful registration.
    ///
    /// Wakes can be spurious, so a parked consumer that is polled again first
    /// reclaims its slot, then parks with the fresh waker.
    pub(crate) fn repoll(&self, waker: &Waker) -> Poll<()> {
        match self
            .state
            .compare_exchange(PARKED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                let target = self.target();
                let here = target.deadline.is_none()
                    && target.queue.as_ref().is_none_or(Queue::is_current);
                self.on_resume_queue.store(here, Ordering::Relaxed);

                match self.register(waker) {
                    Registration::Continue => Poll::Ready(()),
                    Registration::Suspended => Poll::Pending,
                }
            }
            Err(COMPLETED) => {
                // Our own work item ran on the resume queue, after the
                // deadline. Trust it even if the queue cannot tell.
                if self.arrived.swap(false, Ordering::AcqRel) {
                    return Poll::Ready(());
                }

                let target = self.target();
                let early = target.deadline.is_some_and(|at| Instant::now() < at);

                match &target.queue {
                    Some(queue) if early || !queue.is_current() => {
                        self.redispatch(queue, target.deadline, waker.clone());
                        Poll::Pending
                    }
                    _ => Poll::Ready(()),
                }
            }
            Err(other) => {
                debug_assert!(false, "re-polled a handoff in state {other}");
                Poll::Pending
            }
        }
    }

    /// Producer-side completion of the current cycle.
    pub(crate) fn complete(&self) -> Settled {
        let previous = self.swap(Lifecycle::Completed);
        debug_assert!(
            !matches!(previous, Lifecycle::Completed | Lifecycle::NotStarted),
            "completed a handoff in state {previous:?}"
        );

        match previous {
            Lifecycle::Abandoned => Settled::Abandoned,
            Lifecycle::Parked => {
                // SAFETY: PARKED handed the slot to the producer.
                let Some(waker) = (unsafe { (*self.continuation.get()).take() }) else {
                    return Settled::Detached;
                };

                let target = self.target();
                match &target.queue {
                    Some(queue) if !queue.is_current() => {
                        self.redispatch(queue, target.deadline, waker);
                        Settled::Detached
                    }
                    _ => Settled::Resume(waker),
                }
            }
            _ => Settled::Detached,
        }
    }

    /// Consumer-side abandonment.
    ///
    /// Returns `true` if the caller must release the shared state now.
    /// Otherwise the producer releases it when it next completes.
    pub(crate) fn abandon(&self) -> bool {
        let previous = self.swap(Lifecycle::Abandoned);
        debug_assert!(previous != Lifecycle::Abandoned, "abandoned twice");

        matches!(previous, Lifecycle::Completed | Lifecycle::NotStarted)
    }

    /// Starts a new producer cycle.
    pub(crate) fn restart(&self) {
        // SAFETY: the producer is suspended or not started, so the consumer
        // holds the active role.
        unsafe {
            (*self.carrier.get()).clear();
        }
        self.on_resume_queue.store(false, Ordering::Relaxed);
        self.arrived.store(false, Ordering::Release);

        let previous = self.swap(Lifecycle::Running);
        debug_assert!(
            matches!(previous, Lifecycle::Completed | Lifecycle::NotStarted),
            "restarted a handoff in state {previous:?}"
        );
    }

    /// Releases what the shared state still holds.
    ///
    /// Called once by the side that observed the other side leave.
    pub(crate) fn release(&self) {
        // SAFETY: the other side is gone, the caller is the only user left.
        unsafe {
            (*self.carrier.get()).clear();
            (*self.continuation.get()).take();
        }
    }

    #[cfg(test)]
    pub(crate) fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_word(self.state.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Propagate;

    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::task::Wake;

    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting() -> (Arc<CountingWaker>, Waker) {
        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        (counter.clone(), Waker::from(counter))
    }

    #[test]
    fn producer_first_lets_consumer_continue_inline() {
        let handoff = Handoff::<u8, Propagate>::running();
        unsafe { handoff.carrier_mut().emplace(3) };

        assert!(matches!(handoff.complete(), Settled::Detached));
        assert!(handoff.try_ready());
        assert_eq!(unsafe { handoff.carrier_mut().move_out() }, 3);
    }

    #[test]
    fn consumer_first_is_resumed_by_producer() {
        let handoff = Handoff::<u8, Propagate>::running();
        let (counter, waker) = counting();

        assert!(!handoff.try_ready());
        assert_eq!(handoff.register(&waker), Registration::Suspended);
        assert_eq!(handoff.lifecycle(), Lifecycle::Parked);

        match handoff.complete() {
            Settled::Resume(waker) => waker.wake(),
            _ => panic!("expected the parked continuation"),
        }
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(handoff.repoll(&waker), Poll::Ready(()));
    }

    #[test]
    fn completion_between_check_and_register_continues() {
        let handoff = Handoff::<u8, Propagate>::running();
        let (counter, waker) = counting();

        assert!(!handoff.try_ready());
        let _ = handoff.complete();

        assert_eq!(handoff.register(&waker), Registration::Continue);
        assert_eq!(handoff.lifecycle(), Lifecycle::Completed);
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn spurious_repoll_reparks() {
        let handoff = Handoff::<u8, Propagate>::running();
        let (_, waker) = counting();

        let _ = handoff.register(&waker);
        assert_eq!(handoff.repoll(&waker), Poll::Pending);
        assert_eq!(handoff.lifecycle(), Lifecycle::Parked);
    }

    #[test]
    fn abandon_while_running_defers_release() {
        let handoff = Handoff::<u8, Propagate>::running();

        assert!(!handoff.abandon());
        assert!(matches!(handoff.complete(), Settled::Abandoned));
    }

    #[test]
    fn abandon_after_completion_releases_now() {
        let handoff = Handoff::<u8, Propagate>::running();
        let _ = handoff.complete();

        assert!(handoff.abandon());
    }

    #[test]
    fn abandon_before_start_releases_now() {
        let handoff = Handoff::<u8, Propagate>::not_started();

        assert!(handoff.abandon());
    }

    #[test]
    fn restart_clears_previous_value() {
        let handoff = Handoff::<u8, Propagate>::not_started();
        handoff.restart();
        unsafe { handoff.carrier_mut().emplace(1) };
        let _ = handoff.complete();

        handoff.restart();
        assert_eq!(handoff.lifecycle(), Lifecycle::Running);
        assert_eq!(unsafe { handoff.carrier_mut().token() }, None);
    }
}
