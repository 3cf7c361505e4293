use super::context::{enter_queue, is_current};
use super::timer::TimerEntry;
use super::{Executor, Work};
use crate::policy::guard;

use std::collections::{BinaryHeap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;

/// Work waiting in a serial queue.
#[derive(Default)]
struct Pending {
    /// Work that may run now, in submission order.
    ready: VecDeque<Work>,

    /// Work waiting for a deadline.
    delayed: BinaryHeap<TimerEntry>,

    /// Tie breaker for delayed entries.
    next_seq: u64,

    shutdown: bool,
}

struct Shared {
    pending: Mutex<Pending>,
    condvar: Condvar,
}

impl Shared {
    fn identity(self: &Arc<Self>) -> usize {
        Arc::as_ptr(self) as usize
    }
}

/// A queue that runs its work one item at a time, in submission order, on
/// a dedicated thread.
///
/// Dropping the last handle drains the work that is ready, discards work
/// still waiting for a deadline, and joins the worker thread.
pub struct SerialQueue {
    shared: Arc<Shared>,
    label: String,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl SerialQueue {
    pub(crate) fn start(label: String, stack_size: Option<usize>) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending::default()),
            condvar: Condvar::new(),
        });

        let mut builder = thread::Builder::new().name(format!("coqueue-{label}"));
        if let Some(size) = stack_size {
            builder = builder.stack_size(size);
        }

        let worker_shared = shared.clone();
        let handle = builder.spawn(move || run(worker_shared))?;
        let worker_id = handle.thread().id();

        log::debug!("serial queue `{label}` started");

        Ok(Self {
            shared,
            label,
            worker: Some(handle),
            worker_id,
        })
    }

    fn push(&self, entry: impl FnOnce(&mut Pending)) {
        let mut pending = self.shared.pending.lock().unwrap();
        entry(&mut pending);
        drop(pending);

        self.shared.condvar.notify_one();
    }
}

impl Executor for SerialQueue {
    fn submit(&self, work: Work) {
        self.push(|pending| pending.ready.push_back(work));
    }

    fn submit_after(&self, deadline: Instant, work: Work) {
        self.push(|pending| {
            let seq = pending.next_seq;
            pending.next_seq += 1;
            pending.delayed.push(TimerEntry {
                deadline,
                seq,
                work,
            });
        });
    }

    fn is_current(&self) -> bool {
        is_current(self.shared.identity())
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for SerialQueue {
    /// Stops the worker once the ready work is drained.
    ///
    /// The worker is joined unless the last handle is dropped by the worker
    /// itself, in which case it exits on its own.
    fn drop(&mut self) {
        self.shared.pending.lock().unwrap().shutdown = true;
        self.shared.condvar.notify_all();

        let handle = self.worker.take();
        if thread::current().id() == self.worker_id {
            log::debug!("serial queue `{}` released from its own worker", self.label);
            return;
        }

        if let Some(handle) = handle {
            let _ = handle.join();
        }
        log::debug!("serial queue `{}` stopped", self.label);
    }
}

/// Worker loop of a serial queue.
fn run(shared: Arc<Shared>) {
    let id = shared.identity();

    enter_queue(id, || {
        while let Some(work) = next(&shared) {
            if let Err(failure) = guard(|| work.run()) {
                log::error!("work item panicked on a serial queue: {failure}");
            }
        }
    });
}

/// Blocks until work is ready, or returns `None` once the queue shuts down
/// with nothing left to run.
fn next(shared: &Shared) -> Option<Work> {
    let mut pending = shared.pending.lock().unwrap();

    loop {
        let now = Instant::now();
        while pending
            .delayed
            .peek()
            .is_some_and(|entry| entry.deadline <= now)
        {
            if let Some(entry) = pending.delayed.pop() {
                pending.ready.push_back(entry.work);
            }
        }

        if let Some(work) = pending.ready.pop_front() {
            return Some(work);
        }

        if pending.shutdown {
            if !pending.delayed.is_empty() {
                log::debug!(
                    "discarding {} delayed work items on shutdown",
                    pending.delayed.len()
                );
                pending.delayed.clear();
            }
            return None;
        }

        pending = match pending.delayed.peek().map(|entry| entry.deadline) {
            Some(deadline) => {
                let timeout = deadline.saturating_duration_since(now);
                shared.condvar.wait_timeout(pending, timeout).unwrap().0
            }
            None => shared.condvar.wait(pending).unwrap(),
        };
    }
}
