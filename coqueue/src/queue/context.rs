use std::cell::Cell;

thread_local! {
    /// Identity of the serial queue whose worker runs on this thread.
    ///
    /// Set by the worker loop for its whole lifetime, so work items can ask
    /// "am I on queue X" without a handle to the worker.
    static CURRENT_QUEUE: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Runs `f` with `id` installed as the current queue of this thread.
///
/// The previous value is restored afterwards.
pub(crate) fn enter_queue<R>(id: usize, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT_QUEUE.with(|current| current.replace(Some(id)));
    let out = f();
    CURRENT_QUEUE.with(|current| current.set(previous));

    out
}

/// Returns `true` if the current thread is the worker of queue `id`.
pub(crate) fn is_current(id: usize) -> bool {
    CURRENT_QUEUE.with(|current| current.get() == Some(id))
}
