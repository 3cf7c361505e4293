/// The body is not being polled and waits for a wake.
pub(crate) const IDLE: usize = 0;

/// A thread is polling the body.
///
/// At most one thread observes this state at a time.
pub(crate) const POLLING: usize = 1;

/// The body was woken while being polled.
///
/// The polling thread polls again before going idle.
pub(crate) const NOTIFIED: usize = 2;

/// The body finished or was destroyed and will not be polled again.
pub(crate) const DONE: usize = 3;
