use super::Queue;
use super::serial::SerialQueue;

use std::io;

/// Builder for a [`SerialQueue`].
///
/// # Examples
///
/// ```rust,ignore
/// let queue = QueueBuilder::new()
///     .label("db")
///     .build();
/// ```
pub struct QueueBuilder {
    /// Name used for the worker thread and in logs.
    label: String,

    /// Stack size of the worker thread, platform default when unset.
    stack_size: Option<usize>,
}

impl QueueBuilder {
    /// Creates a builder for an unnamed queue.
    pub fn new() -> Self {
        Self {
            label: String::from("serial"),
            stack_size: None,
        }
    }

    /// Sets the queue label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the worker thread stack size in bytes.
    ///
    /// Long chains of inline resumptions recurse on the worker stack; a
    /// larger stack raises the depth they can reach.
    ///
    /// # Panics
    ///
    /// Panics if `bytes == 0`.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        assert!(bytes > 0, "stack_size must be > 0");

        self.stack_size = Some(bytes);
        self
    }

    /// Starts the queue's worker thread.
    ///
    /// Returns an error if the operating system refuses to spawn the thread.
    pub fn try_build(self) -> io::Result<Queue> {
        SerialQueue::start(self.label, self.stack_size).map(Queue::new)
    }

    /// Starts the queue's worker thread.
    ///
    /// # Panics
    ///
    /// Panics if the worker thread cannot be spawned, like
    /// [`std::thread::spawn`].
    pub fn build(self) -> Queue {
        match self.try_build() {
            Ok(queue) => queue,
            Err(error) => panic!("failed to spawn queue worker thread: {error}"),
        }
    }
}

impl Default for QueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}
