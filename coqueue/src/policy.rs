//! Error propagation policies.
//!
//! Every task, generator and async call is parameterized by an
//! [`ErrorPolicy`]. With [`Propagate`] a panic raised by the producer is
//! captured and re-raised where the consumer reads the result. With
//! [`Abort`] the same panic terminates the process: the error is never
//! dropped silently.

use crate::error::Failure;

use std::panic::{self, AssertUnwindSafe};

mod sealed {
    pub trait Sealed {}
}

/// Decides what happens to a failure raised by a producer.
///
/// This trait is sealed; the only policies are [`Propagate`] and [`Abort`].
pub trait ErrorPolicy: sealed::Sealed + Send + Sync + 'static {
    /// Whether failures are stored for the consumer.
    const PROPAGATES: bool;
}

/// Failures are captured and re-raised at the consumer.
#[derive(Debug)]
pub enum Propagate {}

/// Failures terminate the process.
#[derive(Debug)]
pub enum Abort {}

impl sealed::Sealed for Propagate {}
impl sealed::Sealed for Abort {}

impl ErrorPolicy for Propagate {
    const PROPAGATES: bool = true;
}

impl ErrorPolicy for Abort {
    const PROPAGATES: bool = false;
}

/// Runs `f`, turning a panic into a [`Failure`].
pub(crate) fn guard<R>(f: impl FnOnce() -> R) -> Result<R, Failure> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(Failure::from_panic)
}

/// Terminates the process after logging `failure`.
pub(crate) fn fatal(failure: &Failure) -> ! {
    log::error!("failure in a non-propagating operation, aborting: {failure}");
    std::process::abort()
}
