use std::any::Any;
use std::fmt;
use std::panic;

use thiserror::Error;

/// Errors reported by the checked parts of the API.
///
/// Misuse that the type system cannot rule out (stale generator tokens,
/// advancing a finished cursor, a completion dropped without a result) is
/// reported through this type instead of aborting.
#[derive(Debug, Error)]
pub enum Error {
    /// The value token was produced by an earlier generator cycle.
    #[error("value token belongs to an earlier generator cycle")]
    StaleToken,

    /// The value behind the token was already read.
    #[error("value token was already read")]
    TokenConsumed,

    /// The generator already ran to completion.
    #[error("generator has already finished")]
    Finished,

    /// A callback [`Completion`](crate::Completion) was dropped before
    /// `success` or `failure` was called.
    #[error("completion was dropped without being resolved")]
    Unresolved,

    /// The operation panicked and the panic was captured.
    #[error("operation panicked: {0}")]
    Panicked(#[from] Failure),
}

/// A captured failure of a task body, generator body or async call.
///
/// Wraps the panic payload so it can travel through the result carrier and
/// be re-raised where the consumer reads the result.
pub struct Failure {
    payload: Box<dyn Any + Send>,
}

impl Failure {
    /// Wraps an arbitrary error value as a failure.
    pub fn new<E: Any + Send>(error: E) -> Self {
        Self {
            payload: Box::new(error),
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self { payload }
    }

    /// Returns the panic message when the payload is a string.
    pub fn message(&self) -> Option<&str> {
        if let Some(s) = self.payload.downcast_ref::<&'static str>() {
            Some(s)
        } else {
            self.payload.downcast_ref::<String>().map(String::as_str)
        }
    }

    /// Returns the payload as `E` if it has that type.
    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.payload.downcast_ref::<E>()
    }

    /// Unwraps the raw panic payload.
    pub fn into_panic(self) -> Box<dyn Any + Send> {
        self.payload
    }

    /// Re-raises the failure on the current thread.
    pub fn resume(self) -> ! {
        panic::resume_unwind(self.payload)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(message) = self.message() {
            f.write_str(message)
        } else if let Some(error) = self.payload.downcast_ref::<Error>() {
            fmt::Display::fmt(error, f)
        } else {
            f.write_str("opaque panic payload")
        }
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Failure").field(&self.to_string()).finish()
    }
}

impl std::error::Error for Failure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_from_str_and_string_payloads() {
        let a = Failure::from_panic(Box::new("boom"));
        let b = Failure::from_panic(Box::new(String::from("bang")));

        assert_eq!(a.message(), Some("boom"));
        assert_eq!(b.message(), Some("bang"));
    }

    #[test]
    fn display_falls_back_to_crate_errors() {
        let failure = Failure::new(Error::Unresolved);

        assert_eq!(failure.message(), None);
        assert_eq!(
            failure.to_string(),
            "completion was dropped without being resolved"
        );
        assert!(matches!(
            failure.downcast_ref::<Error>(),
            Some(Error::Unresolved)
        ));
    }

    #[test]
    fn panicked_error_wraps_failure() {
        let error = Error::from(Failure::new("worker died"));

        assert_eq!(error.to_string(), "operation panicked: worker died");
    }
}
