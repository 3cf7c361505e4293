use crate::error::{Error, Failure};
use crate::policy::{ErrorPolicy, Propagate, fatal};

use std::marker::PhantomData;
use std::mem;

/// Opaque proof that a generator cycle produced a value.
///
/// Obtained from [`Cursor::token`](crate::Cursor::token) and redeemed once
/// with [`Cursor::read`](crate::Cursor::read). A token from an earlier cycle
/// is rejected with [`Error::StaleToken`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValueToken {
    cycle: u64,
}

enum Slot<T> {
    Empty,
    Value(T),
    Taken,
    Failed(Failure),
}

/// Storage for the outcome of one producer cycle.
///
/// Holds nothing, a value, or a captured failure. Whether a failure can be
/// stored at all depends on the policy `P`.
pub(crate) struct Carrier<T, P> {
    slot: Slot<T>,
    cycle: u64,
    _policy: PhantomData<fn() -> P>,
}

impl<T, P: ErrorPolicy> Carrier<T, P> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Slot::Empty,
            cycle: 0,
            _policy: PhantomData,
        }
    }

    pub(crate) fn emplace(&mut self, value: T) {
        debug_assert!(
            matches!(self.slot, Slot::Empty | Slot::Taken),
            "a value was stored twice in one cycle"
        );
        self.slot = Slot::Value(value);
    }

    /// Stores `failure` under [`Propagate`], terminates under
    /// [`Abort`](crate::Abort).
    pub(crate) fn fail(&mut self, failure: Failure) {
        if P::PROPAGATES {
            self.slot = Slot::Failed(failure);
        } else {
            fatal(&failure)
        }
    }

    /// Takes the stored value, re-raising a stored failure.
    ///
    /// # Panics
    ///
    /// Panics if nothing was stored or the value was already taken.
    pub(crate) fn move_out(&mut self) -> T {
        match self.try_move_out() {
            Ok(value) => value,
            Err(failure) => failure.resume(),
        }
    }

    /// Takes the stored value, returning a stored failure instead of
    /// re-raising it.
    ///
    /// # Panics
    ///
    /// Panics if nothing was stored or the value was already taken.
    pub(crate) fn try_move_out(&mut self) -> Result<T, Failure> {
        match mem::replace(&mut self.slot, Slot::Taken) {
            Slot::Value(value) => Ok(value),
            Slot::Failed(failure) => Err(failure),
            Slot::Taken => panic!("result polled after it was already taken"),
            Slot::Empty => panic!("result read before the producer stored one"),
        }
    }

    /// Mints a token for the current value.
    ///
    /// Returns `None` when the cycle ended without a value, which for a
    /// generator means it finished. A stored failure is re-raised here.
    pub(crate) fn token(&mut self) -> Option<ValueToken> {
        match mem::replace(&mut self.slot, Slot::Empty) {
            Slot::Value(value) => {
                self.slot = Slot::Value(value);
                Some(ValueToken { cycle: self.cycle })
            }
            Slot::Failed(failure) => failure.resume(),
            Slot::Empty | Slot::Taken => None,
        }
    }

    pub(crate) fn read(&mut self, token: ValueToken) -> Result<T, Error> {
        if token.cycle != self.cycle {
            return Err(Error::StaleToken);
        }

        match mem::replace(&mut self.slot, Slot::Taken) {
            Slot::Value(value) => Ok(value),
            Slot::Taken => Err(Error::TokenConsumed),
            Slot::Failed(failure) => Err(Error::Panicked(failure)),
            Slot::Empty => {
                self.slot = Slot::Empty;
                Err(Error::StaleToken)
            }
        }
    }

    /// Drops whatever is stored and starts a new cycle.
    ///
    /// Tokens minted before this call become stale.
    pub(crate) fn clear(&mut self) {
        self.slot = Slot::Empty;
        self.cycle = self.cycle.wrapping_add(1);
    }
}

impl<T> Carrier<T, Propagate> {
    /// Stores a failure for the consumer to re-raise.
    ///
    /// Only exists for carriers that propagate failures.
    pub(crate) fn store_failure(&mut self, failure: Failure) {
        self.slot = Slot::Failed(failure);
    }
}
