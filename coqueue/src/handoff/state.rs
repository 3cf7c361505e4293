/// The producer is executing and owns the result carrier.
///
/// Also the state of a generator between `restart` and its next yield.
pub(crate) const RUNNING: usize = 0;

/// A generator frame exists but has not been started.
pub(crate) const NOT_STARTED: usize = 1;

/// The producer finished its current cycle.
///
/// The carrier holds a value, a failure, or nothing when a generator body
/// has returned. The consumer owns the carrier from here on.
pub(crate) const COMPLETED: usize = 2;

/// The consumer went away.
///
/// Whichever side observes this value releases the shared state.
pub(crate) const ABANDONED: usize = 3;

/// The consumer stored its continuation and is waiting.
///
/// The continuation slot belongs to the producer until it takes it back in
/// `complete`.
pub(crate) const PARKED: usize = 4;

/// Decoded form of the state word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Running,
    NotStarted,
    Completed,
    Abandoned,
    Parked,
}

impl Lifecycle {
    pub(crate) const fn into_word(self) -> usize {
        match self {
            Self::Running => RUNNING,
            Self::NotStarted => NOT_STARTED,
            Self::Completed => COMPLETED,
            Self::Abandoned => ABANDONED,
            Self::Parked => PARKED,
        }
    }

    /// # Panics
    ///
    /// Panics if `word` is not one of the state constants. Only the handoff
    /// writes the word, so a panic here is a bug in the handoff itself and
    /// never the result of how the public API was used.
    pub(crate) fn from_word(word: usize) -> Self {
        match word {
            RUNNING => Self::Running,
            NOT_STARTED => Self::NotStarted,
            COMPLETED => Self::Completed,
            ABANDONED => Self::Abandoned,
            PARKED => Self::Parked,
            other => unreachable!("corrupted handoff state word: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "corrupted handoff state word")]
    fn corrupted_word_is_an_internal_bug() {
        Lifecycle::from_word(17);
    }
}
