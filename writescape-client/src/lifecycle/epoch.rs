//! Monotonic trigger counters.

use std::fmt;

/// The value of an [`EpochCounter`] at the moment a request was triggered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(u64);

impl Epoch {
    /// Raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic per-action counter. Advancing it is the only way a request gets issued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpochCounter {
    current: u64,
}

impl EpochCounter {
    /// A counter that has never fired.
    #[must_use]
    pub const fn new() -> Self {
        Self { current: 0 }
    }

    /// Moves to the next epoch and returns it.
    pub const fn advance(&mut self) -> Epoch {
        self.current = self.current.saturating_add(1);
        Epoch(self.current)
    }

    /// The latest epoch handed out, or `Epoch(0)` before the first trigger.
    #[must_use]
    pub const fn current(&self) -> Epoch {
        Epoch(self.current)
    }

    /// `false` until the first advance; effects never run "on mount".
    #[must_use]
    pub const fn has_fired(&self) -> bool {
        self.current > 0
    }
}
