//! Virtual day clock
//!
//! A single non-decreasing day counter. Readers always see either the old or
//! the new value; [`VirtualClock::advance`] is a compare-and-set that refuses
//! to move backwards, so racing advances never regress the clock.

use crate::error::ClockError;
use crate::types::Day;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide simulated day
#[derive(Debug, Default)]
pub struct VirtualClock {
    day: AtomicU64,
}

impl VirtualClock {
    /// Clock starting at day 0
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Clock starting at an arbitrary day
    #[inline]
    #[must_use]
    pub fn starting_at(day: Day) -> Self {
        Self {
            day: AtomicU64::new(day),
        }
    }

    /// Current day
    #[inline]
    #[must_use]
    pub fn current(&self) -> Day {
        self.day.load(Ordering::Acquire)
    }

    /// Move the clock to `day`
    ///
    /// Advancing to the current day is accepted as a no-op.
    ///
    /// # Errors
    /// `ClockError::Regression` if `day` precedes the current day; the clock
    /// is left unchanged.
    pub fn advance(&self, day: Day) -> Result<Day, ClockError> {
        match self
            .day
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (day >= current).then_some(day)
            }) {
            Ok(previous) => {
                tracing::info!(from = previous, to = day, "virtual clock advanced");
                Ok(day)
            }
            Err(current) => {
                tracing::warn!(requested = day, current, "rejected clock regression");
                Err(ClockError::Regression {
                    requested: day,
                    current,
                })
            }
        }
    }
}
