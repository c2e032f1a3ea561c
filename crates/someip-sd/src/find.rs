//! Find-side per-service state machine: a client repeats `FindService`
//! entries on the same initial-delay/repetition/cyclic-main schedule an
//! offer uses (§4.6), until the service is found and [`FindQuery::found`]
//! is called to stop sending them.

use std::time::Duration;

use crate::offer::OfferSchedule;

/// Tracks when the next `FindService` entry for one wanted service should
/// be sent, and whether the search is still active.
#[derive(Debug, Clone)]
pub struct FindQuery<I> {
    schedule: OfferSchedule<I>,
    resolved: bool,
}

impl<I> FindQuery<I>
where
    I: Copy + Ord + std::ops::Add<Duration, Output = I>,
{
    /// Start searching, waiting `initial_delay` before the first
    /// `FindService`.
    #[must_use]
    pub fn start(now: I, initial_delay: Duration) -> Self {
        Self { schedule: OfferSchedule::start(now, initial_delay), resolved: false }
    }

    /// True if a `FindService` is due and the service hasn't been found yet.
    #[must_use]
    pub fn is_due(&self, now: I) -> bool {
        !self.resolved && self.schedule.is_due(now)
    }

    /// Record that a `FindService` was just sent at `now`.
    pub fn advance(&mut self, now: I) {
        self.schedule.advance(now);
    }

    /// Stop searching: an `OfferService` answering this query arrived.
    pub fn found(&mut self) {
        self.resolved = true;
    }

    /// Resume searching after the found service's offer expired.
    pub fn lost(&mut self, now: I, initial_delay: Duration) {
        self.resolved = false;
        self.schedule.restart(now, initial_delay);
    }

    /// True if the search has been satisfied.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }
}
