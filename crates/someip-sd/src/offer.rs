//! Offer-side per-service state machine: initial delay, exponential
//! repetition, then cyclic main-phase offers, until stopped (§4.6).
//!
//! ```text
//! start() ──InitialWait──> Repetition(1..MAX) ──> Main (cyclic)
//!                                                      │
//!                                                  stop()
//!                                                      ↓
//!                                                   Down
//! ```

use std::time::Duration;

use someip_proto::consts;

/// Where a single offered service instance currently sits in the offer
/// timing state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    InitialWait,
    Repetition(u32),
    Main,
}

/// Drives when the next `OfferService` entry should be sent for one
/// service instance.
///
/// Generic over the instant type so it works under both real and
/// simulated time, same as [`someip_core::Environment`].
#[derive(Debug, Clone)]
pub struct OfferSchedule<I> {
    phase: Phase,
    next_due: I,
    repetition_delay: Duration,
}

impl<I> OfferSchedule<I>
where
    I: Copy + Ord + std::ops::Add<Duration, Output = I>,
{
    /// Begin offering, waiting `initial_delay` before the first send.
    #[must_use]
    pub fn start(now: I, initial_delay: Duration) -> Self {
        Self {
            phase: Phase::InitialWait,
            next_due: now + initial_delay,
            repetition_delay: consts::SD_DEFAULT_REPETITION_BASE_DELAY,
        }
    }

    /// Re-enter the initial-wait phase, e.g. after this node rebooted and
    /// must re-announce with the reboot flag set (§4.6).
    pub fn restart(&mut self, now: I, initial_delay: Duration) {
        self.phase = Phase::InitialWait;
        self.next_due = now + initial_delay;
        self.repetition_delay = consts::SD_DEFAULT_REPETITION_BASE_DELAY;
    }

    /// True once `now` has reached the scheduled send time.
    #[must_use]
    pub fn is_due(&self, now: I) -> bool {
        now >= self.next_due
    }

    /// True once the schedule has settled into the cyclic main phase.
    #[must_use]
    pub fn is_main_phase(&self) -> bool {
        matches!(self.phase, Phase::Main)
    }

    /// Call after sending an offer at `now` to schedule the next one.
    pub fn advance(&mut self, now: I) {
        self.phase = match self.phase {
            Phase::InitialWait => {
                self.next_due = now + self.repetition_delay;
                Phase::Repetition(1)
            },
            Phase::Repetition(count) if count < consts::SD_DEFAULT_REPETITION_MAX => {
                self.repetition_delay *= 2;
                self.next_due = now + self.repetition_delay;
                Phase::Repetition(count + 1)
            },
            Phase::Repetition(_) | Phase::Main => {
                self.next_due = now + consts::SD_DEFAULT_CYCLIC_OFFER_DELAY;
                Phase::Main
            },
        };
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::ops::Add;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct MillisInstant(u64);

    impl Add<Duration> for MillisInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self {
            #[allow(clippy::cast_possible_truncation)]
            Self(self.0 + rhs.as_millis() as u64)
        }
    }

    #[test]
    fn advances_from_initial_wait_through_repetition_into_main() {
        let now = MillisInstant(0);
        let schedule = OfferSchedule::start(now, Duration::from_millis(10));
        assert!(!schedule.is_due(MillisInstant(5)));
        assert!(schedule.is_due(MillisInstant(10)));

        let mut schedule = schedule;
        for _ in 0..consts::SD_DEFAULT_REPETITION_MAX {
            assert!(!schedule.is_main_phase());
            let due = schedule.next_due;
            schedule.advance(due);
        }
        assert!(schedule.is_main_phase());
    }

    #[test]
    fn main_phase_reschedules_at_cyclic_delay() {
        let mut schedule = OfferSchedule::start(MillisInstant(0), Duration::from_millis(10));
        for _ in 0..(consts::SD_DEFAULT_REPETITION_MAX + 1) {
            let due = schedule.next_due;
            schedule.advance(due);
        }
        let due_before = schedule.next_due;
        schedule.advance(due_before);
        assert_eq!(
            schedule.next_due.0 - due_before.0,
            consts::SD_DEFAULT_CYCLIC_OFFER_DELAY.as_millis() as u64
        );
    }
}
