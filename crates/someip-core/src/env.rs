//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (time, randomness).
//! Service Discovery's initial-delay and repetition jitter (§4.6) both need
//! randomness; routing and transport code only needs time. Keeping both
//! behind one trait lets a simulation harness drive the whole stack with a
//! virtual clock and a seeded RNG while production code uses the real ones.

use std::time::Duration;

/// Abstract environment providing time and randomness to protocol logic.
///
/// # Invariants
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards within a single execution context.
/// - `random_bytes()` is uniformly distributed; it need not be
///   cryptographically secure since it only ever seeds scheduling jitter,
///   never key material.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; simulation
    /// environments use virtual time (e.g. `turmoil::Instant`).
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// The only async method on the trait; only driver code should call it,
    /// never the pure state machines in `someip-sd`/`someip-routing`.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// A random duration in `[min, max)`, used for SD initial-delay and
    /// repetition jitter. Returns `min` if `max <= min`.
    fn random_duration(&self, min: Duration, max: Duration) -> Duration {
        if max <= min {
            return min;
        }
        let span = (max - min).as_millis().min(u128::from(u32::MAX));
        #[allow(clippy::cast_possible_truncation)]
        let span_ms = span as u32;
        let offset_ms = if span_ms == 0 { 0 } else { self.random_u32() % span_ms };
        min + Duration::from_millis(u64::from(offset_ms))
    }

    /// Generates a random `u32`, used for session-id and counter jitter.
    fn random_u32(&self) -> u32 {
        let mut bytes = [0u8; 4];
        self.random_bytes(&mut bytes);
        u32::from_be_bytes(bytes)
    }

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone)]
    struct FakeEnv {
        bytes: Arc<Mutex<Vec<u8>>>,
    }

    impl Environment for FakeEnv {
        type Instant = std::time::Instant;

        fn now(&self) -> Self::Instant {
            std::time::Instant::now()
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            std::future::ready(())
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let mut source = self.bytes.lock().unwrap();
            for slot in buffer {
                *slot = if source.is_empty() { 0 } else { source.remove(0) };
            }
        }
    }

    #[test]
    fn random_duration_clamps_to_min_when_max_not_greater() {
        let env = FakeEnv { bytes: Arc::new(Mutex::new(vec![0xFF; 8])) };
        let d = env.random_duration(Duration::from_millis(10), Duration::from_millis(10));
        assert_eq!(d, Duration::from_millis(10));
    }

    #[test]
    fn random_duration_stays_within_bounds() {
        let env = FakeEnv { bytes: Arc::new(Mutex::new(vec![0x00, 0x00, 0x00, 0x05])) };
        let d = env.random_duration(Duration::from_millis(10), Duration::from_millis(100));
        assert!(d >= Duration::from_millis(10) && d < Duration::from_millis(100));
    }
}
