//! Production [`Environment`] implementation using system time and a
//! thread-local CSPRNG.
//!
//! Unlike the RNG source this is adapted from, `rand::thread_rng` has no
//! fallible path: `ThreadRng::fill_bytes` cannot fail, so there is nothing to
//! panic on.

use std::time::Duration;

use rand::RngCore;
use someip_core::env::Environment;

/// Production environment: real wall-clock time and a thread-local CSPRNG.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        rand::thread_rng().fill_bytes(buffer);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::disallowed_methods)]
    fn system_env_time_advances() {
        let env = SystemEnv::new();
        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = env.now();
        assert!(t2 > t1);
    }

    #[test]
    fn system_env_random_bytes_are_filled() {
        let env = SystemEnv::new();
        let mut bytes = [0u8; 32];
        env.random_bytes(&mut bytes);
        assert!(bytes.iter().any(|&b| b != 0));
    }

    #[tokio::test]
    async fn system_env_sleep_waits_at_least_requested_duration() {
        let env = SystemEnv::new();
        let start = env.now();
        env.sleep(Duration::from_millis(20)).await;
        assert!(env.now() - start >= Duration::from_millis(20));
    }
}
