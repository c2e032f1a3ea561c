//! Eventgroup subscription bookkeeping for both sides of a subscription
//! (§4.6): the subscriber renews before its TTL lapses, and the offering
//! side expires a subscriber that stops renewing.

use std::time::Duration;

/// Subscriber-side state for one eventgroup subscription: when to resend
/// `SubscribeEventgroup` to keep the subscription alive.
///
/// Renewal happens at `ttl / 2` rather than right before expiry, so a lost
/// renewal still leaves a full `ttl / 2` window to retry before the
/// offering side drops the subscription (§4.6, §9).
#[derive(Debug, Clone)]
pub struct SubscriberLease<I> {
    ttl: Duration,
    renew_at: I,
}

impl<I> SubscriberLease<I>
where
    I: Copy + Ord + std::ops::Add<Duration, Output = I>,
{
    /// Start a lease after sending the initial `SubscribeEventgroup` at
    /// `now` with time-to-live `ttl`.
    #[must_use]
    pub fn new(now: I, ttl: Duration) -> Self {
        Self { ttl, renew_at: now + ttl / 2 }
    }

    /// True once it's time to resend `SubscribeEventgroup`.
    #[must_use]
    pub fn needs_renewal(&self, now: I) -> bool {
        now >= self.renew_at
    }

    /// Record that a renewal was sent at `now`.
    pub fn renew(&mut self, now: I) {
        self.renew_at = now + self.ttl / 2;
    }
}

/// Offering-side state for one accepted subscriber: when the subscription
/// lapses if no renewal arrives.
#[derive(Debug, Clone)]
pub struct SubscriberGrant<I> {
    expires_at: I,
}

impl<I> SubscriberGrant<I>
where
    I: Copy + Ord + std::ops::Add<Duration, Output = I>,
{
    /// Grant a subscription accepted at `now` for `ttl`.
    #[must_use]
    pub fn new(now: I, ttl: Duration) -> Self {
        Self { expires_at: now + ttl }
    }

    /// Refresh the grant on a renewed `SubscribeEventgroup`.
    pub fn renew(&mut self, now: I, ttl: Duration) {
        self.expires_at = now + ttl;
    }

    /// True once the grant has lapsed without a renewal.
    #[must_use]
    pub fn is_expired(&self, now: I) -> bool {
        now >= self.expires_at
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
    fn lease_renews_at_half_ttl() {
        let lease = SubscriberLease::new(MillisInstant(0), Duration::from_secs(4));
        assert!(!lease.needs_renewal(MillisInstant(1000)));
        assert!(lease.needs_renewal(MillisInstant(2000)));
    }

    #[test]
    fn grant_expires_without_renewal() {
        let mut grant = SubscriberGrant::new(MillisInstant(0), Duration::from_secs(3));
        assert!(!grant.is_expired(MillisInstant(2999)));
        assert!(grant.is_expired(MillisInstant(3000)));

        grant.renew(MillisInstant(2999), Duration::from_secs(3));
        assert!(!grant.is_expired(MillisInstant(3000)));
    }
}
