//! Ties the per-entry timing state machines together into one engine a
//! driver can poll: `tick()` for what to send next, `on_message()` for what
//! an inbound [`SdMessage`] means (§4.6).

use std::{collections::HashMap, net::SocketAddr, time::Duration};

use someip_core::model::{EventgroupKey, ServiceInfo, ServiceKey, ServiceTable};
use someip_proto::{
    ids::{ClientId, MajorVersion, Ttl},
    sd::SdMessage,
};

use crate::{find::FindQuery, message_builder, offer::OfferSchedule, subscription::{SubscriberGrant, SubscriberLease}};

/// Something the driver must do as a result of a `tick()` or `on_message()`
/// call: send one SD payload somewhere.
#[derive(Debug, Clone)]
pub enum SdAction {
    /// Send to the well-known SD multicast group.
    Multicast(SdMessage),
    /// Send directly to one peer (used for unicast answers and acks).
    Unicast(SdMessage, SocketAddr),
}

/// Something the application layer or routing manager should be told about
/// as a result of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdEvent {
    /// A wanted service became reachable.
    ServiceAvailable {
        /// The service that became available.
        key: ServiceKey,
        /// Its advertised endpoints and version.
        info: ServiceInfo,
    },
    /// A previously available service withdrew its offer or its offer
    /// expired without renewal.
    ServiceUnavailable {
        /// The service that is no longer available.
        key: ServiceKey,
    },
    /// A remote client subscribed to one of our offered eventgroups.
    Subscribed {
        /// The eventgroup subscribed to.
        key: EventgroupKey,
        /// The identity the subscriber is keyed by.
        client_id: ClientId,
        /// The subscriber's endpoint to publish events to.
        endpoint: SocketAddr,
    },
    /// A remote client's subscription ended (explicit unsubscribe or TTL
    /// lapse).
    Unsubscribed {
        /// The eventgroup that was unsubscribed from.
        key: EventgroupKey,
        /// The identity of the subscriber that unsubscribed.
        client_id: ClientId,
    },
    /// A subscription we sent was accepted.
    SubscriptionAccepted {
        /// The eventgroup whose subscription was accepted.
        key: EventgroupKey,
    },
    /// A subscription we sent was rejected.
    SubscriptionRejected {
        /// The eventgroup whose subscription was rejected.
        key: EventgroupKey,
    },
}

struct OfferedService<I> {
    info: ServiceInfo,
    schedule: OfferSchedule<I>,
}

struct Subscriber<I> {
    endpoint: SocketAddr,
    grant: SubscriberGrant<I>,
}

struct PendingSubscription<I> {
    major_version: MajorVersion,
    ttl: Ttl,
    subscriber_endpoint: SocketAddr,
    lease: Option<SubscriberLease<I>>,
}

/// Orchestrates offer/find/subscription timing for every service and
/// eventgroup this node cares about.
///
/// Generic over the instant type so it drives identically under real and
/// simulated time.
pub struct SdEngine<I> {
    reboot: bool,
    initial_delay: Duration,
    offered: HashMap<ServiceKey, OfferedService<I>>,
    subscribers: HashMap<(EventgroupKey, ClientId), Subscriber<I>>,
    finding: HashMap<ServiceKey, FindQuery<I>>,
    discovered: ServiceTable,
    subscribing: HashMap<EventgroupKey, PendingSubscription<I>>,
}

impl<I> SdEngine<I>
where
    I: Copy + Ord + std::ops::Add<Duration, Output = I>,
{
    /// Start a fresh engine. `reboot` should be `true` until this node's
    /// first cyclic offer has gone out, per the reboot-flag contract in
    /// §4.6.
    #[must_use]
    pub fn new(reboot: bool, initial_delay: Duration) -> Self {
        Self {
            reboot,
            initial_delay,
            offered: HashMap::new(),
            subscribers: HashMap::new(),
            finding: HashMap::new(),
            discovered: ServiceTable::new(),
            subscribing: HashMap::new(),
        }
    }

    /// Start offering `info` under `key`.
    pub fn offer_service(&mut self, key: ServiceKey, info: ServiceInfo, now: I) {
        self.offered
            .insert(key, OfferedService { info, schedule: OfferSchedule::start(now, self.initial_delay) });
    }

    /// Withdraw a previously offered service, returning the immediate
    /// `StopOfferService` to send and dropping every subscriber (§4.6).
    pub fn stop_offer_service(&mut self, key: ServiceKey) -> Option<(SdAction, Vec<SdEvent>)> {
        let offered = self.offered.remove(&key)?;
        let message = message_builder::offer_service(key, &offered.info, 0, self.reboot);
        let events = self
            .subscribers
            .keys()
            .filter(|(eg, _)| eg.service == key)
            .map(|(eg, client_id)| SdEvent::Unsubscribed { key: *eg, client_id: *client_id })
            .collect();
        self.subscribers.retain(|(eg, _), _| eg.service != key);
        Some((SdAction::Multicast(message), events))
    }

    /// Start searching for `key`.
    pub fn find_service(&mut self, key: ServiceKey, now: I) {
        self.finding.entry(key).or_insert_with(|| FindQuery::start(now, self.initial_delay));
    }

    /// Stop searching for `key`.
    pub fn stop_find_service(&mut self, key: ServiceKey) {
        self.finding.remove(&key);
    }

    /// Subscribe to `key`, sending immediately if the service is already
    /// known to be available, or deferring until it is discovered.
    pub fn subscribe(
        &mut self,
        key: EventgroupKey,
        major_version: MajorVersion,
        ttl: Ttl,
        subscriber_endpoint: SocketAddr,
        now: I,
    ) -> Option<SdAction> {
        let Some((offer_key, info)) = self.discovered.find(key.service.service_id, key.service.instance_id) else {
            self.subscribing.insert(key, PendingSubscription { major_version, ttl, subscriber_endpoint, lease: None });
            return None;
        };
        let dest = info.endpoints.reliable.or(info.endpoints.unreliable)?;
        self.subscribing.insert(
            key,
            PendingSubscription {
                major_version,
                ttl,
                subscriber_endpoint,
                lease: Some(SubscriberLease::new(now, Duration::from_secs(u64::from(ttl)))),
            },
        );
        let message = message_builder::subscribe(offer_key, key.eventgroup_id, major_version, ttl, subscriber_endpoint, self.reboot);
        Some(SdAction::Unicast(message, dest))
    }

    /// Unsubscribe from `key`, if a subscription is active.
    pub fn unsubscribe(&mut self, key: EventgroupKey, major_version: MajorVersion, now: I) -> Option<SdAction> {
        let pending = self.subscribing.remove(&key)?;
        let _ = now;
        let (offer_key, info) = self.discovered.find(key.service.service_id, key.service.instance_id)?;
        let dest = info.endpoints.reliable.or(info.endpoints.unreliable)?;
        let message =
            message_builder::subscribe(offer_key, key.eventgroup_id, major_version, 0, pending.subscriber_endpoint, self.reboot);
        Some(SdAction::Unicast(message, dest))
    }

    /// Collect everything due to be (re)sent at `now`: repeated/cyclic
    /// offers, repeated finds, subscription renewals, and grant expiries.
    pub fn tick(&mut self, now: I) -> (Vec<SdAction>, Vec<SdEvent>) {
        let mut actions = Vec::new();
        let mut events = Vec::new();

        for (key, offered) in &mut self.offered {
            if offered.schedule.is_due(now) {
                let message = message_builder::offer_service(*key, &offered.info, someip_proto::consts::SD_DEFAULT_TTL_SECS, self.reboot);
                actions.push(SdAction::Multicast(message));
                offered.schedule.advance(now);
            }
        }

        for (key, query) in &mut self.finding {
            if query.is_due(now) {
                let message = message_builder::find_service(*key, someip_proto::ids::ANY_MAJOR, self.reboot);
                actions.push(SdAction::Multicast(message));
                query.advance(now);
            }
        }

        self.subscribers.retain(|(eg_key, client_id), subscriber| {
            if subscriber.grant.is_expired(now) {
                events.push(SdEvent::Unsubscribed { key: *eg_key, client_id: *client_id });
                false
            } else {
                true
            }
        });

        for (key, pending) in &mut self.subscribing {
            let Some(lease) = pending.lease.as_mut() else { continue };
            if lease.needs_renewal(now) {
                if let Some((offer_key, info)) = self.discovered.find(key.service.service_id, key.service.instance_id) {
                    if let Some(dest) = info.endpoints.reliable.or(info.endpoints.unreliable) {
                        let message = message_builder::subscribe(
                            offer_key,
                            key.eventgroup_id,
                            pending.major_version,
                            pending.ttl,
                            pending.subscriber_endpoint,
                            self.reboot,
                        );
                        actions.push(SdAction::Unicast(message, dest));
                        lease.renew(now);
                    }
                }
            }
        }

        (actions, events)
    }

    /// Handle an inbound SD message received from `from`.
    pub fn on_message(&mut self, message: &SdMessage, from: SocketAddr, now: I) -> (Vec<SdAction>, Vec<SdEvent>) {
        let mut actions = Vec::new();
        let mut events = Vec::new();

        for entry in &message.entries {
            match entry {
                someip_proto::sd::SdEntry::Service(service) if !service.is_find => {
                    self.handle_offer(service, message, now, &mut events);
                },
                someip_proto::sd::SdEntry::Service(service) => {
                    self.handle_find(service, from, &mut actions);
                },
                someip_proto::sd::SdEntry::Eventgroup(eventgroup) if !eventgroup.is_ack => {
                    self.handle_subscribe(eventgroup, message, from, now, &mut actions, &mut events);
                },
                someip_proto::sd::SdEntry::Eventgroup(eventgroup) => {
                    self.handle_subscribe_ack(eventgroup, &mut events);
                },
            }
        }

        (actions, events)
    }

    fn handle_offer(
        &mut self,
        entry: &someip_proto::sd::entry::ServiceEntry,
        message: &SdMessage,
        now: I,
        events: &mut Vec<SdEvent>,
    ) {
        let key = ServiceKey::new(entry.service_id, entry.instance_id);
        if entry.is_stop() {
            if self.discovered.remove(key).is_some() {
                events.push(SdEvent::ServiceUnavailable { key });
            }
            if let Some(query) = self.finding.get_mut(&key) {
                query.lost(now, self.initial_delay);
            }
            return;
        }

        let endpoints = message_builder::resolve_endpoints(
            message,
            &someip_proto::sd::SdEntry::Service(*entry),
        );
        let info = ServiceInfo { major_version: entry.major_version, minor_version: entry.minor_version, endpoints };
        let is_new = self.discovered.get(key).is_none();
        self.discovered.insert(key, info.clone());
        if let Some(query) = self.finding.get_mut(&key) {
            query.found();
        }
        if is_new {
            events.push(SdEvent::ServiceAvailable { key, info });
        }
    }

    fn handle_find(
        &mut self,
        entry: &someip_proto::sd::entry::ServiceEntry,
        from: SocketAddr,
        actions: &mut Vec<SdAction>,
    ) {
        let wanted = ServiceKey::new(entry.service_id, entry.instance_id);
        let Some((key, offered)) = self.offered.iter().find(|(key, _)| {
            key.service_id == wanted.service_id
                && (wanted.instance_id == someip_proto::ids::ANY_INSTANCE || key.instance_id == wanted.instance_id)
        }) else {
            return;
        };
        let message = message_builder::offer_service(*key, &offered.info, someip_proto::consts::SD_DEFAULT_TTL_SECS, self.reboot);
        actions.push(SdAction::Unicast(message, from));
    }

    fn handle_subscribe(
        &mut self,
        entry: &someip_proto::sd::entry::EventgroupEntry,
        message: &SdMessage,
        from: SocketAddr,
        now: I,
        actions: &mut Vec<SdAction>,
        events: &mut Vec<SdEvent>,
    ) {
        let service = ServiceKey::new(entry.service_id, entry.instance_id);
        let key = EventgroupKey { service, eventgroup_id: entry.eventgroup_id };
        let endpoints = message_builder::resolve_endpoints(message, &someip_proto::sd::SdEntry::Eventgroup(*entry));
        let subscriber_endpoint = endpoints.unreliable.or(endpoints.reliable).unwrap_or(from);
        let client_id = request_client_id(entry);

        if !self.offered.contains_key(&service) {
            let nack = message_builder::subscribe_ack(service, entry.eventgroup_id, entry.major_version, 0);
            actions.push(SdAction::Unicast(nack, from));
            return;
        }

        if entry.is_stop() {
            if self.subscribers.remove(&(key, client_id)).is_some() {
                events.push(SdEvent::Unsubscribed { key, client_id });
            }
            return;
        }

        let ttl_duration = Duration::from_secs(u64::from(entry.ttl));
        self.subscribers
            .entry((key, client_id))
            .and_modify(|sub| sub.grant.renew(now, ttl_duration))
            .or_insert_with(|| Subscriber { endpoint: subscriber_endpoint, grant: SubscriberGrant::new(now, ttl_duration) });
        events.push(SdEvent::Subscribed { key, client_id, endpoint: subscriber_endpoint });

        let ack = message_builder::subscribe_ack(service, entry.eventgroup_id, entry.major_version, entry.ttl);
        actions.push(SdAction::Unicast(ack, from));
    }

    fn handle_subscribe_ack(&mut self, entry: &someip_proto::sd::entry::EventgroupEntry, events: &mut Vec<SdEvent>) {
        let key = EventgroupKey {
            service: ServiceKey::new(entry.service_id, entry.instance_id),
            eventgroup_id: entry.eventgroup_id,
        };
        if entry.is_stop() {
            events.push(SdEvent::SubscriptionRejected { key });
        } else {
            events.push(SdEvent::SubscriptionAccepted { key });
        }
    }

    /// Current subscribers of one eventgroup, for the driver to notify.
    pub fn subscribers(&self, key: EventgroupKey) -> impl Iterator<Item = SocketAddr> + '_ {
        self.subscribers.iter().filter(move |((eg, _), _)| *eg == key).map(|(_, sub)| sub.endpoint)
    }

    /// Services currently known to be available.
    #[must_use]
    pub fn discovered(&self) -> &ServiceTable {
        &self.discovered
    }
}

/// The subscriber identity we key grants by. SOME/IP-SD carries no client
/// id in the eventgroup entry itself, so we use the subscriber's endpoint
/// as a stand-in identity (distinct endpoints are distinct subscribers).
fn request_client_id(entry: &someip_proto::sd::entry::EventgroupEntry) -> ClientId {
    ClientId::from(entry.counter)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::ops::Add;

    use someip_core::model::ServiceEndpoints;

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

    fn engine() -> SdEngine<MillisInstant> {
        SdEngine::new(false, Duration::from_millis(10))
    }

    #[test]
    fn offering_a_service_produces_a_cyclic_offer_once_due() {
        let mut engine = engine();
        let key = ServiceKey::new(0x1234, 1);
        let info = ServiceInfo {
            major_version: 1,
            minor_version: 0,
            endpoints: ServiceEndpoints { reliable: None, unreliable: Some("127.0.0.1:30509".parse().unwrap()) },
        };
        engine.offer_service(key, info, MillisInstant(0));

        let (actions, _events) = engine.tick(MillisInstant(5));
        assert!(actions.is_empty());

        let (actions, _events) = engine.tick(MillisInstant(10));
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn inbound_offer_resolves_a_pending_find() {
        let mut engine = engine();
        let key = ServiceKey::new(0x1234, 1);
        engine.find_service(key, MillisInstant(0));

        let info = ServiceInfo {
            major_version: 1,
            minor_version: 0,
            endpoints: ServiceEndpoints { reliable: None, unreliable: Some("127.0.0.1:30509".parse().unwrap()) },
        };
        let message = message_builder::offer_service(key, &info, 3, false);
        let (_actions, events) = engine.on_message(&message, "127.0.0.1:30509".parse().unwrap(), MillisInstant(0));
        assert_eq!(events, vec![SdEvent::ServiceAvailable { key, info }]);
    }
}
