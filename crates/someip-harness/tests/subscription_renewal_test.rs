//! Subscription renewal: a subscriber resends `SubscribeEventgroup` before
//! its lease lapses, keeping the offering side's grant alive indefinitely;
//! a subscriber that stops renewing is dropped once its grant's TTL lapses.

use std::time::Duration;

use someip_core::model::{EventgroupKey, ServiceEndpoints, ServiceInfo, ServiceKey};
use someip_core::Environment;
use someip_harness::SimNode;
use someip_sd::{SdAction, SdEvent};

const TTL_SECS: u32 = 4;

fn eventgroup() -> EventgroupKey {
    EventgroupKey { service: ServiceKey::new(0x1234, 1), eventgroup_id: 0x10 }
}

fn subscriber_endpoint() -> std::net::SocketAddr {
    "127.0.0.1:40000".parse().unwrap_or_else(|_| unreachable!())
}

fn offerer_endpoint() -> std::net::SocketAddr {
    "127.0.0.1:30509".parse().unwrap_or_else(|_| unreachable!())
}

/// Bring `offerer` up with an offered service and `subscriber` to the point
/// where it has discovered that service and sent its first subscription,
/// returning the ack exchange's resulting state.
fn subscribe(offerer: &mut SimNode, subscriber: &mut SimNode) {
    let key = eventgroup().service;
    let info = ServiceInfo {
        major_version: 1,
        minor_version: 0,
        endpoints: ServiceEndpoints { reliable: None, unreliable: Some(offerer_endpoint()) },
    };
    offerer.sd.offer_service(key, info, offerer.env.now());
    let (actions, _) = offerer.advance_and_tick(Duration::from_millis(1));
    let SdAction::Multicast(offer) = &actions[0] else { unreachable!("offer_service only produces multicasts") };
    let (_, events) = subscriber.sd.on_message(offer, offerer_endpoint(), subscriber.env.now());
    for event in &events {
        subscriber.apply(event);
    }

    let Some(SdAction::Unicast(subscribe_msg, dest)) =
        subscriber.sd.subscribe(eventgroup(), 1, TTL_SECS, subscriber_endpoint(), subscriber.env.now())
    else {
        unreachable!("the service was just discovered, so subscribe() must produce a unicast")
    };
    assert_eq!(dest, offerer_endpoint());

    let (_, events) = offerer.sd.on_message(&subscribe_msg, subscriber_endpoint(), offerer.env.now());
    assert_eq!(events, vec![SdEvent::Subscribed { key: eventgroup(), client_id: 0, endpoint: subscriber_endpoint() }]);
}

#[test]
fn renewing_before_the_lease_lapses_keeps_the_grant_alive() {
    let mut offerer = SimNode::new(1, false, Duration::ZERO);
    let mut subscriber = SimNode::new(2, false, Duration::ZERO);
    subscribe(&mut offerer, &mut subscriber);

    // The lease renews at ttl/2; drive both clocks there together.
    let half_ttl = Duration::from_secs(u64::from(TTL_SECS) / 2);
    let (actions, _) = subscriber.advance_and_tick(half_ttl);
    assert_eq!(actions.len(), 1, "a renewal must be sent at the half-TTL mark");
    let SdAction::Unicast(renewal, _dest) = &actions[0] else { unreachable!("subscribe renewals are unicast") };

    offerer.env.advance(half_ttl);
    let (_, events) = offerer.sd.on_message(renewal, subscriber_endpoint(), offerer.env.now());
    assert_eq!(events, vec![SdEvent::Subscribed { key: eventgroup(), client_id: 0, endpoint: subscriber_endpoint() }]);

    // Past the original TTL, the grant would have lapsed without the
    // renewal above; confirm it instead survives.
    let (_, events) = offerer.advance_and_tick(half_ttl);
    assert!(events.is_empty(), "a renewed grant must not expire at the original TTL boundary");
}

#[test]
fn a_subscriber_that_stops_renewing_is_dropped_at_ttl() {
    let mut offerer = SimNode::new(3, false, Duration::ZERO);
    let mut subscriber = SimNode::new(4, false, Duration::ZERO);
    subscribe(&mut offerer, &mut subscriber);

    let (_, events) = offerer.advance_and_tick(Duration::from_secs(u64::from(TTL_SECS)));
    assert_eq!(events, vec![SdEvent::Unsubscribed { key: eventgroup(), client_id: 0 }]);
}
