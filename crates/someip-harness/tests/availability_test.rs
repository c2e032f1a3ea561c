//! Availability: after one node offers a service and another searches for
//! it, the searching node's discovery state reflects availability once the
//! offer is delivered, and withdrawing the offer reflects unavailability.

use std::time::Duration;

use someip_core::model::{ServiceEndpoints, ServiceInfo, ServiceKey};
use someip_core::Environment;
use someip_harness::{InvariantRegistry, SimNode};
use someip_sd::{SdAction, SdEvent};

fn service() -> (ServiceKey, ServiceInfo) {
    let key = ServiceKey::new(0x1234, 1);
    let info = ServiceInfo {
        major_version: 1,
        minor_version: 0,
        endpoints: ServiceEndpoints { reliable: None, unreliable: Some("127.0.0.1:30509".parse().unwrap()) },
    };
    (key, info)
}

#[test]
fn availability_fires_once_the_cyclic_offer_is_delivered() {
    let mut provider = SimNode::new(1, true, Duration::ZERO);
    let mut consumer = SimNode::new(2, true, Duration::ZERO);
    let registry = InvariantRegistry::standard();

    let (key, info) = service();
    provider.sd.offer_service(key, info.clone(), provider.env.now());
    consumer.sd.find_service(key, consumer.env.now());

    let (actions, _events) = provider.advance_and_tick(Duration::from_millis(1));
    assert_eq!(actions.len(), 1, "the due cyclic offer should fire exactly once");
    let SdAction::Multicast(offer) = &actions[0] else { unreachable!("offer_service only ever produces multicasts") };

    let (_actions, events) = consumer.sd.on_message(offer, "127.0.0.1:30509".parse().unwrap(), consumer.env.now());
    assert_eq!(events, vec![SdEvent::ServiceAvailable { key, info }]);
    for event in &events {
        consumer.apply(event);
    }

    let snapshot = consumer.snapshot();
    registry.assert_all(&snapshot, "after availability");
    assert!(snapshot.known.iter().any(|(k, _)| *k == key), "availability must reach the routing host's table");
}

#[test]
fn unavailability_follows_an_explicit_stop_offer() {
    let mut provider = SimNode::new(3, true, Duration::ZERO);
    let mut consumer = SimNode::new(4, true, Duration::ZERO);
    let registry = InvariantRegistry::standard();

    let (key, info) = service();
    provider.sd.offer_service(key, info.clone(), provider.env.now());
    let (actions, _) = provider.advance_and_tick(Duration::from_millis(1));
    let SdAction::Multicast(offer) = &actions[0] else { unreachable!("offer_service only ever produces multicasts") };
    let (_, events) = consumer.sd.on_message(offer, "127.0.0.1:30509".parse().unwrap(), consumer.env.now());
    for event in &events {
        consumer.apply(event);
    }
    assert!(consumer.snapshot().known.iter().any(|(k, _)| *k == key));

    let Some((stop_action, _)) = provider.sd.stop_offer_service(key) else { unreachable!("service was offered") };
    let SdAction::Multicast(stop) = &stop_action else { unreachable!("stop_offer_service only ever produces a multicast") };
    let (_, events) = consumer.sd.on_message(stop, "127.0.0.1:30509".parse().unwrap(), consumer.env.now());
    assert_eq!(events, vec![SdEvent::ServiceUnavailable { key }]);
    for event in &events {
        consumer.apply(event);
    }

    let snapshot = consumer.snapshot();
    registry.assert_all(&snapshot, "after unavailability");
    assert!(!snapshot.known.iter().any(|(k, _)| *k == key), "a withdrawn offer must leave the routing host's table");
}
