//! Fuzz target driving `SdEngine::on_message` with arbitrary Service
//! Discovery payloads, wrapped in an otherwise-valid SOME/IP SD header.
//!
//! An engine seeded with a mix of local state (an active offer, a pending
//! find, a pending subscription) must handle any inbound SD message,
//! well-formed or not, without panicking — malformed entries/options must
//! be rejected during `SdMessage::from_payload`, never after.

#![no_main]

use std::{net::SocketAddr, time::Duration};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use someip_core::model::{EventgroupKey, ServiceEndpoints, ServiceInfo, ServiceKey};
use someip_sd::SdEngine;

#[derive(Debug, Arbitrary)]
struct Scenario {
    reboot: bool,
    seed_offer: bool,
    seed_find: bool,
    seed_subscribe: bool,
    payload: Vec<u8>,
}

fn peer() -> SocketAddr {
    "127.0.0.1:30509".parse().unwrap_or_else(|_| unreachable!())
}

fuzz_target!(|scenario: Scenario| {
    let mut engine: SdEngine<Duration> = SdEngine::new(scenario.reboot, Duration::ZERO);
    let now = Duration::from_secs(1);
    let key = ServiceKey::new(0x1234, 1);

    if scenario.seed_offer {
        let info = ServiceInfo {
            major_version: 1,
            minor_version: 0,
            endpoints: ServiceEndpoints { reliable: None, unreliable: Some(peer()) },
        };
        engine.offer_service(key, info, now);
    }
    if scenario.seed_find {
        engine.find_service(key, now);
    }
    if scenario.seed_subscribe {
        let eventgroup = EventgroupKey { service: key, eventgroup_id: 0x10 };
        let _ = engine.subscribe(eventgroup, 1, 4, peer(), now);
    }

    // Build a plausible SD message shell: a well-formed SOME/IP header
    // around the fuzzed bytes as the SD payload. SdMessage::from_payload
    // rejects whatever doesn't parse; the engine must never panic either way.
    if let Ok(sd_message) = someip_proto::SdMessage::from_payload(&scenario.payload) {
        let _ = engine.on_message(&sd_message, peer(), now);
    }

    let _ = engine.tick(now + Duration::from_secs(10));
});
