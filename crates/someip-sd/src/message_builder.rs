//! Builds [`SdMessage`]s from routing domain types, and resolves inbound
//! entries back into them (§4.3, §4.6).

use std::net::SocketAddr;

use someip_core::model::{ServiceEndpoints, ServiceInfo, ServiceKey};
use someip_proto::{
    ids::{ClientId, EventgroupId, Ttl},
    sd::{
        entry::{EventgroupEntry, OptionRun, ServiceEntry},
        option::L4Protocol,
        SdEntry, SdFlags, SdMessage, SdOption,
    },
};

/// Build the options describing where `endpoints` can be reached.
fn endpoint_options(endpoints: &ServiceEndpoints) -> Vec<SdOption> {
    let mut options = Vec::with_capacity(2);
    if let Some(addr) = endpoints.reliable {
        options.push(endpoint_option(addr, L4Protocol::Tcp));
    }
    if let Some(addr) = endpoints.unreliable {
        options.push(endpoint_option(addr, L4Protocol::Udp));
    }
    options
}

fn endpoint_option(addr: SocketAddr, proto: L4Protocol) -> SdOption {
    match addr {
        SocketAddr::V4(v4) => SdOption::Ip4Endpoint { addr: *v4.ip(), proto, port: v4.port() },
        SocketAddr::V6(v6) => SdOption::Ip6Endpoint { addr: *v6.ip(), proto, port: v6.port() },
    }
}

/// Build a single-entry `OfferService` (or `StopOfferService` if `ttl ==
/// 0`) message.
#[must_use]
pub fn offer_service(key: ServiceKey, info: &ServiceInfo, ttl: Ttl, reboot: bool) -> SdMessage {
    let mut sd = SdMessage::new(SdFlags { reboot, unicast: true });
    let entry = SdEntry::Service(ServiceEntry {
        is_find: false,
        service_id: key.service_id,
        instance_id: key.instance_id,
        major_version: info.major_version,
        ttl,
        minor_version: info.minor_version,
        options1: OptionRun::NONE,
        options2: OptionRun::NONE,
    });
    sd.push_entry(entry, &endpoint_options(&info.endpoints));
    sd
}

/// Build a single-entry `FindService` message.
#[must_use]
pub fn find_service(key: ServiceKey, major_version: u8, reboot: bool) -> SdMessage {
    let mut sd = SdMessage::new(SdFlags { reboot, unicast: true });
    let entry = SdEntry::Service(ServiceEntry {
        is_find: true,
        service_id: key.service_id,
        instance_id: key.instance_id,
        major_version,
        ttl: someip_proto::consts::SD_DEFAULT_TTL_SECS,
        minor_version: someip_proto::ids::ANY_MINOR,
        options1: OptionRun::NONE,
        options2: OptionRun::NONE,
    });
    sd.push_entry(entry, &[]);
    sd
}

/// Build a `SubscribeEventgroup` (or unsubscribe if `ttl == 0`) message,
/// carrying the subscriber's own endpoint so the offering side knows where
/// to send notifications.
#[must_use]
pub fn subscribe(
    key: ServiceKey,
    eventgroup_id: EventgroupId,
    major_version: u8,
    ttl: Ttl,
    subscriber_endpoint: SocketAddr,
    reboot: bool,
) -> SdMessage {
    let mut sd = SdMessage::new(SdFlags { reboot, unicast: true });
    let entry = SdEntry::Eventgroup(EventgroupEntry {
        is_ack: false,
        service_id: key.service_id,
        instance_id: key.instance_id,
        major_version,
        ttl,
        eventgroup_id,
        counter: 0,
        options1: OptionRun::NONE,
        options2: OptionRun::NONE,
    });
    sd.push_entry(entry, &[endpoint_option(subscriber_endpoint, L4Protocol::Udp)]);
    sd
}

/// Build a `SubscribeEventgroupAck` (or NACK if `ttl == 0`) message.
#[must_use]
pub fn subscribe_ack(
    key: ServiceKey,
    eventgroup_id: EventgroupId,
    major_version: u8,
    ttl: Ttl,
) -> SdMessage {
    let mut sd = SdMessage::new(SdFlags { reboot: false, unicast: true });
    let entry = SdEntry::Eventgroup(EventgroupEntry {
        is_ack: true,
        service_id: key.service_id,
        instance_id: key.instance_id,
        major_version,
        ttl,
        eventgroup_id,
        counter: 0,
        options1: OptionRun::NONE,
        options2: OptionRun::NONE,
    });
    sd.push_entry(entry, &[]);
    sd
}

/// Resolve an entry's option runs into concrete transport endpoints, using
/// the message's already-validated option array.
#[must_use]
pub fn resolve_endpoints(message: &SdMessage, entry: &SdEntry) -> ServiceEndpoints {
    let (run1, run2) = entry.option_runs();
    let mut endpoints = ServiceEndpoints { reliable: None, unreliable: None };
    for run in [run1, run2] {
        for offset in 0..run.count {
            let idx = usize::from(run.index) + usize::from(offset);
            let Some(option) = message.options.get(idx) else { continue };
            apply_option(&mut endpoints, option);
        }
    }
    endpoints
}

fn apply_option(endpoints: &mut ServiceEndpoints, option: &SdOption) {
    match option {
        SdOption::Ip4Endpoint { addr, proto, port } => {
            let socket = SocketAddr::new((*addr).into(), *port);
            set_by_proto(endpoints, *proto, socket);
        },
        SdOption::Ip6Endpoint { addr, proto, port } => {
            let socket = SocketAddr::new((*addr).into(), *port);
            set_by_proto(endpoints, *proto, socket);
        },
        _ => {},
    }
}

fn set_by_proto(endpoints: &mut ServiceEndpoints, proto: L4Protocol, socket: SocketAddr) {
    match proto {
        L4Protocol::Tcp => endpoints.reliable = Some(socket),
        L4Protocol::Udp => endpoints.unreliable = Some(socket),
        L4Protocol::Unknown(_) => {},
    }
}

/// Who sent a message carrying a subscriber's registered client id, used
/// when looking up which local application a `SubscribeEventgroupAck`
/// belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberIdentity {
    /// The client id that initiated the subscription.
    pub client_id: ClientId,
    /// Where to deliver notifications.
    pub endpoint: SocketAddr,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn offer_and_resolve_round_trip_endpoint() {
        let key = ServiceKey::new(0x1234, 1);
        let info = ServiceInfo {
            major_version: 1,
            minor_version: 0,
            endpoints: ServiceEndpoints {
                reliable: None,
                unreliable: Some("192.168.1.10:30509".parse().unwrap()),
            },
        };
        let sd = offer_service(key, &info, 3, false);
        let entry = &sd.entries[0];
        let resolved = resolve_endpoints(&sd, entry);
        assert_eq!(resolved, info.endpoints);
    }
}
