//! Successive session ids for the same (client, message) pair must
//! increase strictly modulo 2^16, and must never be zero — driven through
//! the routing host's public surface rather than the allocator directly,
//! so the property holds for whatever session ids the daemon actually
//! hands out.

use someip_routing::RoutingManagerHost;

#[test]
fn session_ids_never_repeat_zero_across_a_full_wraparound() {
    let mut host = RoutingManagerHost::new();
    let message_id = 0x1234_8001;
    let client_id = 7;

    let mut previous = host.next_session(client_id, message_id);
    assert_ne!(previous, 0);

    let mut saw_wraparound = false;
    for _ in 0..(u32::from(u16::MAX) * 2) {
        let next = host.next_session(client_id, message_id);
        assert_ne!(next, 0, "a session id of zero must never be handed out");
        if next <= previous {
            saw_wraparound = true;
        }
        previous = next;
    }
    assert!(saw_wraparound, "cycling through the full id space should wrap around at least once");
}

#[test]
fn independent_client_message_pairs_do_not_share_counters() {
    let mut host = RoutingManagerHost::new();
    assert_eq!(host.next_session(1, 0xAAAA_0001), 1);
    assert_eq!(host.next_session(2, 0xAAAA_0001), 1);
    assert_eq!(host.next_session(1, 0xAAAA_0002), 1);
    assert_eq!(host.next_session(1, 0xAAAA_0001), 2);
}
