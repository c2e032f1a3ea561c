//! Fuzz target for `SdMessage::from_payload`.
//!
//! Service Discovery payloads nest an entries array and an options array
//! that reference each other by (index, count) pairs (§4.6) — exactly the
//! kind of cross-referenced variable-length structure that tends to hide
//! off-by-one buffer reads. This should never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use someip_proto::SdMessage;

fuzz_target!(|data: &[u8]| {
    let _ = SdMessage::from_payload(data);
});
