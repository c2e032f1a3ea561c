//! Fuzz target for `SomeipMessage::deserialize` and `WireFrame::deserialize`.
//!
//! This should never panic: a malformed header or a declared length that
//! overruns the buffer must come back as a `ProtocolError`, never a crash.

#![no_main]

use libfuzzer_sys::fuzz_target;
use someip_proto::{codec::Deserializer, message::{SomeipMessage, WireFrame}};

fuzz_target!(|data: &[u8]| {
    let mut de = Deserializer::new(data);
    if let Ok(message) = SomeipMessage::deserialize(&mut de) {
        // A message that parsed once must re-serialize to bytes that parse
        // back to an identical message.
        let bytes = message.to_bytes();
        let mut round_trip = Deserializer::new(&bytes);
        let reparsed = SomeipMessage::deserialize(&mut round_trip).expect("a message we just serialized must deserialize");
        assert_eq!(reparsed, message);
    }

    let mut de = Deserializer::new(data);
    let _ = WireFrame::deserialize(&mut de);
});
