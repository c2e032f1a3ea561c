//! Fuzz target for `StreamFramer` fed arbitrarily-chunked TCP bytes.
//!
//! SOME/IP has no framing layer below the message header itself, so a
//! stream reader has to resync on corrupted or truncated input by scanning
//! for a magic cookie one byte at a time. Feeding the same bytes in
//! different chunk sizes must never panic and must never get the framer
//! stuck: advancing the buffer in any split should eventually drain it.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use someip_transport::parser::StreamFramer;

#[derive(Debug, Arbitrary)]
struct ChunkedStream {
    chunks: Vec<Vec<u8>>,
}

fuzz_target!(|input: ChunkedStream| {
    let mut framer = StreamFramer::new();
    let mut total_fed = 0usize;

    for chunk in &input.chunks {
        // Cap total input so a pathological case can't spend unbounded time
        // dropping single bytes to resync.
        if total_fed > 1_000_000 {
            break;
        }
        total_fed += chunk.len();
        framer.feed(chunk);

        loop {
            match framer.next_frame() {
                Ok(Some(_frame)) => continue,
                Ok(None) => break,
                Err(_) => break,
            }
        }
    }
});
