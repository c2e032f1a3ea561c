//! TCP stream framing and magic-cookie resync.
//!
//! SOME/IP has no length-prefixed transport framing of its own — the header
//! length field is part of the message format, not a separate envelope — so
//! a stream reader has to trust that field to know where the next frame
//! starts. If a peer desyncs (partial write, crash mid-frame, corrupted
//! byte), the only way back is to scan forward for a magic cookie, which is
//! why [`StreamFramer`] treats cookie frames specially rather than just
//! another [`WireFrame::Message`] (§4.2).

use bytes::{Buf, BytesMut};
use someip_proto::{codec::Deserializer, consts, message::WireFrame, ProtocolError};

use crate::errors::TransportError;

/// Frames larger than this over TCP are treated as stream corruption rather
/// than a legitimately huge message, and trigger a byte-at-a-time resync
/// scan instead of waiting indefinitely for bytes that will never arrive.
pub const MAX_REASONABLE_FRAME_SIZE: usize = 1024 * 1024;

/// Incremental TCP-stream decoder.
///
/// Feed it bytes as they arrive; call [`StreamFramer::next_frame`] in a loop
/// until it returns `Ok(None)`, meaning the buffered bytes don't yet contain
/// a complete frame.
#[derive(Debug, Default)]
pub struct StreamFramer {
    buf: BytesMut,
}

impl StreamFramer {
    /// Empty framer.
    #[must_use]
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    /// Append newly-read bytes to the internal buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Try to decode the next complete frame from the buffer.
    ///
    /// Returns `Ok(None)` when more bytes are needed. A frame whose declared
    /// length would exceed [`MAX_REASONABLE_FRAME_SIZE`] is treated as
    /// desync: one byte is dropped and the caller should call again to
    /// retry alignment, which is how this recovers from a corrupted stream
    /// without waiting forever for bytes that were never coming.
    pub fn next_frame(&mut self) -> Result<Option<WireFrame>, TransportError> {
        if self.buf.len() < consts::HEADER_SIZE {
            return Ok(None);
        }

        let declared_length = u32::from_be_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]);
        let total_frame_size = consts::HEADER_SIZE + declared_length.saturating_sub(8) as usize;
        if total_frame_size > MAX_REASONABLE_FRAME_SIZE {
            tracing::warn!(declared_length, "TCP stream desync, dropping byte to resync");
            self.buf.advance(1);
            return Ok(None);
        }

        if self.buf.len() < total_frame_size {
            return Ok(None);
        }

        let mut de = Deserializer::new(&self.buf[..total_frame_size]);
        match WireFrame::deserialize(&mut de) {
            Ok(frame) => {
                self.buf.advance(total_frame_size);
                Ok(Some(frame))
            },
            Err(err @ ProtocolError::BufferUnderrun { .. }) => Err(TransportError::Protocol(err)),
            Err(err) => {
                tracing::warn!(%err, "dropping unparsable frame, resyncing");
                self.buf.advance(1);
                Ok(None)
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use someip_proto::{enums::MessageType, message::SomeipMessage, ReturnCode};

    use super::*;

    #[test]
    fn partial_frame_waits_for_more_bytes() {
        let msg = SomeipMessage::new(1, 1, 1, 1, 1, MessageType::Request, ReturnCode::Ok, vec![1, 2, 3]);
        let bytes = msg.to_bytes();
        let mut framer = StreamFramer::new();
        framer.feed(&bytes[..bytes.len() - 1]);
        assert!(framer.next_frame().unwrap().is_none());

        framer.feed(&bytes[bytes.len() - 1..]);
        assert!(framer.next_frame().unwrap().is_some());
    }

    #[test]
    fn two_frames_back_to_back_both_decode() {
        let msg = SomeipMessage::new(1, 1, 1, 1, 1, MessageType::RequestNoReturn, ReturnCode::Ok, Vec::new());
        let bytes = msg.to_bytes();
        let mut framer = StreamFramer::new();
        framer.feed(&bytes);
        framer.feed(&bytes);

        assert!(framer.next_frame().unwrap().is_some());
        assert!(framer.next_frame().unwrap().is_some());
        assert!(framer.next_frame().unwrap().is_none());
    }

    #[test]
    fn garbage_byte_is_dropped_until_cookie_aligns() {
        let cookie = WireFrame::client_magic_cookie_bytes();
        let mut framer = StreamFramer::new();
        framer.feed(&[0xDE, 0xAD, 0xBE, 0xEF]);
        framer.feed(&cookie);

        // the leading garbage doesn't parse as a sane header and gets
        // dropped a byte at a time until the cookie is at the front.
        let mut found = false;
        for _ in 0..8 {
            if let Some(WireFrame::ClientMagicCookie) = framer.next_frame().unwrap() {
                found = true;
                break;
            }
        }
        assert!(found, "resync should eventually find the magic cookie");
    }
}
