//! The Service Discovery payload: flags, entry array, option array (§4.3).

use crate::{
    codec::{Deserializer, Serializer},
    errors::{ProtocolError, Result},
    ids::{self, SessionId},
    message::SomeipMessage,
};

use super::{entry::ENTRY_SIZE, SdEntry, SdOption};

/// Flags carried in the first byte of an SD payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SdFlags {
    /// Set on every SD message sent since the node last rebooted, cleared
    /// again only by a genuine reboot (§4.6) — lets peers detect a restart
    /// and drop stale subscription state.
    pub reboot: bool,
    /// Set when the sender only ever communicates via unicast.
    pub unicast: bool,
}

impl SdFlags {
    const REBOOT_BIT: u8 = 0x80;
    const UNICAST_BIT: u8 = 0x40;

    fn to_u8(self) -> u8 {
        let mut byte = 0;
        if self.reboot {
            byte |= Self::REBOOT_BIT;
        }
        if self.unicast {
            byte |= Self::UNICAST_BIT;
        }
        byte
    }

    fn from_u8(byte: u8) -> Self {
        Self { reboot: byte & Self::REBOOT_BIT != 0, unicast: byte & Self::UNICAST_BIT != 0 }
    }
}

/// A Service Discovery message: the structured payload of every frame
/// addressed to `(service=0xFFFF, method=0x8100)`.
///
/// Options are stored de-duplicated, and entries reference them by
/// `(index, count)` — exactly the shape the wire format requires, which
/// means building a message is just "push entries, push options, each
/// entry records which options it used" with no separate flattening pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SdMessage {
    /// Reboot/unicast flags.
    pub flags: SdFlags,
    /// Find/Offer/Subscribe/SubscribeAck entries.
    pub entries: Vec<SdEntry>,
    /// Options referenced by `entries`, already de-duplicated.
    pub options: Vec<SdOption>,
}

impl SdMessage {
    /// Start an empty message.
    #[must_use]
    pub fn new(flags: SdFlags) -> Self {
        Self { flags, entries: Vec::new(), options: Vec::new() }
    }

    /// Append `entry`, inserting `wanted_options` into the option array
    /// (reusing an existing equal option rather than duplicating it) and
    /// rewriting the entry's option runs to point at the final indices.
    ///
    /// This is the one place de-duplication happens; everything downstream
    /// (serialization, wire bytes) just trusts the indices already match.
    pub fn push_entry(&mut self, entry: SdEntry, wanted_options: &[SdOption]) {
        let mut run1 = super::entry::OptionRun::NONE;
        let mut run2 = super::entry::OptionRun::NONE;

        if let Some(first) = wanted_options.first() {
            let start = self.intern_option(first.clone());
            run1 = super::entry::OptionRun { index: start, count: 1 };
            for option in &wanted_options[1..] {
                let idx = self.intern_option(option.clone());
                if run2.count == 0 && idx == start.wrapping_add(run1.count) {
                    run1.count += 1;
                } else if run2.count == 0 {
                    run2 = super::entry::OptionRun { index: idx, count: 1 };
                } else {
                    run2.count += 1;
                }
            }
        }

        let entry = rewrite_option_runs(entry, run1, run2);
        self.entries.push(entry);
    }

    fn intern_option(&mut self, option: SdOption) -> u8 {
        if let Some(pos) = self.options.iter().position(|existing| existing == &option) {
            #[allow(clippy::cast_possible_truncation)]
            return pos as u8;
        }
        self.options.push(option);
        #[allow(clippy::cast_possible_truncation)]
        let index = (self.options.len() - 1) as u8;
        index
    }

    /// Serialize to the `flags | reserved[3] | entries | options` payload
    /// layout.
    #[must_use]
    pub fn to_payload(&self) -> Vec<u8> {
        let mut ser = Serializer::new();
        ser.write_u8(self.flags.to_u8());
        ser.write_u8(0);
        ser.write_u8(0);
        ser.write_u8(0);

        let mut entries_ser = Serializer::new();
        for entry in &self.entries {
            entry.serialize(&mut entries_ser);
        }
        let entries_bytes = entries_ser.finish();
        #[allow(clippy::cast_possible_truncation)]
        ser.write_u32(entries_bytes.len() as u32);
        ser.write_bytes(&entries_bytes);

        let mut options_ser = Serializer::new();
        for option in &self.options {
            option.serialize(&mut options_ser);
        }
        let options_bytes = options_ser.finish();
        #[allow(clippy::cast_possible_truncation)]
        ser.write_u32(options_bytes.len() as u32);
        ser.write_bytes(&options_bytes);

        ser.finish()
    }

    /// Parse an SD payload, validating every entry's option references
    /// against the final option array.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let mut de = Deserializer::new(payload);
        let flags = SdFlags::from_u8(de.read_u8()?);
        de.skip(3)?;

        let entries_length = de.read_u32()? as usize;
        let entries_bytes = de.read_bytes(entries_length)?;
        let mut entries = Vec::with_capacity(entries_length / ENTRY_SIZE);
        let mut entries_de = Deserializer::with_bound(entries_bytes, entries_length);
        while !entries_de.is_empty() {
            entries.push(SdEntry::deserialize(&mut entries_de)?);
        }

        let options_length = de.read_u32()? as usize;
        let options_bytes = de.read_bytes(options_length)?;
        let mut options = Vec::new();
        let mut options_de = Deserializer::with_bound(options_bytes, options_length);
        while !options_de.is_empty() {
            options.push(SdOption::deserialize(&mut options_de)?);
        }

        for entry in &entries {
            let (run1, run2) = entry.option_runs();
            validate_run(run1, options.len())?;
            validate_run(run2, options.len())?;
        }

        Ok(Self { flags, entries, options })
    }

    /// Wrap this SD payload in a [`SomeipMessage`] addressed to the
    /// well-known SD service/method, ready to hand to a transport.
    #[must_use]
    pub fn into_someip_message(self, session_id: SessionId) -> SomeipMessage {
        let payload = self.to_payload();
        SomeipMessage::new(
            ids::SD_SERVICE,
            ids::SD_METHOD,
            ids::SD_CLIENT,
            session_id,
            0,
            crate::enums::MessageType::Notification,
            crate::enums::ReturnCode::Ok,
            payload,
        )
    }

    /// Extract the SD payload from a [`SomeipMessage`] previously verified
    /// to be addressed to `(0xFFFF, 0x8100)`.
    pub fn from_someip_message(message: &SomeipMessage) -> Result<Self> {
        Self::from_payload(message.payload())
    }
}

fn validate_run(run: super::entry::OptionRun, available: usize) -> Result<()> {
    if run.count == 0 {
        return Ok(());
    }
    let end = usize::from(run.index) + usize::from(run.count);
    if end > available {
        return Err(ProtocolError::OptionIndexOutOfRange {
            index: u16::from(run.index),
            count: run.count,
            available,
        });
    }
    Ok(())
}

fn rewrite_option_runs(
    entry: SdEntry,
    run1: super::entry::OptionRun,
    run2: super::entry::OptionRun,
) -> SdEntry {
    match entry {
        SdEntry::Service(mut e) => {
            e.options1 = run1;
            e.options2 = run2;
            SdEntry::Service(e)
        },
        SdEntry::Eventgroup(mut e) => {
            e.options1 = run1;
            e.options2 = run2;
            SdEntry::Eventgroup(e)
        },
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::sd::{option::L4Protocol, ServiceEntry};

    #[test]
    fn offer_service_round_trip_matches_spec_lengths() {
        let mut sd = SdMessage::new(SdFlags { reboot: true, unicast: true });
        let entry = SdEntry::Service(ServiceEntry {
            is_find: false,
            service_id: 0x2222,
            instance_id: 0x0001,
            major_version: 1,
            ttl: 3,
            minor_version: 0,
            options1: super::super::entry::OptionRun::NONE,
            options2: super::super::entry::OptionRun::NONE,
        });
        let option =
            SdOption::Ip4Endpoint { addr: Ipv4Addr::new(192, 168, 1, 10), proto: L4Protocol::Udp, port: 30509 };
        sd.push_entry(entry, std::slice::from_ref(&option));

        let payload = sd.to_payload();
        let parsed = SdMessage::from_payload(&payload).unwrap();
        assert_eq!(parsed, sd);
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.options.len(), 1);

        // flags(1) + reserved(3) + entries_length(4) + entries(16) +
        // options_length(4) + options(12) = 40 bytes.
        assert_eq!(payload.len(), 1 + 3 + 4 + 16 + 4 + 12);
    }

    #[test]
    fn duplicate_options_are_interned_once() {
        let mut sd = SdMessage::new(SdFlags::default());
        let option =
            SdOption::Ip4Endpoint { addr: Ipv4Addr::new(10, 0, 0, 1), proto: L4Protocol::Udp, port: 30500 };
        let e1 = SdEntry::Service(ServiceEntry {
            is_find: false,
            service_id: 1,
            instance_id: 1,
            major_version: 1,
            ttl: 3,
            minor_version: 0,
            options1: super::super::entry::OptionRun::NONE,
            options2: super::super::entry::OptionRun::NONE,
        });
        let e2 = SdEntry::Service(ServiceEntry {
            is_find: false,
            service_id: 2,
            instance_id: 1,
            major_version: 1,
            ttl: 3,
            minor_version: 0,
            options1: super::super::entry::OptionRun::NONE,
            options2: super::super::entry::OptionRun::NONE,
        });
        sd.push_entry(e1, std::slice::from_ref(&option));
        sd.push_entry(e2, std::slice::from_ref(&option));

        assert_eq!(sd.options.len(), 1, "identical options must be shared, not duplicated");
    }

    #[test]
    fn out_of_range_option_reference_is_rejected() {
        let mut payload = Vec::new();
        payload.push(0); // flags
        payload.extend_from_slice(&[0, 0, 0]); // reserved
        // one service entry whose options1 references index 0, count 1, but
        // the options array below is empty.
        let mut entries = Serializer::new();
        let entry = SdEntry::Service(ServiceEntry {
            is_find: false,
            service_id: 1,
            instance_id: 1,
            major_version: 1,
            ttl: 3,
            minor_version: 0,
            options1: super::super::entry::OptionRun { index: 0, count: 1 },
            options2: super::super::entry::OptionRun::NONE,
        });
        entry.serialize(&mut entries);
        let entries_bytes = entries.finish();
        payload.extend_from_slice(&(entries_bytes.len() as u32).to_be_bytes());
        payload.extend_from_slice(&entries_bytes);
        payload.extend_from_slice(&0u32.to_be_bytes());

        let result = SdMessage::from_payload(&payload);
        assert!(matches!(result, Err(ProtocolError::OptionIndexOutOfRange { .. })));
    }
}
