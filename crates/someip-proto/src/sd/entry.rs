//! Service Discovery entries: 16-byte fixed records referencing options by
//! index rather than by pointer (§3, §4.3, §9).

use crate::{
    codec::{Deserializer, Serializer},
    enums::EntryType,
    errors::Result,
    ids::{EventgroupId, InstanceId, MajorVersion, MinorVersion, ServiceId, Ttl},
};

/// The two option "runs" an entry may reference. Most entries use only
/// `run1`; a second transport (e.g. both reliable and unreliable endpoints
/// for one subscription) uses `run2` as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptionRun {
    /// Index of the first referenced option in the message's option array.
    pub index: u8,
    /// Number of consecutive options referenced starting at `index`.
    pub count: u8,
}

impl OptionRun {
    /// The empty run (no options referenced).
    pub const NONE: Self = Self { index: 0, count: 0 };

    /// True if this run references no options.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.count == 0
    }
}

/// A `FindService`/`OfferService` entry (`entry_type.is_service_entry()`).
///
/// `ttl == 0` on an `OfferService`-typed entry means `StopOfferService`
/// (§9 Open Question (a) — the spec resolves the source's overloaded
/// `entry_type` this way rather than inventing a new wire tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceEntry {
    /// Whether this is a find (client) or offer (server) entry.
    pub is_find: bool,
    /// Service identifier.
    pub service_id: ServiceId,
    /// Instance identifier.
    pub instance_id: InstanceId,
    /// Major version of the service interface.
    pub major_version: MajorVersion,
    /// Time-to-live in seconds; `0` cancels a prior offer.
    pub ttl: Ttl,
    /// Minor version of the service interface.
    pub minor_version: MinorVersion,
    /// First option reference.
    pub options1: OptionRun,
    /// Second option reference.
    pub options2: OptionRun,
}

impl ServiceEntry {
    /// True if `ttl == 0`, i.e. this entry withdraws a previous offer.
    #[must_use]
    pub fn is_stop(&self) -> bool {
        self.ttl == 0
    }
}

/// A `SubscribeEventgroup`/`SubscribeEventgroupAck` entry.
///
/// `ttl == 0` means unsubscribe (for a `SubscribeEventgroup` entry) or NACK
/// (for an Ack entry) — the same TTL-based disambiguation as
/// [`ServiceEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventgroupEntry {
    /// Whether this is a subscribe (client) or ack (server) entry.
    pub is_ack: bool,
    /// Service identifier.
    pub service_id: ServiceId,
    /// Instance identifier.
    pub instance_id: InstanceId,
    /// Major version of the service interface.
    pub major_version: MajorVersion,
    /// Time-to-live in seconds; `0` cancels the subscription (or NACKs it).
    pub ttl: Ttl,
    /// Eventgroup identifier.
    pub eventgroup_id: EventgroupId,
    /// Subscriber-assigned counter distinguishing concurrent subscriptions
    /// to the same eventgroup from the same client (always 0 here — we
    /// allow at most one subscription per eventgroup per subscriber, per
    /// the routing invariant in §3).
    pub counter: u8,
    /// First option reference (reliable endpoint, typically).
    pub options1: OptionRun,
    /// Second option reference (unreliable/multicast endpoint, typically).
    pub options2: OptionRun,
}

impl EventgroupEntry {
    /// True if `ttl == 0`.
    #[must_use]
    pub fn is_stop(&self) -> bool {
        self.ttl == 0
    }
}

/// A Service Discovery entry: either a service entry (Find/Offer) or an
/// eventgroup entry (Subscribe/SubscribeAck).
///
/// Collapses the source's `entry`/`service_entry_impl`/`eventgroup_entry_impl`
/// inheritance into one tagged enum dispatched on `entry_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdEntry {
    /// `FindService`/`OfferService`.
    Service(ServiceEntry),
    /// `SubscribeEventgroup`/`SubscribeEventgroupAck`.
    Eventgroup(EventgroupEntry),
}

impl SdEntry {
    fn entry_type(&self) -> EntryType {
        match self {
            Self::Service(e) if e.is_find => EntryType::FindService,
            Self::Service(_) => EntryType::OfferService,
            Self::Eventgroup(e) if e.is_ack => EntryType::SubscribeEventgroupAck,
            Self::Eventgroup(_) => EntryType::SubscribeEventgroup,
        }
    }

    /// The two option runs this entry references, used when recomputing
    /// indices against a final options array (§4.3).
    #[must_use]
    pub fn option_runs(&self) -> (OptionRun, OptionRun) {
        match self {
            Self::Service(e) => (e.options1, e.options2),
            Self::Eventgroup(e) => (e.options1, e.options2),
        }
    }

    /// Serialize the fixed 16-byte record.
    pub fn serialize(&self, ser: &mut Serializer) {
        let (run1, run2) = self.option_runs();
        ser.write_u8(self.entry_type().to_u8());
        ser.write_u8(run1.index);
        ser.write_u8(run2.index);
        ser.write_u8((run1.count << 4) | (run2.count & 0x0F));

        match self {
            Self::Service(e) => {
                ser.write_u16(e.service_id);
                ser.write_u16(e.instance_id);
                ser.write_u8(e.major_version);
                ser.write_u24(e.ttl);
                ser.write_u32(e.minor_version);
            },
            Self::Eventgroup(e) => {
                ser.write_u16(e.service_id);
                ser.write_u16(e.instance_id);
                ser.write_u8(e.major_version);
                ser.write_u24(e.ttl);
                ser.write_u8(0); // reserved
                ser.write_u8(e.counter & 0x0F);
                ser.write_u16(e.eventgroup_id);
            },
        }
    }

    /// Parse a 16-byte entry record.
    pub fn deserialize(de: &mut Deserializer<'_>) -> Result<Self> {
        let entry_type = EntryType::from_u8(de.read_u8()?);
        let index1 = de.read_u8()?;
        let index2 = de.read_u8()?;
        let packed_counts = de.read_u8()?;
        let options1 = OptionRun { index: index1, count: packed_counts >> 4 };
        let options2 = OptionRun { index: index2, count: packed_counts & 0x0F };

        let service_id = de.read_u16()?;
        let instance_id = de.read_u16()?;
        let major_version = de.read_u8()?;
        let ttl = de.read_u24()?;

        let entry = if entry_type.is_service_entry() {
            let minor_version = de.read_u32()?;
            Self::Service(ServiceEntry {
                is_find: entry_type == EntryType::FindService,
                service_id,
                instance_id,
                major_version,
                ttl,
                minor_version,
                options1,
                options2,
            })
        } else {
            let _reserved = de.read_u8()?;
            let counter = de.read_u8()? & 0x0F;
            let eventgroup_id = de.read_u16()?;
            Self::Eventgroup(EventgroupEntry {
                is_ack: entry_type == EntryType::SubscribeEventgroupAck,
                service_id,
                instance_id,
                major_version,
                ttl,
                eventgroup_id,
                counter,
                options1,
                options2,
            })
        };
        Ok(entry)
    }
}

/// Fixed on-wire size of a single entry record.
pub const ENTRY_SIZE: usize = 16;

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn service_entry_round_trip() {
        let entry = SdEntry::Service(ServiceEntry {
            is_find: false,
            service_id: 0x2222,
            instance_id: 0x0001,
            major_version: 1,
            ttl: 3,
            minor_version: 0,
            options1: OptionRun { index: 0, count: 1 },
            options2: OptionRun::NONE,
        });
        let mut ser = Serializer::new();
        entry.serialize(&mut ser);
        let bytes = ser.finish();
        assert_eq!(bytes.len(), ENTRY_SIZE);

        let mut de = Deserializer::new(&bytes);
        assert_eq!(SdEntry::deserialize(&mut de).unwrap(), entry);
    }

    #[test]
    fn stop_offer_is_ttl_zero() {
        let entry = ServiceEntry {
            is_find: false,
            service_id: 1,
            instance_id: 1,
            major_version: 1,
            ttl: 0,
            minor_version: 0,
            options1: OptionRun::NONE,
            options2: OptionRun::NONE,
        };
        assert!(entry.is_stop());
    }

    #[test]
    fn eventgroup_entry_round_trip() {
        let entry = SdEntry::Eventgroup(EventgroupEntry {
            is_ack: true,
            service_id: 0x2222,
            instance_id: 0x0001,
            major_version: 1,
            ttl: 3,
            eventgroup_id: 0x0010,
            counter: 0,
            options1: OptionRun { index: 0, count: 1 },
            options2: OptionRun::NONE,
        });
        let mut ser = Serializer::new();
        entry.serialize(&mut ser);
        let bytes = ser.finish();
        assert_eq!(bytes.len(), ENTRY_SIZE);

        let mut de = Deserializer::new(&bytes);
        assert_eq!(SdEntry::deserialize(&mut de).unwrap(), entry);
    }

    proptest! {
        #[test]
        fn service_entry_round_trips_arbitrary(
            is_find in any::<bool>(),
            service_id in any::<u16>(),
            instance_id in any::<u16>(),
            major_version in any::<u8>(),
            ttl in 0u32..=0x00FF_FFFF,
            minor_version in any::<u32>(),
        ) {
            let entry = SdEntry::Service(ServiceEntry {
                is_find,
                service_id,
                instance_id,
                major_version,
                ttl,
                minor_version,
                options1: OptionRun::NONE,
                options2: OptionRun::NONE,
            });
            let mut ser = Serializer::new();
            entry.serialize(&mut ser);
            let bytes = ser.finish();
            let mut de = Deserializer::new(&bytes);
            prop_assert_eq!(SdEntry::deserialize(&mut de).unwrap(), entry);
        }
    }
}
