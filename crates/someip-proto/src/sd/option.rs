//! Service Discovery options: transport endpoint descriptors and a handful
//! of opaque extension options (§3, §4.3, §6).

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::Bytes;

use crate::{
    codec::{Deserializer, Serializer},
    enums::OptionType,
    errors::{ProtocolError, Result},
};

/// Layer-4 protocol carried by an endpoint option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum L4Protocol {
    /// TCP (IANA protocol number 6).
    Tcp,
    /// UDP (IANA protocol number 17).
    Udp,
    /// Unrecognized protocol number, preserved verbatim.
    Unknown(u8),
}

impl L4Protocol {
    const TCP: u8 = 0x06;
    const UDP: u8 = 0x11;

    #[must_use]
    fn from_u8(value: u8) -> Self {
        match value {
            Self::TCP => Self::Tcp,
            Self::UDP => Self::Udp,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    fn to_u8(self) -> u8 {
        match self {
            Self::Tcp => Self::TCP,
            Self::Udp => Self::UDP,
            Self::Unknown(raw) => raw,
        }
    }
}

/// A single Service Discovery option.
///
/// Collapses the source's `option`/`option_impl` inheritance tree into one
/// tagged enum; dispatch on `option_type` happens once, in
/// [`SdOption::deserialize`], rather than through virtual calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdOption {
    /// Opaque `key=value` configuration strings, carried as raw bytes.
    Configuration {
        /// Raw configuration-string body.
        data: Bytes,
    },
    /// Load-balancing hint for clients choosing among equivalent offers.
    LoadBalancing {
        /// Lower values are preferred.
        priority: u16,
        /// Relative weight among equal-priority offers.
        weight: u16,
    },
    /// Transport-layer protection descriptor.
    Protection {
        /// Replay-protection counter.
        counter: u16,
        /// CRC over the protected frame.
        crc: u32,
    },
    /// IPv4 unicast endpoint.
    Ip4Endpoint {
        /// Endpoint address.
        addr: Ipv4Addr,
        /// Transport protocol at that address.
        proto: L4Protocol,
        /// Endpoint port.
        port: u16,
    },
    /// IPv6 unicast endpoint.
    Ip6Endpoint {
        /// Endpoint address.
        addr: Ipv6Addr,
        /// Transport protocol at that address.
        proto: L4Protocol,
        /// Endpoint port.
        port: u16,
    },
    /// IPv4 multicast endpoint, used in `SubscribeAck` for multicast
    /// eventgroups.
    Ip4Multicast {
        /// Multicast group address.
        addr: Ipv4Addr,
        /// Transport protocol (always UDP in practice).
        proto: L4Protocol,
        /// Multicast port.
        port: u16,
    },
    /// IPv6 multicast endpoint.
    Ip6Multicast {
        /// Multicast group address.
        addr: Ipv6Addr,
        /// Transport protocol (always UDP in practice).
        proto: L4Protocol,
        /// Multicast port.
        port: u16,
    },
    /// An option type this implementation does not recognize; the raw body
    /// is preserved so the containing message can still be forwarded.
    Unknown {
        /// Raw option-type tag.
        option_type: u8,
        /// Raw option body (excludes the 2-byte length/type/reserved header).
        body: Bytes,
    },
}

impl SdOption {
    fn option_type(&self) -> OptionType {
        match self {
            Self::Configuration { .. } => OptionType::Configuration,
            Self::LoadBalancing { .. } => OptionType::LoadBalancing,
            Self::Protection { .. } => OptionType::Protection,
            Self::Ip4Endpoint { .. } => OptionType::Ip4Endpoint,
            Self::Ip6Endpoint { .. } => OptionType::Ip6Endpoint,
            Self::Ip4Multicast { .. } => OptionType::Ip4Multicast,
            Self::Ip6Multicast { .. } => OptionType::Ip6Multicast,
            Self::Unknown { option_type, .. } => OptionType::from_u8(*option_type),
        }
    }

    /// Serialize `length | type | reserved | body`.
    pub fn serialize(&self, ser: &mut Serializer) {
        let mut body = Serializer::new();
        self.write_body(&mut body);
        let body_bytes = body.finish();

        #[allow(clippy::cast_possible_truncation)]
        let length = 2 + body_bytes.len() as u16;
        ser.write_u16(length);
        ser.write_u8(self.option_type().to_u8());
        ser.write_u8(0); // reserved
        ser.write_bytes(&body_bytes);
    }

    fn write_body(&self, ser: &mut Serializer) {
        match self {
            Self::Configuration { data } => ser.write_bytes(data),
            Self::LoadBalancing { priority, weight } => {
                ser.write_u16(*priority);
                ser.write_u16(*weight);
            },
            Self::Protection { counter, crc } => {
                ser.write_u16(*counter);
                ser.write_u32(*crc);
            },
            Self::Ip4Endpoint { addr, proto, port } | Self::Ip4Multicast { addr, proto, port } => {
                ser.write_bytes(&addr.octets());
                ser.write_u8(0); // reserved
                ser.write_u8(proto.to_u8());
                ser.write_u16(*port);
            },
            Self::Ip6Endpoint { addr, proto, port } | Self::Ip6Multicast { addr, proto, port } => {
                ser.write_bytes(&addr.octets());
                ser.write_u8(0); // reserved
                ser.write_u8(proto.to_u8());
                ser.write_u16(*port);
            },
            Self::Unknown { body, .. } => ser.write_bytes(body),
        }
    }

    /// Parse one option starting at the deserializer's current position.
    pub fn deserialize(de: &mut Deserializer<'_>) -> Result<Self> {
        let length = de.read_u16()?;
        if length < 2 {
            return Err(ProtocolError::MalformedLength(format!(
                "option length {length} is smaller than the 2-byte type/reserved header"
            )));
        }
        let option_type = de.read_u8()?;
        let _reserved = de.read_u8()?;
        let body_len = usize::from(length - 2);
        let body = de.read_bytes(body_len)?;
        let mut body_de = Deserializer::new(body);

        let option = match OptionType::from_u8(option_type) {
            OptionType::Configuration => {
                Self::Configuration { data: Bytes::copy_from_slice(body) }
            },
            OptionType::LoadBalancing => {
                let priority = body_de.read_u16()?;
                let weight = body_de.read_u16()?;
                Self::LoadBalancing { priority, weight }
            },
            OptionType::Protection => {
                let counter = body_de.read_u16()?;
                let crc = body_de.read_u32()?;
                Self::Protection { counter, crc }
            },
            OptionType::Ip4Endpoint | OptionType::Ip4Multicast => {
                let addr = read_ip4(&mut body_de)?;
                let _reserved = body_de.read_u8()?;
                let proto = L4Protocol::from_u8(body_de.read_u8()?);
                let port = body_de.read_u16()?;
                if OptionType::from_u8(option_type) == OptionType::Ip4Endpoint {
                    Self::Ip4Endpoint { addr, proto, port }
                } else {
                    Self::Ip4Multicast { addr, proto, port }
                }
            },
            OptionType::Ip6Endpoint | OptionType::Ip6Multicast => {
                let addr = read_ip6(&mut body_de)?;
                let _reserved = body_de.read_u8()?;
                let proto = L4Protocol::from_u8(body_de.read_u8()?);
                let port = body_de.read_u16()?;
                if OptionType::from_u8(option_type) == OptionType::Ip6Endpoint {
                    Self::Ip6Endpoint { addr, proto, port }
                } else {
                    Self::Ip6Multicast { addr, proto, port }
                }
            },
            OptionType::Unknown(raw) => Self::Unknown { option_type: raw, body: Bytes::copy_from_slice(body) },
        };
        Ok(option)
    }
}

fn read_ip4(de: &mut Deserializer<'_>) -> Result<Ipv4Addr> {
    let bytes = de.read_bytes(4)?;
    Ok(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]))
}

fn read_ip6(de: &mut Deserializer<'_>) -> Result<Ipv6Addr> {
    let bytes = de.read_bytes(16)?;
    let mut octets = [0u8; 16];
    octets.copy_from_slice(bytes);
    Ok(Ipv6Addr::from(octets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip4_endpoint_round_trip_matches_spec_lengths() {
        let option =
            SdOption::Ip4Endpoint { addr: Ipv4Addr::new(192, 168, 1, 10), proto: L4Protocol::Udp, port: 30509 };
        let mut ser = Serializer::new();
        option.serialize(&mut ser);
        let bytes = ser.finish();
        // 2 (length) + 1 (type) + 1 (reserved) + 8 (body) = 12 bytes total.
        assert_eq!(bytes.len(), 12);
        assert_eq!(u16::from_be_bytes([bytes[0], bytes[1]]), 9);

        let mut de = Deserializer::new(&bytes);
        assert_eq!(SdOption::deserialize(&mut de).unwrap(), option);
    }

    #[test]
    fn unknown_option_type_round_trips() {
        let option = SdOption::Unknown { option_type: 0x99, body: Bytes::from_static(&[1, 2, 3]) };
        let mut ser = Serializer::new();
        option.serialize(&mut ser);
        let bytes = ser.finish();

        let mut de = Deserializer::new(&bytes);
        assert_eq!(SdOption::deserialize(&mut de).unwrap(), option);
    }

    #[test]
    fn load_balancing_round_trips() {
        let option = SdOption::LoadBalancing { priority: 1, weight: 255 };
        let mut ser = Serializer::new();
        option.serialize(&mut ser);
        let bytes = ser.finish();

        let mut de = Deserializer::new(&bytes);
        assert_eq!(SdOption::deserialize(&mut de).unwrap(), option);
    }
}
