//! Typed properties and the name registry.
//!
//! A property is a 4-byte ASCII name plus a byte-string value. The declared
//! type of a known name governs coercion between native values and wire
//! bytes; unknown names pass through as opaque binary.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use acp_core::error::PropertyError;

use crate::cflbinary::{self, Value};

/// A 4-byte ASCII property name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropName(pub [u8; 4]);

impl PropName {
    pub fn as_bytes(&self) -> [u8; 4] {
        self.0
    }
}

impl fmt::Display for PropName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl FromStr for PropName {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(u8::is_ascii) {
            return Err(PropertyError::InvalidName(s.to_string()));
        }
        Ok(Self([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl From<[u8; 4]> for PropName {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

/// A named value as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: PropName,
    pub value: Vec<u8>,
}

impl Property {
    pub fn new(name: PropName, value: Vec<u8>) -> Self {
        Self { name, value }
    }

    /// A GET_PROPERTY request entry: the value is a 4-byte zero placeholder.
    pub fn request(name: PropName) -> Self {
        Self {
            name,
            value: vec![0u8; 4],
        }
    }

    /// Decode the value through the registry kind for this name.
    ///
    /// Unknown names decode as opaque binary.
    pub fn decode(&self) -> Result<PropertyValue, PropertyError> {
        let kind = lookup(&self.name).map_or(ValueKind::Bin, |info| info.kind);
        kind.decode(&self.value)
    }
}

/// The closed set of value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Str,
    Dec,
    Hex,
    Log,
    Mac,
    Cfb,
    Bin,
    Bool,
    U8,
    U16,
    U32,
    U64,
    Ip4,
    Ip6,
    Bpl,
    Uid,
}

impl ValueKind {
    /// The three-letter type code used in the catalogue.
    pub fn code(self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Dec => "dec",
            Self::Hex => "hex",
            Self::Log => "log",
            Self::Mac => "mac",
            Self::Cfb => "cfb",
            Self::Bin => "bin",
            Self::Bool => "boo",
            Self::U8 => "ui8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::Ip4 => "ip4",
            Self::Ip6 => "ip6",
            Self::Bpl => "bpl",
            Self::Uid => "uid",
        }
    }

    /// Coerce wire bytes into a native value.
    pub fn decode(self, bytes: &[u8]) -> Result<PropertyValue, PropertyError> {
        let invalid = || PropertyError::InvalidValue {
            kind: self.code(),
            value: hex_string(bytes),
        };
        Ok(match self {
            Self::Str => PropertyValue::Str(decode_text(bytes).ok_or_else(invalid)?),
            Self::Log => PropertyValue::Log(decode_text(bytes).ok_or_else(invalid)?),
            Self::Dec => PropertyValue::Dec(decode_u32(bytes).ok_or_else(invalid)?),
            Self::Hex => PropertyValue::Hex(decode_u32(bytes).ok_or_else(invalid)?),
            Self::Mac => {
                let arr: [u8; 6] = bytes.try_into().map_err(|_| invalid())?;
                PropertyValue::Mac(arr)
            }
            Self::Cfb => PropertyValue::Cfb(
                cflbinary::parse(bytes).map_err(|_| invalid())?,
            ),
            Self::Bin => PropertyValue::Bin(bytes.to_vec()),
            Self::Bool => match bytes {
                [0] => PropertyValue::Bool(false),
                [1] => PropertyValue::Bool(true),
                _ => return Err(invalid()),
            },
            Self::U8 => {
                let arr: [u8; 1] = bytes.try_into().map_err(|_| invalid())?;
                PropertyValue::U8(arr[0])
            }
            Self::U16 => {
                let arr: [u8; 2] = bytes.try_into().map_err(|_| invalid())?;
                PropertyValue::U16(u16::from_be_bytes(arr))
            }
            Self::U32 => PropertyValue::U32(decode_u32(bytes).ok_or_else(invalid)?),
            Self::U64 => {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| invalid())?;
                PropertyValue::U64(u64::from_be_bytes(arr))
            }
            Self::Ip4 => {
                let arr: [u8; 4] = bytes.try_into().map_err(|_| invalid())?;
                PropertyValue::Ip4(Ipv4Addr::from(arr))
            }
            Self::Ip6 => {
                let arr: [u8; 16] = bytes.try_into().map_err(|_| invalid())?;
                PropertyValue::Ip6(Ipv6Addr::from(arr))
            }
            Self::Bpl => PropertyValue::Bpl(bytes.to_vec()),
            Self::Uid => {
                let arr: [u8; 16] = bytes.try_into().map_err(|_| invalid())?;
                PropertyValue::Uid(arr)
            }
        })
    }

    /// Coerce a native value into wire bytes.
    pub fn encode(self, value: &PropertyValue) -> Result<Vec<u8>, PropertyError> {
        let invalid = || PropertyError::InvalidValue {
            kind: self.code(),
            value: value.to_string(),
        };
        Ok(match (self, value) {
            (Self::Str, PropertyValue::Str(s)) | (Self::Log, PropertyValue::Log(s)) => {
                s.as_bytes().to_vec()
            }
            (Self::Dec, PropertyValue::Dec(v))
            | (Self::Hex, PropertyValue::Hex(v))
            | (Self::U32, PropertyValue::U32(v)) => v.to_be_bytes().to_vec(),
            (Self::Mac, PropertyValue::Mac(m)) => m.to_vec(),
            (Self::Cfb, PropertyValue::Cfb(v)) => {
                cflbinary::compose(v).map_err(|_| invalid())?
            }
            (Self::Bin, PropertyValue::Bin(b)) | (Self::Bpl, PropertyValue::Bpl(b)) => b.clone(),
            (Self::Bool, PropertyValue::Bool(v)) => vec![u8::from(*v)],
            (Self::U8, PropertyValue::U8(v)) => vec![*v],
            (Self::U16, PropertyValue::U16(v)) => v.to_be_bytes().to_vec(),
            (Self::U64, PropertyValue::U64(v)) => v.to_be_bytes().to_vec(),
            (Self::Ip4, PropertyValue::Ip4(a)) => a.octets().to_vec(),
            (Self::Ip6, PropertyValue::Ip6(a)) => a.octets().to_vec(),
            (Self::Uid, PropertyValue::Uid(u)) => u.to_vec(),
            _ => return Err(invalid()),
        })
    }
}

/// A decoded native value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Str(String),
    Dec(u32),
    Hex(u32),
    Log(String),
    Mac([u8; 6]),
    Cfb(Value),
    Bin(Vec<u8>),
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Ip4(Ipv4Addr),
    Ip6(Ipv6Addr),
    Bpl(Vec<u8>),
    Uid([u8; 16]),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) | Self::Log(s) => f.write_str(s),
            Self::Dec(v) => write!(f, "{v}"),
            Self::Hex(v) => write!(f, "{v:#x}"),
            Self::Mac(m) => write!(
                f,
                "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
                m[0], m[1], m[2], m[3], m[4], m[5]
            ),
            Self::Cfb(v) => write!(f, "{v:?}"),
            Self::Bin(b) | Self::Bpl(b) => f.write_str(&hex_string(b)),
            Self::Bool(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::Ip4(a) => write!(f, "{a}"),
            Self::Ip6(a) => write!(f, "{a}"),
            Self::Uid(u) => f.write_str(&hex_string(u)),
        }
    }
}

fn decode_text(bytes: &[u8]) -> Option<String> {
    let trimmed = match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    };
    std::str::from_utf8(trimmed).ok().map(str::to_string)
}

fn decode_u32(bytes: &[u8]) -> Option<u32> {
    let arr: [u8; 4] = bytes.try_into().ok()?;
    Some(u32::from_be_bytes(arr))
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Catalogue entry for a well-known property.
pub struct PropertyInfo {
    pub name: &'static str,
    pub kind: ValueKind,
    pub description: &'static str,
    pub validator: Option<fn(&PropertyValue) -> bool>,
}

fn validate_channel(value: &PropertyValue) -> bool {
    matches!(value, PropertyValue::U8(c) if (1..=165).contains(c))
}

fn validate_reboot(value: &PropertyValue) -> bool {
    matches!(value, PropertyValue::Bin(b) if b.iter().all(|&x| x == 0))
}

/// Well-known property names.
///
/// Representative rather than exhaustive; the station accepts names this
/// table does not list, which coerce as opaque binary.
pub static REGISTRY: &[PropertyInfo] = &[
    PropertyInfo {
        name: "acRB",
        kind: ValueKind::Bin,
        description: "Reboot the base station",
        validator: Some(validate_reboot),
    },
    PropertyInfo {
        name: "beIn",
        kind: ValueKind::U16,
        description: "Beacon interval",
        validator: None,
    },
    PropertyInfo {
        name: "byTX",
        kind: ValueKind::U64,
        description: "Bytes transmitted since boot",
        validator: None,
    },
    PropertyInfo {
        name: "dbug",
        kind: ValueKind::Hex,
        description: "Debug output bitmask",
        validator: None,
    },
    PropertyInfo {
        name: "ip6A",
        kind: ValueKind::Ip6,
        description: "IPv6 address",
        validator: None,
    },
    PropertyInfo {
        name: "laIP",
        kind: ValueKind::Ip4,
        description: "LAN IPv4 address",
        validator: None,
    },
    PropertyInfo {
        name: "laMC",
        kind: ValueKind::Mac,
        description: "LAN interface MAC address",
        validator: None,
    },
    PropertyInfo {
        name: "leTO",
        kind: ValueKind::U32,
        description: "DHCP lease timeout",
        validator: None,
    },
    PropertyInfo {
        name: "logm",
        kind: ValueKind::Log,
        description: "System log buffer",
        validator: None,
    },
    PropertyInfo {
        name: "prof",
        kind: ValueKind::Bpl,
        description: "Configuration profile",
        validator: None,
    },
    PropertyInfo {
        name: "raCh",
        kind: ValueKind::U8,
        description: "Radio channel",
        validator: Some(validate_channel),
    },
    PropertyInfo {
        name: "raEn",
        kind: ValueKind::Bool,
        description: "Radio enabled",
        validator: None,
    },
    PropertyInfo {
        name: "stat",
        kind: ValueKind::Cfb,
        description: "Station status dictionary",
        validator: None,
    },
    PropertyInfo {
        name: "syID",
        kind: ValueKind::Uid,
        description: "Station UUID",
        validator: None,
    },
    PropertyInfo {
        name: "syNm",
        kind: ValueKind::Str,
        description: "Station name",
        validator: None,
    },
    PropertyInfo {
        name: "syVs",
        kind: ValueKind::Str,
        description: "Firmware version string",
        validator: None,
    },
    PropertyInfo {
        name: "upTi",
        kind: ValueKind::Dec,
        description: "Uptime in seconds",
        validator: None,
    },
    PropertyInfo {
        name: "waIP",
        kind: ValueKind::Ip4,
        description: "WAN IPv4 address",
        validator: None,
    },
    PropertyInfo {
        name: "waMC",
        kind: ValueKind::Mac,
        description: "WAN interface MAC address",
        validator: None,
    },
];

/// Look up a property by name.
pub fn lookup(name: &PropName) -> Option<&'static PropertyInfo> {
    REGISTRY
        .iter()
        .find(|info| info.name.as_bytes() == name.0.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod names {
        use super::*;

        #[test]
        fn four_ascii_bytes_parse() {
            let name: PropName = "dbug".parse().unwrap();
            assert_eq!(&name.as_bytes(), b"dbug");
            assert_eq!(name.to_string(), "dbug");
        }

        #[test]
        fn wrong_length_is_rejected() {
            assert!("dbu".parse::<PropName>().is_err());
            assert!("debug".parse::<PropName>().is_err());
        }

        #[test]
        fn non_ascii_is_rejected() {
            assert!("dbü".parse::<PropName>().is_err());
        }
    }

    mod registry {
        use super::*;

        #[test]
        fn known_names_resolve() {
            let name: PropName = "dbug".parse().unwrap();
            let info = lookup(&name).unwrap();
            assert_eq!(info.kind, ValueKind::Hex);
        }

        #[test]
        fn unknown_names_do_not_resolve() {
            let name: PropName = "zzzz".parse().unwrap();
            assert!(lookup(&name).is_none());
        }

        #[test]
        fn registry_names_are_unique_and_well_formed() {
            for (i, info) in REGISTRY.iter().enumerate() {
                assert_eq!(info.name.len(), 4, "{}", info.name);
                assert!(
                    REGISTRY[i + 1..].iter().all(|o| o.name != info.name),
                    "duplicate {}",
                    info.name
                );
            }
        }

        #[test]
        fn validators_accept_and_reject() {
            let channel = lookup(&"raCh".parse().unwrap()).unwrap();
            let validate = channel.validator.unwrap();
            assert!(validate(&PropertyValue::U8(36)));
            assert!(!validate(&PropertyValue::U8(0)));

            let reboot = lookup(&"acRB".parse().unwrap()).unwrap();
            let validate = reboot.validator.unwrap();
            assert!(validate(&PropertyValue::Bin(vec![0u8; 4])));
            assert!(!validate(&PropertyValue::Bin(vec![1u8; 4])));
        }
    }

    mod coercion {
        use super::*;

        #[test]
        fn hex_decodes_reference_value() {
            let value = ValueKind::Hex.decode(&0x3000u32.to_be_bytes()).unwrap();
            assert_eq!(value, PropertyValue::Hex(0x3000));
            assert_eq!(value.to_string(), "0x3000");
        }

        #[test]
        fn fixed_width_integers_roundtrip() {
            for (kind, value) in [
                (ValueKind::U8, PropertyValue::U8(7)),
                (ValueKind::U16, PropertyValue::U16(0x0102)),
                (ValueKind::U32, PropertyValue::U32(0xdeadbeef)),
                (ValueKind::U64, PropertyValue::U64(0x0102030405060708)),
            ] {
                let bytes = kind.encode(&value).unwrap();
                assert_eq!(kind.decode(&bytes).unwrap(), value);
            }
        }

        #[test]
        fn bool_rejects_wide_values() {
            assert!(ValueKind::Bool.decode(&[2]).is_err());
            assert!(ValueKind::Bool.decode(&[0, 0]).is_err());
            assert_eq!(
                ValueKind::Bool.decode(&[1]).unwrap(),
                PropertyValue::Bool(true)
            );
        }

        #[test]
        fn mac_formats_with_colons() {
            let value = ValueKind::Mac
                .decode(&[0x00, 0x1c, 0xb3, 0x01, 0x02, 0x03])
                .unwrap();
            assert_eq!(value.to_string(), "00:1c:b3:01:02:03");
        }

        #[test]
        fn str_stops_at_nul() {
            let value = ValueKind::Str.decode(b"Base Station\0\0\0").unwrap();
            assert_eq!(value, PropertyValue::Str("Base Station".into()));
        }

        #[test]
        fn ip4_and_ip6_roundtrip() {
            let ip4 = PropertyValue::Ip4(Ipv4Addr::new(10, 0, 1, 1));
            let bytes = ValueKind::Ip4.encode(&ip4).unwrap();
            assert_eq!(ValueKind::Ip4.decode(&bytes).unwrap(), ip4);

            let ip6 = PropertyValue::Ip6(Ipv6Addr::LOCALHOST);
            let bytes = ValueKind::Ip6.encode(&ip6).unwrap();
            assert_eq!(ValueKind::Ip6.decode(&bytes).unwrap(), ip6);
        }

        #[test]
        fn cfb_values_nest_the_plist_codec() {
            let dict = Value::dict([("ok", 1u64)]);
            let bytes = ValueKind::Cfb.encode(&PropertyValue::Cfb(dict.clone())).unwrap();
            assert_eq!(
                ValueKind::Cfb.decode(&bytes).unwrap(),
                PropertyValue::Cfb(dict)
            );
        }

        #[test]
        fn mismatched_native_type_is_rejected() {
            let err = ValueKind::Mac.encode(&PropertyValue::U8(1));
            assert!(matches!(err, Err(PropertyError::InvalidValue { .. })));
        }

        #[test]
        fn wrong_width_is_rejected() {
            assert!(ValueKind::Mac.decode(&[0u8; 4]).is_err());
            assert!(ValueKind::U32.decode(&[0u8; 3]).is_err());
            assert!(ValueKind::Uid.decode(&[0u8; 15]).is_err());
        }

        #[test]
        fn unknown_property_decodes_as_binary() {
            let prop = Property::new("zzzz".parse().unwrap(), vec![1, 2, 3]);
            assert_eq!(prop.decode().unwrap(), PropertyValue::Bin(vec![1, 2, 3]));
        }
    }
}
