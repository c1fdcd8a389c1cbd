use std::convert::TryInto;
use std::fmt::{self, Debug, Display, Formatter, LowerHex, UpperHex};
use std::str::FromStr;
use thiserror::Error;

/// An error parsing a Bluetooth device address from a string.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("invalid device address '{0}'")]
pub struct ParseAddressError(String);

/// A 6-octet Bluetooth device address (`EUI48`).
///
/// Equality and ordering are by byte value; the address is immutable once
/// constructed. The wire representation (as used in HCI and management
/// socket frames) is little-endian, i.e. the least-significant octet comes
/// first on the wire, but [`Display`]/[`UpperHex`] print it in the
/// conventional big-endian colon-separated form.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Address([u8; 6]);

impl Address {
    pub const ANY: Address = Address([0; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        Address(bytes)
    }

    pub const fn any() -> Self {
        Self::ANY
    }

    pub fn bytes(&self) -> [u8; 6] {
        self.0
    }

    /// Parses the address from its little-endian wire representation, as
    /// found embedded in HCI and management socket frames.
    pub fn from_le_bytes(bytes: [u8; 6]) -> Self {
        let mut be = bytes;
        be.reverse();
        Address(be)
    }

    /// Serializes the address to its little-endian wire representation.
    pub fn to_le_bytes(self) -> [u8; 6] {
        let mut le = self.0;
        le.reverse();
        le
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        UpperHex::fmt(self, f)
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        UpperHex::fmt(self, f)
    }
}

impl UpperHex for Address {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl LowerHex for Address {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: Vec<u8> = s
            .split(':')
            .map(|octet| {
                if octet.len() != 2 {
                    Err(ParseAddressError(s.to_string()))
                } else {
                    u8::from_str_radix(octet, 16).map_err(|_| ParseAddressError(s.to_string()))
                }
            })
            .collect::<Result<Vec<u8>, _>>()?;
        let array: [u8; 6] = bytes
            .try_into()
            .map_err(|_| ParseAddressError(s.to_string()))?;
        Ok(Address(array))
    }
}

/// The type of a Bluetooth LE device address, as reported alongside
/// advertising events and connection events.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum AddressType {
    /// A classic Bluetooth (BR/EDR) address.
    BrEdr,
    /// A public (IEEE-assigned) LE address.
    LePublic,
    /// A private/random LE address.
    LeRandom,
}

impl AddressType {
    pub(crate) fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Self::BrEdr),
            0x01 => Some(Self::LePublic),
            0x02 => Some(Self::LeRandom),
            _ => None,
        }
    }

    pub(crate) fn to_byte(self) -> u8 {
        match self {
            Self::BrEdr => 0x00,
            Self::LePublic => 0x01,
            Self::LeRandom => 0x02,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::BrEdr => "br/edr",
            Self::LePublic => "public",
            Self::LeRandom => "random",
        }
    }
}

impl Display for AddressType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let addr: Address = "00:11:22:33:44:55".parse().unwrap();
        assert_eq!(addr.to_string(), "00:11:22:33:44:55");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!("00:11:22".parse::<Address>().is_err());
        assert!("gg:11:22:33:44:55".parse::<Address>().is_err());
    }

    #[test]
    fn le_wire_round_trip() {
        let addr: Address = "00:11:22:33:44:55".parse().unwrap();
        let le = addr.to_le_bytes();
        assert_eq!(le, [0x55, 0x44, 0x33, 0x22, 0x11, 0x00]);
        assert_eq!(Address::from_le_bytes(le), addr);
    }

    #[test]
    fn ordering_is_byte_value() {
        let a: Address = "00:00:00:00:00:01".parse().unwrap();
        let b: Address = "00:00:00:00:00:02".parse().unwrap();
        assert!(a < b);
    }

    #[test]
    fn address_type_round_trip() {
        for ty in [AddressType::BrEdr, AddressType::LePublic, AddressType::LeRandom] {
            assert_eq!(AddressType::from_byte(ty.to_byte()), Some(ty));
        }
        assert_eq!(AddressType::from_byte(0xff), None);
    }
}
