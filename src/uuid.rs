//! Bluetooth UUIDs: the 16-/32-/128-bit tagged union spec.md calls for, plus
//! the merge-into-base-UUID helpers used to promote a 16- or 32-bit
//! shorthand to its full 128-bit form.
//!
//! This is deliberately its own type rather than a bare [`uuid::Uuid`]:
//! spec.md requires that a 16-bit UUID and its expanded 128-bit form compare
//! unequal (they are different wire representations of related but
//! distinct identities until explicitly merged), which the `uuid` crate's
//! flat 128-bit representation cannot express. [`Uuid::to_uuid128`]
//! converts to the `uuid` crate's type for interop with the rest of the
//! ecosystem (e.g. the registry in `registry.rs`, which follows
//! `bluez-async`'s convention of keying known services/characteristics by
//! `uuid::Uuid`).

use std::fmt::{self, Display, Formatter};

/// The Bluetooth SIG base UUID, `00000000-0000-1000-8000-00805F9B34FB`, used
/// to promote 16- and 32-bit UUIDs to their full 128-bit form.
pub const BLUETOOTH_BASE_UUID: [u8; 16] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0x80, 0x5f, 0x9b, 0x34, 0xfb,
];

/// The little-endian byte offset within [`BLUETOOTH_BASE_UUID`] at which a
/// 16-bit UUID's two octets are conventionally spliced in (bytes 12 and 13
/// of the canonical big-endian UUID layout, counting from 0).
pub const DEFAULT_UUID16_OCTET_INDEX: usize = 12;
/// The analogous default splice offset for a 32-bit UUID (bytes 12..16).
pub const DEFAULT_UUID32_OCTET_INDEX: usize = 12;

/// A Bluetooth UUID in one of its three wire widths.
///
/// Equality is strict per variant: `Uuid::U16(0x1800)` and the 128-bit UUID
/// it expands to via the base UUID are **not** equal, matching spec.md's
/// data model.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub enum Uuid {
    U16(u16),
    U32(u32),
    U128([u8; 16]),
}

impl Uuid {
    /// Expands this UUID to its full 128-bit form using the Bluetooth base
    /// UUID, merging at the conventional octet index. A 128-bit UUID is
    /// returned unchanged.
    pub fn to_u128_bytes(self) -> [u8; 16] {
        match self {
            Uuid::U16(v) => merge_u16_into_base(
                &BLUETOOTH_BASE_UUID,
                v,
                DEFAULT_UUID16_OCTET_INDEX,
                Endian::Little,
            )
            .expect("default octet index is always in range"),
            Uuid::U32(v) => merge_u32_into_base(
                &BLUETOOTH_BASE_UUID,
                v,
                DEFAULT_UUID32_OCTET_INDEX,
                Endian::Little,
            )
            .expect("default octet index is always in range"),
            Uuid::U128(bytes) => bytes,
        }
    }

    /// Converts to the `uuid` crate's flat 128-bit representation, for
    /// interop with the rest of the ecosystem (e.g. [`crate::registry`]).
    pub fn to_uuid128(self) -> uuid::Uuid {
        uuid::Uuid::from_bytes(self.to_u128_bytes())
    }

    /// Attempts to narrow a 128-bit UUID back to 16- or 32-bit shorthand if
    /// it was derived from the Bluetooth base UUID at the default splice
    /// point. Returns the UUID unchanged (as `U128`) if it wasn't.
    pub fn shorten(bytes: [u8; 16]) -> Uuid {
        let mut without_u32 = bytes;
        without_u32[12..16].copy_from_slice(&BLUETOOTH_BASE_UUID[12..16]);
        if without_u32 == BLUETOOTH_BASE_UUID {
            let v = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
            if let Ok(v16) = u16::try_from(v) {
                return Uuid::U16(v16);
            }
            return Uuid::U32(v);
        }
        Uuid::U128(bytes)
    }
}

impl Display for Uuid {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Uuid::U16(v) => write!(f, "{:04x}", v),
            Uuid::U32(v) => write!(f, "{:08x}", v),
            Uuid::U128(_) => write!(f, "{}", self.to_uuid128()),
        }
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Uuid::U16(v) => write!(f, "Uuid::U16({:#06x})", v),
            Uuid::U32(v) => write!(f, "Uuid::U32({:#010x})", v),
            Uuid::U128(_) => write!(f, "Uuid::U128({})", self.to_uuid128()),
        }
    }
}

impl From<u16> for Uuid {
    fn from(v: u16) -> Self {
        Uuid::U16(v)
    }
}

impl From<u32> for Uuid {
    fn from(v: u32) -> Self {
        Uuid::U32(v)
    }
}

/// Byte order used when splicing a 16-/32-bit UUID into the base UUID.
/// The Bluetooth-defined wire layout is little-endian; a big-endian variant
/// is offered for the handful of BT-defined transports (e.g. some L2CAP
/// signalling fields) which are big-endian by specification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Endian {
    Little,
    Big,
}

/// Merges a 16-bit UUID into a copy of `base` at `octet_index`, returning
/// the resulting 128-bit value. Valid `octet_index` is `0..=14`; an
/// out-of-range index is a programmer error reported as
/// [`crate::Error::InvalidArgument`].
pub fn merge_u16_into_base(
    base: &[u8; 16],
    value: u16,
    octet_index: usize,
    endian: Endian,
) -> crate::Result<[u8; 16]> {
    if octet_index > 14 {
        return Err(crate::Error::InvalidArgument(format!(
            "uuid16 octet index {} out of range 0..=14",
            octet_index
        )));
    }
    let mut merged = *base;
    let bytes = match endian {
        Endian::Little => value.to_le_bytes(),
        Endian::Big => value.to_be_bytes(),
    };
    merged[octet_index..octet_index + 2].copy_from_slice(&bytes);
    Ok(merged)
}

/// As [`merge_u16_into_base`] but for a 32-bit UUID; valid `octet_index` is
/// `0..=12`.
pub fn merge_u32_into_base(
    base: &[u8; 16],
    value: u32,
    octet_index: usize,
    endian: Endian,
) -> crate::Result<[u8; 16]> {
    if octet_index > 12 {
        return Err(crate::Error::InvalidArgument(format!(
            "uuid32 octet index {} out of range 0..=12",
            octet_index
        )));
    }
    let mut merged = *base;
    let bytes = match endian {
        Endian::Little => value.to_le_bytes(),
        Endian::Big => value.to_be_bytes(),
    };
    merged[octet_index..octet_index + 4].copy_from_slice(&bytes);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_merge_matches_bluetooth_base() {
        // Generic Access service, 0x1800, expands to
        // 00001800-0000-1000-8000-00805F9B34FB.
        let uuid = Uuid::U16(0x1800);
        let expected = uuid::Uuid::parse_str("00001800-0000-1000-8000-00805F9B34FB").unwrap();
        assert_eq!(uuid.to_uuid128(), expected);
    }

    #[test]
    fn u16_and_u128_forms_are_not_equal() {
        let short = Uuid::U16(0x1800);
        let long = Uuid::U128(short.to_u128_bytes());
        assert_ne!(short, long);
    }

    #[test]
    fn merge_round_trips_at_every_valid_index() {
        for index in 0..=14 {
            let merged =
                merge_u16_into_base(&BLUETOOTH_BASE_UUID, 0xBEEF, index, Endian::Little).unwrap();
            let read_back = u16::from_le_bytes(merged[index..index + 2].try_into().unwrap());
            assert_eq!(read_back, 0xBEEF);
        }
    }

    #[test]
    fn merge_rejects_out_of_range_index() {
        assert!(merge_u16_into_base(&BLUETOOTH_BASE_UUID, 0, 15, Endian::Little).is_err());
        assert!(merge_u32_into_base(&BLUETOOTH_BASE_UUID, 0, 13, Endian::Little).is_err());
    }

    #[test]
    fn shorten_recovers_u16() {
        let original = Uuid::U16(0x2a37);
        let bytes = original.to_u128_bytes();
        assert_eq!(Uuid::shorten(bytes), original);
    }

    #[test]
    fn shorten_leaves_unrelated_128_bit_uuid_alone() {
        let bytes = *uuid::Uuid::parse_str("6e400001-b5a3-f393-e0a9-e50e24dcca9e")
            .unwrap()
            .as_bytes();
        assert_eq!(Uuid::shorten(bytes), Uuid::U128(bytes));
    }
}
