//! Bounds-checked, endian-aware byte buffers.
//!
//! `direct_bt`'s wire formats interleave little-endian integers (the vast
//! majority of HCI/ATT/management fields) with the occasional big-endian
//! field, inside records whose length is only known at parse time. Centralizing
//! every read/write behind [`POctets`]/[`TOctetSlice`] means a malformed
//! packet produces an [`Error::IndexOutOfBounds`] instead of an out-of-bounds
//! slice panic.

use crate::error::Error;
use crate::uuid::{Endian, Uuid};

/// An owned, growable byte buffer with a logical size distinct from its
/// capacity. `append` may grow `size` up to `capacity` but never
/// reallocates past it — callers that need more room construct a new,
/// larger `POctets` (mirroring the fixed-capacity packet buffers the
/// original stack pools per connection).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct POctets {
    data: Vec<u8>,
    size: usize,
}

impl POctets {
    /// Creates an empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        POctets {
            data: vec![0u8; capacity],
            size: 0,
        }
    }

    /// Wraps an existing byte vector, whose full length becomes both the
    /// capacity and the initial size.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let size = data.len();
        POctets { data, size }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.size]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.size]
    }

    pub fn view(&self) -> TOctetSlice<'_> {
        TOctetSlice {
            data: &self.data[..self.size],
        }
    }

    fn check_bounds(&self, offset: usize, width: usize) -> crate::Result<()> {
        if offset + width > self.size {
            return Err(Error::IndexOutOfBounds {
                offset,
                width,
                size: self.size,
            });
        }
        Ok(())
    }

    fn check_write_bounds(&self, offset: usize, width: usize) -> crate::Result<()> {
        if offset + width > self.data.len() {
            return Err(Error::IndexOutOfBounds {
                offset,
                width,
                size: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn get_u8(&self, offset: usize) -> crate::Result<u8> {
        self.check_bounds(offset, 1)?;
        Ok(self.data[offset])
    }

    pub fn get_i8(&self, offset: usize) -> crate::Result<i8> {
        Ok(self.get_u8(offset)? as i8)
    }

    pub fn get_u16_le(&self, offset: usize) -> crate::Result<u16> {
        self.check_bounds(offset, 2)?;
        Ok(u16::from_le_bytes(self.data[offset..offset + 2].try_into().unwrap()))
    }

    pub fn get_u16_be(&self, offset: usize) -> crate::Result<u16> {
        self.check_bounds(offset, 2)?;
        Ok(u16::from_be_bytes(self.data[offset..offset + 2].try_into().unwrap()))
    }

    pub fn get_i16_le(&self, offset: usize) -> crate::Result<i16> {
        Ok(self.get_u16_le(offset)? as i16)
    }

    pub fn get_u32_le(&self, offset: usize) -> crate::Result<u32> {
        self.check_bounds(offset, 4)?;
        Ok(u32::from_le_bytes(self.data[offset..offset + 4].try_into().unwrap()))
    }

    pub fn get_u32_be(&self, offset: usize) -> crate::Result<u32> {
        self.check_bounds(offset, 4)?;
        Ok(u32::from_be_bytes(self.data[offset..offset + 4].try_into().unwrap()))
    }

    pub fn get_u128_le(&self, offset: usize) -> crate::Result<u128> {
        self.check_bounds(offset, 16)?;
        Ok(u128::from_le_bytes(self.data[offset..offset + 16].try_into().unwrap()))
    }

    /// Reads a UUID of the given wire width at `offset`. 16- and 32-bit
    /// forms are little-endian on the wire; the 128-bit form is read as
    /// 16 raw bytes in the order they appear (no byte-swap), matching how
    /// ATT PDUs carry 128-bit UUIDs.
    pub fn get_uuid(&self, offset: usize, width: UuidWidth) -> crate::Result<Uuid> {
        match width {
            UuidWidth::U16 => Ok(Uuid::U16(self.get_u16_le(offset)?)),
            UuidWidth::U32 => Ok(Uuid::U32(self.get_u32_le(offset)?)),
            UuidWidth::U128 => {
                self.check_bounds(offset, 16)?;
                let mut bytes = [0u8; 16];
                bytes.copy_from_slice(&self.data[offset..offset + 16]);
                Ok(Uuid::U128(bytes))
            }
        }
    }

    pub fn put_u8(&mut self, offset: usize, value: u8) -> crate::Result<()> {
        self.check_write_bounds(offset, 1)?;
        self.data[offset] = value;
        self.size = self.size.max(offset + 1);
        Ok(())
    }

    pub fn put_u16_le(&mut self, offset: usize, value: u16) -> crate::Result<()> {
        self.check_write_bounds(offset, 2)?;
        self.data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        self.size = self.size.max(offset + 2);
        Ok(())
    }

    pub fn put_u16_be(&mut self, offset: usize, value: u16) -> crate::Result<()> {
        self.check_write_bounds(offset, 2)?;
        self.data[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
        self.size = self.size.max(offset + 2);
        Ok(())
    }

    pub fn put_u32_le(&mut self, offset: usize, value: u32) -> crate::Result<()> {
        self.check_write_bounds(offset, 4)?;
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        self.size = self.size.max(offset + 4);
        Ok(())
    }

    pub fn put_u128_le(&mut self, offset: usize, value: u128) -> crate::Result<()> {
        self.check_write_bounds(offset, 16)?;
        self.data[offset..offset + 16].copy_from_slice(&value.to_le_bytes());
        self.size = self.size.max(offset + 16);
        Ok(())
    }

    pub fn put_uuid(&mut self, offset: usize, uuid: Uuid) -> crate::Result<()> {
        match uuid {
            Uuid::U16(v) => self.put_u16_le(offset, v),
            Uuid::U32(v) => self.put_u32_le(offset, v),
            Uuid::U128(bytes) => {
                self.check_write_bounds(offset, 16)?;
                self.data[offset..offset + 16].copy_from_slice(&bytes);
                self.size = self.size.max(offset + 16);
                Ok(())
            }
        }
    }

    /// Appends `slice` after the current logical end, growing `size` up to
    /// `capacity`. Fails with [`Error::IndexOutOfBounds`] if it would
    /// overflow capacity.
    pub fn append(&mut self, slice: &[u8]) -> crate::Result<()> {
        self.check_write_bounds(self.size, slice.len())?;
        let start = self.size;
        self.data[start..start + slice.len()].copy_from_slice(slice);
        self.size += slice.len();
        Ok(())
    }

    /// Copies `base`, then splices a 16-bit UUID into it at `octet_index`
    /// so that the abstract 128-bit value is `base` with `uuid16` at the
    /// chosen position. `octet_index` must be in `0..=14`.
    pub fn merge_uuid16_into_base(
        base: &[u8; 16],
        uuid16: u16,
        octet_index: usize,
        endian: Endian,
    ) -> crate::Result<[u8; 16]> {
        crate::uuid::merge_u16_into_base(base, uuid16, octet_index, endian)
    }

    /// As [`POctets::merge_uuid16_into_base`] but for a 32-bit UUID;
    /// `octet_index` must be in `0..=12`.
    pub fn merge_uuid32_into_base(
        base: &[u8; 16],
        uuid32: u32,
        octet_index: usize,
        endian: Endian,
    ) -> crate::Result<[u8; 16]> {
        crate::uuid::merge_u32_into_base(base, uuid32, octet_index, endian)
    }
}

/// The wire width of a UUID field being read or written.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UuidWidth {
    U16,
    U32,
    U128,
}

impl UuidWidth {
    pub fn byte_len(self) -> usize {
        match self {
            UuidWidth::U16 => 2,
            UuidWidth::U32 => 4,
            UuidWidth::U128 => 16,
        }
    }
}

/// A read-only view over a slice of an existing buffer. Borrows the
/// underlying storage and cannot outlive it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TOctetSlice<'a> {
    data: &'a [u8],
}

impl<'a> TOctetSlice<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        TOctetSlice { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    pub fn slice(&self, offset: usize, len: usize) -> crate::Result<TOctetSlice<'a>> {
        if offset + len > self.data.len() {
            return Err(Error::IndexOutOfBounds {
                offset,
                width: len,
                size: self.data.len(),
            });
        }
        Ok(TOctetSlice {
            data: &self.data[offset..offset + len],
        })
    }

    pub fn get_u8(&self, offset: usize) -> crate::Result<u8> {
        self.check_bounds(offset, 1)?;
        Ok(self.data[offset])
    }

    pub fn get_u16_le(&self, offset: usize) -> crate::Result<u16> {
        self.check_bounds(offset, 2)?;
        Ok(u16::from_le_bytes(self.data[offset..offset + 2].try_into().unwrap()))
    }

    pub fn get_u32_le(&self, offset: usize) -> crate::Result<u32> {
        self.check_bounds(offset, 4)?;
        Ok(u32::from_le_bytes(self.data[offset..offset + 4].try_into().unwrap()))
    }

    fn check_bounds(&self, offset: usize, width: usize) -> crate::Result<()> {
        if offset + width > self.data.len() {
            return Err(Error::IndexOutOfBounds {
                offset,
                width,
                size: self.data.len(),
            });
        }
        Ok(())
    }
}

impl<'a> From<&'a [u8]> for TOctetSlice<'a> {
    fn from(data: &'a [u8]) -> Self {
        TOctetSlice::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_round_trip_u8_u16_u32_u128() {
        let mut buf = POctets::with_capacity(32);
        buf.put_u8(0, 0x42).unwrap();
        buf.put_u16_le(1, 0xBEEF).unwrap();
        buf.put_u32_le(3, 0xDEADBEEF).unwrap();
        buf.put_u128_le(7, 0x0102030405060708090A0B0C0D0E0F10).unwrap();

        assert_eq!(buf.get_u8(0).unwrap(), 0x42);
        assert_eq!(buf.get_u16_le(1).unwrap(), 0xBEEF);
        assert_eq!(buf.get_u32_le(3).unwrap(), 0xDEADBEEF);
        assert_eq!(
            buf.get_u128_le(7).unwrap(),
            0x0102030405060708090A0B0C0D0E0F10
        );
    }

    #[test]
    fn big_endian_variant() {
        let mut buf = POctets::with_capacity(4);
        buf.put_u16_be(0, 0x1234).unwrap();
        assert_eq!(buf.get_u16_be(0).unwrap(), 0x1234);
        assert_eq!(buf.as_slice(), &[0x12, 0x34]);
    }

    #[test]
    fn out_of_bounds_read_and_write_fail() {
        let buf = POctets::with_capacity(2);
        assert!(matches!(
            buf.get_u8(0),
            Err(Error::IndexOutOfBounds { .. })
        ));

        let mut full = POctets::with_capacity(1);
        full.put_u8(0, 1).unwrap();
        assert!(matches!(
            full.put_u16_le(0, 1),
            Err(Error::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn append_grows_size_but_not_past_capacity() {
        let mut buf = POctets::with_capacity(3);
        buf.append(&[1, 2]).unwrap();
        assert_eq!(buf.size(), 2);
        assert!(buf.append(&[3, 4]).is_err());
        buf.append(&[3]).unwrap();
        assert_eq!(buf.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn view_cannot_outlive_buffer_is_enforced_by_borrow_checker() {
        let buf = POctets::from_vec(vec![1, 2, 3, 4]);
        let view = buf.view();
        assert_eq!(view.get_u16_le(0).unwrap(), 0x0201);
    }

    #[test]
    fn slice_view_bounds_check() {
        let data = [1u8, 2, 3, 4, 5];
        let view = TOctetSlice::new(&data);
        let sub = view.slice(1, 3).unwrap();
        assert_eq!(sub.as_bytes(), &[2, 3, 4]);
        assert!(view.slice(3, 3).is_err());
    }

    #[test]
    fn merge_uuid16_into_base_matches_expected_octet() {
        let base = crate::uuid::BLUETOOTH_BASE_UUID;
        let merged = POctets::merge_uuid16_into_base(&base, 0x1800, 12, Endian::Little).unwrap();
        assert_eq!(&merged[12..14], &0x1800u16.to_le_bytes());
    }

    #[test]
    fn merge_uuid16_rejects_bad_index() {
        let base = crate::uuid::BLUETOOTH_BASE_UUID;
        assert!(POctets::merge_uuid16_into_base(&base, 0x1800, 15, Endian::Little).is_err());
    }
}
