//! A discovered GATT characteristic descriptor.
//!
//! Grounded on `bluez-async/src/descriptor.rs`'s `DescriptorInfo` shape,
//! addressed here by attribute handle instead of a D-Bus object path.

use crate::uuid::Uuid;

/// One descriptor, as discovered by `find-information-req` and read once
/// via `read-req` at discovery time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DescriptorInfo {
    pub handle: u16,
    pub uuid: Uuid,
    /// The value as read during discovery. Not kept in sync afterward;
    /// re-read through the owning [`crate::gatt::GattClient`] for a fresh
    /// value.
    pub value: Vec<u8>,
}
