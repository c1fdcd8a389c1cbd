//! A discovered GATT characteristic: its declaration (value handle,
//! UUID, properties) and the descriptor handles discovered beneath it.
//!
//! Grounded on `bluez-async/src/characteristic.rs`'s `CharacteristicFlags`
//! bitflags, renamed to spec.md's `CharacteristicProperties` terminology
//! and re-keyed to the Bluetooth Core Spec's characteristic properties
//! octet (GATT characteristic declaration, Core Spec Vol 3 Part G §3.3.1.1)
//! instead of BlueZ's `org.bluez.GattCharacteristic1.Flags` string list.

use bitflags::bitflags;

use crate::gatt::descriptor::DescriptorInfo;
use crate::uuid::Uuid;

bitflags! {
    /// The characteristic properties octet carried in a characteristic
    /// declaration (`att::pdu::CharacteristicDeclEntry::properties`).
    pub struct CharacteristicProperties: u8 {
        const BROADCAST = 0x01;
        const READ = 0x02;
        const WRITE_WITHOUT_RESPONSE = 0x04;
        const WRITE = 0x08;
        const NOTIFY = 0x10;
        const INDICATE = 0x20;
        const SIGNED_WRITE = 0x40;
        const EXTENDED_PROPERTIES = 0x80;
    }
}

/// One characteristic, as discovered by `read-by-type-req` against a
/// service's handle range, plus whatever descriptors were subsequently
/// discovered between its value handle and the next characteristic (or
/// the end of the service).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CharacteristicInfo {
    pub declaration_handle: u16,
    pub value_handle: u16,
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
    pub descriptors: Vec<DescriptorInfo>,
}

impl CharacteristicInfo {
    /// The descriptor handle for the Client Characteristic Configuration
    /// Descriptor, if this characteristic advertises one (required for
    /// `notify`/`indicate` to be usable).
    pub fn cccd_handle(&self) -> Option<u16> {
        self.descriptors
            .iter()
            .find(|d| d.uuid == crate::att::pdu::CLIENT_CHARACTERISTIC_CONFIGURATION_UUID)
            .map(|d| d.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cccd_handle_found_among_descriptors() {
        let info = CharacteristicInfo {
            declaration_handle: 0x10,
            value_handle: 0x11,
            uuid: Uuid::U16(0x2a19),
            properties: CharacteristicProperties::NOTIFY,
            descriptors: vec![DescriptorInfo {
                handle: 0x12,
                uuid: crate::att::pdu::CLIENT_CHARACTERISTIC_CONFIGURATION_UUID,
                value: vec![0x00, 0x00],
            }],
        };
        assert_eq!(info.cccd_handle(), Some(0x12));
    }

    #[test]
    fn cccd_handle_absent_when_no_descriptors() {
        let info = CharacteristicInfo {
            declaration_handle: 0x10,
            value_handle: 0x11,
            uuid: Uuid::U16(0x2a19),
            properties: CharacteristicProperties::READ,
            descriptors: vec![],
        };
        assert_eq!(info.cccd_handle(), None);
    }
}
