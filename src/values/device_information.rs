//! The Device Information service's characteristic value layouts
//! (Bluetooth SIG GSS §3.96): mostly UTF-8 strings, plus the fixed-width
//! System ID and PnP ID structures.

/// The System ID characteristic value: an IEEE EUI-64 split into a
/// manufacturer-assigned identifier and an organizationally unique
/// identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SystemId {
    pub manufacturer_identifier: [u8; 5],
    pub organizationally_unique_identifier: [u8; 3],
}

impl SystemId {
    pub fn decode(value: &[u8]) -> Option<SystemId> {
        if value.len() != 8 {
            return None;
        }
        let mut manufacturer_identifier = [0u8; 5];
        manufacturer_identifier.copy_from_slice(&value[0..5]);
        let mut organizationally_unique_identifier = [0u8; 3];
        organizationally_unique_identifier.copy_from_slice(&value[5..8]);
        Some(SystemId {
            manufacturer_identifier,
            organizationally_unique_identifier,
        })
    }
}

/// The PnP ID characteristic value: vendor ID source, vendor ID, product
/// ID, and product version.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PnpId {
    pub vendor_id_source: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub product_version: u16,
}

impl PnpId {
    pub fn decode(value: &[u8]) -> Option<PnpId> {
        if value.len() != 7 {
            return None;
        }
        Some(PnpId {
            vendor_id_source: value[0],
            vendor_id: u16::from_le_bytes([value[1], value[2]]),
            product_id: u16::from_le_bytes([value[3], value[4]]),
            product_version: u16::from_le_bytes([value[5], value[6]]),
        })
    }
}

/// The subset of Device Information characteristics this crate decodes,
/// gathered by whatever characteristics a particular device exposes (none
/// are mandatory).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeviceInformation {
    pub system_id: Option<SystemId>,
    pub model_number: Option<String>,
    pub serial_number: Option<String>,
    pub firmware_revision: Option<String>,
    pub hardware_revision: Option<String>,
    pub software_revision: Option<String>,
    pub manufacturer_name: Option<String>,
    pub regulatory_data: Option<Vec<u8>>,
    pub pnp_id: Option<PnpId>,
}

/// Decodes a UTF-8 string characteristic value, trimming a single
/// trailing NUL if the peer null-terminated it (common but not spec'd).
pub fn decode_string(value: &[u8]) -> String {
    let trimmed = match value.last() {
        Some(0) => &value[..value.len() - 1],
        _ => value,
    };
    String::from_utf8_lossy(trimmed).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_system_id() {
        let value = [0x01, 0x02, 0x03, 0x04, 0x05, 0xaa, 0xbb, 0xcc];
        let id = SystemId::decode(&value).unwrap();
        assert_eq!(id.manufacturer_identifier, [0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(id.organizationally_unique_identifier, [0xaa, 0xbb, 0xcc]);
    }

    #[test]
    fn rejects_wrong_length_system_id() {
        assert_eq!(SystemId::decode(&[0x01, 0x02]), None);
    }

    #[test]
    fn decodes_pnp_id() {
        let value = [0x02, 0x0d, 0x00, 0x10, 0x27, 0x01, 0x00];
        let id = PnpId::decode(&value).unwrap();
        assert_eq!(id.vendor_id_source, 0x02);
        assert_eq!(id.vendor_id, 0x000d);
        assert_eq!(id.product_id, 0x2710);
        assert_eq!(id.product_version, 0x0001);
    }

    #[test]
    fn decode_string_trims_trailing_nul() {
        assert_eq!(decode_string(b"ACME-1000\0"), "ACME-1000");
        assert_eq!(decode_string(b"ACME-1000"), "ACME-1000");
    }
}
