//! Parsing of AD/EIR structures: the length-prefixed TLV records carried in
//! LE advertising reports and extended inquiry responses.
//!
//! Grounded on `original_source/src/direct_bt/HCIHandler.cpp`'s advertising
//! report handling for which AD types matter to a GATT central (flags,
//! local name, manufacturer data, service UUIDs, TX power), and on the
//! hand-rolled endian-parsing idiom in `mijia/src/decode.rs` (`u16::
//! from_le_bytes` rather than a `byteorder` dependency) for the octet
//! slicing style used throughout.

use crate::uuid::Uuid;
use crate::{Error, Result};

/// Bluetooth-assigned AD type codes (Core Specification Supplement, Part
/// A, §1) that this crate interprets; any other type is preserved
/// unparsed as [`AdStructure::Other`].
mod ad_type {
    pub const FLAGS: u8 = 0x01;
    pub const INCOMPLETE_16_BIT_SERVICE_UUIDS: u8 = 0x02;
    pub const COMPLETE_16_BIT_SERVICE_UUIDS: u8 = 0x03;
    pub const INCOMPLETE_128_BIT_SERVICE_UUIDS: u8 = 0x06;
    pub const COMPLETE_128_BIT_SERVICE_UUIDS: u8 = 0x07;
    pub const SHORT_LOCAL_NAME: u8 = 0x08;
    pub const COMPLETE_LOCAL_NAME: u8 = 0x09;
    pub const TX_POWER_LEVEL: u8 = 0x0a;
    pub const MANUFACTURER_SPECIFIC_DATA: u8 = 0xff;
}

/// One parsed AD/EIR structure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AdStructure {
    Flags(u8),
    ServiceUuids16(Vec<Uuid>),
    ServiceUuids128(Vec<Uuid>),
    ShortLocalName(String),
    CompleteLocalName(String),
    TxPowerLevel(i8),
    ManufacturerData { company_id: u16, data: Vec<u8> },
    Other { ad_type: u8, data: Vec<u8> },
}

/// A fully parsed advertising/EIR report: the AD structures it carried,
/// plus derived convenience fields mirroring what an application typically
/// wants without re-scanning the structure list.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EInfoReport {
    pub structures: Vec<AdStructure>,
    pub name: Option<String>,
    pub tx_power: Option<i8>,
    pub service_uuids: Vec<Uuid>,
    pub manufacturer_data: Vec<(u16, Vec<u8>)>,
}

impl EInfoReport {
    /// Parses a contiguous run of length-prefixed AD structures. Each
    /// record is `len(1) | type(1) | data(len-1)`; a zero-length record
    /// terminates parsing (matching how controllers pad advertising data
    /// to a fixed report length).
    pub fn parse(bytes: &[u8]) -> Result<EInfoReport> {
        let mut report = EInfoReport::default();
        let mut offset = 0;
        while offset < bytes.len() {
            let len = bytes[offset] as usize;
            if len == 0 {
                break;
            }
            let record_end = offset + 1 + len;
            if record_end > bytes.len() {
                return Err(Error::ProtocolError {
                    message: "AD structure length exceeds report".into(),
                    opcode: 0,
                    bytes: bytes.to_vec(),
                });
            }
            let ad_type = bytes[offset + 1];
            let data = &bytes[offset + 2..record_end];
            let structure = parse_one(ad_type, data)?;
            report.fold_in(&structure);
            report.structures.push(structure);
            offset = record_end;
        }
        Ok(report)
    }

    fn fold_in(&mut self, structure: &AdStructure) {
        match structure {
            AdStructure::CompleteLocalName(name) => self.name = Some(name.clone()),
            AdStructure::ShortLocalName(name) => {
                if self.name.is_none() {
                    self.name = Some(name.clone());
                }
            }
            AdStructure::TxPowerLevel(power) => self.tx_power = Some(*power),
            AdStructure::ServiceUuids16(uuids) | AdStructure::ServiceUuids128(uuids) => {
                self.service_uuids.extend(uuids.iter().copied());
            }
            AdStructure::ManufacturerData { company_id, data } => {
                self.manufacturer_data.push((*company_id, data.clone()));
            }
            AdStructure::Flags(_) | AdStructure::Other { .. } => {}
        }
    }
}

fn parse_one(ad_type: u8, data: &[u8]) -> Result<AdStructure> {
    Ok(match ad_type {
        ad_type::FLAGS => AdStructure::Flags(*data.first().unwrap_or(&0)),
        ad_type::INCOMPLETE_16_BIT_SERVICE_UUIDS | ad_type::COMPLETE_16_BIT_SERVICE_UUIDS => {
            AdStructure::ServiceUuids16(parse_uuid16_list(data)?)
        }
        ad_type::INCOMPLETE_128_BIT_SERVICE_UUIDS | ad_type::COMPLETE_128_BIT_SERVICE_UUIDS => {
            AdStructure::ServiceUuids128(parse_uuid128_list(data)?)
        }
        ad_type::SHORT_LOCAL_NAME => {
            AdStructure::ShortLocalName(String::from_utf8_lossy(data).into_owned())
        }
        ad_type::COMPLETE_LOCAL_NAME => {
            AdStructure::CompleteLocalName(String::from_utf8_lossy(data).into_owned())
        }
        ad_type::TX_POWER_LEVEL => {
            let power = *data.first().ok_or_else(|| Error::ProtocolError {
                message: "empty TX power level AD structure".into(),
                opcode: 0,
                bytes: data.to_vec(),
            })?;
            AdStructure::TxPowerLevel(power as i8)
        }
        ad_type::MANUFACTURER_SPECIFIC_DATA => {
            if data.len() < 2 {
                return Err(Error::ProtocolError {
                    message: "manufacturer data AD structure shorter than its company id".into(),
                    opcode: 0,
                    bytes: data.to_vec(),
                });
            }
            AdStructure::ManufacturerData {
                company_id: u16::from_le_bytes([data[0], data[1]]),
                data: data[2..].to_vec(),
            }
        }
        other => AdStructure::Other {
            ad_type: other,
            data: data.to_vec(),
        },
    })
}

fn parse_uuid16_list(data: &[u8]) -> Result<Vec<Uuid>> {
    if data.len() % 2 != 0 {
        return Err(Error::ProtocolError {
            message: "16-bit service UUID list has odd length".into(),
            opcode: 0,
            bytes: data.to_vec(),
        });
    }
    Ok(data
        .chunks(2)
        .map(|c| Uuid::U16(u16::from_le_bytes([c[0], c[1]])))
        .collect())
}

fn parse_uuid128_list(data: &[u8]) -> Result<Vec<Uuid>> {
    if data.len() % 16 != 0 {
        return Err(Error::ProtocolError {
            message: "128-bit service UUID list length not a multiple of 16".into(),
            opcode: 0,
            bytes: data.to_vec(),
        });
    }
    Ok(data
        .chunks(16)
        .map(|c| {
            let mut arr = [0u8; 16];
            arr.copy_from_slice(c);
            Uuid::U128(arr)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_and_complete_name() {
        let mut bytes = vec![0x02, ad_type::FLAGS, 0x06];
        let name = b"RuuviTag";
        bytes.push((name.len() + 1) as u8);
        bytes.push(ad_type::COMPLETE_LOCAL_NAME);
        bytes.extend_from_slice(name);

        let report = EInfoReport::parse(&bytes).unwrap();
        assert_eq!(report.name.as_deref(), Some("RuuviTag"));
        assert!(report.structures.contains(&AdStructure::Flags(0x06)));
    }

    #[test]
    fn parses_manufacturer_data_and_short_name_fallback() {
        let mut bytes = vec![];
        let short = b"Ruu";
        bytes.push((short.len() + 1) as u8);
        bytes.push(ad_type::SHORT_LOCAL_NAME);
        bytes.extend_from_slice(short);

        bytes.push(5);
        bytes.push(ad_type::MANUFACTURER_SPECIFIC_DATA);
        bytes.extend_from_slice(&0x0499u16.to_le_bytes());
        bytes.extend_from_slice(&[0xaa, 0xbb]);

        let report = EInfoReport::parse(&bytes).unwrap();
        assert_eq!(report.name.as_deref(), Some("Ruu"));
        assert_eq!(report.manufacturer_data, vec![(0x0499, vec![0xaa, 0xbb])]);
    }

    #[test]
    fn parses_16_bit_service_uuid_list() {
        let mut bytes = vec![5, ad_type::COMPLETE_16_BIT_SERVICE_UUIDS];
        bytes.extend_from_slice(&0x1800u16.to_le_bytes());
        bytes.extend_from_slice(&0x180fu16.to_le_bytes());

        let report = EInfoReport::parse(&bytes).unwrap();
        assert_eq!(
            report.service_uuids,
            vec![Uuid::U16(0x1800), Uuid::U16(0x180f)]
        );
    }

    #[test]
    fn zero_length_record_terminates_parsing() {
        let bytes = vec![0x00, 0xff, 0xff, 0xff];
        let report = EInfoReport::parse(&bytes).unwrap();
        assert!(report.structures.is_empty());
    }

    #[test]
    fn truncated_record_is_protocol_error() {
        let bytes = vec![0x05, ad_type::FLAGS, 0x01];
        assert!(EInfoReport::parse(&bytes).is_err());
    }

    #[test]
    fn unrecognized_ad_type_preserved_as_other() {
        let bytes = vec![0x03, 0xec, 0x01, 0x02];
        let report = EInfoReport::parse(&bytes).unwrap();
        assert_eq!(
            report.structures,
            vec![AdStructure::Other {
                ad_type: 0xec,
                data: vec![0x01, 0x02],
            }]
        );
    }
}
