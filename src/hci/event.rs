//! Typed HCI events, parsed from the raw `(code, params)` pairs delivered
//! by [`crate::sock::hci::HciSocket::recv_event`].
//!
//! Grounded on `original_source/src/direct_bt/HCITypes.cpp` for the LE
//! meta sub-event layout (advertising report, connection complete) and
//! modeled, per the design notes, the way `bluez-async/src/events.rs`
//! represents its own closed `BluetoothEvent` enum: one tagged variant per
//! event kind plus an `Unknown` catch-all, with a single total `parse`
//! entry point.

use crate::address::{Address, AddressType};
use crate::advertising::EInfoReport;
use crate::sock::hci::{EVT_CMD_COMPLETE, EVT_CMD_STATUS, EVT_DISCONN_COMPLETE, EVT_LE_META_EVENT};
use crate::{Error, Result};

const LE_META_ADVERTISING_REPORT: u8 = 0x02;
const LE_META_CONNECTION_COMPLETE: u8 = 0x01;

/// One advertising report within an `LE Advertising Report` meta event
/// (the controller may batch several into one event).
#[derive(Clone, Debug, PartialEq)]
pub struct AdvertisingReport {
    pub event_type: u8,
    pub address_type: AddressType,
    pub address: Address,
    pub data: EInfoReport,
    pub rssi: i8,
}

/// A typed HCI event. Unlike [`crate::att::pdu::AttPdu`], only the event
/// codes this crate's adapter/device state machine consumes are fully
/// parsed; every other event code is preserved as [`HciEvent::Unknown`].
#[derive(Clone, Debug, PartialEq)]
pub enum HciEvent {
    CommandComplete {
        opcode: u16,
        status: u8,
        return_params: Vec<u8>,
    },
    CommandStatus {
        opcode: u16,
        status: u8,
    },
    LeAdvertisingReport(Vec<AdvertisingReport>),
    LeConnectionComplete {
        status: u8,
        connection_handle: u16,
        peer_address_type: AddressType,
        peer_address: Address,
    },
    DisconnectionComplete {
        status: u8,
        connection_handle: u16,
        reason: u8,
    },
    Unknown {
        code: u8,
        params: Vec<u8>,
    },
}

impl HciEvent {
    pub fn parse(code: u8, params: &[u8]) -> Result<HciEvent> {
        let malformed = |message: &str| Error::ProtocolError {
            message: message.to_string(),
            opcode: code,
            bytes: params.to_vec(),
        };
        Ok(match code {
            EVT_CMD_COMPLETE => {
                if params.len() < 3 {
                    return Err(malformed("command complete shorter than its fixed header"));
                }
                HciEvent::CommandComplete {
                    opcode: u16::from_le_bytes([params[1], params[2]]),
                    status: *params.get(3).unwrap_or(&0),
                    return_params: params[3.min(params.len())..].to_vec(),
                }
            }
            EVT_CMD_STATUS => {
                if params.len() != 4 {
                    return Err(malformed("command status must be 4 bytes"));
                }
                HciEvent::CommandStatus {
                    status: params[0],
                    opcode: u16::from_le_bytes([params[2], params[3]]),
                }
            }
            EVT_DISCONN_COMPLETE => {
                if params.len() != 4 {
                    return Err(malformed("disconnection complete must be 4 bytes"));
                }
                HciEvent::DisconnectionComplete {
                    status: params[0],
                    connection_handle: u16::from_le_bytes([params[1], params[2]]),
                    reason: params[3],
                }
            }
            EVT_LE_META_EVENT => parse_le_meta(params, malformed)?,
            other => HciEvent::Unknown {
                code: other,
                params: params.to_vec(),
            },
        })
    }
}

fn parse_le_meta(
    params: &[u8],
    malformed: impl Fn(&str) -> Error,
) -> Result<HciEvent> {
    let sub_event = *params.first().ok_or_else(|| malformed("empty LE meta event"))?;
    let body = &params[1..];
    Ok(match sub_event {
        LE_META_ADVERTISING_REPORT => {
            let num_reports = *body.first().ok_or_else(|| malformed("empty advertising report list"))? as usize;
            let mut offset = 1;
            let mut reports = Vec::with_capacity(num_reports);
            for _ in 0..num_reports {
                let event_type = *body.get(offset).ok_or_else(|| malformed("truncated advertising report"))?;
                let address_type_byte = *body.get(offset + 1).ok_or_else(|| malformed("truncated advertising report"))?;
                let address_type = AddressType::from_byte(address_type_byte)
                    .ok_or_else(|| malformed("invalid advertising report address type"))?;
                let addr_bytes: [u8; 6] = body
                    .get(offset + 2..offset + 8)
                    .ok_or_else(|| malformed("truncated advertising report"))?
                    .try_into()
                    .unwrap();
                let address = Address::from_le_bytes(addr_bytes);
                let data_len = *body.get(offset + 8).ok_or_else(|| malformed("truncated advertising report"))? as usize;
                let data_start = offset + 9;
                let data_bytes = body
                    .get(data_start..data_start + data_len)
                    .ok_or_else(|| malformed("advertising report data length exceeds event"))?;
                let data = EInfoReport::parse(data_bytes)?;
                let rssi_offset = data_start + data_len;
                let rssi = *body.get(rssi_offset).ok_or_else(|| malformed("advertising report missing RSSI"))? as i8;
                reports.push(AdvertisingReport {
                    event_type,
                    address_type,
                    address,
                    data,
                    rssi,
                });
                offset = rssi_offset + 1;
            }
            HciEvent::LeAdvertisingReport(reports)
        }
        LE_META_CONNECTION_COMPLETE => {
            if body.len() < 10 {
                return Err(malformed("LE connection complete shorter than its fixed fields"));
            }
            let peer_address_type = AddressType::from_byte(body[3])
                .ok_or_else(|| malformed("invalid LE connection complete address type"))?;
            let addr_bytes: [u8; 6] = body[4..10].try_into().unwrap();
            HciEvent::LeConnectionComplete {
                status: body[0],
                connection_handle: u16::from_le_bytes([body[1], body[2]]),
                peer_address_type,
                peer_address: Address::from_le_bytes(addr_bytes),
            }
        }
        _ => HciEvent::Unknown {
            code: EVT_LE_META_EVENT,
            params: params.to_vec(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_complete_round_trip_fields() {
        let params = vec![0x01, 0x0c, 0x20, 0x00];
        let evt = HciEvent::parse(EVT_CMD_COMPLETE, &params).unwrap();
        assert_eq!(
            evt,
            HciEvent::CommandComplete {
                opcode: 0x200c,
                status: 0x00,
                return_params: vec![0x00],
            }
        );
    }

    #[test]
    fn command_status_parses_status_and_opcode() {
        let params = vec![0x00, 0x01, 0x0c, 0x20];
        let evt = HciEvent::parse(EVT_CMD_STATUS, &params).unwrap();
        assert_eq!(
            evt,
            HciEvent::CommandStatus {
                opcode: 0x200c,
                status: 0x00,
            }
        );
    }

    #[test]
    fn disconnection_complete_parses() {
        let params = vec![0x00, 0x01, 0x00, 0x13];
        let evt = HciEvent::parse(EVT_DISCONN_COMPLETE, &params).unwrap();
        assert_eq!(
            evt,
            HciEvent::DisconnectionComplete {
                status: 0x00,
                connection_handle: 0x0001,
                reason: 0x13,
            }
        );
    }

    #[test]
    fn le_advertising_report_parses_single_report() {
        let mut params = vec![LE_META_ADVERTISING_REPORT, 0x01];
        params.push(0x00); // event_type: ADV_IND
        params.push(0x00); // address type: public
        params.extend_from_slice(&[0x06, 0x05, 0x04, 0x03, 0x02, 0x01]); // address, LE order
        params.push(0x00); // data length 0
        params.push(0xc8u8 as u8); // RSSI -56

        let evt = HciEvent::parse(EVT_LE_META_EVENT, &params).unwrap();
        match evt {
            HciEvent::LeAdvertisingReport(reports) => {
                assert_eq!(reports.len(), 1);
                assert_eq!(reports[0].address_type, AddressType::BrEdr);
                assert_eq!(reports[0].rssi, 0xc8u8 as i8);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn unknown_event_code_preserved() {
        let evt = HciEvent::parse(0xfe, &[0x01, 0x02]).unwrap();
        assert_eq!(
            evt,
            HciEvent::Unknown {
                code: 0xfe,
                params: vec![0x01, 0x02],
            }
        );
    }
}
