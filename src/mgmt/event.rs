//! Management event taxonomy: the unsolicited events (and command
//! completions/statuses, which ride the same event channel) parsed from
//! [`crate::sock::mgmt::MgmtFrame`]s.
//!
//! Opcode values mirror `mgmt.h`'s `MGMT_EV_*`. Grounded on
//! `original_source/src/direct_bt/DBTAdapter.cpp`'s
//! `mgmt.addMgmtEventCallback(dev_id, MgmtEvent::Opcode::DISCOVERING, ...)`
//! family of registrations, which names exactly the event set this crate
//! needs: `Discovering`, `NewSettings`, `LocalNameChanged`,
//! `DeviceConnected`, `DeviceDisconnected`, `DeviceFound`.

use crate::address::{Address, AddressType};
use crate::advertising::EInfoReport;
use crate::error::MgmtStatus;
use crate::{Error, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u16)]
pub enum MgmtEventOpcode {
    CmdComplete = 0x0001,
    CmdStatus = 0x0002,
    ControllerError = 0x0003,
    IndexAdded = 0x0004,
    IndexRemoved = 0x0005,
    NewSettings = 0x0006,
    LocalNameChanged = 0x0008,
    NewLongTermKey = 0x000a,
    DeviceConnected = 0x000b,
    DeviceDisconnected = 0x000c,
    ConnectFailed = 0x000d,
    UserConfirmRequest = 0x000f,
    DeviceFound = 0x0012,
    Discovering = 0x0013,
}

impl MgmtEventOpcode {
    fn from_u16(v: u16) -> Option<Self> {
        use MgmtEventOpcode::*;
        Some(match v {
            0x0001 => CmdComplete,
            0x0002 => CmdStatus,
            0x0003 => ControllerError,
            0x0004 => IndexAdded,
            0x0005 => IndexRemoved,
            0x0006 => NewSettings,
            0x0008 => LocalNameChanged,
            0x000a => NewLongTermKey,
            0x000b => DeviceConnected,
            0x000c => DeviceDisconnected,
            0x000d => ConnectFailed,
            0x000f => UserConfirmRequest,
            0x0012 => DeviceFound,
            0x0013 => Discovering,
            _ => return None,
        })
    }
}

/// A typed management event, tagged by opcode; an opcode this crate does
/// not yet interpret is preserved as [`MgmtEvent::Unknown`] so the event
/// pump never has to drop a frame outright.
#[derive(Clone, Debug, PartialEq)]
pub enum MgmtEvent {
    CmdComplete {
        controller_index: u16,
        request_opcode: u16,
        status: MgmtStatus,
        return_params: Vec<u8>,
    },
    CmdStatus {
        controller_index: u16,
        request_opcode: u16,
        status: MgmtStatus,
    },
    DiscoveringChanged {
        controller_index: u16,
        address_type_mask: u8,
        enabled: bool,
    },
    NewSettings {
        controller_index: u16,
        settings: u32,
    },
    LocalNameChanged {
        controller_index: u16,
        name: String,
        short_name: String,
    },
    DeviceConnected {
        controller_index: u16,
        address: Address,
        address_type: AddressType,
        data: EInfoReport,
    },
    DeviceDisconnected {
        controller_index: u16,
        address: Address,
        address_type: AddressType,
        reason: u8,
    },
    DeviceFound {
        controller_index: u16,
        address: Address,
        address_type: AddressType,
        rssi: i8,
        data: EInfoReport,
    },
    Unknown {
        opcode: u16,
        controller_index: u16,
        payload: Vec<u8>,
    },
}

impl MgmtEvent {
    pub fn parse(frame: &crate::sock::mgmt::MgmtFrame) -> Result<MgmtEvent> {
        let index = frame.controller_index;
        let payload = &frame.payload;
        let malformed = |message: &str| Error::ProtocolError {
            message: message.to_string(),
            opcode: frame.opcode as u8,
            bytes: payload.clone(),
        };
        let opcode = match MgmtEventOpcode::from_u16(frame.opcode) {
            Some(opcode) => opcode,
            None => {
                return Ok(MgmtEvent::Unknown {
                    opcode: frame.opcode,
                    controller_index: index,
                    payload: payload.clone(),
                })
            }
        };
        Ok(match opcode {
            MgmtEventOpcode::CmdComplete => {
                if payload.len() < 3 {
                    return Err(malformed("cmd complete shorter than its fixed header"));
                }
                MgmtEvent::CmdComplete {
                    controller_index: index,
                    request_opcode: u16::from_le_bytes([payload[0], payload[1]]),
                    status: MgmtStatus::from_byte(payload[2]),
                    return_params: payload[3..].to_vec(),
                }
            }
            MgmtEventOpcode::CmdStatus => {
                if payload.len() != 3 {
                    return Err(malformed("cmd status must be 3 bytes"));
                }
                MgmtEvent::CmdStatus {
                    controller_index: index,
                    request_opcode: u16::from_le_bytes([payload[0], payload[1]]),
                    status: MgmtStatus::from_byte(payload[2]),
                }
            }
            MgmtEventOpcode::Discovering => {
                if payload.len() != 2 {
                    return Err(malformed("discovering event must be 2 bytes"));
                }
                MgmtEvent::DiscoveringChanged {
                    controller_index: index,
                    address_type_mask: payload[0],
                    enabled: payload[1] != 0,
                }
            }
            MgmtEventOpcode::NewSettings => {
                if payload.len() != 4 {
                    return Err(malformed("new settings event must be 4 bytes"));
                }
                MgmtEvent::NewSettings {
                    controller_index: index,
                    settings: u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]),
                }
            }
            MgmtEventOpcode::LocalNameChanged => {
                if payload.len() != 260 {
                    return Err(malformed("local name changed event must be 260 bytes"));
                }
                MgmtEvent::LocalNameChanged {
                    controller_index: index,
                    name: decode_fixed_cstring(&payload[0..249]),
                    short_name: decode_fixed_cstring(&payload[249..260]),
                }
            }
            MgmtEventOpcode::DeviceConnected => {
                if payload.len() < 9 {
                    return Err(malformed("device connected event shorter than its fixed fields"));
                }
                let address_type = AddressType::from_byte(payload[6])
                    .ok_or_else(|| malformed("invalid device connected address type"))?;
                let data_len = u16::from_le_bytes([payload[7], payload[8]]) as usize;
                let data_bytes = payload.get(9..9 + data_len).ok_or_else(|| {
                    malformed("device connected eir data length exceeds payload")
                })?;
                MgmtEvent::DeviceConnected {
                    controller_index: index,
                    address: Address::from_le_bytes(payload[0..6].try_into().unwrap()),
                    address_type,
                    data: EInfoReport::parse(data_bytes)?,
                }
            }
            MgmtEventOpcode::DeviceDisconnected => {
                if payload.len() != 8 {
                    return Err(malformed("device disconnected event must be 8 bytes"));
                }
                let address_type = AddressType::from_byte(payload[6])
                    .ok_or_else(|| malformed("invalid device disconnected address type"))?;
                MgmtEvent::DeviceDisconnected {
                    controller_index: index,
                    address: Address::from_le_bytes(payload[0..6].try_into().unwrap()),
                    address_type,
                    reason: payload[7],
                }
            }
            MgmtEventOpcode::DeviceFound => {
                if payload.len() < 14 {
                    return Err(malformed("device found event shorter than its fixed fields"));
                }
                let address_type = AddressType::from_byte(payload[6])
                    .ok_or_else(|| malformed("invalid device found address type"))?;
                // layout: addr(6) + addr_type(1) + rssi(1) + flags(4) + eir_len(2) + eir_data
                let rssi = payload[7] as i8;
                let flags_end = 7 + 1 + 4;
                let len_bytes = payload
                    .get(flags_end..flags_end + 2)
                    .ok_or_else(|| malformed("device found event shorter than its fixed fields"))?;
                let data_len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
                let data_start = flags_end + 2;
                let data_bytes = payload
                    .get(data_start..data_start + data_len)
                    .ok_or_else(|| malformed("device found eir data length exceeds payload"))?;
                MgmtEvent::DeviceFound {
                    controller_index: index,
                    address: Address::from_le_bytes(payload[0..6].try_into().unwrap()),
                    address_type,
                    rssi,
                    data: EInfoReport::parse(data_bytes)?,
                }
            }
            MgmtEventOpcode::IndexAdded
            | MgmtEventOpcode::IndexRemoved
            | MgmtEventOpcode::ControllerError
            | MgmtEventOpcode::NewLongTermKey
            | MgmtEventOpcode::ConnectFailed
            | MgmtEventOpcode::UserConfirmRequest => MgmtEvent::Unknown {
                opcode: frame.opcode,
                controller_index: index,
                payload: payload.clone(),
            },
        })
    }
}

fn decode_fixed_cstring(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sock::mgmt::MgmtFrame;

    fn frame(opcode: u16, controller_index: u16, payload: Vec<u8>) -> MgmtFrame {
        MgmtFrame {
            opcode,
            controller_index,
            payload,
        }
    }

    #[test]
    fn cmd_complete_parses_status_and_return_params() {
        let f = frame(0x0001, 0, vec![0x23, 0x00, 0x00, 0xaa]);
        let evt = MgmtEvent::parse(&f).unwrap();
        assert_eq!(
            evt,
            MgmtEvent::CmdComplete {
                controller_index: 0,
                request_opcode: 0x0023,
                status: MgmtStatus::Success,
                return_params: vec![0xaa],
            }
        );
    }

    #[test]
    fn discovering_changed_parses() {
        let f = frame(0x0013, 0, vec![0x06, 0x01]);
        let evt = MgmtEvent::parse(&f).unwrap();
        assert_eq!(
            evt,
            MgmtEvent::DiscoveringChanged {
                controller_index: 0,
                address_type_mask: 0x06,
                enabled: true,
            }
        );
    }

    #[test]
    fn new_settings_parses_bitset() {
        let f = frame(0x0006, 0, vec![0x01, 0x00, 0x00, 0x00]);
        let evt = MgmtEvent::parse(&f).unwrap();
        assert_eq!(
            evt,
            MgmtEvent::NewSettings {
                controller_index: 0,
                settings: 0x1,
            }
        );
    }

    #[test]
    fn device_disconnected_parses_address_and_reason() {
        let mut payload = vec![0xff, 0xee, 0xdd, 0xcc, 0xbb, 0xaa];
        payload.push(0x01); // address type: LE public
        payload.push(0x03); // reason
        let f = frame(0x000c, 0, payload);
        let evt = MgmtEvent::parse(&f).unwrap();
        match evt {
            MgmtEvent::DeviceDisconnected {
                address_type,
                reason,
                ..
            } => {
                assert_eq!(address_type, AddressType::LePublic);
                assert_eq!(reason, 0x03);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn unknown_opcode_preserved() {
        let f = frame(0xbeef, 0, vec![1, 2, 3]);
        let evt = MgmtEvent::parse(&f).unwrap();
        assert_eq!(
            evt,
            MgmtEvent::Unknown {
                opcode: 0xbeef,
                controller_index: 0,
                payload: vec![1, 2, 3],
            }
        );
    }
}
