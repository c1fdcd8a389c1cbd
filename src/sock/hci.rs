//! The raw per-controller HCI socket transport, used for LE scan control
//! and advertising report delivery.
//!
//! Grounded on `lautis-ruuvitag-listener`'s `scanner/hci.rs` for the
//! `AF_BLUETOOTH`/`BTPROTO_HCI` open/bind/filter sequence (that file is
//! async-over-`AsyncFd`; here the same socket is read from a single
//! blocking reader thread per spec.md's threading model) and on
//! `original_source/api/direct_bt/HCIHandler.{hpp,cpp}` for which events
//! the filter must admit (command-complete, command-status, and the LE
//! meta sub-events carrying advertising reports and connection-complete).

use super::{HciFilter, RawSocket, HCI_CHANNEL_RAW};
use crate::{Error, Result};
use std::time::Duration;

/// HCI packet type prefix byte, prepended to every frame on the socket.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum PacketType {
    Command = 0x01,
    AclData = 0x02,
    Event = 0x04,
}

/// HCI event codes this crate cares about.
pub const EVT_CMD_COMPLETE: u8 = 0x0e;
pub const EVT_CMD_STATUS: u8 = 0x0f;
pub const EVT_LE_META_EVENT: u8 = 0x3e;
pub const EVT_DISCONN_COMPLETE: u8 = 0x05;

/// One HCI command: opcode plus parameters, ready to be framed with the
/// `0x01` command packet-type prefix.
#[derive(Clone, Debug)]
pub struct HciCommand {
    pub opcode: u16,
    pub params: Vec<u8>,
}

impl HciCommand {
    pub fn new(ogf: u16, ocf: u16, params: Vec<u8>) -> Self {
        HciCommand {
            opcode: (ogf << 10) | ocf,
            params,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.params.len());
        buf.push(PacketType::Command as u8);
        buf.extend_from_slice(&self.opcode.to_le_bytes());
        buf.push(self.params.len() as u8);
        buf.extend_from_slice(&self.params);
        buf
    }
}

/// One received HCI event, with the packet-type prefix already stripped.
#[derive(Clone, Debug)]
pub struct HciEvent {
    pub code: u8,
    pub params: Vec<u8>,
}

impl HciEvent {
    fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 || buf[0] != PacketType::Event as u8 {
            return Err(Error::ProtocolError {
                message: "not an HCI event packet".into(),
                opcode: buf.first().copied().unwrap_or(0),
                bytes: buf.to_vec(),
            });
        }
        let code = buf[1];
        let len = *buf.get(2).ok_or_else(|| Error::ProtocolError {
            message: "truncated HCI event header".into(),
            opcode: code,
            bytes: buf.to_vec(),
        })? as usize;
        let params = buf.get(3..3 + len).ok_or_else(|| Error::ProtocolError {
            message: format!("HCI event declared length {} exceeds buffer", len),
            opcode: code,
            bytes: buf.to_vec(),
        })?;
        Ok(HciEvent {
            code,
            params: params.to_vec(),
        })
    }
}

/// A raw HCI socket bound to one controller (`hci_dev` index), filtered to
/// the event set this crate interprets.
pub struct HciSocket {
    raw: RawSocket,
}

impl HciSocket {
    pub fn open(dev_id: u16) -> Result<Self> {
        let raw = RawSocket::open(libc::SOCK_RAW, super::BTPROTO_HCI)?;
        raw.bind_hci(dev_id, HCI_CHANNEL_RAW)?;

        let mut filter = HciFilter::new();
        filter.set_packet_type(PacketType::Event as u8);
        filter.set_event(EVT_CMD_COMPLETE);
        filter.set_event(EVT_CMD_STATUS);
        filter.set_event(EVT_LE_META_EVENT);
        filter.set_event(EVT_DISCONN_COMPLETE);
        raw.set_hci_filter(&filter)?;

        Ok(HciSocket { raw })
    }

    pub fn set_recv_timeout(&self, timeout: Duration) -> Result<()> {
        self.raw.set_recv_timeout(timeout)
    }

    pub fn send_command(&self, command: &HciCommand) -> Result<()> {
        self.raw.send(&command.encode())?;
        Ok(())
    }

    /// Blocks until one event is available, the receive timeout elapses
    /// (`Error::Timeout`), or the socket is shut down from another thread.
    pub fn recv_event(&self) -> Result<HciEvent> {
        let mut buf = [0u8; 260];
        let n = self.raw.recv(&mut buf)?;
        HciEvent::decode(&buf[..n])
    }

    /// Cancels any thread currently blocked in [`HciSocket::recv_event`].
    pub fn shutdown(&self) -> Result<()> {
        self.raw.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_encodes_opcode_from_ogf_ocf() {
        // LE Set Scan Enable: OGF 0x08, OCF 0x000c.
        let cmd = HciCommand::new(0x08, 0x000c, vec![0x01, 0x00]);
        let encoded = cmd.encode();
        assert_eq!(encoded[0], PacketType::Command as u8);
        let opcode = u16::from_le_bytes([encoded[1], encoded[2]]);
        assert_eq!(opcode, (0x08 << 10) | 0x000c);
        assert_eq!(encoded[3], 2);
        assert_eq!(&encoded[4..], &[0x01, 0x00]);
    }

    #[test]
    fn event_decode_rejects_non_event_prefix() {
        assert!(HciEvent::decode(&[0x02, 0x00, 0x00]).is_err());
    }

    #[test]
    fn event_decode_round_trips_le_meta_event() {
        let buf = [0x04, EVT_LE_META_EVENT, 0x03, 0x02, 0xaa, 0xbb];
        let evt = HciEvent::decode(&buf).unwrap();
        assert_eq!(evt.code, EVT_LE_META_EVENT);
        assert_eq!(evt.params, vec![0x02, 0xaa, 0xbb]);
    }

    #[test]
    fn event_decode_rejects_length_exceeding_buffer() {
        let buf = [0x04, EVT_LE_META_EVENT, 0xff];
        assert!(HciEvent::decode(&buf).is_err());
    }
}
