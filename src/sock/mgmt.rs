//! The management socket transport: binds `HCI_CHANNEL_CONTROL` and frames
//! the kernel management protocol's fixed 6-byte header (opcode, controller
//! index, parameter length, all little-endian) around an arbitrary payload.
//!
//! Grounded on the kernel's `mgmt-api.txt` framing (mirrored by every
//! from-scratch mgmt client in the reference pack, e.g.
//! `deviceplug-btleplug`'s `src/bluez/` constants) and on this crate's own
//! `sock::RawSocket` for the underlying blocking recv/send/shutdown.

use super::{RawSocket, HCI_CHANNEL_CONTROL, HCI_DEV_NONE};
use crate::{Error, Result};
use std::time::Duration;

/// One framed management-protocol packet: either a command, a command
/// response/completion, or an unsolicited event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MgmtFrame {
    pub opcode: u16,
    pub controller_index: u16,
    pub payload: Vec<u8>,
}

impl MgmtFrame {
    const HEADER_LEN: usize = 6;

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&self.opcode.to_le_bytes());
        buf.extend_from_slice(&self.controller_index.to_le_bytes());
        buf.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::HEADER_LEN {
            return Err(Error::ProtocolError {
                message: "management frame shorter than header".into(),
                opcode: 0,
                bytes: buf.to_vec(),
            });
        }
        let opcode = u16::from_le_bytes([buf[0], buf[1]]);
        let controller_index = u16::from_le_bytes([buf[2], buf[3]]);
        let len = u16::from_le_bytes([buf[4], buf[5]]) as usize;
        let payload = buf.get(Self::HEADER_LEN..Self::HEADER_LEN + len).ok_or_else(|| {
            Error::ProtocolError {
                message: format!("management frame declared length {} exceeds buffer", len),
                opcode,
                bytes: buf.to_vec(),
            }
        })?;
        Ok(MgmtFrame {
            opcode,
            controller_index,
            payload: payload.to_vec(),
        })
    }
}

/// A socket bound to the kernel's management control channel.
///
/// Unlike HCI and L2CAP sockets, there is exactly one management socket
/// for the whole system (it is not per-controller); `controller_index` in
/// each [`MgmtFrame`] selects which adapter a command or event concerns,
/// with `0xffff` meaning "the kernel itself" (used for the command-complete
/// event carrying the controller index list at startup).
pub struct MgmtSocket {
    raw: RawSocket,
}

impl MgmtSocket {
    pub fn open() -> Result<Self> {
        let raw = RawSocket::open(libc::SOCK_RAW, super::BTPROTO_HCI)?;
        raw.bind_hci(HCI_DEV_NONE, HCI_CHANNEL_CONTROL)?;
        Ok(MgmtSocket { raw })
    }

    pub fn set_recv_timeout(&self, timeout: Duration) -> Result<()> {
        self.raw.set_recv_timeout(timeout)
    }

    /// Blocks until one frame (command response or event) is available, or
    /// the receive timeout set with [`MgmtSocket::set_recv_timeout`]
    /// elapses (`Error::Timeout`), or the socket is shut down from another
    /// thread (`Error::Io` wrapping an interrupted/closed read).
    pub fn recv_frame(&self) -> Result<MgmtFrame> {
        let mut buf = [0u8; 1024];
        let n = self.raw.recv(&mut buf)?;
        MgmtFrame::decode(&buf[..n])
    }

    pub fn send_frame(&self, frame: &MgmtFrame) -> Result<()> {
        let encoded = frame.encode();
        self.raw.send(&encoded)?;
        Ok(())
    }

    /// Cancels any thread currently blocked in [`MgmtSocket::recv_frame`].
    pub fn shutdown(&self) -> Result<()> {
        self.raw.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trips_through_wire_encoding() {
        let frame = MgmtFrame {
            opcode: 0x0001,
            controller_index: 0x0000,
            payload: vec![0xde, 0xad, 0xbe, 0xef],
        };
        let encoded = frame.encode();
        assert_eq!(
            &encoded[..6],
            &[0x01, 0x00, 0x00, 0x00, 0x04, 0x00]
        );
        let decoded = MgmtFrame::decode(&encoded).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn decode_rejects_truncated_header() {
        assert!(MgmtFrame::decode(&[0x01, 0x00]).is_err());
    }

    #[test]
    fn decode_rejects_length_exceeding_buffer() {
        let buf = [0x01, 0x00, 0x00, 0x00, 0xff, 0x00];
        assert!(MgmtFrame::decode(&buf).is_err());
    }

    #[test]
    fn decode_accepts_zero_length_payload() {
        let frame = MgmtFrame {
            opcode: 0x0005,
            controller_index: 0xffff,
            payload: vec![],
        };
        let decoded = MgmtFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded, frame);
    }
}
