//! The L2CAP transport used to carry the ATT fixed channel (CID 4) to a
//! connected LE peer.
//!
//! Grounded on the `bluer`-derived `sock/l2cap.rs` excerpt in the reference
//! pack for `sockaddr_l2`'s field layout and the `SOCK_SEQPACKET`/
//! `BTPROTO_L2CAP` connect sequence; reworked from that file's async
//! `AsyncFd`-based implementation to the blocking read/write this crate
//! uses (one reader thread per connected device, per spec.md's
//! concurrency model).

use super::{BdAddr, RawSocket, SockaddrL2, BTPROTO_L2CAP};
use crate::address::AddressType;
use crate::{Address, Result};
use std::time::Duration;

/// The fixed CID for the Attribute Protocol channel, used by every LE GATT
/// connection (as opposed to classic L2CAP's dynamically negotiated CIDs).
pub const ATT_CID: u16 = 0x0004;

/// An L2CAP socket connected to a peer's ATT fixed channel.
pub struct L2capSocket {
    raw: RawSocket,
}

impl L2capSocket {
    /// Opens a sequential-packet L2CAP socket and connects it to `peer`'s
    /// ATT fixed channel, binding the local side to `local` first (as
    /// required for LE L2CAP sockets, which are connection-oriented from a
    /// specific local adapter address).
    pub fn connect(local: Address, peer: Address, peer_type: AddressType) -> Result<Self> {
        let raw = RawSocket::open(libc::SOCK_SEQPACKET, BTPROTO_L2CAP)?;

        let local_addr = SockaddrL2 {
            l2_family: super::AF_BLUETOOTH as libc::sa_family_t,
            l2_psm: 0,
            l2_bdaddr: BdAddr::from(local),
            l2_cid: ATT_CID,
            l2_bdaddr_type: AddressType::LePublic.to_byte(),
        };
        raw.bind_l2cap(&local_addr)?;

        let peer_addr = SockaddrL2 {
            l2_family: super::AF_BLUETOOTH as libc::sa_family_t,
            l2_psm: 0,
            l2_bdaddr: BdAddr::from(peer),
            l2_cid: ATT_CID,
            l2_bdaddr_type: peer_type.to_byte(),
        };
        raw.connect_l2cap(&peer_addr)?;

        Ok(L2capSocket { raw })
    }

    pub fn set_recv_timeout(&self, timeout: Duration) -> Result<()> {
        self.raw.set_recv_timeout(timeout)
    }

    /// Sends one ATT PDU. `SOCK_SEQPACKET` preserves message boundaries, so
    /// each call is exactly one PDU on the wire.
    pub fn send(&self, pdu: &[u8]) -> Result<()> {
        self.raw.send(pdu)?;
        Ok(())
    }

    /// Blocks for one ATT PDU, up to the current MTU. Returns
    /// `Error::Timeout` if the receive timeout elapses, or propagates an
    /// I/O error if the peer closed the connection or the socket was shut
    /// down from another thread.
    pub fn recv(&self, mtu: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; mtu];
        let n = self.raw.recv(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Cancels any thread currently blocked in [`L2capSocket::recv`].
    pub fn shutdown(&self) -> Result<()> {
        self.raw.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn att_cid_is_the_bluetooth_defined_fixed_channel() {
        assert_eq!(ATT_CID, 4);
    }
}
