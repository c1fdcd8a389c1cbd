//! Raw `AF_BLUETOOTH` socket plumbing shared by the management, HCI and
//! L2CAP transports.
//!
//! Grounded on the `bluer`-derived excerpts in the reference pack
//! (`sock/sys.rs`, `sock/l2cap.rs`) for the socket-address layouts and
//! constants, and on `lautis-ruuvitag-listener`'s `scanner/hci.rs` for the
//! raw `libc::socket`/`bind`/`setsockopt` call sequence. Those references
//! are async (`tokio::io::unix::AsyncFd`); this crate's transports are
//! blocking per its concurrency model (`crate::ringbuffer`, one reader
//! thread per socket), so a receive timeout is installed with
//! `SO_RCVTIMEO` instead of polling a reactor, and a pending blocking read
//! is cancelled by `shutdown(2)`-ing the socket from another thread.

pub mod hci;
pub mod l2cap;
pub mod mgmt;

use crate::{Error, Result};
use std::io;
use std::mem;
use std::net::Shutdown;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

pub(crate) const AF_BLUETOOTH: libc::c_int = 31;

pub(crate) const BTPROTO_HCI: libc::c_int = 1;
pub(crate) const BTPROTO_L2CAP: libc::c_int = 0;
pub(crate) const SOL_HCI: libc::c_int = 0;
pub(crate) const HCI_FILTER: libc::c_int = 2;

pub(crate) const HCI_CHANNEL_RAW: u16 = 0;
pub(crate) const HCI_CHANNEL_CONTROL: u16 = 3;
pub(crate) const HCI_DEV_NONE: u16 = 0xffff;

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct SockaddrHci {
    pub hci_family: libc::sa_family_t,
    pub hci_dev: u16,
    pub hci_channel: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct HciFilter {
    pub type_mask: u32,
    pub event_mask: [u32; 2],
    pub opcode: u16,
}

impl HciFilter {
    pub(crate) fn new() -> Self {
        HciFilter {
            type_mask: 0,
            event_mask: [0, 0],
            opcode: 0,
        }
    }

    pub(crate) fn set_packet_type(&mut self, ptype: u8) {
        self.type_mask |= 1 << (ptype as u32);
    }

    pub(crate) fn set_event(&mut self, event: u8) {
        let bit = event as usize;
        self.event_mask[bit / 32] |= 1 << (bit % 32);
    }
}

#[repr(C, packed)]
#[derive(Clone, Copy, Default)]
pub(crate) struct BdAddr {
    pub b: [u8; 6],
}

impl From<crate::Address> for BdAddr {
    fn from(addr: crate::Address) -> Self {
        BdAddr {
            b: addr.to_le_bytes(),
        }
    }
}

impl From<BdAddr> for crate::Address {
    fn from(raw: BdAddr) -> Self {
        crate::Address::from_le_bytes(raw.b)
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct SockaddrL2 {
    pub l2_family: libc::sa_family_t,
    pub l2_psm: libc::c_ushort,
    pub l2_bdaddr: BdAddr,
    pub l2_cid: libc::c_ushort,
    pub l2_bdaddr_type: u8,
}

/// A thin RAII wrapper over a raw `AF_BLUETOOTH` socket file descriptor.
pub(crate) struct RawSocket {
    fd: RawFd,
}

impl RawSocket {
    pub(crate) fn open(socket_type: libc::c_int, protocol: libc::c_int) -> Result<Self> {
        let fd = unsafe { libc::socket(AF_BLUETOOTH, socket_type, protocol) };
        if fd < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        Ok(RawSocket { fd })
    }

    pub(crate) fn bind_hci(&self, dev_id: u16, channel: u16) -> Result<()> {
        let addr = SockaddrHci {
            hci_family: AF_BLUETOOTH as libc::sa_family_t,
            hci_dev: dev_id,
            hci_channel: channel,
        };
        let ret = unsafe {
            libc::bind(
                self.fd,
                &addr as *const SockaddrHci as *const libc::sockaddr,
                mem::size_of::<SockaddrHci>() as libc::socklen_t,
            )
        };
        self.check(ret)
    }

    pub(crate) fn set_hci_filter(&self, filter: &HciFilter) -> Result<()> {
        let ret = unsafe {
            libc::setsockopt(
                self.fd,
                SOL_HCI,
                HCI_FILTER,
                filter as *const HciFilter as *const libc::c_void,
                mem::size_of::<HciFilter>() as libc::socklen_t,
            )
        };
        self.check(ret)
    }

    pub(crate) fn bind_l2cap(&self, addr: &SockaddrL2) -> Result<()> {
        let ret = unsafe {
            libc::bind(
                self.fd,
                addr as *const SockaddrL2 as *const libc::sockaddr,
                mem::size_of::<SockaddrL2>() as libc::socklen_t,
            )
        };
        self.check(ret)
    }

    pub(crate) fn connect_l2cap(&self, addr: &SockaddrL2) -> Result<()> {
        let ret = unsafe {
            libc::connect(
                self.fd,
                addr as *const SockaddrL2 as *const libc::sockaddr,
                mem::size_of::<SockaddrL2>() as libc::socklen_t,
            )
        };
        self.check(ret)
    }

    /// Installs a receive timeout via `SO_RCVTIMEO`. A zero duration
    /// clears the timeout (blocks indefinitely).
    pub(crate) fn set_recv_timeout(&self, timeout: Duration) -> Result<()> {
        let tv = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };
        let ret = unsafe {
            libc::setsockopt(
                self.fd,
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &tv as *const libc::timeval as *const libc::c_void,
                mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        };
        self.check(ret)
    }

    pub(crate) fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let ret = unsafe {
            libc::recv(
                self.fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            return Err(match err.raw_os_error() {
                Some(libc::EAGAIN) | Some(libc::EWOULDBLOCK) => Error::Timeout,
                _ => Error::Io(err),
            });
        }
        Ok(ret as usize)
    }

    pub(crate) fn send(&self, buf: &[u8]) -> Result<usize> {
        let ret = unsafe {
            libc::send(
                self.fd,
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                0,
            )
        };
        if ret < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        Ok(ret as usize)
    }

    /// Shuts down both directions of the socket, waking any thread blocked
    /// in `recv`. Used to cancel a reader thread on close.
    pub(crate) fn shutdown(&self) -> Result<()> {
        let ret = unsafe { libc::shutdown(self.fd, libc::SHUT_RDWR) };
        // ENOTCONN is expected for connectionless sockets (HCI, mgmt) and
        // is not an error here.
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ENOTCONN) {
                return Err(Error::Io(err));
            }
        }
        Ok(())
    }

    fn check(&self, ret: libc::c_int) -> Result<()> {
        if ret < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl AsRawFd for RawSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

// Not Send/Sync by default because of the raw fd; every transport above
// this layer wraps a RawSocket in an Arc and only ever touches it through
// &self methods that are individually safe to call from multiple threads
// (recv from the reader thread, send/shutdown from callers), matching the
// "one reader, any number of writers" pattern the upper layers use.
unsafe impl Send for RawSocket {}
unsafe impl Sync for RawSocket {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hci_filter_bit_math() {
        let mut filter = HciFilter::new();
        filter.set_packet_type(0x04);
        filter.set_event(0x3e);
        assert_eq!(filter.type_mask, 1 << 0x04);
        assert_eq!(filter.event_mask[0x3e / 32], 1 << (0x3e % 32));
    }

    #[test]
    fn bdaddr_round_trips_through_address() {
        let addr: crate::Address = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let raw: BdAddr = addr.into();
        let back: crate::Address = raw.into();
        assert_eq!(addr, back);
    }
}
