use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// The error type for every fallible operation in this crate.
///
/// Each variant corresponds to one of the error kinds in the stack's error
/// taxonomy: buffer/UUID misuse is a programmer error and is surfaced as
/// [`Error::InvalidArgument`] or [`Error::IndexOutOfBounds`] rather than
/// panicking; I/O and protocol failures tear down the specific transport
/// that raised them.
#[derive(Debug, Error)]
pub enum Error {
    /// An out-of-range octet offset, UUID merge index, or malformed address.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation was attempted that is not valid for the current state
    /// machine phase, e.g. a GATT read on a disconnected channel.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An octet-buffer accessor over/underran its backing storage.
    #[error("index out of bounds: offset {offset} + width {width} > size {size}")]
    IndexOutOfBounds {
        offset: usize,
        width: usize,
        size: usize,
    },

    /// A socket read, write or poll failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A blocking read or ring-buffer wait expired.
    #[error("operation timed out")]
    Timeout,

    /// A malformed PDU, unexpected opcode, or attribute-handle violation.
    #[error("protocol error: {message} (opcode {opcode:#04x})")]
    ProtocolError {
        message: String,
        opcode: u8,
        bytes: Vec<u8>,
    },

    /// A management command reply reported a non-success status.
    #[error("controller error: {0}")]
    ControllerError(MgmtStatus),

    /// The peer returned `ATT_ERROR_RSP`.
    #[error("ATT error {code} responding to opcode {request_opcode:#04x}")]
    AttError {
        code: crate::att::AttErrorCode,
        request_opcode: u8,
    },

    /// A pending operation was aborted by a concurrent close/shutdown.
    #[error("operation interrupted")]
    Interrupted,

    /// No Bluetooth adapters/controllers were found on the system.
    #[error("no Bluetooth controllers found")]
    NoControllers,

    /// A UUID was requested from the type registry that this crate does not
    /// recognize.
    #[error("unknown UUID {0}")]
    UuidNotFound(crate::uuid::Uuid),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The status byte returned in a management command-complete event.
///
/// Mirrors the Linux kernel's `mgmt_status` enumeration (`include/net/
/// bluetooth/mgmt.h`). Only `Success` means the command completed; every
/// other value is surfaced to the caller as [`Error::ControllerError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MgmtStatus {
    Success,
    UnknownCommand,
    NotConnected,
    Failed,
    ConnectFailed,
    AuthenticationFailed,
    NotPaired,
    NoResources,
    Timeout,
    AlreadyConnected,
    Busy,
    Rejected,
    NotSupported,
    InvalidParameters,
    Disconnected,
    NotPowered,
    Cancelled,
    InvalidIndex,
    RfKilled,
    AlreadyPaired,
    PermissionDenied,
    Unknown(u8),
}

impl MgmtStatus {
    pub(crate) fn from_byte(b: u8) -> Self {
        match b {
            0x00 => Self::Success,
            0x01 => Self::UnknownCommand,
            0x02 => Self::NotConnected,
            0x03 => Self::Failed,
            0x04 => Self::ConnectFailed,
            0x05 => Self::AuthenticationFailed,
            0x06 => Self::NotPaired,
            0x07 => Self::NoResources,
            0x08 => Self::Timeout,
            0x09 => Self::AlreadyConnected,
            0x0a => Self::Busy,
            0x0b => Self::Rejected,
            0x0c => Self::NotSupported,
            0x0d => Self::InvalidParameters,
            0x0e => Self::Disconnected,
            0x0f => Self::NotPowered,
            0x10 => Self::Cancelled,
            0x11 => Self::InvalidIndex,
            0x12 => Self::RfKilled,
            0x13 => Self::AlreadyPaired,
            0x14 => Self::PermissionDenied,
            other => Self::Unknown(other),
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl Display for MgmtStatus {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::UnknownCommand => f.write_str("unknown command"),
            Self::NotConnected => f.write_str("not connected"),
            Self::Failed => f.write_str("failed"),
            Self::ConnectFailed => f.write_str("connect failed"),
            Self::AuthenticationFailed => f.write_str("authentication failed"),
            Self::NotPaired => f.write_str("not paired"),
            Self::NoResources => f.write_str("no resources"),
            Self::Timeout => f.write_str("timeout"),
            Self::AlreadyConnected => f.write_str("already connected"),
            Self::Busy => f.write_str("busy"),
            Self::Rejected => f.write_str("rejected"),
            Self::NotSupported => f.write_str("not supported"),
            Self::InvalidParameters => f.write_str("invalid parameters"),
            Self::Disconnected => f.write_str("disconnected"),
            Self::NotPowered => f.write_str("not powered"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::InvalidIndex => f.write_str("invalid index"),
            Self::RfKilled => f.write_str("rf-killed"),
            Self::AlreadyPaired => f.write_str("already paired"),
            Self::PermissionDenied => f.write_str("permission denied"),
            Self::Unknown(code) => write!(f, "unknown status {:#04x}", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mgmt_status_round_trip_known() {
        assert!(MgmtStatus::from_byte(0x00).is_success());
        assert!(!MgmtStatus::from_byte(0x03).is_success());
        assert_eq!(MgmtStatus::from_byte(0x14), MgmtStatus::PermissionDenied);
    }

    #[test]
    fn mgmt_status_unknown() {
        assert_eq!(MgmtStatus::from_byte(0xfe), MgmtStatus::Unknown(0xfe));
    }
}
