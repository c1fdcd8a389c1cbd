//! The management-socket protocol: commands, their completions, and the
//! unsolicited event stream, layered on
//! [`crate::sock::mgmt::MgmtSocket`].
//!
//! Grounded on `original_source/src/direct_bt/DBTAdapter.cpp`'s use of its
//! `DBTManager`/`MgmtEvent` types (`mgmt.addMgmtEventCallback(dev_id,
//! MgmtEvent::Opcode::DISCOVERING, ...)`, `mgmt.setMode(dev_id,
//! MgmtOpcode::SET_POWERED, ...)`) for the opcode/event vocabulary and the
//! per-controller-index event dispatch shape.

pub mod client;
pub mod command;
pub mod event;

pub use client::MgmtClient;
pub use command::{MgmtCommand, MgmtOpcode};
pub use event::{MgmtEvent, MgmtEventOpcode};
