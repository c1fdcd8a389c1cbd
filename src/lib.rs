//! A user-space Bluetooth Low Energy host stack that talks directly to
//! the Linux kernel's Bluetooth controller over raw HCI, L2CAP and
//! management sockets, bypassing BlueZ's D-Bus daemon.
//!
//! Module layout mirrors the protocol layers it implements, bottom to
//! top: [`octets`] (packed binary codec) and [`uuid`] underpin
//! everything; [`sock`] is the raw-socket transport; [`mgmt`], [`hci`]
//! and [`att`] are the three protocol layers built on it;
//! [`adapter`]/[`device`]/[`gatt`] are the object model a caller actually
//! programs against; [`registry`]/[`values`] decode the standard service
//! values that model yields.

pub mod adapter;
pub mod address;
pub mod advertising;
pub mod att;
pub mod callback;
pub mod config;
pub mod device;
pub mod env;
pub mod error;
pub mod gatt;
pub mod hci;
pub mod mgmt;
pub mod octets;
pub mod registry;
pub mod ringbuffer;
pub mod sock;
pub mod uuid;
pub mod values;

pub use adapter::{Adapter, AdapterIndex, AdapterInfo, AdapterStatus};
pub use address::{Address, AddressType, ParseAddressError};
pub use advertising::{AdStructure, EInfoReport};
pub use config::{ConnParams, DiscoveryFilter};
pub use device::{ConnectionState, Device, GattHandle};
pub use error::{Error, MgmtStatus, Result};
pub use gatt::{CharacteristicInfo, CharacteristicProperties, DescriptorInfo, GattClient, Notification, ServiceInfo};
