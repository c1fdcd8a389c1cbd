//! The GATT layer: service/characteristic/descriptor discovery and the
//! request/response/notification engine built on top of the ATT PDUs in
//! [`crate::att`].

pub mod characteristic;
pub mod client;
pub mod descriptor;
pub mod service;

pub use characteristic::{CharacteristicInfo, CharacteristicProperties};
pub use client::{GattClient, Notification};
pub use descriptor::DescriptorInfo;
pub use service::ServiceInfo;
