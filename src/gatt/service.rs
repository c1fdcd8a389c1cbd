//! A discovered GATT primary service: its attribute-handle range and UUID.
//!
//! Grounded on `bluez-async/src/service.rs`'s `ServiceInfo` shape,
//! trimmed to what attribute-handle-addressed discovery actually yields
//! (no D-Bus object path, no separate opaque id — a service is identified
//! by its starting handle within one device's attribute table).

use crate::uuid::Uuid;

/// One primary service, as discovered by `read-by-group-type-req`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceInfo {
    pub start_handle: u16,
    pub end_handle: u16,
    pub uuid: Uuid,
}
