//! Parsers for specification-defined characteristic value layouts.
//!
//! Grounded on `mijia/src/decode.rs`'s `decode(&[u8]) -> Option<T>` idiom:
//! a small associated function per value type with colocated
//! `#[cfg(test)]` round-trip tests, generalized here from one vendor's
//! sensor payload to the Bluetooth SIG-defined structures named in the
//! type registry.

pub mod device_information;
pub mod generic_access;
pub mod temperature;

pub use device_information::DeviceInformation;
pub use generic_access::{GenericAccess, PreferredConnectionParameters};
pub use temperature::TemperatureMeasurement;
