//! Small builder-style configuration types: connection parameters for an
//! explicit connect/whitelist entry, and a discovery filter for which
//! advertising address types to scan.
//!
//! Grounded on `bluez-async/src/lib.rs`'s `DiscoveryFilter`/`WriteOptions`
//! structs — plain-data bags of options passed into an otherwise stateless
//! call, with a `Default` impl covering the common case.

/// LE connection parameters, in the units the management socket's
/// `upload-connection-parameters`/whitelist commands expect: intervals and
/// supervision timeout in units of 1.25ms and 10ms respectively, latency
/// in connection events.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConnParams {
    pub min_interval: u16,
    pub max_interval: u16,
    pub latency: u16,
    pub supervision_timeout: u16,
}

impl Default for ConnParams {
    /// 30-50ms interval, no slave latency, 5s supervision timeout — the
    /// same middle-of-the-road defaults `original_source`'s
    /// `DBTConst.hpp` uses when a caller does not supply its own.
    fn default() -> Self {
        ConnParams {
            min_interval: 0x0018,
            max_interval: 0x0028,
            latency: 0,
            supervision_timeout: 0x01f4,
        }
    }
}

impl ConnParams {
    pub(crate) fn encode(&self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0..2].copy_from_slice(&self.min_interval.to_le_bytes());
        buf[2..4].copy_from_slice(&self.max_interval.to_le_bytes());
        buf[4..6].copy_from_slice(&self.latency.to_le_bytes());
        buf[6..8].copy_from_slice(&self.supervision_timeout.to_le_bytes());
        buf
    }
}

/// Which LE address types a scan admits. Mirrors the `address_type_mask`
/// byte `start-discovery`/`stop-discovery` take on the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DiscoveryFilter {
    pub le_public: bool,
    pub le_random: bool,
}

impl Default for DiscoveryFilter {
    fn default() -> Self {
        DiscoveryFilter {
            le_public: true,
            le_random: true,
        }
    }
}

impl DiscoveryFilter {
    pub(crate) fn address_type_mask(&self) -> u8 {
        let mut mask = 0u8;
        if self.le_public {
            mask |= 0x02;
        }
        if self.le_random {
            mask |= 0x04;
        }
        mask
    }
}
