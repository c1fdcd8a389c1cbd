//! One remote peer: its address, most recent advertisement, and its
//! connection-state machine.
//!
//! Grounded on `bluez-async/src/device.rs`'s `DeviceInfo` field set
//! (name, appearance, services, rssi, tx power, manufacturer/service
//! data) and on `original_source/src/direct_bt/HCIDevice.cpp` /
//! `src/BluetoothDevice.cpp` for the `Disconnected → Connecting →
//! Connected → Disconnecting → Disconnected` transitions driven by
//! management events rather than D-Bus property changes.

use std::sync::{Mutex, RwLock, Weak};
use std::time::Instant;

use crate::address::{Address, AddressType};
use crate::adapter::{AdapterIndex, DeviceSets};
use crate::advertising::EInfoReport;
use crate::config::ConnParams;
use crate::gatt::client::GattClient;
use crate::gatt::service::ServiceInfo;
use crate::mgmt::MgmtClient;
use crate::registry::KnownService;
use crate::values::{DeviceInformation, GenericAccess, PreferredConnectionParameters};
use crate::{Error, Result};

/// The connection lifecycle a [`Device`] moves through. `Error` is
/// terminal until the caller explicitly reopens via [`Device::connect`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Error,
}

struct Inner {
    state: ConnectionState,
    data: EInfoReport,
    gatt: Option<GattClient>,
    services: Option<Vec<ServiceInfo>>,
    created_at: Instant,
    last_update: Instant,
    /// Set by [`Device::disconnect`] ahead of issuing the management
    /// disconnect command; the management socket's disconnect command
    /// carries no reason byte of its own (the kernel reports its own
    /// reason on the disconnection event), so a caller-supplied reason is
    /// only ever a local hint recorded for whoever reads it back, not
    /// something sent over the wire.
    local_disconnect_reason: Option<u8>,
}

/// A discovered or connected remote device. Held behind `Arc` by the
/// owning [`crate::adapter::Adapter`]'s discovered/shared/connected maps
/// and by any listeners notified about it; keeps only weak references
/// back to its adapter's management client and device sets to avoid
/// reference cycles.
pub struct Device {
    pub address: Address,
    pub address_type: AddressType,
    adapter_index: AdapterIndex,
    client: Weak<MgmtClient>,
    device_sets: Weak<Mutex<DeviceSets>>,
    inner: RwLock<Inner>,
    connect_gate: Mutex<()>,
}

impl Device {
    pub fn new(
        adapter_index: AdapterIndex,
        client: Weak<MgmtClient>,
        device_sets: Weak<Mutex<DeviceSets>>,
        address: Address,
        address_type: AddressType,
        data: EInfoReport,
    ) -> Self {
        let now = Instant::now();
        Device {
            address,
            address_type,
            adapter_index,
            client,
            device_sets,
            inner: RwLock::new(Inner {
                state: ConnectionState::Disconnected,
                data,
                gatt: None,
                services: None,
                created_at: now,
                last_update: now,
                local_disconnect_reason: None,
            }),
            connect_gate: Mutex::new(()),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.read().unwrap().state
    }

    pub fn advertising_data(&self) -> EInfoReport {
        self.inner.read().unwrap().data.clone()
    }

    pub fn created_at(&self) -> Instant {
        self.inner.read().unwrap().created_at
    }

    pub fn last_update(&self) -> Instant {
        self.inner.read().unwrap().last_update
    }

    /// Folds freshly observed advertising data into this device's record
    /// and bumps its last-update timestamp. Returns whether anything
    /// observable actually changed, so the adapter can decide whether to
    /// emit `device-updated`.
    pub fn update_advertising_data(&self, data: &EInfoReport) -> bool {
        let mut inner = self.inner.write().unwrap();
        let changed = &inner.data != data;
        if changed {
            inner.data = data.clone();
        }
        inner.last_update = Instant::now();
        changed
    }

    /// Moves `Disconnected → Connecting` and issues the management
    /// connect command, using this crate's own default connection
    /// parameters. Returns once the command has been accepted by the
    /// controller; the transition to `Connected` happens asynchronously,
    /// driven by the adapter's event pump calling
    /// [`Device::on_connected`].
    pub fn connect_default(&self) -> Result<()> {
        self.connect_inner(None)
    }

    /// As [`Device::connect_default`], but uploads `conn_params` to the
    /// controller via `upload-connection-parameters` before issuing the
    /// connect request, so the link comes up already negotiating the
    /// caller's preferred interval/latency/timeout rather than this
    /// crate's defaults.
    pub fn connect(&self, conn_params: ConnParams) -> Result<()> {
        self.connect_inner(Some(conn_params))
    }

    fn connect_inner(&self, conn_params: Option<ConnParams>) -> Result<()> {
        let _gate = self.connect_gate.lock().unwrap();
        {
            let mut inner = self.inner.write().unwrap();
            match inner.state {
                ConnectionState::Connected => {
                    return Err(Error::InvalidState("device is already connected".into()))
                }
                ConnectionState::Connecting | ConnectionState::Disconnecting => {
                    return Err(Error::InvalidState(
                        "device has a connection transition already in progress".into(),
                    ))
                }
                ConnectionState::Disconnected | ConnectionState::Error => {
                    inner.state = ConnectionState::Connecting;
                }
            }
        }
        let client = self.client.upgrade().ok_or(Error::Interrupted)?;
        let address_type_byte = self.address_type.to_byte();
        if let Some(params) = conn_params {
            let cmd = crate::mgmt::MgmtCommand::upload_connection_parameters(
                self.adapter_index.0,
                self.address,
                address_type_byte,
                params,
            );
            if let Err(err) = client.send(&cmd) {
                self.inner.write().unwrap().state = ConnectionState::Error;
                return Err(err);
            }
        }
        let cmd = crate::mgmt::MgmtCommand::connect(self.adapter_index.0, self.address, address_type_byte);
        if let Err(err) = client.send(&cmd) {
            self.inner.write().unwrap().state = ConnectionState::Error;
            return Err(err);
        }
        Ok(())
    }

    /// Called by the adapter's event dispatch when `DeviceConnected`
    /// arrives for this address: opens the ATT channel and constructs the
    /// GATT client, completing `Connecting → Connected`. Drops any
    /// service list cached from a previous connection, since handles are
    /// not guaranteed stable across reconnects.
    pub fn on_connected(&self, local_address: Address) -> Result<()> {
        let gatt = GattClient::open(local_address, self.address, self.address_type)?;
        let mut inner = self.inner.write().unwrap();
        inner.gatt = Some(gatt);
        inner.services = None;
        inner.state = ConnectionState::Connected;
        Ok(())
    }

    /// `Connected → Disconnecting`: sends the management disconnect
    /// command; the transition completes when `DeviceDisconnected`
    /// arrives and [`Device::on_disconnected`] runs. `reason` is recorded
    /// locally and returned by [`Device::last_disconnect_reason`]; the
    /// management socket's disconnect command has no reason field of its
    /// own, so it is never placed on the wire here.
    pub fn disconnect(&self, reason: u8) -> Result<()> {
        let _gate = self.connect_gate.lock().unwrap();
        {
            let mut inner = self.inner.write().unwrap();
            if inner.state != ConnectionState::Connected {
                return Err(Error::InvalidState("device is not connected".into()));
            }
            inner.state = ConnectionState::Disconnecting;
            inner.local_disconnect_reason = Some(reason);
        }
        let client = self.client.upgrade().ok_or(Error::Interrupted)?;
        let address_type_byte = self.address_type.to_byte();
        client.send(&crate::mgmt::MgmtCommand::disconnect(
            self.adapter_index.0,
            self.address,
            address_type_byte,
        ))?;
        Ok(())
    }

    /// The reason passed to the most recent [`Device::disconnect`] call,
    /// if any; `None` for a disconnect the controller initiated on its
    /// own.
    pub fn last_disconnect_reason(&self) -> Option<u8> {
        self.inner.read().unwrap().local_disconnect_reason
    }

    /// `Any → Disconnected` on `DeviceDisconnected`: tears down the ATT
    /// channel and GATT client unconditionally, matching spec's rule that
    /// this transition fires from any prior state, not only
    /// `Disconnecting`.
    pub fn on_disconnected(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.gatt = None;
        inner.services = None;
        inner.state = ConnectionState::Disconnected;
    }

    /// Forgets this device: removes it from the owning adapter's
    /// discovered/shared/connected sets. A later advertisement from the
    /// same address is treated as a brand new device rather than being
    /// folded back into this one.
    pub fn remove(&self) {
        if let Some(device_sets) = self.device_sets.upgrade() {
            let mut sets = device_sets.lock().unwrap();
            sets.discovered.remove(&self.address);
            sets.shared.remove(&self.address);
            sets.connected.remove(&self.address);
        }
    }

    pub fn with_gatt<T>(&self, f: impl FnOnce(&GattClient) -> Result<T>) -> Result<T> {
        let inner = self.inner.read().unwrap();
        match &inner.gatt {
            Some(gatt) => f(gatt),
            None => Err(Error::InvalidState("no GATT channel open on this device".into())),
        }
    }

    /// A read guard exposing the open GATT channel directly, for callers
    /// that want to issue several GATT operations without nesting
    /// closures through [`Device::with_gatt`] each time.
    pub fn get_gatt_handler(&self) -> Result<GattHandle<'_>> {
        let inner = self.inner.read().unwrap();
        if inner.gatt.is_none() {
            return Err(Error::InvalidState("no GATT channel open on this device".into()));
        }
        Ok(GattHandle { inner })
    }

    /// Primary service discovery, cached after the first successful call
    /// following a connect; a fresh connection always starts with an
    /// empty cache (see [`Device::on_connected`]).
    pub fn get_services(&self) -> Result<Vec<ServiceInfo>> {
        {
            let inner = self.inner.read().unwrap();
            if let Some(services) = &inner.services {
                return Ok(services.clone());
            }
        }
        let services = self.with_gatt(|gatt| gatt.discover_services())?;
        self.inner.write().unwrap().services = Some(services.clone());
        Ok(services)
    }

    fn find_known_service(&self, known: KnownService) -> Result<ServiceInfo> {
        self.get_services()?
            .into_iter()
            .find(|s| s.uuid == known.uuid())
            .ok_or_else(|| Error::InvalidState(format!("{} service not found", known.name())))
    }

    /// Reads and decodes the mandatory Generic Access service.
    pub fn get_gatt_generic_access(&self) -> Result<GenericAccess> {
        use crate::registry::KnownCharacteristic;

        let service = self.find_known_service(KnownService::GenericAccess)?;
        let handle = self.get_gatt_handler()?;
        let characteristics = handle.discover_characteristics(&service)?;
        let mut access = GenericAccess::default();
        for characteristic in &characteristics {
            match KnownCharacteristic::from_uuid(characteristic.uuid) {
                Some(KnownCharacteristic::DeviceName) => {
                    if let Ok(value) = handle.read_value(characteristic.value_handle) {
                        access.device_name = String::from_utf8(value).ok();
                    }
                }
                Some(KnownCharacteristic::Appearance) => {
                    if let Ok(value) = handle.read_value(characteristic.value_handle) {
                        access.appearance = GenericAccess::decode_appearance(&value);
                    }
                }
                Some(KnownCharacteristic::PeripheralPreferredConnectionParameters) => {
                    if let Ok(value) = handle.read_value(characteristic.value_handle) {
                        access.preferred_connection_parameters =
                            PreferredConnectionParameters::decode(&value);
                    }
                }
                _ => {}
            }
        }
        Ok(access)
    }

    /// Reads and decodes the mandatory Device Information service.
    pub fn get_gatt_device_information(&self) -> Result<DeviceInformation> {
        use crate::registry::KnownCharacteristic;

        let service = self.find_known_service(KnownService::DeviceInformation)?;
        let handle = self.get_gatt_handler()?;
        let characteristics = handle.discover_characteristics(&service)?;
        let mut values = Vec::new();
        for characteristic in &characteristics {
            if let Some(known) = KnownCharacteristic::from_uuid(characteristic.uuid) {
                if let Ok(value) = handle.read_value(characteristic.value_handle) {
                    values.push((known, value));
                }
            }
        }
        Ok(crate::registry::assemble_device_information(&values))
    }
}

/// A read-lock guard dereferencing to the open [`GattClient`], returned
/// by [`Device::get_gatt_handler`]. Holding it blocks a concurrent
/// disconnect from tearing the channel down underneath it.
pub struct GattHandle<'a> {
    inner: std::sync::RwLockReadGuard<'a, Inner>,
}

impl std::ops::Deref for GattHandle<'_> {
    type Target = GattClient;

    fn deref(&self) -> &GattClient {
        self.inner
            .gatt
            .as_ref()
            .expect("constructed only while gatt is Some")
    }
}
