//! Controller inventory and the discovery/status surface of one adapter.
//!
//! Grounded on `bluez-async/src/adapter.rs`'s `AdapterId`/`AdapterInfo`
//! split (here `AdapterIndex` instead of a D-Bus object path, since a
//! management-socket controller is addressed by a small integer index)
//! and on `original_source/src/direct_bt/DBTAdapter.cpp` for the
//! discovery keep-alive and status-listener notification rules.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::address::{Address, AddressType};
use crate::advertising::EInfoReport;
use crate::callback::{ListenerId, Listeners};
use crate::config::ConnParams;
use crate::device::Device;
use crate::mgmt::{MgmtClient, MgmtCommand, MgmtEvent};
use crate::{Error, Result};

const SETTING_POWERED: u32 = 1 << 0;
const SETTING_DISCOVERABLE: u32 = 1 << 2;
const SETTING_LE: u32 = 1 << 9;

/// Identifies one controller by its kernel-assigned small integer index
/// (`hci0` is index 0, and so on).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AdapterIndex(pub u16);

impl std::fmt::Display for AdapterIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "hci{}", self.0)
    }
}

/// A snapshot of one controller's settings, read via `ReadInfo`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AdapterInfo {
    pub index: AdapterIndex,
    pub address: Address,
    pub name: String,
    pub powered: bool,
    pub discoverable: bool,
    pub le_enabled: bool,
}

/// A status change an [`Adapter`] reports to its listeners.
#[derive(Clone, Debug, PartialEq)]
pub enum AdapterStatus {
    PoweredChanged(bool),
    DiscoveringChanged(bool),
    /// The controller's settings bitset changed; `changed` is `old ^ new`
    /// so a listener can test which bits flipped without keeping its own
    /// copy of `old`.
    NewSettings {
        old: u32,
        new: u32,
        changed: u32,
    },
    DeviceFound {
        address: Address,
        address_type: AddressType,
        rssi: i8,
    },
    /// A previously known device's advertising data changed.
    DeviceUpdated {
        address: Address,
        address_type: AddressType,
    },
    DeviceConnected {
        address: Address,
        address_type: AddressType,
    },
    DeviceDisconnected {
        address: Address,
        address_type: AddressType,
        reason: u8,
    },
    /// A best-effort re-issue of `start-discovery` after the controller
    /// reported `discovering-changed(false)` while keep-alive was active
    /// failed; the adapter does not retry again until the next
    /// `discovering-changed` event.
    DiscoveryKeepAliveFailed,
}

/// The three device sets spec.md's tracking policy distinguishes: devices
/// currently believed in range (`discovered`), every device ever seen
/// regardless of whether it is still in range (`shared`), and devices with
/// an open connection right now (`connected`). A device is always in
/// `shared` once seen at all; `discovered` and `connected` are subsets
/// that come and go as advertisements are (re-)observed and connections
/// open/close.
#[derive(Default)]
pub(crate) struct DeviceSets {
    pub(crate) discovered: HashMap<Address, Arc<Device>>,
    pub(crate) shared: HashMap<Address, Arc<Device>>,
    pub(crate) connected: HashMap<Address, Arc<Device>>,
}

/// One open BLE central, bound to a single controller index.
///
/// `discovering` tracks whether this `Adapter` believes discovery is
/// active; [`Adapter::start_discovery`]/[`Adapter::stop_discovery`] are
/// idempotent with respect to it, mirroring spec.md's discovery
/// keep-alive rule that a second `start_discovery` call while already
/// discovering is a no-op rather than an error. `discovering` and
/// `keep_alive` are shared with the event dispatcher (rather than owned
/// solely by `Adapter`) because a keep-alive re-issue is driven from
/// `discovering-changed(false)` events the dispatcher observes, not from
/// a call the `Adapter` handle itself makes.
pub struct Adapter {
    index: AdapterIndex,
    client: Arc<MgmtClient>,
    local_address: Address,
    discovering: Arc<AtomicBool>,
    keep_alive: Arc<AtomicBool>,
    status_listeners: Arc<Listeners<AdapterStatus>>,
    devices: Arc<Mutex<DeviceSets>>,
    _event_listener: ListenerId,
}

impl Adapter {
    /// Lists every controller index the kernel currently exposes.
    pub fn list_indices(client: &MgmtClient) -> Result<Vec<AdapterIndex>> {
        let reply = client.send(&MgmtCommand::read_index_list())?;
        if reply.len() < 2 {
            return Err(Error::ProtocolError {
                message: "read index list reply shorter than its count field".into(),
                opcode: 0,
                bytes: reply,
            });
        }
        let count = u16::from_le_bytes([reply[0], reply[1]]) as usize;
        let indices = reply
            .get(2..2 + count * 2)
            .ok_or_else(|| Error::ProtocolError {
                message: "read index list reply shorter than its declared count".into(),
                opcode: 0,
                bytes: reply.clone(),
            })?
            .chunks(2)
            .map(|c| AdapterIndex(u16::from_le_bytes([c[0], c[1]])))
            .collect();
        Ok(indices)
    }

    /// Opens the adapter identified by `index`, subscribing to its status
    /// events on `client`'s shared event pump. Reads the controller's own
    /// address up front, since connecting to a discovered device later
    /// needs a local address for the L2CAP channel and the event
    /// dispatcher cannot safely issue a blocking command of its own (it
    /// runs on the management reader thread that would have to answer
    /// that very command).
    pub fn open(client: Arc<MgmtClient>, index: AdapterIndex) -> Result<Self> {
        let reply = client.send(&MgmtCommand::read_info(index.0))?;
        let info = parse_read_info_reply(index, &reply)?;
        let initial_settings = read_current_settings(&reply)?;

        let status_listeners = Arc::new(Listeners::new());
        let devices = Arc::new(Mutex::new(DeviceSets::default()));
        let discovering = Arc::new(AtomicBool::new(false));
        let keep_alive = Arc::new(AtomicBool::new(false));
        let dispatcher = Arc::new(AdapterEventDispatcher {
            index,
            local_address: info.address,
            client: Arc::downgrade(&client),
            status_listeners: Arc::clone(&status_listeners),
            devices: Arc::clone(&devices),
            discovering: Arc::clone(&discovering),
            keep_alive: Arc::clone(&keep_alive),
            settings: AtomicU32::new(initial_settings),
        });
        let _event_listener = client.add_listener(dispatcher, AdapterEventDispatcher::on_event);

        Ok(Adapter {
            index,
            client,
            local_address: info.address,
            discovering,
            keep_alive,
            status_listeners,
            devices,
            _event_listener,
        })
    }

    pub fn index(&self) -> AdapterIndex {
        self.index
    }

    pub fn local_address(&self) -> Address {
        self.local_address
    }

    /// Every device this adapter has ever seen, whether merely discovered
    /// in the past, currently discovered, or connected — the union spec.md
    /// calls the shared (historical) set.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.lock().unwrap().shared.values().cloned().collect()
    }

    /// Devices currently believed in range, i.e. seen in this discovery
    /// session and not yet flushed.
    pub fn discovered_devices(&self) -> Vec<Arc<Device>> {
        self.devices.lock().unwrap().discovered.values().cloned().collect()
    }

    pub fn find_discovered_device(&self, address: Address) -> Option<Arc<Device>> {
        self.devices.lock().unwrap().discovered.get(&address).cloned()
    }

    pub fn device(&self, address: Address) -> Option<Arc<Device>> {
        self.devices.lock().unwrap().shared.get(&address).cloned()
    }

    /// Opens a raw HCI event feed for this controller, independent of the
    /// management-socket status stream [`Adapter::add_status_listener`]
    /// subscribes to. Most callers want the higher-level device/status
    /// model instead; this is for code that needs raw HCI events the
    /// management socket never reports.
    pub fn open_hci_monitor(&self) -> Result<crate::hci::HciMonitor> {
        crate::hci::HciMonitor::open(self.index.0)
    }

    pub fn info(&self) -> Result<AdapterInfo> {
        let reply = self.client.send(&MgmtCommand::read_info(self.index.0))?;
        parse_read_info_reply(self.index, &reply)
    }

    pub fn set_powered(&self, on: bool) -> Result<()> {
        self.client
            .send(&MgmtCommand::set_powered(self.index.0, on))?;
        Ok(())
    }

    pub fn set_le_enabled(&self, on: bool) -> Result<()> {
        self.client.send(&MgmtCommand::set_le(self.index.0, on))?;
        Ok(())
    }

    pub fn set_discoverable(&self, on: bool, timeout_secs: u16) -> Result<()> {
        self.client
            .send(&MgmtCommand::set_discoverable(self.index.0, on, timeout_secs))?;
        Ok(())
    }

    pub fn set_bondable(&self, on: bool) -> Result<()> {
        self.client.send(&MgmtCommand::set_bondable(self.index.0, on))?;
        Ok(())
    }

    pub fn set_local_name(&self, name: &str, short_name: &str) -> Result<()> {
        self.client
            .send(&MgmtCommand::set_local_name(self.index.0, name, short_name))?;
        Ok(())
    }

    pub fn add_device_to_whitelist(&self, address: Address, address_type: AddressType) -> Result<()> {
        self.client.send(&MgmtCommand::add_device_to_whitelist(
            self.index.0,
            address,
            address_type.to_byte(),
        ))?;
        Ok(())
    }

    pub fn remove_device_from_whitelist(&self, address: Address, address_type: AddressType) -> Result<()> {
        self.client.send(&MgmtCommand::remove_device_from_whitelist(
            self.index.0,
            address,
            address_type.to_byte(),
        ))?;
        Ok(())
    }

    pub fn upload_connection_parameters(
        &self,
        address: Address,
        address_type: AddressType,
        params: ConnParams,
    ) -> Result<()> {
        self.client.send(&MgmtCommand::upload_connection_parameters(
            self.index.0,
            address,
            address_type.to_byte(),
            params,
        ))?;
        Ok(())
    }

    /// Starts LE discovery if not already running; a repeated call while
    /// discovering is already active is a no-op. When `keep_alive` is
    /// true, a later `discovering-changed(false)` (the controller stopping
    /// discovery on its own, e.g. after a scan-timeout) triggers a
    /// best-effort background restart until [`Adapter::stop_discovery`] is
    /// called or the controller loses the `powered` setting.
    pub fn start_discovery(&self, keep_alive: bool) -> Result<()> {
        self.keep_alive.store(keep_alive, Ordering::SeqCst);
        if self.discovering.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        const LE_ADDRESS_TYPES: u8 = 0x06; // LE public + LE random
        if let Err(err) = self
            .client
            .send(&MgmtCommand::start_discovery(self.index.0, LE_ADDRESS_TYPES))
        {
            self.discovering.store(false, Ordering::SeqCst);
            return Err(err);
        }
        Ok(())
    }

    pub fn stop_discovery(&self) -> Result<()> {
        self.keep_alive.store(false, Ordering::SeqCst);
        if !self.discovering.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        const LE_ADDRESS_TYPES: u8 = 0x06;
        self.client
            .send(&MgmtCommand::stop_discovery(self.index.0, LE_ADDRESS_TYPES))?;
        Ok(())
    }

    pub fn is_discovering(&self) -> bool {
        self.discovering.load(Ordering::SeqCst)
    }

    pub fn add_status_listener(&self, id: u64, f: impl Fn(&AdapterStatus) + Send + Sync + 'static) -> ListenerId {
        self.status_listeners.add_captured(id, f)
    }

    pub fn remove_status_listener(&self, id: u64) -> usize {
        self.status_listeners.remove_captured(id)
    }
}

/// Drives status-listener notification from raw management events for one
/// adapter. Runs on the management client's single reader thread, so it
/// must never issue a blocking command of its own — a reply would never
/// arrive, since this same thread is the one that would have to deliver
/// it. Where a reaction needs to send a command (the keep-alive restart),
/// it spawns a dedicated thread instead.
struct AdapterEventDispatcher {
    index: AdapterIndex,
    local_address: Address,
    client: Weak<MgmtClient>,
    status_listeners: Arc<Listeners<AdapterStatus>>,
    devices: Arc<Mutex<DeviceSets>>,
    discovering: Arc<AtomicBool>,
    keep_alive: Arc<AtomicBool>,
    settings: AtomicU32,
}

impl AdapterEventDispatcher {
    /// Device-found tie-break (spec.md's device-tracking policy, bullet
    /// 1): already discovered → update in place; known historically but
    /// flushed from discovered → re-add and report both a found and an
    /// update; never seen → create fresh.
    fn on_device_found(&self, address: Address, address_type: AddressType, rssi: i8, data: &EInfoReport) -> Vec<AdapterStatus> {
        let mut sets = self.devices.lock().unwrap();
        if let Some(device) = sets.discovered.get(&address).cloned() {
            drop(sets);
            return if device.update_advertising_data(data) {
                vec![AdapterStatus::DeviceUpdated { address, address_type }]
            } else {
                Vec::new()
            };
        }
        if let Some(device) = sets.shared.get(&address).cloned() {
            sets.discovered.insert(address, Arc::clone(&device));
            drop(sets);
            let mut statuses = vec![AdapterStatus::DeviceFound {
                address,
                address_type,
                rssi,
            }];
            if device.update_advertising_data(data) {
                statuses.push(AdapterStatus::DeviceUpdated { address, address_type });
            }
            return statuses;
        }
        let device = Arc::new(Device::new(
            self.index,
            self.client.clone(),
            Arc::downgrade(&self.devices),
            address,
            address_type,
            data.clone(),
        ));
        sets.discovered.insert(address, Arc::clone(&device));
        sets.shared.insert(address, device);
        vec![AdapterStatus::DeviceFound {
            address,
            address_type,
            rssi,
        }]
    }

    /// Device-connected tie-break (bullet 2): locate in discovered, then
    /// shared; synthesize from the connection event's own advertising
    /// bytes if neither has it (a whitelist auto-connect can complete
    /// without this crate ever having discovered the peer itself).
    fn on_device_connected(&self, address: Address, address_type: AddressType, data: &EInfoReport) -> Vec<AdapterStatus> {
        let device = {
            let mut sets = self.devices.lock().unwrap();
            let device = sets
                .discovered
                .get(&address)
                .or_else(|| sets.shared.get(&address))
                .cloned()
                .unwrap_or_else(|| {
                    Arc::new(Device::new(
                        self.index,
                        self.client.clone(),
                        Arc::downgrade(&self.devices),
                        address,
                        address_type,
                        data.clone(),
                    ))
                });
            sets.shared.insert(address, Arc::clone(&device));
            sets.connected.insert(address, Arc::clone(&device));
            device
        };

        if let Err(err) = device.on_connected(self.local_address) {
            log::warn!("failed to open GATT channel for {}: {}", address, err);
        }

        let mut statuses = Vec::new();
        if device.update_advertising_data(data) {
            statuses.push(AdapterStatus::DeviceUpdated { address, address_type });
        }
        statuses.push(AdapterStatus::DeviceConnected { address, address_type });
        statuses
    }

    /// Device-disconnected tie-break (bullet 3): remove only from
    /// `connected`; the device stays known in `discovered`/`shared`.
    fn on_device_disconnected(&self, address: Address, address_type: AddressType, reason: u8) -> Vec<AdapterStatus> {
        let device = self.devices.lock().unwrap().connected.remove(&address);
        if let Some(device) = device {
            device.on_disconnected();
        }
        vec![AdapterStatus::DeviceDisconnected {
            address,
            address_type,
            reason,
        }]
    }

    /// Spawns a dedicated thread that re-issues `start-discovery`, since
    /// the calling thread here is the management reader thread itself and
    /// cannot block on its own reply. Best-effort: one failure is reported
    /// via [`AdapterStatus::DiscoveryKeepAliveFailed`] and not retried
    /// again until the next `discovering-changed` event.
    fn spawn_keep_alive_restart(&self) {
        let client = self.client.clone();
        let index = self.index;
        let discovering = Arc::clone(&self.discovering);
        let keep_alive = Arc::clone(&self.keep_alive);
        let status_listeners = Arc::clone(&self.status_listeners);
        let spawned = std::thread::Builder::new()
            .name("mgmt-discovery-keepalive".into())
            .spawn(move || {
                if !keep_alive.load(Ordering::SeqCst) {
                    return;
                }
                let Some(client) = client.upgrade() else {
                    return;
                };
                const LE_ADDRESS_TYPES: u8 = 0x06;
                match client.send(&MgmtCommand::start_discovery(index.0, LE_ADDRESS_TYPES)) {
                    Ok(_) => discovering.store(true, Ordering::SeqCst),
                    Err(err) => {
                        log::warn!("discovery keep-alive restart failed for {}: {}", index, err);
                        status_listeners.dispatch(&AdapterStatus::DiscoveryKeepAliveFailed);
                    }
                }
            });
        if let Err(err) = spawned {
            log::warn!("failed to spawn discovery keep-alive thread for {}: {}", self.index, err);
        }
    }

    fn on_event(&self, event: &MgmtEvent) {
        let statuses = match event {
            MgmtEvent::DiscoveringChanged {
                controller_index,
                enabled,
                ..
            } if *controller_index == self.index.0 => {
                self.discovering.store(*enabled, Ordering::SeqCst);
                if !*enabled && self.keep_alive.load(Ordering::SeqCst) {
                    self.spawn_keep_alive_restart();
                }
                vec![AdapterStatus::DiscoveringChanged(*enabled)]
            }
            MgmtEvent::NewSettings {
                controller_index,
                settings,
            } if *controller_index == self.index.0 => {
                let old = self.settings.swap(*settings, Ordering::SeqCst);
                if *settings & SETTING_POWERED == 0 {
                    self.keep_alive.store(false, Ordering::SeqCst);
                }
                vec![AdapterStatus::NewSettings {
                    old,
                    new: *settings,
                    changed: old ^ *settings,
                }]
            }
            MgmtEvent::DeviceFound {
                controller_index,
                address,
                address_type,
                rssi,
                data,
            } if *controller_index == self.index.0 => self.on_device_found(*address, *address_type, *rssi, data),
            MgmtEvent::DeviceConnected {
                controller_index,
                address,
                address_type,
                data,
            } if *controller_index == self.index.0 => self.on_device_connected(*address, *address_type, data),
            MgmtEvent::DeviceDisconnected {
                controller_index,
                address,
                address_type,
                reason,
            } if *controller_index == self.index.0 => self.on_device_disconnected(*address, *address_type, *reason),
            _ => return,
        };
        for status in &statuses {
            self.status_listeners.dispatch(status);
        }
    }
}

fn read_current_settings(reply: &[u8]) -> Result<u32> {
    if reply.len() < 17 {
        return Err(Error::ProtocolError {
            message: "read info reply shorter than its fixed fields".into(),
            opcode: 0,
            bytes: reply.to_vec(),
        });
    }
    Ok(u32::from_le_bytes([reply[13], reply[14], reply[15], reply[16]]))
}

fn parse_read_info_reply(index: AdapterIndex, reply: &[u8]) -> Result<AdapterInfo> {
    // addr(6) + bdaddr_type(1) + hci_version(1) + hci_revision(2) +
    // manufacturer(2) + supported_settings(4) + current_settings(4) +
    // class_of_device(3) + name(249) + short_name(11)
    if reply.len() < 21 {
        return Err(Error::ProtocolError {
            message: "read info reply shorter than its fixed fields".into(),
            opcode: 0,
            bytes: reply.to_vec(),
        });
    }
    let address = Address::from_le_bytes(reply[0..6].try_into().unwrap());
    let current_settings = u32::from_le_bytes([reply[13], reply[14], reply[15], reply[16]]);
    let name_bytes = reply.get(20..20 + 249).unwrap_or(&[]);
    let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
    let name = String::from_utf8_lossy(&name_bytes[..name_end]).into_owned();

    Ok(AdapterInfo {
        index,
        address,
        name,
        powered: current_settings & SETTING_POWERED != 0,
        discoverable: current_settings & SETTING_DISCOVERABLE != 0,
        le_enabled: current_settings & SETTING_LE != 0,
    })
}
