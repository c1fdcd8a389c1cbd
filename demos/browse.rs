//! Connects to the first device seen during a short scan and dumps its
//! GATT services, characteristics and descriptors, matching
//! `bluez-async/examples/characteristics.rs` in spirit but driving the
//! connect/discover sequence over a raw L2CAP ATT channel instead of
//! BlueZ's `org.bluez.GattCharacteristic1` D-Bus interface.

use std::str;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use direct_bt::device::ConnectionState;
use direct_bt::mgmt::MgmtClient;
use direct_bt::Adapter;

const SCAN_DURATION: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn main() -> Result<(), eyre::Report> {
    direct_bt::env::Env::load().apply_as_default_rust_log();
    pretty_env_logger::init();

    let client = Arc::new(MgmtClient::open()?);
    let index = Adapter::list_indices(&client)?
        .into_iter()
        .next()
        .ok_or_else(|| eyre::eyre!("no Bluetooth controllers found"))?;
    let adapter = Adapter::open(client, index)?;
    adapter.set_powered(true)?;
    adapter.set_le_enabled(true)?;

    adapter.start_discovery(false)?;
    thread::sleep(SCAN_DURATION);
    adapter.stop_discovery()?;

    let device = adapter
        .devices()
        .into_iter()
        .next()
        .ok_or_else(|| eyre::eyre!("no devices found during scan"))?;
    println!("Connecting to {} ({:?})", device.address, device.address_type);
    device.connect_default()?;

    let deadline = Instant::now() + CONNECT_TIMEOUT;
    while device.state() == ConnectionState::Connecting && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(100));
    }
    if device.state() != ConnectionState::Connected {
        return Err(eyre::eyre!("timed out waiting for connection"));
    }

    if let Ok(generic_access) = device.get_gatt_generic_access() {
        println!("Generic Access: {:?}", generic_access);
    }
    if let Ok(device_information) = device.get_gatt_device_information() {
        println!("Device Information: {:?}", device_information);
    }

    let gatt = device.get_gatt_handler()?;
    for service in device.get_services()? {
        println!(
            "Service {} [{:#06x}-{:#06x}]",
            service.uuid, service.start_handle, service.end_handle
        );
        for characteristic in gatt.discover_characteristics(&service)? {
            println!(
                "  Characteristic {} ({:?}) @ {:#06x}",
                characteristic.uuid, characteristic.properties, characteristic.value_handle
            );
            if characteristic
                .properties
                .contains(direct_bt::CharacteristicProperties::READ)
            {
                match gatt.read_value(characteristic.value_handle) {
                    Ok(value) => println!("    value: {}", debug_format_maybe_string(&value)),
                    Err(err) => println!("    read failed: {}", err),
                }
            }
            for descriptor in &characteristic.descriptors {
                println!(
                    "    Descriptor {} @ {:#06x}: {}",
                    descriptor.uuid,
                    descriptor.handle,
                    debug_format_maybe_string(&descriptor.value)
                );
            }
        }
    }
    drop(gatt);

    const LOCAL_DISCONNECT: u8 = 0x00;
    device.disconnect(LOCAL_DISCONNECT)?;
    Ok(())
}

/// Guesses whether a value might be a string, printing it that way if so
/// and as a byte list otherwise.
fn debug_format_maybe_string(value: &[u8]) -> String {
    const PRINTABLE_ASCII: std::ops::RangeInclusive<u8> = 0x20..=0x7e;
    if value.len() > 1
        && value[..value.len() - 1]
            .iter()
            .all(|b| PRINTABLE_ASCII.contains(b))
    {
        if let Ok(s) = str::from_utf8(value) {
            return format!("{:?}", s);
        }
    }
    format!("{:?}", value)
}
