//! Starts LE discovery on the first powered controller and prints every
//! device found for a fixed window, matching `bluez-async/examples/
//! devices.rs` in spirit but against a raw management socket instead of
//! BlueZ's D-Bus object tree.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use direct_bt::mgmt::MgmtClient;
use direct_bt::Adapter;

const SCAN_DURATION: Duration = Duration::from_secs(10);

fn main() -> Result<(), eyre::Report> {
    direct_bt::env::Env::load().apply_as_default_rust_log();
    pretty_env_logger::init();

    let client = Arc::new(MgmtClient::open()?);
    let index = Adapter::list_indices(&client)?
        .into_iter()
        .next()
        .ok_or_else(|| eyre::eyre!("no Bluetooth controllers found"))?;
    let adapter = Adapter::open(client, index)?;

    let info = adapter.info()?;
    println!("Using {} ({})", info.index, info.address);
    adapter.set_powered(true)?;
    adapter.set_le_enabled(true)?;

    let _listener = adapter.add_status_listener(0, |status| {
        println!("{:?}", status);
    });

    adapter.start_discovery(true)?;
    thread::sleep(SCAN_DURATION);
    adapter.stop_discovery()?;

    println!("Devices seen:");
    for device in adapter.devices() {
        let data = device.advertising_data();
        println!(
            "  {} ({:?}) name={:?} tx_power={:?}",
            device.address,
            device.address_type,
            data.name,
            data.tx_power,
        );
    }

    Ok(())
}
