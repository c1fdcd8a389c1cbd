//! A running reader thread over one controller's raw HCI socket, fanning
//! parsed [`HciEvent`]s out to registered listeners.
//!
//! Grounded on `mgmt/client.rs`'s `MgmtClient`: the same
//! spawn-a-reader-thread-own-it-for-life shape, minus that client's
//! request/reply correlation, since nothing here issues blocking HCI
//! commands of its own (LE scan parameters are opened once at
//! [`HciMonitor::open`] and otherwise this is read-only).

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::callback::{ListenerId, Listeners};
use crate::sock::hci::HciSocket;
use crate::{Error, Result};

use super::event::HciEvent;

const READER_POLL_TIMEOUT: Duration = Duration::from_millis(250);

/// Owns one controller's raw HCI socket and its reader thread for its
/// whole lifetime, joining the thread on drop.
///
/// Distinct from [`crate::adapter::Adapter`], which drives discovery and
/// connection state over the management socket: this is the lower-level
/// raw-HCI event feed a caller can subscribe to directly when it needs
/// events the management socket never reports (e.g. raw advertising
/// reports before `EInfoReport` de-duplication).
pub struct HciMonitor {
    socket: Arc<HciSocket>,
    listeners: Arc<Listeners<HciEvent>>,
    reader: Option<JoinHandle<()>>,
}

impl HciMonitor {
    /// Opens a raw HCI socket on `dev_id` and starts its reader thread.
    pub fn open(dev_id: u16) -> Result<Self> {
        let socket = Arc::new(HciSocket::open(dev_id)?);
        socket.set_recv_timeout(READER_POLL_TIMEOUT)?;
        let listeners = Arc::new(Listeners::new());

        let reader_socket = Arc::clone(&socket);
        let reader_listeners = Arc::clone(&listeners);
        let reader = std::thread::Builder::new()
            .name(format!("hci{dev_id}-monitor"))
            .spawn(move || reader_loop(reader_socket, reader_listeners))
            .map_err(|e| Error::InvalidState(format!("failed to spawn HCI monitor thread: {e}")))?;

        Ok(HciMonitor {
            socket,
            listeners,
            reader: Some(reader),
        })
    }

    /// Registers a listener invoked for every HCI event this monitor's
    /// reader thread decodes.
    pub fn add_listener<T: Send + Sync + 'static>(
        &self,
        receiver: Arc<T>,
        method: fn(&T, &HciEvent),
    ) -> ListenerId {
        self.listeners.add_bound(receiver, method)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }
}

impl Drop for HciMonitor {
    fn drop(&mut self) {
        let _ = self.socket.shutdown();
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

fn reader_loop(socket: Arc<HciSocket>, listeners: Arc<Listeners<HciEvent>>) {
    loop {
        let raw = match socket.recv_event() {
            Ok(raw) => raw,
            Err(Error::Timeout) => continue,
            Err(_) => return,
        };
        match HciEvent::parse(raw.code, &raw.params) {
            Ok(event) => listeners.dispatch(&event),
            Err(_) => continue,
        }
    }
}
