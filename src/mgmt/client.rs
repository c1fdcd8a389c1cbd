//! A blocking management-socket client: a background reader thread pumps
//! [`crate::sock::mgmt::MgmtSocket`] frames, correlates command
//! completions/statuses back to the caller that issued them, and fans
//! unsolicited events out to registered listeners.
//!
//! The async `BluetoothSession` in `bluez-async/src/lib.rs` gets this for
//! free from D-Bus method calls and signal streams; here the same
//! request/reply-plus-broadcast shape is built by hand on top of a
//! [`std::sync::Condvar`], the same wait/notify idiom
//! [`crate::ringbuffer::Ringbuffer`] uses for its blocking get/put.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::callback::{Listeners, ListenerId};
use crate::error::MgmtStatus;
use crate::sock::mgmt::MgmtSocket;
use crate::{Error, Result};

use super::command::MgmtCommand;
use super::event::MgmtEvent;

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
const READER_POLL_TIMEOUT: Duration = Duration::from_millis(250);

struct PendingReply {
    request_opcode: u16,
    controller_index: u16,
    reply: Option<Result<Vec<u8>>>,
}

struct Shared {
    pending: Mutex<VecDeque<Arc<(Mutex<PendingReply>, Condvar)>>>,
    listeners: Listeners<MgmtEvent>,
    /// Held for the whole of one command/response round trip so two
    /// callers never have two indistinguishable requests (same opcode,
    /// same controller index) in flight at once.
    send_gate: Mutex<()>,
}

/// A running management client: owns the socket's reader thread for its
/// whole lifetime and joins it on drop.
pub struct MgmtClient {
    socket: Arc<MgmtSocket>,
    shared: Arc<Shared>,
    reader: Option<JoinHandle<()>>,
}

impl MgmtClient {
    /// Opens the management socket and starts its event pump thread.
    pub fn open() -> Result<Self> {
        let socket = Arc::new(MgmtSocket::open()?);
        socket.set_recv_timeout(READER_POLL_TIMEOUT)?;
        let shared = Arc::new(Shared {
            pending: Mutex::new(VecDeque::new()),
            listeners: Listeners::new(),
            send_gate: Mutex::new(()),
        });

        let reader_socket = Arc::clone(&socket);
        let reader_shared = Arc::clone(&shared);
        let reader = std::thread::Builder::new()
            .name("mgmt-reader".into())
            .spawn(move || reader_loop(reader_socket, reader_shared))
            .map_err(|e| Error::InvalidState(format!("failed to spawn mgmt reader thread: {e}")))?;

        Ok(MgmtClient {
            socket,
            shared,
            reader: Some(reader),
        })
    }

    /// Sends a command and blocks for its command-complete/status reply,
    /// matched by request opcode and controller index. Only one round trip
    /// per client is in flight on the wire at a time; concurrent callers
    /// queue behind each other rather than racing replies against the
    /// wrong pending request.
    pub fn send(&self, command: &MgmtCommand) -> Result<Vec<u8>> {
        self.send_with_timeout(command, DEFAULT_COMMAND_TIMEOUT)
    }

    pub fn send_with_timeout(&self, command: &MgmtCommand, timeout: Duration) -> Result<Vec<u8>> {
        let _gate = self.shared.send_gate.lock().unwrap();
        let slot = Arc::new((
            Mutex::new(PendingReply {
                request_opcode: command.opcode as u16,
                controller_index: command.controller_index,
                reply: None,
            }),
            Condvar::new(),
        ));
        self.shared.pending.lock().unwrap().push_back(Arc::clone(&slot));

        let send_result = self.socket.send_frame(&command.to_frame());
        if let Err(err) = send_result {
            self.shared
                .pending
                .lock()
                .unwrap()
                .retain(|p| !Arc::ptr_eq(p, &slot));
            return Err(err);
        }

        let (lock, cvar) = &*slot;
        let mut guard = lock.lock().unwrap();
        let deadline = Instant::now() + timeout;
        while guard.reply.is_none() {
            let now = Instant::now();
            if now >= deadline {
                self.shared
                    .pending
                    .lock()
                    .unwrap()
                    .retain(|p| !Arc::ptr_eq(p, &slot));
                return Err(Error::Timeout);
            }
            let (g, _) = cvar.wait_timeout(guard, deadline - now).unwrap();
            guard = g;
        }
        guard.reply.take().unwrap()
    }

    /// Registers a listener invoked for every event the reader thread
    /// observes, including command completions/statuses it also uses for
    /// request correlation; filter by variant in the listener body.
    pub fn add_listener<T: Send + Sync + 'static>(
        &self,
        receiver: Arc<T>,
        method: fn(&T, &MgmtEvent),
    ) -> ListenerId {
        self.shared.listeners.add_bound(receiver, method)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.shared.listeners.remove(id);
    }
}

impl Drop for MgmtClient {
    fn drop(&mut self) {
        let _ = self.socket.shutdown();
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

fn reader_loop(socket: Arc<MgmtSocket>, shared: Arc<Shared>) {
    loop {
        let frame = match socket.recv_frame() {
            Ok(frame) => frame,
            Err(Error::Timeout) => continue,
            Err(_) => {
                // Socket shut down or closed out from under us: no more
                // replies will ever arrive, so every caller still blocked
                // on a reply must be woken now rather than waiting out its
                // full timeout.
                drain_pending_as_interrupted(&shared);
                return;
            }
        };

        let event = match MgmtEvent::parse(&frame) {
            Ok(event) => event,
            Err(_) => continue,
        };

        match &event {
            MgmtEvent::CmdComplete {
                controller_index,
                request_opcode,
                status,
                return_params,
            } => {
                let reply = if status.is_success() {
                    Ok(return_params.clone())
                } else {
                    Err(Error::ControllerError(*status))
                };
                deliver_reply(&shared, *request_opcode, *controller_index, reply);
            }
            MgmtEvent::CmdStatus {
                controller_index,
                request_opcode,
                status,
            } => {
                if !status.is_success() {
                    deliver_reply(
                        &shared,
                        *request_opcode,
                        *controller_index,
                        Err(Error::ControllerError(*status)),
                    );
                }
            }
            _ => {}
        }

        shared.listeners.dispatch(&event);
    }
}

fn drain_pending_as_interrupted(shared: &Shared) {
    let mut pending = shared.pending.lock().unwrap();
    for slot in pending.drain(..) {
        let (lock, cvar) = &*slot;
        let mut guard = lock.lock().unwrap();
        if guard.reply.is_none() {
            guard.reply = Some(Err(Error::Interrupted));
        }
        cvar.notify_all();
    }
}

fn deliver_reply(shared: &Shared, request_opcode: u16, controller_index: u16, reply: Result<Vec<u8>>) {
    let mut pending = shared.pending.lock().unwrap();
    if let Some(pos) = pending.iter().position(|slot| {
        let guard = slot.0.lock().unwrap();
        guard.request_opcode == request_opcode
            && guard.controller_index == controller_index
            && guard.reply.is_none()
    }) {
        let slot = pending.remove(pos).unwrap();
        let (lock, cvar) = &*slot;
        lock.lock().unwrap().reply = Some(reply);
        cvar.notify_all();
    }
}
