//! The ATT/GATT client state machine: MTU exchange, the three discovery
//! phases, reads (including long reads), writes, and notify/indicate
//! dispatch, all serialized to at most one in-flight request at a time.
//!
//! Grounded on `original_source/src/direct_bt/GATTHandler.cpp` (by far
//! the largest file in that tree) for the request/response sequencing —
//! one ATT request outstanding at a time, responses correlated back to
//! the sender through a queue rather than a stack of futures — and on
//! `bluez-async/src/{service,characteristic,descriptor}.rs` for the
//! Info struct split this module's discovery methods populate. The
//! request/response hand-off uses [`crate::ringbuffer::Ringbuffer`]
//! exactly as spec'd: the reader thread is the producer, the calling
//! thread blocks as the consumer.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::address::{Address, AddressType};
use crate::att::error::AttErrorCode;
use crate::att::pdu::{
    AttPdu, CharacteristicDeclEntry, CHARACTERISTIC_DECLARATION_UUID,
    CLIENT_CHARACTERISTIC_CONFIGURATION_UUID, PRIMARY_SERVICE_UUID,
};
use crate::callback::{ListenerId, Listeners};
use crate::gatt::characteristic::{CharacteristicInfo, CharacteristicProperties};
use crate::gatt::descriptor::DescriptorInfo;
use crate::gatt::service::ServiceInfo;
use crate::ringbuffer::Ringbuffer;
use crate::sock::l2cap::L2capSocket;
use crate::uuid::Uuid;
use crate::{Error, Result};

/// The ATT default MTU (Bluetooth Core Spec Vol 3 Part F §3.2.8), used
/// until a successful MTU exchange raises it.
const ATT_DEFAULT_MTU: u16 = 23;
/// The MTU this crate proposes during exchange; the effective MTU is the
/// smaller of this and the peer's proposal.
const ATT_PREFERRED_MTU: u16 = 517;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const CCCD_NOTIFY_BIT: u16 = 0x0001;
const CCCD_INDICATE_BIT: u16 = 0x0002;

/// A notification or indication delivered for one characteristic value
/// handle.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub value_handle: u16,
    pub value: Vec<u8>,
    pub confirm_required: bool,
}

struct Shared {
    responses: Ringbuffer<AttPdu>,
    notify_listeners: Listeners<Notification>,
    send_gate: Mutex<()>,
}

/// The byte-level transport a [`GattClient`] sends/receives PDUs over.
/// [`L2capSocket`] is the only production implementation; tests substitute
/// an in-memory channel so the request/response and long-read chunking
/// logic in this module can be exercised without a live kernel socket.
pub(crate) trait AttChannel: Send + Sync {
    fn send(&self, pdu: &[u8]) -> Result<()>;
    fn recv(&self, mtu: usize) -> Result<Vec<u8>>;
    fn shutdown(&self) -> Result<()>;
}

impl AttChannel for L2capSocket {
    fn send(&self, pdu: &[u8]) -> Result<()> {
        L2capSocket::send(self, pdu)
    }

    fn recv(&self, mtu: usize) -> Result<Vec<u8>> {
        L2capSocket::recv(self, mtu)
    }

    fn shutdown(&self) -> Result<()> {
        L2capSocket::shutdown(self)
    }
}

/// An open ATT/GATT client over one connected L2CAP channel.
pub struct GattClient {
    socket: Arc<dyn AttChannel>,
    mtu: AtomicU16,
    shared: Arc<Shared>,
    reader: Option<JoinHandle<()>>,
}

impl GattClient {
    /// Connects the L2CAP ATT channel to `peer` and performs the initial
    /// MTU exchange, per spec's rule that MTU exchange is the first
    /// operation after channel open and a failed/zero exchange closes the
    /// channel back to `Disconnected`.
    pub fn open(local: Address, peer: Address, peer_type: AddressType) -> Result<Self> {
        let socket = L2capSocket::connect(local, peer, peer_type)?;
        socket.set_recv_timeout(Duration::from_millis(250))?;
        Self::open_with_channel(Arc::new(socket))
    }

    /// As [`GattClient::open`], but over a caller-supplied channel; the
    /// real entry point builds a real [`L2capSocket`] and delegates here,
    /// tests substitute an in-memory [`AttChannel`] to drive the reader
    /// thread and request/response logic end to end without a kernel
    /// socket.
    pub(crate) fn open_with_channel(socket: Arc<dyn AttChannel>) -> Result<Self> {
        let shared = Arc::new(Shared {
            responses: Ringbuffer::new(1),
            notify_listeners: Listeners::new(),
            send_gate: Mutex::new(()),
        });

        let reader_socket = Arc::clone(&socket);
        let reader_shared = Arc::clone(&shared);
        let reader = std::thread::Builder::new()
            .name("gatt-reader".into())
            .spawn(move || reader_loop(reader_socket, reader_shared))
            .map_err(|e| Error::InvalidState(format!("failed to spawn GATT reader thread: {e}")))?;

        let client = GattClient {
            socket,
            mtu: AtomicU16::new(ATT_DEFAULT_MTU),
            shared,
            reader: Some(reader),
        };

        match client.exchange_mtu() {
            Ok(mtu) if mtu > 0 => Ok(client),
            _ => {
                let _ = client.socket.shutdown();
                Err(Error::InvalidState(
                    "MTU exchange failed or returned zero".into(),
                ))
            }
        }
    }

    pub fn mtu(&self) -> u16 {
        self.mtu.load(Ordering::SeqCst)
    }

    fn exchange_mtu(&self) -> Result<u16> {
        let rsp = self.request(AttPdu::ExchangeMtuReq {
            mtu: ATT_PREFERRED_MTU,
        })?;
        match rsp {
            AttPdu::ExchangeMtuRsp { mtu } => {
                let effective = mtu.min(ATT_PREFERRED_MTU).max(ATT_DEFAULT_MTU);
                self.mtu.store(effective, Ordering::SeqCst);
                Ok(effective)
            }
            other => Err(unexpected_response("ExchangeMtuRsp", &other)),
        }
    }

    /// Sends one request and blocks for its correlated response, holding
    /// the send gate for the whole round trip so only one ATT request is
    /// ever outstanding on this channel at a time.
    fn request(&self, pdu: AttPdu) -> Result<AttPdu> {
        let _gate = self.shared.send_gate.lock().unwrap();
        self.shared.responses.clear();
        self.socket.send(&pdu.encode())?;
        let timeout_ms = DEFAULT_REQUEST_TIMEOUT.as_millis() as u64;
        match self.shared.responses.get_blocking(timeout_ms) {
            Some(AttPdu::ErrorRsp {
                code,
                request_opcode,
                ..
            }) => Err(Error::AttError {
                code,
                request_opcode,
            }),
            Some(rsp) => Ok(rsp),
            None => Err(Error::Timeout),
        }
    }

    /// Primary service discovery via repeated `read-by-group-type-req`,
    /// terminating on `AttributeNotFound` or an end handle of `0xFFFF`.
    pub fn discover_services(&self) -> Result<Vec<ServiceInfo>> {
        let mut services = Vec::new();
        let mut start: u16 = 0x0001;
        loop {
            let rsp = self.request(AttPdu::ReadByGroupTypeReq {
                start_handle: start,
                end_handle: 0xffff,
                group_type: PRIMARY_SERVICE_UUID,
            });
            let entries = match rsp {
                Ok(AttPdu::ReadByGroupTypeRsp { entries }) => entries,
                Err(Error::AttError {
                    code: AttErrorCode::AttributeNotFound,
                    ..
                }) => break,
                Err(err) => return Err(err),
                Ok(other) => return Err(unexpected_response("ReadByGroupTypeRsp", &other)),
            };
            let last_end = entries.last().map(|e| e.end_handle).unwrap_or(start);
            for entry in entries {
                services.push(ServiceInfo {
                    start_handle: entry.start_handle,
                    end_handle: entry.end_handle,
                    uuid: entry.uuid,
                });
            }
            if last_end == 0xffff {
                break;
            }
            start = last_end + 1;
        }
        Ok(services)
    }

    /// Characteristic discovery via repeated `read-by-type-req` bounded by
    /// one service's handle range, followed by descriptor discovery
    /// between each characteristic's value handle and the next
    /// characteristic's declaration (or the service's end handle).
    pub fn discover_characteristics(&self, service: &ServiceInfo) -> Result<Vec<CharacteristicInfo>> {
        let decls = self.discover_characteristic_decls(service)?;
        let mut characteristics: Vec<CharacteristicInfo> = decls
            .iter()
            .map(|d| CharacteristicInfo {
                declaration_handle: d.decl_handle,
                value_handle: d.value_handle,
                uuid: d.value_uuid,
                properties: CharacteristicProperties::from_bits_truncate(d.properties),
                descriptors: Vec::new(),
            })
            .collect();

        for i in 0..characteristics.len() {
            let value_handle = characteristics[i].value_handle;
            let bound = characteristics
                .get(i + 1)
                .map(|next| next.declaration_handle - 1)
                .unwrap_or(service.end_handle);
            if value_handle >= bound {
                continue;
            }
            characteristics[i].descriptors =
                self.discover_descriptors(value_handle + 1, bound)?;
        }
        Ok(characteristics)
    }

    fn discover_characteristic_decls(&self, service: &ServiceInfo) -> Result<Vec<CharacteristicDeclEntry>> {
        let mut decls = Vec::new();
        let mut start = service.start_handle;
        loop {
            let rsp = self.request(AttPdu::ReadByTypeReq {
                start_handle: start,
                end_handle: service.end_handle,
                attribute_type: CHARACTERISTIC_DECLARATION_UUID,
            });
            let entries = match rsp {
                Ok(AttPdu::ReadByTypeRsp { entries }) => entries,
                Err(Error::AttError {
                    code: AttErrorCode::AttributeNotFound,
                    ..
                }) => break,
                Err(err) => return Err(err),
                Ok(other) => return Err(unexpected_response("ReadByTypeRsp", &other)),
            };
            let last_handle = entries.last().map(|e| e.decl_handle).unwrap_or(start);
            decls.extend(entries);
            if last_handle >= service.end_handle {
                break;
            }
            start = last_handle + 1;
        }
        Ok(decls)
    }

    fn discover_descriptors(&self, mut start: u16, end: u16) -> Result<Vec<DescriptorInfo>> {
        let mut descriptors = Vec::new();
        loop {
            if start > end {
                break;
            }
            let rsp = self.request(AttPdu::FindInformationReq {
                start_handle: start,
                end_handle: end,
            });
            let entries = match rsp {
                Ok(AttPdu::FindInformationRsp { entries }) => entries,
                Err(Error::AttError {
                    code: AttErrorCode::AttributeNotFound,
                    ..
                }) => break,
                Err(err) => return Err(err),
                Ok(other) => return Err(unexpected_response("FindInformationRsp", &other)),
            };
            let last_handle = entries.last().map(|e| e.handle).unwrap_or(start);
            for entry in entries {
                // Pre-read each descriptor's value at discovery time, as
                // the value is otherwise unknown until explicitly read.
                let value = self.read_value(entry.handle).unwrap_or_default();
                descriptors.push(DescriptorInfo {
                    handle: entry.handle,
                    uuid: entry.uuid,
                    value,
                });
            }
            if last_handle >= end {
                break;
            }
            start = last_handle + 1;
        }
        Ok(descriptors)
    }

    /// Reads a characteristic or descriptor value, continuing with
    /// `read-blob-req` while the peer keeps returning full-MTU chunks and
    /// stopping on a short final chunk or `AttributeNotLong`.
    pub fn read_value(&self, handle: u16) -> Result<Vec<u8>> {
        let rsp = self.request(AttPdu::ReadReq { handle })?;
        let mut value = match rsp {
            AttPdu::ReadRsp { value } => value,
            other => return Err(unexpected_response("ReadRsp", &other)),
        };

        let chunk_len = self.mtu() as usize - 1;
        while value.len() % chunk_len == 0 && !value.is_empty() {
            let more = match self.request(AttPdu::ReadBlobReq {
                handle,
                offset: value.len() as u16,
            }) {
                Ok(AttPdu::ReadBlobRsp { value: more }) => more,
                Err(Error::AttError {
                    code: AttErrorCode::AttributeNotLong,
                    ..
                }) => break,
                Err(err) => return Err(err),
                Ok(other) => return Err(unexpected_response("ReadBlobRsp", &other)),
            };
            if more.is_empty() {
                break;
            }
            let short = more.len() < chunk_len;
            value.extend(more);
            if short {
                break;
            }
        }
        Ok(value)
    }

    pub fn write_value_with_response(&self, handle: u16, value: &[u8]) -> Result<()> {
        match self.request(AttPdu::WriteReq {
            handle,
            value: value.to_vec(),
        })? {
            AttPdu::WriteRsp => Ok(()),
            other => Err(unexpected_response("WriteRsp", &other)),
        }
    }

    /// Fire-and-forget write; no response is expected or awaited.
    pub fn write_value_without_response(&self, handle: u16, value: &[u8]) -> Result<()> {
        self.socket.send(
            &AttPdu::WriteCmd {
                handle,
                value: value.to_vec(),
            }
            .encode(),
        )
    }

    /// Writes the Client Characteristic Configuration Descriptor to enable
    /// or disable notifications/indications.
    pub fn set_notify(&self, cccd_handle: u16, notify: bool, indicate: bool) -> Result<()> {
        let mut bits: u16 = 0;
        if notify {
            bits |= CCCD_NOTIFY_BIT;
        }
        if indicate {
            bits |= CCCD_INDICATE_BIT;
        }
        self.write_value_with_response(cccd_handle, &bits.to_le_bytes())
    }

    pub fn add_notify_listener(
        &self,
        value_handle: u16,
        f: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> ListenerId {
        self.shared
            .notify_listeners
            .add_captured(value_handle as u64, f)
    }

    pub fn remove_notify_listeners(&self, value_handle: u16) -> usize {
        self.shared.notify_listeners.remove_captured(value_handle as u64)
    }
}

impl Drop for GattClient {
    fn drop(&mut self) {
        let _ = self.socket.shutdown();
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

fn unexpected_response(expected: &str, got: &AttPdu) -> Error {
    Error::ProtocolError {
        message: format!("expected {expected}, got {:?}", got.opcode_byte()),
        opcode: got.opcode_byte(),
        bytes: got.encode(),
    }
}

fn reader_loop(socket: Arc<dyn AttChannel>, shared: Arc<Shared>) {
    loop {
        let mtu = 517usize; // generous upper bound; actual negotiated MTU only shrinks PDU sizes
        let bytes = match socket.recv(mtu) {
            Ok(bytes) => bytes,
            Err(Error::Timeout) => continue,
            Err(_) => return,
        };
        let pdu = match AttPdu::parse(&bytes) {
            Ok(pdu) => pdu,
            Err(_) => continue,
        };
        match pdu {
            AttPdu::HandleValueNtf { handle, value } => {
                shared.notify_listeners.dispatch(&Notification {
                    value_handle: handle,
                    value,
                    confirm_required: false,
                });
            }
            AttPdu::HandleValueInd { handle, value } => {
                shared.notify_listeners.dispatch(&Notification {
                    value_handle: handle,
                    value,
                    confirm_required: true,
                });
                let _ = socket.send(&AttPdu::HandleValueCfm.encode());
            }
            other => {
                shared.responses.put(other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    /// An in-memory [`AttChannel`] backed by a pair of
    /// [`std::sync::mpsc`] channels, so [`GattClient`]'s request/response
    /// and long-read chunking logic can be driven end to end against a
    /// fake peer thread instead of a live kernel L2CAP socket.
    struct MockChannel {
        to_peer: Mutex<mpsc::Sender<Vec<u8>>>,
        from_peer: Mutex<mpsc::Receiver<Vec<u8>>>,
        closed: std::sync::atomic::AtomicBool,
    }

    impl AttChannel for MockChannel {
        fn send(&self, pdu: &[u8]) -> Result<()> {
            self.to_peer
                .lock()
                .unwrap()
                .send(pdu.to_vec())
                .map_err(|_| Error::Interrupted)
        }

        fn recv(&self, _mtu: usize) -> Result<Vec<u8>> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(Error::Interrupted);
            }
            match self
                .from_peer
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_millis(50))
            {
                Ok(bytes) => Ok(bytes),
                Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::Timeout),
                Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::Interrupted),
            }
        }

        // Reader threads poll `recv` with a blocking timeout and have no
        // other way to observe that the client side is done; flipping
        // this flag is what lets the reader thread actually exit instead
        // of polling a channel nobody writes to again forever.
        fn shutdown(&self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn read_value_drives_real_long_read_chunking_through_a_mock_peer() {
        const VALUE_HANDLE: u16 = 0x0010;
        // 30 bytes: with a 23-byte negotiated MTU (22-byte chunk), the
        // first read-rsp fills a whole chunk and a read-blob-req/rsp is
        // required; the final 8-byte chunk is short, terminating the
        // read without the peer ever returning AttributeNotLong.
        let full_value: Vec<u8> = (0u8..30).collect();

        let (client_tx, peer_rx) = mpsc::channel::<Vec<u8>>();
        let (peer_tx, client_rx) = mpsc::channel::<Vec<u8>>();
        let channel: Arc<dyn AttChannel> = Arc::new(MockChannel {
            to_peer: Mutex::new(client_tx),
            from_peer: Mutex::new(client_rx),
            closed: std::sync::atomic::AtomicBool::new(false),
        });

        let peer_value = full_value.clone();
        let peer = std::thread::spawn(move || loop {
            let bytes = match peer_rx.recv() {
                Ok(bytes) => bytes,
                Err(_) => return,
            };
            let pdu = AttPdu::parse(&bytes).expect("client always sends well-formed PDUs");
            let response = match pdu {
                AttPdu::ExchangeMtuReq { .. } => AttPdu::ExchangeMtuRsp { mtu: 23 },
                AttPdu::ReadReq { handle } if handle == VALUE_HANDLE => AttPdu::ReadRsp {
                    value: peer_value[0..22].to_vec(),
                },
                AttPdu::ReadBlobReq { handle, offset } if handle == VALUE_HANDLE => AttPdu::ReadBlobRsp {
                    value: peer_value[offset as usize..].to_vec(),
                },
                _ => continue,
            };
            if peer_tx.send(response.encode()).is_err() {
                return;
            }
        });

        let client = GattClient::open_with_channel(channel).expect("mock MTU exchange succeeds");
        assert_eq!(client.mtu(), 23);
        let value = client.read_value(VALUE_HANDLE).expect("mock read succeeds");
        assert_eq!(value, full_value);

        drop(client);
        let _ = peer.join();
    }

    #[test]
    fn cccd_bits_combine_notify_and_indicate() {
        let mut bits: u16 = 0;
        bits |= CCCD_NOTIFY_BIT;
        bits |= CCCD_INDICATE_BIT;
        assert_eq!(bits.to_le_bytes(), [0x03, 0x00]);
    }

    #[test]
    fn unexpected_response_carries_actual_opcode() {
        let got = AttPdu::WriteRsp;
        let err = unexpected_response("ReadRsp", &got);
        match err {
            Error::ProtocolError { opcode, .. } => assert_eq!(opcode, got.opcode_byte()),
            other => panic!("unexpected error variant: {:?}", other),
        }
    }
}
