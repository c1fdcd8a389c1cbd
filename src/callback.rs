//! A typed listener registry for status/event dispatch (device discovery,
//! connection state changes, characteristic notifications, ...).
//!
//! Grounded on `original_source/api/direct_bt/FunctionDef.hpp` /
//! `ClassFunction.hpp`: the C++ stack needed a hand-rolled function-object
//! type because `std::function` cannot be compared for identity, and a
//! registry needs identity to support removing a previously-added listener.
//! Rust's `fn` pointers already carry that identity (they compare equal by
//! address), so the free-function and bound-method flavors below lean on
//! that directly; only the "captured closure" flavor needs an explicit
//! identity token, mirroring the split there between `FunctionDef`,
//! `ClassFunction` and a capturing `InvocationFunc` subclass.
//!
//! Dispatch takes a snapshot of the registered listeners (cloned `Arc`
//! handles, not a lock) before invoking any of them, so that a listener
//! which adds/removes another listener during its own call does not affect
//! the in-flight dispatch round.

use std::fmt;
use std::sync::{Arc, Mutex};

/// An opaque token identifying one registered listener, returned by every
/// `add_*` method so it can later be passed to [`Listeners::remove`].
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct ListenerId(u64);

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ListenerId({})", self.0)
    }
}

/// Identity used to find a listener again without its [`ListenerId`], e.g.
/// to deduplicate re-registration of the "same" logical listener.
#[derive(Clone, Copy, PartialEq)]
enum Identity {
    Free(usize),
    Method(*const ()),
    Captured(u64),
}

struct Entry<A> {
    listener_id: ListenerId,
    identity: Identity,
    call: Arc<dyn Fn(&A) + Send + Sync>,
}

/// A registry of listeners for events of type `A`, supporting add/remove by
/// identity and snapshot-isolated dispatch.
pub struct Listeners<A> {
    entries: Mutex<Vec<Entry<A>>>,
    next_id: Mutex<u64>,
}

impl<A> Default for Listeners<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> Listeners<A> {
    pub fn new() -> Self {
        Listeners {
            entries: Mutex::new(Vec::new()),
            next_id: Mutex::new(0),
        }
    }

    fn allocate_id(&self) -> ListenerId {
        let mut next = self.next_id.lock().unwrap();
        let id = *next;
        *next += 1;
        ListenerId(id)
    }

    fn push(&self, identity: Identity, call: Arc<dyn Fn(&A) + Send + Sync>) -> ListenerId {
        let listener_id = self.allocate_id();
        self.entries.lock().unwrap().push(Entry {
            listener_id,
            identity,
            call,
        });
        listener_id
    }

    /// Registers a free function. Adding the same function pointer twice
    /// yields two distinct [`ListenerId`]s; both fire on dispatch until one
    /// is removed.
    pub fn add_fn(&self, f: fn(&A)) -> ListenerId {
        self.push(Identity::Free(f as usize), Arc::new(move |event: &A| f(event)))
    }

    /// Registers a method bound to `receiver`, identified by `receiver`'s
    /// pointer identity so [`Listeners::remove_bound`] can find it again
    /// without a token.
    pub fn add_bound<T: Send + Sync + 'static>(
        &self,
        receiver: Arc<T>,
        method: fn(&T, &A),
    ) -> ListenerId {
        let identity = Identity::Method(Arc::as_ptr(&receiver) as *const ());
        let call = Arc::new(move |event: &A| method(&receiver, event));
        self.push(identity, call)
    }

    /// Registers a capturing closure under an explicit identity `id`,
    /// supplied by the caller (e.g. a device address or handle) so the same
    /// logical subscription can be looked up and replaced idempotently.
    pub fn add_captured<F>(&self, id: u64, call: F) -> ListenerId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.push(Identity::Captured(id), Arc::new(call))
    }

    /// Removes a listener by the token returned from `add_*`.
    pub fn remove(&self, listener_id: ListenerId) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| e.listener_id != listener_id);
        entries.len() != before
    }

    /// Removes every bound-method listener matching `receiver`'s pointer
    /// identity, without needing its [`ListenerId`].
    pub fn remove_bound<T>(&self, receiver: &Arc<T>) -> usize {
        let target = Identity::Method(Arc::as_ptr(receiver) as *const ());
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| e.identity != target);
        before - entries.len()
    }

    /// Removes every captured-closure listener registered under `id`.
    pub fn remove_captured(&self, id: u64) -> usize {
        let target = Identity::Captured(id);
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| e.identity != target);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispatches `event` to every currently-registered listener. The
    /// listener list is snapshotted (`Arc` clones, not the lock itself)
    /// before dispatch begins, so a listener that calls back into
    /// `add_*`/`remove*` during dispatch does not affect this round.
    ///
    /// A listener that panics is caught and logged; dispatch continues with
    /// the remaining listeners. This runs on the shared event pump thread,
    /// so one misbehaving listener must never take the pump down with it.
    pub fn dispatch(&self, event: &A) {
        let snapshot: Vec<Arc<dyn Fn(&A) + Send + Sync>> = {
            let entries = self.entries.lock().unwrap();
            entries.iter().map(|e| e.call.clone()).collect()
        };
        for call in &snapshot {
            let call = std::panic::AssertUnwindSafe(|| call(event));
            if let Err(payload) = std::panic::catch_unwind(call) {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                log::error!("listener panicked during dispatch: {}", message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn free_function_dispatch() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        fn listener(_: &u32) {
            HITS.fetch_add(1, Ordering::SeqCst);
        }
        let listeners: Listeners<u32> = Listeners::new();
        listeners.add_fn(listener);
        listeners.dispatch(&7);
        assert_eq!(HITS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_by_id_stops_dispatch() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        fn listener(_: &u32) {
            HITS.fetch_add(1, Ordering::SeqCst);
        }
        let listeners: Listeners<u32> = Listeners::new();
        let id = listeners.add_fn(listener);
        assert!(listeners.remove(id));
        listeners.dispatch(&7);
        assert_eq!(HITS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn captured_closure_dispatch_and_remove() {
        let count = Arc::new(Mutex::new(0));
        let listeners: Listeners<u32> = Listeners::new();
        {
            let count = count.clone();
            listeners.add_captured(1, move |v| *count.lock().unwrap() += v);
        }
        listeners.dispatch(&5);
        assert_eq!(*count.lock().unwrap(), 5);
        assert_eq!(listeners.remove_captured(1), 1);
        listeners.dispatch(&5);
        assert_eq!(*count.lock().unwrap(), 5);
    }

    struct Counter {
        hits: Mutex<u32>,
    }

    impl Counter {
        fn on_event(&self, v: &u32) {
            *self.hits.lock().unwrap() += v;
        }
    }

    #[test]
    fn bound_method_dispatch_and_remove_by_receiver() {
        let counter = Arc::new(Counter {
            hits: Mutex::new(0),
        });
        let listeners: Listeners<u32> = Listeners::new();
        listeners.add_bound(counter.clone(), Counter::on_event);
        listeners.dispatch(&3);
        assert_eq!(*counter.hits.lock().unwrap(), 3);
        assert_eq!(listeners.remove_bound(&counter), 1);
        listeners.dispatch(&3);
        assert_eq!(*counter.hits.lock().unwrap(), 3);
    }

    #[test]
    fn dispatch_snapshot_isolated_from_concurrent_add() {
        let listeners: Arc<Listeners<u32>> = Arc::new(Listeners::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let listeners2 = listeners.clone();
            let seen = seen.clone();
            listeners.add_captured(1, move |v| {
                seen.lock().unwrap().push(*v);
                // Registering a second listener during dispatch must not be
                // visible to this in-flight dispatch round.
                listeners2.add_fn(|_| {});
            });
        }
        listeners.dispatch(&1);
        assert_eq!(listeners.len(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn panicking_listener_does_not_stop_later_listeners() {
        let listeners: Listeners<u32> = Listeners::new();
        listeners.add_captured(1, |_| panic!("boom"));
        let seen = Arc::new(Mutex::new(0));
        {
            let seen = seen.clone();
            listeners.add_captured(2, move |v| *seen.lock().unwrap() = *v);
        }
        listeners.dispatch(&9);
        assert_eq!(*seen.lock().unwrap(), 9);
    }

    #[test]
    fn two_registrations_of_same_free_fn_both_fire() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        fn listener(_: &u32) {
            HITS.fetch_add(1, Ordering::SeqCst);
        }
        let listeners: Listeners<u32> = Listeners::new();
        listeners.add_fn(listener);
        listeners.add_fn(listener);
        listeners.dispatch(&1);
        assert_eq!(HITS.load(Ordering::SeqCst), 2);
    }
}
