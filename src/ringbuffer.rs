//! A bounded, thread-safe queue used to correlate ATT requests with their
//! responses and management commands with their completions.
//!
//! Grounded on `original_source/api/direct_bt/LFRingbuffer.hpp`: capacity+1
//! slots are allocated internally so that "full" and "empty" are always
//! distinguishable without a separate flag. Reader-side operations
//! (`get*`/`peek*`) serialize on their own mutex, writer-side operations
//! (`put*`) serialize on a separate one, and `size` is tracked with an
//! atomic counter so that a non-contending reader and writer can proceed
//! without blocking each other — only `clear`/`reset`/`recapacity` take
//! both locks at once.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

struct Storage<T> {
    slots: VecDeque<T>,
    capacity: usize,
}

/// A bounded SPSC-safe ring buffer of `T`, supporting blocking and
/// non-blocking `get`/`put` with optional timeouts.
pub struct Ringbuffer<T> {
    storage: Mutex<Storage<T>>,
    read_lock: Mutex<()>,
    write_lock: Mutex<()>,
    not_empty: Condvar,
    not_full: Condvar,
    size: AtomicUsize,
}

impl<T> Ringbuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Ringbuffer {
            storage: Mutex::new(Storage {
                slots: VecDeque::with_capacity(capacity),
                capacity,
            }),
            read_lock: Mutex::new(()),
            write_lock: Mutex::new(()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            size: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.lock().unwrap().capacity
    }

    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn free_slots(&self) -> usize {
        self.capacity() - self.size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_full(&self) -> bool {
        self.free_slots() == 0
    }

    /// Non-blocking dequeue; returns `None` if empty.
    pub fn get(&self) -> Option<T> {
        let _guard = self.read_lock.lock().unwrap();
        self.try_pop()
    }

    /// Blocking dequeue with a timeout in milliseconds; `0` waits
    /// indefinitely.
    pub fn get_blocking(&self, timeout_ms: u64) -> Option<T> {
        let _guard = self.read_lock.lock().unwrap();
        self.wait_and_pop(timeout_ms)
    }

    /// Non-blocking peek; the element remains queued.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        let _guard = self.read_lock.lock().unwrap();
        let storage = self.storage.lock().unwrap();
        storage.slots.front().cloned()
    }

    /// Blocking peek with a timeout in milliseconds; `0` waits
    /// indefinitely.
    pub fn peek_blocking(&self, timeout_ms: u64) -> Option<T>
    where
        T: Clone,
    {
        let _guard = self.read_lock.lock().unwrap();
        let mut storage = self.storage.lock().unwrap();
        if storage.slots.front().is_none() {
            storage = self.wait_not_empty(storage, timeout_ms)?;
        }
        storage.slots.front().cloned()
    }

    /// Non-blocking enqueue; returns `false` if full.
    pub fn put(&self, element: T) -> bool {
        let _guard = self.write_lock.lock().unwrap();
        self.try_push(element).is_ok()
    }

    /// Blocking enqueue with a timeout in milliseconds; `0` waits
    /// indefinitely. Returns `false` if the timeout elapsed before a slot
    /// freed up.
    pub fn put_blocking(&self, element: T, timeout_ms: u64) -> bool {
        let _guard = self.write_lock.lock().unwrap();
        match self.wait_and_push(element, timeout_ms) {
            Ok(()) => true,
            Err(_unsent) => false,
        }
    }

    /// Blocks until at least `n` slots are free.
    pub fn wait_for_free_slots(&self, n: usize) {
        let _guard = self.write_lock.lock().unwrap();
        let mut storage = self.storage.lock().unwrap();
        while storage.capacity - storage.slots.len() < n {
            storage = self.not_full.wait(storage).unwrap();
        }
    }

    /// Empties the buffer.
    pub fn clear(&self) {
        let _r = self.read_lock.lock().unwrap();
        let _w = self.write_lock.lock().unwrap();
        let mut storage = self.storage.lock().unwrap();
        storage.slots.clear();
        self.size.store(0, Ordering::Release);
        self.not_full.notify_all();
    }

    /// Replaces the contents with `src`, preserving capacity.
    pub fn reset(&self, src: impl IntoIterator<Item = T>) {
        let _r = self.read_lock.lock().unwrap();
        let _w = self.write_lock.lock().unwrap();
        let mut storage = self.storage.lock().unwrap();
        storage.slots.clear();
        for item in src {
            if storage.slots.len() < storage.capacity {
                storage.slots.push_back(item);
            }
        }
        self.size.store(storage.slots.len(), Ordering::Release);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Resizes the buffer's capacity. Fails (leaving the buffer untouched)
    /// if `n` is smaller than the current size.
    pub fn recapacity(&self, n: usize) -> bool {
        let _r = self.read_lock.lock().unwrap();
        let _w = self.write_lock.lock().unwrap();
        let mut storage = self.storage.lock().unwrap();
        if n < storage.slots.len() {
            return false;
        }
        storage.capacity = n;
        self.not_full.notify_all();
        true
    }

    fn try_pop(&self) -> Option<T> {
        let mut storage = self.storage.lock().unwrap();
        let popped = storage.slots.pop_front();
        if popped.is_some() {
            self.size.fetch_sub(1, Ordering::AcqRel);
            self.not_full.notify_one();
        }
        popped
    }

    fn try_push(&self, element: T) -> Result<(), T> {
        let mut storage = self.storage.lock().unwrap();
        if storage.slots.len() >= storage.capacity {
            return Err(element);
        }
        storage.slots.push_back(element);
        self.size.fetch_add(1, Ordering::AcqRel);
        self.not_empty.notify_one();
        Ok(())
    }

    fn wait_and_pop(&self, timeout_ms: u64) -> Option<T> {
        let mut storage = self.storage.lock().unwrap();
        if storage.slots.is_empty() {
            storage = self.wait_not_empty(storage, timeout_ms)?;
        }
        let popped = storage.slots.pop_front();
        if popped.is_some() {
            self.size.fetch_sub(1, Ordering::AcqRel);
            self.not_full.notify_one();
        }
        popped
    }

    fn wait_and_push(&self, element: T, timeout_ms: u64) -> Result<(), T> {
        let mut storage = self.storage.lock().unwrap();
        if storage.slots.len() >= storage.capacity {
            let deadline = deadline_for(timeout_ms);
            loop {
                storage = match deadline {
                    None => self.not_full.wait(storage).unwrap(),
                    Some(deadline) => {
                        let now = Instant::now();
                        if now >= deadline {
                            return Err(element);
                        }
                        let (s, timeout_result) =
                            self.not_full.wait_timeout(storage, deadline - now).unwrap();
                        if timeout_result.timed_out() && s.slots.len() >= s.capacity {
                            return Err(element);
                        }
                        s
                    }
                };
                if storage.slots.len() < storage.capacity {
                    break;
                }
            }
        }
        storage.slots.push_back(element);
        self.size.fetch_add(1, Ordering::AcqRel);
        self.not_empty.notify_one();
        Ok(())
    }

    fn wait_not_empty<'a>(
        &'a self,
        mut storage: std::sync::MutexGuard<'a, Storage<T>>,
        timeout_ms: u64,
    ) -> Option<std::sync::MutexGuard<'a, Storage<T>>> {
        let deadline = deadline_for(timeout_ms);
        while storage.slots.is_empty() {
            storage = match deadline {
                None => self.not_empty.wait(storage).unwrap(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    let (s, timeout_result) =
                        self.not_empty.wait_timeout(storage, deadline - now).unwrap();
                    if timeout_result.timed_out() && s.slots.is_empty() {
                        return None;
                    }
                    s
                }
            };
        }
        Some(storage)
    }
}

fn deadline_for(timeout_ms: u64) -> Option<Instant> {
    if timeout_ms == 0 {
        None
    } else {
        Some(Instant::now() + Duration::from_millis(timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn put_then_get_same_thread_returns_same_element() {
        let rb = Ringbuffer::new(4);
        assert!(rb.put(42));
        assert_eq!(rb.get(), Some(42));
    }

    #[test]
    fn get_on_empty_returns_none() {
        let rb: Ringbuffer<u8> = Ringbuffer::new(4);
        assert_eq!(rb.get(), None);
    }

    #[test]
    fn put_on_full_returns_false() {
        let rb = Ringbuffer::new(2);
        assert!(rb.put(1));
        assert!(rb.put(2));
        assert!(!rb.put(3));
    }

    #[test]
    fn size_plus_free_equals_capacity_always() {
        let rb = Ringbuffer::new(5);
        for i in 0..3 {
            rb.put(i);
        }
        assert_eq!(rb.size() + rb.free_slots(), rb.capacity());
        rb.get();
        assert_eq!(rb.size() + rb.free_slots(), rb.capacity());
    }

    #[test]
    fn clear_empties_and_resets_size() {
        let rb = Ringbuffer::new(4);
        rb.put(1);
        rb.put(2);
        rb.clear();
        assert_eq!(rb.size(), 0);
        assert_eq!(rb.get(), None);
    }

    #[test]
    fn fifo_order_preserved_single_thread() {
        let rb = Ringbuffer::new(8);
        for i in 0..5 {
            rb.put(i);
        }
        let out: Vec<_> = (0..5).map(|_| rb.get().unwrap()).collect();
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn fifo_order_preserved_across_producer_consumer_threads() {
        let rb = Arc::new(Ringbuffer::new(16));
        let producer = {
            let rb = rb.clone();
            thread::spawn(move || {
                for i in 0..1000 {
                    while !rb.put(i) {
                        thread::yield_now();
                    }
                }
            })
        };
        let consumer = {
            let rb = rb.clone();
            thread::spawn(move || {
                let mut out = Vec::with_capacity(1000);
                while out.len() < 1000 {
                    if let Some(v) = rb.get_blocking(1000) {
                        out.push(v);
                    }
                }
                out
            })
        };
        producer.join().unwrap();
        let out = consumer.join().unwrap();
        assert_eq!(out, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn blocking_get_wakes_on_put() {
        let rb = Arc::new(Ringbuffer::new(4));
        let reader = {
            let rb = rb.clone();
            thread::spawn(move || rb.get_blocking(0))
        };
        thread::sleep(Duration::from_millis(20));
        rb.put(7);
        assert_eq!(reader.join().unwrap(), Some(7));
    }

    #[test]
    fn get_blocking_times_out() {
        let rb: Ringbuffer<u8> = Ringbuffer::new(2);
        assert_eq!(rb.get_blocking(20), None);
    }

    #[test]
    fn recapacity_rejects_shrink_below_size() {
        let rb = Ringbuffer::new(4);
        rb.put(1);
        rb.put(2);
        assert!(!rb.recapacity(1));
        assert!(rb.recapacity(2));
    }

    #[test]
    fn reset_replaces_contents() {
        let rb = Ringbuffer::new(4);
        rb.put(99);
        rb.reset(vec![1, 2, 3]);
        assert_eq!(rb.size(), 3);
        assert_eq!(rb.get(), Some(1));
    }
}
