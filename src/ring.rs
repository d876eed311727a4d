//! SPSC ring - wait-free single-producer/single-consumer queue.
//!
//! A power-of-two ring of slots with monotonically increasing head and
//! tail counters on separate cache lines, so producer stores and
//! consumer stores never invalidate the same line. The only
//! synchronisation is the acquire/release pairing on the counters:
//!
//! - the producer writes the slot, then release-stores the new tail;
//! - the consumer acquire-loads the tail, then reads the slot.
//!
//! Any store into slot `i` published under tail `i + 1` is therefore
//! visible to a consumer that observes a tail `>= i + 1`. Each handle
//! caches the counter it does not own and refreshes it only when the
//! ring looks full/empty, eliding one atomic load per call on the fast
//! path.
//!
//! `Full` and `Empty` are backpressure signals, not errors: the caller
//! decides whether to spin, park, or drop.

use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Pads and aligns its contents to a 64-byte cache line.
#[repr(align(64))]
struct CachePadded<T>(T);

/// Shared state of one ring. Owned jointly by the two handles.
struct RingBuffer<T> {
    /// Index of the next slot the consumer will read. Monotonic, never
    /// wrapped to the buffer; slot index is `head & mask`.
    head: CachePadded<AtomicU64>,

    /// Index of the next slot the producer will write. Monotonic.
    tail: CachePadded<AtomicU64>,

    mask: u64,

    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// The two handles hand values across threads; slot access is serialised
// by the head/tail protocol above.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Raw pointer to the slot for a monotonic index.
    ///
    /// # Safety
    /// The caller must hold exclusive access to this slot under the
    /// head/tail protocol.
    #[inline]
    unsafe fn slot(&self, index: u64) -> *mut T {
        self.slots
            .get_unchecked((index & self.mask) as usize)
            .get()
            .cast::<T>()
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        // Both handles are gone; drop whatever is still in flight.
        let mut head = *self.head.0.get_mut();
        let tail = *self.tail.0.get_mut();
        while head != tail {
            unsafe {
                self.slot(head).drop_in_place();
            }
            head = head.wrapping_add(1);
        }
    }
}

/// Create a ring with the given power-of-two capacity, returning its
/// two endpoints. Each endpoint must stay on a single thread for the
/// ring's lifetime (they are `Send`, so that thread may be chosen
/// after construction).
///
/// # Panics
/// Panics if `capacity` is zero or not a power of two.
pub fn ring<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(capacity > 0, "ring capacity must be non-zero");
    assert!(
        capacity.is_power_of_two(),
        "ring capacity must be a power of two"
    );

    let slots: Box<[UnsafeCell<MaybeUninit<T>>]> = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect();

    let buffer = Arc::new(RingBuffer {
        head: CachePadded(AtomicU64::new(0)),
        tail: CachePadded(AtomicU64::new(0)),
        mask: capacity as u64 - 1,
        slots,
    });

    (
        Producer {
            buffer: Arc::clone(&buffer),
            cached_head: 0,
        },
        Consumer {
            buffer,
            cached_tail: 0,
        },
    )
}

/// The write endpoint. Exactly one per ring.
pub struct Producer<T> {
    buffer: Arc<RingBuffer<T>>,
    /// Last observed consumer head; refreshed only when full.
    cached_head: u64,
}

/// The read endpoint. Exactly one per ring.
pub struct Consumer<T> {
    buffer: Arc<RingBuffer<T>>,
    /// Last observed producer tail; refreshed only when empty.
    cached_tail: u64,
}

/// Push failed because the ring is full; the value is handed back.
pub struct PushError<T>(pub T);

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PushError::Full")
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ring is full")
    }
}

/// Pop failed because the ring is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopError;

impl fmt::Display for PopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ring is empty")
    }
}

impl std::error::Error for PopError {}

impl<T> Producer<T> {
    /// Attempt to enqueue `value`. Wait-free; never blocks.
    #[inline]
    pub fn push(&mut self, value: T) -> Result<(), PushError<T>> {
        let tail = self.buffer.tail.0.load(Ordering::Relaxed);
        let capacity = self.buffer.capacity() as u64;

        if tail.wrapping_sub(self.cached_head) == capacity {
            self.cached_head = self.buffer.head.0.load(Ordering::Acquire);
            if tail.wrapping_sub(self.cached_head) == capacity {
                return Err(PushError(value));
            }
        }

        unsafe {
            self.buffer.slot(tail).write(value);
        }
        self.buffer
            .tail
            .0
            .store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Ring capacity in slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}

impl<T> Consumer<T> {
    /// Attempt to dequeue the oldest value. Wait-free; never blocks.
    #[inline]
    pub fn pop(&mut self) -> Result<T, PopError> {
        let head = self.buffer.head.0.load(Ordering::Relaxed);

        if head == self.cached_tail {
            self.cached_tail = self.buffer.tail.0.load(Ordering::Acquire);
            if head == self.cached_tail {
                return Err(PopError);
            }
        }

        let value = unsafe { self.buffer.slot(head).read() };
        self.buffer
            .head
            .0
            .store(head.wrapping_add(1), Ordering::Release);
        Ok(value)
    }

    /// True when no value is currently visible to this endpoint.
    #[inline]
    pub fn is_empty(&self) -> bool {
        let head = self.buffer.head.0.load(Ordering::Relaxed);
        self.buffer.tail.0.load(Ordering::Acquire) == head
    }

    /// Ring capacity in slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_push_pop_roundtrip() {
        let (mut tx, mut rx) = ring::<u64>(4);

        assert!(rx.pop().is_err());
        tx.push(1).unwrap();
        tx.push(2).unwrap();
        assert_eq!(rx.pop(), Ok(1));
        assert_eq!(rx.pop(), Ok(2));
        assert_eq!(rx.pop(), Err(PopError));
    }

    #[test]
    fn test_full_hands_value_back() {
        let (mut tx, mut rx) = ring::<u32>(2);
        tx.push(10).unwrap();
        tx.push(20).unwrap();

        let err = tx.push(30).unwrap_err();
        assert_eq!(err.0, 30);

        assert_eq!(rx.pop(), Ok(10));
        tx.push(30).unwrap();
        assert_eq!(rx.pop(), Ok(20));
        assert_eq!(rx.pop(), Ok(30));
    }

    #[test]
    fn test_wraparound() {
        let (mut tx, mut rx) = ring::<usize>(4);

        // Cycle far past the capacity so head/tail wrap the mask many times.
        for i in 0..1000 {
            tx.push(i).unwrap();
            assert_eq!(rx.pop(), Ok(i));
        }
        assert!(rx.is_empty());
    }

    #[test]
    fn test_two_thread_transfer() {
        const COUNT: u64 = 1_000_000;
        let (mut tx, mut rx) = ring::<u64>(1024);

        let producer = std::thread::spawn(move || {
            for i in 0..COUNT {
                let mut v = i;
                loop {
                    match tx.push(v) {
                        Ok(()) => break,
                        Err(PushError(back)) => {
                            v = back;
                            std::hint::spin_loop();
                        }
                    }
                }
            }
        });

        let mut sum = 0u64;
        let mut received = 0u64;
        while received < COUNT {
            match rx.pop() {
                Ok(v) => {
                    // Order within the single producer must be preserved.
                    assert_eq!(v, received);
                    sum = sum.wrapping_add(v);
                    received += 1;
                }
                Err(PopError) => std::hint::spin_loop(),
            }
        }

        producer.join().unwrap();
        assert_eq!(sum, COUNT * (COUNT - 1) / 2);
    }

    #[test]
    fn test_in_flight_values_dropped() {
        struct Token(Arc<AtomicUsize>);
        impl Drop for Token {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let (mut tx, mut rx) = ring::<Token>(8);

        for _ in 0..3 {
            tx.push(Token(Arc::clone(&drops))).unwrap();
        }
        drop(rx.pop().unwrap());
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        // Two values still in flight; dropping both endpoints drops them.
        drop(tx);
        drop(rx);
        assert_eq!(drops.load(Ordering::SeqCst), 3);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_capacity_must_be_power_of_two() {
        let _ = ring::<u8>(6);
    }
}
