//! Lock-free single-producer single-consumer queues.
//!
//! Two flavours share one implementation: a fixed-capacity record queue
//! (device timing hand-off) and a growable byte/sample queue (the playback
//! buffer). Storage is a chain of segments; the producer links a fresh
//! segment when it runs out of room, so growth never moves live elements
//! under the consumer. Drained segments are recycled through a free-list
//! popped by the producer — the consumer never frees memory.
//!
//! A reader observes every element sequenced-before the producer's release
//! store of the segment's publish index; no other ordering is guaranteed.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

/// Creates a bounded SPSC queue. `append` writes as many elements as fit
/// and reports how many.
pub fn bounded<T: Copy + Default>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    channel(capacity, false)
}

/// Creates a growable SPSC queue with an initial capacity. `append` always
/// writes every element, allocating a new segment when the current one is
/// exhausted.
pub fn growable<T: Copy + Default>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    channel(capacity, true)
}

fn channel<T: Copy + Default>(capacity: usize, grow: bool) -> (Producer<T>, Consumer<T>) {
    assert!(capacity > 0);

    let seg = Segment::alloc(capacity);

    // bounded queues rotate through a second preallocated segment instead
    // of growing; the live-element clamp in append keeps the capacity exact
    let free = if grow {
        ptr::null_mut()
    } else {
        Segment::alloc(capacity)
    };

    let shared = Arc::new(Shared {
        prod: CachePadded::new(ProdSide {
            tail: AtomicPtr::new(seg),
        }),
        cons: CachePadded::new(ConsSide {
            head: AtomicPtr::new(seg),
            read: AtomicUsize::new(0),
        }),
        len: CachePadded::new(AtomicUsize::new(0)),
        free: AtomicPtr::new(free),
        seg_capacity: capacity,
        grow,
    });

    (
        Producer { shared: shared.clone() },
        Consumer { shared },
    )
}

struct Segment<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    /// Elements valid in this segment; written only by the producer.
    published: AtomicUsize,
    next: AtomicPtr<Segment<T>>,
    /// Free-list link; only touched while the segment is detached.
    free_next: UnsafeCell<*mut Segment<T>>,
}

impl<T> Segment<T> {
    fn alloc(capacity: usize) -> *mut Segment<T> {
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Box::into_raw(Box::new(Segment {
            slots,
            published: AtomicUsize::new(0),
            next: AtomicPtr::new(ptr::null_mut()),
            free_next: UnsafeCell::new(ptr::null_mut()),
        }))
    }
}

struct ProdSide<T> {
    tail: AtomicPtr<Segment<T>>,
}

struct ConsSide<T> {
    head: AtomicPtr<Segment<T>>,
    read: AtomicUsize,
}

struct Shared<T> {
    prod: CachePadded<ProdSide<T>>,
    cons: CachePadded<ConsSide<T>>,
    len: CachePadded<AtomicUsize>,
    /// Drained segments pushed by the consumer, reclaimed by the producer.
    free: AtomicPtr<Segment<T>>,
    seg_capacity: usize,
    grow: bool,
}

unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // sole owner at this point; free the live chain and the free-list.
        // elements are Copy in every instantiation, nothing to drop per slot.
        unsafe {
            let mut seg = *self.cons.head.get_mut();
            while !seg.is_null() {
                let boxed = Box::from_raw(seg);
                seg = boxed.next.load(Ordering::Relaxed);
            }

            let mut seg = *self.free.get_mut();
            while !seg.is_null() {
                let boxed = Box::from_raw(seg);
                seg = *boxed.free_next.get();
            }
        }
    }
}

pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

unsafe impl<T: Send> Send for Producer<T> {}
unsafe impl<T: Send> Send for Consumer<T> {}

impl<T: Copy + Default> Producer<T> {
    /// Appends `src`, returning how many elements were written. Growable
    /// queues always write the whole slice.
    pub fn append(&mut self, src: &[T]) -> usize {
        self.append_with(src.len(), |slot, i| unsafe {
            slot.write(MaybeUninit::new(src[i]));
        })
    }

    /// Appends `count` zeroed elements (writer slew).
    pub fn append_zeroed(&mut self, count: usize) -> usize {
        self.append_with(count, |slot, _| unsafe {
            slot.write(MaybeUninit::new(T::default()));
        })
    }

    pub fn len(&self) -> usize {
        self.shared.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append_with(
        &mut self,
        count: usize,
        write: impl Fn(*mut MaybeUninit<T>, usize),
    ) -> usize {
        let count = if self.shared.grow {
            count
        } else {
            // exact capacity bound on live elements; len can only shrink
            // under us, so this is never an over-admission
            let live = self.shared.len.load(Ordering::Acquire);
            count.min(self.shared.seg_capacity - live.min(self.shared.seg_capacity))
        };

        let mut written = 0;

        while written < count {
            let tail = self.shared.prod.tail.load(Ordering::Relaxed);
            let seg = unsafe { &*tail };

            let publish = seg.published.load(Ordering::Relaxed);
            let space = seg.slots.len() - publish;
            let n = space.min(count - written);

            for i in 0..n {
                write(seg.slots[publish + i].get(), written + i);
            }
            seg.published.store(publish + n, Ordering::Release);
            written += n;

            if written == count {
                break;
            }

            // current segment exhausted
            let Some(next) = self.next_segment(count - written) else {
                break;
            };
            seg.next.store(next, Ordering::Release);
            self.shared.prod.tail.store(next, Ordering::Relaxed);
        }

        if written > 0 {
            self.shared.len.fetch_add(written, Ordering::Release);
        }
        written
    }

    /// Reclaims a drained segment if one fits, allocating otherwise.
    /// Bounded queues never allocate: no recycled segment means the
    /// rotation partner is still being drained and the queue is full.
    fn next_segment(&mut self, needed: usize) -> Option<*mut Segment<T>> {
        let capacity = if self.shared.grow {
            self.shared.seg_capacity.max(needed)
        } else {
            self.shared.seg_capacity
        };

        let mut list = self.shared.free.swap(ptr::null_mut(), Ordering::Acquire);
        let mut reuse: *mut Segment<T> = ptr::null_mut();

        while !list.is_null() {
            let seg = unsafe { &*list };
            let next = unsafe { *seg.free_next.get() };

            if reuse.is_null() && seg.slots.len() >= capacity {
                seg.published.store(0, Ordering::Relaxed);
                seg.next.store(ptr::null_mut(), Ordering::Relaxed);
                reuse = list;
            } else {
                drop(unsafe { Box::from_raw(list) });
            }

            list = next;
        }

        if !reuse.is_null() {
            Some(reuse)
        } else if self.shared.grow {
            Some(Segment::alloc(capacity))
        } else {
            None
        }
    }
}

impl<T: Copy + Default> Consumer<T> {
    /// Copies out up to `dst.len()` elements, returning how many. Empty
    /// queues return 0; this never blocks.
    pub fn consume(&mut self, dst: &mut [T]) -> usize {
        self.consume_with(dst.len(), |slot, i| unsafe {
            dst[i] = ptr::read(slot).assume_init();
        })
    }

    /// Drops up to `count` elements (reader slew), returning how many.
    pub fn discard(&mut self, count: usize) -> usize {
        self.consume_with(count, |_, _| {})
    }

    /// Takes a single element.
    pub fn pop(&mut self) -> Option<T> {
        let mut value = [T::default()];
        (self.consume(&mut value) == 1).then(|| value[0])
    }

    pub fn len(&self) -> usize {
        self.shared.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn consume_with(
        &mut self,
        count: usize,
        mut read: impl FnMut(*const MaybeUninit<T>, usize),
    ) -> usize {
        let mut taken = 0;

        while taken < count {
            let head = self.shared.cons.head.load(Ordering::Relaxed);
            let seg = unsafe { &*head };

            let at = self.shared.cons.read.load(Ordering::Relaxed);
            let avail = seg.published.load(Ordering::Acquire) - at;

            if avail == 0 {
                // a fully consumed segment is only left behind once the
                // producer has linked its successor
                if at == seg.slots.len() {
                    let next = seg.next.load(Ordering::Acquire);
                    if !next.is_null() {
                        self.shared.cons.head.store(next, Ordering::Relaxed);
                        self.shared.cons.read.store(0, Ordering::Relaxed);
                        self.recycle(head);
                        continue;
                    }
                }
                break;
            }

            let n = avail.min(count - taken);
            for i in 0..n {
                read(seg.slots[at + i].get(), taken + i);
            }
            self.shared.cons.read.store(at + n, Ordering::Relaxed);
            taken += n;
        }

        if taken > 0 {
            self.shared.len.fetch_sub(taken, Ordering::Release);
        }
        taken
    }

    fn recycle(&mut self, seg: *mut Segment<T>) {
        let mut cur = self.shared.free.load(Ordering::Relaxed);
        loop {
            unsafe { *(*seg).free_next.get() = cur };
            match self.shared.free.compare_exchange_weak(
                cur,
                seg,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                // only the producer's swap can race us here
                Err(actual) => cur = actual,
            }
        }
    }
}

/// Overwrite-oldest sample history for stats sinks. One writer; any number
/// of readers, which may observe a window mid-overwrite (fine for display).
pub struct History {
    slots: Box<[AtomicU32Bits]>,
    /// Total pushes ever; the write cursor is `pushes % capacity`.
    pushes: AtomicUsize,
}

struct AtomicU32Bits(std::sync::atomic::AtomicU32);

impl History {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        let slots = (0..capacity)
            .map(|_| AtomicU32Bits(std::sync::atomic::AtomicU32::new(0)))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        History {
            slots,
            pushes: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, value: f32) {
        let at = self.pushes.load(Ordering::Relaxed);
        self.slots[at % self.slots.len()]
            .0
            .store(value.to_bits(), Ordering::Relaxed);
        self.pushes.store(at + 1, Ordering::Release);
    }

    pub fn push_count(&self) -> usize {
        self.pushes.load(Ordering::Acquire)
    }

    pub fn last(&self) -> Option<f32> {
        let pushes = self.pushes.load(Ordering::Acquire);
        if pushes == 0 {
            return None;
        }
        let at = (pushes - 1) % self.slots.len();
        Some(f32::from_bits(self.slots[at].0.load(Ordering::Relaxed)))
    }

    /// Copies the window oldest-first into `out`.
    pub fn snapshot(&self, out: &mut Vec<f32>) {
        out.clear();
        let pushes = self.pushes.load(Ordering::Acquire);
        let len = pushes.min(self.slots.len());
        let start = pushes - len;

        for i in start..pushes {
            let bits = self.slots[i % self.slots.len()].0.load(Ordering::Relaxed);
            out.push(f32::from_bits(bits));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fifo_order_and_count_across_threads() {
        const TOTAL: u64 = 100_000;

        // small initial capacity to force repeated growth + recycling
        let (mut tx, mut rx) = growable::<u64>(64);

        let producer = thread::spawn(move || {
            let mut next = 0u64;
            while next < TOTAL {
                let n = (next % 97 + 1).min(TOTAL - next);
                let chunk: Vec<u64> = (next..next + n).collect();
                assert_eq!(tx.append(&chunk), chunk.len());
                next += n;
            }
        });

        let mut seen = 0u64;
        let mut scratch = [0u64; 129];
        while seen < TOTAL {
            let n = rx.consume(&mut scratch);
            for value in &scratch[..n] {
                assert_eq!(*value, seen);
                seen += 1;
            }
        }

        producer.join().unwrap();
        assert_eq!(rx.len(), 0);
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn growable_append_never_truncates() {
        let (mut tx, mut rx) = growable::<u32>(8);

        let data: Vec<u32> = (0..1000).collect();
        assert_eq!(tx.append(&data), 1000);
        assert_eq!(tx.len(), 1000);

        let mut out = vec![0u32; 1000];
        assert_eq!(rx.consume(&mut out), 1000);
        assert_eq!(out, data);
    }

    #[test]
    fn bounded_append_is_partial_when_full() {
        let (mut tx, mut rx) = bounded::<u32>(16);

        let data: Vec<u32> = (0..20).collect();
        assert_eq!(tx.append(&data), 16);
        assert_eq!(tx.append(&data), 0);
        assert_eq!(tx.len(), 16);

        let mut out = vec![0u32; 4];
        assert_eq!(rx.consume(&mut out), 4);
        assert_eq!(out, vec![0, 1, 2, 3]);
    }

    #[test]
    fn bounded_rotates_indefinitely() {
        let (mut tx, mut rx) = bounded::<u32>(4);

        // steady post/poll traffic far beyond the capacity
        for i in 0..1000u32 {
            assert_eq!(tx.append(&[i]), 1, "append stalled at {i}");
            let mut out = [0u32; 1];
            assert_eq!(rx.consume(&mut out), 1);
            assert_eq!(out[0], i);
        }

        // and with the queue kept half full
        tx.append(&[10_000, 10_001]);
        for i in 0..1000u32 {
            assert_eq!(tx.append(&[i]), 1);
            let mut out = [0u32; 1];
            assert_eq!(rx.consume(&mut out), 1);
        }
        assert_eq!(rx.len(), 2);
    }

    #[test]
    fn zeroed_append_and_discard() {
        let (mut tx, mut rx) = growable::<f32>(32);

        tx.append(&[1.0, 2.0, 3.0]);
        tx.append_zeroed(4);
        tx.append(&[4.0]);
        assert_eq!(tx.len(), 8);

        assert_eq!(rx.discard(2), 2);

        let mut out = vec![9.0; 6];
        assert_eq!(rx.consume(&mut out), 6);
        assert_eq!(out, vec![3.0, 0.0, 0.0, 0.0, 0.0, 4.0]);

        // discard on empty is a no-op
        assert_eq!(rx.discard(10), 0);
    }

    #[test]
    fn segment_recycling_preserves_order() {
        let (mut tx, mut rx) = growable::<u32>(4);

        let mut expect = 0u32;
        for round in 0..200u32 {
            let chunk: Vec<u32> = (round * 7..round * 7 + 7).collect();
            tx.append(&chunk);

            let mut out = vec![0u32; 7];
            assert_eq!(rx.consume(&mut out), 7);
            for value in out {
                assert_eq!(value, expect);
                expect += 1;
            }
        }
    }

    #[test]
    fn history_overwrites_oldest() {
        let history = History::new(4);
        assert_eq!(history.last(), None);

        for i in 0..6 {
            history.push(i as f32);
        }

        assert_eq!(history.last(), Some(5.0));
        assert_eq!(history.push_count(), 6);

        let mut window = Vec::new();
        history.snapshot(&mut window);
        assert_eq!(window, vec![2.0, 3.0, 4.0, 5.0]);
    }
}
