//! Segment pool: address resolution, per-thread allocation, slot recycling.
//!
//! The pool owns up to `max_segments` segments. The segment vector grows
//! strictly monotonically; a segment, once created, is never freed during
//! the pool's lifetime, so raw slot pointers stay valid for as long as the
//! pool is alive.
//!
//! Allocation is biased into a per-thread segment to reduce contention.
//! When a thread's segment is exhausted, the pool hands it a segment from
//! the "not engaged" chain (segments returned by finished threads), then a
//! freshly created segment, then the newest segment as a shared fallback.
//! When every segment's watermark is exhausted, slots come from the
//! "released" chain of segments with non-empty free lists.
//!
//! Lock order: processes lock, then pool state lock, then a segment's own
//! mutex. The per-address monitors are layered above by the store.

use crate::element::{ELEMENT_EXIST, Element};
use crate::segment::{Segment, SegmentImage, StoreStat};
use parking_lot::Mutex;
use semgraph::addr::Addr;
use semgraph::consts::SEGMENT_CAPACITY;
use semgraph::error::{StoreError, StoreResult};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread::{self, ThreadId};

/// Chains of partially usable segments, guarded by the pool state lock.
#[derive(Debug, Default)]
struct PoolState {
    /// Segments returned by finished threads, spare capacity remaining.
    not_engaged: Vec<u32>,
    /// Segments whose free list is non-empty.
    released: Vec<u32>,
}

/// The segmented element pool.
pub(crate) struct SegmentPool {
    max_segments: u32,
    /// Grow-only segment vector; entry `n - 1` holds segment `n`.
    segments: Box<[OnceLock<Segment>]>,
    segments_count: AtomicU32,
    state: Mutex<PoolState>,
    /// Per-thread segment binding (0 = none bound).
    processes: Mutex<HashMap<ThreadId, u32>>,
}

impl SegmentPool {
    pub fn new(max_segments: u32) -> Self {
        let segments: Vec<OnceLock<Segment>> =
            (0..max_segments).map(|_| OnceLock::new()).collect();
        Self {
            max_segments,
            segments: segments.into_boxed_slice(),
            segments_count: AtomicU32::new(0),
            state: Mutex::new(PoolState::default()),
            processes: Mutex::new(HashMap::new()),
        }
    }

    /// Number of segments created so far.
    #[inline]
    pub fn segments_count(&self) -> u32 {
        self.segments_count.load(Ordering::Acquire)
    }

    /// Segment by its 1-based number, if created.
    #[inline]
    pub fn segment(&self, num: u32) -> Option<&Segment> {
        if num == 0 || num > self.segments_count() {
            return None;
        }
        self.segments[num as usize - 1].get()
    }

    /// Resolve an address to its slot, requiring a live element.
    ///
    /// The returned pointer is valid for the pool's lifetime; dereferencing
    /// requires the monitor covering the address.
    pub fn resolve_live(&self, addr: Addr) -> StoreResult<*mut Element> {
        if addr.seg == 0
            || addr.off == 0
            || addr.seg > self.max_segments
            || addr.off >= SEGMENT_CAPACITY
        {
            return Err(StoreError::AddrNotValid { addr });
        }
        let segment = self
            .segment(addr.seg)
            .ok_or(StoreError::AddrNotValid { addr })?;
        let ptr = segment.slot_ptr(addr.off);
        // SAFETY: reading the access byte may race a concurrent free; the
        // caller's monitor discipline makes the liveness answer stable for
        // any address it has locked.
        if unsafe { !(*ptr).flags.is_live() } {
            return Err(StoreError::AddrNotValid { addr });
        }
        Ok(ptr)
    }

    /// Allocate a slot and mark it live. The type word is zeroed; the
    /// caller writes the element type.
    pub fn allocate(&self) -> StoreResult<(Addr, *mut Element)> {
        if let Some((addr, ptr)) = self.allocate_from_thread_segment() {
            // SAFETY: the slot was just popped under the segment mutex and
            // is not yet published to any other thread.
            unsafe {
                (*ptr).flags.access |= ELEMENT_EXIST;
            }
            return Ok((addr, ptr));
        }
        if let Some((addr, ptr)) = self.allocate_from_released_chain() {
            // SAFETY: as above.
            unsafe {
                (*ptr).flags.access |= ELEMENT_EXIST;
            }
            return Ok((addr, ptr));
        }
        tracing::error!(
            max_segments = self.max_segments,
            "store is full; extend max_segments or erase elements"
        );
        Err(StoreError::FullMemory {
            max_segments: self.max_segments,
        })
    }

    /// Return a slot to its segment's free list. The caller must hold the
    /// write monitor for the address and have verified the slot is live.
    pub fn free_slot(&self, addr: Addr) -> StoreResult<()> {
        let segment = self
            .segment(addr.seg)
            .ok_or(StoreError::AddrNotValid { addr })?;
        let was_empty = segment.free_slot(addr.off);
        if was_empty {
            self.state.lock().released.push(addr.seg);
        }
        Ok(())
    }

    /// Bind an empty per-thread segment slot for the calling thread.
    pub fn begin_process(&self) {
        self.processes.lock().insert(thread::current().id(), 0);
    }

    /// Unbind the calling thread's segment, returning spare capacity to the
    /// not-engaged chain.
    pub fn end_process(&self) {
        let mut processes = self.processes.lock();
        let bound = processes.insert(thread::current().id(), 0).unwrap_or(0);
        if bound == 0 {
            return;
        }
        if let Some(segment) = self.segment(bound) {
            if segment.has_free_capacity() {
                self.state.lock().not_engaged.push(bound);
            }
        }
    }

    /// Accumulate element counters over every segment.
    pub fn collect_stat(&self) -> StoreStat {
        let mut stat = StoreStat::default();
        for num in 1..=self.segments_count() {
            if let Some(segment) = self.segment(num) {
                segment.collect_stat(&mut stat);
            }
        }
        stat
    }

    /// Snapshot every segment into plain images, in segment order.
    pub fn snapshot(&self) -> Vec<SegmentImage> {
        (1..=self.segments_count())
            .filter_map(|num| self.segment(num).map(Segment::to_image))
            .collect()
    }

    /// Install segments from a snapshot into an empty pool.
    pub fn install(&self, images: &[SegmentImage]) -> StoreResult<()> {
        let mut state = self.state.lock();
        if self.segments_count() != 0 {
            return Err(StoreError::InvalidParams);
        }
        for image in images {
            if image.num == 0
                || image.num > self.max_segments
                || image.num != self.segments_count() + 1
            {
                return Err(StoreError::Io {
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "snapshot segments out of order",
                    ),
                });
            }
            let index = image.num as usize - 1;
            let segment = Segment::from_image(image);
            if image.last_released != 0 {
                state.released.push(image.num);
            }
            if segment.has_free_capacity() {
                state.not_engaged.push(image.num);
            }
            let _ = self.segments[index].set(segment);
            self.segments_count.store(image.num, Ordering::Release);
        }
        Ok(())
    }

    /// Fast path: take a slot from the segment bound to this thread,
    /// rebinding from the pool's chains when the current one is exhausted.
    fn allocate_from_thread_segment(&self) -> Option<(Addr, *mut Element)> {
        let thread = thread::current().id();

        let bound = *self.processes.lock().get(&thread).unwrap_or(&0);
        if bound != 0 {
            if let Some(segment) = self.segment(bound) {
                if let Some(off) = segment.allocate_slot() {
                    return Some((Addr::new(bound, off), segment.slot_ptr(off)));
                }
            }
        }

        // Slow path: rebind under the processes + pool state locks.
        let mut processes = self.processes.lock();
        let mut state = self.state.lock();

        let num = self
            .pop_not_engaged(&mut state)
            .or_else(|| self.create_segment())
            .or_else(|| self.last_segment_with_capacity());

        let num = match num {
            Some(num) => num,
            None => return None,
        };
        processes.insert(thread, num);
        drop(state);
        drop(processes);

        let segment = self.segment(num)?;
        let off = segment.allocate_slot()?;
        Some((Addr::new(num, off), segment.slot_ptr(off)))
    }

    /// Pop a usable segment from the not-engaged chain.
    fn pop_not_engaged(&self, state: &mut PoolState) -> Option<u32> {
        while let Some(num) = state.not_engaged.pop() {
            if let Some(segment) = self.segment(num) {
                if segment.has_free_capacity() {
                    return Some(num);
                }
            }
        }
        None
    }

    /// Create a new segment below the ceiling.
    fn create_segment(&self) -> Option<u32> {
        let count = self.segments_count();
        if count == self.max_segments {
            return None;
        }
        let num = count + 1;
        let _ = self.segments[count as usize].set(Segment::new(num));
        self.segments_count.store(num, Ordering::Release);
        Some(num)
    }

    /// Shared fallback: the newest segment, if its watermark or free list
    /// still has room.
    fn last_segment_with_capacity(&self) -> Option<u32> {
        let count = self.segments_count();
        if count == 0 {
            return None;
        }
        let segment = self.segment(count)?;
        segment.has_free_capacity().then_some(count)
    }

    /// Last resort: pop a recycled slot from any segment on the released
    /// chain. Bounded by the number of chained segments.
    fn allocate_from_released_chain(&self) -> Option<(Addr, *mut Element)> {
        let mut state = self.state.lock();
        while let Some(num) = state.released.pop() {
            let Some(segment) = self.segment(num) else {
                continue;
            };
            let Some((off, more_released)) = segment.allocate_released_slot() else {
                continue;
            };
            if more_released {
                state.released.push(num);
            }
            return Some((Addr::new(num, off), segment.slot_ptr(off)));
        }
        None
    }
}
