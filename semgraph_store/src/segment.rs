//! Segments: fixed-size arrays of element slots.
//!
//! A segment owns `SEGMENT_CAPACITY` slots; slot 0 is reserved. Slots are
//! handed out by bumping the `last_engaged` watermark and recycled through a
//! per-segment free list threaded through the freed slots' type words with
//! the head kept out-of-band in [`SegmentState`].
//!
//! Slot contents are accessed through raw pointers under the sharded
//! address-monitor discipline owned by the store; the segment's own mutex
//! covers only the allocation state and the free list.

use crate::element::Element;
use parking_lot::Mutex;
use semgraph::consts::SEGMENT_CAPACITY;
use semgraph::error::{StoreError, StoreResult};
use std::cell::UnsafeCell;
use std::io::{Read, Write};

/// Element counters returned by `get_elements_stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStat {
    /// Live node elements.
    pub nodes: u64,
    /// Live link elements.
    pub links: u64,
    /// Live connector elements (arcs and edges).
    pub connectors: u64,
    /// Engaged slots currently on a free list.
    pub free: u64,
}

/// Allocation state of one segment, guarded by the segment mutex.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SegmentState {
    /// Highest offset ever handed out (0 = none; slot 0 is reserved).
    pub last_engaged: u32,
    /// Head of the free list of recycled slots (0 = empty).
    pub last_released: u32,
}

/// A fixed array of element slots plus its allocation state.
pub(crate) struct Segment {
    num: u32,
    slots: Box<[UnsafeCell<Element>]>,
    state: Mutex<SegmentState>,
}

// Slot access is synchronized by the address-monitor table (slot contents)
// and the segment mutex (allocation state and freed slots).
unsafe impl Send for Segment {}
unsafe impl Sync for Segment {}

impl Segment {
    /// Create an empty segment with the given 1-based number.
    pub fn new(num: u32) -> Self {
        debug_assert!(num >= 1);
        let slots: Vec<UnsafeCell<Element>> = (0..SEGMENT_CAPACITY)
            .map(|_| UnsafeCell::new(Element::default()))
            .collect();
        Self {
            num,
            slots: slots.into_boxed_slice(),
            state: Mutex::new(SegmentState::default()),
        }
    }

    /// Raw pointer to a slot. The pointer stays valid for the segment's
    /// lifetime; dereferencing requires the monitor covering the slot's
    /// address (or the segment mutex for free-list bookkeeping).
    #[inline]
    pub fn slot_ptr(&self, off: u32) -> *mut Element {
        debug_assert!(off < SEGMENT_CAPACITY);
        self.slots[off as usize].get()
    }

    /// True while the segment can still produce a slot without help from
    /// the pool (spare watermark capacity or a non-empty free list).
    pub fn has_free_capacity(&self) -> bool {
        let st = self.state.lock();
        st.last_released != 0 || st.last_engaged + 1 < SEGMENT_CAPACITY
    }

    /// Hand out one slot, preferring the free list over the watermark.
    ///
    /// The returned slot has a zeroed type word and `ELEMENT_EXIST` clear.
    pub fn allocate_slot(&self) -> Option<u32> {
        let mut st = self.state.lock();
        if st.last_released != 0 {
            let off = st.last_released;
            // SAFETY: the slot is on the free list, so no live element
            // aliases it; the segment mutex serializes free-list access.
            let el = unsafe { &mut *self.slot_ptr(off) };
            st.last_released = el.free_next();
            el.flags.type_word = 0;
            Some(off)
        } else if st.last_engaged + 1 < SEGMENT_CAPACITY {
            st.last_engaged += 1;
            Some(st.last_engaged)
        } else {
            None
        }
    }

    /// Pop a recycled slot only. Returns the offset and whether the free
    /// list still holds more slots afterwards.
    pub fn allocate_released_slot(&self) -> Option<(u32, bool)> {
        let mut st = self.state.lock();
        if st.last_released == 0 {
            return None;
        }
        let off = st.last_released;
        // SAFETY: as in `allocate_slot`.
        let el = unsafe { &mut *self.slot_ptr(off) };
        st.last_released = el.free_next();
        el.flags.type_word = 0;
        Some((off, st.last_released != 0))
    }

    /// Return a slot to the free list. Returns true when the free list was
    /// previously empty (the pool then chains this segment as released).
    ///
    /// The caller must hold the write monitor for the slot's address so no
    /// reader observes the transition.
    pub fn free_slot(&self, off: u32) -> bool {
        debug_assert!(off >= 1 && off < SEGMENT_CAPACITY);
        let mut st = self.state.lock();
        let was_empty = st.last_released == 0;
        // SAFETY: caller holds the slot's write monitor; the segment mutex
        // serializes the free-list threading.
        unsafe {
            *self.slot_ptr(off) = Element::freed(st.last_released);
        }
        st.last_released = off;
        was_empty
    }

    /// Accumulate element counters over the engaged slots.
    pub fn collect_stat(&self, stat: &mut StoreStat) {
        let st = self.state.lock();
        for off in 1..=st.last_engaged {
            // SAFETY: reads may race a concurrent type refinement; counters
            // are statistics, a torn read only misclassifies one element.
            let el = unsafe { &*self.slot_ptr(off) };
            if !el.flags.is_live() {
                stat.free += 1;
            } else {
                let ty = el.flags.element_type();
                if ty.is_connector() {
                    stat.connectors += 1;
                } else if ty.is_link() {
                    stat.links += 1;
                } else if ty.is_node() {
                    stat.nodes += 1;
                }
            }
        }
    }

    /// Copy the segment into a plain snapshot image.
    pub fn to_image(&self) -> SegmentImage {
        let st = self.state.lock();
        let mut slots = Vec::with_capacity(st.last_engaged as usize);
        for off in 1..=st.last_engaged {
            // SAFETY: snapshotting runs with mutators quiesced at the store
            // level; a torn slot would only affect the saved image.
            slots.push(unsafe { *self.slot_ptr(off) });
        }
        SegmentImage {
            num: self.num,
            last_engaged: st.last_engaged,
            last_released: st.last_released,
            slots,
        }
    }

    /// Rebuild a segment from a snapshot image.
    pub fn from_image(image: &SegmentImage) -> Self {
        let segment = Segment::new(image.num);
        {
            let mut st = segment.state.lock();
            st.last_engaged = image.last_engaged;
            st.last_released = image.last_released;
        }
        for (i, slot) in image.slots.iter().enumerate() {
            let off = i as u32 + 1;
            // SAFETY: the segment is not yet shared.
            unsafe {
                *segment.slot_ptr(off) = *slot;
            }
        }
        segment
    }

    #[cfg(test)]
    pub(crate) fn state_snapshot(&self) -> SegmentState {
        *self.state.lock()
    }
}

/// Plain-data image of one segment, the unit of the snapshot contract.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SegmentImage {
    pub num: u32,
    pub last_engaged: u32,
    pub last_released: u32,
    /// Slots at offsets `1..=last_engaged`, freed slots included with their
    /// free-list threading intact.
    pub slots: Vec<Element>,
}

impl SegmentImage {
    /// Serialize little-endian, field by field. The layout is stable: the
    /// free-list-in-type encoding round-trips unchanged.
    pub fn write_to<W: Write>(&self, w: &mut W) -> StoreResult<()> {
        write_u32(w, self.num)?;
        write_u32(w, self.last_engaged)?;
        write_u32(w, self.last_released)?;
        for el in &self.slots {
            write_u32(w, el.flags.type_word)?;
            w.write_all(&[el.flags.access])?;
            write_addr(w, el.first_out)?;
            write_addr(w, el.first_in)?;
            write_u32(w, el.out_count)?;
            write_u32(w, el.in_count)?;
            write_addr(w, el.arc.begin)?;
            write_addr(w, el.arc.end)?;
            write_addr(w, el.arc.next_out)?;
            write_addr(w, el.arc.prev_out)?;
            write_addr(w, el.arc.next_in)?;
            write_addr(w, el.arc.prev_in)?;
        }
        Ok(())
    }

    /// Deserialize one segment image.
    pub fn read_from<R: Read>(r: &mut R) -> StoreResult<Self> {
        let num = read_u32(r)?;
        let last_engaged = read_u32(r)?;
        let last_released = read_u32(r)?;
        if num == 0 || last_engaged >= SEGMENT_CAPACITY || last_released >= SEGMENT_CAPACITY {
            return Err(StoreError::Io {
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "corrupt segment header",
                ),
            });
        }
        let mut slots = Vec::with_capacity(last_engaged as usize);
        for _ in 0..last_engaged {
            let mut el = Element::default();
            el.flags.type_word = read_u32(r)?;
            let mut access = [0u8; 1];
            r.read_exact(&mut access)?;
            el.flags.access = access[0];
            el.first_out = read_addr(r)?;
            el.first_in = read_addr(r)?;
            el.out_count = read_u32(r)?;
            el.in_count = read_u32(r)?;
            el.arc.begin = read_addr(r)?;
            el.arc.end = read_addr(r)?;
            el.arc.next_out = read_addr(r)?;
            el.arc.prev_out = read_addr(r)?;
            el.arc.next_in = read_addr(r)?;
            el.arc.prev_in = read_addr(r)?;
            slots.push(el);
        }
        Ok(Self {
            num,
            last_engaged,
            last_released,
            slots,
        })
    }
}

fn write_u32<W: Write>(w: &mut W, value: u32) -> std::io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

fn write_addr<W: Write>(w: &mut W, addr: semgraph::Addr) -> std::io::Result<()> {
    write_u32(w, addr.seg)?;
    write_u32(w, addr.off)
}

fn read_u32<R: Read>(r: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_addr<R: Read>(r: &mut R) -> std::io::Result<semgraph::Addr> {
    let seg = read_u32(r)?;
    let off = read_u32(r)?;
    Ok(semgraph::Addr::new(seg, off))
}
