//! Element slot record.
//!
//! One slot holds one element: a node, a link, or a connector. The record is
//! POD-sized and `Copy` so that segments stay cache-friendly and the snapshot
//! serializer can write slots field by field. All list "pointers" are element
//! addresses, never heap pointers.
//!
//! A freed slot reuses its type word to store the next free offset inside the
//! same segment (0 terminates the chain). The liveness and deletion bits live
//! in the `access` byte and are partitioned from that reuse: `ELEMENT_EXIST`
//! is always cleared on a freed slot.

use semgraph::addr::Addr;
use semgraph::types::ElementType;
use static_assertions::const_assert;

/// Liveness bit: set only for slots currently representing a live element.
pub(crate) const ELEMENT_EXIST: u8 = 0x1;
/// Deletion bit: strictly monotonic per slot lifetime; set once the cascading
/// erase has claimed the element.
pub(crate) const REQUEST_DELETION: u8 = 0x2;

/// Type word and access bits of one slot.
///
/// `type_word` holds [`ElementType`] bits while the slot is live and the next
/// free offset while the slot is on its segment's free list.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ElementFlags {
    pub type_word: u32,
    pub access: u8,
}

impl ElementFlags {
    /// The element type of a live slot.
    #[inline]
    pub fn element_type(&self) -> ElementType {
        ElementType::from_bits_truncate(self.type_word)
    }

    #[inline]
    pub fn set_element_type(&mut self, ty: ElementType) {
        self.type_word = ty.bits();
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.access & ELEMENT_EXIST == ELEMENT_EXIST
    }

    #[inline]
    pub fn deletion_requested(&self) -> bool {
        self.access & REQUEST_DELETION == REQUEST_DELETION
    }
}

/// Connector-only fields: the two endpoints and the four intrusive incidence
/// list links. Zeroed (empty addresses) for nodes and links.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ConnectorEnds {
    pub begin: Addr,
    pub end: Addr,
    pub next_out: Addr,
    pub prev_out: Addr,
    pub next_in: Addr,
    pub prev_in: Addr,
}

/// One element slot.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Element {
    pub flags: ElementFlags,
    /// Head of this element's outgoing incidence list.
    pub first_out: Addr,
    /// Head of this element's incoming incidence list.
    pub first_in: Addr,
    /// Length of the outgoing incidence list.
    pub out_count: u32,
    /// Length of the incoming incidence list.
    pub in_count: u32,
    pub arc: ConnectorEnds,
}

// Slots must stay POD-sized: growing the record grows every segment.
const_assert!(core::mem::size_of::<Element>() <= 80);

impl Element {
    /// A freed slot whose type word threads the segment free list.
    #[inline]
    pub fn freed(next_free_offset: u32) -> Self {
        Element {
            flags: ElementFlags {
                type_word: next_free_offset,
                access: 0,
            },
            ..Element::default()
        }
    }

    /// Next free offset stored in a freed slot (0 terminates the chain).
    #[inline]
    pub fn free_next(&self) -> u32 {
        debug_assert!(!self.flags.is_live());
        self.flags.type_word
    }
}
