//! Store sizing constants.
//!
//! These constants define the fundamental parameters of the segmented
//! element store. They are the single source of truth - all other crates
//! should import from here.

/// Number of element slots per segment, including the reserved slot 0.
///
/// A power of two so that a segment's slot array is a small multiple of a
/// page. Offsets `1..SEGMENT_CAPACITY` address usable slots.
pub const SEGMENT_CAPACITY: u32 = 4096;

/// Number of read-write monitors in the sharded address-monitor bank.
///
/// Every address hashes to one monitor; a fixed bank trades false sharing
/// for a bounded memory footprint.
pub const MONITOR_TABLE_SIZE: usize = 1024;
