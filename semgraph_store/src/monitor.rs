//! Sharded address-monitor table.
//!
//! A fixed bank of read-write monitors; every element address hashes to one
//! monitor. Multi-monitor acquisition sorts the requested monitors by bank
//! identity, skips absent entries and coalesces duplicates to a single
//! acquisition. That total order is the store's sole deadlock-avoidance
//! discipline.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use semgraph::addr::Addr;
use semgraph::consts::MONITOR_TABLE_SIZE;

/// One monitor: a many-reader/single-writer lock with no payload.
pub(crate) type Monitor = RwLock<()>;

/// Fixed bank of address monitors.
pub(crate) struct MonitorTable {
    monitors: Box<[Monitor]>,
}

impl MonitorTable {
    pub fn new() -> Self {
        let monitors: Vec<Monitor> = (0..MONITOR_TABLE_SIZE).map(|_| RwLock::new(())).collect();
        Self {
            monitors: monitors.into_boxed_slice(),
        }
    }

    /// The monitor covering an address. Distinct addresses may share a
    /// monitor; callers comparing "is this the monitor I already hold" must
    /// compare monitor identity, never addresses.
    #[inline]
    pub fn monitor_for(&self, addr: Addr) -> &Monitor {
        // Fibonacci scrambling spreads sequential offsets across the bank.
        let hash = addr.packed().0.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let index = (hash >> 32) as usize & (MONITOR_TABLE_SIZE - 1);
        &self.monitors[index]
    }

    /// Acquire read locks on every distinct monitor in `list`, in bank
    /// order. `None` entries are skipped.
    pub fn read_n<'a>(&self, list: &[Option<&'a Monitor>]) -> ReadGuards<'a> {
        let ordered = order_distinct(list);
        ReadGuards {
            guards: ordered.into_iter().map(|m| m.read()).collect(),
        }
    }

    /// Acquire write locks on every distinct monitor in `list`, in bank
    /// order. `None` entries are skipped.
    pub fn write_n<'a>(&self, list: &[Option<&'a Monitor>]) -> WriteGuards<'a> {
        let ordered = order_distinct(list);
        WriteGuards {
            guards: ordered.into_iter().map(|m| m.write()).collect(),
        }
    }
}

/// Sort by monitor identity and drop duplicates and `None`s.
fn order_distinct<'a>(list: &[Option<&'a Monitor>]) -> Vec<&'a Monitor> {
    let mut ordered: Vec<&Monitor> = list.iter().flatten().copied().collect();
    ordered.sort_by_key(|m| *m as *const Monitor as usize);
    ordered.dedup_by(|a, b| std::ptr::eq(*a, *b));
    ordered
}

/// True when `monitor` is one of the already-held monitors in `held`.
#[inline]
pub(crate) fn is_held(monitor: &Monitor, held: &[&Monitor]) -> bool {
    held.iter().any(|h| std::ptr::eq(*h, monitor))
}

/// Guards of an ordered multi-read acquisition, released on drop.
pub(crate) struct ReadGuards<'a> {
    #[allow(dead_code)]
    guards: Vec<RwLockReadGuard<'a, ()>>,
}

/// Guards of an ordered multi-write acquisition, released on drop.
pub(crate) struct WriteGuards<'a> {
    #[allow(dead_code)]
    guards: Vec<RwLockWriteGuard<'a, ()>>,
}
