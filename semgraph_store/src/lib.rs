//! # Semgraph Store
//!
//! A concurrent in-memory semantic-graph store: a segmented element pool
//! holding typed nodes, typed binary connectors (directed arcs and
//! undirected edges) and content-bearing links, with triple iterators over
//! the incidence structure and an event subsystem observers attach to
//! graph mutations.
//!
//! ## Features
//!
//! - **Segmented storage**: two-level `(segment, offset)` addresses into
//!   fixed-size slot arrays; freed slots are recycled through per-segment
//!   free lists.
//! - **Per-thread allocation**: each mutating thread fills its own segment,
//!   keeping allocation contention off the hot path.
//! - **Sharded monitors**: a fixed bank of read-write monitors keyed by
//!   address hash; ordered multi-acquisition is the single deadlock
//!   discipline.
//! - **Intrusive incidence lists**: every element enumerates its outgoing
//!   and incoming connectors in O(1) per step.
//! - **Triple iterators**: seven fixed patterns over
//!   `(first, connector, third)` triples, safe against concurrent erasure.
//! - **Asynchronous events**: mutation events are dispatched by a worker
//!   pool, in emit order per subscription.
//!
//! ## Usage
//!
//! ```rust
//! use semgraph_store::GraphStore;
//! use semgraph_store::semgraph::{StoreParams, types::ElementType};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = GraphStore::initialize(StoreParams::default())?;
//!
//! let concept = store.create_node(ElementType::CONST)?;
//! let label = store.create_link(ElementType::CONST)?;
//! let arc = store.create_connector(ElementType::ARC_CONST_POS_PERM, concept, label)?;
//! store.set_link_content(label, b"concept label", true)?;
//!
//! for (source, connector, target) in
//!     store.iter_f_a_a(concept, ElementType::ARC_ACCESS, ElementType::LINK)
//! {
//!     assert_eq!((source, connector, target), (concept, arc, label));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! - **GraphStore**: thread-safe; share it behind an `Arc` and call every
//!   operation through `&self`.
//! - **TripleIter**: tied to one thread; steps tolerate concurrent
//!   mutation and terminate silently when the cursor is erased.
//! - **Event callbacks**: run on the dispatch worker threads, never on the
//!   mutating thread.

#![deny(missing_docs)]
#![warn(clippy::all)]

mod element;
pub mod event;
pub mod fs_memory;
pub mod iter;
mod monitor;
mod pool;
mod segment;
pub mod store;

/// Re-export of the shared vocabulary crate.
pub use semgraph;

pub use event::{EventHandle, EventKind, EventNotification};
pub use fs_memory::{FileMemory, FsMemory, NullMemory, SegmentSnapshot};
pub use iter::TripleIter;
pub use segment::StoreStat;
pub use store::{GraphStore, PendingScope};

/// Initialize tracing for store logging.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
