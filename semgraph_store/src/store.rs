//! The graph store: lifecycle, mutation, queries and event emission.
//!
//! All mutation paths follow the same discipline: acquire the per-address
//! write monitors for every directly mutated element (through the ordered
//! multi-acquire when more than one is involved), update the incidence
//! bookkeeping, then hand dispatch records to the emission manager. Readers
//! take read monitors only.

use crate::element::{Element, REQUEST_DELETION};
use crate::event::emission::EmissionManager;
use crate::event::registration::RegistrationManager;
use crate::event::{
    DeleteCallback, DispatchRecord, EventHandle, EventKind, EventNotification,
    STATE_DESTROY_REQUESTED,
};
use crate::fs_memory::{FileMemory, FsMemory, NullMemory, SegmentSnapshot};
use crate::iter::{IterParam, Pattern, TripleIter};
use crate::monitor::{Monitor, MonitorTable, is_held};
use crate::pool::SegmentPool;
use crate::segment::StoreStat;
use semgraph::addr::Addr;
use semgraph::consts::SEGMENT_CAPACITY;
use semgraph::error::{StoreError, StoreResult};
use semgraph::params::StoreParams;
use semgraph::types::ElementType;
use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};

struct PendingRecord {
    element: Addr,
    kind: EventKind,
    connector: Addr,
    other: Addr,
}

thread_local! {
    static PENDING_BUFFER: RefCell<Option<Vec<PendingRecord>>> = const { RefCell::new(None) };
}

/// The concurrent in-memory semantic-graph store.
///
/// Shared across threads behind an `Arc`; every operation takes `&self`.
pub struct GraphStore {
    params: StoreParams,
    pool: SegmentPool,
    monitors: MonitorTable,
    registration: RegistrationManager,
    emission: EmissionManager,
    fs: Box<dyn FsMemory>,
}

impl GraphStore {
    /// Build a store from parameters. When `params.clear` is false, the
    /// previous snapshot is loaded from the repo directory.
    pub fn initialize(params: StoreParams) -> StoreResult<GraphStore> {
        let mut fs: Box<dyn FsMemory> = match &params.repo_path {
            Some(path) => Box::new(FileMemory::new(path.clone())),
            None => Box::new(NullMemory::new()),
        };
        fs.initialize(&params)?;

        tracing::info!(
            element_size = std::mem::size_of::<Element>(),
            segment_capacity = SEGMENT_CAPACITY,
            max_segments = params.max_segments,
            max_threads = params.max_threads,
            dispatch_threads = params.dispatch_threads,
            save_period = params.save_period,
            update_period = params.update_period,
            clear = params.clear,
            "store configuration"
        );

        let pool = SegmentPool::new(params.max_segments);
        if !params.clear {
            if let Some(snapshot) = fs.load()? {
                pool.install(&snapshot.segments)?;
            }
        }

        Ok(Self {
            pool,
            monitors: MonitorTable::new(),
            registration: RegistrationManager::new(),
            emission: EmissionManager::new(params.dispatch_threads),
            fs,
            params,
        })
    }

    /// Stop event dispatch, optionally save a snapshot, and shut the
    /// file-memory collaborator down.
    pub fn shutdown(mut self, save_state: bool) -> StoreResult<()> {
        self.emission.stop();
        if save_state {
            self.save()?;
        }
        self.fs.shutdown()
    }

    /// The parameters the store was built with.
    pub fn params(&self) -> &StoreParams {
        &self.params
    }

    // ─── Allocation & processes ─────────────────────────────────────

    /// Bind a per-thread allocation segment for the calling thread.
    pub fn begin_process(&self) {
        self.pool.begin_process();
    }

    /// Return the calling thread's allocation segment to the pool.
    pub fn end_process(&self) {
        self.pool.end_process();
    }

    /// Number of segments created so far.
    pub fn segments_count(&self) -> u32 {
        self.pool.segments_count()
    }

    // ─── Element creation ───────────────────────────────────────────

    /// Create a node. `type_bits` may refine the node with qualifier bits
    /// but must not carry a different element category.
    pub fn create_node(&self, type_bits: ElementType) -> StoreResult<Addr> {
        let masked = type_bits & ElementType::ELEMENT_MASK;
        if !masked.is_empty() && masked != ElementType::NODE {
            return Err(StoreError::InvalidType);
        }
        let (addr, ptr) = self.pool.allocate()?;
        // SAFETY: the fresh slot is not yet published to other threads.
        unsafe {
            (*ptr).flags.set_element_type(ElementType::NODE | type_bits);
        }
        Ok(addr)
    }

    /// Create a content-bearing link. Category rules as for `create_node`.
    pub fn create_link(&self, type_bits: ElementType) -> StoreResult<Addr> {
        let masked = type_bits & ElementType::ELEMENT_MASK;
        if !masked.is_empty() && masked != ElementType::LINK {
            return Err(StoreError::InvalidType);
        }
        let (addr, ptr) = self.pool.allocate()?;
        // SAFETY: as in `create_node`.
        unsafe {
            (*ptr).flags.set_element_type(ElementType::LINK | type_bits);
        }
        Ok(addr)
    }

    /// Create a connector of type `ty` from `begin` to `end`.
    ///
    /// The connector is threaded at the head of `begin`'s outgoing and
    /// `end`'s incoming lists. An undirected edge between distinct
    /// endpoints is additionally threaded the other way around, so it sits
    /// in both endpoints' lists. Emits the matching ADD events.
    pub fn create_connector(
        &self,
        ty: ElementType,
        begin: Addr,
        end: Addr,
    ) -> StoreResult<Addr> {
        if begin.is_empty() || end.is_empty() {
            return Err(StoreError::InvalidParams);
        }
        let masked = ty & ElementType::ELEMENT_MASK;
        if !masked.is_connector() || masked.intersects(ElementType::NODE | ElementType::LINK) {
            return Err(StoreError::InvalidType);
        }

        let (arc_addr, arc_ptr) = self.pool.allocate()?;
        // SAFETY: fresh slot, not yet published.
        unsafe {
            (*arc_ptr).flags.set_element_type(ty);
            (*arc_ptr).arc.begin = begin;
            (*arc_ptr).arc.end = end;
        }

        let is_edge = ty.is_edge();
        let not_loop = begin != end;

        let beg_monitor = self.monitors.monitor_for(begin);
        let end_monitor = self.monitors.monitor_for(end);
        let _guards = self.monitors.write_n(&[Some(beg_monitor), Some(end_monitor)]);
        let held = [beg_monitor, end_monitor];

        let beg_ptr = match self.pool.resolve_live(begin) {
            Ok(ptr) => ptr,
            Err(err) => {
                self.pool.free_slot(arc_addr)?;
                return Err(err);
            }
        };
        let end_ptr = match self.pool.resolve_live(end) {
            Ok(ptr) => ptr,
            Err(err) => {
                self.pool.free_slot(arc_addr)?;
                return Err(err);
            }
        };

        // SAFETY: write monitors for both endpoints are held; the connector
        // slot is still private to this thread.
        unsafe {
            self.link_connector(arc_addr, arc_ptr, beg_ptr, end_ptr, &held);
            if is_edge && not_loop {
                self.link_connector(arc_addr, arc_ptr, end_ptr, beg_ptr, &held);
            }
        }

        self.emit(begin, EventKind::AddOutputArc, arc_addr, end);
        self.emit(end, EventKind::AddInputArc, arc_addr, begin);
        if is_edge && not_loop {
            self.emit(end, EventKind::AddOutputArc, arc_addr, begin);
            self.emit(begin, EventKind::AddInputArc, arc_addr, end);
        }

        Ok(arc_addr)
    }

    /// Thread `arc` at the head of `beg`'s outgoing and `end`'s incoming
    /// lists.
    ///
    /// # Safety
    /// The caller holds write monitors covering both endpoint addresses
    /// (listed in `held`) and exclusive access to the connector slot.
    unsafe fn link_connector(
        &self,
        arc_addr: Addr,
        arc: *mut Element,
        beg: *mut Element,
        end: *mut Element,
        held: &[&Monitor],
    ) {
        unsafe {
            let first_out = (*beg).first_out;
            let first_in = (*end).first_in;

            let first_out_monitor = (!first_out.is_empty())
                .then(|| self.monitors.monitor_for(first_out))
                .filter(|monitor| !is_held(monitor, held));
            let first_in_monitor = (!first_in.is_empty())
                .then(|| self.monitors.monitor_for(first_in))
                .filter(|monitor| !is_held(monitor, held));

            {
                let _guards = self
                    .monitors
                    .write_n(&[first_out_monitor, first_in_monitor]);

                (*arc).arc.next_out = first_out;
                (*arc).arc.next_in = first_in;

                if let Ok(ptr) = self.pool.resolve_live(first_out) {
                    (*ptr).arc.prev_out = arc_addr;
                }
                if let Ok(ptr) = self.pool.resolve_live(first_in) {
                    (*ptr).arc.prev_in = arc_addr;
                }
            }

            (*beg).first_out = arc_addr;
            (*end).first_in = arc_addr;
            (*beg).out_count += 1;
            (*end).in_count += 1;
        }
    }

    // ─── Cascading erase ────────────────────────────────────────────

    /// Erase an element together with every connector transitively incident
    /// to it. Emits REMOVE events and retires subscriptions on the erased
    /// addresses; the slots return to their segments' free lists.
    pub fn erase_element(&self, root: Addr) -> StoreResult<()> {
        self.pool.resolve_live(root)?;

        for addr in self.collect_for_erase(root) {
            let monitor = self.monitors.monitor_for(addr);

            let guard = monitor.write();
            let Ok(el_ptr) = self.pool.resolve_live(addr) else {
                continue;
            };
            // SAFETY: write monitor held.
            let (already_claimed, ty) = unsafe {
                let claimed = (*el_ptr).flags.deletion_requested();
                if !claimed {
                    (*el_ptr).flags.access |= REQUEST_DELETION;
                }
                (claimed, (*el_ptr).flags.element_type())
            };
            drop(guard);
            if already_claimed {
                continue;
            }

            if ty.is_link() {
                let _ = self.fs.unlink_string(addr.packed());
            } else if ty.is_connector() {
                // SAFETY: the deletion claim above makes this thread the
                // only one that will unlink or free the slot.
                unsafe {
                    self.unlink_connector(addr, el_ptr, ty);
                }
            }

            self.emit(addr, EventKind::RemoveElement, Addr::EMPTY, Addr::EMPTY);

            {
                let _guard = monitor.write();
                let _ = self.pool.free_slot(addr);
            }

            self.notify_element_deleted(addr);
        }

        Ok(())
    }

    /// BFS over incidence chains collecting the root and every reachable
    /// connector, each visited element read-locked during its chain walk.
    fn collect_for_erase(&self, root: Addr) -> Vec<Addr> {
        let mut visited: HashSet<u64> = HashSet::new();
        let mut queue: VecDeque<Addr> = VecDeque::new();
        let mut order: Vec<Addr> = Vec::new();

        visited.insert(root.packed().0);
        queue.push_back(root);
        order.push(root);

        while let Some(addr) = queue.pop_front() {
            let Ok(el_ptr) = self.pool.resolve_live(addr) else {
                continue;
            };
            let monitor = self.monitors.monitor_for(addr);
            let _guard = monitor.read();

            for outgoing in [true, false] {
                // SAFETY: read monitor held for the visited element; chain
                // neighbors are read tolerating concurrent rewiring.
                let mut cursor = unsafe {
                    if outgoing {
                        (*el_ptr).first_out
                    } else {
                        (*el_ptr).first_in
                    }
                };
                while !cursor.is_empty() {
                    if visited.insert(cursor.packed().0) {
                        order.push(cursor);
                        queue.push_back(cursor);
                    }
                    let Ok(ptr) = self.pool.resolve_live(cursor) else {
                        break;
                    };
                    // SAFETY: as above.
                    cursor = unsafe {
                        if outgoing {
                            (*ptr).arc.next_out
                        } else {
                            (*ptr).arc.next_in
                        }
                    };
                }
            }
        }

        order
    }

    /// Rewire a claimed connector out of its endpoints' incidence lists and
    /// emit the REMOVE arc events.
    ///
    /// # Safety
    /// The caller has set `REQUEST_DELETION` on the connector, making this
    /// thread its sole owner until the slot is freed.
    unsafe fn unlink_connector(&self, addr: Addr, el_ptr: *mut Element, ty: ElementType) {
        unsafe {
            let is_edge = ty.is_edge();
            let begin = (*el_ptr).arc.begin;
            let end = (*el_ptr).arc.end;
            let not_loop = begin != end;

            let beg_monitor = self.monitors.monitor_for(begin);
            let end_monitor = self.monitors.monitor_for(end);
            let _endpoint_guards = self
                .monitors
                .write_n(&[Some(beg_monitor), Some(end_monitor)]);
            let held = [beg_monitor, end_monitor];

            let prev_out = (*el_ptr).arc.prev_out;
            let next_out = (*el_ptr).arc.next_out;
            let prev_in = (*el_ptr).arc.prev_in;
            let next_in = (*el_ptr).arc.next_in;

            let neighbor_monitor = |neighbor: Addr| {
                (!neighbor.is_empty())
                    .then(|| self.monitors.monitor_for(neighbor))
                    .filter(|monitor| !is_held(monitor, &held))
            };
            let _neighbor_guards = self.monitors.write_n(&[
                neighbor_monitor(prev_out),
                neighbor_monitor(next_out),
                neighbor_monitor(prev_in),
                neighbor_monitor(next_in),
            ]);

            // Outgoing list of `begin`.
            if let Ok(ptr) = self.pool.resolve_live(prev_out) {
                (*ptr).arc.next_out = next_out;
            }
            if let Ok(ptr) = self.pool.resolve_live(next_out) {
                (*ptr).arc.prev_out = prev_out;
            }
            if let Ok(beg_ptr) = self.pool.resolve_live(begin) {
                if (*beg_ptr).first_out == addr {
                    (*beg_ptr).first_out = next_out;
                }
                (*beg_ptr).out_count = (*beg_ptr).out_count.saturating_sub(1);
                if is_edge && not_loop {
                    if (*beg_ptr).first_in == addr {
                        (*beg_ptr).first_in = next_in;
                    }
                    (*beg_ptr).in_count = (*beg_ptr).in_count.saturating_sub(1);
                }
            }
            self.emit(begin, EventKind::RemoveOutputArc, addr, end);

            // Incoming list of `end`.
            if let Ok(ptr) = self.pool.resolve_live(prev_in) {
                (*ptr).arc.next_in = next_in;
            }
            if let Ok(ptr) = self.pool.resolve_live(next_in) {
                (*ptr).arc.prev_in = prev_in;
            }
            if let Ok(end_ptr) = self.pool.resolve_live(end) {
                if (*end_ptr).first_in == addr {
                    (*end_ptr).first_in = next_in;
                }
                (*end_ptr).in_count = (*end_ptr).in_count.saturating_sub(1);
                if is_edge && not_loop {
                    if (*end_ptr).first_out == addr {
                        (*end_ptr).first_out = next_out;
                    }
                    (*end_ptr).out_count = (*end_ptr).out_count.saturating_sub(1);
                }
            }
            self.emit(end, EventKind::RemoveInputArc, addr, begin);
        }
    }

    // ─── Queries ────────────────────────────────────────────────────

    /// Whether the address resolves to a live element.
    pub fn is_element(&self, addr: Addr) -> bool {
        self.pool.resolve_live(addr).is_ok()
    }

    /// The element's type bitmask.
    pub fn get_type(&self, addr: Addr) -> StoreResult<ElementType> {
        let _guard = self.monitors.monitor_for(addr).read();
        let ptr = self.pool.resolve_live(addr)?;
        // SAFETY: read monitor held.
        Ok(unsafe { (*ptr).flags.element_type() })
    }

    /// Refine an element's qualifier bits. The element category must stay
    /// unchanged.
    pub fn change_subtype(&self, addr: Addr, new_type: ElementType) -> StoreResult<()> {
        let _guard = self.monitors.monitor_for(addr).write();
        let ptr = self.pool.resolve_live(addr)?;
        // SAFETY: write monitor held.
        unsafe {
            if !(*ptr).flags.element_type().subtype_change_allowed(new_type) {
                return Err(StoreError::InvalidParams);
            }
            (*ptr).flags.set_element_type(new_type);
        }
        Ok(())
    }

    /// Source endpoint of a connector.
    pub fn get_arc_begin(&self, addr: Addr) -> StoreResult<Addr> {
        self.get_arc_info(addr).map(|(begin, _)| begin)
    }

    /// Target endpoint of a connector.
    pub fn get_arc_end(&self, addr: Addr) -> StoreResult<Addr> {
        self.get_arc_info(addr).map(|(_, end)| end)
    }

    /// Both endpoints of a connector.
    pub fn get_arc_info(&self, addr: Addr) -> StoreResult<(Addr, Addr)> {
        let _guard = self.monitors.monitor_for(addr).read();
        let ptr = self.pool.resolve_live(addr)?;
        // SAFETY: read monitor held.
        unsafe {
            if !(*ptr).flags.element_type().is_connector() {
                return Err(StoreError::NotConnector { addr });
            }
            Ok(((*ptr).arc.begin, (*ptr).arc.end))
        }
    }

    /// Length of the element's outgoing incidence list, 0 when the address
    /// does not resolve.
    pub fn get_output_arcs_count(&self, addr: Addr) -> u32 {
        let _guard = self.monitors.monitor_for(addr).read();
        match self.pool.resolve_live(addr) {
            // SAFETY: read monitor held.
            Ok(ptr) => unsafe { (*ptr).out_count },
            Err(_) => 0,
        }
    }

    /// Length of the element's incoming incidence list, 0 when the address
    /// does not resolve.
    pub fn get_input_arcs_count(&self, addr: Addr) -> u32 {
        let _guard = self.monitors.monitor_for(addr).read();
        match self.pool.resolve_live(addr) {
            // SAFETY: read monitor held.
            Ok(ptr) => unsafe { (*ptr).in_count },
            Err(_) => 0,
        }
    }

    /// Element counters over the whole pool.
    pub fn get_elements_stat(&self) -> StoreStat {
        self.pool.collect_stat()
    }

    // ─── Link content ───────────────────────────────────────────────

    /// Associate content bytes with a link. Emits CONTENT_CHANGED only when
    /// the file-memory collaborator accepted the content.
    pub fn set_link_content(
        &self,
        addr: Addr,
        bytes: &[u8],
        searchable: bool,
    ) -> StoreResult<()> {
        let _guard = self.monitors.monitor_for(addr).write();
        let ptr = self.pool.resolve_live(addr)?;
        // SAFETY: write monitor held.
        if unsafe { !(*ptr).flags.element_type().is_link() } {
            return Err(StoreError::NotLink { addr });
        }
        self.fs.link_string(addr.packed(), bytes, searchable)?;
        self.emit(addr, EventKind::ContentChanged, Addr::EMPTY, Addr::EMPTY);
        Ok(())
    }

    /// The link's content bytes; empty when no content was ever set.
    pub fn get_link_content(&self, addr: Addr) -> StoreResult<Vec<u8>> {
        let _guard = self.monitors.monitor_for(addr).read();
        let ptr = self.pool.resolve_live(addr)?;
        // SAFETY: read monitor held.
        if unsafe { !(*ptr).flags.element_type().is_link() } {
            return Err(StoreError::InvalidType);
        }
        Ok(self.fs.string_by_link(addr.packed())?.unwrap_or_default())
    }

    /// Searchable links whose content equals `bytes`.
    pub fn find_links_by_content(&self, bytes: &[u8]) -> StoreResult<Vec<Addr>> {
        Ok(self
            .fs
            .links_by_string(bytes)?
            .into_iter()
            .map(|key| key.unpack())
            .collect())
    }

    /// Searchable links whose content matches `bytes` by substring; queries
    /// no longer than `max_prefix_len` match as a prefix instead.
    pub fn find_links_by_content_substring(
        &self,
        bytes: &[u8],
        max_prefix_len: u32,
    ) -> StoreResult<Vec<Addr>> {
        Ok(self
            .fs
            .links_by_substring(bytes, max_prefix_len)?
            .into_iter()
            .map(|key| key.unpack())
            .collect())
    }

    /// Contents of searchable links matching `bytes` by substring, with
    /// the same prefix rule.
    pub fn find_link_contents_by_content_substring(
        &self,
        bytes: &[u8],
        max_prefix_len: u32,
    ) -> StoreResult<Vec<Vec<u8>>> {
        self.fs.strings_by_substring(bytes, max_prefix_len)
    }

    // ─── Persistence ────────────────────────────────────────────────

    /// Persist a snapshot of the segments vector through file-memory.
    pub fn save(&self) -> StoreResult<()> {
        let snapshot = SegmentSnapshot {
            segments: self.pool.snapshot(),
        };
        self.fs.save(&snapshot)
    }

    // ─── Events ─────────────────────────────────────────────────────

    /// Subscribe to mutations of `element`. The callback runs on an
    /// emission worker thread; `on_delete` runs once when the subscription
    /// is destroyed through [`GraphStore::destroy_event`].
    pub fn subscribe<F>(
        &self,
        element: Addr,
        kind: EventKind,
        callback: F,
        on_delete: Option<Box<DeleteCallback>>,
    ) -> StoreResult<EventHandle>
    where
        F: Fn(&EventNotification) + Send + Sync + 'static,
    {
        if element.is_empty() {
            return Err(StoreError::InvalidParams);
        }
        Ok(self
            .registration
            .subscribe(element, kind, Box::new(callback), on_delete))
    }

    /// Destroy a subscription: detach it, fire its on-delete callback, and
    /// queue it for reclamation once no in-flight dispatch references it.
    pub fn destroy_event(&self, handle: EventHandle) -> StoreResult<()> {
        let sub = handle.0;
        if !self.registration.remove(&sub) {
            return Err(StoreError::InvalidParams);
        }
        if sub.advance_state(STATE_DESTROY_REQUESTED) == crate::event::STATE_LIVE {
            if let Some(callback) = sub.on_delete.lock().take() {
                callback(sub.element);
            }
        }
        self.emission.push_deletable(sub);
        Ok(())
    }

    /// Retire every subscription of an erased element. Called by the
    /// cascading erase; exposed for collaborators driving deletion
    /// externally.
    pub fn notify_element_deleted(&self, element: Addr) {
        for sub in self.registration.take_for_element(element) {
            sub.advance_state(STATE_DESTROY_REQUESTED);
            self.emission.push_deletable(sub);
        }
    }

    /// Block until every queued event callback has been delivered.
    pub fn drain_events(&self) {
        self.emission.drain();
    }

    /// Defer event emission on the calling thread until `commit`. Dropping
    /// the scope without committing discards the buffered events.
    pub fn pending_events(&self) -> PendingScope<'_> {
        PENDING_BUFFER.with(|buffer| {
            let mut buffer = buffer.borrow_mut();
            debug_assert!(buffer.is_none(), "pending event scopes do not nest");
            *buffer = Some(Vec::new());
        });
        PendingScope { store: self }
    }

    fn emit(&self, element: Addr, kind: EventKind, connector: Addr, other: Addr) {
        if element.is_empty() {
            return;
        }
        let buffered = PENDING_BUFFER.with(|buffer| {
            let mut buffer = buffer.borrow_mut();
            match buffer.as_mut() {
                Some(records) => {
                    records.push(PendingRecord {
                        element,
                        kind,
                        connector,
                        other,
                    });
                    true
                }
                None => false,
            }
        });
        if !buffered {
            self.emit_now(element, kind, connector, other);
        }
    }

    fn emit_now(&self, element: Addr, kind: EventKind, connector: Addr, other: Addr) {
        for sub in self.registration.matching(element, kind) {
            self.emission.push(&sub, DispatchRecord { connector, other });
        }
    }

    // ─── Iterators ──────────────────────────────────────────────────

    /// Triples `(source, connector, target)` walking `source`'s outgoing
    /// list with connector and target type filters.
    pub fn iter_f_a_a(
        &self,
        source: Addr,
        connector_type: ElementType,
        target_type: ElementType,
    ) -> TripleIter<'_> {
        TripleIter::new(
            self,
            Pattern::FAA,
            [
                IterParam::Fixed(source),
                IterParam::Filter(connector_type),
                IterParam::Filter(target_type),
            ],
        )
    }

    /// Triples walking `target`'s incoming list with connector and source
    /// type filters.
    pub fn iter_a_a_f(
        &self,
        source_type: ElementType,
        connector_type: ElementType,
        target: Addr,
    ) -> TripleIter<'_> {
        TripleIter::new(
            self,
            Pattern::AAF,
            [
                IterParam::Filter(source_type),
                IterParam::Filter(connector_type),
                IterParam::Fixed(target),
            ],
        )
    }

    /// Triples between two fixed endpoints with a connector type filter.
    pub fn iter_f_a_f(
        &self,
        source: Addr,
        connector_type: ElementType,
        target: Addr,
    ) -> TripleIter<'_> {
        TripleIter::new(
            self,
            Pattern::FAF,
            [
                IterParam::Fixed(source),
                IterParam::Filter(connector_type),
                IterParam::Fixed(target),
            ],
        )
    }

    /// The single triple of a fixed connector.
    pub fn iter_a_f_a(
        &self,
        source_type: ElementType,
        connector: Addr,
        target_type: ElementType,
    ) -> TripleIter<'_> {
        TripleIter::new(
            self,
            Pattern::AFA,
            [
                IterParam::Filter(source_type),
                IterParam::Fixed(connector),
                IterParam::Filter(target_type),
            ],
        )
    }

    /// The single triple of a fixed connector leaving a fixed source.
    pub fn iter_f_f_a(
        &self,
        source: Addr,
        connector: Addr,
        target_type: ElementType,
    ) -> TripleIter<'_> {
        TripleIter::new(
            self,
            Pattern::FFA,
            [
                IterParam::Fixed(source),
                IterParam::Fixed(connector),
                IterParam::Filter(target_type),
            ],
        )
    }

    /// The single triple of a fixed connector entering a fixed target.
    pub fn iter_a_f_f(
        &self,
        source_type: ElementType,
        connector: Addr,
        target: Addr,
    ) -> TripleIter<'_> {
        TripleIter::new(
            self,
            Pattern::AFF,
            [
                IterParam::Filter(source_type),
                IterParam::Fixed(connector),
                IterParam::Fixed(target),
            ],
        )
    }

    /// Membership test for a fully fixed triple.
    pub fn iter_f_f_f(&self, source: Addr, connector: Addr, target: Addr) -> TripleIter<'_> {
        TripleIter::new(
            self,
            Pattern::FFF,
            [
                IterParam::Fixed(source),
                IterParam::Fixed(connector),
                IterParam::Fixed(target),
            ],
        )
    }

    // ─── Internals shared with the iterator engine ──────────────────

    pub(crate) fn monitors(&self) -> &MonitorTable {
        &self.monitors
    }

    /// Copy an element out of its slot under its monitor. Monitors already
    /// held by the caller (`held`) are not re-acquired; holding them
    /// excludes writers of that shard, so the direct read stays ordered.
    pub(crate) fn element_at(&self, addr: Addr, held: &[&Monitor]) -> StoreResult<Element> {
        let monitor = self.monitors.monitor_for(addr);
        if is_held(monitor, held) {
            let ptr = self.pool.resolve_live(addr)?;
            // SAFETY: a monitor covering this shard is held by the caller.
            Ok(unsafe { *ptr })
        } else {
            let _guard = monitor.read();
            let ptr = self.pool.resolve_live(addr)?;
            // SAFETY: read monitor held.
            Ok(unsafe { *ptr })
        }
    }
}

/// Scope in which event emission on the calling thread is buffered; see
/// [`GraphStore::pending_events`].
pub struct PendingScope<'s> {
    store: &'s GraphStore,
}

impl PendingScope<'_> {
    /// Flush the buffered events in emission order.
    pub fn commit(self) {
        let records =
            PENDING_BUFFER.with(|buffer| buffer.borrow_mut().take().unwrap_or_default());
        for record in records {
            self.store
                .emit_now(record.element, record.kind, record.connector, record.other);
        }
    }
}

impl Drop for PendingScope<'_> {
    fn drop(&mut self) {
        PENDING_BUFFER.with(|buffer| {
            *buffer.borrow_mut() = None;
        });
    }
}
