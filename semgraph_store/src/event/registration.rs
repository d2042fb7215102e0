//! Subscription registration table.
//!
//! Maps packed element addresses to their subscription lists. The table
//! owns the registrations; dispatch records hold shared views into them.

use super::{DeleteCallback, EventCallback, EventHandle, EventKind, Subscription};
use parking_lot::RwLock;
use semgraph::addr::Addr;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-element subscription lists.
pub(crate) struct RegistrationManager {
    table: RwLock<HashMap<u64, Vec<Arc<Subscription>>>>,
}

impl RegistrationManager {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new subscription for `element`.
    pub fn subscribe(
        &self,
        element: Addr,
        kind: EventKind,
        callback: Box<EventCallback>,
        on_delete: Option<Box<DeleteCallback>>,
    ) -> EventHandle {
        let sub = Subscription::new(element, kind, callback, on_delete);
        self.table
            .write()
            .entry(element.packed().0)
            .or_default()
            .push(sub.clone());
        EventHandle(sub)
    }

    /// Detach a subscription from its element's list. Returns false when it
    /// was not registered (already destroyed or retired with its element).
    pub fn remove(&self, sub: &Arc<Subscription>) -> bool {
        let mut table = self.table.write();
        let key = sub.element.packed().0;
        let Some(list) = table.get_mut(&key) else {
            return false;
        };
        let before = list.len();
        list.retain(|entry| !Arc::ptr_eq(entry, sub));
        let removed = list.len() != before;
        if list.is_empty() {
            table.remove(&key);
        }
        removed
    }

    /// Atomically remove and return every subscription of an element.
    pub fn take_for_element(&self, element: Addr) -> Vec<Arc<Subscription>> {
        self.table
            .write()
            .remove(&element.packed().0)
            .unwrap_or_default()
    }

    /// Live subscriptions of `element` matching `kind`.
    pub fn matching(&self, element: Addr, kind: EventKind) -> Vec<Arc<Subscription>> {
        let table = self.table.read();
        let Some(list) = table.get(&element.packed().0) else {
            return Vec::new();
        };
        list.iter()
            .filter(|sub| sub.kind == kind && sub.is_live())
            .cloned()
            .collect()
    }

    /// Number of registered subscriptions across all elements.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.table.read().values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Box<EventCallback> {
        Box::new(|_| {})
    }

    #[test]
    fn subscribe_and_match() {
        let manager = RegistrationManager::new();
        let el = Addr::new(1, 5);
        let handle = manager.subscribe(el, EventKind::AddOutputArc, noop(), None);
        manager.subscribe(el, EventKind::RemoveElement, noop(), None);

        assert_eq!(manager.matching(el, EventKind::AddOutputArc).len(), 1);
        assert_eq!(manager.matching(el, EventKind::AddInputArc).len(), 0);
        assert_eq!(manager.matching(Addr::new(1, 6), EventKind::AddOutputArc).len(), 0);
        assert!(Arc::ptr_eq(
            &manager.matching(el, EventKind::AddOutputArc)[0],
            &handle.0
        ));
    }

    #[test]
    fn multiple_subscriptions_same_kind() {
        let manager = RegistrationManager::new();
        let el = Addr::new(2, 2);
        manager.subscribe(el, EventKind::AddOutputArc, noop(), None);
        manager.subscribe(el, EventKind::AddOutputArc, noop(), None);
        assert_eq!(manager.matching(el, EventKind::AddOutputArc).len(), 2);
    }

    #[test]
    fn remove_detaches_once() {
        let manager = RegistrationManager::new();
        let el = Addr::new(1, 1);
        let handle = manager.subscribe(el, EventKind::AddOutputArc, noop(), None);

        assert!(manager.remove(&handle.0));
        assert!(!manager.remove(&handle.0));
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn take_for_element_empties_the_list() {
        let manager = RegistrationManager::new();
        let el = Addr::new(3, 3);
        manager.subscribe(el, EventKind::RemoveElement, noop(), None);
        manager.subscribe(el, EventKind::AddInputArc, noop(), None);

        let taken = manager.take_for_element(el);
        assert_eq!(taken.len(), 2);
        assert!(manager.take_for_element(el).is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn destroyed_subscriptions_stop_matching() {
        let manager = RegistrationManager::new();
        let el = Addr::new(4, 4);
        let handle = manager.subscribe(el, EventKind::ContentChanged, noop(), None);
        handle.0.advance_state(super::super::STATE_DESTROY_REQUESTED);
        assert!(manager.matching(el, EventKind::ContentChanged).is_empty());
    }
}
