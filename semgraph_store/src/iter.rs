//! Triple iterators.
//!
//! Seven fixed patterns over `(first, connector, third)` triples. Each slot
//! of a pattern is either a fixed address or a type filter; the pattern name
//! spells the slots (`f` fixed, `a` any-matching-filter). Chain patterns walk
//! an endpoint's incidence list; point patterns resolve the fixed connector
//! once.
//!
//! Every step holds a read monitor on the pinned endpoint(s) and briefly on
//! each visited connector. Steps are not atomic against concurrent erasure:
//! when the cursor's slot no longer resolves, the iterator terminates
//! silently.

use crate::store::GraphStore;
use semgraph::addr::Addr;
use semgraph::types::ElementType;

/// One slot of a triple pattern.
#[derive(Debug, Clone, Copy)]
pub(crate) enum IterParam {
    /// A fixed element address.
    Fixed(Addr),
    /// A required-bits type filter.
    Filter(ElementType),
}

impl IterParam {
    fn fixed(&self) -> Addr {
        match self {
            IterParam::Fixed(addr) => *addr,
            IterParam::Filter(_) => Addr::EMPTY,
        }
    }

    fn filter(&self) -> ElementType {
        match self {
            IterParam::Fixed(_) => ElementType::empty(),
            IterParam::Filter(ty) => *ty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pattern {
    FAA,
    AAF,
    FAF,
    AFA,
    FFA,
    AFF,
    FFF,
}

/// Iterator over graph triples matching one fixed pattern.
///
/// `next_triple` advances to the next match; `value` reads a slot of the
/// current result. The type also implements [`Iterator`], yielding result
/// triples.
pub struct TripleIter<'s> {
    store: &'s GraphStore,
    pattern: Pattern,
    params: [IterParam; 3],
    results: [Addr; 3],
    finished: bool,
}

impl<'s> TripleIter<'s> {
    pub(crate) fn new(store: &'s GraphStore, pattern: Pattern, params: [IterParam; 3]) -> Self {
        // A fixed slot that does not resolve yields an empty iterator.
        let finished = params.iter().any(|param| {
            matches!(param, IterParam::Fixed(addr) if !store.is_element(*addr))
        });
        Self {
            store,
            pattern,
            params,
            results: [Addr::EMPTY; 3],
            finished,
        }
    }

    /// Advance to the next matching triple. Returns false once exhausted;
    /// the result slots are cleared at that point.
    pub fn next_triple(&mut self) -> bool {
        if self.finished {
            self.results = [Addr::EMPTY; 3];
            return false;
        }

        let found = match self.pattern {
            Pattern::FAA => self.step_f_a_a(),
            Pattern::AAF => self.step_a_a_f(),
            Pattern::FAF => self.step_f_a_f(),
            Pattern::AFA => self.step_a_f_a(),
            Pattern::FFA => self.step_f_f_a(),
            Pattern::AFF => self.step_a_f_f(),
            Pattern::FFF => self.step_f_f_f(),
        };

        if !found {
            self.results = [Addr::EMPTY; 3];
        }
        found
    }

    /// The i-th slot of the current result triple (empty for `i >= 3` or
    /// before the first match).
    pub fn value(&self, index: usize) -> Addr {
        if index < 3 {
            self.results[index]
        } else {
            Addr::EMPTY
        }
    }

    fn finish(&mut self) -> bool {
        self.finished = true;
        false
    }

    /// Walk the fixed source's outgoing list, filtering connector and
    /// target types.
    fn step_f_a_a(&mut self) -> bool {
        let source = self.params[0].fixed();
        self.results[0] = source;

        let pin = self.store.monitors().monitor_for(source);
        let _guard = pin.read();
        let held = [pin];

        let mut arc_addr = if self.results[1].is_empty() {
            match self.store.element_at(source, &held) {
                Ok(el) => el.first_out,
                Err(_) => return self.finish(),
            }
        } else {
            match self.store.element_at(self.results[1], &held) {
                Ok(el) => el.arc.next_out,
                Err(_) => return self.finish(),
            }
        };

        while !arc_addr.is_empty() {
            let arc_el = match self.store.element_at(arc_addr, &held) {
                Ok(el) => el,
                Err(_) => return self.finish(),
            };
            let next = arc_el.arc.next_out;
            let arc_type = arc_el.flags.element_type();
            let target = if arc_type.is_edge() {
                other_incident(&arc_el.arc, source)
            } else {
                arc_el.arc.end
            };

            let target_type = match self.store.element_at(target, &held) {
                Ok(el) => el.flags.element_type(),
                Err(_) => return self.finish(),
            };

            if arc_type.matches_filter(self.params[1].filter())
                && target_type.matches_filter(self.params[2].filter())
            {
                self.results[1] = arc_addr;
                self.results[2] = target;
                return true;
            }

            arc_addr = next;
        }

        self.finish()
    }

    /// Walk the fixed target's incoming list, filtering connector and
    /// source types.
    fn step_a_a_f(&mut self) -> bool {
        let target = self.params[2].fixed();
        self.results[2] = target;

        let pin = self.store.monitors().monitor_for(target);
        let _guard = pin.read();
        let held = [pin];

        let mut arc_addr = if self.results[1].is_empty() {
            match self.store.element_at(target, &held) {
                Ok(el) => el.first_in,
                Err(_) => return self.finish(),
            }
        } else {
            match self.store.element_at(self.results[1], &held) {
                Ok(el) => el.arc.next_in,
                Err(_) => return self.finish(),
            }
        };

        while !arc_addr.is_empty() {
            let arc_el = match self.store.element_at(arc_addr, &held) {
                Ok(el) => el,
                Err(_) => return self.finish(),
            };
            let next = arc_el.arc.next_in;
            let arc_type = arc_el.flags.element_type();
            let source = if arc_type.is_edge() {
                other_incident(&arc_el.arc, target)
            } else {
                arc_el.arc.begin
            };

            let source_type = match self.store.element_at(source, &held) {
                Ok(el) => el.flags.element_type(),
                Err(_) => return self.finish(),
            };

            if arc_type.matches_filter(self.params[1].filter())
                && source_type.matches_filter(self.params[0].filter())
            {
                self.results[1] = arc_addr;
                self.results[0] = source;
                return true;
            }

            arc_addr = next;
        }

        self.finish()
    }

    /// Both endpoints fixed: walk the target's incoming list, keeping
    /// connectors that leave the fixed source.
    fn step_f_a_f(&mut self) -> bool {
        let source = self.params[0].fixed();
        let target = self.params[2].fixed();
        self.results[0] = source;
        self.results[2] = target;

        let source_mon = self.store.monitors().monitor_for(source);
        let target_mon = self.store.monitors().monitor_for(target);
        let _guards = self
            .store
            .monitors()
            .read_n(&[Some(source_mon), Some(target_mon)]);
        let held = [source_mon, target_mon];

        let mut arc_addr = if self.results[1].is_empty() {
            match self.store.element_at(target, &held) {
                Ok(el) => el.first_in,
                Err(_) => return self.finish(),
            }
        } else {
            match self.store.element_at(self.results[1], &held) {
                Ok(el) => el.arc.next_in,
                Err(_) => return self.finish(),
            }
        };

        while !arc_addr.is_empty() {
            let arc_el = match self.store.element_at(arc_addr, &held) {
                Ok(el) => el,
                Err(_) => return self.finish(),
            };
            let next = arc_el.arc.next_in;
            let arc_type = arc_el.flags.element_type();

            let source_matches = if arc_type.is_edge() {
                source == arc_el.arc.begin || source == arc_el.arc.end
            } else {
                source == arc_el.arc.begin
            };

            if source_matches && arc_type.matches_filter(self.params[1].filter()) {
                self.results[1] = arc_addr;
                return true;
            }

            arc_addr = next;
        }

        self.finish()
    }

    /// Fixed connector: resolve once and emit its endpoints.
    fn step_a_f_a(&mut self) -> bool {
        let connector = self.params[1].fixed();
        self.results[1] = connector;
        self.finished = true;

        let pin = self.store.monitors().monitor_for(connector);
        let _guard = pin.read();
        let held = [pin];

        let Ok(el) = self.store.element_at(connector, &held) else {
            return false;
        };
        if !el.flags.element_type().is_connector() {
            return false;
        }

        self.results[0] = el.arc.begin;
        self.results[2] = el.arc.end;
        true
    }

    /// Fixed source and connector: emit the far endpoint when the connector
    /// really leaves the source.
    fn step_f_f_a(&mut self) -> bool {
        let source = self.params[0].fixed();
        let connector = self.params[1].fixed();
        self.results[0] = source;
        self.results[1] = connector;
        self.finished = true;

        let pin = self.store.monitors().monitor_for(connector);
        let _guard = pin.read();
        let held = [pin];

        let Ok(el) = self.store.element_at(connector, &held) else {
            return false;
        };
        let ty = el.flags.element_type();
        if !ty.is_connector() {
            return false;
        }

        let target = if ty.is_edge() {
            if source != el.arc.begin && source != el.arc.end {
                return false;
            }
            other_incident(&el.arc, source)
        } else {
            if source != el.arc.begin {
                return false;
            }
            el.arc.end
        };

        self.results[2] = target;
        true
    }

    /// Fixed connector and target: emit the near endpoint when the
    /// connector really enters the target.
    fn step_a_f_f(&mut self) -> bool {
        let connector = self.params[1].fixed();
        let target = self.params[2].fixed();
        self.results[1] = connector;
        self.results[2] = target;
        self.finished = true;

        let pin = self.store.monitors().monitor_for(connector);
        let _guard = pin.read();
        let held = [pin];

        let Ok(el) = self.store.element_at(connector, &held) else {
            return false;
        };
        let ty = el.flags.element_type();
        if !ty.is_connector() {
            return false;
        }

        let source = if ty.is_edge() {
            if target != el.arc.begin && target != el.arc.end {
                return false;
            }
            other_incident(&el.arc, target)
        } else {
            if target != el.arc.end {
                return false;
            }
            el.arc.begin
        };

        self.results[0] = source;
        true
    }

    /// Everything fixed: a membership test.
    fn step_f_f_f(&mut self) -> bool {
        let source = self.params[0].fixed();
        let connector = self.params[1].fixed();
        let target = self.params[2].fixed();
        self.results = [source, connector, target];
        self.finished = true;

        let pin = self.store.monitors().monitor_for(connector);
        let _guard = pin.read();
        let held = [pin];

        let Ok(el) = self.store.element_at(connector, &held) else {
            return false;
        };
        let ty = el.flags.element_type();
        if !ty.is_connector() {
            return false;
        }

        if ty.is_edge() {
            let incident =
                |addr: Addr| addr == el.arc.begin || addr == el.arc.end;
            incident(source) && incident(target)
        } else {
            source == el.arc.begin && target == el.arc.end
        }
    }
}

impl Iterator for TripleIter<'_> {
    type Item = (Addr, Addr, Addr);

    fn next(&mut self) -> Option<Self::Item> {
        self.next_triple()
            .then(|| (self.results[0], self.results[1], self.results[2]))
    }
}

/// For an undirected edge seen from one incident element, the element on
/// the other side.
fn other_incident(arc: &crate::element::ConnectorEnds, incident: Addr) -> Addr {
    if incident == arc.end {
        arc.begin
    } else {
        arc.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ConnectorEnds;

    #[test]
    fn other_incident_picks_far_side() {
        let arc = ConnectorEnds {
            begin: Addr::new(1, 1),
            end: Addr::new(1, 2),
            ..ConnectorEnds::default()
        };
        assert_eq!(other_incident(&arc, Addr::new(1, 1)), Addr::new(1, 2));
        assert_eq!(other_incident(&arc, Addr::new(1, 2)), Addr::new(1, 1));
    }

    #[test]
    fn param_accessors() {
        assert_eq!(IterParam::Fixed(Addr::new(1, 2)).fixed(), Addr::new(1, 2));
        assert_eq!(IterParam::Filter(ElementType::NODE).fixed(), Addr::EMPTY);
        assert_eq!(
            IterParam::Filter(ElementType::NODE).filter(),
            ElementType::NODE
        );
        assert_eq!(
            IterParam::Fixed(Addr::new(1, 2)).filter(),
            ElementType::empty()
        );
    }
}
