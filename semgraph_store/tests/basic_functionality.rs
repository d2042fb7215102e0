//! End-to-end scenarios over the public store surface.

use semgraph_store::GraphStore;
use semgraph_store::semgraph::{Addr, StoreParams, StoreError, types::ElementType};

fn test_store() -> GraphStore {
    GraphStore::initialize(StoreParams {
        max_segments: 4,
        dispatch_threads: 1,
        ..StoreParams::default()
    })
    .unwrap()
}

#[test]
fn simple_triple() {
    let store = test_store();

    let node = store.create_node(ElementType::CONST).unwrap();
    let link = store.create_link(ElementType::CONST).unwrap();
    let arc = store
        .create_connector(ElementType::ARC_CONST_POS_PERM, node, link)
        .unwrap();

    assert!(store.is_element(node));
    assert!(store.is_element(link));
    assert!(store.is_element(arc));

    assert_eq!(store.get_arc_begin(arc).unwrap(), node);
    assert_eq!(store.get_arc_end(arc).unwrap(), link);
    assert_eq!(store.get_arc_info(arc).unwrap(), (node, link));
    assert_eq!(store.get_output_arcs_count(node), 1);
    assert_eq!(store.get_input_arcs_count(link), 1);

    assert_eq!(store.get_type(node).unwrap(), ElementType::NODE_CONST);
    assert_eq!(store.get_type(link).unwrap(), ElementType::LINK_CONST);
    assert_eq!(store.get_type(arc).unwrap(), ElementType::ARC_CONST_POS_PERM);
}

#[test]
fn cascading_erase() {
    let store = test_store();

    let node = store.create_node(ElementType::CONST).unwrap();
    let link = store.create_link(ElementType::CONST).unwrap();
    let arc = store
        .create_connector(ElementType::ARC_CONST_POS_PERM, node, link)
        .unwrap();

    store.erase_element(node).unwrap();

    assert!(!store.is_element(node));
    assert!(!store.is_element(arc));
    assert!(store.is_element(link));
    assert_eq!(store.get_input_arcs_count(link), 0);
}

#[test]
fn erase_cascades_through_connectors_on_connectors() {
    let store = test_store();

    let a = store.create_node(ElementType::CONST).unwrap();
    let b = store.create_node(ElementType::CONST).unwrap();
    let c = store.create_node(ElementType::CONST).unwrap();
    let ab = store
        .create_connector(ElementType::ARC_CONST_POS_PERM, a, b)
        .unwrap();
    // An arc targeting another arc: erased transitively with it.
    let c_ab = store
        .create_connector(ElementType::ARC_CONST_POS_PERM, c, ab)
        .unwrap();

    store.erase_element(a).unwrap();

    assert!(!store.is_element(a));
    assert!(!store.is_element(ab));
    assert!(!store.is_element(c_ab));
    assert!(store.is_element(b));
    assert!(store.is_element(c));
    assert_eq!(store.get_output_arcs_count(c), 0);
    assert_eq!(store.get_input_arcs_count(b), 0);
}

#[test]
fn iter_f_a_a_collects_all_targets() {
    let store = test_store();

    let node = store.create_node(ElementType::CONST).unwrap();
    let links: Vec<Addr> = (0..3)
        .map(|_| store.create_link(ElementType::CONST).unwrap())
        .collect();
    for link in &links {
        store
            .create_connector(ElementType::ARC_CONST_POS_PERM, node, *link)
            .unwrap();
    }

    let mut seen: Vec<Addr> = store
        .iter_f_a_a(node, ElementType::ARC_ACCESS, ElementType::LINK)
        .map(|(source, _, target)| {
            assert_eq!(source, node);
            target
        })
        .collect();
    seen.sort_by_key(|addr| (addr.seg, addr.off));

    let mut expected = links.clone();
    expected.sort_by_key(|addr| (addr.seg, addr.off));
    assert_eq!(seen, expected);
}

#[test]
fn iterators_filter_by_required_bits() {
    let store = test_store();

    let node = store.create_node(ElementType::CONST).unwrap();
    let const_link = store.create_link(ElementType::CONST).unwrap();
    let var_link = store.create_link(ElementType::VAR).unwrap();
    store
        .create_connector(ElementType::ARC_CONST_POS_PERM, node, const_link)
        .unwrap();
    store
        .create_connector(ElementType::ARC_CONST_POS_PERM, node, var_link)
        .unwrap();

    let only_const: Vec<Addr> = store
        .iter_f_a_a(node, ElementType::ARC_ACCESS, ElementType::LINK | ElementType::CONST)
        .map(|(_, _, target)| target)
        .collect();
    assert_eq!(only_const, vec![const_link]);

    // An over-constrained connector filter matches nothing.
    let none: Vec<Addr> = store
        .iter_f_a_a(node, ElementType::ARC_ACCESS | ElementType::VAR, ElementType::LINK)
        .map(|(_, _, target)| target)
        .collect();
    assert!(none.is_empty());
}

#[test]
fn fixed_pattern_iterators() {
    let store = test_store();

    let a = store.create_node(ElementType::CONST).unwrap();
    let b = store.create_node(ElementType::CONST).unwrap();
    let arc = store
        .create_connector(ElementType::ARC_CONST_POS_PERM, a, b)
        .unwrap();

    // A-A-F walks the target's incoming list.
    let incoming: Vec<(Addr, Addr, Addr)> = store
        .iter_a_a_f(ElementType::NODE, ElementType::ARC_ACCESS, b)
        .collect();
    assert_eq!(incoming, vec![(a, arc, b)]);

    // F-A-F filters on both fixed endpoints.
    let between: Vec<(Addr, Addr, Addr)> = store
        .iter_f_a_f(a, ElementType::ARC_ACCESS, b)
        .collect();
    assert_eq!(between, vec![(a, arc, b)]);
    assert_eq!(store.iter_f_a_f(b, ElementType::ARC_ACCESS, a).count(), 0);

    // A-F-A resolves the fixed connector once.
    let mut it = store.iter_a_f_a(ElementType::NODE, arc, ElementType::NODE);
    assert!(it.next_triple());
    assert_eq!(it.value(0), a);
    assert_eq!(it.value(1), arc);
    assert_eq!(it.value(2), b);
    assert!(!it.next_triple());
    assert_eq!(it.value(0), Addr::EMPTY);

    // F-F-A requires the connector to leave the fixed source.
    assert_eq!(store.iter_f_f_a(a, arc, ElementType::NODE).count(), 1);
    assert_eq!(store.iter_f_f_a(b, arc, ElementType::NODE).count(), 0);

    // A-F-F requires the connector to enter the fixed target.
    assert_eq!(store.iter_a_f_f(ElementType::NODE, arc, b).count(), 1);
    assert_eq!(store.iter_a_f_f(ElementType::NODE, arc, a).count(), 0);

    // F-F-F is a membership test.
    assert_eq!(store.iter_f_f_f(a, arc, b).count(), 1);
    assert_eq!(store.iter_f_f_f(b, arc, a).count(), 0);
    assert_eq!(store.iter_f_f_f(a, b, b).count(), 0);
}

#[test]
fn iterator_on_invalid_fixed_address_is_empty() {
    let store = test_store();
    let node = store.create_node(ElementType::CONST).unwrap();
    store.erase_element(node).unwrap();

    assert_eq!(
        store
            .iter_f_a_a(node, ElementType::ARC_ACCESS, ElementType::NODE)
            .count(),
        0
    );
    assert_eq!(
        store
            .iter_f_a_a(Addr::EMPTY, ElementType::ARC_ACCESS, ElementType::NODE)
            .count(),
        0
    );
}

#[test]
fn undirected_edge_sits_in_both_incidence_lists() {
    let store = test_store();

    let a = store.create_node(ElementType::CONST).unwrap();
    let b = store.create_node(ElementType::CONST).unwrap();
    let edge = store.create_connector(ElementType::EDGE_CONST, a, b).unwrap();

    assert_eq!(store.get_output_arcs_count(a), 1);
    assert_eq!(store.get_input_arcs_count(a), 1);
    assert_eq!(store.get_output_arcs_count(b), 1);
    assert_eq!(store.get_input_arcs_count(b), 1);

    // The walk from either endpoint reaches the other.
    let from_a: Vec<(Addr, Addr, Addr)> = store
        .iter_f_a_a(a, ElementType::EDGE_COMMON, ElementType::NODE)
        .collect();
    assert_eq!(from_a, vec![(a, edge, b)]);
    let from_b: Vec<(Addr, Addr, Addr)> = store
        .iter_f_a_a(b, ElementType::EDGE_COMMON, ElementType::NODE)
        .collect();
    assert_eq!(from_b, vec![(b, edge, a)]);

    // F-A-F matches in both orientations.
    assert_eq!(store.iter_f_a_f(a, ElementType::EDGE_COMMON, b).count(), 1);
    assert_eq!(store.iter_f_a_f(b, ElementType::EDGE_COMMON, a).count(), 1);
    // F-F-F accepts either endpoint order.
    assert_eq!(store.iter_f_f_f(b, edge, a).count(), 1);

    store.erase_element(edge).unwrap();
    assert_eq!(store.get_output_arcs_count(a), 0);
    assert_eq!(store.get_input_arcs_count(a), 0);
    assert_eq!(store.get_output_arcs_count(b), 0);
    assert_eq!(store.get_input_arcs_count(b), 0);
    assert!(store.is_element(a));
    assert!(store.is_element(b));
}

#[test]
fn full_memory_and_slot_reuse() {
    let store = GraphStore::initialize(StoreParams {
        max_segments: 1,
        dispatch_threads: 1,
        ..StoreParams::default()
    })
    .unwrap();

    // Fill the single segment with triples until creation fails.
    let mut created: Vec<Addr> = Vec::new();
    loop {
        let Ok(node) = store.create_node(ElementType::CONST) else {
            break;
        };
        created.push(node);
        let Ok(link) = store.create_link(ElementType::CONST) else {
            break;
        };
        created.push(link);
        let Ok(arc) = store.create_connector(ElementType::ARC_CONST_POS_PERM, node, link) else {
            break;
        };
        created.push(arc);
    }
    let total = created.len();
    assert!(total > 0);
    assert!(matches!(
        store.create_node(ElementType::CONST),
        Err(StoreError::FullMemory { .. })
    ));

    // Erase everything (cascades cover the connectors).
    for addr in &created {
        if store.is_element(*addr) {
            store.erase_element(*addr).unwrap();
        }
    }

    // Exactly the freed capacity is reusable, without growing the pool.
    for _ in 0..total {
        store.create_node(ElementType::CONST).unwrap();
    }
    assert_eq!(store.segments_count(), 1);
    assert!(matches!(
        store.create_node(ElementType::CONST),
        Err(StoreError::FullMemory { .. })
    ));
}

#[test]
fn operations_on_empty_address_fail() {
    let store = test_store();

    assert!(!store.is_element(Addr::EMPTY));
    assert!(store.get_type(Addr::EMPTY).is_err());
    assert!(store.erase_element(Addr::EMPTY).is_err());
    assert!(store.get_arc_begin(Addr::EMPTY).is_err());
    assert!(store.get_arc_end(Addr::EMPTY).is_err());
    assert!(store.change_subtype(Addr::EMPTY, ElementType::NODE_CONST).is_err());
    assert!(store.get_link_content(Addr::EMPTY).is_err());
    assert!(store.set_link_content(Addr::EMPTY, b"", true).is_err());
    assert_eq!(store.get_output_arcs_count(Addr::EMPTY), 0);
    assert_eq!(store.get_input_arcs_count(Addr::EMPTY), 0);
    assert!(matches!(
        store.create_connector(ElementType::ARC_CONST_POS_PERM, Addr::EMPTY, Addr::EMPTY),
        Err(StoreError::InvalidParams)
    ));
}

#[test]
fn subtype_battery() {
    let store = test_store();

    let node = store.create_node(ElementType::CONST).unwrap();
    let link = store.create_link(ElementType::CONST).unwrap();
    let arc = store
        .create_connector(ElementType::ARC_CONST_POS_PERM, node, link)
        .unwrap();

    store.change_subtype(node, ElementType::NODE_VAR).unwrap();
    assert_eq!(store.get_type(node).unwrap(), ElementType::NODE_VAR);

    store
        .change_subtype(link, ElementType::LINK | ElementType::VAR)
        .unwrap();
    assert_eq!(
        store.get_type(link).unwrap(),
        ElementType::LINK | ElementType::VAR
    );

    let neg = ElementType::ARC_ACCESS
        | ElementType::CONST
        | ElementType::ARC_NEG
        | ElementType::ARC_PERM;
    store.change_subtype(arc, neg).unwrap();
    assert_eq!(store.get_type(arc).unwrap(), neg);

    // Category crossings are refused.
    assert!(store.change_subtype(node, ElementType::ARC_CONST_POS_PERM).is_err());
    assert!(store.change_subtype(arc, ElementType::NODE_CONST).is_err());
    assert!(store.change_subtype(link, ElementType::EDGE_CONST).is_err());
}

#[test]
fn begin_end_process_reuse_segments() {
    let store = test_store();

    let first = std::thread::scope(|scope| {
        scope
            .spawn(|| {
                store.begin_process();
                let addr = store.create_node(ElementType::CONST).unwrap();
                store.end_process();
                addr
            })
            .join()
            .unwrap()
    });

    let second = std::thread::scope(|scope| {
        scope
            .spawn(|| {
                store.begin_process();
                let addr = store.create_node(ElementType::CONST).unwrap();
                store.end_process();
                addr
            })
            .join()
            .unwrap()
    });

    // The second thread inherited the first thread's segment.
    assert_eq!(first.seg, second.seg);
}
