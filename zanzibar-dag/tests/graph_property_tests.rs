//! Property-based tests for the relation graph
//!
//! Random edge sets are pushed through the cycle-guarded write path and the
//! resulting graph is checked for acyclicity and traversal consistency.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use zanzibar_dag::config::PaginationConfig;
use zanzibar_dag::repository::InMemoryTupleStore;
use zanzibar_dag::*;

const NODES: usize = 8;

fn node(index: usize) -> Vertex {
    Vertex::new("group", &index.to_string(), "member")
}

fn edge(from: usize, to: usize) -> RelationTuple {
    RelationTuple::new(&node(to), &node(from))
}

/// Arbitrary directed edges, cycles and self-loops included
fn arb_edges() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..NODES, 0..NODES), 1..24)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Write every edge through the guarded path, returning the ones accepted.
async fn build_graph(engine: &RelationEngine, edges: &[(usize, usize)]) -> Vec<RelationTuple> {
    let mut accepted = Vec::new();
    for &(from, to) in edges {
        let tuple = edge(from, to);
        match engine.create(&tuple, true).await {
            Ok(()) => {
                if !accepted.contains(&tuple) {
                    accepted.push(tuple);
                }
            }
            Err(DagError::GraphCycle(_)) => {}
            Err(e) => panic!("unexpected error for {}: {}", tuple, e),
        }
    }
    accepted
}

fn new_engine() -> (Arc<InMemoryTupleStore>, RelationEngine) {
    let store = Arc::new(InMemoryTupleStore::new());
    let engine = RelationEngine::new(store.clone(), &PaginationConfig::default()).unwrap();
    (store, engine)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Closing any chain is rejected and leaves the store unchanged
    #[test]
    fn prop_closing_a_chain_is_rejected(len in 2usize..NODES, back in 0usize..NODES) {
        let back = back % len;
        let rt = runtime();
        rt.block_on(async {
            let (store, engine) = new_engine();
            for i in 0..len - 1 {
                engine.create(&edge(i, i + 1), false).await.unwrap();
            }
            let before = store.len();

            let result = engine.create(&edge(len - 1, back), false).await;
            assert!(matches!(result, Err(DagError::GraphCycle(_))));
            assert_eq!(store.len(), before);
        });
    }

    /// No stored edge has its object reaching back to its subject
    #[test]
    fn prop_guarded_writes_keep_graph_acyclic(edges in arb_edges()) {
        let rt = runtime();
        rt.block_on(async {
            let (_, engine) = new_engine();
            let accepted = build_graph(&engine, &edges).await;
            let none = SearchCondition::default();

            for tuple in &accepted {
                assert!(engine.check(&tuple.subject(), &tuple.object(), &none).await.unwrap());
                assert!(
                    !engine.check(&tuple.object(), &tuple.subject(), &none).await.unwrap(),
                    "{} closes a cycle",
                    tuple
                );
            }
        });
    }

    /// The shortest path is one of the enumerated paths and none is shorter
    #[test]
    fn prop_shortest_path_is_among_all_paths(
        edges in arb_edges(),
        from in 0usize..NODES,
        to in 0usize..NODES,
    ) {
        let rt = runtime();
        rt.block_on(async {
            let (_, engine) = new_engine();
            build_graph(&engine, &edges).await;
            let none = SearchCondition::default();

            let reachable = engine.check(&node(from), &node(to), &none).await.unwrap();
            let shortest = engine.get_shortest_path(&node(from), &node(to), &none).await.unwrap();
            let all = engine.get_all_paths(&node(from), &node(to), &none).await.unwrap();

            assert_eq!(reachable, shortest.is_some());
            assert_eq!(reachable, !all.is_empty());

            if let Some(shortest) = shortest {
                assert!(all.contains(&shortest));
                let min = all.iter().map(Vec::len).min().unwrap();
                assert_eq!(shortest.len(), min);

                // Paths are contiguous from subject to object
                for path in &all {
                    assert_eq!(path[0].subject(), node(from));
                    assert_eq!(path[path.len() - 1].object(), node(to));
                    for pair in path.windows(2) {
                        assert_eq!(pair[0].object(), pair[1].subject());
                    }
                }
            }

            let unique: HashSet<_> = all.iter().collect();
            assert_eq!(unique.len(), all.len());
        });
    }

    /// Raising the depth bound only ever adds tuples
    #[test]
    fn prop_depth_is_monotonic(edges in arb_edges(), start in 0usize..NODES) {
        let rt = runtime();
        rt.block_on(async {
            let (_, engine) = new_engine();
            build_graph(&engine, &edges).await;
            let none = SearchCondition::default();
            let all = CollectCondition::default();

            let mut previous: HashSet<RelationTuple> = HashSet::new();
            for depth in 0..=NODES {
                let current: HashSet<RelationTuple> = engine
                    .get_all_object_relations(&node(start), &none, &all, depth)
                    .await
                    .unwrap()
                    .into_iter()
                    .collect();
                assert!(previous.is_subset(&current));
                previous = current;
            }
        });
    }

    /// A search condition can only shrink what traversal discovers
    #[test]
    fn prop_search_condition_prunes(
        edges in arb_edges(),
        start in 0usize..NODES,
        allowed in prop::collection::hash_set(0usize..NODES, 1..NODES),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let (_, engine) = new_engine();
            build_graph(&engine, &edges).await;
            let all = CollectCondition::default();

            let mut allow = Compare::default();
            for index in &allowed {
                allow = allow.with_name(&index.to_string());
            }
            let restricted = SearchCondition::new(allow);

            let unrestricted: HashSet<RelationTuple> = engine
                .get_all_subject_relations(&node(start), &SearchCondition::default(), &all, NODES)
                .await
                .unwrap()
                .into_iter()
                .collect();
            let pruned = engine
                .get_all_subject_relations(&node(start), &restricted, &all, NODES)
                .await
                .unwrap();

            for tuple in pruned {
                assert!(unrestricted.contains(&tuple));
            }
        });
    }

    /// Names carrying the reserved delimiter never reach the store
    #[test]
    fn prop_reserved_delimiter_is_rejected(
        prefix in "[a-z0-9]{0,8}",
        suffix in "[a-z0-9]{0,8}",
        field in 0usize..6,
    ) {
        let rt = runtime();
        rt.block_on(async {
            let (store, engine) = new_engine();
            let mut tuple: RelationTuple = "doc:1#viewer@group:eng#member".parse().unwrap();
            let value = format!("{}%{}", prefix, suffix);
            match field {
                0 => tuple.object_namespace = value,
                1 => tuple.object_name = value,
                2 => tuple.relation = value,
                3 => tuple.subject_namespace = value,
                4 => tuple.subject_name = value,
                _ => tuple.subject_relation = value,
            }

            let result = engine.create(&tuple, false).await;
            assert!(matches!(result, Err(DagError::RequestBody(_))));
            assert!(store.is_empty());
        });
    }
}
