//! Property suites for the algebraic leaves: clock vectors and the
//! ordered-before graph.

use proptest::prelude::*;
use relax_core::{ClockVector, CycleGraph, GraphNode, ThreadId};

fn cv_from(entries: &[(u8, u16)]) -> ClockVector {
    let mut cv = ClockVector::new();
    for &(t, s) in entries {
        cv.set(ThreadId(t as u32 % 8), s as u64);
    }
    cv
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 512,
        .. ProptestConfig::default()
    })]

    #[test]
    fn merge_is_commutative(a in prop::collection::vec((0u8..8, 0u16..64), 0..12),
                            b in prop::collection::vec((0u8..8, 0u16..64), 0..12)) {
        let (mut x, mut y) = (cv_from(&a), cv_from(&b));
        x.merge(&cv_from(&b));
        y.merge(&cv_from(&a));
        for t in 0..8 {
            prop_assert_eq!(x.get(ThreadId(t)), y.get(ThreadId(t)));
        }
    }

    #[test]
    fn merge_is_idempotent_and_monotone(a in prop::collection::vec((0u8..8, 0u16..64), 0..12),
                                        b in prop::collection::vec((0u8..8, 0u16..64), 0..12)) {
        let base = cv_from(&a);
        let other = cv_from(&b);
        let mut once = base.clone();
        once.merge(&other);
        let mut twice = once.clone();
        prop_assert!(!twice.merge(&other), "second merge must not change anything");
        for t in 0..8 {
            let t = ThreadId(t);
            prop_assert!(once.get(t) >= base.get(t));
            prop_assert!(once.get(t) >= other.get(t));
        }
    }

    #[test]
    fn minmerge_is_a_lower_bound(a in prop::collection::vec((0u8..8, 0u16..64), 0..12),
                                 b in prop::collection::vec((0u8..8, 0u16..64), 0..12)) {
        let base = cv_from(&a);
        let other = cv_from(&b);
        let mut min = base.clone();
        min.minmerge(&other);
        for t in 0..8 {
            let t = ThreadId(t);
            prop_assert!(min.get(t) <= base.get(t));
            prop_assert!(min.get(t) <= other.get(t));
            prop_assert_eq!(min.get(t), base.get(t).min(other.get(t)));
        }
    }

    /// The incremental cycle flag must agree with a naive reachability
    /// check replayed over the same edge insertions.
    #[test]
    fn cycle_flag_matches_naive_reachability(edges in prop::collection::vec((0u8..10, 0u8..10), 1..40)) {
        let mut graph = CycleGraph::new();
        let mut naive: Vec<(u8, u8)> = Vec::new();
        let mut naive_cycle = false;

        for &(f, t) in &edges {
            let is_dup = naive.contains(&(f, t));
            let closes = f == t || naive_reachable(&naive, t, f);
            let ok = graph.add_edge(GraphNode::Action(f as usize), GraphNode::Action(t as usize));
            if f == t {
                naive_cycle = true;
                prop_assert!(!ok);
            } else if !is_dup {
                // A fresh edge fails exactly when it closes a cycle.
                prop_assert_eq!(ok, !closes);
                if closes {
                    naive_cycle = true;
                }
                naive.push((f, t));
            }
        }
        prop_assert_eq!(graph.has_cycle(), naive_cycle);
    }

    /// Rollback restores reachability exactly.
    #[test]
    fn rollback_undoes_edges(before in prop::collection::vec((0u8..8, 0u8..8), 0..15),
                             after in prop::collection::vec((0u8..8, 0u8..8), 1..15)) {
        let mut graph = CycleGraph::new();
        for &(f, t) in &before {
            graph.add_edge(GraphNode::Action(f as usize), GraphNode::Action(t as usize));
        }
        let snapshot: Vec<Vec<bool>> = reach_matrix(&graph, 8);
        let had_cycle = graph.has_cycle();

        graph.checkpoint();
        for &(f, t) in &after {
            graph.add_edge(GraphNode::Action(f as usize), GraphNode::Action(t as usize));
        }
        graph.rollback();

        prop_assert_eq!(reach_matrix(&graph, 8), snapshot);
        prop_assert_eq!(graph.has_cycle(), had_cycle);
    }
}

fn naive_reachable(edges: &[(u8, u8)], from: u8, to: u8) -> bool {
    let mut seen = [false; 10];
    let mut stack = vec![from];
    while let Some(n) = stack.pop() {
        if n == to {
            return true;
        }
        if seen[n as usize] {
            continue;
        }
        seen[n as usize] = true;
        for &(f, t) in edges {
            if f == n {
                stack.push(t);
            }
        }
    }
    false
}

fn reach_matrix(graph: &CycleGraph, n: usize) -> Vec<Vec<bool>> {
    (0..n)
        .map(|i| {
            (0..n)
                .map(|j| {
                    i != j && graph.check_reachable(GraphNode::Action(i), GraphNode::Action(j))
                })
                .collect()
        })
        .collect()
}
