//! Incremental "ordered before" graph with cycle detection and rollback.
//!
//! Vertices are actions or promises; edges carry the modification-order
//! and reads-from observations made so far. The graph must be acyclic at
//! every observable moment. A would-be cycle is not repaired: the edge is
//! recorded, the cycle flag is raised, and the current execution is
//! discarded as infeasible.
//!
//! Everything here is arena-indexed. The whole graph dies with the
//! execution it was built for.

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::action::ActRef;

/// A vertex: either an executed action or a promise standing in for a
/// not-yet-executed write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GraphNode {
    Action(ActRef),
    Promise(u64),
}

type EdgeList = SmallVec<[u32; 4]>;

#[derive(Debug)]
enum Undo {
    Edge { from: u32, to: u32 },
    RmwSet { node: u32, prev: Option<u32> },
}

#[derive(Debug)]
struct Mark {
    undo_len: usize,
    had_cycle: bool,
}

/// The modification-order graph.
#[derive(Debug, Default)]
pub struct CycleGraph {
    index: AHashMap<GraphNode, u32>,
    nodes: Vec<GraphNode>,
    succ: Vec<EdgeList>,
    pred: Vec<EdgeList>,
    /// The RMW that immediately follows this node in mo, if any. At most
    /// one RMW may read from a given write.
    rmw_succ: Vec<Option<u32>>,
    has_cycle: bool,
    undo: Vec<Undo>,
    marks: Vec<Mark>,
}

impl CycleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, n: GraphNode) -> u32 {
        if let Some(&i) = self.index.get(&n) {
            return i;
        }
        let i = self.nodes.len() as u32;
        self.nodes.push(n);
        self.succ.push(EdgeList::new());
        self.pred.push(EdgeList::new());
        self.rmw_succ.push(None);
        self.index.insert(n, i);
        i
    }

    /// Insert the edge `from -> to`. Returns false iff the edge closes a
    /// cycle; the edge is still recorded and the cycle flag raised.
    pub fn add_edge(&mut self, from: GraphNode, to: GraphNode) -> bool {
        let f = self.intern(from);
        let t = self.intern(to);
        self.add_edge_idx(f, t)
    }

    fn add_edge_idx(&mut self, f: u32, t: u32) -> bool {
        if f == t {
            self.has_cycle = true;
            return false;
        }
        if self.succ[f as usize].contains(&t) {
            return true;
        }
        let closes_cycle = self.reachable_idx(t, f);
        self.succ[f as usize].push(t);
        self.pred[t as usize].push(f);
        self.undo.push(Undo::Edge { from: f, to: t });
        if closes_cycle {
            self.has_cycle = true;
            return false;
        }
        // An RMW sits immediately after its source in mo: any new
        // successor of the source must also follow the RMW.
        if let Some(r) = self.rmw_succ[f as usize] {
            if r != t {
                return self.add_edge_idx(r, t);
            }
        }
        true
    }

    /// Assert that `rmw` immediately follows `from` in mo. Existing
    /// successors of `from` are pushed after `rmw`. A second RMW reading
    /// from the same write is a modification-order violation.
    pub fn add_rmw_edge(&mut self, from: GraphNode, rmw: GraphNode) -> bool {
        let f = self.intern(from);
        let r = self.intern(rmw);
        if let Some(prev) = self.rmw_succ[f as usize] {
            if prev != r {
                self.has_cycle = true;
                return false;
            }
        }
        self.undo.push(Undo::RmwSet {
            node: f,
            prev: self.rmw_succ[f as usize],
        });
        self.rmw_succ[f as usize] = Some(r);

        let mut ok = true;
        let existing: EdgeList = self.succ[f as usize].clone();
        for s in existing {
            if s != r {
                ok &= self.add_edge_idx(r, s);
            }
        }
        ok &= self.add_edge_idx(f, r);
        ok
    }

    /// Is there a path `from ->* to`?
    pub fn check_reachable(&self, from: GraphNode, to: GraphNode) -> bool {
        let (Some(&f), Some(&t)) = (self.index.get(&from), self.index.get(&to)) else {
            return false;
        };
        self.reachable_idx(f, t)
    }

    fn reachable_idx(&self, from: u32, to: u32) -> bool {
        if from == to {
            return true;
        }
        let mut seen = vec![false; self.nodes.len()];
        let mut queue: SmallVec<[u32; 16]> = SmallVec::new();
        seen[from as usize] = true;
        queue.push(from);
        while let Some(n) = queue.pop() {
            for &s in &self.succ[n as usize] {
                if s == to {
                    return true;
                }
                if !seen[s as usize] {
                    seen[s as usize] = true;
                    queue.push(s);
                }
            }
        }
        false
    }

    /// Whether `write` already has an RMW reading from it.
    pub fn has_rmw_successor(&self, write: GraphNode) -> bool {
        self.index
            .get(&write)
            .is_some_and(|&i| self.rmw_succ[i as usize].is_some())
    }

    /// Could `write` stand in for `promise` without breaking the order
    /// recorded so far? Probes the substitution edges under a checkpoint
    /// and rolls back.
    pub fn check_promise(&mut self, write: GraphNode, promise: GraphNode) -> bool {
        let Some(&p) = self.index.get(&promise) else {
            // A promise no reader constrained yet fits anywhere.
            return true;
        };
        let w = self.intern(write);
        let had_cycle = self.has_cycle;
        self.checkpoint();
        let ok = self.splice_idx(p, w);
        self.rollback();
        debug_assert_eq!(self.has_cycle, had_cycle);
        ok
    }

    /// Replace `promise` by `write`: every order constraint recorded
    /// against the promise is transferred to the write. Returns false if
    /// the transfer closes a cycle.
    pub fn resolve_promise(&mut self, promise: GraphNode, write: GraphNode) -> bool {
        let p = self.intern(promise);
        let w = self.intern(write);
        self.splice_idx(p, w)
    }

    fn splice_idx(&mut self, p: u32, w: u32) -> bool {
        let mut ok = true;
        let preds: EdgeList = self.pred[p as usize].clone();
        let succs: EdgeList = self.succ[p as usize].clone();
        for x in preds {
            if x != w {
                ok &= self.add_edge_idx(x, w);
            }
        }
        for y in succs {
            if y != w {
                ok &= self.add_edge_idx(w, y);
            }
        }
        // An RMW chained onto the promise now reads from the write.
        if let Some(r) = self.rmw_succ[p as usize] {
            match self.rmw_succ[w as usize] {
                None => {
                    self.undo.push(Undo::RmwSet {
                        node: w,
                        prev: None,
                    });
                    self.rmw_succ[w as usize] = Some(r);
                }
                Some(existing) if existing != r => {
                    self.has_cycle = true;
                    ok = false;
                }
                Some(_) => {}
            }
        }
        ok
    }

    #[inline]
    pub fn has_cycle(&self) -> bool {
        self.has_cycle
    }

    /// Mark the current edge set. Rollback discards everything added
    /// since the matching mark, including a raised cycle flag.
    pub fn checkpoint(&mut self) {
        self.marks.push(Mark {
            undo_len: self.undo.len(),
            had_cycle: self.has_cycle,
        });
    }

    pub fn rollback(&mut self) {
        let mark = self.marks.pop().expect("rollback without checkpoint");
        while self.undo.len() > mark.undo_len {
            match self.undo.pop().unwrap() {
                Undo::Edge { from, to } => {
                    let s = &mut self.succ[from as usize];
                    let i = s.iter().rposition(|&x| x == to).unwrap();
                    s.remove(i);
                    let p = &mut self.pred[to as usize];
                    let i = p.iter().rposition(|&x| x == from).unwrap();
                    p.remove(i);
                }
                Undo::RmwSet { node, prev } => {
                    self.rmw_succ[node as usize] = prev;
                }
            }
        }
        self.has_cycle = mark.had_cycle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(i: ActRef) -> GraphNode {
        GraphNode::Action(i)
    }

    #[test]
    fn test_chain_is_acyclic() {
        let mut g = CycleGraph::new();
        assert!(g.add_edge(a(0), a(1)));
        assert!(g.add_edge(a(1), a(2)));
        assert!(!g.has_cycle());
        assert!(g.check_reachable(a(0), a(2)));
        assert!(!g.check_reachable(a(2), a(0)));
    }

    #[test]
    fn test_cycle_detected_and_flagged() {
        let mut g = CycleGraph::new();
        g.add_edge(a(0), a(1));
        g.add_edge(a(1), a(2));
        assert!(!g.add_edge(a(2), a(0)));
        assert!(g.has_cycle());
        // The offending edge is still recorded.
        assert!(g.check_reachable(a(2), a(0)));
    }

    #[test]
    fn test_self_edge_is_a_cycle() {
        let mut g = CycleGraph::new();
        assert!(!g.add_edge(a(3), a(3)));
        assert!(g.has_cycle());
    }

    #[test]
    fn test_duplicate_edge_is_noop() {
        let mut g = CycleGraph::new();
        assert!(g.add_edge(a(0), a(1)));
        assert!(g.add_edge(a(0), a(1)));
        assert!(!g.has_cycle());
    }

    #[test]
    fn test_rmw_edge_splices_successors() {
        let mut g = CycleGraph::new();
        // w -> x recorded first, then an RMW claims the slot right
        // after w: x must end up after the RMW.
        g.add_edge(a(0), a(2));
        assert!(g.add_rmw_edge(a(0), a(1)));
        assert!(g.check_reachable(a(1), a(2)));
        assert!(!g.has_cycle());
    }

    #[test]
    fn test_two_rmws_from_same_write_is_a_violation() {
        let mut g = CycleGraph::new();
        assert!(g.add_rmw_edge(a(0), a(1)));
        assert!(!g.add_rmw_edge(a(0), a(2)));
        assert!(g.has_cycle());
    }

    #[test]
    fn test_later_successors_ordered_after_rmw() {
        let mut g = CycleGraph::new();
        assert!(g.add_rmw_edge(a(0), a(1)));
        g.add_edge(a(0), a(2));
        assert!(g.check_reachable(a(1), a(2)));
    }

    #[test]
    fn test_checkpoint_rollback() {
        let mut g = CycleGraph::new();
        g.add_edge(a(0), a(1));
        g.checkpoint();
        g.add_edge(a(1), a(2));
        assert!(!g.add_edge(a(2), a(0)));
        assert!(g.has_cycle());
        g.rollback();
        assert!(!g.has_cycle());
        assert!(!g.check_reachable(a(1), a(2)));
        assert!(g.check_reachable(a(0), a(1)));
    }

    #[test]
    fn test_promise_resolution() {
        let mut g = CycleGraph::new();
        let p = GraphNode::Promise(7);
        g.add_edge(a(0), p);
        g.add_edge(p, a(1));
        assert!(g.check_promise(a(2), p));
        assert!(g.resolve_promise(p, a(2)));
        assert!(g.check_reachable(a(0), a(2)));
        assert!(g.check_reachable(a(2), a(1)));
    }

    #[test]
    fn test_promise_resolution_conflict() {
        let mut g = CycleGraph::new();
        let p = GraphNode::Promise(7);
        g.add_edge(a(0), p);
        // The candidate write is already ordered before the promise's
        // predecessor, so substitution would close a cycle.
        g.add_edge(a(1), a(0));
        assert!(!g.check_promise(a(1), p));
        assert!(!g.has_cycle(), "probe must not leave a mark");
    }
}
