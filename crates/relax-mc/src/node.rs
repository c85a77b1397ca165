//! The exploration tree.
//!
//! One `Node` per executed action in the current trace. Nodes are
//! persistent artifacts: they survive the rollback that discards the
//! action arena, and they carry everything needed to steer a replay
//! toward an unexplored alternative. Candidate reads-from *lists* are
//! rebuilt deterministically on replay; only counts and cursors persist
//! here.

use relax_core::ThreadId;
use tracing::trace;

/// A future value sent to a read's node by a later write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FutureValue {
    pub value: u64,
    /// Sequence number of the write that offered the value.
    pub expiration: u64,
}

/// What a read at this node should observe on the current visit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadChoice {
    /// Index into the candidate list, newest first.
    Candidate(usize),
    /// Index into the node's future-value list.
    Future(usize),
}

/// Backtracking state for one executed action.
#[derive(Clone, Debug)]
pub struct Node {
    pub seq: u64,
    /// Thread chosen at this decision point.
    pub tid: ThreadId,
    /// Threads enabled here (including sleeping ones).
    pub enabled: u64,
    /// Threads marked for exploration from this point.
    backtrack: u64,
    /// Threads already explored from this point.
    pub explored: u64,
    /// Sleep set in force when this node's action was chosen.
    pub sleep: u64,
    /// Number of reads-from candidates, once built.
    read_from_total: Option<usize>,
    /// Combined cursor over candidates then future values.
    read_cursor: usize,
    future_values: Vec<FutureValue>,
}

impl Node {
    fn new(seq: u64, tid: ThreadId, enabled: u64, sleep: u64) -> Self {
        Self {
            seq,
            tid,
            enabled,
            backtrack: 0,
            explored: tid.bit(),
            sleep,
            read_from_total: None,
            read_cursor: 0,
            future_values: Vec::new(),
        }
    }

    #[inline]
    pub fn enabled_contains(&self, tid: ThreadId) -> bool {
        self.enabled & tid.bit() != 0
    }

    /// Mark `tid` as an alternative to explore from this node. No-op for
    /// threads not enabled here, already explored, or proven redundant.
    pub fn set_backtrack(&mut self, tid: ThreadId) -> bool {
        let bit = tid.bit();
        if self.enabled & bit == 0 || self.explored & bit != 0 || self.sleep & bit != 0 {
            return false;
        }
        if self.backtrack & bit != 0 {
            return false;
        }
        self.backtrack |= bit;
        true
    }

    fn take_backtrack(&mut self) -> Option<ThreadId> {
        if self.backtrack == 0 {
            return None;
        }
        let t = ThreadId(self.backtrack.trailing_zeros());
        self.backtrack &= !t.bit();
        Some(t)
    }

    /// Record the candidate count on first visit; verify it on replay.
    pub fn set_read_candidates(&mut self, total: usize) {
        match self.read_from_total {
            None => self.read_from_total = Some(total),
            Some(prev) => debug_assert_eq!(prev, total, "replay rebuilt a different candidate set"),
        }
    }

    pub fn read_choice(&self) -> Option<ReadChoice> {
        let total = self.read_from_total?;
        if self.read_cursor < total {
            Some(ReadChoice::Candidate(self.read_cursor))
        } else if self.read_cursor - total < self.future_values.len() {
            Some(ReadChoice::Future(self.read_cursor - total))
        } else {
            None
        }
    }

    pub fn future_value(&self, idx: usize) -> FutureValue {
        self.future_values[idx]
    }

    fn choice_count(&self) -> usize {
        self.read_from_total.unwrap_or(0) + self.future_values.len()
    }

    fn advance_read(&mut self) -> bool {
        if self.read_cursor + 1 < self.choice_count() {
            self.read_cursor += 1;
            true
        } else {
            false
        }
    }

    fn clear_read_state(&mut self) {
        self.read_from_total = None;
        self.read_cursor = 0;
        self.future_values.clear();
    }

    /// Offer a future value to the read at this node. Rejected when the
    /// cap is reached or a same-value entry already covers it within the
    /// expiration slop.
    pub fn add_future_value(&mut self, value: u64, expiration: u64, cap: u32, slop: u64) -> bool {
        if self.read_from_total.is_none() {
            return false;
        }
        if let Some(fv) = self.future_values.iter_mut().find(|fv| fv.value == value) {
            if expiration <= fv.expiration + slop {
                return false;
            }
            fv.expiration = expiration;
            return false;
        }
        if self.future_values.len() >= cap as usize {
            return false;
        }
        self.future_values.push(FutureValue { value, expiration });
        true
    }

    pub fn has_more_behaviors(&self) -> bool {
        self.backtrack != 0 || self.read_cursor + 1 < self.choice_count()
    }
}

/// The stack of nodes for the current trace, plus the replay cursor.
#[derive(Debug, Default)]
pub struct NodeStack {
    nodes: Vec<Node>,
    pos: usize,
}

impl NodeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_execution(&mut self) {
        self.pos = 0;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Thread forced by the replay prefix, if the cursor still points
    /// inside it.
    pub fn replay_tid(&self) -> Option<ThreadId> {
        self.nodes.get(self.pos).map(|n| n.tid)
    }

    pub fn replaying(&self) -> bool {
        self.pos < self.nodes.len()
    }

    /// Replay cursor: how many actions of the prefix have been consumed.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Reuse the node at the cursor when replaying a prefix, or push a
    /// fresh one when exploring. Returns (index, was_replaying).
    pub fn register(&mut self, seq: u64, tid: ThreadId, enabled: u64, sleep: u64) -> (usize, bool) {
        if self.pos < self.nodes.len() {
            let node = &mut self.nodes[self.pos];
            debug_assert_eq!(node.tid, tid, "replay divergence: wrong thread at node {}", self.pos);
            node.seq = seq;
            node.enabled = enabled;
            node.sleep = sleep;
            self.pos += 1;
            (self.pos - 1, true)
        } else {
            self.nodes.push(Node::new(seq, tid, enabled, sleep));
            self.pos += 1;
            (self.nodes.len() - 1, false)
        }
    }

    pub fn get(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Node {
        &mut self.nodes[idx]
    }

    pub fn head(&self) -> Option<&Node> {
        self.pos.checked_sub(1).map(|i| &self.nodes[i])
    }

    pub fn set_backtrack(&mut self, idx: usize, tid: ThreadId) -> bool {
        self.nodes[idx].set_backtrack(tid)
    }

    /// Deepest node with an unexplored behavior. Depth ties break toward
    /// the higher sequence number by construction.
    pub fn next_backtrack(&self) -> Option<usize> {
        self.nodes.iter().rposition(Node::has_more_behaviors)
    }

    /// Advance the chosen behavior at `idx` and truncate everything
    /// below it. Read alternatives are exhausted before scheduling
    /// alternatives; switching threads invalidates the node's read state.
    pub fn diverge(&mut self, idx: usize) {
        let node = &mut self.nodes[idx];
        if node.advance_read() {
            trace!(node = idx, cursor = node.read_cursor, "diverge: next reads-from");
        } else if let Some(t) = node.take_backtrack() {
            trace!(node = idx, tid = t.0, "diverge: alternate thread");
            node.tid = t;
            node.explored |= t.bit();
            node.clear_read_state();
        } else {
            unreachable!("diverge on a node with no remaining behaviors");
        }
        self.nodes.truncate(idx + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(i: u32) -> ThreadId {
        ThreadId(i)
    }

    #[test]
    fn test_register_and_replay() {
        let mut ns = NodeStack::new();
        let (i0, replay) = ns.register(1, t(1), 0b10, 0);
        assert_eq!((i0, replay), (0, false));
        ns.register(2, t(2), 0b110, 0);

        ns.reset_execution();
        assert_eq!(ns.replay_tid(), Some(t(1)));
        let (i0, replay) = ns.register(1, t(1), 0b10, 0);
        assert_eq!((i0, replay), (0, true));
        assert_eq!(ns.replay_tid(), Some(t(2)));
    }

    #[test]
    fn test_backtrack_marks_only_enabled_unexplored() {
        let mut ns = NodeStack::new();
        ns.register(1, t(1), t(1).bit() | t(2).bit(), 0);
        assert!(!ns.set_backtrack(0, t(1)), "chosen thread is already explored");
        assert!(!ns.set_backtrack(0, t(3)), "thread 3 is not enabled here");
        assert!(ns.set_backtrack(0, t(2)));
        assert!(!ns.set_backtrack(0, t(2)), "already marked");
    }

    #[test]
    fn test_diverge_switches_thread_and_truncates() {
        let mut ns = NodeStack::new();
        ns.register(1, t(1), t(1).bit() | t(2).bit(), 0);
        ns.register(2, t(1), t(1).bit() | t(2).bit(), 0);
        ns.set_backtrack(0, t(2));

        assert_eq!(ns.next_backtrack(), Some(0));
        ns.diverge(0);
        assert_eq!(ns.len(), 1);
        assert_eq!(ns.get(0).tid, t(2));
        assert_eq!(ns.get(0).explored, t(1).bit() | t(2).bit());
        assert_eq!(ns.next_backtrack(), None);
    }

    #[test]
    fn test_read_choices_then_futures() {
        let mut ns = NodeStack::new();
        ns.register(1, t(1), t(1).bit(), 0);
        let node = ns.get_mut(0);
        node.set_read_candidates(2);
        assert_eq!(node.read_choice(), Some(ReadChoice::Candidate(0)));
        assert!(node.add_future_value(7, 10, 4, 0));

        assert!(node.has_more_behaviors());
        ns.diverge(0);
        assert_eq!(ns.get(0).read_choice(), Some(ReadChoice::Candidate(1)));
        ns.diverge(0);
        assert_eq!(ns.get(0).read_choice(), Some(ReadChoice::Future(0)));
        assert!(!ns.get(0).has_more_behaviors());
    }

    #[test]
    fn test_future_value_cap_and_slop() {
        let mut ns = NodeStack::new();
        ns.register(1, t(1), t(1).bit(), 0);
        let node = ns.get_mut(0);
        node.set_read_candidates(1);
        assert!(node.add_future_value(7, 10, 2, 5));
        assert!(!node.add_future_value(7, 12, 2, 5), "within slop of existing entry");
        assert!(node.add_future_value(8, 10, 2, 5));
        assert!(!node.add_future_value(9, 10, 2, 5), "cap reached");
    }

    #[test]
    fn test_deepest_backtrack_wins() {
        let mut ns = NodeStack::new();
        ns.register(1, t(1), t(1).bit() | t(2).bit(), 0);
        ns.register(2, t(1), t(1).bit() | t(2).bit(), 0);
        ns.set_backtrack(0, t(2));
        ns.set_backtrack(1, t(2));
        assert_eq!(ns.next_backtrack(), Some(1));
    }
}
