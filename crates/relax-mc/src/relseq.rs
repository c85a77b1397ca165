//! Release sequences.
//!
//! The release sequence from a release write `w` is the maximal mo chain
//! starting at `w` consisting of `w`, subsequent RMWs on the same
//! location by any thread, and later writes by `w`'s thread. An acquire
//! read observing any element of the chain synchronizes with `w`.
//! Whether another thread's write lands mo-between the head and the
//! observed element may be undecided when the read executes; such heads
//! stay pending and are re-examined on every subsequent write.

use relax_core::{ActRef, CycleGraph, GraphNode, LocationId, ModelAction, ThreadId};
use smallvec::SmallVec;

use crate::history::ObjectHistory;

pub type HeadList = SmallVec<[ActRef; 4]>;

/// A release-sequence head whose fate is not yet decided.
#[derive(Clone, Debug)]
pub struct PendingRelSeq {
    /// The acquire read awaiting the synchronization.
    pub acquire: ActRef,
    /// The write the acquire reads from (top of the RMW chain).
    pub rf: ActRef,
    /// The candidate head.
    pub release: ActRef,
    /// The non-RMW write at the bottom of the chain, by the head's thread.
    pub bottom: ActRef,
    pub location: LocationId,
    /// Writes whose mo placement could break the sequence.
    pub breakwrites: Vec<ActRef>,
}

/// Verdict on a pending sequence given the mo edges known so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelSeqFate {
    /// Every potential break write is known to fall outside the chain.
    Established,
    /// Some write is known to fall between head and bottom.
    Broken,
    /// At least one write's placement is still open.
    Undecided,
}

/// Unresolved heads, re-examined as writes arrive.
#[derive(Debug, Default)]
pub struct RelSeqTracker {
    pending: Vec<PendingRelSeq>,
}

impl RelSeqTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, p: PendingRelSeq) {
        self.pending.push(p);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Record a new write on `loc` as a potential break candidate, then
    /// hand back the indices of pending sequences on that location.
    pub fn note_write(&mut self, arena: &[ModelAction], loc: LocationId, w: ActRef) -> Vec<usize> {
        let mut touched = Vec::new();
        for (i, p) in self.pending.iter_mut().enumerate() {
            if p.location != loc {
                continue;
            }
            let act = &arena[w];
            if act.tid != arena[p.release].tid && !act.is_rmw() && !p.breakwrites.contains(&w) {
                p.breakwrites.push(w);
            }
            touched.push(i);
        }
        touched
    }

    pub fn get(&self, idx: usize) -> &PendingRelSeq {
        &self.pending[idx]
    }

    /// Drop the pending entries at `indices` (sorted ascending).
    pub fn remove_many(&mut self, mut indices: Vec<usize>) -> Vec<PendingRelSeq> {
        indices.sort_unstable();
        let mut out = Vec::with_capacity(indices.len());
        for i in indices.into_iter().rev() {
            out.push(self.pending.remove(i));
        }
        out
    }

    pub fn fate(&self, graph: &CycleGraph, idx: usize) -> RelSeqFate {
        let p = &self.pending[idx];
        let mut undecided = false;
        for &b in &p.breakwrites {
            let after_head = graph.check_reachable(GraphNode::Action(p.release), GraphNode::Action(b));
            let before_bottom = graph.check_reachable(GraphNode::Action(b), GraphNode::Action(p.bottom));
            if after_head && before_bottom {
                return RelSeqFate::Broken;
            }
            let outside = graph.check_reachable(GraphNode::Action(b), GraphNode::Action(p.release))
                || graph.check_reachable(GraphNode::Action(p.bottom), GraphNode::Action(b));
            if !outside {
                undecided = true;
            }
        }
        if undecided {
            RelSeqFate::Undecided
        } else {
            RelSeqFate::Established
        }
    }
}

/// Release fences recorded per thread; a relaxed write behaves as a
/// sequence head when a release fence of its thread precedes it in
/// program order.
#[derive(Debug, Default)]
pub struct ReleaseFences {
    per_thread: Vec<Vec<u64>>,
}

impl ReleaseFences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tid: ThreadId, seq: u64) {
        let idx = tid.index();
        if idx >= self.per_thread.len() {
            self.per_thread.resize_with(idx + 1, Vec::new);
        }
        self.per_thread[idx].push(seq);
    }

    pub fn fence_before(&self, tid: ThreadId, seq: u64) -> bool {
        self.per_thread
            .get(tid.index())
            .is_some_and(|v| v.first().is_some_and(|&f| f < seq))
    }

    pub fn heads_write(&self, act: &ModelAction) -> bool {
        act.is_release() || self.fence_before(act.tid, act.seq)
    }
}

/// Compute the certain release heads for a read observing `rf`, plus at
/// most one pending head whose same-thread extension is undecided. The
/// caller fills in the acquire.
pub fn release_seq_heads(
    arena: &[ModelAction],
    history: &ObjectHistory,
    graph: &CycleGraph,
    fences: &ReleaseFences,
    rf: ActRef,
) -> (HeadList, Option<PendingRelSeq>) {
    let mut heads = HeadList::new();
    let loc = arena[rf].location;

    // Walk down the RMW chain; every release element on the way heads a
    // sequence the read synchronizes with.
    let mut cur = rf;
    loop {
        if fences.heads_write(&arena[cur]) {
            heads.push(cur);
        }
        if !arena[cur].is_rmw() {
            break;
        }
        match arena[cur].reads_from {
            Some(prev) => cur = prev,
            // RMW justified by a promise: the chain below is unknown.
            None => return (heads, None),
        }
    }

    // Same-thread extension: an earlier release write by the bottom
    // write's thread heads a sequence containing the bottom unless some
    // other thread's write lands mo-between them.
    let bottom = cur;
    let t = arena[bottom].tid;
    let rel = history
        .actions_on_by(loc, t)
        .iter()
        .rev()
        .copied()
        .filter(|&a| arena[a].is_write() && arena[a].seq < arena[bottom].seq)
        .find(|&a| fences.heads_write(&arena[a]));
    let Some(rel) = rel else {
        return (heads, None);
    };

    let mut breakwrites = Vec::new();
    for &w in history.actions_on(loc) {
        let act = &arena[w];
        if !act.is_write() || act.tid == t || act.is_rmw() || w == rel || w == bottom {
            continue;
        }
        let after_head = graph.check_reachable(GraphNode::Action(rel), GraphNode::Action(w));
        let before_bottom = graph.check_reachable(GraphNode::Action(w), GraphNode::Action(bottom));
        if after_head && before_bottom {
            // Broken for certain.
            return (heads, None);
        }
        let outside = graph.check_reachable(GraphNode::Action(w), GraphNode::Action(rel))
            || graph.check_reachable(GraphNode::Action(bottom), GraphNode::Action(w));
        if !outside {
            breakwrites.push(w);
        }
    }

    if breakwrites.is_empty() {
        heads.push(rel);
        (heads, None)
    } else {
        let pending = PendingRelSeq {
            acquire: usize::MAX,
            rf,
            release: rel,
            bottom,
            location: loc,
            breakwrites,
        };
        (heads, Some(pending))
    }
}
