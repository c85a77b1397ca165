//! Per-object action histories.
//!
//! Every map here is keyed by location and rebuilt from scratch each
//! execution; it all lives inside the snapshot boundary.

use ahash::{AHashMap, AHashSet};
use relax_core::{ActRef, ActionKind, LocationId, ModelAction, ThreadId};

/// Ordered histories of the actions touching each memory location.
#[derive(Debug, Default)]
pub struct ObjectHistory {
    /// All actions per location, in sequence order.
    obj_map: AHashMap<LocationId, Vec<ActRef>>,
    /// The same, split by thread: `obj_thrd_map[loc][tid]`.
    obj_thrd_map: AHashMap<LocationId, Vec<Vec<ActRef>>>,
    /// Threads parked on a mutex, in arrival order.
    lock_waiters: AHashMap<LocationId, Vec<ThreadId>>,
    /// Threads parked on a condition variable, in arrival order.
    condvar_waiters: AHashMap<LocationId, Vec<ThreadId>>,
    /// Last seq_cst write per location.
    last_sc_write: AHashMap<LocationId, ActRef>,
    /// Last unlock per mutex.
    last_unlock: AHashMap<LocationId, ActRef>,
    /// Locations that carry an AtomicInit.
    initialized: AHashSet<LocationId>,
}

impl ObjectHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `act` (already in the arena at `r`).
    pub fn add(&mut self, act: &ModelAction, r: ActRef) {
        self.obj_map.entry(act.location).or_default().push(r);
        let per_thread = self.obj_thrd_map.entry(act.location).or_default();
        let idx = act.tid.index();
        if idx >= per_thread.len() {
            per_thread.resize_with(idx + 1, Vec::new);
        }
        per_thread[idx].push(r);

        match act.kind {
            ActionKind::AtomicInit => {
                self.initialized.insert(act.location);
                if act.is_seqcst() {
                    self.last_sc_write.insert(act.location, r);
                }
            }
            ActionKind::AtomicWrite | ActionKind::AtomicRmw => {
                if act.is_seqcst() {
                    self.last_sc_write.insert(act.location, r);
                }
            }
            ActionKind::MutexUnlock => {
                self.last_unlock.insert(act.location, r);
            }
            _ => {}
        }
    }

    /// All actions on `loc`, oldest first.
    pub fn actions_on(&self, loc: LocationId) -> &[ActRef] {
        self.obj_map.get(&loc).map_or(&[], Vec::as_slice)
    }

    /// Actions on `loc` by `tid`, oldest first.
    pub fn actions_on_by(&self, loc: LocationId, tid: ThreadId) -> &[ActRef] {
        self.obj_thrd_map
            .get(&loc)
            .and_then(|v| v.get(tid.index()))
            .map_or(&[], Vec::as_slice)
    }

    /// Thread lists for `loc`, indexed by thread id.
    pub fn per_thread(&self, loc: LocationId) -> &[Vec<ActRef>] {
        self.obj_thrd_map.get(&loc).map_or(&[], Vec::as_slice)
    }

    pub fn is_initialized(&self, loc: LocationId) -> bool {
        self.initialized.contains(&loc)
    }

    pub fn last_sc_write(&self, loc: LocationId) -> Option<ActRef> {
        self.last_sc_write.get(&loc).copied()
    }

    pub fn last_unlock(&self, loc: LocationId) -> Option<ActRef> {
        self.last_unlock.get(&loc).copied()
    }

    pub fn push_lock_waiter(&mut self, loc: LocationId, tid: ThreadId) {
        self.lock_waiters.entry(loc).or_default().push(tid);
    }

    /// Wake at most one lock waiter, lowest thread id first.
    pub fn pop_lock_waiter(&mut self, loc: LocationId) -> Option<ThreadId> {
        let q = self.lock_waiters.get_mut(&loc)?;
        if q.is_empty() {
            return None;
        }
        let i = q
            .iter()
            .enumerate()
            .min_by_key(|(_, t)| **t)
            .map(|(i, _)| i)?;
        Some(q.remove(i))
    }

    pub fn push_condvar_waiter(&mut self, loc: LocationId, tid: ThreadId) {
        self.condvar_waiters.entry(loc).or_default().push(tid);
    }

    /// Wake one condvar waiter, lowest thread id first.
    pub fn pop_condvar_waiter(&mut self, loc: LocationId) -> Option<ThreadId> {
        let q = self.condvar_waiters.get_mut(&loc)?;
        if q.is_empty() {
            return None;
        }
        let i = q
            .iter()
            .enumerate()
            .min_by_key(|(_, t)| **t)
            .map(|(i, _)| i)?;
        Some(q.remove(i))
    }

    pub fn drain_condvar_waiters(&mut self, loc: LocationId) -> Vec<ThreadId> {
        self.condvar_waiters.remove(&loc).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relax_core::{MemOrder, ModelAction};

    fn act(seq: u64, tid: u32, kind: ActionKind, loc: u64) -> ModelAction {
        ModelAction::new(
            seq,
            ThreadId(tid),
            kind,
            MemOrder::SeqCst,
            LocationId(loc),
            0,
        )
    }

    #[test]
    fn test_add_and_lookup() {
        let mut h = ObjectHistory::new();
        h.add(&act(1, 1, ActionKind::AtomicInit, 5), 0);
        h.add(&act(2, 2, ActionKind::AtomicWrite, 5), 1);
        h.add(&act(3, 1, ActionKind::AtomicRead, 5), 2);

        assert_eq!(h.actions_on(LocationId(5)), &[0, 1, 2]);
        assert_eq!(h.actions_on_by(LocationId(5), ThreadId(1)), &[0, 2]);
        assert_eq!(h.actions_on_by(LocationId(5), ThreadId(2)), &[1]);
        assert!(h.is_initialized(LocationId(5)));
        assert!(!h.is_initialized(LocationId(6)));
        assert_eq!(h.last_sc_write(LocationId(5)), Some(1));
    }

    #[test]
    fn test_waiters_lowest_tid_first() {
        let mut h = ObjectHistory::new();
        let m = LocationId(9);
        h.push_lock_waiter(m, ThreadId(4));
        h.push_lock_waiter(m, ThreadId(2));
        assert_eq!(h.pop_lock_waiter(m), Some(ThreadId(2)));
        assert_eq!(h.pop_lock_waiter(m), Some(ThreadId(4)));
        assert_eq!(h.pop_lock_waiter(m), None);
    }
}
