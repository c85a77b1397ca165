//! Promises: speculative future-value reads awaiting a justifying write.

use crate::action::{ActRef, LocationId, ThreadId};
use crate::clock::ClockVector;

pub type PromiseId = u64;

/// A deferred obligation: some future write must supply `value` at
/// `location` before `expiration` sequence numbers have elapsed, and it
/// must come from one of the `eligible` threads.
#[derive(Clone, Debug)]
pub struct Promise {
    pub id: PromiseId,
    pub reader: ActRef,
    pub reader_tid: ThreadId,
    pub location: LocationId,
    pub value: u64,
    /// Sequence number past which the promise counts as expired.
    pub expiration: u64,
    /// Mask of threads that may still produce the justifying write.
    pub eligible: u64,
    /// Lower bound on the justification window, narrowed as observers
    /// of the speculative value accumulate.
    pub window: ClockVector,
}

impl Promise {
    /// Could `write_tid` writing `value` at `location` satisfy this
    /// promise? Placement consistency is the caller's (graph) problem.
    pub fn can_be_satisfied_by(&self, write_tid: ThreadId, location: LocationId, value: u64) -> bool {
        self.location == location
            && self.value == value
            && self.eligible & write_tid.bit() != 0
    }

    pub fn has_expired(&self, current_seq: u64) -> bool {
        current_seq > self.expiration
    }
}

/// The set of unresolved promises in the current execution.
#[derive(Debug, Default)]
pub struct PromiseSet {
    promises: Vec<Promise>,
    next_id: PromiseId,
}

impl PromiseSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        reader: ActRef,
        reader_tid: ThreadId,
        location: LocationId,
        value: u64,
        expiration: u64,
        eligible: u64,
        window: ClockVector,
    ) -> PromiseId {
        let id = self.next_id;
        self.next_id += 1;
        self.promises.push(Promise {
            id,
            reader,
            reader_tid,
            location,
            value,
            expiration,
            eligible,
            window,
        });
        id
    }

    pub fn is_empty(&self) -> bool {
        self.promises.is_empty()
    }

    pub fn len(&self) -> usize {
        self.promises.len()
    }

    pub fn get(&self, id: PromiseId) -> Option<&Promise> {
        self.promises.iter().find(|p| p.id == id)
    }

    /// Promises a write by `tid` of `value` at `location` may satisfy.
    pub fn candidates_for(
        &self,
        tid: ThreadId,
        location: LocationId,
        value: u64,
    ) -> Vec<PromiseId> {
        self.promises
            .iter()
            .filter(|p| p.reader_tid != tid && p.can_be_satisfied_by(tid, location, value))
            .map(|p| p.id)
            .collect()
    }

    pub fn remove(&mut self, id: PromiseId) -> Option<Promise> {
        let i = self.promises.iter().position(|p| p.id == id)?;
        Some(self.promises.remove(i))
    }

    /// True iff any live promise has passed its expiration point. An
    /// expired promise can no longer be satisfied and makes the
    /// execution infeasible.
    pub fn any_expired(&self, current_seq: u64) -> bool {
        self.promises.iter().any(|p| p.has_expired(current_seq))
    }

    /// A finished thread can no longer justify anything. Returns true if
    /// some promise lost its last eligible thread.
    pub fn thread_finished(&mut self, tid: ThreadId) -> bool {
        let mut starved = false;
        for p in &mut self.promises {
            p.eligible &= !tid.bit();
            if p.eligible == 0 {
                starved = true;
            }
        }
        starved
    }

    /// Narrow the justification window of every promise at `location`
    /// by an observer's clock.
    pub fn narrow_windows(&mut self, location: LocationId, observer: &ClockVector) {
        for p in &mut self.promises {
            if p.location == location {
                p.window.minmerge(observer);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Promise> {
        self.promises.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_basic(set: &mut PromiseSet, value: u64, expiration: u64, eligible: u64) -> PromiseId {
        set.add(
            3,
            ThreadId(1),
            LocationId(10),
            value,
            expiration,
            eligible,
            ClockVector::new(),
        )
    }

    #[test]
    fn test_candidates_match_location_value_and_thread() {
        let mut set = PromiseSet::new();
        let id = add_basic(&mut set, 42, 100, ThreadId(2).bit() | ThreadId(3).bit());

        assert_eq!(set.candidates_for(ThreadId(2), LocationId(10), 42), vec![id]);
        assert!(set.candidates_for(ThreadId(2), LocationId(11), 42).is_empty());
        assert!(set.candidates_for(ThreadId(2), LocationId(10), 41).is_empty());
        // The reader itself cannot justify its own speculation.
        assert!(set.candidates_for(ThreadId(1), LocationId(10), 42).is_empty());
        // Nor can a thread outside the eligible mask.
        assert!(set.candidates_for(ThreadId(4), LocationId(10), 42).is_empty());
    }

    #[test]
    fn test_expiration() {
        let mut set = PromiseSet::new();
        add_basic(&mut set, 1, 20, ThreadId(2).bit());
        assert!(!set.any_expired(20));
        assert!(set.any_expired(21));
    }

    #[test]
    fn test_thread_finished_starves() {
        let mut set = PromiseSet::new();
        add_basic(&mut set, 1, 100, ThreadId(2).bit());
        assert!(!set.thread_finished(ThreadId(3)));
        assert!(set.thread_finished(ThreadId(2)));
    }

    #[test]
    fn test_remove() {
        let mut set = PromiseSet::new();
        let id = add_basic(&mut set, 1, 100, ThreadId(2).bit());
        assert!(set.remove(id).is_some());
        assert!(set.remove(id).is_none());
        assert!(set.is_empty());
    }
}
