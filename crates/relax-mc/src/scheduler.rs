//! Thread selection.
//!
//! Deterministic by construction: outside a replay prefix the scheduler
//! always picks the lowest-id enabled thread that is not sleeping, so a
//! fixed exploration state reproduces a fixed schedule.

use relax_core::ThreadId;
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadState {
    Enabled,
    /// Blocked on a mutex, join, or condvar. Not selectable.
    Disabled,
    /// Enabled but proven redundant at the current node.
    Sleeping,
    Finished,
}

/// Picks the next thread to run; owns the per-thread run states and the
/// fairness counters.
#[derive(Debug)]
pub struct Scheduler {
    states: Vec<ThreadState>,
    current: Option<ThreadId>,
    fairwindow: u32,
    enabledcount: u32,
    /// Consecutive decisions in which the thread was enabled but not
    /// chosen. Reset when the thread runs or is disabled, and wholesale
    /// at each window boundary.
    streak: Vec<u32>,
    window_pos: u32,
}

impl Scheduler {
    pub fn new(fairwindow: u32, enabledcount: u32) -> Self {
        Self {
            states: Vec::new(),
            current: None,
            fairwindow,
            enabledcount,
            streak: Vec::new(),
            window_pos: 0,
        }
    }

    /// Register a thread. Model thread 0 starts finished; everything
    /// else starts enabled.
    pub fn add_thread(&mut self, tid: ThreadId) {
        let idx = tid.index();
        if idx >= self.states.len() {
            self.states.resize(idx + 1, ThreadState::Disabled);
            self.streak.resize(idx + 1, 0);
        }
        self.states[idx] = if tid == ThreadId::MODEL {
            ThreadState::Finished
        } else {
            ThreadState::Enabled
        };
    }

    pub fn state(&self, tid: ThreadId) -> ThreadState {
        self.states[tid.index()]
    }

    pub fn set_enabled(&mut self, tid: ThreadId) {
        self.states[tid.index()] = ThreadState::Enabled;
    }

    pub fn set_disabled(&mut self, tid: ThreadId) {
        self.states[tid.index()] = ThreadState::Disabled;
        self.streak[tid.index()] = 0;
    }

    pub fn set_finished(&mut self, tid: ThreadId) {
        self.states[tid.index()] = ThreadState::Finished;
        self.streak[tid.index()] = 0;
    }

    pub fn add_sleep(&mut self, tid: ThreadId) {
        if self.states[tid.index()] == ThreadState::Enabled {
            self.states[tid.index()] = ThreadState::Sleeping;
        }
    }

    pub fn remove_sleep(&mut self, tid: ThreadId) {
        if self.states[tid.index()] == ThreadState::Sleeping {
            self.states[tid.index()] = ThreadState::Enabled;
        }
    }

    /// Align sleep states with the engine's current sleep mask.
    pub fn sync_sleep(&mut self, mask: u64) {
        for i in 0..self.states.len() {
            let bit = 1u64 << i;
            match self.states[i] {
                ThreadState::Enabled if mask & bit != 0 => self.states[i] = ThreadState::Sleeping,
                ThreadState::Sleeping if mask & bit == 0 => self.states[i] = ThreadState::Enabled,
                _ => {}
            }
        }
    }

    pub fn sleep_set_empty(&self) -> bool {
        !self.states.contains(&ThreadState::Sleeping)
    }

    /// Enabled threads including sleeping ones (they are runnable, just
    /// redundant). This is what a node records as "enabled here".
    pub fn enabled_mask(&self) -> u64 {
        let mut mask = 0u64;
        for (i, s) in self.states.iter().enumerate() {
            if matches!(s, ThreadState::Enabled | ThreadState::Sleeping) {
                mask |= 1u64 << i;
            }
        }
        mask
    }

    pub fn has_runnable(&self) -> bool {
        self.states.contains(&ThreadState::Enabled)
    }

    pub fn has_runnable_sleeping(&self) -> bool {
        self.states.contains(&ThreadState::Sleeping)
    }

    pub fn disabled_threads(&self) -> Vec<ThreadId> {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == ThreadState::Disabled)
            .map(|(i, _)| ThreadId(i as u32))
            .collect()
    }

    /// Pick the next thread. A replay prefix forces the choice; otherwise
    /// the lowest-id enabled non-sleeping thread wins, unless fairness
    /// owes a long-starved thread its turn first.
    pub fn next_thread(&mut self, forced: Option<ThreadId>) -> Option<ThreadId> {
        let chosen = match forced {
            Some(t) => {
                debug_assert_ne!(self.states[t.index()], ThreadState::Disabled);
                debug_assert_ne!(self.states[t.index()], ThreadState::Finished);
                Some(t)
            }
            None => self.pick_fair().or_else(|| self.pick_lowest()),
        };
        let chosen = chosen?;
        self.note_decision(chosen);
        self.current = Some(chosen);
        trace!(tid = chosen.0, "scheduled");
        Some(chosen)
    }

    fn pick_lowest(&self) -> Option<ThreadId> {
        self.states
            .iter()
            .position(|s| *s == ThreadState::Enabled)
            .map(|i| ThreadId(i as u32))
    }

    fn pick_fair(&self) -> Option<ThreadId> {
        if self.fairwindow == 0 {
            return None;
        }
        self.states
            .iter()
            .enumerate()
            .position(|(i, s)| *s == ThreadState::Enabled && self.streak[i] >= self.enabledcount)
            .map(|i| ThreadId(i as u32))
    }

    fn note_decision(&mut self, chosen: ThreadId) {
        if self.fairwindow == 0 {
            return;
        }
        for (i, s) in self.states.iter().enumerate() {
            if *s == ThreadState::Enabled && i != chosen.index() {
                self.streak[i] += 1;
            }
        }
        self.streak[chosen.index()] = 0;
        self.window_pos += 1;
        if self.window_pos >= self.fairwindow {
            self.window_pos = 0;
            self.streak.fill(0);
        }
    }

    pub fn current(&self) -> Option<ThreadId> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(i: u32) -> ThreadId {
        ThreadId(i)
    }

    fn sched_with(n: u32) -> Scheduler {
        let mut s = Scheduler::new(0, 1);
        for i in 0..n {
            s.add_thread(t(i));
        }
        s
    }

    #[test]
    fn test_lowest_id_wins() {
        let mut s = sched_with(4);
        assert_eq!(s.next_thread(None), Some(t(1)));
        s.set_disabled(t(1));
        assert_eq!(s.next_thread(None), Some(t(2)));
    }

    #[test]
    fn test_forced_choice() {
        let mut s = sched_with(4);
        assert_eq!(s.next_thread(Some(t(3))), Some(t(3)));
    }

    #[test]
    fn test_sleeping_threads_skipped() {
        let mut s = sched_with(3);
        s.add_sleep(t(1));
        assert_eq!(s.next_thread(None), Some(t(2)));
        assert!(!s.sleep_set_empty());
        s.remove_sleep(t(1));
        assert_eq!(s.next_thread(None), Some(t(1)));
    }

    #[test]
    fn test_no_runnable() {
        let mut s = sched_with(2);
        s.set_disabled(t(1));
        assert_eq!(s.next_thread(None), None);
        assert_eq!(s.disabled_threads(), vec![t(1)]);
    }

    #[test]
    fn test_enabled_mask_includes_sleeping() {
        let mut s = sched_with(3);
        s.add_sleep(t(2));
        assert_eq!(s.enabled_mask(), t(1).bit() | t(2).bit());
    }

    #[test]
    fn test_fairness_forces_starved_thread() {
        let mut s = Scheduler::new(8, 2);
        for i in 0..3 {
            s.add_thread(t(i));
        }
        // Thread 1 wins twice on the lowest-id rule, building thread 2's
        // streak up to the threshold.
        assert_eq!(s.next_thread(None), Some(t(1)));
        assert_eq!(s.next_thread(None), Some(t(1)));
        assert_eq!(s.next_thread(None), Some(t(2)), "starved thread is owed a turn");
        assert_eq!(s.next_thread(None), Some(t(1)));
    }
}
