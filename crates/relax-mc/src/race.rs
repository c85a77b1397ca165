//! Data-race detection for plain (non-atomic) accesses.
//!
//! Plain accesses are not scheduling points and never appear in the
//! trace; they are checked against shadow clocks. Two accesses to the
//! same location race when they come from different threads, at least
//! one writes, and neither happens before the other.

use ahash::AHashMap;
use relax_core::{ClockVector, LocationId, ThreadId};

#[derive(Debug, Default)]
struct Shadow {
    /// Slot `t` holds the timestamp of thread `t`'s last plain write.
    writes: ClockVector,
    /// Slot `t` holds the timestamp of thread `t`'s last plain read.
    reads: ClockVector,
}

/// Shadow clocks per plain location.
#[derive(Debug, Default)]
pub struct RaceDetector {
    shadows: AHashMap<LocationId, Shadow>,
}

impl RaceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check and record one plain access by `tid` whose happens-before
    /// knowledge is `cv`. Returns the racing thread, if any.
    pub fn on_access(
        &mut self,
        loc: LocationId,
        tid: ThreadId,
        cv: &ClockVector,
        now: u64,
        is_write: bool,
    ) -> Option<ThreadId> {
        let shadow = self.shadows.entry(loc).or_default();

        let mut race = None;
        let slots = shadow.writes.num_threads().max(shadow.reads.num_threads());
        for i in 0..slots {
            let other = ThreadId(i as u32);
            if other == tid {
                continue;
            }
            let w = shadow.writes.get(other);
            if w > 0 && !cv.synchronized_since(other, w) {
                race = Some(other);
                break;
            }
            if is_write {
                let r = shadow.reads.get(other);
                if r > 0 && !cv.synchronized_since(other, r) {
                    race = Some(other);
                    break;
                }
            }
        }

        if is_write {
            shadow.writes.set(tid, now);
        } else {
            shadow.reads.set(tid, now);
        }
        race
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(i: u32) -> ThreadId {
        ThreadId(i)
    }

    #[test]
    fn test_unordered_write_write_races() {
        let mut d = RaceDetector::new();
        let loc = LocationId(1);
        let cv1 = ClockVector::inherit(&ClockVector::new(), t(1), 1);
        let cv2 = ClockVector::inherit(&ClockVector::new(), t(2), 2);
        assert_eq!(d.on_access(loc, t(1), &cv1, 1, true), None);
        assert_eq!(d.on_access(loc, t(2), &cv2, 2, true), Some(t(1)));
    }

    #[test]
    fn test_ordered_accesses_do_not_race() {
        let mut d = RaceDetector::new();
        let loc = LocationId(1);
        let cv1 = ClockVector::inherit(&ClockVector::new(), t(1), 1);
        assert_eq!(d.on_access(loc, t(1), &cv1, 1, true), None);
        // Thread 2 synchronized with thread 1 past the write.
        let mut cv2 = cv1.clone();
        cv2.set(t(2), 2);
        assert_eq!(d.on_access(loc, t(2), &cv2, 2, true), None);
    }

    #[test]
    fn test_read_read_never_races() {
        let mut d = RaceDetector::new();
        let loc = LocationId(1);
        let cv1 = ClockVector::inherit(&ClockVector::new(), t(1), 1);
        let cv2 = ClockVector::inherit(&ClockVector::new(), t(2), 2);
        assert_eq!(d.on_access(loc, t(1), &cv1, 1, false), None);
        assert_eq!(d.on_access(loc, t(2), &cv2, 2, false), None);
    }

    #[test]
    fn test_read_then_unordered_write_races() {
        let mut d = RaceDetector::new();
        let loc = LocationId(1);
        let cv1 = ClockVector::inherit(&ClockVector::new(), t(1), 1);
        let cv2 = ClockVector::inherit(&ClockVector::new(), t(2), 2);
        assert_eq!(d.on_access(loc, t(1), &cv1, 1, false), None);
        assert_eq!(d.on_access(loc, t(2), &cv2, 2, true), Some(t(1)));
    }
}
