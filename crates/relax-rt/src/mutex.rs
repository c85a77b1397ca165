//! Mutexes and condition variables under the checker.

use relax_core::{ActionKind, LocationId, MemOrder};
use relax_mc::ActionSpec;

use crate::fiber;

fn spec(kind: ActionKind, order: MemOrder, location: LocationId, value: u64) -> ActionSpec {
    ActionSpec {
        kind,
        order,
        location,
        value,
    }
}

/// A mutex. Locking blocks the model thread (the scheduler simply stops
/// picking it) until the owner unlocks; lock acquisition synchronizes
/// with the previous unlock.
#[derive(Debug)]
pub struct Mutex {
    loc: LocationId,
}

impl Mutex {
    pub fn new() -> Self {
        Self {
            loc: fiber::mint_location(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_> {
        fiber::submit(spec(ActionKind::MutexLock, MemOrder::Acquire, self.loc, 0));
        MutexGuard { mutex: self }
    }

    /// Never blocks; both outcomes are covered by exploring the
    /// conflicting lock orders.
    pub fn try_lock(&self) -> Option<MutexGuard<'_>> {
        let got = fiber::submit(spec(ActionKind::MutexTrylock, MemOrder::Acquire, self.loc, 0));
        (got == 1).then_some(MutexGuard { mutex: self })
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the mutex; unlocks on drop.
#[derive(Debug)]
pub struct MutexGuard<'a> {
    mutex: &'a Mutex,
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        // Skip the unlock when the fiber is being torn down on rollback.
        if !std::thread::panicking() {
            fiber::submit(spec(
                ActionKind::MutexUnlock,
                MemOrder::Release,
                self.mutex.loc,
                0,
            ));
        }
    }
}

/// A condition variable. Spurious wakeups are not modeled.
#[derive(Debug)]
pub struct Condvar {
    loc: LocationId,
}

impl Condvar {
    pub fn new() -> Self {
        Self {
            loc: fiber::mint_location(),
        }
    }

    /// Release the guard's mutex, park until notified, then re-acquire.
    pub fn wait(&self, guard: &MutexGuard<'_>) {
        fiber::submit(spec(
            ActionKind::CondWait,
            MemOrder::Relaxed,
            self.loc,
            guard.mutex.loc.0,
        ));
        fiber::submit(spec(
            ActionKind::MutexLock,
            MemOrder::Acquire,
            guard.mutex.loc,
            0,
        ));
    }

    /// Wake one waiter (lowest thread id, for determinism).
    pub fn notify_one(&self) {
        fiber::submit(spec(ActionKind::NotifyOne, MemOrder::Relaxed, self.loc, 0));
    }

    pub fn notify_all(&self) {
        fiber::submit(spec(ActionKind::NotifyAll, MemOrder::Relaxed, self.loc, 0));
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}
