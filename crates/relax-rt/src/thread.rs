//! Thread management under the checker.

use relax_core::{ActionKind, LocationId, MemOrder, ThreadId};
use relax_mc::ActionSpec;

use crate::fiber;

/// Spawn a model thread. The closure runs as a fiber under the engine's
/// schedule.
pub fn spawn<F>(f: F) -> JoinHandle
where
    F: FnOnce() + Send + 'static,
{
    let child = fiber::submit_spawn(
        ActionSpec {
            kind: ActionKind::ThreadCreate,
            order: MemOrder::Relaxed,
            location: LocationId(0),
            value: 0,
        },
        Box::new(f),
    );
    JoinHandle {
        tid: ThreadId(child as u32),
    }
}

/// Handle for joining a spawned model thread.
#[derive(Debug)]
pub struct JoinHandle {
    tid: ThreadId,
}

impl JoinHandle {
    /// Block until the thread finishes. Joining synchronizes with the
    /// thread's finish.
    pub fn join(self) {
        fiber::submit(ActionSpec {
            kind: ActionKind::ThreadJoin,
            order: MemOrder::Relaxed,
            location: LocationId(0),
            value: self.tid.0 as u64,
        });
    }
}

/// Give the scheduler a decision point without touching memory.
pub fn yield_now() {
    fiber::submit(ActionSpec {
        kind: ActionKind::ThreadYield,
        order: MemOrder::Relaxed,
        location: LocationId(0),
        value: 0,
    });
}
