//! Test API for the relax model checker.
//!
//! Programs under test look like ordinary concurrent Rust: they spawn
//! threads, touch [`Atomic`] and [`Shared`] locations, and take
//! [`Mutex`]es. [`model`] runs the closure under the exploration engine
//! until every memory-model-permitted execution has been examined or a
//! bug is found.
//!
//! ```no_run
//! use relax_rt::{model, spawn, Atomic, MemOrder, Params};
//! use std::sync::Arc;
//!
//! let summary = model(Params::default(), || {
//!     let x = Arc::new(Atomic::new(0));
//!     let x2 = x.clone();
//!     let t = spawn(move || {
//!         x2.store(1, MemOrder::Release);
//!     });
//!     t.join();
//!     assert_eq!(x.load(MemOrder::Acquire), 1);
//! });
//! assert!(!summary.found_bugs());
//! ```

pub mod atomic;
mod fiber;
pub mod mutex;
pub mod shared;
pub mod thread;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use relax_mc::{Engine, Step};
use tracing::debug;

pub use atomic::{fence, Atomic};
pub use mutex::{Condvar, Mutex, MutexGuard};
pub use relax_core::MemOrder;
pub use relax_mc::{Bug, CheckSummary, Params, Stats};
pub use shared::Shared;
pub use thread::{spawn, yield_now, JoinHandle};

use fiber::{FiberSet, Resumed};

/// Check a closed program against the relaxed memory model. The closure
/// is re-run from scratch for every explored execution, so it must be
/// `Fn`; all state it creates is per-execution by construction.
pub fn model<F>(params: Params, program: F) -> CheckSummary
where
    F: Fn() + Send + Sync + 'static,
{
    fiber::install_abort_hook();
    let program = Arc::new(program);
    let mut engine = Engine::new(params);
    loop {
        engine.begin_execution();
        let mut fibers = FiberSet::new();
        let mut entries: HashMap<u32, VecDeque<fiber::Entry>> = HashMap::new();
        let p = program.clone();
        fibers.create(engine.main_thread(), Box::new(move || p()));

        loop {
            // Threads created from stashed actions get their fibers
            // before anything else runs.
            for (parent, child) in engine.take_created() {
                let entry = entries
                    .get_mut(&parent.0)
                    .and_then(VecDeque::pop_front)
                    .expect("thread created without a pending entry");
                fibers.create(child, entry);
            }
            match engine.next_step() {
                Step::Resume(tid) => {
                    let value = engine.resume_value(tid);
                    match fibers.resume(tid, value, &mut engine) {
                        Resumed::Action { spec, entry } => {
                            if let Some(entry) = entry {
                                entries.entry(tid.0).or_default().push_back(entry);
                            }
                            let _ = engine.submit(tid, spec);
                        }
                        Resumed::Finished => engine.thread_finished(tid),
                        Resumed::Stopped => {}
                    }
                }
                Step::Spawned => {}
                Step::ExecutionDone => break,
            }
        }
        engine.end_execution();
        fibers.destroy_all();
        if !engine.next_execution() {
            break;
        }
    }
    let summary = engine.into_summary();
    debug!(stats = %summary.stats, bugs = summary.bugs.len(), "model run finished");
    summary
}

/// Assert a property of the program under test. A failure is reported
/// as a bug for the current execution; exploration continues.
pub fn model_assert(cond: bool, msg: &str) {
    if !cond {
        fiber::assert_fail(msg.to_string());
    }
}

/// Record an observation; feasible complete executions surface their
/// recordings in [`CheckSummary::outcomes`].
pub fn record(value: u64) {
    fiber::record(value);
}
