//! The user-fiber runtime.
//!
//! Fibers are OS threads driven lock-step through rendezvous channels:
//! at any moment exactly one fiber or the engine runs. A resume delivers
//! the previous action's result and blocks until the fiber submits its
//! next visible action (or finishes). On rollback every parked fiber is
//! torn down with an unwind payload caught at the fiber's root.

use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Once;
use std::thread::JoinHandle as OsJoinHandle;

use relax_core::{ActionKind, LocationId, MemOrder, ThreadId};
use relax_mc::{ActionSpec, Engine};
use tracing::trace;

pub(crate) type Entry = Box<dyn FnOnce() + Send + 'static>;

pub(crate) enum FiberMessage {
    Action {
        spec: ActionSpec,
        entry: Option<Entry>,
    },
    PlainAccess {
        location: LocationId,
        is_write: bool,
    },
    Record(u64),
    AssertFail(String),
    Panicked(String),
    Finished,
}

/// What a resume produced.
pub(crate) enum Resumed {
    Action {
        spec: ActionSpec,
        entry: Option<Entry>,
    },
    Finished,
    /// The fiber cannot continue (assertion failure or panic); the
    /// engine has been told and will end the execution.
    Stopped,
}

struct FiberContext {
    tid: ThreadId,
    msg_tx: Sender<FiberMessage>,
    resume_rx: Receiver<u64>,
    loc_counter: u64,
}

thread_local! {
    static CONTEXT: RefCell<Option<FiberContext>> = const { RefCell::new(None) };
}

/// Unwind payload for tearing a parked fiber down on rollback.
struct FiberAbort;

fn abort_fiber() -> ! {
    panic::panic_any(FiberAbort)
}

/// Suppress the default panic hook output for rollback teardowns.
pub(crate) fn install_abort_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let prev = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<FiberAbort>().is_none() {
                prev(info);
            }
        }));
    });
}

fn with_context<R>(f: impl FnOnce(&mut FiberContext) -> R) -> R {
    CONTEXT.with(|c| {
        let mut slot = c.borrow_mut();
        let ctx = slot
            .as_mut()
            .expect("relax primitives may only be used inside model()");
        f(ctx)
    })
}

fn roundtrip(msg: FiberMessage) -> u64 {
    with_context(|ctx| {
        if ctx.msg_tx.send(msg).is_err() {
            abort_fiber();
        }
        match ctx.resume_rx.recv() {
            Ok(v) => v,
            Err(_) => abort_fiber(),
        }
    })
}

/// Submit one visible action and park until the engine delivers its
/// result.
pub(crate) fn submit(spec: ActionSpec) -> u64 {
    roundtrip(FiberMessage::Action { spec, entry: None })
}

/// Submit a thread-create action carrying the child's entry closure.
/// Returns the child thread id.
pub(crate) fn submit_spawn(spec: ActionSpec, entry: Entry) -> u64 {
    roundtrip(FiberMessage::Action {
        spec,
        entry: Some(entry),
    })
}

pub(crate) fn plain_access(location: LocationId, is_write: bool) {
    roundtrip(FiberMessage::PlainAccess { location, is_write });
}

pub(crate) fn record(value: u64) {
    roundtrip(FiberMessage::Record(value));
}

pub(crate) fn assert_fail(msg: String) {
    roundtrip(FiberMessage::AssertFail(msg));
}

/// Mint a location id stable across replays: creating thread in the
/// high bits, per-thread creation counter in the low bits.
pub(crate) fn mint_location() -> LocationId {
    with_context(|ctx| {
        let id = ((ctx.tid.0 as u64) << 32) | ctx.loc_counter;
        ctx.loc_counter += 1;
        LocationId(id)
    })
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in program under test".to_string()
    }
}

fn fiber_main(tid: ThreadId, entry: Entry, msg_tx: Sender<FiberMessage>, resume_rx: Receiver<u64>) {
    let finish_tx = msg_tx.clone();
    CONTEXT.with(|c| {
        *c.borrow_mut() = Some(FiberContext {
            tid,
            msg_tx,
            resume_rx,
            loc_counter: 0,
        });
    });
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        // Initial go from the engine, then the start action.
        let ok = with_context(|ctx| ctx.resume_rx.recv().is_ok());
        if !ok {
            abort_fiber();
        }
        submit(ActionSpec {
            kind: ActionKind::ThreadStart,
            order: MemOrder::Relaxed,
            location: LocationId(0),
            value: 0,
        });
        entry();
    }));
    match result {
        Ok(()) => {
            let _ = finish_tx.send(FiberMessage::Finished);
        }
        Err(payload) => {
            if payload.downcast_ref::<FiberAbort>().is_none() {
                let _ = finish_tx.send(FiberMessage::Panicked(panic_message(payload)));
            }
        }
    }
    CONTEXT.with(|c| *c.borrow_mut() = None);
}

struct Fiber {
    resume_tx: Sender<u64>,
    msg_rx: Receiver<FiberMessage>,
    join: Option<OsJoinHandle<()>>,
}

/// The set of live fibers for one execution.
pub(crate) struct FiberSet {
    fibers: HashMap<u32, Fiber>,
}

impl FiberSet {
    pub(crate) fn new() -> Self {
        Self {
            fibers: HashMap::new(),
        }
    }

    pub(crate) fn create(&mut self, tid: ThreadId, entry: Entry) {
        let (resume_tx, resume_rx) = channel();
        let (msg_tx, msg_rx) = channel();
        let join = std::thread::Builder::new()
            .name(format!("relax-fiber-{}", tid.0))
            .spawn(move || fiber_main(tid, entry, msg_tx, resume_rx))
            .expect("failed to spawn fiber thread");
        trace!(tid = tid.0, "fiber created");
        self.fibers.insert(
            tid.0,
            Fiber {
                resume_tx,
                msg_rx,
                join: Some(join),
            },
        );
    }

    /// Run the fiber until its next visible action. Non-action traffic
    /// (plain accesses, recordings, assertion failures) is serviced
    /// inline against the engine.
    pub(crate) fn resume(&mut self, tid: ThreadId, value: u64, engine: &mut Engine) -> Resumed {
        let fiber = self.fibers.get(&tid.0).expect("resume of unknown fiber");
        if fiber.resume_tx.send(value).is_err() {
            // The fiber died without a finish or panic message.
            engine.user_fatal(tid, "fiber exited without finishing".to_string());
            return Resumed::Stopped;
        }
        loop {
            match fiber.msg_rx.recv() {
                Ok(FiberMessage::Action { spec, entry }) => {
                    return Resumed::Action { spec, entry };
                }
                Ok(FiberMessage::PlainAccess { location, is_write }) => {
                    engine.plain_access(tid, location, is_write);
                    if fiber.resume_tx.send(0).is_err() {
                        return Resumed::Stopped;
                    }
                }
                Ok(FiberMessage::Record(v)) => {
                    engine.record_value(v);
                    if fiber.resume_tx.send(0).is_err() {
                        return Resumed::Stopped;
                    }
                }
                Ok(FiberMessage::AssertFail(msg)) => {
                    engine.assert_failed(tid, msg);
                    return Resumed::Stopped;
                }
                Ok(FiberMessage::Panicked(msg)) => {
                    engine.user_fatal(tid, msg);
                    return Resumed::Stopped;
                }
                Ok(FiberMessage::Finished) => return Resumed::Finished,
                Err(_) => {
                    engine.user_fatal(tid, "fiber exited without finishing".to_string());
                    return Resumed::Stopped;
                }
            }
        }
    }

    /// Unblock and reap every fiber. Parked fibers unwind via the abort
    /// payload when their resume channel drops.
    pub(crate) fn destroy_all(&mut self) {
        for (_, mut fiber) in self.fibers.drain() {
            drop(fiber.resume_tx);
            drop(fiber.msg_rx);
            if let Some(join) = fiber.join.take() {
                let _ = join.join();
            }
        }
    }
}

impl Drop for FiberSet {
    fn drop(&mut self) {
        self.destroy_all();
    }
}
