//! Atomic locations under the checker.

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

/// A 64-bit atomic location. Every operation is one visible action; the
/// engine decides what loads observe.
#[derive(Debug)]
pub struct Atomic {
    loc: LocationId,
}

impl Atomic {
    /// Create and initialize the location. Must be called inside the
    /// program under test.
    pub fn new(initial: u64) -> Self {
        let loc = fiber::mint_location();
        fiber::submit(spec(ActionKind::AtomicInit, MemOrder::Relaxed, loc, initial));
        Self { loc }
    }

    pub fn load(&self, order: MemOrder) -> u64 {
        fiber::submit(spec(ActionKind::AtomicRead, order, self.loc, 0))
    }

    pub fn store(&self, value: u64, order: MemOrder) {
        fiber::submit(spec(ActionKind::AtomicWrite, order, self.loc, value));
    }

    pub fn swap(&self, value: u64, order: MemOrder) -> u64 {
        let old = fiber::submit(spec(ActionKind::AtomicRmwR, order, self.loc, 0));
        fiber::submit(spec(ActionKind::AtomicRmw, order, self.loc, value));
        old
    }

    pub fn fetch_add(&self, value: u64, order: MemOrder) -> u64 {
        let old = fiber::submit(spec(ActionKind::AtomicRmwR, order, self.loc, 0));
        fiber::submit(spec(ActionKind::AtomicRmw, order, self.loc, old.wrapping_add(value)));
        old
    }

    pub fn fetch_sub(&self, value: u64, order: MemOrder) -> u64 {
        let old = fiber::submit(spec(ActionKind::AtomicRmwR, order, self.loc, 0));
        fiber::submit(spec(ActionKind::AtomicRmw, order, self.loc, old.wrapping_sub(value)));
        old
    }

    /// Compare-exchange. The failure path is a cancelled RMW: the read
    /// half stands, the write half never happens.
    pub fn compare_exchange(
        &self,
        expected: u64,
        new: u64,
        success: MemOrder,
        failure: MemOrder,
    ) -> Result<u64, u64> {
        let old = fiber::submit(spec(ActionKind::AtomicRmwR, success, self.loc, 0));
        if old == expected {
            fiber::submit(spec(ActionKind::AtomicRmw, success, self.loc, new));
            Ok(old)
        } else {
            fiber::submit(spec(ActionKind::AtomicRmwc, failure, self.loc, 0));
            Err(old)
        }
    }
}

/// A memory fence.
pub fn fence(order: MemOrder) {
    fiber::submit(spec(ActionKind::Fence, order, LocationId(0), 0));
}
