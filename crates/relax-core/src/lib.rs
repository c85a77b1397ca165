//! Data model for the relax model checker.

pub mod action;
pub mod clock;
pub mod cycles;
pub mod promise;

pub use action::{ActRef, ActionKind, LocationId, MemOrder, ModelAction, ThreadId};
pub use clock::ClockVector;
pub use cycles::{CycleGraph, GraphNode};
pub use promise::{Promise, PromiseId, PromiseSet};
