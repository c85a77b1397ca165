//! Bugs found in the program under test.

use relax_core::{LocationId, ThreadId};
use thiserror::Error;

/// A bug in the program under test. Bugs are soft: the execution that
/// exposed one is reported and exploration continues.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Bug {
    #[error("data race on location {location} between threads {first} and {second}")]
    DataRace {
        location: LocationId,
        first: ThreadId,
        second: ThreadId,
    },

    #[error("thread {tid}: assertion failed: {msg}")]
    UserAssert { tid: ThreadId, msg: String },

    #[error("thread {tid}: {msg}")]
    UserFatal { tid: ThreadId, msg: String },

    #[error("deadlock: threads {blocked:?} blocked, none enabled")]
    Deadlock { blocked: Vec<ThreadId> },

    #[error("thread {tid}: load from uninitialized atomic location {location}")]
    UninitLoad { tid: ThreadId, location: LocationId },
}
