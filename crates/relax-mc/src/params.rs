//! Run-time configuration for the checker.

/// Exploration parameters. All limits use sequence-number deltas, never
/// wall time.
#[derive(Clone, Debug)]
pub struct Params {
    /// Max consecutive stale-read selections before the execution is
    /// marked infeasible (0 = unlimited).
    pub maxreads: u32,
    /// Promise expiration horizon in sequence numbers.
    pub maxfuturedelay: u64,
    /// Cap on distinct future values sent to one read (0 disables
    /// future-value speculation entirely).
    pub maxfuturevalues: u32,
    /// Only record a new future value if its expiration exceeds an
    /// existing same-value entry by more than this slop.
    pub expireslop: u64,
    /// Window size used to throttle starvation of enabled threads
    /// (0 = fairness off).
    pub fairwindow: u32,
    /// Fairness threshold: force scheduling of a thread enabled but
    /// unchosen this many times inside the window.
    pub enabledcount: u32,
    /// Maximum sequence number per execution (0 = unlimited).
    pub bound: u64,
    /// Report level: 0 silent, 1 counts, 2 full trace.
    pub verbose: u8,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            maxreads: 0,
            maxfuturedelay: 100,
            maxfuturevalues: 2,
            expireslop: 4,
            fairwindow: 0,
            enabledcount: 1,
            bound: 0,
            verbose: 0,
        }
    }
}
