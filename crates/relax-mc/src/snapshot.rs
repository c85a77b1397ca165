//! The snapshot boundary.
//!
//! Rollback here is replay-based: per-execution state (arena, histories,
//! mo graph, promises, scheduler) is dropped wholesale and rebuilt by
//! re-running the program under the node stack's forced choices. This
//! component keeps the bookkeeping that decides where to rewind and what
//! the earliest divergence between executions was. The node stack,
//! statistics, and parameters live outside the boundary.

use tracing::debug;

#[derive(Debug, Default)]
pub struct SnapshotBoundary {
    /// Sequence number captured when each node depth was first reached
    /// in the current execution.
    checkpoints: Vec<u64>,
    /// Shallowest node depth any rewind has targeted so far.
    earliest_diverge: Option<usize>,
}

impl SnapshotBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_execution(&mut self) {
        self.checkpoints.clear();
    }

    /// Capture a checkpoint for the node at `depth`.
    pub fn checkpoint(&mut self, depth: usize, seq: u64) {
        if depth >= self.checkpoints.len() {
            self.checkpoints.resize(depth + 1, 0);
        }
        self.checkpoints[depth] = seq;
    }

    /// Rewind to the checkpoint of the node at `depth`. Returns the
    /// sequence number the replay prefix runs up to.
    pub fn rewind_to(&mut self, depth: usize) -> u64 {
        let seq = self.checkpoints.get(depth).copied().unwrap_or(0);
        self.earliest_diverge = Some(match self.earliest_diverge {
            Some(d) => d.min(depth),
            None => depth,
        });
        self.checkpoints.truncate(depth + 1);
        debug!(depth, seq, "rewinding to checkpoint");
        seq
    }

    pub fn earliest_diverge(&self) -> Option<usize> {
        self.earliest_diverge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewind_tracks_earliest_divergence() {
        let mut s = SnapshotBoundary::new();
        s.checkpoint(0, 1);
        s.checkpoint(1, 2);
        s.checkpoint(2, 3);
        assert_eq!(s.rewind_to(2), 3);
        assert_eq!(s.earliest_diverge(), Some(2));
        assert_eq!(s.rewind_to(1), 2);
        assert_eq!(s.earliest_diverge(), Some(1));
        assert_eq!(s.rewind_to(2), 0, "deeper checkpoint was truncated");
        assert_eq!(s.earliest_diverge(), Some(1));
    }
}
