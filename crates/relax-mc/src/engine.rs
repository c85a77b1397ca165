//! The execution exploration engine.
//!
//! One `Engine` drives many executions of the program under test. Per
//! execution it cooperatively schedules user fibers, receives one visible
//! action per resume, decides what every read may observe, maintains the
//! modification-order graph and release sequences, and records
//! backtracking alternatives on the node stack. Between executions it
//! rewinds to the deepest unexplored backtrack point and replays the
//! prefix with forced choices.
//!
//! Everything in `ExecState` is inside the snapshot boundary and is
//! rebuilt by replay; the node stack, statistics, and parameters
//! persist.

use ahash::{AHashMap, AHashSet};
use relax_core::{
    ActRef, ActionKind, ClockVector, CycleGraph, GraphNode, LocationId, MemOrder, ModelAction,
    PromiseSet, ThreadId,
};
use tracing::{debug, info, trace};

use crate::bug::Bug;
use crate::history::ObjectHistory;
use crate::node::{NodeStack, ReadChoice};
use crate::params::Params;
use crate::race::RaceDetector;
use crate::relseq::{release_seq_heads, RelSeqFate, RelSeqTracker, ReleaseFences};
use crate::scheduler::{Scheduler, ThreadState};
use crate::snapshot::SnapshotBoundary;
use crate::stats::{ExecutionClass, Stats};

/// Thread sets are u64 masks; thread creation is bounded.
pub const MAX_THREADS: usize = 64;

/// What the engine wants next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Resume this fiber; it will submit exactly one action or finish.
    Resume(ThreadId),
    /// A stashed thread-create executed; collect the new thread via
    /// `take_created` before continuing.
    Spawned,
    /// No thread can run; classify and move to the next execution.
    ExecutionDone,
}

/// One visible operation as submitted by a fiber.
#[derive(Clone, Debug)]
pub struct ActionSpec {
    pub kind: ActionKind,
    pub order: MemOrder,
    pub location: LocationId,
    pub value: u64,
}

impl ActionSpec {
    fn writes(&self) -> bool {
        matches!(
            self.kind,
            ActionKind::AtomicWrite | ActionKind::AtomicRmw | ActionKind::AtomicInit
        )
    }

    fn reads(&self) -> bool {
        matches!(
            self.kind,
            ActionKind::AtomicRead | ActionKind::AtomicRmwR | ActionKind::AtomicRmwc
        )
    }

    fn lock_family(&self) -> bool {
        matches!(
            self.kind,
            ActionKind::MutexLock
                | ActionKind::MutexUnlock
                | ActionKind::MutexTrylock
                | ActionKind::CondWait
                | ActionKind::NotifyOne
                | ActionKind::NotifyAll
        )
    }

    /// Mirror of `ModelAction::is_conflicting` for a not-yet-executed
    /// action. Used to wake sleeping threads.
    pub fn conflicts_with(&self, act: &ModelAction) -> bool {
        if self.location != act.location {
            return false;
        }
        if self.lock_family() && act.is_lock_family() {
            return true;
        }
        (self.writes() && (act.is_read() || act.is_write())) || (self.reads() && act.is_write())
    }
}

/// Final report over all executions.
#[derive(Debug)]
pub struct CheckSummary {
    pub stats: Stats,
    /// Bugs of the first buggy execution.
    pub bugs: Vec<Bug>,
    /// Trace of the first buggy execution.
    pub buggy_trace: Option<Vec<ModelAction>>,
    /// Values recorded via `record_value` per feasible complete
    /// execution, in exploration order.
    pub outcomes: Vec<Vec<u64>>,
}

impl CheckSummary {
    pub fn found_bugs(&self) -> bool {
        !self.bugs.is_empty()
    }
}

#[derive(Debug)]
struct ThreadInfo {
    parent: ThreadId,
    /// The ThreadCreate action that made this thread.
    create_ref: Option<ActRef>,
    finish_ref: Option<ActRef>,
    /// Action fetched from the fiber but not yet executed (blocked or
    /// sleeping).
    pending: Option<ActionSpec>,
    /// Result of the last executed action, delivered on next resume.
    resume_value: u64,
    cv: ClockVector,
    actions: Vec<ActRef>,
    last_rmw_read: Option<ActRef>,
    waiting_join: Option<ThreadId>,
    finished: bool,
}

impl ThreadInfo {
    fn new(parent: ThreadId) -> Self {
        Self {
            parent,
            create_ref: None,
            finish_ref: None,
            pending: None,
            resume_value: 0,
            cv: ClockVector::new(),
            actions: Vec::new(),
            last_rmw_read: None,
            waiting_join: None,
            finished: false,
        }
    }
}

/// Per-execution state. Everything here is discarded and rebuilt by
/// replay on rollback.
struct ExecState {
    actions: Vec<ModelAction>,
    history: ObjectHistory,
    graph: CycleGraph,
    promises: PromiseSet,
    relseqs: RelSeqTracker,
    fences: ReleaseFences,
    races: RaceDetector,
    scheduler: Scheduler,
    threads: Vec<ThreadInfo>,
    mutex_owner: AHashMap<LocationId, ThreadId>,
    /// RMW writes whose read half was satisfied by a promise; withheld
    /// from future-value generation.
    rmw_after_promise: AHashSet<ActRef>,
    /// Promise resolutions whose acquire synchronization must be
    /// propagated after the current action commits.
    deferred_syncs: Vec<(ActRef, ActRef)>,
    /// (parent, child) pairs for threads created since the last drain.
    created: Vec<(ThreadId, ThreadId)>,
    next_seq: u64,
    current_sleep: u64,
    peeking: Option<ThreadId>,
    failed_promise: bool,
    too_many_reads: bool,
    bad_synchronization: bool,
    asserted: bool,
    bounded: bool,
    redundant: bool,
    bugs: Vec<Bug>,
    recorded: Vec<u64>,
    last_sc_fence: Option<ActRef>,
}

impl ExecState {
    fn new(params: &Params) -> Self {
        let mut scheduler = Scheduler::new(params.fairwindow, params.enabledcount);
        scheduler.add_thread(ThreadId::MODEL);
        scheduler.add_thread(ThreadId::MAIN);
        let mut model = ThreadInfo::new(ThreadId::MODEL);
        model.finished = true;
        Self {
            actions: Vec::new(),
            history: ObjectHistory::new(),
            graph: CycleGraph::new(),
            promises: PromiseSet::new(),
            relseqs: RelSeqTracker::new(),
            fences: ReleaseFences::new(),
            races: RaceDetector::new(),
            scheduler,
            threads: vec![model, ThreadInfo::new(ThreadId::MODEL)],
            mutex_owner: AHashMap::new(),
            rmw_after_promise: AHashSet::new(),
            deferred_syncs: Vec::new(),
            created: Vec::new(),
            next_seq: 1,
            current_sleep: 0,
            peeking: None,
            failed_promise: false,
            too_many_reads: false,
            bad_synchronization: false,
            asserted: false,
            bounded: false,
            redundant: false,
            bugs: Vec::new(),
            recorded: Vec::new(),
            last_sc_fence: None,
        }
    }

    fn is_infeasible(&self) -> bool {
        self.graph.has_cycle()
            || self.failed_promise
            || self.too_many_reads
            || self.bad_synchronization
    }

    fn should_end(&self) -> bool {
        self.asserted || self.bounded || self.redundant || self.is_infeasible()
    }

    fn sleeper_needing_peek(&self) -> Option<ThreadId> {
        for (i, th) in self.threads.iter().enumerate() {
            let tid = ThreadId(i as u32);
            if self.scheduler.state(tid) == ThreadState::Sleeping
                && th.pending.is_none()
                && !th.finished
            {
                return Some(tid);
            }
        }
        None
    }

    fn wake_thread(&mut self, tid: ThreadId) {
        self.current_sleep &= !tid.bit();
        self.scheduler.remove_sleep(tid);
    }

    fn eligible_mask(&self, reader: ThreadId) -> u64 {
        let mut mask = 0u64;
        for (i, th) in self.threads.iter().enumerate() {
            let tid = ThreadId(i as u32);
            if tid != ThreadId::MODEL && tid != reader && !th.finished {
                mask |= tid.bit();
            }
        }
        mask
    }

    fn action_enabled(&self, tid: ThreadId, spec: &ActionSpec) -> bool {
        let _ = tid;
        match spec.kind {
            ActionKind::MutexLock => !self.mutex_owner.contains_key(&spec.location),
            ActionKind::ThreadJoin => {
                self.threads[ThreadId(spec.value as u32).index()].finished
            }
            _ => true,
        }
    }

    fn block_thread(&mut self, tid: ThreadId, spec: ActionSpec) {
        match spec.kind {
            ActionKind::MutexLock => self.history.push_lock_waiter(spec.location, tid),
            ActionKind::ThreadJoin => {
                self.threads[tid.index()].waiting_join = Some(ThreadId(spec.value as u32));
            }
            _ => unreachable!("only locks and joins block"),
        }
        trace!(tid = tid.0, kind = %spec.kind, "thread blocked");
        self.threads[tid.index()].pending = Some(spec);
        self.scheduler.set_disabled(tid);
    }

    /// Execute one fiber-submitted action. Returns the created thread id
    /// for `ThreadCreate`.
    fn execute_action(
        &mut self,
        params: &Params,
        node_stack: &mut NodeStack,
        snapshot: &mut SnapshotBoundary,
        tid: ThreadId,
        spec: ActionSpec,
    ) -> Option<ThreadId> {
        if params.bound > 0 && self.next_seq > params.bound {
            debug!(bound = params.bound, "sequence bound reached");
            self.bounded = true;
            return None;
        }
        if !self.action_enabled(tid, &spec) {
            self.block_thread(tid, spec);
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let r: ActRef = self.actions.len();
        let mut curr = ModelAction::new(seq, tid, spec.kind, spec.order, spec.location, spec.value);
        curr.cv = ClockVector::inherit(&self.threads[tid.index()].cv, tid, seq);

        let enabled = self.scheduler.enabled_mask();
        let (node_idx, replaying) = node_stack.register(seq, tid, enabled, self.current_sleep);
        curr.node = node_idx;
        snapshot.checkpoint(node_idx, seq);
        trace!(seq, tid = tid.0, kind = %curr.kind, replaying, "processing");

        let mut created = None;
        let mut resume_val = 0u64;
        match spec.kind {
            ActionKind::ThreadCreate => {
                created = Some(self.process_thread_create(&mut curr, r, &mut resume_val));
            }
            ActionKind::ThreadStart => self.process_thread_start(&mut curr),
            ActionKind::ThreadYield => {}
            ActionKind::ThreadJoin => self.process_thread_join(&mut curr),
            ActionKind::ThreadFinish => self.process_thread_finish(&mut curr, r),
            ActionKind::AtomicInit | ActionKind::AtomicWrite => {
                self.process_write(params, node_stack, &mut curr, r);
            }
            ActionKind::AtomicRead | ActionKind::AtomicRmwR => {
                self.process_read(params, node_stack, &mut curr, r, node_idx, &mut resume_val);
                if spec.kind == ActionKind::AtomicRmwR {
                    self.threads[tid.index()].last_rmw_read = Some(r);
                }
            }
            ActionKind::AtomicRmw => self.process_rmw_write(params, node_stack, &mut curr, r),
            ActionKind::AtomicRmwc => {
                self.threads[tid.index()].last_rmw_read = None;
            }
            ActionKind::Fence => self.process_fence(&mut curr, r),
            ActionKind::MutexLock => self.process_lock(&mut curr, &mut resume_val, false),
            ActionKind::MutexTrylock => self.process_lock(&mut curr, &mut resume_val, true),
            ActionKind::MutexUnlock => self.process_unlock(&curr),
            ActionKind::CondWait => self.process_wait(&curr),
            ActionKind::NotifyOne => self.process_notify(&curr, false),
            ActionKind::NotifyAll => self.process_notify(&curr, true),
            ActionKind::FixupRelseq => unreachable!("fixup actions are engine-synthesized"),
        }

        self.set_backtracking(node_stack, &curr);

        // Commit into the trace and histories.
        self.history.add(&curr, r);
        {
            let th = &mut self.threads[tid.index()];
            th.cv = curr.cv.clone();
            th.actions.push(r);
            th.resume_value = resume_val;
        }
        self.actions.push(curr);

        // Post-commit work that treats the action as trace data.
        for (acquire, release) in std::mem::take(&mut self.deferred_syncs) {
            self.late_synchronize(acquire, release);
        }
        if spec.writes() {
            self.relseq_on_write(r);
        }
        self.update_sleep_after(node_stack, node_idx, tid, r);
        if self.promises.any_expired(self.next_seq) {
            debug!("promise expired unfulfilled");
            self.failed_promise = true;
        }
        created
    }

    fn process_thread_create(
        &mut self,
        curr: &mut ModelAction,
        r: ActRef,
        resume_val: &mut u64,
    ) -> ThreadId {
        assert!(self.threads.len() < MAX_THREADS, "thread limit exceeded");
        let child = ThreadId(self.threads.len() as u32);
        let mut info = ThreadInfo::new(curr.tid);
        info.create_ref = Some(r);
        self.threads.push(info);
        self.scheduler.add_thread(child);
        curr.value = child.0 as u64;
        *resume_val = child.0 as u64;
        self.created.push((curr.tid, child));
        trace!(parent = curr.tid.0, child = child.0, "thread created");
        child
    }

    fn process_thread_start(&mut self, curr: &mut ModelAction) {
        if let Some(cr) = self.threads[curr.tid.index()].create_ref {
            let cv = self.actions[cr].cv.clone();
            curr.cv.merge(&cv);
        }
    }

    fn process_thread_join(&mut self, curr: &mut ModelAction) {
        let target = ThreadId(curr.value as u32);
        let fr = self.threads[target.index()]
            .finish_ref
            .expect("join executed before target finished");
        let cv = self.actions[fr].cv.clone();
        curr.cv.merge(&cv);
    }

    fn process_thread_finish(&mut self, curr: &mut ModelAction, r: ActRef) {
        let tid = curr.tid;
        self.threads[tid.index()].finished = true;
        self.threads[tid.index()].finish_ref = Some(r);
        self.scheduler.set_finished(tid);
        for i in 0..self.threads.len() {
            if self.threads[i].waiting_join == Some(tid) {
                self.threads[i].waiting_join = None;
                self.scheduler.set_enabled(ThreadId(i as u32));
            }
        }
        if self.promises.thread_finished(tid) {
            debug!(tid = tid.0, "promise starved by thread exit");
            self.failed_promise = true;
        }
    }

    fn process_read(
        &mut self,
        params: &Params,
        node_stack: &mut NodeStack,
        curr: &mut ModelAction,
        r: ActRef,
        node_idx: usize,
        resume_val: &mut u64,
    ) {
        let loc = curr.location;
        if !self.history.is_initialized(loc) {
            self.bugs.push(Bug::UninitLoad {
                tid: curr.tid,
                location: loc,
            });
            self.asserted = true;
            return;
        }

        let candidates = build_reads_from_past(&self.actions, &self.history, &self.graph, curr);
        let choice = {
            let node = node_stack.get_mut(node_idx);
            node.set_read_candidates(candidates.len());
            node.read_choice()
        };

        match choice {
            Some(ReadChoice::Candidate(i)) => {
                let rf = candidates[i];
                curr.reads_from = Some(rf);
                *resume_val = self.actions[rf].value;
                r_modification_order(
                    &self.actions,
                    &self.history,
                    &mut self.graph,
                    &curr.cv,
                    loc,
                    GraphNode::Action(rf),
                );
                self.check_recency(params, curr, rf, candidates.len());
                if curr.is_acquire() {
                    let (heads, pending) = release_seq_heads(
                        &self.actions,
                        &self.history,
                        &self.graph,
                        &self.fences,
                        rf,
                    );
                    for &h in &heads {
                        let cv = self.actions[h].cv.clone();
                        curr.cv.merge(&cv);
                    }
                    if let Some(mut p) = pending {
                        p.acquire = r;
                        trace!(acquire = curr.seq, release = self.actions[p.release].seq, "release sequence pending");
                        self.relseqs.add(p);
                    }
                }
                self.promises.narrow_windows(loc, &curr.cv);
            }
            Some(ReadChoice::Future(fi)) => {
                let fv = node_stack.get(node_idx).future_value(fi);
                let eligible = self.eligible_mask(curr.tid);
                let expiration = curr.seq + params.maxfuturedelay;
                let id = self.promises.add(
                    r,
                    curr.tid,
                    loc,
                    fv.value,
                    expiration,
                    eligible,
                    curr.cv.clone(),
                );
                curr.reads_from_promise = Some(id);
                r_modification_order(
                    &self.actions,
                    &self.history,
                    &mut self.graph,
                    &curr.cv,
                    loc,
                    GraphNode::Promise(id),
                );
                *resume_val = fv.value;
                debug!(seq = curr.seq, value = fv.value, promise = id, "read speculates on future value");
            }
            None => unreachable!("initialized location yields at least one readable write"),
        }
    }

    fn process_write(
        &mut self,
        params: &Params,
        node_stack: &mut NodeStack,
        curr: &mut ModelAction,
        r: ActRef,
    ) {
        w_modification_order(&self.actions, &self.history, &mut self.graph, curr, r);
        self.resolve_promises(curr, r);
        self.compute_promises(params, node_stack, curr, r);
    }

    fn process_rmw_write(
        &mut self,
        params: &Params,
        node_stack: &mut NodeStack,
        curr: &mut ModelAction,
        r: ActRef,
    ) {
        let prev = self.threads[curr.tid.index()]
            .last_rmw_read
            .take()
            .expect("rmw write without a preceding read half");
        let read = &self.actions[prev];
        match (read.reads_from, read.reads_from_promise) {
            (Some(rf), _) => {
                curr.reads_from = Some(rf);
                self.graph
                    .add_rmw_edge(GraphNode::Action(rf), GraphNode::Action(r));
            }
            (None, Some(p)) => {
                self.graph
                    .add_rmw_edge(GraphNode::Promise(p), GraphNode::Action(r));
                self.rmw_after_promise.insert(r);
            }
            (None, None) => unreachable!("rmw read half chose no source"),
        }
        self.process_write(params, node_stack, curr, r);
    }

    fn process_fence(&mut self, curr: &mut ModelAction, r: ActRef) {
        let tid = curr.tid;
        if curr.is_release() {
            self.fences.record(tid, curr.seq);
        }
        if curr.is_acquire() {
            // An acquire fence picks up the release writes observed by
            // the thread's earlier reads.
            let prior: Vec<ActRef> = self.threads[tid.index()].actions.clone();
            for a in prior {
                let act = &self.actions[a];
                if !act.is_read() {
                    continue;
                }
                if let Some(w) = act.reads_from {
                    if self.actions[w].is_release() {
                        let cv = self.actions[w].cv.clone();
                        curr.cv.merge(&cv);
                    }
                }
            }
        }
        if curr.is_seqcst() {
            if let Some(f) = self.last_sc_fence {
                let cv = self.actions[f].cv.clone();
                curr.cv.merge(&cv);
            }
            self.last_sc_fence = Some(r);
        }
    }

    fn process_lock(&mut self, curr: &mut ModelAction, resume_val: &mut u64, try_lock: bool) {
        let loc = curr.location;
        if self.mutex_owner.contains_key(&loc) {
            debug_assert!(try_lock, "blocking lock executed while mutex held");
            *resume_val = 0;
            curr.value = 0;
            return;
        }
        self.mutex_owner.insert(loc, curr.tid);
        if let Some(u) = self.history.last_unlock(loc) {
            let cv = self.actions[u].cv.clone();
            curr.cv.merge(&cv);
        }
        *resume_val = 1;
        curr.value = 1;
    }

    fn process_unlock(&mut self, curr: &ModelAction) {
        self.mutex_owner.remove(&curr.location);
        if let Some(w) = self.history.pop_lock_waiter(curr.location) {
            self.scheduler.set_enabled(w);
        }
    }

    fn process_wait(&mut self, curr: &ModelAction) {
        let mutex = LocationId(curr.value);
        self.mutex_owner.remove(&mutex);
        if let Some(w) = self.history.pop_lock_waiter(mutex) {
            self.scheduler.set_enabled(w);
        }
        self.history.push_condvar_waiter(curr.location, curr.tid);
        self.scheduler.set_disabled(curr.tid);
    }

    fn process_notify(&mut self, curr: &ModelAction, all: bool) {
        if all {
            for w in self.history.drain_condvar_waiters(curr.location) {
                self.scheduler.set_enabled(w);
            }
        } else if let Some(w) = self.history.pop_condvar_waiter(curr.location) {
            self.scheduler.set_enabled(w);
        }
    }

    /// Step 5 of the main loop: find the most recent conflicting action
    /// by another thread and mark the current thread as an alternative at
    /// its node. A thread not yet created there is represented by its
    /// creating ancestor.
    fn set_backtracking(&mut self, node_stack: &mut NodeStack, curr: &ModelAction) {
        let Some(prev) = self.get_last_conflict(curr) else {
            return;
        };
        let prev_node = self.actions[prev].node;
        if prev_node == usize::MAX {
            return;
        }
        let mut t = curr.tid;
        loop {
            if node_stack.get(prev_node).enabled_contains(t) {
                if node_stack.set_backtrack(prev_node, t) {
                    trace!(node = prev_node, tid = t.0, "backtrack point recorded");
                }
                return;
            }
            let parent = self.threads[t.index()].parent;
            if parent == t || parent == ThreadId::MODEL {
                return;
            }
            t = parent;
        }
    }

    fn get_last_conflict(&self, curr: &ModelAction) -> Option<ActRef> {
        for &a in self.history.actions_on(curr.location).iter().rev() {
            let act = &self.actions[a];
            if act.tid == curr.tid {
                continue;
            }
            let hit = match curr.kind {
                // Only acquisitions conflict for backtracking purposes;
                // an unlock commutes with everything except another
                // acquisition of the same mutex.
                ActionKind::MutexLock => {
                    act.kind == ActionKind::MutexLock
                        || (act.kind == ActionKind::MutexTrylock && act.value == 1)
                }
                // A trylock's outcome also depends on where the unlock
                // falls, so the unlock is a conflict for it.
                ActionKind::MutexTrylock => {
                    matches!(act.kind, ActionKind::MutexLock | ActionKind::MutexUnlock)
                        || (act.kind == ActionKind::MutexTrylock && act.value == 1)
                }
                ActionKind::CondWait => {
                    matches!(act.kind, ActionKind::NotifyOne | ActionKind::NotifyAll)
                }
                ActionKind::NotifyOne | ActionKind::NotifyAll => {
                    act.kind == ActionKind::CondWait
                }
                ActionKind::MutexUnlock => false,
                _ if curr.is_read() => act.is_write(),
                _ if curr.is_write() => act.is_read() || act.is_write(),
                _ => false,
            };
            if hit {
                return Some(a);
            }
        }
        None
    }

    /// The recency rule: a read that keeps choosing the same stale write
    /// while alternatives exist makes the execution infeasible.
    fn check_recency(&mut self, params: &Params, curr: &ModelAction, rf: ActRef, ncandidates: usize) {
        if params.maxreads == 0 || ncandidates <= 1 {
            return;
        }
        let prior: Vec<ActRef> = self
            .history
            .actions_on_by(curr.location, curr.tid)
            .iter()
            .rev()
            .copied()
            .filter(|&a| self.actions[a].is_read())
            .take(params.maxreads as usize)
            .collect();
        if prior.len() < params.maxreads as usize {
            return;
        }
        if prior.iter().all(|&a| self.actions[a].reads_from == Some(rf)) {
            debug!(seq = curr.seq, maxreads = params.maxreads, "too many stale reads");
            self.too_many_reads = true;
        }
    }

    /// Offer this write's value to every earlier read that could observe
    /// it in some other execution.
    fn compute_promises(
        &mut self,
        params: &Params,
        node_stack: &mut NodeStack,
        curr: &ModelAction,
        r: ActRef,
    ) {
        if params.maxfuturevalues == 0 || self.rmw_after_promise.contains(&r) {
            return;
        }
        for &a in self.history.actions_on(curr.location) {
            let act = &self.actions[a];
            if !act.is_read() || act.tid == curr.tid || act.node == usize::MAX {
                continue;
            }
            // A read that happens before this write may not observe it.
            if curr.cv.synchronized_since(act.tid, act.seq) {
                continue;
            }
            let added = node_stack.get_mut(act.node).add_future_value(
                curr.value,
                curr.seq,
                params.maxfuturevalues,
                params.expireslop,
            );
            if added {
                trace!(reader = act.seq, writer = curr.seq, value = curr.value, "future value sent");
            }
        }
    }

    /// Let this write stand in for any promise it matches.
    fn resolve_promises(&mut self, curr: &ModelAction, r: ActRef) {
        let ids = self
            .promises
            .candidates_for(curr.tid, curr.location, curr.value);
        for id in ids {
            let (reader, reader_tid, expired) = {
                let p = self.promises.get(id).unwrap();
                (p.reader, p.reader_tid, p.has_expired(curr.seq))
            };
            if expired {
                continue;
            }
            let rseq = self.actions[reader].seq;
            if curr.cv.synchronized_since(reader_tid, rseq) {
                // The reader happens before this write.
                continue;
            }
            if !self
                .graph
                .check_promise(GraphNode::Action(r), GraphNode::Promise(id))
            {
                continue;
            }
            self.graph
                .resolve_promise(GraphNode::Promise(id), GraphNode::Action(r));
            self.promises.remove(id);
            self.actions[reader].reads_from = Some(r);
            self.actions[reader].reads_from_promise = None;
            debug!(promise = id, writer = curr.seq, reader = rseq, "promise resolved");
            if self.actions[reader].is_acquire() && curr.is_release() {
                self.deferred_syncs.push((reader, r));
            }
        }
    }

    /// Re-examine pending release sequences after a write on their
    /// location; resolve or drop the decided ones.
    fn relseq_on_write(&mut self, r: ActRef) {
        let loc = self.actions[r].location;
        let touched = self.relseqs.note_write(&self.actions, loc, r);
        if touched.is_empty() {
            return;
        }
        let mut resolved = Vec::new();
        let mut done = Vec::new();
        for i in touched {
            match self.relseqs.fate(&self.graph, i) {
                RelSeqFate::Broken => done.push(i),
                RelSeqFate::Established => {
                    let p = self.relseqs.get(i);
                    resolved.push((p.acquire, p.release));
                    done.push(i);
                }
                RelSeqFate::Undecided => {}
            }
        }
        self.relseqs.remove_many(done);
        for (acquire, release) in resolved {
            self.late_synchronize(acquire, release);
        }
    }

    /// Propagate a synchronization that was established after the
    /// acquire had already executed. The model thread materializes the
    /// propagation as a fixup action; if some other thread had already
    /// synchronized past the acquire, its clocks are stale beyond repair
    /// and the execution is pruned.
    fn late_synchronize(&mut self, acquire: ActRef, release: ActRef) {
        let rel_cv = self.actions[release].cv.clone();
        let rel_seq = self.actions[release].seq;
        let loc = self.actions[release].location;
        let rtid = self.actions[acquire].tid;
        let aseq = self.actions[acquire].seq;

        let targets: Vec<ActRef> = self.threads[rtid.index()]
            .actions
            .iter()
            .copied()
            .filter(|&a| self.actions[a].seq >= aseq)
            .collect();
        let mut changed = false;
        for a in targets {
            changed |= self.actions[a].cv.merge(&rel_cv);
        }
        self.threads[rtid.index()].cv.merge(&rel_cv);

        if changed {
            for act in &self.actions {
                if act.tid != rtid && act.tid != ThreadId::MODEL && act.cv.get(rtid) >= aseq {
                    debug!(observer = act.seq, "stale observer of late synchronization");
                    self.bad_synchronization = true;
                    break;
                }
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let mut fix = ModelAction::new(
            seq,
            ThreadId::MODEL,
            ActionKind::FixupRelseq,
            MemOrder::Relaxed,
            loc,
            0,
        );
        fix.cv = self.actions[acquire].cv.clone();
        fix.cv.set(ThreadId::MODEL, seq);
        let fr = self.actions.len();
        self.history.add(&fix, fr);
        self.threads[ThreadId::MODEL.index()].actions.push(fr);
        self.actions.push(fix);
        debug!(acquire = aseq, release = rel_seq, "release sequence resolved late");
    }

    /// Children of this node inherit its sleep set plus the siblings
    /// already explored; then conflicting sleepers wake.
    fn update_sleep_after(
        &mut self,
        node_stack: &NodeStack,
        node_idx: usize,
        tid: ThreadId,
        r: ActRef,
    ) {
        let node = node_stack.get(node_idx);
        self.current_sleep = node.sleep | (node.explored & !tid.bit());

        let mut mask = self.current_sleep;
        for i in 0..self.threads.len() {
            let bit = 1u64 << i;
            if mask & bit == 0 {
                continue;
            }
            let Some(p) = &self.threads[i].pending else {
                continue;
            };
            if p.conflicts_with(&self.actions[r]) {
                trace!(tid = i, "sleeper woken by conflicting action");
                mask &= !bit;
            }
        }
        self.current_sleep = mask;
        self.scheduler.sync_sleep(mask);
    }
}

/// The central structure for model checking. One instance explores one
/// program; its lifecycle is construct, run many executions, summarize.
pub struct Engine {
    params: Params,
    node_stack: NodeStack,
    snapshot: SnapshotBoundary,
    stats: Stats,
    summary_bugs: Vec<Bug>,
    buggy_trace: Option<Vec<ModelAction>>,
    outcomes: Vec<Vec<u64>>,
    exec: ExecState,
    executions: usize,
}

impl Engine {
    pub fn new(params: Params) -> Self {
        let exec = ExecState::new(&params);
        Self {
            params,
            node_stack: NodeStack::new(),
            snapshot: SnapshotBoundary::new(),
            stats: Stats::default(),
            summary_bugs: Vec::new(),
            buggy_trace: None,
            outcomes: Vec::new(),
            exec,
            executions: 0,
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn main_thread(&self) -> ThreadId {
        ThreadId::MAIN
    }

    /// Reset per-execution state. The node stack and statistics persist.
    pub fn begin_execution(&mut self) {
        self.snapshot.begin_execution();
        self.node_stack.reset_execution();
        self.exec = ExecState::new(&self.params);
        debug!(execution = self.executions + 1, "starting execution");
    }

    /// Advance until a fiber must run or the execution is over.
    pub fn next_step(&mut self) -> Step {
        loop {
            if self.exec.should_end() {
                return Step::ExecutionDone;
            }
            if let Some(t) = self.exec.sleeper_needing_peek() {
                self.exec.peeking = Some(t);
                return Step::Resume(t);
            }
            let forced = self.node_stack.replay_tid();
            if let Some(f) = forced {
                if self.exec.scheduler.state(f) == ThreadState::Disabled {
                    // The diverged-to thread blocked at its own node, so
                    // this schedule cannot be realized.
                    debug!(tid = f.0, "forced thread blocked at its node");
                    self.exec.redundant = true;
                    return Step::ExecutionDone;
                }
            }
            let Some(tid) = self.exec.scheduler.next_thread(forced) else {
                if self.exec.scheduler.has_runnable_sleeping() {
                    debug!("all enabled threads sleeping, execution redundant");
                    self.exec.redundant = true;
                }
                return Step::ExecutionDone;
            };
            if let Some(spec) = self.exec.threads[tid.index()].pending.take() {
                let Engine {
                    exec,
                    node_stack,
                    snapshot,
                    params,
                    ..
                } = self;
                let _ = exec.execute_action(params, node_stack, snapshot, tid, spec);
                if !self.exec.created.is_empty() {
                    return Step::Spawned;
                }
                continue;
            }
            return Step::Resume(tid);
        }
    }

    /// Accept the action a resumed fiber submitted. For a sleeping
    /// thread this only stashes the pending action; otherwise it
    /// executes. Returns the new thread id for `ThreadCreate`.
    pub fn submit(&mut self, tid: ThreadId, spec: ActionSpec) -> Option<ThreadId> {
        if self.exec.peeking == Some(tid) {
            self.exec.peeking = None;
            self.exec.threads[tid.index()].pending = Some(spec);
            return None;
        }
        let Engine {
            exec,
            node_stack,
            snapshot,
            params,
            ..
        } = self;
        exec.execute_action(params, node_stack, snapshot, tid, spec)
    }

    /// Value delivered to the fiber on its next resume: the result of
    /// its previously executed action.
    pub fn resume_value(&self, tid: ThreadId) -> u64 {
        self.exec.threads[tid.index()].resume_value
    }

    /// Threads created since the last drain, as (parent, child) pairs.
    /// The runtime matches each child with its entry closure.
    pub fn take_created(&mut self) -> Vec<(ThreadId, ThreadId)> {
        std::mem::take(&mut self.exec.created)
    }

    /// The trace of the current execution.
    pub fn trace(&self) -> &[ModelAction] {
        &self.exec.actions
    }

    /// The fiber's closure returned; run its finish action.
    pub fn thread_finished(&mut self, tid: ThreadId) {
        let spec = ActionSpec {
            kind: ActionKind::ThreadFinish,
            order: MemOrder::Relaxed,
            location: LocationId(0),
            value: 0,
        };
        if self.exec.peeking == Some(tid) {
            // A finishing thread is never redundant: joiners depend on it.
            self.exec.peeking = None;
            self.exec.threads[tid.index()].pending = Some(spec);
            self.exec.wake_thread(tid);
            return;
        }
        let Engine {
            exec,
            node_stack,
            snapshot,
            params,
            ..
        } = self;
        let _ = exec.execute_action(params, node_stack, snapshot, tid, spec);
    }

    pub fn assert_failed(&mut self, tid: ThreadId, msg: String) {
        debug!(tid = tid.0, msg = %msg, "user assertion failed");
        self.exec.bugs.push(Bug::UserAssert { tid, msg });
        self.exec.asserted = true;
    }

    pub fn user_fatal(&mut self, tid: ThreadId, msg: String) {
        debug!(tid = tid.0, msg = %msg, "user program fatal");
        self.exec.bugs.push(Bug::UserFatal { tid, msg });
        self.exec.asserted = true;
        self.exec.threads[tid.index()].finished = true;
        self.exec.scheduler.set_finished(tid);
    }

    /// Race-check one plain (non-atomic) access. Not a scheduling point.
    pub fn plain_access(&mut self, tid: ThreadId, loc: LocationId, is_write: bool) {
        let th = &self.exec.threads[tid.index()];
        let now = th.cv.get(tid);
        let cv = th.cv.clone();
        if let Some(other) = self.exec.races.on_access(loc, tid, &cv, now, is_write) {
            debug!(loc = loc.0, a = other.0, b = tid.0, "data race");
            self.exec.bugs.push(Bug::DataRace {
                location: loc,
                first: other,
                second: tid,
            });
            self.exec.asserted = true;
        }
    }

    /// Record an observation for the current execution; surfaced in the
    /// summary for feasible complete executions.
    pub fn record_value(&mut self, v: u64) {
        self.exec.recorded.push(v);
    }

    /// Classify the finished execution and fold it into the statistics.
    pub fn end_execution(&mut self) {
        let exec = &mut self.exec;
        let class = if exec.redundant {
            ExecutionClass::Redundant
        } else if exec.is_infeasible() || !exec.promises.is_empty() {
            ExecutionClass::Infeasible
        } else {
            let blocked = exec.scheduler.disabled_threads();
            let deadlocked = !exec.bounded
                && !exec.asserted
                && !blocked.is_empty()
                && !exec.scheduler.has_runnable()
                && !exec.scheduler.has_runnable_sleeping();
            if deadlocked {
                exec.bugs.push(Bug::Deadlock { blocked });
                ExecutionClass::Deadlock
            } else {
                ExecutionClass::Complete
            }
        };

        let buggy = matches!(class, ExecutionClass::Complete | ExecutionClass::Deadlock)
            && !exec.bugs.is_empty();
        self.stats.record(class, buggy);
        self.executions += 1;
        debug!(
            execution = self.executions,
            class = ?class,
            actions = exec.actions.len(),
            buggy,
            "execution finished"
        );

        if buggy && self.buggy_trace.is_none() {
            for act in &exec.actions {
                debug!(target: "relax::trace", "{act}");
            }
            self.summary_bugs.extend(exec.bugs.iter().cloned());
            self.buggy_trace = Some(exec.actions.clone());
        }
        if class == ExecutionClass::Complete && !buggy && !exec.recorded.is_empty() {
            self.outcomes.push(exec.recorded.clone());
        }
    }

    /// Rewind to the deepest unexplored backtrack point. Returns false
    /// when exploration is exhausted.
    pub fn next_execution(&mut self) -> bool {
        let Some(idx) = self.node_stack.next_backtrack() else {
            info!(stats = %self.stats, "exploration complete");
            return false;
        };
        self.snapshot.rewind_to(idx);
        self.node_stack.diverge(idx);
        true
    }

    pub fn into_summary(self) -> CheckSummary {
        CheckSummary {
            stats: self.stats,
            bugs: self.summary_bugs,
            buggy_trace: self.buggy_trace,
            outcomes: self.outcomes,
        }
    }
}

/// Candidate writes a read may observe: everything not mo-superseded by
/// a write already visible to the reader, with the seq_cst and RMW
/// restrictions applied. Newest first. An acquire read additionally
/// never reaches past the newest release store on the location.
fn build_reads_from_past(
    actions: &[ModelAction],
    history: &ObjectHistory,
    graph: &CycleGraph,
    curr: &ModelAction,
) -> Vec<ActRef> {
    let loc = curr.location;
    let writes: Vec<ActRef> = history
        .actions_on(loc)
        .iter()
        .copied()
        .filter(|&a| actions[a].is_write())
        .collect();
    let last_sc = history.last_sc_write(loc);
    let acquire_floor: Option<u64> = if curr.is_acquire() {
        writes
            .iter()
            .rev()
            .find(|&&w| actions[w].is_release())
            .map(|&w| actions[w].seq)
    } else {
        None
    };

    let mut out = Vec::new();
    'cand: for &w in writes.iter().rev() {
        let a = &actions[w];
        if let Some(floor) = acquire_floor {
            if a.seq < floor {
                continue;
            }
        }
        if curr.is_seqcst() && a.is_seqcst() && Some(w) != last_sc {
            continue;
        }
        if curr.is_rmw_read() && graph.has_rmw_successor(GraphNode::Action(w)) {
            continue;
        }
        for &w2 in &writes {
            if w2 == w {
                continue;
            }
            let b = &actions[w2];
            if curr.cv.synchronized_since(b.tid, b.seq)
                && graph.check_reachable(GraphNode::Action(w), GraphNode::Action(w2))
            {
                continue 'cand;
            }
        }
        out.push(w);
    }
    out
}

/// Implied mo edges from a read: every write (or observed write of a
/// read) that happens before the reader on this location is ordered
/// before what the reader observes.
fn r_modification_order(
    actions: &[ModelAction],
    history: &ObjectHistory,
    graph: &mut CycleGraph,
    reader_cv: &ClockVector,
    loc: LocationId,
    rf_node: GraphNode,
) {
    for (i, list) in history.per_thread(loc).iter().enumerate() {
        let bound = reader_cv.get(ThreadId(i as u32));
        for &a in list.iter().rev() {
            let act = &actions[a];
            if act.seq > bound || (!act.is_read() && !act.is_write()) {
                continue;
            }
            let pred = if act.is_write() {
                Some(GraphNode::Action(a))
            } else {
                act.reads_from
                    .map(GraphNode::Action)
                    .or(act.reads_from_promise.map(GraphNode::Promise))
            };
            if let Some(p) = pred {
                if p != rf_node {
                    graph.add_edge(p, rf_node);
                }
            }
            break;
        }
    }
}

/// Implied mo edges to a new write: every happens-before predecessor
/// write on the location is ordered before it, as is the last seq_cst
/// store for a seq_cst write.
fn w_modification_order(
    actions: &[ModelAction],
    history: &ObjectHistory,
    graph: &mut CycleGraph,
    curr: &ModelAction,
    r: ActRef,
) {
    let loc = curr.location;
    if curr.is_seqcst() {
        if let Some(sc) = history.last_sc_write(loc) {
            graph.add_edge(GraphNode::Action(sc), GraphNode::Action(r));
        }
    }
    for (i, list) in history.per_thread(loc).iter().enumerate() {
        let bound = curr.cv.get(ThreadId(i as u32));
        for &a in list.iter().rev() {
            let act = &actions[a];
            if act.seq > bound || (!act.is_read() && !act.is_write()) {
                continue;
            }
            let pred = if act.is_write() {
                Some(GraphNode::Action(a))
            } else {
                act.reads_from
                    .map(GraphNode::Action)
                    .or(act.reads_from_promise.map(GraphNode::Promise))
            };
            if let Some(p) = pred {
                if p != GraphNode::Action(r) {
                    graph.add_edge(p, GraphNode::Action(r));
                }
            }
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relax_core::{ActionKind as K, MemOrder as O};

    fn spec(kind: K, order: O, loc: u64, value: u64) -> ActionSpec {
        ActionSpec {
            kind,
            order,
            location: LocationId(loc),
            value,
        }
    }

    /// Drive the engine with scripted threads, standing in for the fiber
    /// runtime. `scripts[0]` is the main thread; `scripts[i]` is the
    /// thread created by the i-th `ThreadCreate` overall. Each thread's
    /// first resume submits its start action; past the end of its script
    /// it finishes.
    fn explore(scripts: &[&[ActionSpec]], params: Params) -> CheckSummary {
        let mut engine = Engine::new(params);
        loop {
            engine.begin_execution();
            let mut pcs = vec![0usize; scripts.len()];
            loop {
                match engine.next_step() {
                    Step::Resume(tid) => {
                        let i = tid.index() - 1;
                        let pc = pcs[i];
                        pcs[i] += 1;
                        if pc == 0 {
                            let _ = engine.submit(tid, spec(K::ThreadStart, O::Relaxed, 0, 0));
                        } else if pc <= scripts[i].len() {
                            let _ = engine.submit(tid, scripts[i][pc - 1].clone());
                        } else {
                            engine.thread_finished(tid);
                        }
                        engine.take_created();
                    }
                    Step::Spawned => {
                        engine.take_created();
                    }
                    Step::ExecutionDone => break,
                }
            }
            engine.end_execution();
            if !engine.next_execution() {
                break;
            }
        }
        engine.into_summary()
    }

    #[test]
    fn test_uninitialized_load_is_a_bug() {
        let main = [spec(K::AtomicRead, O::Relaxed, 10, 0)];
        let summary = explore(&[&main], Params::default());
        assert!(summary.found_bugs());
        assert!(matches!(summary.bugs[0], Bug::UninitLoad { .. }));
        assert!(summary.buggy_trace.is_some());
    }

    #[test]
    fn test_single_thread_program_has_one_execution() {
        let main = [
            spec(K::AtomicInit, O::Relaxed, 10, 0),
            spec(K::AtomicWrite, O::Relaxed, 10, 7),
            spec(K::AtomicRead, O::Relaxed, 10, 0),
        ];
        let summary = explore(&[&main], Params::default());
        assert!(!summary.found_bugs());
        assert_eq!(summary.stats.num_total, 1);
        assert_eq!(summary.stats.num_complete, 1);
    }

    #[test]
    fn test_single_thread_rmw() {
        let main = [
            spec(K::AtomicInit, O::Relaxed, 10, 0),
            spec(K::AtomicRmwR, O::AcqRel, 10, 0),
            spec(K::AtomicRmw, O::AcqRel, 10, 1),
        ];
        let summary = explore(&[&main], Params::default());
        assert!(!summary.found_bugs());
        assert_eq!(summary.stats.num_complete, 1);
    }

    #[test]
    fn test_conflicting_writers_explore_multiple_schedules() {
        let main = [
            spec(K::AtomicInit, O::Relaxed, 10, 0),
            spec(K::ThreadCreate, O::Relaxed, 0, 0),
            spec(K::ThreadCreate, O::Relaxed, 0, 0),
            spec(K::ThreadJoin, O::Relaxed, 0, 2),
            spec(K::ThreadJoin, O::Relaxed, 0, 3),
        ];
        let t1 = [spec(K::AtomicWrite, O::Relaxed, 10, 1)];
        let t2 = [spec(K::AtomicWrite, O::Relaxed, 10, 2)];
        let summary = explore(&[&main, &t1, &t2], Params::default());
        assert!(!summary.found_bugs());
        assert!(
            summary.stats.num_complete >= 2,
            "both write orders must be explored, got {}",
            summary.stats.num_complete
        );
    }

    #[test]
    fn test_classic_lock_order_deadlock() {
        let a = 100;
        let b = 101;
        let main = [
            spec(K::ThreadCreate, O::Relaxed, 0, 0),
            spec(K::ThreadCreate, O::Relaxed, 0, 0),
            spec(K::ThreadJoin, O::Relaxed, 0, 2),
            spec(K::ThreadJoin, O::Relaxed, 0, 3),
        ];
        let t1 = [
            spec(K::MutexLock, O::Acquire, a, 0),
            spec(K::MutexLock, O::Acquire, b, 0),
            spec(K::MutexUnlock, O::Release, b, 0),
            spec(K::MutexUnlock, O::Release, a, 0),
        ];
        let t2 = [
            spec(K::MutexLock, O::Acquire, b, 0),
            spec(K::MutexLock, O::Acquire, a, 0),
            spec(K::MutexUnlock, O::Release, a, 0),
            spec(K::MutexUnlock, O::Release, b, 0),
        ];
        let summary = explore(&[&main, &t1, &t2], Params::default());
        assert!(summary.found_bugs());
        assert!(
            summary.bugs.iter().any(|b| matches!(b, Bug::Deadlock { .. })),
            "lock-order inversion must deadlock in some schedule: {:?}",
            summary.bugs
        );
    }

    #[test]
    fn test_replay_is_deterministic() {
        let main = [
            spec(K::AtomicInit, O::Relaxed, 10, 0),
            spec(K::ThreadCreate, O::Relaxed, 0, 0),
            spec(K::ThreadCreate, O::Relaxed, 0, 0),
            spec(K::ThreadJoin, O::Relaxed, 0, 2),
            spec(K::ThreadJoin, O::Relaxed, 0, 3),
        ];
        let t1 = [
            spec(K::AtomicWrite, O::Release, 10, 1),
            spec(K::AtomicRead, O::Acquire, 10, 0),
        ];
        let t2 = [
            spec(K::AtomicWrite, O::Release, 10, 2),
            spec(K::AtomicRead, O::Acquire, 10, 0),
        ];
        let run = || explore(&[&main, &t1, &t2], Params::default());
        let (s1, s2) = (run(), run());
        assert_eq!(s1.stats.num_total, s2.stats.num_total);
        assert_eq!(s1.stats.num_complete, s2.stats.num_complete);
        assert_eq!(s1.stats.num_infeasible, s2.stats.num_infeasible);
    }

    /// Reads-from consistency over every explored trace: the observed
    /// write targets the same location, and the read never happens
    /// before it.
    #[test]
    fn test_rf_consistency_across_exploration() {
        let main = [
            spec(K::AtomicInit, O::Relaxed, 10, 0),
            spec(K::AtomicInit, O::Relaxed, 11, 0),
            spec(K::ThreadCreate, O::Relaxed, 0, 0),
            spec(K::ThreadCreate, O::Relaxed, 0, 0),
            spec(K::ThreadJoin, O::Relaxed, 0, 2),
            spec(K::ThreadJoin, O::Relaxed, 0, 3),
        ];
        let t1 = [
            spec(K::AtomicWrite, O::Release, 10, 1),
            spec(K::AtomicRead, O::Acquire, 11, 0),
        ];
        let t2 = [
            spec(K::AtomicWrite, O::Release, 11, 1),
            spec(K::AtomicRead, O::Acquire, 10, 0),
        ];
        let scripts: [&[ActionSpec]; 3] = [&main, &t1, &t2];

        let mut engine = Engine::new(Params::default());
        loop {
            engine.begin_execution();
            let mut pcs = [0usize; 3];
            loop {
                match engine.next_step() {
                    Step::Resume(tid) => {
                        let i = tid.index() - 1;
                        let pc = pcs[i];
                        pcs[i] += 1;
                        if pc == 0 {
                            let _ = engine.submit(tid, spec(K::ThreadStart, O::Relaxed, 0, 0));
                        } else if pc <= scripts[i].len() {
                            let _ = engine.submit(tid, scripts[i][pc - 1].clone());
                        } else {
                            engine.thread_finished(tid);
                        }
                    }
                    Step::Spawned => {}
                    Step::ExecutionDone => break,
                }
            }
            let trace = engine.trace();
            for act in trace {
                if !act.is_read() {
                    continue;
                }
                if let Some(rf) = act.reads_from {
                    let w = &trace[rf];
                    assert!(w.is_write());
                    assert_eq!(w.location, act.location);
                    assert_ne!(w.seq, act.seq);
                    assert!(
                        !w.cv.synchronized_since(act.tid, act.seq),
                        "read #{} happens before its own source #{}",
                        act.seq,
                        w.seq
                    );
                }
            }
            engine.end_execution();
            if !engine.next_execution() {
                break;
            }
        }
    }

    #[test]
    fn test_bound_cuts_execution_short() {
        let main = [
            spec(K::AtomicInit, O::Relaxed, 10, 0),
            spec(K::AtomicWrite, O::Relaxed, 10, 1),
            spec(K::AtomicWrite, O::Relaxed, 10, 2),
            spec(K::AtomicWrite, O::Relaxed, 10, 3),
        ];
        let params = Params {
            bound: 3,
            ..Params::default()
        };
        let summary = explore(&[&main], params);
        assert!(!summary.found_bugs());
        assert_eq!(summary.stats.num_complete, 1);
    }
}
