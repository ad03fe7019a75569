//! Digest Engine
//!
//! The engine is the context object that connects properties and derived
//! computations. It owns the dependency graph, the action registry, the set
//! of changed nodes, and the scheduler that debounces digests.
//!
//! # How It Works
//!
//! 1. Creating a derived computation adds an edge from each dependency to
//!    the new node and registers the node's recomputation action.
//!
//! 2. Writing a property notifies its listeners. The listener installed by a
//!    dependent computation marks the property's node changed and requests a
//!    digest.
//!
//! 3. When the scheduler's window closes, the engine:
//!    a. Drains the changed set
//!    b. Sorts everything reachable from it topologically
//!    c. Runs each node's action in that order
//!    d. Hands a [`DigestReport`] to every digest observer
//!
//! # Threading
//!
//! Everything runs on one thread. The engine is `Rc`-based and uses
//! `RefCell` for its state, so it is neither `Send` nor `Sync`. Independent
//! engines can coexist, which keeps tests isolated from one another.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexSet;
use serde::Serialize;
use tracing::{debug, error, trace};

use super::defer::Defer;
use super::scheduler::{DigestScheduler, SchedulerState};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::graph::{Action, DependencyGraph, GraphSnapshot, NodeId, NodeRegistry};
use crate::reactive::{Dependency, DependencyList, ReactiveFunction};

/// Summary of one digest pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DigestReport {
    /// Changed nodes the pass started from, in marking order.
    pub sources: Vec<NodeId>,

    /// Every node the pass evaluated, in evaluation order.
    pub order: Vec<NodeId>,
}

impl DigestReport {
    /// Whether the pass had nothing to do.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

type DigestObserver = Rc<dyn Fn(&DigestReport)>;

struct EngineInner {
    config: EngineConfig,
    graph: RefCell<DependencyGraph>,
    registry: RefCell<NodeRegistry>,

    /// Nodes marked since the last drain, in marking order.
    changed: RefCell<IndexSet<NodeId>>,

    scheduler: DigestScheduler,

    /// Set while a digest pass is running its actions.
    digesting: Cell<bool>,

    /// Number of non-empty passes run so far.
    digests: Cell<usize>,

    observers: RefCell<Vec<DigestObserver>>,
}

/// Handle to a digest engine. Clones share the same engine.
///
/// # Example
///
/// ```rust
/// use ripple_core::digest::{Engine, FrameQueue};
/// use ripple_core::reactive::Property;
///
/// let frames = FrameQueue::new();
/// let engine = Engine::new(frames.clone());
///
/// let a = Property::new(5);
/// let b = Property::new(10);
/// let c = engine.derive((a.clone(), b.clone()), |(a, b)| a + b);
///
/// frames.run_frame();
/// assert_eq!(c.get(), Some(15));
///
/// a.set(6);
/// frames.run_frame();
/// assert_eq!(c.get(), Some(16));
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

/// Resets the in-digest flag when a pass ends, even by unwinding.
struct DigestGuard<'a> {
    digesting: &'a Cell<bool>,
}

impl<'a> DigestGuard<'a> {
    fn enter(digesting: &'a Cell<bool>) -> Self {
        digesting.set(true);
        Self { digesting }
    }
}

impl Drop for DigestGuard<'_> {
    fn drop(&mut self) {
        self.digesting.set(false);
    }
}

impl Engine {
    /// Create an engine with the default configuration.
    pub fn new<D>(defer: D) -> Self
    where
        D: Defer + 'static,
    {
        Self::with_config(defer, EngineConfig::default())
    }

    pub fn with_config<D>(defer: D, config: EngineConfig) -> Self
    where
        D: Defer + 'static,
    {
        Self {
            inner: Rc::new(EngineInner {
                config,
                graph: RefCell::new(DependencyGraph::new()),
                registry: RefCell::new(NodeRegistry::new()),
                changed: RefCell::new(IndexSet::new()),
                scheduler: DigestScheduler::new(Box::new(defer)),
                digesting: Cell::new(false),
                digests: Cell::new(0),
                observers: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Create a derived computation over an ordered list of dependencies.
    ///
    /// `dependencies` is a tuple of one to four dependencies (properties or
    /// other derived computations) or a `Vec` of one dependency type.
    /// `combine` receives their values in the same shape.
    pub fn derive<D, T, F>(&self, dependencies: D, combine: F) -> ReactiveFunction<T>
    where
        D: DependencyList,
        T: 'static,
        F: Fn(D::Values) -> T + 'static,
    {
        ReactiveFunction::new(self, dependencies, combine)
    }

    /// Create a derived computation over dependencies of one type, combined
    /// from a slice of their values.
    pub fn derive_all<D, T, F>(&self, dependencies: Vec<D>, combine: F) -> ReactiveFunction<T>
    where
        D: Dependency + 'static,
        T: 'static,
        F: Fn(&[D::Value]) -> T + 'static,
    {
        self.derive(dependencies, move |values: Vec<D::Value>| combine(&values))
    }

    /// Record that `to` depends on `from`.
    pub fn add_edge(&self, from: NodeId, to: NodeId) {
        self.inner.graph.borrow_mut().add_edge(from, to);
    }

    /// Register the recomputation action for `id`.
    pub fn register_action(&self, id: NodeId, action: Action) {
        self.inner.registry.borrow_mut().register(id, action);
    }

    /// Add `id` to the changed set. Marking twice is the same as once.
    pub fn mark_changed(&self, id: NodeId) {
        self.inner.changed.borrow_mut().insert(id);
    }

    /// Ask for a digest at the next scheduling opportunity.
    ///
    /// Requests are coalesced: however often this is called, one digest runs
    /// per window.
    pub fn request_digest(&self) {
        let engine = Rc::downgrade(&self.inner);
        self.inner.scheduler.request(move || {
            if let Some(inner) = engine.upgrade() {
                Engine { inner }.run_window();
            }
        });
    }

    /// Mark `id` changed and request a digest.
    pub fn node_changed(&self, id: NodeId) {
        self.mark_changed(id);
        self.request_digest();
    }

    /// A callback that reports `id` as changed to this engine.
    ///
    /// The callback holds the engine weakly, so properties that outlive the
    /// engine do not keep it alive.
    pub(crate) fn change_notifier(&self, id: NodeId) -> Rc<dyn Fn()> {
        let engine: Weak<EngineInner> = Rc::downgrade(&self.inner);
        Rc::new(move || {
            if let Some(inner) = engine.upgrade() {
                Engine { inner }.node_changed(id);
            }
        })
    }

    /// Run a digest pass now.
    ///
    /// Drains the changed set, sorts everything reachable from it, and runs
    /// each node's action in dependency order. Calling this while a pass is
    /// already running does not re-enter it; the outstanding changes are
    /// left for the next window and an empty report is returned.
    pub fn digest(&self) -> Result<DigestReport> {
        if self.inner.digesting.get() {
            self.request_digest();
            return Ok(DigestReport::default());
        }
        let sources = self.drain_changed();
        self.run_pass(sources)
    }

    /// Body of the deferred task.
    fn run_window(&self) {
        if self.inner.digesting.get() {
            self.inner.scheduler.close_window();
            self.request_digest();
            return;
        }

        let sources = self.drain_changed();
        self.inner.scheduler.close_window();
        if let Err(err) = self.run_pass(sources) {
            error!(%err, "deferred digest failed");
        }
    }

    fn drain_changed(&self) -> Vec<NodeId> {
        self.inner.changed.borrow_mut().drain(..).collect()
    }

    fn run_pass(&self, sources: Vec<NodeId>) -> Result<DigestReport> {
        if sources.is_empty() {
            trace!("digest skipped: nothing changed");
            return Ok(DigestReport::default());
        }

        let order = self
            .inner
            .graph
            .borrow()
            .try_topological_sort(&sources, self.inner.config.cycle_policy)?;
        debug!(sources = sources.len(), nodes = order.len(), "running digest");

        {
            let _guard = DigestGuard::enter(&self.inner.digesting);
            for &id in &order {
                let action = self.inner.registry.borrow().lookup(id);
                trace!(node = %id, "evaluating node");
                action();
            }
        }
        self.inner.digests.set(self.inner.digests.get() + 1);

        let report = DigestReport { sources, order };
        let observers = self.inner.observers.borrow().clone();
        for observer in observers {
            observer(&report);
        }
        Ok(report)
    }

    /// Call `observer` after every digest pass that evaluated something.
    pub fn after_digest<F>(&self, observer: F)
    where
        F: Fn(&DigestReport) + 'static,
    {
        self.inner.observers.borrow_mut().push(Rc::new(observer));
    }

    /// Number of non-empty digest passes run so far.
    pub fn digest_count(&self) -> usize {
        self.inner.digests.get()
    }

    /// Number of scheduling windows opened so far.
    pub fn window_count(&self) -> usize {
        self.inner.scheduler.windows()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.inner.scheduler.state()
    }

    /// Whether a deferred digest is pending.
    pub fn is_scheduled(&self) -> bool {
        self.inner.scheduler.is_scheduled()
    }

    /// Whether a digest pass is running right now.
    pub fn is_digesting(&self) -> bool {
        self.inner.digesting.get()
    }

    /// Nodes marked changed since the last drain, in marking order.
    pub fn pending_changes(&self) -> Vec<NodeId> {
        self.inner.changed.borrow().iter().copied().collect()
    }

    /// Topological order of everything reachable from `sources`, honoring
    /// the configured cycle policy.
    pub fn evaluation_order(&self, sources: &[NodeId]) -> Result<Vec<NodeId>> {
        self.inner
            .graph
            .borrow()
            .try_topological_sort(sources, self.inner.config.cycle_policy)
    }

    /// Capture the dependency graph for debugging dumps.
    pub fn graph_snapshot(&self) -> GraphSnapshot {
        self.inner.graph.borrow().snapshot()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("graph", &*self.inner.graph.borrow())
            .field("registry", &*self.inner.registry.borrow())
            .field("changed", &*self.inner.changed.borrow())
            .field("scheduler", &self.inner.scheduler)
            .field("digests", &self.inner.digests.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CyclePolicy;
    use crate::digest::FrameQueue;
    use crate::error::ReactiveError;
    use crate::reactive::Property;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn engine() -> (Engine, FrameQueue) {
        let frames = FrameQueue::new();
        (Engine::new(frames.clone()), frames)
    }

    #[test]
    fn mark_changed_is_idempotent() {
        let (engine, _) = engine();
        let id = NodeId::new();
        engine.mark_changed(id);
        engine.mark_changed(id);
        assert_eq!(engine.pending_changes(), vec![id]);
    }

    #[test]
    fn empty_digest_is_a_noop() {
        let (engine, _) = engine();
        let report = engine.digest().unwrap();
        assert!(report.is_empty());
        assert_eq!(engine.digest_count(), 0);
    }

    #[test]
    fn digest_runs_actions_in_dependency_order() {
        let (engine, _) = engine();
        let ids: Vec<NodeId> = (0..3).map(|_| NodeId::new()).collect();
        engine.add_edge(ids[0], ids[1]);
        engine.add_edge(ids[1], ids[2]);

        let log = Rc::new(RefCell::new(Vec::new()));
        for &id in ids.iter().rev() {
            let log = Rc::clone(&log);
            engine.register_action(id, Rc::new(move || log.borrow_mut().push(id)));
        }

        engine.mark_changed(ids[0]);
        let report = engine.digest().unwrap();
        assert_eq!(report.sources, vec![ids[0]]);
        assert_eq!(report.order, ids);
        assert_eq!(*log.borrow(), ids);
        assert!(engine.pending_changes().is_empty());
    }

    #[test]
    fn request_digest_defers_and_coalesces() {
        let (engine, frames) = engine();
        let id = NodeId::new();
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        engine.register_action(id, Rc::new(move || counter.set(counter.get() + 1)));

        engine.node_changed(id);
        engine.node_changed(id);
        engine.node_changed(id);

        assert!(engine.is_scheduled());
        assert_eq!(runs.get(), 0);
        assert_eq!(frames.pending(), 1);

        frames.run_frame();
        assert_eq!(runs.get(), 1);
        assert_eq!(engine.scheduler_state(), SchedulerState::Idle);
        assert_eq!(engine.window_count(), 1);
        assert_eq!(engine.digest_count(), 1);
    }

    #[test]
    fn marks_made_during_a_digest_open_the_next_window() {
        let (engine, frames) = engine();
        let first = NodeId::new();
        let second = NodeId::new();
        let runs = Rc::new(RefCell::new(Vec::new()));

        let handle = engine.clone();
        let log = Rc::clone(&runs);
        engine.register_action(
            first,
            Rc::new(move || {
                log.borrow_mut().push(first);
                handle.node_changed(second);
            }),
        );
        let log = Rc::clone(&runs);
        engine.register_action(second, Rc::new(move || log.borrow_mut().push(second)));

        engine.node_changed(first);
        frames.run_frame();
        assert_eq!(*runs.borrow(), vec![first]);
        assert_eq!(engine.pending_changes(), vec![second]);
        assert!(engine.is_scheduled());

        frames.run_frame();
        assert_eq!(*runs.borrow(), vec![first, second]);
        assert_eq!(engine.window_count(), 2);
        assert_eq!(frames.pending(), 0);
    }

    #[test]
    fn nested_digest_call_does_not_reenter() {
        let (engine, frames) = engine();
        let id = NodeId::new();
        let nested = Rc::new(RefCell::new(None));

        let handle = engine.clone();
        let slot = Rc::clone(&nested);
        engine.register_action(
            id,
            Rc::new(move || {
                handle.mark_changed(id);
                *slot.borrow_mut() = Some(handle.digest().unwrap());
            }),
        );

        engine.mark_changed(id);
        engine.digest().unwrap();

        assert_eq!(*nested.borrow(), Some(DigestReport::default()));
        assert_eq!(engine.pending_changes(), vec![id]);
        assert!(engine.is_scheduled());
        assert_eq!(frames.pending(), 1);
    }

    #[test]
    fn window_fired_during_a_pass_is_rescheduled() {
        let (engine, frames) = engine();
        let first = NodeId::new();
        let second = NodeId::new();
        let runs = Rc::new(RefCell::new(Vec::new()));

        let handle = engine.clone();
        let pump = frames.clone();
        let log = Rc::clone(&runs);
        engine.register_action(
            first,
            Rc::new(move || {
                log.borrow_mut().push(first);
                handle.node_changed(second);
                // The host loop runs a frame while this pass is still going.
                assert_eq!(pump.run_frame(), 1);
            }),
        );
        let log = Rc::clone(&runs);
        engine.register_action(second, Rc::new(move || log.borrow_mut().push(second)));

        engine.node_changed(first);
        frames.run_frame();
        assert_eq!(*runs.borrow(), vec![first]);
        assert_eq!(engine.pending_changes(), vec![second]);
        assert!(engine.is_scheduled());
        assert_eq!(frames.pending(), 1);
        assert_eq!(engine.window_count(), 3);

        frames.run_frame();
        assert_eq!(*runs.borrow(), vec![first, second]);
        assert_eq!(engine.scheduler_state(), SchedulerState::Idle);
        assert_eq!(engine.digest_count(), 2);
    }

    #[test]
    fn cycles_fail_the_digest_by_default() {
        let (engine, _) = engine();
        let a = NodeId::new();
        let b = NodeId::new();
        engine.add_edge(a, b);
        engine.add_edge(b, a);

        engine.mark_changed(a);
        let err = engine.digest().unwrap_err();
        assert!(matches!(err, ReactiveError::CyclicDependency { .. }));
        assert_eq!(engine.digest_count(), 0);
        assert!(!engine.is_digesting());
    }

    #[test]
    fn unchecked_policy_runs_cyclic_graphs() {
        let frames = FrameQueue::new();
        let config = EngineConfig::default().with_cycle_policy(CyclePolicy::Unchecked);
        let engine = Engine::with_config(frames, config);
        let a = NodeId::new();
        let b = NodeId::new();
        engine.add_edge(a, b);
        engine.add_edge(b, a);

        engine.mark_changed(a);
        let report = engine.digest().unwrap();
        assert_eq!(report.order.len(), 2);
    }

    #[test]
    fn failed_deferred_digest_returns_to_idle() {
        let (engine, frames) = engine();
        let a = NodeId::new();
        engine.add_edge(a, a);

        engine.node_changed(a);
        frames.run_frame();
        assert_eq!(engine.scheduler_state(), SchedulerState::Idle);
        assert!(engine.pending_changes().is_empty());

        engine.node_changed(a);
        assert!(engine.is_scheduled());
    }

    #[test]
    fn panicking_action_aborts_the_pass_and_restores_state() {
        let (engine, _) = engine();
        let ids: Vec<NodeId> = (0..3).map(|_| NodeId::new()).collect();
        engine.add_edge(ids[0], ids[1]);
        engine.add_edge(ids[1], ids[2]);

        let reached = Rc::new(Cell::new(false));
        engine.register_action(ids[1], Rc::new(|| panic!("action failure")));
        let flag = Rc::clone(&reached);
        engine.register_action(ids[2], Rc::new(move || flag.set(true)));

        engine.mark_changed(ids[0]);
        let result = catch_unwind(AssertUnwindSafe(|| engine.digest()));
        assert!(result.is_err());
        assert!(!reached.get());
        assert!(!engine.is_digesting());
        assert_eq!(engine.digest_count(), 0);

        // The engine keeps working afterwards.
        engine.mark_changed(ids[2]);
        engine.digest().unwrap();
        assert!(reached.get());
    }

    #[test]
    fn observers_see_every_non_empty_pass() {
        let (engine, _) = engine();
        let id = NodeId::new();
        let reports = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&reports);
        engine.after_digest(move |report| sink.borrow_mut().push(report.clone()));

        engine.digest().unwrap();
        assert!(reports.borrow().is_empty());

        engine.mark_changed(id);
        engine.digest().unwrap();
        assert_eq!(
            *reports.borrow(),
            vec![DigestReport {
                sources: vec![id],
                order: vec![id],
            }]
        );
    }

    #[test]
    fn dropped_engine_skips_its_pending_window() {
        let frames = FrameQueue::new();
        let engine = Engine::new(frames.clone());
        engine.node_changed(NodeId::new());
        drop(engine);

        assert_eq!(frames.run_frame(), 1);
    }

    #[test]
    fn snapshot_reflects_edges() {
        let (engine, _) = engine();
        let a = Property::new(1);
        let b = Property::new(2);
        let sum = engine.derive((a.clone(), b.clone()), |(a, b)| a + b);

        let snapshot = engine.graph_snapshot();
        assert_eq!(snapshot.node_count, 3);
        assert_eq!(snapshot.edges.len(), 2);
        assert!(snapshot.edges.iter().all(|edge| edge.to == sum.id()));
        assert_eq!(
            engine.evaluation_order(&[a.node_id()]).unwrap(),
            vec![a.node_id(), sum.id()]
        );
    }
}
