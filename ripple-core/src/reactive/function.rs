//! Reactive Function Implementation
//!
//! A ReactiveFunction is a derived value: a combining function applied to the
//! current values of an ordered list of dependencies.
//!
//! # How Reactive Functions Work
//!
//! 1. On construction the function gets a node, an edge from every
//!    dependency's node to its own, and a recomputation action in the
//!    engine's registry.
//!
//! 2. Each dependency that supports change notification gets a listener that
//!    marks the dependency changed and requests a digest.
//!
//! 3. During a digest the action reads every dependency and stores the
//!    combined result. Until then `get` returns the last computed value.
//!
//! The action does nothing while any dependency is still without a value, so
//! a derived value never observes a half-initialized set of inputs. A
//! function whose dependencies all have values when it is created is marked
//! changed right away and computes in the next window.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::Rc;

use tracing::trace;

use super::dependency::{Dependency, DependencyList};
use crate::digest::Engine;
use crate::graph::{Action, NodeId};

struct FunctionInner<T> {
    id: NodeId,

    /// Node IDs of the dependencies, in declaration order.
    dependencies: Vec<NodeId>,

    /// The last computed value (None if never computed).
    value: RefCell<Option<T>>,

    /// Number of times the combining function has run.
    evaluations: Cell<usize>,
}

/// A derived value recomputed by the digest engine.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value.
pub struct ReactiveFunction<T> {
    inner: Rc<FunctionInner<T>>,
}

impl<T> ReactiveFunction<T>
where
    T: 'static,
{
    pub(crate) fn new<D, F>(engine: &Engine, dependencies: D, combine: F) -> Self
    where
        D: DependencyList,
        F: Fn(D::Values) -> T + 'static,
    {
        let id = NodeId::new();
        let dependency_ids = dependencies.node_ids();
        for &dependency in &dependency_ids {
            engine.add_edge(dependency, id);
        }

        let inner = Rc::new(FunctionInner {
            id,
            dependencies: dependency_ids,
            value: RefCell::new(None),
            evaluations: Cell::new(0),
        });

        let target = Rc::clone(&inner);
        let dependencies = Rc::new(dependencies);
        let inputs = Rc::clone(&dependencies);
        let action: Action = Rc::new(move || match inputs.current() {
            Some(values) => {
                let value = combine(values);
                *target.value.borrow_mut() = Some(value);
                target.evaluations.set(target.evaluations.get() + 1);
                trace!(node = %target.id, "recomputed derived value");
            }
            None => {
                trace!(node = %target.id, "skipped recompute: a dependency has no value");
            }
        });
        engine.register_action(id, action);

        dependencies.watch_each(&|dependency| engine.change_notifier(dependency));

        // Derived inputs never announce themselves, so a node built on values
        // that are already settled schedules its own first computation.
        if dependencies.current().is_some() {
            engine.node_changed(id);
        }

        Self { inner }
    }

    /// Get the node identifier.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Node identifiers of the dependencies, in order.
    pub fn dependencies(&self) -> &[NodeId] {
        &self.inner.dependencies
    }

    /// Check if the function has a computed value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// Number of times the combining function has run.
    pub fn evaluation_count(&self) -> usize {
        self.inner.evaluations.get()
    }
}

impl<T> ReactiveFunction<T>
where
    T: Clone + 'static,
{
    /// Get the last computed value.
    ///
    /// This is stale until the first digest that includes this node has run.
    pub fn get(&self) -> Option<T> {
        self.inner.value.borrow().clone()
    }
}

impl<T> Dependency for ReactiveFunction<T>
where
    T: Clone + 'static,
{
    type Value = T;

    fn node_id(&self) -> NodeId {
        self.inner.id
    }

    fn current(&self) -> Option<T> {
        self.get()
    }
}

impl<T> Clone for ReactiveFunction<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for ReactiveFunction<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveFunction")
            .field("id", &self.inner.id)
            .field("dependencies", &self.inner.dependencies)
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
