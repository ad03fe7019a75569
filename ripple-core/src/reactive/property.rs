//! Property Implementation
//!
//! A Property is the leaf reactive primitive: a value box with a getter, a
//! setter, and an ordered list of change listeners.
//!
//! # How Properties Work
//!
//! 1. `set` stores the new value, then synchronously invokes every listener
//!    in registration order before returning.
//!
//! 2. `on` registers a listener. If the property already holds a value, the
//!    listener is invoked with it right away, so late subscribers still see
//!    the current state.
//!
//! 3. `off` removes a listener by identity. Removing an unknown listener is a
//!    no-op.
//!
//! Properties do not know about the digest engine. Derived computations
//! subscribe to them and translate writes into change marks.
//!
//! # Failure Semantics
//!
//! A panicking listener unwinds out of `set` and the listeners after it do
//! not run for that write. The value is stored before any listener runs, and
//! no interior borrow is held while listeners execute, so the property stays
//! usable afterwards.

use std::cell::{OnceCell, RefCell};
use std::fmt::Debug;
use std::rc::Rc;

use super::dependency::Dependency;
use super::listener::Listener;
use crate::error::{ReactiveError, Result};
use crate::graph::NodeId;

struct PropertyInner<T> {
    /// Assigned the first time the property joins a dependency graph.
    node: OnceCell<NodeId>,

    /// `None` until a value is provided.
    value: RefCell<Option<T>>,

    /// Absent until the first listener registers.
    listeners: RefCell<Option<Vec<Listener<T>>>>,
}

/// A reactive property holding a value of type `T`.
///
/// Cloning a property produces another handle to the same value and
/// listeners.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{Listener, Property};
///
/// let count = Property::new(1);
/// count.on(Listener::new(|value: &i32| println!("count = {value}")));
/// count.set(2).set(3);
/// assert_eq!(count.get(), Some(3));
/// ```
pub struct Property<T> {
    inner: Rc<PropertyInner<T>>,
}

impl<T> Property<T>
where
    T: Clone + 'static,
{
    /// Create a property holding `value`.
    pub fn new(value: T) -> Self {
        Self::with_value(Some(value))
    }

    /// Create a property with no value.
    pub fn empty() -> Self {
        Self::with_value(None)
    }

    /// Create a property from an argument list of zero or one values.
    pub fn from_args(args: Vec<T>) -> Result<Self> {
        if args.len() > 1 {
            return Err(ReactiveError::arity("Property::new", "at most 1", args.len()));
        }
        Ok(Self::with_value(args.into_iter().next()))
    }

    fn with_value(value: Option<T>) -> Self {
        Self {
            inner: Rc::new(PropertyInner {
                node: OnceCell::new(),
                value: RefCell::new(value),
                listeners: RefCell::new(None),
            }),
        }
    }

    /// The node identifier of this property, allocated on first use.
    pub fn node_id(&self) -> NodeId {
        *self.inner.node.get_or_init(NodeId::new)
    }

    /// Get the current value, or `None` if no value was ever provided.
    pub fn get(&self) -> Option<T> {
        self.inner.value.borrow().clone()
    }

    /// Whether the property holds a value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// Store `value` and notify every listener with it.
    ///
    /// Returns `self` so writes can be chained.
    pub fn set(&self, value: T) -> &Self {
        *self.inner.value.borrow_mut() = Some(value.clone());

        for listener in self.listener_snapshot() {
            listener.notify(&value);
        }
        self
    }

    /// Getter-setter over an argument list.
    ///
    /// No arguments reads the value, one argument writes it (and returns the
    /// value just written), more than one is an error.
    pub fn set_args(&self, args: Vec<T>) -> Result<Option<T>> {
        match args.len() {
            0 => Ok(self.get()),
            1 => {
                let value = args.into_iter().next();
                if let Some(value) = value.clone() {
                    self.set(value);
                }
                Ok(value)
            }
            n => Err(ReactiveError::arity("Property::set", "at most 1", n)),
        }
    }

    /// Update the value using a function of the current one.
    ///
    /// Does nothing when the property has no value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = self.inner.value.borrow().as_ref().map(f);
        if let Some(next) = next {
            self.set(next);
        }
    }

    /// Register a listener and return it for later removal.
    ///
    /// If the property holds a value, the listener is invoked with it before
    /// this call returns.
    pub fn on(&self, listener: Listener<T>) -> Listener<T> {
        self.inner
            .listeners
            .borrow_mut()
            .get_or_insert_with(Vec::new)
            .push(listener.clone());

        let current = self.get();
        if let Some(value) = current {
            listener.notify(&value);
        }
        listener
    }

    /// Remove every registration of `listener`.
    pub fn off(&self, listener: &Listener<T>) {
        if let Some(listeners) = self.inner.listeners.borrow_mut().as_mut() {
            listeners.retain(|registered| registered != listener);
        }
    }

    /// Number of registered listeners, duplicates included.
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .borrow()
            .as_ref()
            .map_or(0, |listeners| listeners.len())
    }

    /// Listeners are cloned out so callbacks can freely call `on`, `off`, or
    /// `set` on this property.
    fn listener_snapshot(&self) -> Vec<Listener<T>> {
        self.inner.listeners.borrow().clone().unwrap_or_default()
    }
}

impl<T> Dependency for Property<T>
where
    T: Clone + 'static,
{
    type Value = T;

    fn node_id(&self) -> NodeId {
        Property::node_id(self)
    }

    fn current(&self) -> Option<T> {
        self.get()
    }

    fn watch(&self, on_change: Rc<dyn Fn()>) {
        self.on(Listener::new(move |_: &T| on_change()));
    }
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Property<T>
where
    T: Clone + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("node", &self.inner.node.get())
            .field("value", &self.get())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
