//! Dynamically typed properties and derived values.
//!
//! Values are [`serde_json::Value`]s and operations take argument lists, so
//! argument counts and listener arguments are checked at runtime and
//! reported as [`ReactiveError::InvalidArity`] and
//! [`ReactiveError::InvalidListener`].

use std::rc::Rc;

use serde_json::Value;

use super::dependency::Dependency;
use super::function::ReactiveFunction;
use super::listener::Listener;
use super::property::Property;
use crate::digest::Engine;
use crate::error::{ReactiveError, Result};
use crate::graph::NodeId;

/// One argument passed to a dynamic operation.
#[derive(Debug, Clone)]
pub enum Arg {
    Value(Value),
    Listener(Listener<Value>),
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Listener<Value>> for Arg {
    fn from(listener: Listener<Value>) -> Self {
        Self::Listener(listener)
    }
}

/// A JSON-valued property driven through argument lists.
#[derive(Debug, Clone)]
pub struct DynamicProperty {
    property: Property<Value>,
}

impl DynamicProperty {
    /// Create a property from zero or one initial values.
    pub fn new(args: Vec<Value>) -> Result<Self> {
        Ok(Self {
            property: Property::from_args(args)?,
        })
    }

    /// Getter-setter: no arguments reads, one argument writes.
    ///
    /// A write returns the value just written.
    pub fn call(&self, args: Vec<Value>) -> Result<Option<Value>> {
        self.property.set_args(args)
    }

    pub fn get(&self) -> Option<Value> {
        self.property.get()
    }

    /// Register the single listener in `args`.
    pub fn on(&self, args: Vec<Arg>) -> Result<Listener<Value>> {
        let mut args = args.into_iter();
        match (args.next(), args.len()) {
            (Some(Arg::Listener(listener)), 0) => Ok(self.property.on(listener)),
            (Some(Arg::Value(_)), 0) => Err(ReactiveError::InvalidListener {
                operation: "DynamicProperty::on",
            }),
            (first, rest) => Err(ReactiveError::arity(
                "DynamicProperty::on",
                "exactly 1",
                usize::from(first.is_some()) + rest,
            )),
        }
    }

    pub fn off(&self, listener: &Listener<Value>) {
        self.property.off(listener);
    }

    /// The underlying typed property.
    pub fn property(&self) -> &Property<Value> {
        &self.property
    }
}

/// A dependency of a dynamically typed derived value.
#[derive(Debug, Clone)]
pub enum DynamicSource {
    Property(Property<Value>),
    Function(ReactiveFunction<Value>),
}

impl From<DynamicProperty> for DynamicSource {
    fn from(property: DynamicProperty) -> Self {
        Self::Property(property.property)
    }
}

impl From<Property<Value>> for DynamicSource {
    fn from(property: Property<Value>) -> Self {
        Self::Property(property)
    }
}

impl From<ReactiveFunction<Value>> for DynamicSource {
    fn from(function: ReactiveFunction<Value>) -> Self {
        Self::Function(function)
    }
}

impl Dependency for DynamicSource {
    type Value = Value;

    fn node_id(&self) -> NodeId {
        match self {
            Self::Property(property) => property.node_id(),
            Self::Function(function) => function.id(),
        }
    }

    fn current(&self) -> Option<Value> {
        match self {
            Self::Property(property) => property.get(),
            Self::Function(function) => function.get(),
        }
    }

    fn watch(&self, on_change: Rc<dyn Fn()>) {
        if let Self::Property(property) = self {
            property.watch(on_change);
        }
    }
}

/// Create a derived value whose combining function takes `arity` values.
///
/// Fails with [`ReactiveError::InvalidArity`] unless there is exactly one
/// dependency per combining-function argument.
pub fn derive_dynamic<F>(
    engine: &Engine,
    dependencies: Vec<DynamicSource>,
    arity: usize,
    combine: F,
) -> Result<ReactiveFunction<Value>>
where
    F: Fn(&[Value]) -> Value + 'static,
{
    if dependencies.len() != arity {
        return Err(ReactiveError::arity(
            "derive_dynamic",
            arity.to_string(),
            dependencies.len(),
        ));
    }
    Ok(engine.derive_all(dependencies, combine))
}
