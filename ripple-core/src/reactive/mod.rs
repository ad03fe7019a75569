//! Reactive Primitives
//!
//! This module implements properties and the derived computations built on
//! top of them.
//!
//! # Concepts
//!
//! ## Properties
//!
//! A Property is a container for mutable state with synchronous change
//! listeners. It knows nothing about dependency graphs; it just calls its
//! listeners on every write.
//!
//! ## Reactive Functions
//!
//! A ReactiveFunction is a derived value computed from an explicit, ordered
//! list of dependencies. Dependencies are declared up front rather than
//! tracked automatically, so the graph is fixed once the function exists.
//!
//! ## Dynamic Values
//!
//! [`DynamicProperty`] and [`derive_dynamic`] accept loosely typed argument
//! lists of JSON values, checking argument counts and listener arguments at
//! runtime the way a scripting front end would.

mod dependency;
mod dynamic;
mod function;
mod listener;
mod property;

pub use dependency::{Dependency, DependencyList};
pub use dynamic::{derive_dynamic, Arg, DynamicProperty, DynamicSource};
pub use function::ReactiveFunction;
pub use listener::{Listener, ListenerId};
pub use property::Property;
