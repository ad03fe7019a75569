//! Ripple Core
//!
//! This crate provides reactive properties and a digest engine that
//! recomputes derived values in dependency order. It implements:
//!
//! - Properties with synchronous change listeners
//! - Derived computations over explicit, ordered dependency lists
//! - A dependency graph with depth-first topological ordering
//! - A debounced scheduler that batches changes into one digest per window
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Properties, listeners, and derived computations
//! - `graph`: Dependency topology and the recomputation action registry
//! - `digest`: The engine, its scheduler, and deferral primitives
//! - `config`: Engine settings
//!
//! # Example
//!
//! ```rust
//! use ripple_core::digest::{Engine, FrameQueue};
//! use ripple_core::reactive::Property;
//!
//! let frames = FrameQueue::new();
//! let engine = Engine::new(frames.clone());
//!
//! let a = Property::new(5);
//! let b = Property::new(10);
//! let c = engine.derive((a.clone(), b.clone()), |(a, b)| a + b);
//! let d = engine.derive((a.clone(), c.clone()), |(a, c)| a + c);
//!
//! // Nothing is computed until the next frame runs the digest.
//! assert_eq!(d.get(), None);
//! frames.run_frame();
//! assert_eq!((c.get(), d.get()), (Some(15), Some(20)));
//!
//! a.set(6);
//! frames.run_frame();
//! assert_eq!((c.get(), d.get()), (Some(16), Some(22)));
//! ```

pub mod config;
pub mod digest;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::{CyclePolicy, EngineConfig};
pub use digest::{DigestReport, Engine, FrameQueue, TokioDefer};
pub use error::{ReactiveError, Result};
pub use graph::NodeId;
pub use reactive::{Listener, Property, ReactiveFunction};
