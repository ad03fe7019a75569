//! Digest Engine
//!
//! This module batches property changes into digest passes that recompute
//! derived values in dependency order.
//!
//! # Concepts
//!
//! ## Windows
//!
//! The first change after the engine goes idle opens a window and defers one
//! digest. Every further change before that digest runs joins the same
//! window, so the digest only ever sees the final value of each property.
//!
//! ## Passes
//!
//! A pass drains the changed set, orders everything reachable from it with a
//! topological sort, and runs each node's recomputation action. Changes made
//! by the actions themselves are collected for the next window.
//!
//! ## Deferral
//!
//! The engine does not own an event loop. A [`Defer`] implementation decides
//! when deferred digests run: [`FrameQueue`] for host-driven frame loops and
//! [`TokioDefer`] for a tokio `LocalSet`.

mod defer;
mod engine;
mod scheduler;

pub use defer::{Defer, FrameQueue, Task, TokioDefer};
pub use engine::{DigestReport, Engine};
pub use scheduler::{DigestScheduler, SchedulerState};
