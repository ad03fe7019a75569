//! Dependency Graph
//!
//! This module implements the topology that orders recomputation during a
//! digest, plus the table of recomputation actions keyed by node.
//!
//! # Overview
//!
//! The dependency graph is a directed graph where:
//!
//! - Nodes are properties (sources) or derived computations
//! - Edges point from a dependency to its dependent: if A depends on B,
//!   there is an edge from B to A
//!
//! When properties change, the digest engine asks the graph for the
//! topological order of everything reachable from the changed nodes and then
//! runs each node's registered action in that order.
//!
//! # Design Decisions
//!
//! 1. The graph is a pure topology. It never stores node values, so the same
//!    structure serves typed and dynamically typed nodes alike.
//!
//! 2. Edges are only ever added. There is no teardown of dependencies.
//!
//! 3. Only forward edges (dependents) are stored. Traversal always starts at
//!    the changed sources and walks towards dependents.

mod node;
mod registry;
mod topology;

pub use node::NodeId;
pub use registry::{Action, NodeRegistry};
pub use topology::{DependencyGraph, EdgeRecord, GraphSnapshot};
