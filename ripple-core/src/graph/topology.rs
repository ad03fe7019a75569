//! Dependency Topology
//!
//! The graph stores only edges. Node values and recomputation actions live
//! elsewhere (see [`NodeRegistry`](super::NodeRegistry)).
//!
//! # Algorithm
//!
//! Ordering is a depth-first search from the changed nodes followed by a
//! reversal:
//!
//! 1. Visit each source in order, skipping nodes that were already visited
//! 2. Follow out-edges (dependents) depth first
//! 3. Emit a node only after all of its reachable dependents were emitted
//! 4. Reverse the post-order, which puts every node before its dependents
//!
//! The traversal keeps an explicit stack instead of recursing, so long
//! dependency chains cannot exhaust the call stack.

use std::convert::Infallible;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use smallvec::SmallVec;

use super::node::NodeId;
use crate::config::CyclePolicy;
use crate::error::{ReactiveError, Result};

/// Out-edges of a single node. Most nodes have only a handful of dependents.
type Adjacency = SmallVec<[NodeId; 4]>;

/// Traversal state of a node during a depth-first search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

/// Directed adjacency structure over node identifiers.
///
/// An edge `(u, v)` means "`v` depends on `u`", so `u` must be evaluated
/// before `v`. Edges are never removed.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Out-edges keyed by source node, in insertion order.
    edges: IndexMap<NodeId, Adjacency>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            edges: IndexMap::new(),
        }
    }

    /// Record that `to` depends on `from`.
    ///
    /// No checking is done: self-loops and duplicate edges are kept as-is.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.adjacent(from).push(to);
    }

    /// Get or create the out-edge list for `node`.
    pub fn adjacent(&mut self, node: NodeId) -> &mut SmallVec<[NodeId; 4]> {
        self.edges.entry(node).or_default()
    }

    /// Get the out-edges of `node` without creating a record for it.
    pub fn out_edges(&self, node: NodeId) -> &[NodeId] {
        self.edges.get(&node).map(|edges| edges.as_slice()).unwrap_or(&[])
    }

    /// Depth-first post-order of every node reachable from `sources`.
    ///
    /// Each node appears once. Cycles are not reported; the visited set
    /// stops the traversal from re-entering them.
    pub fn depth_first_search(&self, sources: &[NodeId]) -> Vec<NodeId> {
        let mut state = IndexMap::new();
        let mut order = Vec::new();
        for &source in sources {
            match self.visit(source, &mut state, &mut order, |_| Ok::<(), Infallible>(())) {
                Ok(()) => {}
                Err(never) => match never {},
            }
        }
        order
    }

    /// Nodes reachable from `sources`, dependencies before dependents.
    pub fn topological_sort(&self, sources: &[NodeId]) -> Vec<NodeId> {
        let mut order = self.depth_first_search(sources);
        order.reverse();
        order
    }

    /// Depth-first post-order that honors the given cycle policy.
    pub fn try_depth_first_search(
        &self,
        sources: &[NodeId],
        policy: CyclePolicy,
    ) -> Result<Vec<NodeId>> {
        let mut state = IndexMap::new();
        let mut order = Vec::new();
        for &source in sources {
            self.visit(source, &mut state, &mut order, |node| match policy {
                CyclePolicy::Detect => Err(ReactiveError::CyclicDependency { node }),
                CyclePolicy::Unchecked => Ok(()),
            })?;
        }
        Ok(order)
    }

    /// Topological order that honors the given cycle policy.
    ///
    /// With [`CyclePolicy::Detect`], following an edge back into a node that
    /// is still on the traversal stack fails with
    /// [`ReactiveError::CyclicDependency`].
    pub fn try_topological_sort(
        &self,
        sources: &[NodeId],
        policy: CyclePolicy,
    ) -> Result<Vec<NodeId>> {
        let mut order = self.try_depth_first_search(sources, policy)?;
        order.reverse();
        Ok(order)
    }

    /// Visit `source` and everything reachable from it, appending finished
    /// nodes to `order`.
    ///
    /// `on_back_edge` is called with the target of every edge that leads back
    /// into a node still on the stack; an error from it stops the traversal.
    fn visit<E>(
        &self,
        source: NodeId,
        state: &mut IndexMap<NodeId, Visit>,
        order: &mut Vec<NodeId>,
        mut on_back_edge: impl FnMut(NodeId) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        if state.contains_key(&source) {
            return Ok(());
        }
        state.insert(source, Visit::InProgress);

        // Each frame holds a node and the index of its next out-edge.
        let mut stack: Vec<(NodeId, usize)> = vec![(source, 0)];
        while let Some(&(node, next)) = stack.last() {
            match self.out_edges(node).get(next).copied() {
                Some(child) => {
                    if let Some(frame) = stack.last_mut() {
                        frame.1 += 1;
                    }
                    match state.get(&child) {
                        None => {
                            state.insert(child, Visit::InProgress);
                            stack.push((child, 0));
                        }
                        Some(Visit::InProgress) => on_back_edge(child)?,
                        Some(Visit::Done) => {}
                    }
                }
                None => {
                    stack.pop();
                    state.insert(node, Visit::Done);
                    order.push(node);
                }
            }
        }
        Ok(())
    }

    /// Number of distinct nodes mentioned by any edge record.
    pub fn node_count(&self) -> usize {
        let mut nodes: IndexSet<NodeId> = IndexSet::new();
        for (from, targets) in &self.edges {
            nodes.insert(*from);
            nodes.extend(targets.iter().copied());
        }
        nodes.len()
    }

    /// Total number of edges, duplicates included.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|targets| targets.len()).sum()
    }

    /// Capture the current topology for debugging dumps.
    pub fn snapshot(&self) -> GraphSnapshot {
        let edges = self
            .edges
            .iter()
            .flat_map(|(from, targets)| {
                targets.iter().map(move |to| EdgeRecord {
                    from: *from,
                    to: *to,
                })
            })
            .collect();
        GraphSnapshot {
            node_count: self.node_count(),
            edges,
        }
    }
}

/// A single dependency edge in a [`GraphSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeRecord {
    pub from: NodeId,
    pub to: NodeId,
}

/// Serializable view of a [`DependencyGraph`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSnapshot {
    pub node_count: usize,
    pub edges: Vec<EdgeRecord>,
}

impl GraphSnapshot {
    /// Render the snapshot as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<NodeId> {
        (0..n).map(|_| NodeId::new()).collect()
    }

    #[test]
    fn chain_sorts_in_dependency_order() {
        let n = ids(3);
        let mut graph = DependencyGraph::new();
        graph.add_edge(n[0], n[1]);
        graph.add_edge(n[1], n[2]);

        assert_eq!(graph.topological_sort(&[n[0]]), vec![n[0], n[1], n[2]]);
    }

    #[test]
    fn depth_first_search_is_post_order() {
        let n = ids(3);
        let mut graph = DependencyGraph::new();
        graph.add_edge(n[0], n[1]);
        graph.add_edge(n[1], n[2]);

        assert_eq!(graph.depth_first_search(&[n[0]]), vec![n[2], n[1], n[0]]);
    }

    #[test]
    fn diamond_with_long_branch() {
        // 1 -> 2 -> 3 -> 4 -> 7 and 1 -> 6 -> 7
        let n = ids(8);
        let mut graph = DependencyGraph::new();
        graph.add_edge(n[1], n[2]);
        graph.add_edge(n[2], n[3]);
        graph.add_edge(n[3], n[4]);
        graph.add_edge(n[4], n[7]);
        graph.add_edge(n[1], n[6]);
        graph.add_edge(n[6], n[7]);

        let order = graph.topological_sort(&[n[1]]);
        assert_eq!(order, vec![n[1], n[6], n[2], n[3], n[4], n[7]]);
    }

    #[test]
    fn isolated_source_appears_alone() {
        let n = ids(1);
        let graph = DependencyGraph::new();
        assert_eq!(graph.topological_sort(&[n[0]]), vec![n[0]]);
    }

    #[test]
    fn shared_descendant_appears_once() {
        let n = ids(3);
        let mut graph = DependencyGraph::new();
        graph.add_edge(n[0], n[2]);
        graph.add_edge(n[1], n[2]);

        let order = graph.topological_sort(&[n[0], n[1]]);
        assert_eq!(order, vec![n[1], n[0], n[2]]);
    }

    #[test]
    fn duplicate_edges_are_kept_but_visited_once() {
        let n = ids(2);
        let mut graph = DependencyGraph::new();
        graph.add_edge(n[0], n[1]);
        graph.add_edge(n[0], n[1]);

        assert_eq!(graph.out_edges(n[0]), &[n[1], n[1]]);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.topological_sort(&[n[0]]), vec![n[0], n[1]]);
    }

    #[test]
    fn adjacent_creates_empty_record() {
        let n = ids(1);
        let mut graph = DependencyGraph::new();
        assert!(graph.out_edges(n[0]).is_empty());
        assert!(graph.adjacent(n[0]).is_empty());
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn every_edge_respects_order() {
        let n = ids(6);
        let edges = [(0, 1), (0, 2), (1, 3), (2, 3), (3, 4), (2, 5), (5, 4)];
        let mut graph = DependencyGraph::new();
        for (u, v) in edges {
            graph.add_edge(n[u], n[v]);
        }

        let order = graph.topological_sort(&[n[0]]);
        assert_eq!(order.len(), 6);
        let position = |id: NodeId| order.iter().position(|&x| x == id);
        for (u, v) in edges {
            assert!(position(n[u]) < position(n[v]));
        }
    }

    #[test]
    fn detect_policy_rejects_cycles() {
        let n = ids(3);
        let mut graph = DependencyGraph::new();
        graph.add_edge(n[0], n[1]);
        graph.add_edge(n[1], n[2]);
        graph.add_edge(n[2], n[0]);

        let err = graph
            .try_topological_sort(&[n[0]], CyclePolicy::Detect)
            .unwrap_err();
        assert!(matches!(err, ReactiveError::CyclicDependency { node } if node == n[0]));
    }

    #[test]
    fn detect_policy_rejects_self_loops() {
        let n = ids(1);
        let mut graph = DependencyGraph::new();
        graph.add_edge(n[0], n[0]);

        assert!(graph
            .try_topological_sort(&[n[0]], CyclePolicy::Detect)
            .is_err());
    }

    #[test]
    fn unchecked_policy_terminates_on_cycles() {
        let n = ids(2);
        let mut graph = DependencyGraph::new();
        graph.add_edge(n[0], n[1]);
        graph.add_edge(n[1], n[0]);

        let order = graph
            .try_topological_sort(&[n[0]], CyclePolicy::Unchecked)
            .unwrap();
        assert_eq!(order.len(), 2);
        assert_eq!(graph.topological_sort(&[n[0]]).len(), 2);
    }

    #[test]
    fn detect_policy_accepts_diamonds() {
        let n = ids(4);
        let mut graph = DependencyGraph::new();
        graph.add_edge(n[0], n[1]);
        graph.add_edge(n[0], n[2]);
        graph.add_edge(n[1], n[3]);
        graph.add_edge(n[2], n[3]);

        let order = graph
            .try_topological_sort(&[n[0]], CyclePolicy::Detect)
            .unwrap();
        assert_eq!(order.first(), Some(&n[0]));
        assert_eq!(order.last(), Some(&n[3]));
    }

    #[test]
    fn long_chains_do_not_overflow() {
        let n = ids(100_000);
        let mut graph = DependencyGraph::new();
        for pair in n.windows(2) {
            graph.add_edge(pair[0], pair[1]);
        }

        let order = graph.topological_sort(&[n[0]]);
        assert_eq!(order.len(), n.len());
        assert_eq!(order.first(), Some(&n[0]));
        assert_eq!(order.last(), n.last());
    }

    #[test]
    fn snapshot_lists_edges() {
        let n = ids(3);
        let mut graph = DependencyGraph::new();
        graph.add_edge(n[0], n[1]);
        graph.add_edge(n[0], n[2]);

        let snapshot = graph.snapshot();
        assert_eq!(snapshot.node_count, 3);
        assert_eq!(
            snapshot.edges,
            vec![
                EdgeRecord { from: n[0], to: n[1] },
                EdgeRecord { from: n[0], to: n[2] },
            ]
        );

        let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(json["edges"][0]["from"], n[0].raw());
    }
}
