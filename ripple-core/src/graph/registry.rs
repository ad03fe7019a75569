//! Node Registry
//!
//! Maps node identifiers to the action that recomputes the node during a
//! digest. Source properties never register an action and are treated as
//! no-op leaves.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::node::NodeId;

/// A zero-argument recomputation action.
///
/// Actions read their dependencies' current values and write the node's own
/// stored value.
pub type Action = Rc<dyn Fn()>;

/// Recomputation actions keyed by node.
#[derive(Default)]
pub struct NodeRegistry {
    actions: HashMap<NodeId, Action>,
}

impl NodeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Associate `action` with `id`, replacing any earlier registration.
    pub fn register(&mut self, id: NodeId, action: Action) {
        self.actions.insert(id, action);
    }

    /// The action registered for `id`, or a no-op when there is none.
    pub fn lookup(&self, id: NodeId) -> Action {
        match self.actions.get(&id) {
            Some(action) => Rc::clone(action),
            None => Rc::new(|| {}),
        }
    }

    /// Whether `id` has a registered action.
    pub fn contains(&self, id: NodeId) -> bool {
        self.actions.contains_key(&id)
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("actions", &self.actions.len())
            .finish()
    }
}
