//! Dependencies of derived computations.
//!
//! [`Dependency`] is the seam between a derived computation and whatever it
//! reads from. [`DependencyList`] bundles an ordered list of them, either as a
//! tuple of differently typed dependencies or as a `Vec` of one type.

use std::rc::Rc;

use crate::graph::NodeId;

/// Something a derived computation can depend on.
pub trait Dependency {
    /// The value read from this dependency.
    type Value: Clone + 'static;

    /// The graph node of this dependency, allocated on first use.
    fn node_id(&self) -> NodeId;

    /// The dependency's current value, if it has one.
    fn current(&self) -> Option<Self::Value>;

    /// Arrange for `on_change` to run whenever this dependency is written.
    ///
    /// Dependencies without change notification (derived computations, whose
    /// dependents are reached through graph edges instead) ignore this.
    fn watch(&self, _on_change: Rc<dyn Fn()>) {}
}

/// An ordered list of dependencies read together by one combining function.
pub trait DependencyList: 'static {
    /// The values handed to the combining function.
    type Values;

    /// Node identifiers of every dependency, in order.
    fn node_ids(&self) -> Vec<NodeId>;

    /// Current values of every dependency, or `None` if any has no value.
    fn current(&self) -> Option<Self::Values>;

    /// Watch every dependency, building each callback from its node id.
    fn watch_each(&self, notifier: &dyn Fn(NodeId) -> Rc<dyn Fn()>);
}

macro_rules! impl_dependency_list {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name),+> DependencyList for ($($name,)+)
        where
            $($name: Dependency + 'static),+
        {
            type Values = ($($name::Value,)+);

            fn node_ids(&self) -> Vec<NodeId> {
                vec![$(self.$idx.node_id()),+]
            }

            fn current(&self) -> Option<Self::Values> {
                Some(($(self.$idx.current()?,)+))
            }

            fn watch_each(&self, notifier: &dyn Fn(NodeId) -> Rc<dyn Fn()>) {
                $(self.$idx.watch(notifier(self.$idx.node_id()));)+
            }
        }
    };
}

impl_dependency_list!(A: 0);
impl_dependency_list!(A: 0, B: 1);
impl_dependency_list!(A: 0, B: 1, C: 2);
impl_dependency_list!(A: 0, B: 1, C: 2, D: 3);

impl<D> DependencyList for Vec<D>
where
    D: Dependency + 'static,
{
    type Values = Vec<D::Value>;

    fn node_ids(&self) -> Vec<NodeId> {
        self.iter().map(Dependency::node_id).collect()
    }

    fn current(&self) -> Option<Self::Values> {
        self.iter().map(Dependency::current).collect()
    }

    fn watch_each(&self, notifier: &dyn Fn(NodeId) -> Rc<dyn Fn()>) {
        for dependency in self {
            dependency.watch(notifier(dependency.node_id()));
        }
    }
}
