use std::collections::btree_map::{Values, ValuesMut};
use std::collections::BTreeMap;

use crate::node::internal::NodeInternal;
use crate::NodeId;

/// Node storage ordered by [`NodeId`]
///
/// Iteration order is ascending by id, which keeps every derived listing
/// (roots, reducible parents, DOT output) stable across runs.
#[derive(Clone, Default)]
pub(crate) struct Arena {
    nodes: BTreeMap<NodeId, NodeInternal>,
}

impl Arena {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn insert(&mut self, node: NodeInternal) {
        self.nodes.insert(*node.id(), node);
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeInternal> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeInternal> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn values(&self) -> Values<'_, NodeId, NodeInternal> {
        self.nodes.values()
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, NodeId, NodeInternal> {
        self.nodes.values_mut()
    }

    /// The id following the largest id in use, starting at `1`
    pub fn next_id(&self) -> NodeId {
        self.nodes
            .keys()
            .next_back()
            .map_or(NodeId::from(1u32), NodeId::next)
    }
}
