//! Upward walks from a node to the roots of the ontology
//!
//! Two different paths are derived from the same walk: the detail view
//! shows the *shortest* path from every reachable root, while a UI
//! selection is pre-expanded along the *longest* path.

use std::collections::HashMap;

use serde::Serialize;

use crate::{NodeId, Ontology};

/// A path from a root down to a node
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RootPath {
    root: NodeId,
    depth: usize,
    path: Vec<NodeId>,
}

impl RootPath {
    /// The root the path starts at
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of edges between the root and the node
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// All nodes of the path, starting with the root and ending with the node
    pub fn path(&self) -> &[NodeId] {
        &self.path
    }
}

/// The shortest path from every root reachable from `id`
///
/// The walk proceeds level by level. Within one level nodes are expanded in
/// ascending id order, so every ancestor remembers the smallest-id node it
/// was first reached from. Paths are sorted by depth, then by root id.
///
/// A root node has exactly one path of depth `0` consisting of itself.
pub(crate) fn shortest_root_paths(ontology: &Ontology, id: NodeId) -> Vec<RootPath> {
    let mut towards_node: HashMap<NodeId, NodeId> = HashMap::new();
    let mut depth_of: HashMap<NodeId, usize> = HashMap::from([(id, 0)]);
    let mut roots: Vec<NodeId> = Vec::new();

    let mut frontier = vec![id];
    let mut depth = 0;
    while !frontier.is_empty() {
        frontier.sort_unstable();
        let mut next = Vec::new();
        for current in &frontier {
            let Some(node) = ontology.get(*current) else {
                continue;
            };
            if node.parents().is_empty() {
                roots.push(*current);
            }
            for parent in node.parents() {
                if depth_of.contains_key(&parent) {
                    continue;
                }
                depth_of.insert(parent, depth + 1);
                towards_node.insert(parent, *current);
                next.push(parent);
            }
        }
        frontier = next;
        depth += 1;
    }

    let mut paths: Vec<RootPath> = roots
        .into_iter()
        .map(|root| {
            let mut path = vec![root];
            let mut step = root;
            while let Some(child) = towards_node.get(&step) {
                path.push(*child);
                step = *child;
            }
            RootPath {
                root,
                depth: depth_of.get(&root).copied().unwrap_or_default(),
                path,
            }
        })
        .collect();
    paths.sort_by_key(|path| (path.depth, path.root));
    paths
}

/// Memoised longest walk to a root
///
/// For every node the cache stores the length of the longest upward path
/// and the parent that continues it. Equally long alternatives resolve to
/// the smallest parent id.
#[derive(Default)]
pub(crate) struct LongestPaths {
    cache: HashMap<NodeId, (usize, Option<NodeId>)>,
}

impl LongestPaths {
    /// Returns the longest path `[root, .., id]`
    pub fn path(&mut self, ontology: &Ontology, id: NodeId) -> Vec<NodeId> {
        self.fill(ontology, id);
        let mut path = vec![id];
        let mut step = id;
        while let Some((_, Some(parent))) = self.cache.get(&step) {
            path.push(*parent);
            step = *parent;
        }
        path.reverse();
        path
    }

    /// Populates the cache for `id` and all its ancestors
    ///
    /// Uses an explicit stack instead of recursion.
    fn fill(&mut self, ontology: &Ontology, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.last().copied() {
            if self.cache.contains_key(&current) {
                stack.pop();
                continue;
            }
            let parents = match ontology.get(current) {
                Some(node) => node.parents(),
                None => {
                    self.cache.insert(current, (0, None));
                    stack.pop();
                    continue;
                }
            };
            let pending: Vec<NodeId> = parents
                .iter()
                .filter(|parent| !self.cache.contains_key(parent))
                .collect();
            if !pending.is_empty() {
                stack.extend(pending);
                continue;
            }

            let mut best: (usize, Option<NodeId>) = (0, None);
            for parent in parents {
                let length = self.cache.get(&parent).map_or(0, |entry| entry.0) + 1;
                if length > best.0 {
                    best = (length, Some(parent));
                }
            }
            self.cache.insert(current, best);
            stack.pop();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{OntologyType, Properties};

    /// ```text
    ///   1     2
    ///   |   / |
    ///   3  /  4
    ///   | /   |
    ///   5     6
    ///    \   /
    ///      7
    /// ```
    fn ontology() -> Ontology {
        let mut ontology = Ontology::default();
        for name in ["1", "2", "3", "4", "5", "6", "7"] {
            ontology
                .insert_node(name, OntologyType::ClinicalDomain, Properties::new(), None)
                .unwrap();
        }
        for (parent, child) in [(1u32, 3u32), (2, 4), (2, 5), (3, 5), (4, 6), (5, 7), (6, 7)] {
            ontology.create_edge(parent, child).unwrap();
        }
        ontology
    }

    fn ids(ids: &[u32]) -> Vec<NodeId> {
        ids.iter().copied().map(NodeId::from).collect()
    }

    #[test]
    fn shortest_paths() {
        let ontology = ontology();
        let paths = shortest_root_paths(&ontology, 7u32.into());
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].root(), 2u32);
        assert_eq!(paths[0].depth(), 2);
        assert_eq!(paths[0].path(), ids(&[2, 5, 7]));
        assert_eq!(paths[1].root(), 1u32);
        assert_eq!(paths[1].depth(), 3);
        assert_eq!(paths[1].path(), ids(&[1, 3, 5, 7]));
    }

    #[test]
    fn root_has_empty_path() {
        let ontology = ontology();
        let paths = shortest_root_paths(&ontology, 1u32.into());
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].depth(), 0);
        assert_eq!(paths[0].path(), ids(&[1]));
    }

    #[test]
    fn longest_path() {
        let ontology = ontology();
        let mut paths = LongestPaths::default();
        // 1-3-5-7 and 2-4-6-7 are equally long; 5 < 6 wins
        assert_eq!(paths.path(&ontology, 7u32.into()), ids(&[1, 3, 5, 7]));
        assert_eq!(paths.path(&ontology, 2u32.into()), ids(&[2]));
    }
}
