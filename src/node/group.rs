use std::collections::HashSet;
use std::ops::{BitAnd, BitOr, Sub};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{NodeId, Ontology, OntologyNode};

/// A set of [`NodeId`]s
///
/// Each node can occur only once in the group and the ids are kept in
/// ascending order, so iteration order is deterministic.
///
/// The group is used for parents and children of a node, for the candidate
/// and reduced label sets of a phenotype and for every other set-based
/// operation on the ontology.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<NodeId>", into = "Vec<NodeId>")]
pub struct NodeGroup {
    ids: SmallVec<[NodeId; crate::DEFAULT_NUM_CHILDREN]>,
}

impl NodeGroup {
    /// Constructs a new, empty [`NodeGroup`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a new, empty [`NodeGroup`] with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: SmallVec::with_capacity(capacity),
        }
    }

    /// Returns `true` if the group contains no [`NodeId`]s
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the number of [`NodeId`]s in the group
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Adds a new [`NodeId`] to the group
    ///
    /// Returns whether the `NodeId` was newly inserted.
    ///
    /// # Examples
    ///
    /// ```
    /// use phenotag::NodeGroup;
    ///
    /// let mut group = NodeGroup::new();
    /// assert!(group.insert(2u32));
    /// assert!(group.insert(1u32));
    /// assert!(!group.insert(2u32));
    /// assert_eq!(group.len(), 2);
    /// assert_eq!(group.first().unwrap().as_u32(), 1);
    /// ```
    pub fn insert<I: Into<NodeId>>(&mut self, id: I) -> bool {
        let id = id.into();
        match self.ids.binary_search(&id) {
            Ok(_) => false,
            Err(idx) => {
                self.ids.insert(idx, id);
                true
            }
        }
    }

    /// Removes the [`NodeId`] from the group
    ///
    /// Returns whether the `NodeId` was present
    pub fn remove(&mut self, id: &NodeId) -> bool {
        match self.ids.binary_search(id) {
            Ok(idx) => {
                self.ids.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// Adds a new [`NodeId`] to the end of the group
    ///
    /// # Note
    ///
    /// This method does not check sort order or uniqueness. It must only
    /// be used when ids are added in strictly ascending order.
    fn insert_unchecked(&mut self, id: NodeId) {
        self.ids.push(id);
    }

    /// Returns `true` if the group contains the [`NodeId`]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.ids.binary_search(id).is_ok()
    }

    /// Returns `true` if every id of `self` is also part of `other`
    pub fn is_subset(&self, other: &NodeGroup) -> bool {
        if self.len() > other.len() {
            return false;
        }
        self.ids.iter().all(|id| other.contains(id))
    }

    /// Returns the smallest [`NodeId`] of the group
    pub fn first(&self) -> Option<&NodeId> {
        self.ids.first()
    }

    /// Returns an Iterator of the [`NodeId`]s inside the group
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.ids.iter(),
        }
    }

    /// Returns the ids as a slice, in ascending order
    pub fn as_slice(&self) -> &[NodeId] {
        &self.ids
    }

    /// Returns an iterator of [`OntologyNode`]s of the group
    ///
    /// Ids that are not present in the ontology are skipped
    pub fn nodes<'a>(&'a self, ontology: &'a Ontology) -> impl Iterator<Item = OntologyNode<'a>> {
        self.iter().filter_map(|id| ontology.node(id))
    }
}

impl From<HashSet<NodeId>> for NodeGroup {
    fn from(s: HashSet<NodeId>) -> Self {
        s.into_iter().collect()
    }
}

impl From<Vec<NodeId>> for NodeGroup {
    fn from(v: Vec<NodeId>) -> Self {
        v.into_iter().collect()
    }
}

impl From<Vec<u32>> for NodeGroup {
    fn from(v: Vec<u32>) -> Self {
        v.into_iter().map(NodeId::from).collect()
    }
}

impl From<NodeGroup> for Vec<NodeId> {
    fn from(group: NodeGroup) -> Self {
        group.ids.into_vec()
    }
}

impl FromIterator<NodeId> for NodeGroup {
    fn from_iter<T: IntoIterator<Item = NodeId>>(iter: T) -> Self {
        let mut ids: SmallVec<[NodeId; crate::DEFAULT_NUM_CHILDREN]> = iter.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }
}

impl<'a> IntoIterator for &'a NodeGroup {
    type Item = NodeId;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// An iterator over [`NodeId`]s
pub struct Iter<'a> {
    inner: std::slice::Iter<'a, NodeId>,
}

impl Iterator for Iter<'_> {
    type Item = NodeId;
    fn next(&mut self) -> Option<NodeId> {
        self.inner.next().copied()
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<NodeId> {
        self.inner.next_back().copied()
    }
}

impl BitOr for &NodeGroup {
    type Output = NodeGroup;

    fn bitor(self, rhs: &NodeGroup) -> NodeGroup {
        let mut group = NodeGroup::with_capacity(self.len() + rhs.len());
        let (mut left, mut right) = (self.ids.iter().peekable(), rhs.ids.iter().peekable());
        loop {
            let next = match (left.peek(), right.peek()) {
                (Some(l), Some(r)) if l < r => left.next(),
                (Some(l), Some(r)) if l > r => right.next(),
                (Some(_), Some(_)) => {
                    right.next();
                    left.next()
                }
                (Some(_), None) => left.next(),
                (None, Some(_)) => right.next(),
                (None, None) => break,
            };
            if let Some(id) = next {
                group.insert_unchecked(*id);
            }
        }
        group
    }
}

impl BitAnd for &NodeGroup {
    type Output = NodeGroup;

    fn bitand(self, rhs: &NodeGroup) -> NodeGroup {
        let mut group = NodeGroup::with_capacity(self.len().min(rhs.len()));
        for id in &self.ids {
            if rhs.contains(id) {
                group.insert_unchecked(*id);
            }
        }
        group
    }
}

impl Sub for &NodeGroup {
    type Output = NodeGroup;

    fn sub(self, rhs: &NodeGroup) -> NodeGroup {
        let mut group = NodeGroup::with_capacity(self.len());
        for id in &self.ids {
            if !rhs.contains(id) {
                group.insert_unchecked(*id);
            }
        }
        group
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn group(ids: &[u32]) -> NodeGroup {
        ids.iter().copied().map(NodeId::from).collect()
    }

    #[test]
    fn iterate_sorted() {
        let g = group(&[3, 1, 2, 3]);
        let ids: Vec<u32> = g.iter().map(|id| id.as_u32()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn remove_ids() {
        let mut g = group(&[1, 2, 3]);
        assert!(g.remove(&2u32.into()));
        assert!(!g.remove(&2u32.into()));
        assert_eq!(g, group(&[1, 3]));
    }

    #[test]
    fn bitor() {
        let result = &group(&[1, 2, 3]) | &group(&[2, 4, 5]);
        assert_eq!(result, group(&[1, 2, 3, 4, 5]));
        assert_eq!(&NodeGroup::new() | &group(&[7]), group(&[7]));
    }

    #[test]
    fn bitand_and_sub() {
        let a = group(&[1, 2, 3, 6]);
        let b = group(&[2, 3, 4]);
        assert_eq!(&a & &b, group(&[2, 3]));
        assert_eq!(&a - &b, group(&[1, 6]));
        assert_eq!(&b - &a, group(&[4]));
    }

    #[test]
    fn subsets() {
        assert!(group(&[2, 3]).is_subset(&group(&[1, 2, 3])));
        assert!(!group(&[2, 4]).is_subset(&group(&[1, 2, 3])));
        assert!(NodeGroup::new().is_subset(&group(&[1])));
        assert!(!group(&[1, 2]).is_subset(&group(&[1])));
    }

    #[test]
    fn serde_as_list() {
        let json = serde_json::to_string(&group(&[5, 1])).unwrap();
        assert_eq!(json, "[1,5]");
        let g: NodeGroup = serde_json::from_str("[4,2,2]").unwrap();
        assert_eq!(g, group(&[2, 4]));
    }
}
