use tracing::trace;

use crate::{NodeGroup, NodeId, Ontology, PhenotagError, PhenotagResult};

/// The direct children of every node that has children
///
/// Parents are kept in ascending [`NodeId`] order. [`ReducibleIndex::reduce`]
/// always collapses the first parent in that order whose children are all
/// present, so the result of a reduction only depends on the ontology.
#[derive(Clone, Debug, Default)]
pub struct ReducibleIndex {
    parents: Vec<(NodeId, NodeGroup)>,
    max_depth: usize,
}

/// The outcome of [`ReducibleIndex::reduce`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reduction {
    /// The reduced label set
    pub labels: NodeGroup,
    /// Number of collapse steps performed
    pub steps: usize,
}

impl ReducibleIndex {
    /// Builds the index from the current state of the ontology
    pub fn new(ontology: &Ontology) -> Self {
        let parents: Vec<(NodeId, NodeGroup)> = ontology
            .iter()
            .filter(|node| !node.is_leaf())
            .map(|node| (node.id(), node.children_ids().clone()))
            .collect();
        trace!("Reducible index with {} parents", parents.len());
        Self {
            parents,
            max_depth: ontology.max_depth(),
        }
    }

    /// Returns the number of parents in the index
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Returns `true` if the ontology has no edges
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Collapses the label set upwards until no parent can be collapsed
    ///
    /// Whenever every child of a parent is part of the set, the children
    /// are replaced by the parent. This repeats until the set is stable.
    ///
    /// # Errors
    ///
    /// A node can only move up as often as the ontology is deep, so more
    /// than `|set| * (max_depth + 1)` steps indicate a corrupt index and
    /// return [`PhenotagError::DataIntegrity`]
    ///
    /// # Examples
    ///
    /// ```
    /// use phenotag::labeller::ReducibleIndex;
    /// use phenotag::{NodeGroup, Ontology, OntologyType, Properties};
    ///
    /// let mut ontology = Ontology::default();
    /// for name in ["A", "B", "C"] {
    ///     ontology
    ///         .insert_node(name, OntologyType::ClinicalDisease, Properties::new(), None)
    ///         .unwrap();
    /// }
    /// ontology.create_edge(1u32, 2u32).unwrap();
    /// ontology.create_edge(1u32, 3u32).unwrap();
    ///
    /// let index = ReducibleIndex::new(&ontology);
    ///
    /// let reduced = index.reduce(&NodeGroup::from(vec![2u32, 3u32])).unwrap();
    /// assert_eq!(reduced.labels, NodeGroup::from(vec![1u32]));
    ///
    /// let reduced = index.reduce(&NodeGroup::from(vec![2u32])).unwrap();
    /// assert_eq!(reduced.labels, NodeGroup::from(vec![2u32]));
    /// ```
    pub fn reduce(&self, set: &NodeGroup) -> PhenotagResult<Reduction> {
        let ceiling = set.len() * (self.max_depth + 1);
        let mut labels = set.clone();
        let mut steps = 0;
        while let Some((parent, children)) = self
            .parents
            .iter()
            .find(|(_, children)| children.is_subset(&labels))
        {
            if steps >= ceiling {
                return Err(PhenotagError::DataIntegrity {
                    entity: format!("reducible index at node {parent}"),
                    shape: format!("no fixpoint after {steps} steps"),
                });
            }
            labels = &labels - children;
            labels.insert(*parent);
            steps += 1;
        }
        Ok(Reduction { labels, steps })
    }
}
