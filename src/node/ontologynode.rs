use crate::node::internal::NodeInternal;
use crate::node::{NodeGroup, NodeId, OntologyType, Properties};
use crate::search::TsVector;
use crate::Ontology;
use crate::{PhenotagError, PhenotagResult};

/// The `OntologyNode` represents a single node of the [`Ontology`]
///
/// It is a cheap, read-only view borrowing the ontology, so it can walk to
/// parents and children.
#[derive(Debug, Clone, Copy)]
pub struct OntologyNode<'a> {
    node: &'a NodeInternal,
    ontology: &'a Ontology,
}

impl<'a> OntologyNode<'a> {
    /// Constructs a new [`OntologyNode`]
    ///
    /// # Errors
    ///
    /// If the given [`NodeId`] does not match an existing node
    /// it returns [`PhenotagError::NodeNotFound`]
    pub fn try_new(ontology: &'a Ontology, id: NodeId) -> PhenotagResult<OntologyNode<'a>> {
        let node = ontology.get(id).ok_or(PhenotagError::NodeNotFound(id))?;
        Ok(OntologyNode::new(ontology, node))
    }

    pub(crate) fn new(ontology: &'a Ontology, node: &'a NodeInternal) -> OntologyNode<'a> {
        OntologyNode { node, ontology }
    }

    /// Returns the [`NodeId`] of the node
    pub fn id(&self) -> NodeId {
        *self.node.id()
    }

    /// Returns the name of the node
    ///
    /// e.g.: `Diseases of the respiratory system`
    pub fn name(&self) -> &'a str {
        self.node.name()
    }

    /// Returns the [`OntologyType`] of the node
    pub fn type_id(&self) -> OntologyType {
        self.node.type_id()
    }

    /// Returns the open key-value properties of the node
    pub fn properties(&self) -> &'a Properties {
        self.node.properties()
    }

    /// Returns the optional external reference
    pub fn reference_id(&self) -> Option<i64> {
        self.node.reference_id()
    }

    /// Returns the [`NodeId`]s of the direct parents
    pub fn parent_ids(&self) -> &'a NodeGroup {
        self.node.parents()
    }

    /// Returns the [`NodeId`]s of the direct children
    pub fn children_ids(&self) -> &'a NodeGroup {
        self.node.children()
    }

    /// Returns an iterator of the direct parents of the node
    pub fn parents(&self) -> Nodes<'a> {
        Nodes::new(self.node.parents(), self.ontology)
    }

    /// Returns an iterator of the direct children of the node
    pub fn children(&self) -> Nodes<'a> {
        Nodes::new(self.node.children(), self.ontology)
    }

    /// Returns the number of direct children
    pub fn child_count(&self) -> usize {
        self.node.children().len()
    }

    /// Returns `true` if no edge points to the node
    pub fn is_root(&self) -> bool {
        self.node.parents().is_empty()
    }

    /// Returns `true` if no edge starts at the node
    pub fn is_leaf(&self) -> bool {
        self.node.children().is_empty()
    }

    /// Returns all direct and indirect parents
    pub fn ancestor_ids(&self) -> NodeGroup {
        self.ontology.ancestors(self.id())
    }

    /// Returns all direct and indirect children
    pub fn descendant_ids(&self) -> NodeGroup {
        self.ontology.descendants(self.id())
    }

    /// Returns `true` if `self` is a direct or indirect child of `other`
    pub fn child_of(&self, other: &OntologyNode<'_>) -> bool {
        self.ancestor_ids().contains(&other.id())
    }

    /// Returns `true` if `self` is a direct or indirect parent of `other`
    pub fn parent_of(&self, other: &OntologyNode<'_>) -> bool {
        other.child_of(self)
    }

    /// Returns the weighted search vector (name, code, relations, synonyms)
    pub fn search_vector(&self) -> &'a TsVector {
        self.node.search_vector()
    }

    /// Returns the synonyms vector
    pub fn synonyms_vector(&self) -> &'a TsVector {
        self.node.synonyms_vector()
    }

    /// Returns the relation vector (code, synonyms)
    pub fn relation_vector(&self) -> &'a TsVector {
        self.node.relation_vector()
    }
}

impl PartialEq for OntologyNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for OntologyNode<'_> {}

/// Iterator of [`OntologyNode`]s of a [`NodeGroup`]
pub struct Nodes<'a> {
    group: crate::node::Iter<'a>,
    ontology: &'a Ontology,
}

impl<'a> Nodes<'a> {
    /// Creates a new [`Nodes`] iterator
    pub fn new(group: &'a NodeGroup, ontology: &'a Ontology) -> Self {
        Nodes {
            group: group.iter(),
            ontology,
        }
    }
}

impl<'a> Iterator for Nodes<'a> {
    type Item = OntologyNode<'a>;
    fn next(&mut self) -> Option<Self::Item> {
        for id in self.group.by_ref() {
            if let Some(node) = self.ontology.node(id) {
                return Some(node);
            }
        }
        None
    }
}

impl std::fmt::Debug for Nodes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Nodes")
    }
}
