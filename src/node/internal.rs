use serde::{Deserialize, Serialize};

use crate::node::{NodeGroup, NodeId, OntologyType, Properties};
use crate::search::index::{node_relation_vector, node_search_vector};
use crate::search::TsVector;
use crate::{DEFAULT_NUM_CHILDREN, DEFAULT_NUM_PARENTS};

/// The stored row of an ontology node
///
/// `parents` and `children` are caches of the edge table and are rebuilt
/// whenever the ontology is loaded. `relation_vector` and `search_vector`
/// are derived columns, maintained by [`NodeInternal::refresh_vectors`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NodeInternal {
    id: NodeId,
    name: String,
    type_id: OntologyType,
    #[serde(default)]
    properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reference_id: Option<i64>,
    #[serde(default)]
    synonyms_vector: TsVector,
    #[serde(default)]
    relation_vector: TsVector,
    #[serde(default)]
    search_vector: TsVector,
    #[serde(skip)]
    parents: NodeGroup,
    #[serde(skip)]
    children: NodeGroup,
}

impl NodeInternal {
    pub fn new(
        id: NodeId,
        name: String,
        type_id: OntologyType,
        properties: Properties,
        reference_id: Option<i64>,
    ) -> NodeInternal {
        let mut node = NodeInternal {
            id,
            name,
            type_id,
            properties,
            reference_id,
            synonyms_vector: TsVector::default(),
            relation_vector: TsVector::default(),
            search_vector: TsVector::default(),
            parents: NodeGroup::with_capacity(DEFAULT_NUM_PARENTS),
            children: NodeGroup::with_capacity(DEFAULT_NUM_CHILDREN),
        };
        node.refresh_vectors();
        node
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn type_id(&self) -> OntologyType {
        self.type_id
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    pub fn reference_id(&self) -> Option<i64> {
        self.reference_id
    }

    pub fn parents(&self) -> &NodeGroup {
        &self.parents
    }

    pub fn children(&self) -> &NodeGroup {
        &self.children
    }

    pub fn add_parent<I: Into<NodeId>>(&mut self, parent_id: I) -> bool {
        self.parents.insert(parent_id)
    }

    pub fn add_child<I: Into<NodeId>>(&mut self, child_id: I) -> bool {
        self.children.insert(child_id)
    }

    pub fn synonyms_vector(&self) -> &TsVector {
        &self.synonyms_vector
    }

    pub fn set_synonyms_vector(&mut self, vector: TsVector) {
        self.synonyms_vector = vector;
    }

    pub fn relation_vector(&self) -> &TsVector {
        &self.relation_vector
    }

    pub fn search_vector(&self) -> &TsVector {
        &self.search_vector
    }

    /// Recomputes `relation_vector` and `search_vector` from the row
    ///
    /// This is the write-time trigger of the node table. It only reads the
    /// row itself, so running it repeatedly yields the same vectors.
    pub fn refresh_vectors(&mut self) {
        let code = self.properties.code();
        self.relation_vector = node_relation_vector(code, &self.synonyms_vector);
        self.search_vector = node_search_vector(&self.name, code, &self.relation_vector);
    }
}

impl PartialEq for NodeInternal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeInternal {}
