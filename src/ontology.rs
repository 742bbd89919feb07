use core::fmt::Debug;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::coding::CodingTables;
use crate::node::internal::NodeInternal;
use crate::search::TsVector;
use crate::{
    NodeGroup, NodeId, OntologyNode, OntologyType, PhenotagError, PhenotagResult, Properties,
    MAX_NAME_LENGTH,
};

mod arena;
mod paths;
pub(crate) mod tree;

use arena::Arena;
use paths::{shortest_root_paths, LongestPaths};
pub use paths::RootPath;

/// Unique identifier of an [`Edge`]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId {
    inner: u32,
}

impl EdgeId {
    /// Returns the integer representation of the id
    pub fn as_u32(&self) -> u32 {
        self.inner
    }

    fn next(&self) -> EdgeId {
        EdgeId {
            inner: self.inner + 1,
        }
    }
}

impl From<u32> for EdgeId {
    fn from(inner: u32) -> Self {
        EdgeId { inner }
    }
}

impl Debug for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EdgeId({})", self.inner)
    }
}

impl Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// A directed parent to child relation of the [`Ontology`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    id: EdgeId,
    parent_id: NodeId,
    child_id: NodeId,
}

impl Edge {
    /// The id of the edge
    pub fn id(&self) -> EdgeId {
        self.id
    }

    /// The node the edge starts at
    pub fn parent_id(&self) -> NodeId {
        self.parent_id
    }

    /// The node the edge points to
    pub fn child_id(&self) -> NodeId {
        self.child_id
    }
}

/// Changes applied to a node by [`Ontology::update_node`]
///
/// Fields left as `None` are not modified.
#[derive(Clone, Debug, Default)]
pub struct NodeUpdate {
    /// The new name
    pub name: Option<String>,
    /// Replaces all properties of the node
    pub properties: Option<Properties>,
    /// Synonyms of the node, tokenised into the synonyms vector
    pub synonyms: Option<String>,
}

/// A root node, as listed by [`Ontology::roots_of_type`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RootNode {
    /// The id of the root
    pub id: NodeId,
    /// The name of the root
    pub name: String,
    /// The type of the root
    pub type_id: OntologyType,
    /// Number of direct children
    pub child_count: usize,
}

/// A direct parent or child of a node
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelatedNode {
    /// The id of the related node
    pub id: NodeId,
    /// The name of the related node
    pub name: String,
    /// The type of the related node
    pub type_id: OntologyType,
    /// Number of direct children of the related node
    pub child_count: usize,
    /// `true` if the related node has no parents
    pub is_root: bool,
    /// `true` if the related node has no children
    pub is_leaf: bool,
}

impl From<OntologyNode<'_>> for RelatedNode {
    fn from(node: OntologyNode<'_>) -> Self {
        RelatedNode {
            id: node.id(),
            name: node.name().to_string(),
            type_id: node.type_id(),
            child_count: node.child_count(),
            is_root: node.is_root(),
            is_leaf: node.is_leaf(),
        }
    }
}

/// A node with its direct neighbours and its shortest root paths
///
/// Returned by [`Ontology::get_node_detail`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeDetail {
    /// The id of the node
    pub id: NodeId,
    /// The name of the node
    pub name: String,
    /// The type of the node
    pub type_id: OntologyType,
    /// The open properties of the node
    pub properties: Properties,
    /// The optional external reference of the node
    pub reference_id: Option<i64>,
    /// All direct parents
    pub parents: Vec<RelatedNode>,
    /// All direct children
    pub children: Vec<RelatedNode>,
    /// The roots closest to the node, in ascending order
    pub roots: Vec<NodeId>,
    /// The shortest path from every reachable root
    pub root_paths: Vec<RootPath>,
}

/// A node on a selection path, decorated with its direct neighbours
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PathNode {
    /// Position of the node within the path, starting at the root
    pub idx: usize,
    /// The id of the node
    pub id: NodeId,
    /// The name of the node
    pub name: String,
    /// The type of the node
    pub type_id: OntologyType,
    /// All direct parents
    pub parents: Vec<RelatedNode>,
    /// All direct children
    pub children: Vec<RelatedNode>,
}

/// The longest root path of a selected node
///
/// Returned by [`Ontology::build_selection_tree`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectionBranch {
    /// The selected node
    pub child_id: NodeId,
    /// The path from the root down to, and including, the selected node
    pub path: Vec<NodeId>,
    /// Every node of the path in path order
    pub dataset: Vec<PathNode>,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// `Ontology` is the typed DAG of clinical concepts
///
/// It holds all nodes and the parent to child edges between them. Nodes
/// can have multiple parents and multiple children, but the graph never
/// contains a cycle and every `(parent, child)` pair is stored once.
///
/// # Examples
///
/// ```
/// use phenotag::{Ontology, OntologyType, PhenotagError, Properties};
///
/// let mut ontology = Ontology::default();
/// let resp = ontology
///     .insert_node("Respiratory", OntologyType::ClinicalDomain, Properties::new(), None)
///     .unwrap();
/// let lung = ontology
///     .insert_node("Lung disease", OntologyType::ClinicalDomain, Properties::new(), None)
///     .unwrap();
///
/// ontology.create_edge(resp, lung).unwrap();
///
/// assert!(matches!(
///     ontology.create_edge(lung, resp),
///     Err(PhenotagError::CycleCreated { .. })
/// ));
///
/// let node = ontology.node(lung).unwrap();
/// assert_eq!(node.parents().next().unwrap().name(), "Respiratory");
/// assert!(node.is_leaf());
/// ```
///
/// # Layout
///
/// ```mermaid
/// erDiagram
///     ONTOLOGY ||--|{ NODE : contains
///     ONTOLOGY ||--o{ EDGE : contains
///     EDGE }o--|| NODE : parent
///     EDGE }o--|| NODE : child
///     NODE {
///         u32 id
///         str name
///         u8 type_id
///         json properties
///         i64 reference_id
///         tsvector search_vector
///         tsvector synonyms_vector
///         tsvector relation_vector
///     }
///     EDGE {
///         u32 id
///         u32 parent_id
///         u32 child_id
///     }
/// ```
#[derive(Default, Clone, Serialize, Deserialize)]
#[serde(try_from = "OntologyRows", into = "OntologyRows")]
pub struct Ontology {
    nodes: Arena,
    edges: BTreeMap<EdgeId, Edge>,
    edge_index: HashMap<(NodeId, NodeId), EdgeId>,
}

impl Debug for Ontology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Ontology with {} nodes and {} edges",
            self.nodes.len(),
            self.edges.len()
        )
    }
}

/// Read access
impl Ontology {
    /// Returns the number of nodes in the `Ontology`
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the `Ontology` does not contain any nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 0
    }

    /// Returns the number of edges in the `Ontology`
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns the [`OntologyNode`] of the provided [`NodeId`]
    ///
    /// If no such node is present in the Ontology, `None` is returned
    pub fn node<I: Into<NodeId>>(&self, id: I) -> Option<OntologyNode<'_>> {
        self.get(id.into()).map(|node| OntologyNode::new(self, node))
    }

    /// Returns an iterator over all nodes, in ascending [`NodeId`] order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.nodes.values(),
            ontology: self,
        }
    }

    /// Returns the edge between `parent_id` and `child_id`, if present
    pub fn edge<I: Into<NodeId>, J: Into<NodeId>>(
        &self,
        parent_id: I,
        child_id: J,
    ) -> Option<&Edge> {
        self.edge_index
            .get(&(parent_id.into(), child_id.into()))
            .and_then(|id| self.edges.get(id))
    }

    /// Returns an iterator over all edges, in ascending [`EdgeId`] order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Returns all direct and indirect parents of the node
    ///
    /// The node itself is not part of the group. Unknown nodes have no
    /// ancestors.
    pub fn ancestors<I: Into<NodeId>>(&self, id: I) -> NodeGroup {
        self.walk(id.into(), NodeInternal::parents)
    }

    /// Returns all direct and indirect children of the node
    ///
    /// The node itself is not part of the group. Unknown nodes have no
    /// descendants.
    pub fn descendants<I: Into<NodeId>>(&self, id: I) -> NodeGroup {
        self.walk(id.into(), NodeInternal::children)
    }

    /// Returns the number of edges of the longest path in the `Ontology`
    ///
    /// # Examples
    ///
    /// ```
    /// use phenotag::{Ontology, OntologyType, Properties};
    ///
    /// let mut ontology = Ontology::default();
    /// assert_eq!(ontology.max_depth(), 0);
    ///
    /// for name in ["a", "b", "c"] {
    ///     ontology
    ///         .insert_node(name, OntologyType::ClinicalDomain, Properties::new(), None)
    ///         .unwrap();
    /// }
    /// ontology.create_edge(1u32, 2u32).unwrap();
    /// ontology.create_edge(2u32, 3u32).unwrap();
    /// assert_eq!(ontology.max_depth(), 2);
    /// ```
    pub fn max_depth(&self) -> usize {
        let mut paths = LongestPaths::default();
        self.nodes
            .values()
            .filter(|node| node.children().is_empty())
            .map(|leaf| paths.path(self, *leaf.id()).len() - 1)
            .max()
            .unwrap_or_default()
    }

    /// Returns all root nodes of the given types, in ascending id order
    ///
    /// An empty `type_ids` slice returns the roots of every type.
    pub fn roots_of_type(&self, type_ids: &[OntologyType]) -> Vec<RootNode> {
        self.iter()
            .filter(|node| node.is_root())
            .filter(|node| type_ids.is_empty() || type_ids.contains(&node.type_id()))
            .map(|node| RootNode {
                id: node.id(),
                name: node.name().to_string(),
                type_id: node.type_id(),
                child_count: node.child_count(),
            })
            .collect()
    }

    /// Returns the node with its neighbours and shortest root paths
    ///
    /// `roots` lists the roots at the minimum distance from the node and
    /// `root_paths` contains the shortest path from every reachable root,
    /// ordered by depth.
    ///
    /// # Errors
    ///
    /// If the node does not exist, or is not of the requested `type_id`,
    /// it returns [`PhenotagError::NodeNotFound`]
    ///
    /// # Examples
    ///
    /// ```
    /// use phenotag::{NodeId, Ontology, OntologyType, Properties};
    ///
    /// let mut ontology = Ontology::default();
    /// for name in ["root", "mid", "leaf"] {
    ///     ontology
    ///         .insert_node(name, OntologyType::ClinicalDomain, Properties::new(), None)
    ///         .unwrap();
    /// }
    /// ontology.create_edge(1u32, 2u32).unwrap();
    /// ontology.create_edge(2u32, 3u32).unwrap();
    /// ontology.create_edge(1u32, 3u32).unwrap();
    ///
    /// let detail = ontology.get_node_detail(3u32, None).unwrap();
    /// assert_eq!(detail.parents.len(), 2);
    /// assert_eq!(detail.roots, vec![NodeId::from(1u32)]);
    /// assert_eq!(detail.root_paths[0].depth(), 1);
    /// ```
    pub fn get_node_detail<I: Into<NodeId>>(
        &self,
        id: I,
        type_id: Option<OntologyType>,
    ) -> PhenotagResult<NodeDetail> {
        let id = id.into();
        let node = self
            .node(id)
            .filter(|node| type_id.map_or(true, |kind| node.type_id() == kind))
            .ok_or(PhenotagError::NodeNotFound(id))?;

        let root_paths = shortest_root_paths(self, id);
        let min_depth = root_paths.first().map(RootPath::depth);
        let mut roots: Vec<NodeId> = root_paths
            .iter()
            .filter(|path| Some(path.depth()) == min_depth)
            .map(RootPath::root)
            .collect();
        roots.sort_unstable();

        Ok(NodeDetail {
            id,
            name: node.name().to_string(),
            type_id: node.type_id(),
            properties: node.properties().clone(),
            reference_id: node.reference_id(),
            parents: node.parents().map(RelatedNode::from).collect(),
            children: node.children().map(RelatedNode::from).collect(),
            roots,
            root_paths,
        })
    }

    /// Returns the [`NodeDetail`] of every existing node in `ids`
    ///
    /// Unknown ids are skipped.
    pub fn get_node_set(&self, ids: &[NodeId]) -> Vec<NodeDetail> {
        ids.iter()
            .filter_map(|id| self.get_node_detail(*id, None).ok())
            .collect()
    }

    /// Returns the longest root path of every selected node
    ///
    /// Every node on a path is decorated with its direct parents and
    /// children. When several paths are equally long, the path through the
    /// smallest parent id is chosen. Unknown ids are skipped.
    pub fn build_selection_tree(&self, descendant_ids: &[NodeId]) -> Vec<SelectionBranch> {
        let mut paths = LongestPaths::default();
        descendant_ids
            .iter()
            .filter(|id| self.nodes.contains(**id))
            .map(|child_id| {
                let path = paths.path(self, *child_id);
                let dataset = path
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, id)| self.node(*id).map(|node| path_node(idx, node)))
                    .collect();
                SelectionBranch {
                    child_id: *child_id,
                    path,
                    dataset,
                }
            })
            .collect()
    }

    /// Returns the `Ontology` as a Graphviz DOT graph
    ///
    /// This is meant to be used with smaller ontologies, e.g. to inspect
    /// the result of an import.
    pub fn as_dot(&self) -> String {
        DotGraph(self).to_string()
    }
}

/// Graphviz rendering of an [`Ontology`], see [`Ontology::as_dot`]
struct DotGraph<'a>(&'a Ontology);

impl Display for DotGraph<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "digraph ontology {{")?;
        for node in self.0 {
            writeln!(
                f,
                "    {} [label=\"{}\\n{}\"];",
                node.id(),
                node.id(),
                node.name().replace('"', "\\\"")
            )?;
        }
        for edge in self.0.edges.values() {
            writeln!(f, "    {} -> {};", edge.parent_id, edge.child_id)?;
        }
        writeln!(f, "}}")
    }
}

/// Write access
impl Ontology {
    /// Inserts a new node and returns its [`NodeId`]
    ///
    /// The search vectors of the node are computed before it is stored.
    /// Unlike [`Ontology::create_node`] this does not look up the code of
    /// disease nodes.
    ///
    /// # Errors
    ///
    /// If the name is blank or longer than [`MAX_NAME_LENGTH`] characters
    /// it returns [`PhenotagError::Validation`]
    pub fn insert_node(
        &mut self,
        name: &str,
        type_id: OntologyType,
        properties: Properties,
        reference_id: Option<i64>,
    ) -> PhenotagResult<NodeId> {
        validate_name(name)?;
        let id = self.nodes.next_id();
        self.nodes.insert(NodeInternal::new(
            id,
            name.to_string(),
            type_id,
            properties,
            reference_id,
        ));
        trace!("Inserted node {id}: {name}");
        Ok(id)
    }

    /// Creates a new node and returns its [`NodeId`]
    ///
    /// For [`OntologyType::ClinicalDisease`] nodes, `properties.code` is
    /// looked up in the coding table of `properties.coding_system_id`. When
    /// a row is found, its id is stored as `properties.code_id`. An
    /// unresolved code is not an error, the node is stored without
    /// `code_id`.
    ///
    /// # Errors
    ///
    /// If the name is blank or longer than [`MAX_NAME_LENGTH`] characters
    /// it returns [`PhenotagError::Validation`]
    pub fn create_node(
        &mut self,
        name: &str,
        type_id: OntologyType,
        mut properties: Properties,
        reference_id: Option<i64>,
        coding: &CodingTables,
    ) -> PhenotagResult<NodeId> {
        if type_id == OntologyType::ClinicalDisease {
            if let Some(disease) = properties.disease() {
                match coding.resolve(disease.coding_system_id, &disease.code) {
                    Some(code_id) => properties.set_code_id(code_id),
                    None => debug!(
                        "Code {} not found in {}",
                        disease.code, disease.coding_system_id
                    ),
                }
            }
        }
        self.insert_node(name, type_id, properties, reference_id)
    }

    /// Applies the update to an existing node and recomputes its vectors
    ///
    /// Phenotypes labelled with the node keep their vectors until they are
    /// refreshed, see [`crate::Tables::update_node`].
    ///
    /// # Errors
    ///
    /// - the node does not exist: [`PhenotagError::NodeNotFound`]
    /// - the new name is invalid: [`PhenotagError::Validation`]
    pub fn update_node<I: Into<NodeId>>(
        &mut self,
        id: I,
        update: NodeUpdate,
    ) -> PhenotagResult<()> {
        let id = id.into();
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        let node = self
            .nodes
            .get_mut(id)
            .ok_or(PhenotagError::NodeNotFound(id))?;
        if let Some(name) = update.name {
            node.set_name(name);
        }
        if let Some(properties) = update.properties {
            *node.properties_mut() = properties;
        }
        if let Some(synonyms) = update.synonyms {
            node.set_synonyms_vector(TsVector::from_text(&synonyms));
        }
        node.refresh_vectors();
        Ok(())
    }

    /// Creates the edge `parent_id -> child_id` and returns its [`EdgeId`]
    ///
    /// # Errors
    ///
    /// - either node does not exist: [`PhenotagError::NodeNotFound`]
    /// - the edge exists already: [`PhenotagError::Duplicate`]
    /// - `parent_id` is `child_id` or a descendant of it:
    ///   [`PhenotagError::CycleCreated`]
    ///
    /// The ontology is not modified if an error is returned.
    pub fn create_edge<I: Into<NodeId>, J: Into<NodeId>>(
        &mut self,
        parent_id: I,
        child_id: J,
    ) -> PhenotagResult<EdgeId> {
        let parent = parent_id.into();
        let child = child_id.into();
        for id in [parent, child] {
            if !self.nodes.contains(id) {
                return Err(PhenotagError::NodeNotFound(id));
            }
        }
        if self.edge_index.contains_key(&(parent, child)) {
            return Err(PhenotagError::Duplicate { parent, child });
        }
        if parent == child || self.descendants(child).contains(&parent) {
            return Err(PhenotagError::CycleCreated { parent, child });
        }

        let id = self
            .edges
            .keys()
            .next_back()
            .map_or(EdgeId::from(1u32), EdgeId::next);
        self.add_edge(Edge {
            id,
            parent_id: parent,
            child_id: child,
        });
        trace!("Created edge {id}: {parent} -> {child}");
        Ok(id)
    }
}

/// Crate-internal helpers
impl Ontology {
    pub(crate) fn get(&self, id: NodeId) -> Option<&NodeInternal> {
        self.nodes.get(id)
    }

    /// Recomputes the vectors of every node
    pub(crate) fn refresh_vectors(&mut self) {
        for node in self.nodes.values_mut() {
            node.refresh_vectors();
        }
    }

    /// Stores the edge and caches it on both nodes
    ///
    /// The caller guarantees that both nodes exist and that the edge keeps
    /// the graph acyclic.
    fn add_edge(&mut self, edge: Edge) {
        if let Some(parent) = self.nodes.get_mut(edge.parent_id) {
            parent.add_child(edge.child_id);
        }
        if let Some(child) = self.nodes.get_mut(edge.child_id) {
            child.add_parent(edge.parent_id);
        }
        self.edge_index
            .insert((edge.parent_id, edge.child_id), edge.id);
        self.edges.insert(edge.id, edge);
    }

    /// Breadth-first walk along `next`, excluding the start node
    fn walk(&self, id: NodeId, next: fn(&NodeInternal) -> &NodeGroup) -> NodeGroup {
        let mut visited = NodeGroup::new();
        let mut queue: VecDeque<NodeId> = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            let Some(node) = self.get(current) else {
                continue;
            };
            for neighbour in next(node) {
                if neighbour != id && visited.insert(neighbour) {
                    queue.push_back(neighbour);
                }
            }
        }
        visited
    }
}

fn validate_name(name: &str) -> PhenotagResult<()> {
    if name.trim().is_empty() {
        return Err(PhenotagError::Validation {
            field: "name",
            reason: "must not be blank".to_string(),
        });
    }
    let length = name.chars().count();
    if length > MAX_NAME_LENGTH {
        return Err(PhenotagError::Validation {
            field: "name",
            reason: format!("{length} characters exceed the maximum of {MAX_NAME_LENGTH}"),
        });
    }
    Ok(())
}

fn path_node(idx: usize, node: OntologyNode<'_>) -> PathNode {
    PathNode {
        idx,
        id: node.id(),
        name: node.name().to_string(),
        type_id: node.type_id(),
        parents: node.parents().map(RelatedNode::from).collect(),
        children: node.children().map(RelatedNode::from).collect(),
    }
}

/// The persisted form of the [`Ontology`]: the node and edge tables
#[derive(Serialize, Deserialize)]
struct OntologyRows {
    nodes: Vec<NodeInternal>,
    edges: Vec<Edge>,
}

impl From<Ontology> for OntologyRows {
    fn from(ontology: Ontology) -> Self {
        OntologyRows {
            nodes: ontology.nodes.values().cloned().collect(),
            edges: ontology.edges.into_values().collect(),
        }
    }
}

impl TryFrom<OntologyRows> for Ontology {
    type Error = PhenotagError;

    /// Rebuilds the parent and child caches and recomputes every vector
    fn try_from(rows: OntologyRows) -> PhenotagResult<Self> {
        let mut ontology = Ontology::default();
        for node in rows.nodes {
            ontology.nodes.insert(node);
        }
        ontology.refresh_vectors();
        for edge in rows.edges {
            for id in [edge.parent_id, edge.child_id] {
                if !ontology.nodes.contains(id) {
                    return Err(PhenotagError::DataIntegrity {
                        entity: format!("edge {}", edge.id),
                        shape: format!("references missing node {id}"),
                    });
                }
            }
            if ontology.edge_index.contains_key(&(edge.parent_id, edge.child_id)) {
                return Err(PhenotagError::DataIntegrity {
                    entity: format!("edge {}", edge.id),
                    shape: format!("duplicates {} -> {}", edge.parent_id, edge.child_id),
                });
            }
            ontology.add_edge(edge);
        }
        for node in ontology.nodes.values() {
            let id = *node.id();
            if node
                .parents()
                .iter()
                .any(|parent| parent == id || ontology.ancestors(parent).contains(&id))
            {
                return Err(PhenotagError::DataIntegrity {
                    entity: format!("node {}", node.id()),
                    shape: "is part of a cycle".to_string(),
                });
            }
        }
        debug!("Loaded {:?}", ontology);
        Ok(ontology)
    }
}

/// Iterates the Ontology and yields [`OntologyNode`]s
pub struct Iter<'a> {
    inner: std::collections::btree_map::Values<'a, NodeId, NodeInternal>,
    ontology: &'a Ontology,
}

impl<'a> std::iter::Iterator for Iter<'a> {
    type Item = OntologyNode<'a>;
    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|node| OntologyNode::new(self.ontology, node))
    }
}

impl<'a> IntoIterator for &'a Ontology {
    type Item = OntologyNode<'a>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::coding::{CodeRow, CodingSystemId};
    use serde_json::json;

    fn domain(ontology: &mut Ontology, name: &str) -> NodeId {
        ontology
            .insert_node(name, OntologyType::ClinicalDomain, Properties::new(), None)
            .unwrap()
    }

    #[test]
    fn acyclicity_rejection() {
        let mut ontology = Ontology::default();
        let a = domain(&mut ontology, "A");
        let b = domain(&mut ontology, "B");
        let c = domain(&mut ontology, "C");
        ontology.create_edge(a, b).unwrap();
        ontology.create_edge(b, c).unwrap();
        let before = serde_json::to_string(&ontology).unwrap();

        assert!(matches!(
            ontology.create_edge(c, a),
            Err(PhenotagError::CycleCreated { .. })
        ));
        assert!(matches!(
            ontology.create_edge(b, b),
            Err(PhenotagError::CycleCreated { .. })
        ));
        assert_eq!(serde_json::to_string(&ontology).unwrap(), before);
        assert!(!ontology.descendants(a).contains(&a));
    }

    #[test]
    fn duplicate_edges() {
        let mut ontology = Ontology::default();
        let a = domain(&mut ontology, "A");
        let b = domain(&mut ontology, "B");
        let edge = ontology.create_edge(a, b).unwrap();
        assert!(matches!(
            ontology.create_edge(a, b),
            Err(PhenotagError::Duplicate { .. })
        ));
        assert_eq!(ontology.edge_count(), 1);
        assert_eq!(ontology.edge(a, b).unwrap().id(), edge);
        assert!(matches!(
            ontology.create_edge(a, 99u32),
            Err(PhenotagError::NodeNotFound(_))
        ));
    }

    #[test]
    fn name_validation() {
        let mut ontology = Ontology::default();
        assert!(ontology
            .insert_node("  ", OntologyType::ClinicalDomain, Properties::new(), None)
            .is_err());
        let long = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(ontology
            .insert_node(&long, OntologyType::ClinicalDomain, Properties::new(), None)
            .is_err());
        assert!(ontology.is_empty());
    }

    #[test]
    fn create_node_resolves_code() {
        let mut coding = CodingTables::default();
        coding.table_mut(CodingSystemId::ICD10).insert(CodeRow {
            id: 17,
            code: "J45".to_string(),
            description: "Asthma".to_string(),
            alt_code: Some("J45".to_string()),
        });

        let mut ontology = Ontology::default();
        let properties =
            Properties::try_from(json!({"code": "J45", "coding_system_id": 4})).unwrap();
        let known = ontology
            .create_node("Asthma", OntologyType::ClinicalDisease, properties, None, &coding)
            .unwrap();
        let properties =
            Properties::try_from(json!({"code": "Q99", "coding_system_id": 4})).unwrap();
        let unknown = ontology
            .create_node("Other", OntologyType::ClinicalDisease, properties, None, &coding)
            .unwrap();

        assert_eq!(ontology.node(known).unwrap().properties().code_id(), Some(17));
        assert_eq!(ontology.node(unknown).unwrap().properties().code_id(), None);
    }

    #[test]
    fn roots_and_detail() {
        let mut ontology = Ontology::default();
        let a = domain(&mut ontology, "A");
        let b = domain(&mut ontology, "B");
        let c = domain(&mut ontology, "C");
        let anatomy = ontology
            .insert_node("Heart", OntologyType::ClinicalFunctionalAnatomy, Properties::new(), None)
            .unwrap();
        ontology.create_edge(a, c).unwrap();
        ontology.create_edge(b, c).unwrap();

        let roots = ontology.roots_of_type(&[OntologyType::ClinicalDomain]);
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].id, a);
        assert_eq!(roots[0].child_count, 1);
        assert_eq!(ontology.roots_of_type(&[]).len(), 3);
        assert_eq!(
            ontology.roots_of_type(&[OntologyType::ClinicalFunctionalAnatomy])[0].id,
            anatomy
        );

        let detail = ontology.get_node_detail(c, None).unwrap();
        assert_eq!(detail.roots, vec![a, b]);
        assert_eq!(detail.root_paths.len(), 2);
        assert!(detail.parents.iter().all(|parent| parent.is_root));
        assert!(detail.children.is_empty());

        assert!(matches!(
            ontology.get_node_detail(c, Some(OntologyType::ClinicalDisease)),
            Err(PhenotagError::NodeNotFound(_))
        ));
        assert_eq!(ontology.get_node_set(&[a, 42u32.into(), c]).len(), 2);
    }

    #[test]
    fn selection_tree() {
        let mut ontology = Ontology::default();
        let root = domain(&mut ontology, "Root");
        let mid = domain(&mut ontology, "Mid");
        let leaf = domain(&mut ontology, "Leaf");
        ontology.create_edge(root, mid).unwrap();
        ontology.create_edge(mid, leaf).unwrap();
        ontology.create_edge(root, leaf).unwrap();

        let tree = ontology.build_selection_tree(&[leaf, 77u32.into()]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].path, vec![root, mid, leaf]);
        assert_eq!(tree[0].dataset.len(), 3);
        assert_eq!(tree[0].dataset[1].idx, 1);
        assert_eq!(tree[0].dataset[1].id, mid);
        assert_eq!(tree[0].dataset[0].children.len(), 2);
    }

    #[test]
    fn update_node_refreshes_vectors() {
        let mut ontology = Ontology::default();
        let id = domain(&mut ontology, "Cardiology");
        ontology
            .update_node(
                id,
                NodeUpdate {
                    synonyms: Some("heart medicine".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        let node = ontology.node(id).unwrap();
        assert!(node.synonyms_vector().contains("heart"));
        assert!(node.search_vector().contains("medicine"));
        assert!(node.relation_vector().contains("heart"));
        assert!(ontology.update_node(99u32, NodeUpdate::default()).is_err());
    }

    #[test]
    fn rows_round_trip() {
        let mut ontology = Ontology::default();
        let a = domain(&mut ontology, "A");
        let b = domain(&mut ontology, "B");
        ontology.create_edge(a, b).unwrap();

        let json = serde_json::to_string(&ontology).unwrap();
        let restored: Ontology = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.len(), 2);
        assert!(restored.node(b).unwrap().parent_ids().contains(&a));
        assert_eq!(restored.max_depth(), 1);
        assert!(restored.as_dot().contains("1 -> 2;"));

        let broken = r#"{"nodes": [], "edges": [{"id": 1, "parent_id": 1, "child_id": 2}]}"#;
        assert!(serde_json::from_str::<Ontology>(broken).is_err());

        let cyclic = r#"{
            "nodes": [{"id": 1, "name": "A", "type_id": 1}, {"id": 2, "name": "B", "type_id": 1}],
            "edges": [
                {"id": 1, "parent_id": 1, "child_id": 2},
                {"id": 2, "parent_id": 2, "child_id": 1}
            ]
        }"#;
        assert!(serde_json::from_str::<Ontology>(cyclic).is_err());
    }

    #[test]
    fn dot_rendering() {
        let mut ontology = Ontology::default();
        let a = domain(&mut ontology, "Heart \"failure\"");
        let b = domain(&mut ontology, "Arrhythmia");
        ontology.create_edge(a, b).unwrap();

        let dot = ontology.as_dot();
        assert!(dot.starts_with("digraph ontology {\n"));
        assert!(dot.contains("    1 [label=\"1\\nHeart \\\"failure\\\"\"];\n"));
        assert!(dot.contains("    1 -> 2;\n"));
        assert!(dot.ends_with("}\n"));
    }
}
