//! Responses for the tree control of the UI
//!
//! The tree control lists one group of roots per ontology type and expands
//! a pre-selected set of nodes along their root paths.

use serde::Serialize;

use crate::ontology::{NodeDetail, PathNode, RootNode};
use crate::{NodeId, Ontology, OntologyType};

/// Label and source type of an [`OntologyGroup`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GroupModel {
    /// Human readable label of the type, e.g. `Clinical Domain`
    pub label: String,
    /// The type the group lists
    pub source: OntologyType,
}

/// The roots of a single [`OntologyType`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OntologyGroup {
    /// Describes the grouped type
    pub model: GroupModel,
    /// All roots of the type
    pub nodes: Vec<RootNode>,
}

/// The data to pre-populate a UI selection
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CreationData {
    /// The decorated longest root path of every selected node
    pub ancestors: Vec<Vec<PathNode>>,
    /// The detail of every selected node
    pub value: Vec<NodeDetail>,
}

impl Ontology {
    /// Returns one group of roots per requested type
    ///
    /// Groups are ordered as the requested types. An empty slice returns a
    /// group for every [`OntologyType`].
    ///
    /// # Examples
    ///
    /// ```
    /// use phenotag::{Ontology, OntologyType, Properties};
    ///
    /// let mut ontology = Ontology::default();
    /// ontology
    ///     .insert_node("Cardiology", OntologyType::ClinicalDomain, Properties::new(), None)
    ///     .unwrap();
    ///
    /// let groups = ontology.get_groups(&[OntologyType::ClinicalDomain]);
    /// assert_eq!(groups.len(), 1);
    /// assert_eq!(groups[0].model.label, "Clinical Domain");
    /// assert_eq!(groups[0].nodes[0].name, "Cardiology");
    /// ```
    pub fn get_groups(&self, type_ids: &[OntologyType]) -> Vec<OntologyGroup> {
        let type_ids = if type_ids.is_empty() {
            &OntologyType::ALL[..]
        } else {
            type_ids
        };
        type_ids
            .iter()
            .map(|kind| OntologyGroup {
                model: GroupModel {
                    label: kind.label().to_string(),
                    source: *kind,
                },
                nodes: self.roots_of_type(&[*kind]),
            })
            .collect()
    }

    /// Combines [`Ontology::get_node_set`] and
    /// [`Ontology::build_selection_tree`] for the selected nodes
    ///
    /// Only nodes of the given types are selected; an empty slice accepts
    /// every type.
    pub fn get_creation_data(
        &self,
        node_ids: &[NodeId],
        type_ids: &[OntologyType],
    ) -> CreationData {
        let selected: Vec<NodeId> = node_ids
            .iter()
            .copied()
            .filter(|id| {
                self.node(*id).map_or(false, |node| {
                    type_ids.is_empty() || type_ids.contains(&node.type_id())
                })
            })
            .collect();

        CreationData {
            ancestors: self
                .build_selection_tree(&selected)
                .into_iter()
                .map(|branch| branch.dataset)
                .collect(),
            value: self.get_node_set(&selected),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Properties;

    #[test]
    fn groups_for_all_types() {
        let mut ontology = Ontology::default();
        ontology
            .insert_node("Heart", OntologyType::ClinicalFunctionalAnatomy, Properties::new(), None)
            .unwrap();
        let groups = ontology.get_groups(&[]);
        assert_eq!(groups.len(), 3);
        assert!(groups[0].nodes.is_empty());
        assert_eq!(groups[2].model.source, OntologyType::ClinicalFunctionalAnatomy);
        assert_eq!(groups[2].nodes.len(), 1);
    }

    #[test]
    fn creation_data_filters_types() {
        let mut ontology = Ontology::default();
        let domain = ontology
            .insert_node("Cardiology", OntologyType::ClinicalDomain, Properties::new(), None)
            .unwrap();
        let child = ontology
            .insert_node("Arrhythmia", OntologyType::ClinicalDomain, Properties::new(), None)
            .unwrap();
        let anatomy = ontology
            .insert_node("Heart", OntologyType::ClinicalFunctionalAnatomy, Properties::new(), None)
            .unwrap();
        ontology.create_edge(domain, child).unwrap();

        let data = ontology.get_creation_data(&[child, anatomy], &[OntologyType::ClinicalDomain]);
        assert_eq!(data.value.len(), 1);
        assert_eq!(data.value[0].id, child);
        assert_eq!(data.ancestors.len(), 1);
        assert_eq!(data.ancestors[0].len(), 2);
        assert_eq!(data.ancestors[0][0].id, domain);

        let data = ontology.get_creation_data(&[child, anatomy], &[]);
        assert_eq!(data.value.len(), 2);
    }
}
