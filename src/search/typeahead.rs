use std::cmp::Ordering;

use serde::Serialize;

use crate::search::{Trigrams, TsQuery};
use crate::{
    NodeId, Ontology, OntologyType, Properties, DEFAULT_RESULT_LIMIT, MIN_SEARCH_TERM_LENGTH,
};

/// A single typeahead suggestion
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TypeaheadResult {
    /// The id of the suggested node
    pub id: NodeId,
    /// The name of the suggested node
    pub label: String,
    /// The properties of the suggested node
    pub properties: Properties,
    /// The type of the suggested node
    pub type_id: OntologyType,
}

/// Suggests ontology nodes for a partially typed search term
///
/// Every word of `searchterm` is matched as a prefix against the search
/// vector and the relation vector of each node. Matching nodes are ranked
/// by the weighted term frequency of their search vector, then by trigram
/// similarity of their name to the term and finally by ascending id.
///
/// Terms shorter than [`MIN_SEARCH_TERM_LENGTH`] characters return no
/// results. An empty `type_ids` slice accepts nodes of every type and
/// `result_limit` defaults to [`DEFAULT_RESULT_LIMIT`].
///
/// # Examples
///
/// ```
/// use phenotag::search::typeahead;
/// use phenotag::{Ontology, OntologyType, Properties};
///
/// let mut ontology = Ontology::default();
/// ontology
///     .insert_node("Cardiology", OntologyType::ClinicalDomain, Properties::new(), None)
///     .unwrap();
///
/// let results = typeahead(&ontology, "cardio", &[], None);
/// assert_eq!(results[0].label, "Cardiology");
///
/// assert!(typeahead(&ontology, "ca", &[], None).is_empty());
/// ```
pub fn typeahead(
    ontology: &Ontology,
    searchterm: &str,
    type_ids: &[OntologyType],
    result_limit: Option<usize>,
) -> Vec<TypeaheadResult> {
    let term = searchterm.trim();
    if term.chars().count() < MIN_SEARCH_TERM_LENGTH {
        return Vec::new();
    }
    let query = TsQuery::websearch(term).expand_prefix();
    if query.is_empty() {
        return Vec::new();
    }
    let trigrams = Trigrams::new(term);

    let mut hits: Vec<(f32, f32, TypeaheadResult)> = ontology
        .iter()
        .filter(|node| type_ids.is_empty() || type_ids.contains(&node.type_id()))
        .filter(|node| {
            query.matches(node.search_vector()) || query.matches(node.relation_vector())
        })
        .map(|node| {
            (
                query.rank(node.search_vector()),
                Trigrams::new(node.name()).similarity(&trigrams),
                TypeaheadResult {
                    id: node.id(),
                    label: node.name().to_string(),
                    properties: node.properties().clone(),
                    type_id: node.type_id(),
                },
            )
        })
        .collect();

    hits.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
            .then_with(|| a.2.id.cmp(&b.2.id))
    });
    hits.truncate(result_limit.unwrap_or(DEFAULT_RESULT_LIMIT));
    hits.into_iter().map(|(_, _, result)| result).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn ontology() -> Ontology {
        let mut ontology = Ontology::default();
        ontology
            .insert_node(
                "Asthmatic bronchitis",
                OntologyType::ClinicalDisease,
                Properties::new(),
                None,
            )
            .unwrap();
        ontology
            .insert_node(
                "Asthma",
                OntologyType::ClinicalDisease,
                Properties::try_from(json!({"code": "J45", "coding_system_id": 4})).unwrap(),
                None,
            )
            .unwrap();
        ontology
            .insert_node(
                "Respiratory medicine",
                OntologyType::ClinicalDomain,
                Properties::new(),
                None,
            )
            .unwrap();
        ontology
    }

    #[test]
    fn ranking() {
        let ontology = ontology();
        let results = typeahead(&ontology, "asth", &[], None);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].label, "Asthma");
        assert_eq!(results[1].label, "Asthmatic bronchitis");
        assert_eq!(results[0].properties.code(), Some("J45"));
    }

    #[test]
    fn short_terms() {
        let ontology = ontology();
        assert!(typeahead(&ontology, "as", &[], None).is_empty());
        assert!(typeahead(&ontology, "  as  ", &[], None).is_empty());
        assert!(typeahead(&ontology, "", &[], None).is_empty());
    }

    #[test]
    fn code_and_type_filter() {
        let ontology = ontology();
        let results = typeahead(&ontology, "j45", &[], None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].label, "Asthma");

        assert!(typeahead(&ontology, "asth", &[OntologyType::ClinicalDomain], None).is_empty());
        assert_eq!(typeahead(&ontology, "asth medicine", &[], Some(1)).len(), 1);
    }

    #[test]
    fn stable_ranking() {
        let ontology = ontology();
        let first = typeahead(&ontology, "asthma respiratory", &[], None);
        let second = typeahead(&ontology, "asthma respiratory", &[], None);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }
}
