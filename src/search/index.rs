//! The weighted vectors behind the write-time triggers
//!
//! Node vectors are computed from the node row alone. The phenotype vector
//! additionally aggregates the search vectors of the ontology nodes the
//! phenotype is labelled with.

use crate::phenotype::Phenotype;
use crate::search::{TsVector, Weight};
use crate::{Ontology, PhenotagError, PhenotagResult};

/// `code` (A) concatenated with `synonyms` (B)
pub(crate) fn node_relation_vector(code: Option<&str>, synonyms: &TsVector) -> TsVector {
    let code = TsVector::from_text(code.unwrap_or_default()).with_weight(Weight::A);
    &code | &synonyms.clone().with_weight(Weight::B)
}

/// `name` (A), `code` (A) and `relation` (B)
///
/// The relation vector already carries the synonyms, so they are not
/// appended a second time.
pub(crate) fn node_search_vector(name: &str, code: Option<&str>, relation: &TsVector) -> TsVector {
    [
        TsVector::from_text(name).with_weight(Weight::A),
        TsVector::from_text(code.unwrap_or_default()).with_weight(Weight::A),
        relation.clone().with_weight(Weight::B),
    ]
    .into_iter()
    .collect()
}

/// Computes the search vector of a live or historical phenotype row
///
/// The vector consists of `id` and `name` (A), `author` and `definition` (B),
/// `implementation` and `validation` (D), followed by the search vectors of
/// every ontology node listed in `template_data.ontology`.
///
/// # Errors
///
/// - `template_data.ontology` is not a list of node ids:
///   [`PhenotagError::DataIntegrity`]
/// - a listed node does not exist: [`PhenotagError::NodeNotFound`]
pub fn phenotype_search_vector(
    phenotype: &Phenotype,
    ontology: &Ontology,
) -> PhenotagResult<TsVector> {
    let mut vector: TsVector = [
        TsVector::from_text(&phenotype.id).with_weight(Weight::A),
        TsVector::from_text(&phenotype.name).with_weight(Weight::A),
        TsVector::from_text(&phenotype.author).with_weight(Weight::B),
        TsVector::from_text(&phenotype.definition).with_weight(Weight::B),
        TsVector::from_text(&phenotype.implementation).with_weight(Weight::D),
        TsVector::from_text(&phenotype.validation).with_weight(Weight::D),
    ]
    .into_iter()
    .collect();

    let labels = phenotype.template_data.ontology()?;
    let aggregated: TsVector = labels
        .iter()
        .map(|id| {
            ontology
                .node(id)
                .map(|node| node.search_vector())
                .ok_or(PhenotagError::NodeNotFound(id))
        })
        .collect::<PhenotagResult<Vec<&TsVector>>>()?
        .into_iter()
        .collect();
    vector.extend(&aggregated);
    Ok(vector)
}
