use std::collections::{BTreeMap, HashMap};

use crate::code::{normalise, NormalisedCode};
use crate::coding::{CodeMap, CodingSystemId};
use crate::phenotype::{ConceptHistory, ResolvedCode, TemplateData};
use crate::{NodeGroup, Ontology, OntologyType, PhenotagResult};

/// How the codes of a phenotype are matched to disease nodes
#[derive(Clone, Debug)]
pub enum LabelSource {
    /// ICD-10 codes are matched directly against the node codes
    Icd10,
    /// Read v2 codes are translated to ICD-10 with the code map first
    ReadViaMap(CodeMap),
}

impl LabelSource {
    /// The coding system of the phenotype codes
    pub fn coding_system(&self) -> CodingSystemId {
        match self {
            LabelSource::Icd10 => CodingSystemId::ICD10,
            LabelSource::ReadViaMap(_) => CodingSystemId::READ_V2,
        }
    }
}

/// Disease nodes indexed by the normal forms of their code
#[derive(Clone, Debug, Default)]
pub struct DiseaseIndex {
    by_dot_code: HashMap<String, NodeGroup>,
    by_alt_code: HashMap<String, NodeGroup>,
}

impl DiseaseIndex {
    /// Indexes every [`OntologyType::ClinicalDisease`] node with a code
    pub fn new(ontology: &Ontology) -> Self {
        let mut index = Self::default();
        for node in ontology
            .iter()
            .filter(|node| node.type_id() == OntologyType::ClinicalDisease)
        {
            let Some(code) = node.properties().code() else {
                continue;
            };
            let code = normalise(code.trim());
            if code.is_empty() {
                continue;
            }
            index
                .by_dot_code
                .entry(code.dot_code().to_string())
                .or_default()
                .insert(node.id());
            index
                .by_alt_code
                .entry(code.alt_code().to_string())
                .or_default()
                .insert(node.id());
        }
        index
    }

    /// Nodes whose `dot_code` or `alt_code` equals either form of `code`
    pub fn matching(&self, code: &NormalisedCode) -> NodeGroup {
        let mut res = NodeGroup::new();
        if code.is_empty() {
            return res;
        }
        for key in [code.dot_code(), code.alt_code()] {
            for map in [&self.by_dot_code, &self.by_alt_code] {
                if let Some(ids) = map.get(key) {
                    res = &res | ids;
                }
            }
        }
        res
    }

    /// Nodes whose `alt_code` equals the `alt_code` of `code`
    pub fn matching_alt(&self, code: &NormalisedCode) -> NodeGroup {
        self.by_alt_code
            .get(code.alt_code())
            .cloned()
            .unwrap_or_default()
    }
}

/// Resolves all concept versions referenced by a phenotype
///
/// Codes are unique per concept. A code found in several versions of the
/// same concept is kept once, attributed to the highest version.
///
/// # Errors
///
/// - `concept_information` is malformed: [`crate::PhenotagError::DataIntegrity`]
/// - a referenced concept version is missing: [`crate::PhenotagError::DataIntegrity`]
pub fn resolve_codes(
    template: &TemplateData,
    history: &ConceptHistory,
    coding_system: CodingSystemId,
) -> PhenotagResult<Vec<ResolvedCode>> {
    let mut unique: BTreeMap<(i64, String), ResolvedCode> = BTreeMap::new();
    for reference in template.concept_information()? {
        for code in history.resolve(
            reference.concept_id,
            reference.concept_version_id,
            coding_system,
        )? {
            let key = (code.concept_id, code.normalised.dot_code().to_string());
            match unique.get(&key) {
                Some(known) if known.concept_version_id >= code.concept_version_id => {}
                _ => {
                    unique.insert(key, code);
                }
            }
        }
    }
    Ok(unique.into_values().collect())
}

/// Matches resolved codes to disease nodes, the candidate set
///
/// ICD-10 codes match on either normal form. Codes of other systems are
/// translated with the code map and the targets match on `alt_code`.
pub fn candidates(codes: &[ResolvedCode], source: &LabelSource, index: &DiseaseIndex) -> NodeGroup {
    let mut res = NodeGroup::new();
    for code in codes {
        match source {
            LabelSource::Icd10 => res = &res | &index.matching(&code.normalised),
            LabelSource::ReadViaMap(map) => {
                for target in map.targets(&code.normalised) {
                    res = &res | &index.matching_alt(target);
                }
            }
        }
    }
    res
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::phenotype::{
        HistoricalCode, HistoricalComponent, HistoricalConcept, HistoryType, LogicalType,
    };
    use crate::{NodeId, Properties};
    use serde_json::json;

    fn matches_of(code: &str, source: &LabelSource, index: &DiseaseIndex) -> Vec<NodeId> {
        let resolved = ResolvedCode {
            concept_id: 0,
            concept_version_id: 0,
            code: code.to_string(),
            normalised: normalise(code),
        };
        candidates(&[resolved], source, index).iter().collect()
    }

    fn ontology() -> Ontology {
        let mut ontology = Ontology::default();
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
                "Status asthmaticus",
                OntologyType::ClinicalDomain,
                Properties::try_from(json!({"code": "J46"})).unwrap(),
                None,
            )
            .unwrap();
        ontology
    }

    #[test]
    fn icd10_exact_code() {
        let index = DiseaseIndex::new(&ontology());
        assert_eq!(matches_of("J45", &LabelSource::Icd10, &index), vec![NodeId::from(1u32)]);
        assert!(matches_of("J45.0", &LabelSource::Icd10, &index).is_empty());
        assert!(matches_of("J46", &LabelSource::Icd10, &index).is_empty());
        assert!(matches_of("", &LabelSource::Icd10, &index).is_empty());
    }

    #[test]
    fn read_via_map() {
        let index = DiseaseIndex::new(&ontology());
        let mut map = CodeMap::new();
        map.insert("H33..", "J45");
        let source = LabelSource::ReadViaMap(map);
        assert_eq!(source.coding_system(), CodingSystemId::READ_V2);
        assert_eq!(matches_of("H33..", &source, &index), vec![NodeId::from(1u32)]);
        assert!(matches_of("H34..", &source, &index).is_empty());
    }

    #[test]
    fn dedup_keeps_highest_version() {
        let mut history = ConceptHistory::new();
        for history_id in [10, 20] {
            history.insert_concept(HistoricalConcept {
                id: 1,
                history_id,
                history_type: HistoryType::Changed,
                name: "Asthma".to_string(),
                coding_system: CodingSystemId::ICD10,
            });
        }
        history.insert_component(HistoricalComponent {
            id: 5,
            concept_id: 1,
            history_id: 3,
            history_type: HistoryType::Created,
            logical_type: LogicalType::Include,
        });
        history.insert_code(HistoricalCode {
            id: 9,
            component_id: 5,
            history_id: 3,
            history_type: HistoryType::Created,
            code: "J45".to_string(),
            description: String::new(),
        });

        let template = TemplateData::from(json!({"concept_information": [
            {"concept_id": 1, "concept_version_id": 10},
            {"concept_id": 1, "concept_version_id": 20},
        ]}));
        let codes = resolve_codes(&template, &history, CodingSystemId::ICD10).unwrap();
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].concept_version_id, 20);

        let missing = TemplateData::from(json!({"concept_information": [
            {"concept_id": 2, "concept_version_id": 1},
        ]}));
        assert!(resolve_codes(&missing, &history, CodingSystemId::ICD10).is_err());
    }
}
