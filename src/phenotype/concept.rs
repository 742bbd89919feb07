use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::code::{normalise, NormalisedCode};
use crate::coding::CodingSystemId;
use crate::phenotype::HistoryType;
use crate::{PhenotagError, PhenotagResult};

/// Whether the codes of a component are added to or removed from a concept
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    /// The codes are part of the concept
    #[default]
    Include,
    /// The codes are removed from the concept
    Exclude,
}

/// A version of a clinical concept
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalConcept {
    /// The id of the concept
    pub id: i64,
    /// The version id
    pub history_id: i64,
    /// The kind of change
    #[serde(default)]
    pub history_type: HistoryType,
    /// The name of the concept
    #[serde(default)]
    pub name: String,
    /// The coding system all codes of the concept belong to
    pub coding_system: CodingSystemId,
}

/// A version of a component of a concept
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalComponent {
    /// The id of the component
    pub id: i64,
    /// The concept the component belongs to
    pub concept_id: i64,
    /// The version id
    pub history_id: i64,
    /// The kind of change
    #[serde(default)]
    pub history_type: HistoryType,
    /// Whether the codes are included or excluded
    #[serde(default)]
    pub logical_type: LogicalType,
}

/// A version of a code of a component
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalCode {
    /// The id of the code row
    pub id: i64,
    /// The component the code belongs to
    pub component_id: i64,
    /// The version id
    pub history_id: i64,
    /// The kind of change
    #[serde(default)]
    pub history_type: HistoryType,
    /// The clinical code
    pub code: String,
    /// Human readable description
    #[serde(default)]
    pub description: String,
}

/// A code of a resolved concept version
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResolvedCode {
    /// The concept the code was resolved from
    pub concept_id: i64,
    /// The concept version the code was resolved from
    pub concept_version_id: i64,
    /// The code as stored
    pub code: String,
    /// The normal forms of `code`
    pub normalised: NormalisedCode,
}

/// The historical rows of concepts, components and codes
///
/// Rows are only ever added. A concept version `V` sees every component
/// and code event with a `history_id` up to and including `V`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "ConceptRows", into = "ConceptRows")]
pub struct ConceptHistory {
    concepts: BTreeMap<(i64, i64), HistoricalConcept>,
    components: BTreeMap<i64, Vec<HistoricalComponent>>,
    codes: BTreeMap<i64, Vec<HistoricalCode>>,
}

impl ConceptHistory {
    /// Constructs an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a concept version
    pub fn insert_concept(&mut self, concept: HistoricalConcept) {
        self.concepts
            .insert((concept.id, concept.history_id), concept);
    }

    /// Adds a component event
    pub fn insert_component(&mut self, component: HistoricalComponent) {
        self.components
            .entry(component.concept_id)
            .or_default()
            .push(component);
    }

    /// Adds a code event
    pub fn insert_code(&mut self, code: HistoricalCode) {
        self.codes.entry(code.component_id).or_default().push(code);
    }

    /// Returns the concept version, if present
    pub fn concept(&self, concept_id: i64, history_id: i64) -> Option<&HistoricalConcept> {
        self.concepts.get(&(concept_id, history_id))
    }

    /// Resolves the code set of a concept version
    ///
    /// A component is active if it has at least one event at or before the
    /// version and none of them is a deletion. The codes of active include
    /// components, minus the codes of active exclude components, form the
    /// code set. Codes are compared by their `alt_code`. Deleted and blank
    /// codes are skipped, and every code is listed once.
    ///
    /// Concepts of a different coding system resolve to an empty set.
    ///
    /// # Errors
    ///
    /// If the concept version does not exist it returns
    /// [`PhenotagError::DataIntegrity`]
    pub fn resolve(
        &self,
        concept_id: i64,
        version: i64,
        coding_system: CodingSystemId,
    ) -> PhenotagResult<Vec<ResolvedCode>> {
        let concept =
            self.concept(concept_id, version)
                .ok_or_else(|| PhenotagError::DataIntegrity {
                    entity: format!("concept C{concept_id}/{version}"),
                    shape: "no historical row".to_string(),
                })?;
        if concept.coding_system != coding_system {
            trace!(
                "Concept C{concept_id}/{version} uses {}, skipping",
                concept.coding_system
            );
            return Ok(Vec::new());
        }

        let mut includes: Vec<ResolvedCode> = Vec::new();
        let mut excludes: HashSet<String> = HashSet::new();
        for (component_id, logical_type) in self.active_components(concept_id, version) {
            for code in self.active_codes(component_id, version) {
                let normalised = normalise(code.trim());
                match logical_type {
                    LogicalType::Include => includes.push(ResolvedCode {
                        concept_id,
                        concept_version_id: version,
                        code: code.trim().to_string(),
                        normalised,
                    }),
                    LogicalType::Exclude => {
                        excludes.insert(normalised.alt_code().to_string());
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        includes.retain(|code| {
            !excludes.contains(code.normalised.alt_code())
                && seen.insert(code.normalised.dot_code().to_string())
        });
        Ok(includes)
    }

    /// Component ids and logical types of the active components
    fn active_components(&self, concept_id: i64, version: i64) -> Vec<(i64, LogicalType)> {
        let mut latest: BTreeMap<i64, (&HistoricalComponent, bool)> = BTreeMap::new();
        for event in self.components.get(&concept_id).into_iter().flatten() {
            if event.history_id > version {
                continue;
            }
            let deleted = event.history_type == HistoryType::Deleted;
            latest
                .entry(event.id)
                .and_modify(|(current, was_deleted)| {
                    if event.history_id > current.history_id {
                        *current = event;
                    }
                    *was_deleted |= deleted;
                })
                .or_insert((event, deleted));
        }
        latest
            .into_iter()
            .filter(|(_, (_, deleted))| !deleted)
            .map(|(id, (event, _))| (id, event.logical_type))
            .collect()
    }

    /// The latest non-deleted, non-blank code values of a component
    fn active_codes(&self, component_id: i64, version: i64) -> Vec<&str> {
        let mut latest: BTreeMap<i64, &HistoricalCode> = BTreeMap::new();
        for event in self.codes.get(&component_id).into_iter().flatten() {
            if event.history_id > version {
                continue;
            }
            latest
                .entry(event.id)
                .and_modify(|current| {
                    if event.history_id > current.history_id {
                        *current = event;
                    }
                })
                .or_insert(event);
        }
        latest
            .into_values()
            .filter(|event| event.history_type != HistoryType::Deleted)
            .map(|event| event.code.as_str())
            .filter(|code| !code.trim().is_empty())
            .collect()
    }
}

#[derive(Serialize, Deserialize)]
struct ConceptRows {
    #[serde(default)]
    concepts: Vec<HistoricalConcept>,
    #[serde(default)]
    components: Vec<HistoricalComponent>,
    #[serde(default)]
    codes: Vec<HistoricalCode>,
}

impl From<ConceptRows> for ConceptHistory {
    fn from(rows: ConceptRows) -> Self {
        let mut history = ConceptHistory::new();
        rows.concepts
            .into_iter()
            .for_each(|concept| history.insert_concept(concept));
        rows.components
            .into_iter()
            .for_each(|component| history.insert_component(component));
        rows.codes
            .into_iter()
            .for_each(|code| history.insert_code(code));
        history
    }
}

impl From<ConceptHistory> for ConceptRows {
    fn from(history: ConceptHistory) -> Self {
        ConceptRows {
            concepts: history.concepts.into_values().collect(),
            components: history.components.into_values().flatten().collect(),
            codes: history.codes.into_values().flatten().collect(),
        }
    }
}
