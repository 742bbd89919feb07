//! Phenotype definitions in their live and historical form
//!
//! A phenotype references versions of clinical concepts in its
//! `template_data`. The concepts themselves, their components and codes are
//! kept in the [`ConceptHistory`].

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::coding::CodingSystemId;
use crate::search::TsVector;
use crate::{NodeGroup, NodeId, PhenotagError, PhenotagResult};

mod concept;

pub use concept::{
    ConceptHistory, HistoricalCode, HistoricalComponent, HistoricalConcept, LogicalType,
    ResolvedCode,
};

/// The kind of change a historical row records
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryType {
    /// The entity was created
    #[default]
    #[serde(rename = "+")]
    Created,
    /// The entity was changed
    #[serde(rename = "~")]
    Changed,
    /// The entity was deleted
    #[serde(rename = "-")]
    Deleted,
}

impl Display for HistoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = match self {
            HistoryType::Created => '+',
            HistoryType::Changed => '~',
            HistoryType::Deleted => '-',
        };
        write!(f, "{c}")
    }
}

/// A versioned reference to a clinical concept
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConceptReference {
    /// The id of the concept
    pub concept_id: i64,
    /// The `history_id` of the referenced concept version
    pub concept_version_id: i64,
}

/// The open JSON document of a phenotype
///
/// Only `concept_information`, `coding_system` and `ontology` are
/// interpreted, every other key is kept as is. Accessors report a
/// [`PhenotagError::DataIntegrity`] if a key holds an unexpected shape.
/// Missing keys are treated as empty lists.
///
/// # Examples
///
/// ```
/// use phenotag::phenotype::TemplateData;
/// use serde_json::json;
///
/// let data = TemplateData::from(json!({
///     "concept_information": [{"concept_id": 1, "concept_version_id": 10}],
///     "ontology": [3, 1],
/// }));
/// assert_eq!(data.concept_information().unwrap()[0].concept_version_id, 10);
/// assert_eq!(data.ontology().unwrap().len(), 2);
///
/// let broken = TemplateData::from(json!({"ontology": "J45"}));
/// assert!(broken.ontology().is_err());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateData {
    inner: Value,
}

impl TemplateData {
    /// Returns the raw value of `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    /// Returns the referenced concept versions
    ///
    /// # Errors
    ///
    /// If `concept_information` is not a list of references it returns
    /// [`PhenotagError::DataIntegrity`]
    pub fn concept_information(&self) -> PhenotagResult<Vec<ConceptReference>> {
        self.list("concept_information")
    }

    /// Returns the coding systems of the phenotype
    ///
    /// # Errors
    ///
    /// If `coding_system` is not a list of integers it returns
    /// [`PhenotagError::DataIntegrity`]
    pub fn coding_systems(&self) -> PhenotagResult<Vec<CodingSystemId>> {
        self.list("coding_system")
    }

    /// Returns the ontology labels of the phenotype
    ///
    /// # Errors
    ///
    /// If `ontology` is not a list of node ids it returns
    /// [`PhenotagError::DataIntegrity`]
    pub fn ontology(&self) -> PhenotagResult<NodeGroup> {
        self.list::<NodeId>("ontology").map(NodeGroup::from)
    }

    /// Replaces the ontology labels of the phenotype
    pub fn set_ontology(&mut self, labels: &NodeGroup) {
        let labels = Value::from(labels.iter().map(|id| id.as_u32()).collect::<Vec<u32>>());
        match &mut self.inner {
            Value::Object(map) => {
                map.insert("ontology".to_string(), labels);
            }
            other => {
                let mut map = Map::new();
                map.insert("ontology".to_string(), labels);
                *other = Value::Object(map);
            }
        }
    }

    fn list<T: DeserializeOwned>(&self, key: &str) -> PhenotagResult<Vec<T>> {
        let integrity = |shape: String| PhenotagError::DataIntegrity {
            entity: format!("template_data.{key}"),
            shape,
        };
        match self.inner.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    T::deserialize(item).map_err(|err| integrity(format!("{item}: {err}")))
                })
                .collect(),
            Some(other) => Err(integrity(format!("expected a list, found {other}"))),
        }
    }
}

impl From<Value> for TemplateData {
    fn from(inner: Value) -> Self {
        Self { inner }
    }
}

/// A live phenotype row
///
/// `search_vector` is derived by the phenotype trigger of the store
/// whenever the row is written.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Phenotype {
    /// The public id, e.g. `PH12`
    pub id: String,
    /// The name of the phenotype
    pub name: String,
    /// Authors of the definition
    #[serde(default)]
    pub author: String,
    /// Free text definition
    #[serde(default)]
    pub definition: String,
    /// Free text implementation notes
    #[serde(default)]
    pub implementation: String,
    /// Free text validation notes
    #[serde(default)]
    pub validation: String,
    /// The open template document
    #[serde(default)]
    pub template_data: TemplateData,
    /// Brands the phenotype is published under
    #[serde(default)]
    pub brands: Vec<i32>,
    /// Soft-delete flag
    #[serde(default)]
    pub is_deleted: bool,
    /// The registered DOI, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default)]
    search_vector: TsVector,
}

impl Phenotype {
    /// Constructs a phenotype with empty text fields and template
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Returns the derived search vector
    pub fn search_vector(&self) -> &TsVector {
        &self.search_vector
    }

    pub(crate) fn set_search_vector(&mut self, vector: TsVector) {
        self.search_vector = vector;
    }
}

/// A historical phenotype row
///
/// The same columns as [`Phenotype`] plus the version metadata.
/// `history_id` is unique across all versions of all phenotypes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPhenotype {
    /// The version id
    pub history_id: i64,
    /// When the version was recorded
    pub history_date: DateTime<Utc>,
    /// The kind of change
    #[serde(default)]
    pub history_type: HistoryType,
    /// The phenotype columns of this version
    #[serde(flatten)]
    pub phenotype: Phenotype,
}

impl HistoricalPhenotype {
    /// Records `phenotype` as version `history_id`
    pub fn new(phenotype: Phenotype, history_id: i64, history_type: HistoryType) -> Self {
        Self {
            history_id,
            history_date: Utc::now(),
            history_type,
            phenotype,
        }
    }

    /// A `PH12/4` style label of the version
    pub fn label(&self) -> String {
        format!("{}/{}", self.phenotype.id, self.history_id)
    }
}
