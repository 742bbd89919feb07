//! Ontology nodes and their typed attributes
//!
//! [`OntologyNode`] is the public, read-only view of a single node of the
//! [`crate::Ontology`]. Nodes are identified by [`NodeId`] and grouped in
//! [`NodeGroup`]s.
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::coding::CodingSystemId;
use crate::{PhenotagError, PhenotagResult};

mod group;
pub(crate) mod internal;
mod nodeid;
mod ontologynode;

pub use group::{Iter, NodeGroup};
pub use nodeid::NodeId;
pub use ontologynode::{Nodes, OntologyNode};

/// The type of an ontology node
///
/// The type is persisted as a plain integer so that the stored column does
/// not depend on the Rust representation.
///
/// # Examples
///
/// ```
/// use phenotag::OntologyType;
///
/// let kind = OntologyType::try_from(0u8).unwrap();
/// assert_eq!(kind, OntologyType::ClinicalDisease);
/// assert_eq!(kind.name(), "CLINICAL_DISEASE");
/// assert_eq!(kind.label(), "Disease (ICD-10)");
/// assert!(OntologyType::try_from(7u8).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OntologyType {
    /// Disease categories, e.g. the ICD-10 chapters and blocks
    ClinicalDisease = 0,
    /// Clinical specialities
    ClinicalDomain = 1,
    /// Anatomical categories
    ClinicalFunctionalAnatomy = 2,
}

impl OntologyType {
    /// All ontology types, ordered by their integer value
    pub const ALL: [OntologyType; 3] = [
        OntologyType::ClinicalDisease,
        OntologyType::ClinicalDomain,
        OntologyType::ClinicalFunctionalAnatomy,
    ];

    /// Returns the persisted integer value
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Returns the constant name, e.g. `CLINICAL_DISEASE`
    pub fn name(&self) -> &'static str {
        match self {
            OntologyType::ClinicalDisease => "CLINICAL_DISEASE",
            OntologyType::ClinicalDomain => "CLINICAL_DOMAIN",
            OntologyType::ClinicalFunctionalAnatomy => "CLINICAL_FUNCTIONAL_ANATOMY",
        }
    }

    /// Returns the human readable label
    pub fn label(&self) -> &'static str {
        match self {
            OntologyType::ClinicalDisease => "Disease (ICD-10)",
            OntologyType::ClinicalDomain => "Clinical Domain",
            OntologyType::ClinicalFunctionalAnatomy => "Functional Anatomy",
        }
    }
}

impl TryFrom<u8> for OntologyType {
    type Error = PhenotagError;
    fn try_from(value: u8) -> PhenotagResult<Self> {
        OntologyType::ALL
            .into_iter()
            .find(|kind| kind.as_u8() == value)
            .ok_or_else(|| PhenotagError::Validation {
                field: "type_id",
                reason: format!("{value} is not a known ontology type"),
            })
    }
}

impl TryFrom<&str> for OntologyType {
    type Error = PhenotagError;
    fn try_from(value: &str) -> PhenotagResult<Self> {
        OntologyType::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| PhenotagError::Validation {
                field: "type_id",
                reason: format!("{value} is not a known ontology type"),
            })
    }
}

impl From<OntologyType> for u8 {
    fn from(kind: OntologyType) -> Self {
        kind.as_u8()
    }
}

impl Display for OntologyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The open key-value properties of an ontology node
///
/// Disease nodes carry `code`, `coding_system_id` and, once the code
/// was resolved against the coding system table, `code_id`. Other node
/// types can store arbitrary keys.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties {
    inner: Map<String, Value>,
}

impl Properties {
    /// Constructs empty [`Properties`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value of `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    /// Sets `key` to `value` and returns the previous value
    pub fn insert<V: Into<Value>>(&mut self, key: &str, value: V) -> Option<Value> {
        self.inner.insert(key.to_string(), value.into())
    }

    /// Removes `key` and returns its value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.inner.remove(key)
    }

    /// Returns `true` if no property is set
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the underlying JSON object
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.inner
    }

    /// Returns the clinical code, if set
    pub fn code(&self) -> Option<&str> {
        self.inner.get("code").and_then(Value::as_str)
    }

    /// Returns the coding system of the code, if set
    ///
    /// Accepts both numbers and numeric strings
    pub fn coding_system_id(&self) -> Option<CodingSystemId> {
        match self.inner.get("coding_system_id")? {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).map(Into::into),
            Value::String(s) => CodingSystemId::try_from(s.as_str()).ok(),
            _ => None,
        }
    }

    /// Returns the primary key of the matching coding system row, if resolved
    pub fn code_id(&self) -> Option<u64> {
        self.inner.get("code_id").and_then(Value::as_u64)
    }

    /// Sets the primary key of the matching coding system row
    pub fn set_code_id(&mut self, code_id: u64) {
        self.inner.insert("code_id".to_string(), code_id.into());
    }

    /// Returns the typed view of disease properties
    ///
    /// Returns `None` unless both `code` and `coding_system_id` are set
    pub fn disease(&self) -> Option<DiseaseProperties> {
        Some(DiseaseProperties {
            code: self.code()?.to_string(),
            coding_system_id: self.coding_system_id()?,
            code_id: self.code_id(),
        })
    }
}

impl From<Map<String, Value>> for Properties {
    fn from(inner: Map<String, Value>) -> Self {
        Self { inner }
    }
}

impl TryFrom<Value> for Properties {
    type Error = PhenotagError;
    fn try_from(value: Value) -> PhenotagResult<Self> {
        match value {
            Value::Object(inner) => Ok(Self { inner }),
            Value::Null => Ok(Self::default()),
            other => Err(PhenotagError::Validation {
                field: "properties",
                reason: format!("expected an object, found {other}"),
            }),
        }
    }
}

/// Typed view of the properties of a disease node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiseaseProperties {
    /// The clinical code, e.g. `J45`
    pub code: String,
    /// The coding system of `code`
    pub coding_system_id: CodingSystemId,
    /// The primary key of the resolved coding system row
    pub code_id: Option<u64>,
}

impl From<DiseaseProperties> for Properties {
    fn from(disease: DiseaseProperties) -> Self {
        let mut properties = Properties::new();
        properties.insert("code", disease.code);
        properties.insert("coding_system_id", disease.coding_system_id.as_u32());
        if let Some(code_id) = disease.code_id {
            properties.set_code_id(code_id);
        }
        properties
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn ontology_type_names() {
        assert_eq!(
            OntologyType::try_from("clinical_functional_anatomy").unwrap(),
            OntologyType::ClinicalFunctionalAnatomy
        );
        assert!(OntologyType::try_from("DISEASE").is_err());
        assert_eq!(serde_json::to_string(&OntologyType::ClinicalDomain).unwrap(), "1");
        let kind: OntologyType = serde_json::from_str("2").unwrap();
        assert_eq!(kind, OntologyType::ClinicalFunctionalAnatomy);
        assert!(serde_json::from_str::<OntologyType>("3").is_err());
    }

    #[test]
    fn disease_view() {
        let properties =
            Properties::try_from(json!({"code": "J45", "coding_system_id": "4"})).unwrap();
        let disease = properties.disease().unwrap();
        assert_eq!(disease.code, "J45");
        assert_eq!(disease.coding_system_id, CodingSystemId::ICD10);
        assert_eq!(disease.code_id, None);

        let mut properties: Properties = disease.into();
        properties.set_code_id(17);
        assert_eq!(properties.code_id(), Some(17));
        assert_eq!(properties.get("coding_system_id"), Some(&json!(4)));
    }

    #[test]
    fn open_properties() {
        let properties = Properties::try_from(json!({"system": "cardio"})).unwrap();
        assert!(properties.disease().is_none());
        assert!(properties.code().is_none());
        assert!(Properties::try_from(json!([1, 2])).is_err());
        assert!(Properties::try_from(Value::Null).unwrap().is_empty());
    }
}
