//! Bulk import of ontology documents
//!
//! An ontology document is a JSON object `{"type": ..., "data": [...]}`
//! holding a forest of categories. Categories that appear under several
//! parents are merged into one node, which is how a document expresses
//! a DAG:
//!
//! ```text
//! {
//!   "type": "CODE_CATEGORIES",
//!   "data": [
//!     {"name": "Diseases of the respiratory system", "code": "J00-J99", "children": [
//!       {"name": "Asthma", "code": "J45", "synonyms": ["wheeze"]}
//!     ]}
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::code::normalise;
use crate::coding::CodingSystemId;
use crate::ontology::NodeUpdate;
use crate::{NodeId, OntologyType, PhenotagError, PhenotagResult, Properties, Tables};

/// The kind of categories in an ontology document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    /// Disease categories, e.g. ICD-10 chapters and blocks
    CodeCategories,
    /// Anatomical categories
    AnatomicalCategories,
    /// Clinical specialities
    SpecialityCategories,
}

impl DocumentType {
    /// The node type the categories are stored as
    pub fn ontology_type(&self) -> OntologyType {
        match self {
            DocumentType::CodeCategories => OntologyType::ClinicalDisease,
            DocumentType::AnatomicalCategories => OntologyType::ClinicalFunctionalAnatomy,
            DocumentType::SpecialityCategories => OntologyType::ClinicalDomain,
        }
    }
}

/// A category and its subcategories
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Name of the node
    pub name: String,
    /// Clinical code, only used for disease categories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Coding system of `code`, defaults to ICD-10
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coding_system_id: Option<CodingSystemId>,
    /// External reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<i64>,
    /// Alternative names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    /// Subcategories
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Category>,
}

impl Category {
    fn new(name: String, code: Option<String>) -> Self {
        Self {
            name,
            code,
            ..Default::default()
        }
    }
}

/// A document of categories of one [`DocumentType`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OntologyDocument {
    /// The kind of all categories
    #[serde(rename = "type")]
    pub kind: DocumentType,
    /// The top level categories
    pub data: Vec<Category>,
}

/// Counts of an import
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Newly created nodes
    pub nodes: usize,
    /// Newly created edges
    pub edges: usize,
    /// Categories merged into an existing node
    pub merged: usize,
    /// Edges that already existed
    pub skipped_edges: usize,
}

impl OntologyDocument {
    /// Reads a document from a JSON file
    ///
    /// # Errors
    ///
    /// - the file cannot be opened: [`PhenotagError::CannotOpenFile`]
    /// - the file is not a valid document: [`PhenotagError::Json`]
    pub fn from_file<P: AsRef<Path>>(path: P) -> PhenotagResult<Self> {
        let filename = path.as_ref().display().to_string();
        let file = File::open(path).map_err(|_| PhenotagError::CannotOpenFile(filename))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Generates a deterministic disease document for smoke testing
    ///
    /// The document has `width` chapters with `width` blocks of `width`
    /// diseases each. The first disease of every block is also listed in
    /// the next chapter's first block, so the resulting ontology has
    /// nodes with multiple parents. `width` is capped at 10 to keep the
    /// generated codes unique.
    pub fn synthetic(width: usize) -> Self {
        let width = width.min(10);
        let disease = |chapter: usize, block: usize, leaf: usize| {
            let code = format!("X{chapter}{block}.{leaf}");
            Category::new(format!("Synthetic disease {code}"), Some(code))
        };

        let data = (0..width)
            .map(|chapter| {
                let mut category = Category::new(
                    format!("Synthetic chapter {chapter}"),
                    Some(format!("X{chapter}")),
                );
                category.children = (0..width)
                    .map(|block| {
                        let mut category = Category::new(
                            format!("Synthetic block {chapter}.{block}"),
                            Some(format!("X{chapter}{block}")),
                        );
                        category.children = (0..width)
                            .map(|leaf| disease(chapter, block, leaf))
                            .collect();
                        if block == 0 && chapter > 0 {
                            category.children.push(disease(chapter - 1, 0, 0));
                        }
                        category
                    })
                    .collect();
                category
            })
            .collect();

        Self {
            kind: DocumentType::CodeCategories,
            data,
        }
    }
}

/// Creates the nodes and edges of the document
///
/// Disease categories are merged by code, all other categories by name,
/// including nodes that exist from earlier imports. Existing edges are
/// skipped. Run it inside [`crate::Database::transaction`] so that a
/// failed import leaves the ontology untouched.
///
/// # Errors
///
/// - a category name is invalid: [`PhenotagError::Validation`]
/// - the document contains a cycle: [`PhenotagError::CycleCreated`]
pub fn import_document(
    tables: &mut Tables,
    document: &OntologyDocument,
) -> PhenotagResult<ImportReport> {
    let type_id = document.kind.ontology_type();
    let mut known: HashMap<String, NodeId> = tables
        .ontology
        .iter()
        .filter(|node| node.type_id() == type_id)
        .map(|node| {
            let key = merge_key(type_id, node.name(), node.properties().code());
            (key, node.id())
        })
        .collect();

    let mut report = ImportReport::default();
    let mut stack: Vec<(Option<NodeId>, &Category)> =
        document.data.iter().rev().map(|category| (None, category)).collect();

    while let Some((parent, category)) = stack.pop() {
        let key = merge_key(type_id, &category.name, category.code.as_deref());
        let id = match known.get(&key) {
            Some(id) => {
                report.merged += 1;
                *id
            }
            None => {
                let id = create_category(tables, type_id, category)?;
                known.insert(key, id);
                report.nodes += 1;
                id
            }
        };

        if let Some(parent) = parent {
            match tables.ontology.create_edge(parent, id) {
                Ok(_) => report.edges += 1,
                Err(PhenotagError::Duplicate { .. }) => {
                    debug!("Skipping existing edge {parent} -> {id}");
                    report.skipped_edges += 1;
                }
                Err(err) => return Err(err),
            }
        }
        stack.extend(category.children.iter().rev().map(|child| (Some(id), child)));
    }

    info!(
        "Imported {} nodes and {} edges of type {type_id}",
        report.nodes, report.edges
    );
    Ok(report)
}

/// Loads every `*.json` file in `dir` as a brand configuration
///
/// Configurations are keyed by file stem and replace existing ones.
/// Returns the number of loaded files.
///
/// # Errors
///
/// - the directory cannot be read: [`PhenotagError::CannotOpenFile`]
/// - a file is not valid JSON: [`PhenotagError::Json`]
pub fn load_brand_configs<P: AsRef<Path>>(tables: &mut Tables, dir: P) -> PhenotagResult<usize> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir)
        .map_err(|_| PhenotagError::CannotOpenFile(dir.display().to_string()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    for path in &paths {
        let Some(brand) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let content = fs::read_to_string(path)?;
        let config: Value = serde_json::from_str(&content)?;
        debug!("Loaded brand configuration {brand}");
        tables.brands.insert(brand.to_string(), config);
    }
    info!("Loaded {} brand configurations from {}", paths.len(), dir.display());
    Ok(paths.len())
}

fn create_category(
    tables: &mut Tables,
    type_id: OntologyType,
    category: &Category,
) -> PhenotagResult<NodeId> {
    let mut properties = Properties::new();
    if let Some(code) = category.code.as_deref().map(str::trim).filter(|code| !code.is_empty()) {
        properties.insert("code", code);
        if type_id == OntologyType::ClinicalDisease {
            let coding_system = category.coding_system_id.unwrap_or(CodingSystemId::ICD10);
            properties.insert("coding_system_id", coding_system.as_u32());
        }
    }
    let id = tables.create_node(&category.name, type_id, properties, category.reference_id)?;
    if !category.synonyms.is_empty() {
        let update = NodeUpdate {
            synonyms: Some(category.synonyms.join(" ")),
            ..Default::default()
        };
        tables.ontology.update_node(id, update)?;
    }
    Ok(id)
}

fn merge_key(type_id: OntologyType, name: &str, code: Option<&str>) -> String {
    match code.map(str::trim) {
        Some(code) if type_id == OntologyType::ClinicalDisease && !code.is_empty() => {
            format!("code:{}", normalise(code).dot_code())
        }
        _ => format!("name:{}", name.trim()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Database;
    use serde_json::json;

    fn document(value: serde_json::Value) -> OntologyDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn multi_parent_categories() {
        let doc = document(json!({
            "type": "CODE_CATEGORIES",
            "data": [
                {"name": "Respiratory", "code": "J00-J99", "children": [
                    {"name": "Asthma", "code": "J45", "synonyms": ["wheeze"]},
                    {"name": "Asthma", "code": "J45"}
                ]},
                {"name": "Allergy", "code": "T78", "children": [
                    {"name": "Allergic asthma", "code": "J45"}
                ]}
            ]
        }));
        let mut tables = Tables::default();
        let report = import_document(&mut tables, &doc).unwrap();
        assert_eq!(report.nodes, 3);
        assert_eq!(report.edges, 2);
        assert_eq!(report.skipped_edges, 1);
        assert_eq!(report.merged, 2);

        let asthma = tables
            .ontology
            .iter()
            .find(|node| node.properties().code() == Some("J45"))
            .unwrap();
        assert_eq!(asthma.parent_ids().len(), 2);
        assert_eq!(asthma.type_id(), OntologyType::ClinicalDisease);
        assert_eq!(asthma.properties().coding_system_id(), Some(CodingSystemId::ICD10));
        assert!(asthma.synonyms_vector().contains("wheeze"));

        // importing again only merges
        let again = import_document(&mut tables, &doc).unwrap();
        assert_eq!(again.nodes, 0);
        assert_eq!(again.edges, 0);
        assert_eq!(tables.ontology.len(), 3);
    }

    #[test]
    fn cycle_aborts_import() {
        let doc = document(json!({
            "type": "SPECIALITY_CATEGORIES",
            "data": [
                {"name": "Medicine", "children": [
                    {"name": "Cardiology", "children": [{"name": "Medicine"}]}
                ]}
            ]
        }));
        let db = Database::in_memory();
        let res = db.transaction(|tables| import_document(tables, &doc));
        assert!(matches!(res, Err(PhenotagError::CycleCreated { .. })));
        assert_eq!(db.read(|tables| tables.ontology.len()).unwrap(), 0);
    }

    #[test]
    fn unknown_document_type() {
        let res: Result<OntologyDocument, _> =
            serde_json::from_value(json!({"type": "DRUG_CATEGORIES", "data": []}));
        assert!(res.is_err());
    }

    #[test]
    fn brand_configs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ADP.json"), r#"{"title": "ADP"}"#).unwrap();
        fs::write(dir.path().join("HDRUK.json"), r#"{"title": "HDR UK"}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut tables = Tables::default();
        assert_eq!(load_brand_configs(&mut tables, dir.path()).unwrap(), 2);
        assert_eq!(tables.brands["HDRUK"], json!({"title": "HDR UK"}));

        fs::write(dir.path().join("broken.json"), "{").unwrap();
        assert!(load_brand_configs(&mut tables, dir.path()).is_err());
        assert!(load_brand_configs(&mut tables, dir.path().join("missing")).is_err());
    }

    #[test]
    fn synthetic_dag() {
        let doc = OntologyDocument::synthetic(3);
        assert_eq!(doc, OntologyDocument::synthetic(3));

        let mut tables = Tables::default();
        let report = import_document(&mut tables, &doc).unwrap();
        // 3 chapters, 9 blocks, 27 diseases
        assert_eq!(report.nodes, 39);
        assert_eq!(report.merged, 2);
        let shared = tables
            .ontology
            .iter()
            .find(|node| node.properties().code() == Some("X00.0"))
            .unwrap();
        assert_eq!(shared.parent_ids().len(), 2);
        assert_eq!(tables.ontology.max_depth(), 2);
    }
}
