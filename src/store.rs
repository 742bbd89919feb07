//! The tables of the phenotype library and their transactional container
//!
//! [`Tables`] holds every relation the core works on. Writes to phenotype
//! rows go through methods that recompute the search vector before the row
//! is stored. [`Database`] guards the tables with a lock, runs closures
//! as all-or-nothing transactions and persists the tables as JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::coding::CodingTables;
use crate::doi::DoiQueue;
use crate::labeller::LabelUpdate;
use crate::ontology::NodeUpdate;
use crate::phenotype::{ConceptHistory, HistoricalPhenotype, HistoryType, Phenotype};
use crate::search::phenotype_search_vector;
use crate::{NodeGroup, NodeId, Ontology, OntologyType, PhenotagError, PhenotagResult, Properties};

/// All relations of the phenotype library
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Tables {
    /// Ontology nodes and edges
    #[serde(default)]
    pub ontology: Ontology,
    /// The read-only coding system tables
    #[serde(default)]
    pub coding: CodingTables,
    /// Historical concepts, components and codes
    #[serde(default)]
    pub concepts: ConceptHistory,
    #[serde(default)]
    phenotypes: BTreeMap<String, Phenotype>,
    #[serde(default)]
    phenotype_history: BTreeMap<i64, HistoricalPhenotype>,
    /// Phenotype versions waiting for DOI registration
    #[serde(default)]
    pub doi_queue: DoiQueue,
    /// Brand configurations, keyed by brand name
    #[serde(default)]
    pub brands: BTreeMap<String, Value>,
}

/// Phenotype rows
impl Tables {
    /// Returns the live phenotype, if present
    pub fn phenotype(&self, id: &str) -> Option<&Phenotype> {
        self.phenotypes.get(id)
    }

    /// Returns all live phenotypes, ordered by id
    pub fn phenotypes(&self) -> impl Iterator<Item = &Phenotype> {
        self.phenotypes.values()
    }

    /// Returns the phenotype version, if present
    pub fn historical_phenotype(&self, history_id: i64) -> Option<&HistoricalPhenotype> {
        self.phenotype_history.get(&history_id)
    }

    /// Returns the phenotype version with the given phenotype id and history id
    pub fn phenotype_version(&self, id: &str, history_id: i64) -> Option<&HistoricalPhenotype> {
        self.historical_phenotype(history_id)
            .filter(|version| version.phenotype.id == id)
    }

    /// Returns all phenotype versions, ordered by history id
    pub fn historical_phenotypes(&self) -> impl Iterator<Item = &HistoricalPhenotype> {
        self.phenotype_history.values()
    }

    /// Returns the history id of the latest version of the phenotype
    pub fn latest_history_id(&self, id: &str) -> Option<i64> {
        self.phenotype_history
            .values()
            .filter(|version| version.phenotype.id == id)
            .map(|version| version.history_id)
            .max()
    }

    /// Inserts or replaces a live phenotype
    ///
    /// # Errors
    ///
    /// - the id is blank: [`PhenotagError::Validation`]
    /// - the search vector cannot be computed, see
    ///   [`crate::search::phenotype_search_vector`]
    pub fn upsert_phenotype(&mut self, mut phenotype: Phenotype) -> PhenotagResult<()> {
        validate_phenotype_id(&phenotype.id)?;
        phenotype.set_search_vector(phenotype_search_vector(&phenotype, &self.ontology)?);
        self.phenotypes.insert(phenotype.id.clone(), phenotype);
        Ok(())
    }

    /// Inserts or replaces a phenotype version
    ///
    /// # Errors
    ///
    /// - the id is blank: [`PhenotagError::Validation`]
    /// - the search vector cannot be computed, see
    ///   [`crate::search::phenotype_search_vector`]
    pub fn upsert_phenotype_version(
        &mut self,
        mut version: HistoricalPhenotype,
    ) -> PhenotagResult<()> {
        validate_phenotype_id(&version.phenotype.id)?;
        let vector = phenotype_search_vector(&version.phenotype, &self.ontology)?;
        version.phenotype.set_search_vector(vector);
        self.phenotype_history.insert(version.history_id, version);
        Ok(())
    }

    /// Writes the live phenotype and records it as a new version
    ///
    /// Returns the history id of the new version.
    ///
    /// # Errors
    ///
    /// See [`Tables::upsert_phenotype`]
    pub fn save_phenotype(
        &mut self,
        phenotype: Phenotype,
        history_type: HistoryType,
    ) -> PhenotagResult<i64> {
        let history_id = self
            .phenotype_history
            .keys()
            .next_back()
            .map_or(1, |id| id + 1);
        self.upsert_phenotype(phenotype.clone())?;
        let version = HistoricalPhenotype::new(phenotype, history_id, history_type);
        self.upsert_phenotype_version(version)?;
        Ok(history_id)
    }

    /// Stores the labels of the labeller in the phenotype rows
    ///
    /// Every update is written to its version. The live row is updated as
    /// well if the version is the latest one of the phenotype. Returns the
    /// number of live rows updated.
    ///
    /// # Errors
    ///
    /// - a version does not exist: [`PhenotagError::PhenotypeNotFound`]
    /// - a label does not exist: [`PhenotagError::NodeNotFound`]
    pub fn apply_labels(&mut self, updates: &[LabelUpdate]) -> PhenotagResult<usize> {
        let mut live_updated = 0;
        for update in updates {
            let mut version = self
                .phenotype_version(&update.phenotype_id, update.history_id)
                .cloned()
                .ok_or_else(|| {
                    PhenotagError::PhenotypeNotFound(format!(
                        "{}/{}",
                        update.phenotype_id, update.history_id
                    ))
                })?;
            version.phenotype.template_data.set_ontology(&update.labels);
            self.upsert_phenotype_version(version)?;

            if self.latest_history_id(&update.phenotype_id) != Some(update.history_id) {
                continue;
            }
            if let Some(live) = self.phenotypes.get(&update.phenotype_id).cloned() {
                let mut live = live;
                live.template_data.set_ontology(&update.labels);
                self.upsert_phenotype(live)?;
                live_updated += 1;
            }
        }
        Ok(live_updated)
    }

    /// Recomputes the search vector of every phenotype row labelled with
    /// one of the `changed` nodes
    ///
    /// Running it again without further changes yields the same vectors.
    /// Returns the number of rows rewritten.
    ///
    /// # Errors
    ///
    /// Fails if a referenced node no longer exists
    pub fn refresh_phenotype_vectors(&mut self, changed: &NodeGroup) -> PhenotagResult<usize> {
        let references = |phenotype: &Phenotype| match phenotype.template_data.ontology() {
            Ok(labels) => !(&labels & changed).is_empty(),
            Err(err) => {
                warn!("Skipping phenotype {}: {err}", phenotype.id);
                false
            }
        };

        let live: Vec<Phenotype> = self
            .phenotypes
            .values()
            .filter(|phenotype| references(phenotype))
            .cloned()
            .collect();
        let versions: Vec<HistoricalPhenotype> = self
            .phenotype_history
            .values()
            .filter(|version| references(&version.phenotype))
            .cloned()
            .collect();

        let rewritten = live.len() + versions.len();
        for phenotype in live {
            self.upsert_phenotype(phenotype)?;
        }
        for version in versions {
            self.upsert_phenotype_version(version)?;
        }
        debug!("Refreshed {rewritten} phenotype rows");
        Ok(rewritten)
    }

    /// Recomputes the search vector of every phenotype row
    fn refresh_all_phenotype_vectors(&mut self) -> PhenotagResult<()> {
        let live: Vec<Phenotype> = self.phenotypes.values().cloned().collect();
        for phenotype in live {
            self.upsert_phenotype(phenotype)?;
        }
        let versions: Vec<HistoricalPhenotype> = self.phenotype_history.values().cloned().collect();
        for version in versions {
            self.upsert_phenotype_version(version)?;
        }
        Ok(())
    }
}

/// Ontology writes that affect phenotypes
impl Tables {
    /// Creates an ontology node, resolving disease codes against the coding tables
    ///
    /// # Errors
    ///
    /// See [`Ontology::create_node`]
    pub fn create_node(
        &mut self,
        name: &str,
        type_id: OntologyType,
        properties: Properties,
        reference_id: Option<i64>,
    ) -> PhenotagResult<NodeId> {
        self.ontology
            .create_node(name, type_id, properties, reference_id, &self.coding)
    }

    /// Updates an ontology node and refreshes all phenotypes labelled with it
    ///
    /// Returns the number of phenotype rows rewritten.
    ///
    /// # Errors
    ///
    /// See [`Ontology::update_node`] and [`Tables::refresh_phenotype_vectors`]
    pub fn update_node<I: Into<NodeId>>(
        &mut self,
        id: I,
        update: NodeUpdate,
    ) -> PhenotagResult<usize> {
        let id = id.into();
        self.ontology.update_node(id, update)?;
        self.refresh_phenotype_vectors(&NodeGroup::from(vec![id]))
    }
}

fn validate_phenotype_id(id: &str) -> PhenotagResult<()> {
    if id.trim().is_empty() {
        return Err(PhenotagError::Validation {
            field: "id",
            reason: "phenotype id must not be blank".to_string(),
        });
    }
    Ok(())
}

/// Lock-guarded [`Tables`] with transactions and JSON persistence
///
/// # Examples
///
/// ```
/// use phenotag::{Database, OntologyType, Properties};
///
/// let db = Database::in_memory();
/// let id = db
///     .transaction(|tables| {
///         tables.create_node("Cardiology", OntologyType::ClinicalDomain, Properties::new(), None)
///     })
///     .unwrap();
///
/// let name = db
///     .read(|tables| tables.ontology.node(id).map(|node| node.name().to_string()))
///     .unwrap();
/// assert_eq!(name.as_deref(), Some("Cardiology"));
///
/// // a failing transaction leaves the tables untouched
/// let res = db.transaction(|tables| {
///     tables.create_node("Oncology", OntologyType::ClinicalDomain, Properties::new(), None)?;
///     tables.create_node("", OntologyType::ClinicalDomain, Properties::new(), None)
/// });
/// assert!(res.is_err());
/// assert_eq!(db.read(|tables| tables.ontology.len()).unwrap(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Database {
    path: Option<PathBuf>,
    tables: RwLock<Tables>,
}

impl Database {
    /// Creates an empty database that is never persisted
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Creates an in-memory database from existing tables
    ///
    /// All derived vectors are recomputed.
    ///
    /// # Errors
    ///
    /// Fails if a phenotype references a missing node
    pub fn new(mut tables: Tables) -> PhenotagResult<Self> {
        tables.ontology.refresh_vectors();
        tables.refresh_all_phenotype_vectors()?;
        Ok(Self {
            path: None,
            tables: RwLock::new(tables),
        })
    }

    /// Loads the database from a JSON snapshot
    ///
    /// A missing file opens an empty database that is saved to `path`.
    ///
    /// # Errors
    ///
    /// - the file cannot be read: [`PhenotagError::CannotOpenFile`]
    /// - the snapshot is malformed: [`PhenotagError::Json`] or
    ///   [`PhenotagError::DataIntegrity`]
    pub fn open<P: AsRef<Path>>(path: P) -> PhenotagResult<Self> {
        let path = path.as_ref();
        let mut db = if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|_| PhenotagError::CannotOpenFile(path.display().to_string()))?;
            let tables: Tables = serde_json::from_str(&content)?;
            Self::new(tables)?
        } else {
            info!("No database at {}, starting empty", path.display());
            Self::default()
        };
        db.path = Some(path.to_path_buf());
        debug!("Opened database {}", path.display());
        Ok(db)
    }

    /// The file the database is saved to, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Runs `f` against a consistent snapshot of the tables
    ///
    /// # Errors
    ///
    /// If another thread panicked while writing it returns
    /// [`PhenotagError::LockPoisoned`]
    pub fn read<T, F: FnOnce(&Tables) -> T>(&self, f: F) -> PhenotagResult<T> {
        let tables = self.tables.read().map_err(|_| PhenotagError::LockPoisoned)?;
        Ok(f(&tables))
    }

    /// Runs `f` as a transaction
    ///
    /// `f` operates on a copy of the tables, which replaces the tables only
    /// if `f` succeeds. Transactions are serialised.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or [`PhenotagError::LockPoisoned`]
    pub fn transaction<T, F>(&self, f: F) -> PhenotagResult<T>
    where
        F: FnOnce(&mut Tables) -> PhenotagResult<T>,
    {
        let mut tables = self.tables.write().map_err(|_| PhenotagError::LockPoisoned)?;
        let mut working = tables.clone();
        let res = f(&mut working)?;
        *tables = working;
        Ok(res)
    }

    /// Writes the tables to the file of the database
    ///
    /// # Errors
    ///
    /// - the database is in-memory only: [`PhenotagError::InvalidInput`]
    /// - writing fails: [`PhenotagError::Io`]
    pub fn save(&self) -> PhenotagResult<()> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| PhenotagError::InvalidInput("database has no file".to_string()))?;
        self.save_as(path)
    }

    /// Writes the tables to `path`
    ///
    /// The snapshot is written to a temporary sibling first and then moved
    /// into place.
    ///
    /// # Errors
    ///
    /// Writing fails: [`PhenotagError::Io`]
    pub fn save_as<P: AsRef<Path>>(&self, path: P) -> PhenotagResult<()> {
        let path = path.as_ref();
        let content = {
            let tables = self.tables.read().map_err(|_| PhenotagError::LockPoisoned)?;
            serde_json::to_string(&*tables)?
        };
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        info!("Saved database to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::phenotype::HistoryType;
    use crate::search::TsQuery;
    use serde_json::json;

    fn tables() -> (Tables, NodeId) {
        let mut tables = Tables::default();
        let node = tables
            .create_node(
                "Asthma",
                OntologyType::ClinicalDisease,
                Properties::try_from(json!({"code": "J45"})).unwrap(),
                None,
            )
            .unwrap();
        (tables, node)
    }

    #[test]
    fn phenotype_trigger() {
        let (mut tables, node) = tables();
        let mut phenotype = Phenotype::new("PH1", "Wheeze");
        phenotype.author = "Smith".to_string();
        let history_id = tables.save_phenotype(phenotype.clone(), HistoryType::Created).unwrap();
        assert_eq!(history_id, 1);
        assert!(tables.phenotype("PH1").unwrap().search_vector().contains("smith"));

        phenotype.template_data.set_ontology(&vec![node].into());
        let history_id = tables.save_phenotype(phenotype, HistoryType::Changed).unwrap();
        assert_eq!(history_id, 2);
        let query = TsQuery::websearch("asthma");
        assert!(query.matches(tables.phenotype("PH1").unwrap().search_vector()));
        assert!(query.matches(tables.historical_phenotype(2).unwrap().phenotype.search_vector()));
        assert!(!query.matches(tables.historical_phenotype(1).unwrap().phenotype.search_vector()));
        assert_eq!(tables.latest_history_id("PH1"), Some(2));
    }

    #[test]
    fn unknown_labels_are_rejected() {
        let (mut tables, _) = tables();
        let mut phenotype = Phenotype::new("PH1", "Wheeze");
        phenotype.template_data.set_ontology(&vec![42u32].into());
        assert!(tables.upsert_phenotype(phenotype).is_err());
        assert!(tables.upsert_phenotype(Phenotype::new(" ", "Blank")).is_err());
        assert_eq!(tables.phenotypes().count(), 0);
    }

    #[test]
    fn node_update_refreshes_phenotypes() {
        let (mut tables, node) = tables();
        let mut phenotype = Phenotype::new("PH1", "Wheeze");
        phenotype.template_data.set_ontology(&vec![node].into());
        tables.save_phenotype(phenotype, HistoryType::Created).unwrap();
        tables.save_phenotype(Phenotype::new("PH2", "Other"), HistoryType::Created).unwrap();

        let update = NodeUpdate {
            synonyms: Some("bronchospasm".to_string()),
            ..Default::default()
        };
        assert_eq!(tables.update_node(node, update).unwrap(), 2);
        let query = TsQuery::websearch("bronchospasm");
        assert!(query.matches(tables.phenotype("PH1").unwrap().search_vector()));
        assert!(!query.matches(tables.phenotype("PH2").unwrap().search_vector()));

        let before = tables.phenotype("PH1").cloned();
        assert_eq!(tables.refresh_phenotype_vectors(&vec![node].into()).unwrap(), 2);
        assert_eq!(tables.phenotype("PH1").cloned(), before);
    }

    #[test]
    fn labels_update_latest_version_only() {
        let (mut tables, node) = tables();
        tables.save_phenotype(Phenotype::new("PH1", "Wheeze"), HistoryType::Created).unwrap();
        tables.save_phenotype(Phenotype::new("PH1", "Wheeze"), HistoryType::Changed).unwrap();

        let labels = NodeGroup::from(vec![node]);
        let old = LabelUpdate {
            phenotype_id: "PH1".to_string(),
            history_id: 1,
            labels: labels.clone(),
        };
        assert_eq!(tables.apply_labels(&[old]).unwrap(), 0);
        assert!(tables.phenotype("PH1").unwrap().template_data.ontology().unwrap().is_empty());

        let latest = LabelUpdate {
            phenotype_id: "PH1".to_string(),
            history_id: 2,
            labels: labels.clone(),
        };
        assert_eq!(tables.apply_labels(&[latest]).unwrap(), 1);
        assert_eq!(tables.phenotype("PH1").unwrap().template_data.ontology().unwrap(), labels);

        let missing = LabelUpdate {
            phenotype_id: "PH9".to_string(),
            history_id: 2,
            labels,
        };
        assert!(matches!(
            tables.apply_labels(&[missing]),
            Err(PhenotagError::PhenotypeNotFound(_))
        ));
    }

    #[test]
    fn persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");

        let db = Database::open(&path).unwrap();
        db.transaction(|tables| {
            let domain = OntologyType::ClinicalDomain;
            let child = tables.create_node("Child", domain, Properties::new(), None)?;
            let parent = tables.create_node("Parent", domain, Properties::new(), None)?;
            tables.ontology.create_edge(parent, child)?;
            let mut phenotype = Phenotype::new("PH1", "Wheeze");
            phenotype.template_data.set_ontology(&vec![child].into());
            tables.save_phenotype(phenotype, HistoryType::Created)
        })
        .unwrap();
        db.save().unwrap();

        let restored = Database::open(&path).unwrap();
        restored
            .read(|tables| {
                assert_eq!(tables.ontology.len(), 2);
                let child = tables.ontology.node(1u32).unwrap();
                assert_eq!(child.parent_ids().len(), 1);
                assert!(child.search_vector().contains("child"));
                assert!(tables.phenotype("PH1").unwrap().search_vector().contains("child"));
            })
            .unwrap();

        assert!(Database::in_memory().save().is_err());
    }
}
