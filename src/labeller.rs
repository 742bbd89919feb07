//! Labels phenotypes with the disease nodes their codes belong to
//!
//! For every historical phenotype version the labeller
//!
//! 1. resolves the codes of all referenced concept versions
//! 2. matches the codes to disease nodes of the ontology, the candidate set
//! 3. collapses the candidate set upwards with the [`ReducibleIndex`]
//!
//! The reduced set is stored in `template_data.ontology` of the version
//! and, if the version is the latest one, of the live phenotype as well.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::phenotype::{ConceptHistory, HistoricalPhenotype};
use crate::{Database, NodeGroup, Ontology, PhenotagResult};

mod mapper;
mod reducer;

pub use mapper::{candidates, resolve_codes, DiseaseIndex, LabelSource};
pub use reducer::{ReducibleIndex, Reduction};

/// The new labels of one phenotype version
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LabelUpdate {
    /// The id of the phenotype
    pub phenotype_id: String,
    /// The labelled version
    pub history_id: i64,
    /// The reduced label set
    pub labels: NodeGroup,
}

/// Summary of a labelling batch
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LabelReport {
    /// Number of phenotype versions processed
    pub processed: usize,
    /// Number of phenotype versions that could not be labelled
    pub failed: usize,
    /// Sum of the candidate set sizes
    pub candidates: usize,
    /// Sum of the reduced set sizes
    pub reduced: usize,
    /// The highest number of reduction steps of a single version
    pub max_steps: usize,
    /// The version that needed `max_steps`, e.g. `PH12/4`
    pub max_steps_phenotype: Option<String>,
    /// Number of live phenotypes updated
    pub live_updated: usize,
    /// The new labels, one entry per updated version
    pub updates: Vec<LabelUpdate>,
}

/// The labels of a single phenotype version
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Labelling {
    /// The matched disease nodes
    pub candidates: NodeGroup,
    /// The outcome of the reduction
    pub reduction: Reduction,
}

/// Labels phenotype versions against a snapshot of the ontology
///
/// The indices are built once and shared by all versions of a batch.
pub struct Labeller<'a> {
    history: &'a ConceptHistory,
    source: &'a LabelSource,
    diseases: DiseaseIndex,
    reducible: ReducibleIndex,
}

impl<'a> Labeller<'a> {
    /// Builds the disease and reducible indices of the ontology
    pub fn new(ontology: &Ontology, history: &'a ConceptHistory, source: &'a LabelSource) -> Self {
        Self {
            history,
            source,
            diseases: DiseaseIndex::new(ontology),
            reducible: ReducibleIndex::new(ontology),
        }
    }

    /// Computes the candidate and reduced label sets of one version
    ///
    /// # Errors
    ///
    /// Malformed `template_data` or missing concept versions return
    /// [`crate::PhenotagError::DataIntegrity`]
    pub fn label(&self, version: &HistoricalPhenotype) -> PhenotagResult<Labelling> {
        let codes = resolve_codes(
            &version.phenotype.template_data,
            self.history,
            self.source.coding_system(),
        )?;
        let candidates = candidates(&codes, self.source, &self.diseases);
        let reduction = self.reducible.reduce(&candidates)?;
        Ok(Labelling {
            candidates,
            reduction,
        })
    }

    /// Labels all versions in parallel
    ///
    /// Versions that fail are logged and counted, the batch continues.
    /// Versions without any matching node produce no update.
    pub fn label_all(&self, versions: &[&HistoricalPhenotype]) -> LabelReport {
        let results: Vec<(String, i64, PhenotagResult<Labelling>)> = versions
            .par_iter()
            .map(|version| {
                (
                    version.phenotype.id.clone(),
                    version.history_id,
                    self.label(version),
                )
            })
            .collect();

        let mut report = LabelReport {
            processed: results.len(),
            ..Default::default()
        };
        for (phenotype_id, history_id, result) in results {
            let labelling = match result {
                Ok(labelling) => labelling,
                Err(err) => {
                    warn!("Unable to label phenotype {phenotype_id}/{history_id}: {err}");
                    report.failed += 1;
                    continue;
                }
            };
            report.candidates += labelling.candidates.len();
            report.reduced += labelling.reduction.labels.len();
            if labelling.reduction.steps > report.max_steps {
                report.max_steps = labelling.reduction.steps;
                report.max_steps_phenotype = Some(format!("{phenotype_id}/{history_id}"));
            }
            if labelling.reduction.labels.is_empty() {
                continue;
            }
            report.updates.push(LabelUpdate {
                phenotype_id,
                history_id,
                labels: labelling.reduction.labels,
            });
        }
        report
    }
}

/// Labels every historical phenotype version of the database
///
/// Runs as one transaction: either all updates are applied, or none.
///
/// # Errors
///
/// Returns an error only if the bulk update fails. Individual versions
/// that cannot be labelled are reported in [`LabelReport::failed`].
pub fn label_phenotypes(db: &Database, source: &LabelSource) -> PhenotagResult<LabelReport> {
    db.transaction(|tables| {
        let mut report = {
            let labeller = Labeller::new(&tables.ontology, &tables.concepts, source);
            let versions: Vec<&HistoricalPhenotype> = tables.historical_phenotypes().collect();
            debug!("Labelling {} phenotype versions", versions.len());
            labeller.label_all(&versions)
        };
        report.live_updated = tables.apply_labels(&report.updates)?;
        info!(
            "Labelled {} of {} phenotype versions ({} failed): {} candidates reduced to {}, \
             max {} steps for {}",
            report.updates.len(),
            report.processed,
            report.failed,
            report.candidates,
            report.reduced,
            report.max_steps,
            report.max_steps_phenotype.as_deref().unwrap_or("-"),
        );
        Ok(report)
    })
}
