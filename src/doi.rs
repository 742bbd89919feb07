//! Retry registry for DOI registration
//!
//! Registering a DOI for a phenotype version is done by an external
//! [`DoiRegistrar`]. When the registrar fails, the version is queued and
//! [`retry_pending`] tries again later, oldest entries first.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::DoiConfig;
use crate::phenotype::Phenotype;
use crate::{PhenotagError, PhenotagResult, Tables};

/// A phenotype version waiting for DOI registration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedDoi {
    /// The phenotype id
    pub target_id: String,
    /// The history id of the phenotype version
    pub target_version: i64,
    /// When the version was first queued
    pub created: DateTime<Utc>,
    /// When the version was last queued or retried
    pub modified: DateTime<Utc>,
}

/// Queued phenotype versions, unique per `(target_id, target_version)`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "Vec<QueuedDoi>", into = "Vec<QueuedDoi>")]
pub struct DoiQueue {
    rows: BTreeMap<(String, i64), QueuedDoi>,
}

impl DoiQueue {
    /// Constructs an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of queued versions
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the queue entry of the version, if present
    pub fn get(&self, target_id: &str, target_version: i64) -> Option<&QueuedDoi> {
        self.rows.get(&(target_id.to_string(), target_version))
    }

    /// Queues the version, or refreshes `modified` if it is queued already
    pub fn register(&mut self, target_id: &str, target_version: i64, now: DateTime<Utc>) {
        self.rows
            .entry((target_id.to_string(), target_version))
            .and_modify(|row| row.modified = now)
            .or_insert_with(|| QueuedDoi {
                target_id: target_id.to_string(),
                target_version,
                created: now,
                modified: now,
            });
    }

    /// Removes the version from the queue
    ///
    /// Returns the number of removed rows, `0` or `1`.
    pub fn unregister(&mut self, target_id: &str, target_version: i64) -> usize {
        usize::from(
            self.rows
                .remove(&(target_id.to_string(), target_version))
                .is_some(),
        )
    }

    /// All queued versions, least recently modified first
    pub fn pending(&self) -> Vec<&QueuedDoi> {
        let mut rows: Vec<&QueuedDoi> = self.rows.values().collect();
        rows.sort_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then_with(|| a.target_id.cmp(&b.target_id))
                .then_with(|| a.target_version.cmp(&b.target_version))
        });
        rows
    }
}

impl From<Vec<QueuedDoi>> for DoiQueue {
    fn from(rows: Vec<QueuedDoi>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|row| ((row.target_id.clone(), row.target_version), row))
                .collect(),
        }
    }
}

impl From<DoiQueue> for Vec<QueuedDoi> {
    fn from(queue: DoiQueue) -> Self {
        queue.rows.into_values().collect()
    }
}

/// The external service that mints DOIs
pub trait DoiRegistrar {
    /// Registers a DOI for the phenotype version and returns it
    ///
    /// # Errors
    ///
    /// Transient failures must be reported as [`PhenotagError::Upstream`],
    /// only those are queued for a retry
    fn register(
        &self,
        config: &DoiConfig,
        phenotype: &Phenotype,
        version: i64,
    ) -> PhenotagResult<String>;
}

/// The outcome of [`publish`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Publication {
    /// DOI registration is switched off
    Inactive,
    /// The DOI was registered and stored with the phenotype
    Registered(String),
    /// The registrar failed and the version was queued for a retry
    Queued(String),
}

/// Counts of a [`retry_pending`] run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RetryReport {
    /// Versions that received a DOI
    pub registered: usize,
    /// Versions dropped because they are gone, deleted or registered already
    pub skipped: usize,
    /// Versions that failed again and stay queued
    pub failed: usize,
}

/// Registers a DOI for a phenotype version
///
/// On a transient failure the version is queued and
/// [`Publication::Queued`] carries the error message. The queue entry is
/// part of `tables`, so the caller must commit the transaction for it
/// to persist.
///
/// # Errors
///
/// - the version does not exist: [`PhenotagError::PhenotypeNotFound`]
/// - the registrar fails permanently: the registrar's error
pub fn publish<R: DoiRegistrar + ?Sized>(
    tables: &mut Tables,
    config: &DoiConfig,
    registrar: &R,
    phenotype_id: &str,
    version: i64,
) -> PhenotagResult<Publication> {
    if !config.active {
        debug!("DOI registration inactive, not publishing {phenotype_id}/{version}");
        return Ok(Publication::Inactive);
    }
    let phenotype = tables
        .phenotype_version(phenotype_id, version)
        .map(|row| row.phenotype.clone())
        .ok_or_else(|| PhenotagError::PhenotypeNotFound(format!("{phenotype_id}/{version}")))?;

    match registrar.register(config, &phenotype, version) {
        Ok(doi) => {
            store_doi(tables, phenotype_id, version, &doi)?;
            info!("Registered DOI {doi} for {phenotype_id}/{version}");
            Ok(Publication::Registered(doi))
        }
        Err(PhenotagError::Upstream(msg)) => {
            warn!("DOI registration for {phenotype_id}/{version} failed, queued: {msg}");
            tables.doi_queue.register(phenotype_id, version, Utc::now());
            Ok(Publication::Queued(msg))
        }
        Err(err) => Err(err),
    }
}

/// Retries every queued version, least recently modified first
///
/// Versions that no longer exist, belong to a deleted phenotype or already
/// carry a DOI are removed from the queue without contacting the registrar.
/// Successful versions are removed, failing versions are re-stamped. Running
/// it again right away only re-tries the versions that are still failing.
///
/// # Errors
///
/// A permanent registrar error aborts the run
pub fn retry_pending<R: DoiRegistrar + ?Sized>(
    tables: &mut Tables,
    config: &DoiConfig,
    registrar: &R,
) -> PhenotagResult<RetryReport> {
    let mut report = RetryReport::default();
    if !config.active {
        return Ok(report);
    }

    let pending: Vec<(String, i64)> = tables
        .doi_queue
        .pending()
        .into_iter()
        .map(|row| (row.target_id.clone(), row.target_version))
        .collect();

    for (phenotype_id, version) in pending {
        let live = tables
            .phenotype(&phenotype_id)
            .map_or(false, |live| !live.is_deleted);
        let phenotype = tables
            .phenotype_version(&phenotype_id, version)
            .map(|row| row.phenotype.clone())
            .filter(|phenotype| live && !phenotype.is_deleted && phenotype.doi.is_none());
        let Some(phenotype) = phenotype else {
            debug!("Dropping {phenotype_id}/{version} from the DOI queue");
            tables.doi_queue.unregister(&phenotype_id, version);
            report.skipped += 1;
            continue;
        };

        match registrar.register(config, &phenotype, version) {
            Ok(doi) => {
                store_doi(tables, &phenotype_id, version, &doi)?;
                tables.doi_queue.unregister(&phenotype_id, version);
                report.registered += 1;
            }
            Err(PhenotagError::Upstream(msg)) => {
                warn!("DOI retry for {phenotype_id}/{version} failed: {msg}");
                tables.doi_queue.register(&phenotype_id, version, Utc::now());
                report.failed += 1;
            }
            Err(err) => return Err(err),
        }
    }
    info!(
        "DOI retry: {} registered, {} skipped, {} failed",
        report.registered, report.skipped, report.failed
    );
    Ok(report)
}

/// Writes the DOI to the version and, if it is the latest, to the live row
fn store_doi(
    tables: &mut Tables,
    phenotype_id: &str,
    version: i64,
    doi: &str,
) -> PhenotagResult<()> {
    if let Some(mut row) = tables.phenotype_version(phenotype_id, version).cloned() {
        row.phenotype.doi = Some(doi.to_string());
        tables.upsert_phenotype_version(row)?;
    }
    if tables.latest_history_id(phenotype_id) == Some(version) {
        if let Some(mut live) = tables.phenotype(phenotype_id).cloned() {
            live.doi = Some(doi.to_string());
            tables.upsert_phenotype(live)?;
        }
    }
    Ok(())
}
