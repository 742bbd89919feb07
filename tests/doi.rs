use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use phenotag::config::DoiConfig;
use phenotag::doi::{publish, retry_pending, DoiRegistrar, Publication};
use phenotag::phenotype::{HistoryType, Phenotype};
use phenotag::{Database, PhenotagError, PhenotagResult};

/// A registrar whose upstream can be switched on and off
struct Switchable {
    online: AtomicBool,
    calls: AtomicUsize,
}

impl Switchable {
    fn new(online: bool) -> Self {
        Switchable {
            online: AtomicBool::new(online),
            calls: AtomicUsize::new(0),
        }
    }
}

impl DoiRegistrar for Switchable {
    fn register(
        &self,
        config: &DoiConfig,
        phenotype: &Phenotype,
        version: i64,
    ) -> PhenotagResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.online.load(Ordering::SeqCst) {
            Ok(format!("{}/{}.v{}", config.prefix, phenotype.id.to_lowercase(), version))
        } else {
            Err(PhenotagError::Upstream("connection refused".to_string()))
        }
    }
}

fn config() -> DoiConfig {
    DoiConfig::new(
        "user",
        "secret",
        "10.5555",
        "https://phenotypes.example.org",
        "IsNewVersionOf",
    )
}

#[test]
fn queued_versions_are_registered_once_online() {
    let config = config();
    let registrar = Switchable::new(false);
    let db = Database::in_memory();
    let versions: Vec<i64> = db
        .transaction(|tables| {
            Ok(vec![
                tables.save_phenotype(Phenotype::new("PH1", "Asthma"), HistoryType::Created)?,
                tables.save_phenotype(Phenotype::new("PH2", "COPD"), HistoryType::Created)?,
            ])
        })
        .unwrap();

    for (id, version) in [("PH1", versions[0]), ("PH2", versions[1])] {
        let res = db
            .transaction(|tables| publish(tables, &config, &registrar, id, version))
            .unwrap();
        assert!(matches!(res, Publication::Queued(_)));
    }
    assert_eq!(db.read(|tables| tables.doi_queue.len()).unwrap(), 2);

    let report = db
        .transaction(|tables| retry_pending(tables, &config, &registrar))
        .unwrap();
    assert_eq!(report.failed, 2);

    registrar.online.store(true, Ordering::SeqCst);
    let report = db
        .transaction(|tables| retry_pending(tables, &config, &registrar))
        .unwrap();
    assert_eq!(report.registered, 2);

    db.read(|tables| {
        assert!(tables.doi_queue.is_empty());
        assert_eq!(
            tables.phenotype("PH2").unwrap().doi.as_deref(),
            Some("10.5555/ph2.v2")
        );
        assert_eq!(
            tables.historical_phenotype(versions[0]).unwrap().phenotype.doi.as_deref(),
            Some("10.5555/ph1.v1")
        );
    })
    .unwrap();
}

#[test]
fn deleted_phenotypes_leave_the_queue() {
    let config = config();
    let registrar = Switchable::new(false);
    let db = Database::in_memory();
    let version = db
        .transaction(|tables| {
            let version =
                tables.save_phenotype(Phenotype::new("PH1", "Asthma"), HistoryType::Created)?;
            publish(tables, &config, &registrar, "PH1", version)?;
            Ok(version)
        })
        .unwrap();

    db.transaction(|tables| {
        let mut deleted = Phenotype::new("PH1", "Asthma");
        deleted.is_deleted = true;
        tables.save_phenotype(deleted, HistoryType::Deleted)
    })
    .unwrap();

    registrar.online.store(true, Ordering::SeqCst);
    registrar.calls.store(0, Ordering::SeqCst);
    let report = db
        .transaction(|tables| retry_pending(tables, &config, &registrar))
        .unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.registered, 0);
    assert_eq!(registrar.calls.load(Ordering::SeqCst), 0);

    db.read(|tables| {
        assert!(tables.doi_queue.is_empty());
        assert_eq!(tables.historical_phenotype(version).unwrap().phenotype.doi, None);
        assert_eq!(tables.phenotype("PH1").unwrap().doi, None);
    })
    .unwrap();
}
