use criterion::{black_box, criterion_group, criterion_main, Criterion};

use phenotag::import::{import_document, OntologyDocument};
use phenotag::search::typeahead;
use phenotag::{OntologyType, Tables};

fn typeahead_benchmark(c: &mut Criterion) {
    let mut tables = Tables::default();
    import_document(&mut tables, &OntologyDocument::synthetic(10)).unwrap();

    c.bench_function("typeahead name prefix", |b| {
        b.iter(|| typeahead(black_box(&tables.ontology), black_box("synth dise"), &[], None))
    });
    c.bench_function("typeahead code", |b| {
        b.iter(|| {
            typeahead(
                black_box(&tables.ontology),
                black_box("x45"),
                &[OntologyType::ClinicalDisease],
                Some(5),
            )
        })
    });
}

criterion_group!(benches, typeahead_benchmark);
criterion_main!(benches);
