//! End-to-end training flow: import, train, commit, evaluate, parse,
//! persisted across snapshot files.

use std::sync::Arc;

use annotrain::prelude::*;
use tempfile::TempDir;

fn seeded() -> DataSet {
    let ds = DataSet::new();
    ds.catalog.create_entity("city", &[TRAIT_LOOKUP]).unwrap();
    ds.import(
        "text,intent,city\n\
         I want to visit Paris,travel,Paris\n\
         how is the weather,smalltalk,\n",
    )
    .unwrap();
    ds
}

#[test]
fn train_commit_parse_with_keyword_engine() {
    let ds = seeded();
    let trainer = Trainer::new(Arc::new(KeywordEngine::new()), &ds.catalog, &ds.store);

    let report = trainer.train().unwrap();
    assert_eq!(report.engine, "keyword");
    assert_eq!(report.samples, 2);
    assert_eq!(report.metrics.values_memorized, 1);

    // Training alone flips nothing; the commit does.
    assert!(ds
        .store
        .find_by_purpose(SamplePurpose::Train, &ds.catalog)
        .iter()
        .all(|s| !s.trained));
    assert_eq!(trainer.commit_trained(&report), 2);
    assert!(ds
        .store
        .find_by_purpose(SamplePurpose::Train, &ds.catalog)
        .iter()
        .all(|s| s.trained));

    let prediction = trainer.parse("paris in spring").unwrap();
    assert_eq!(prediction.entities.len(), 1);
    assert_eq!(prediction.entities[0].entity, "city");
    assert_eq!(prediction.entities[0].value, "Paris");
}

#[test]
fn evaluate_scores_test_samples_only() {
    let ds = seeded();
    let held_out = ds
        .store
        .create_sample("Paris by night", SamplePurpose::Test)
        .unwrap();
    let paris = ds.catalog.find_value("city", "Paris").unwrap();
    ds.store
        .replace_annotations(held_out.id, &[AnnotationRef::trait_of(paris.id)], &ds.catalog)
        .unwrap();

    let trainer = Trainer::new(Arc::new(KeywordEngine::new()), &ds.catalog, &ds.store);
    let report = trainer.evaluate().unwrap();
    assert_eq!(report.samples, 1);
    assert!((report.metrics.f1 - 1.0).abs() < f64::EPSILON);
}

#[test]
fn engine_failure_reaches_caller_with_engine_kind() {
    let ds = seeded();
    let engine = MockEngine::new("flaky").failing_with("GPU on fire");
    let trainer = Trainer::new(Arc::new(engine), &ds.catalog, &ds.store);

    match trainer.train().unwrap_err() {
        Error::Engine(msg) => assert_eq!(msg, "GPU on fire"),
        other => panic!("expected engine error, got {other:?}"),
    }
    // Nothing was marked trained by the failed run.
    assert!(ds
        .store
        .find_by_purpose(SamplePurpose::Train, &ds.catalog)
        .iter()
        .all(|s| !s.trained));
}

#[test]
fn trained_flags_survive_snapshot_files() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.json");

    let ds = seeded();
    let trainer = Trainer::new(Arc::new(KeywordEngine::new()), &ds.catalog, &ds.store);
    let report = trainer.train().unwrap();
    trainer.commit_trained(&report);
    ds.save(&path).unwrap();

    let restored = DataSet::load(&path).unwrap();
    let samples = restored
        .store
        .find_by_purpose(SamplePurpose::Train, &restored.catalog);
    assert_eq!(samples.len(), 2);
    assert!(samples.iter().all(|s| s.trained));

    // Editing a restored sample resets its flag.
    let edited = restored
        .store
        .update_sample(samples[0].id, Some("I want to visit Lyon"), None)
        .unwrap();
    assert!(!edited.trained);
}

#[test]
fn update_then_export_reflects_replacement_not_union() {
    let ds = seeded();
    let sample = ds.store.find_by_purpose(SamplePurpose::Train, &ds.catalog)[0].id;
    let lyon = ds
        .catalog
        .resolve_or_create_value("city", "Lyon", &[TRAIT_LOOKUP])
        .unwrap();

    ds.store
        .replace_annotations(sample, &[AnnotationRef::trait_of(lyon.value.id)], &ds.catalog)
        .unwrap();

    let exported = ds.export(Some(SamplePurpose::Train));
    let annotations = &exported.samples[0].entities;
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].value, "Lyon");
}
