//! Training orchestration against a pluggable recognition engine.
//!
//! The orchestrator gathers a snapshot of samples and the entity catalog,
//! hands it to the engine, and reports whatever the engine reports. It
//! never retries and never rewrites engine errors; training is a
//! long-running, explicitly triggered operation, so retry policy belongs
//! to the caller. No store lock is held while the engine runs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::EntityCatalog;
use crate::store::AnnotationStore;
use crate::types::{SampleId, SamplePurpose};
use crate::{EvaluationMetrics, Prediction, RecognitionEngine, Result, TrainingMetrics};

/// Result of a training run, as reported by the engine plus orchestration
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Engine that ran the training.
    pub engine: String,
    /// Number of training samples handed to the engine.
    pub samples: usize,
    /// Number of entities in the catalog snapshot.
    pub entities: usize,
    /// RFC 3339 completion timestamp.
    pub completed_at: String,
    /// Engine-reported metrics, passed through.
    pub metrics: TrainingMetrics,
    /// The samples included in the run, for the explicit commit step.
    pub sample_ids: Vec<SampleId>,
}

/// Result of an evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Engine that ran the evaluation.
    pub engine: String,
    /// Number of test samples evaluated.
    pub samples: usize,
    /// RFC 3339 completion timestamp.
    pub completed_at: String,
    /// Engine-reported metrics, passed through.
    pub metrics: EvaluationMetrics,
}

/// Orchestrates train/evaluate/parse against an external engine.
///
/// Collaborators are wired explicitly at construction.
pub struct Trainer<'a> {
    engine: Arc<dyn RecognitionEngine>,
    catalog: &'a EntityCatalog,
    store: &'a AnnotationStore,
}

impl<'a> Trainer<'a> {
    /// Wire a trainer to its engine and stores.
    #[must_use]
    pub fn new(
        engine: Arc<dyn RecognitionEngine>,
        catalog: &'a EntityCatalog,
        store: &'a AnnotationStore,
    ) -> Self {
        Self {
            engine,
            catalog,
            store,
        }
    }

    /// Train the engine on all train-purpose samples.
    ///
    /// Does *not* mark samples as trained; call
    /// [`Trainer::commit_trained`] once the caller has decided the run
    /// succeeded.
    pub fn train(&self) -> Result<TrainingReport> {
        let samples = self.store.find_by_purpose(SamplePurpose::Train, self.catalog);
        let entities = self.catalog.list_all_with_values();
        log::info!(
            "training {} with {} samples, {} entities",
            self.engine.name(),
            samples.len(),
            entities.len()
        );
        let metrics = self.engine.train(&samples, &entities)?;
        Ok(TrainingReport {
            engine: self.engine.name().to_string(),
            samples: samples.len(),
            entities: entities.len(),
            completed_at: chrono::Utc::now().to_rfc3339(),
            metrics,
            sample_ids: samples.iter().map(|s| s.id).collect(),
        })
    }

    /// Mark the samples of a training run as trained.
    ///
    /// Returns the number of samples whose flag actually flipped.
    pub fn commit_trained(&self, report: &TrainingReport) -> usize {
        let updated = self.store.mark_trained(&report.sample_ids);
        log::info!("committed training run: {updated} samples marked trained");
        updated
    }

    /// Evaluate the engine on all test-purpose samples.
    pub fn evaluate(&self) -> Result<EvaluationReport> {
        let samples = self.store.find_by_purpose(SamplePurpose::Test, self.catalog);
        let entities = self.catalog.list_all_with_values();
        log::info!(
            "evaluating {} on {} test samples",
            self.engine.name(),
            samples.len()
        );
        let metrics = self.engine.evaluate(&samples, &entities)?;
        Ok(EvaluationReport {
            engine: self.engine.name().to_string(),
            samples: samples.len(),
            completed_at: chrono::Utc::now().to_rfc3339(),
            metrics,
        })
    }

    /// Run single-utterance inference. No persistence side effects.
    pub fn parse(&self, text: &str) -> Result<Prediction> {
        self.engine.parse(text)
    }

    /// Whether the wired engine reports itself ready for `parse`.
    #[must_use]
    pub fn engine_ready(&self) -> bool {
        self.engine.is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnnotationRef, TRAIT_LOOKUP};
    use crate::{Error, MockEngine, ScoredIntent};

    fn fixtures() -> (EntityCatalog, AnnotationStore) {
        let catalog = EntityCatalog::new();
        let store = AnnotationStore::new();
        let paris = catalog
            .resolve_or_create_value("city", "Paris", &[TRAIT_LOOKUP])
            .unwrap();
        let train = store
            .create_sample("I live in Paris", SamplePurpose::Train)
            .unwrap();
        store
            .replace_annotations(train.id, &[AnnotationRef::trait_of(paris.value.id)], &catalog)
            .unwrap();
        store
            .create_sample("held out", SamplePurpose::Test)
            .unwrap();
        (catalog, store)
    }

    #[test]
    fn train_gathers_only_train_samples() {
        let (catalog, store) = fixtures();
        let trainer = Trainer::new(Arc::new(MockEngine::new("mock")), &catalog, &store);
        let report = trainer.train().unwrap();
        assert_eq!(report.samples, 1);
        assert_eq!(report.entities, 1);
        assert_eq!(report.engine, "mock");
        assert_eq!(report.sample_ids.len(), 1);
    }

    #[test]
    fn train_does_not_mark_samples_until_commit() {
        let (catalog, store) = fixtures();
        let trainer = Trainer::new(Arc::new(MockEngine::new("mock")), &catalog, &store);
        let report = trainer.train().unwrap();

        let trained_before: Vec<_> = store
            .find_by_purpose(SamplePurpose::Train, &catalog)
            .into_iter()
            .filter(|s| s.trained)
            .collect();
        assert!(trained_before.is_empty());

        assert_eq!(trainer.commit_trained(&report), 1);
        let trained_after: Vec<_> = store
            .find_by_purpose(SamplePurpose::Train, &catalog)
            .into_iter()
            .filter(|s| s.trained)
            .collect();
        assert_eq!(trained_after.len(), 1);
    }

    #[test]
    fn evaluate_gathers_only_test_samples() {
        let (catalog, store) = fixtures();
        let trainer = Trainer::new(Arc::new(MockEngine::new("mock")), &catalog, &store);
        let report = trainer.evaluate().unwrap();
        assert_eq!(report.samples, 1);
    }

    #[test]
    fn engine_errors_pass_through_unmodified() {
        let (catalog, store) = fixtures();
        let engine = MockEngine::new("mock").failing_with("model exploded");
        let trainer = Trainer::new(Arc::new(engine), &catalog, &store);

        let err = trainer.train().unwrap_err();
        match err {
            Error::Engine(msg) => assert_eq!(msg, "model exploded"),
            other => panic!("expected engine error, got {other:?}"),
        }
        assert!(trainer.evaluate().is_err());
        assert!(trainer.parse("hello").is_err());
    }

    #[test]
    fn parse_has_no_persistence_side_effects() {
        let (catalog, store) = fixtures();
        let engine = MockEngine::new("mock").with_intent(ScoredIntent {
            name: "greet".into(),
            confidence: 0.9,
        });
        let trainer = Trainer::new(Arc::new(engine), &catalog, &store);

        let before = store.len();
        let prediction = trainer.parse("hello").unwrap();
        assert_eq!(prediction.intent.unwrap().name, "greet");
        assert_eq!(store.len(), before);
    }
}
