//! # annotrain
//!
//! Labeled training-data management for an intent/entity recognizer.
//!
//! - **Entity catalog**: recognized entities and their values/synonyms,
//!   with idempotent resolve-or-create for bulk ingestion
//! - **Annotation store**: samples and their entity-value links, with
//!   atomic annotation replacement and cascade delete
//! - **Codec**: canonical exchange export and CSV import
//! - **Ingestion**: best-effort, row-isolated bulk import
//! - **Training**: train/evaluate/parse orchestration against a pluggable
//!   recognition engine
//!
//! ## Quick start
//!
//! ```rust
//! use annotrain::prelude::*;
//! use std::sync::Arc;
//!
//! let ds = DataSet::new();
//! ds.catalog.create_entity("city", &["trait"]).unwrap();
//!
//! let summary = ds.import("text,intent,city\nhello from Paris,greet,Paris\n").unwrap();
//! assert_eq!(summary.imported, 1);
//!
//! let trainer = Trainer::new(Arc::new(KeywordEngine::new()), &ds.catalog, &ds.store);
//! let report = trainer.train().unwrap();
//! trainer.commit_trained(&report);
//!
//! let prediction = trainer.parse("is Paris nice?").unwrap();
//! assert_eq!(prediction.entities[0].value, "Paris");
//! ```
//!
//! ## Design notes
//!
//! - Components receive their collaborators explicitly at construction;
//!   there is no ambient service lookup.
//! - Duplicate sample text is a silent skip during import, never an error.
//! - The recognition engine is an interface with exactly three operations
//!   (train, evaluate, parse); any conforming implementation is swappable
//!   and engine errors pass through to the caller unmodified.

#![warn(missing_docs)]

pub mod catalog;
pub mod codec;
pub mod engines;
mod error;
pub mod ingest;
pub mod snapshot;
pub mod store;
pub mod train;
pub mod types;

pub mod cli;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use types::{AnnotatedSample, Entity, EntityValue};

pub use catalog::{EntityCatalog, ResolvedValue};
pub use engines::KeywordEngine;
pub use error::{Error, Result};
pub use ingest::{ImportPipeline, ImportSummary, RowFailure};
pub use snapshot::DataSet;
pub use store::AnnotationStore;
pub use train::{EvaluationReport, Trainer, TrainingReport};

pub mod prelude {
    //! Commonly used items, re-exported for convenience.
    //!
    //! ```rust
    //! use annotrain::prelude::*;
    //!
    //! let store = AnnotationStore::new();
    //! let sample = store.create_sample("hello", SamplePurpose::Train).unwrap();
    //! assert!(!sample.trained);
    //! ```
    pub use crate::catalog::EntityCatalog;
    pub use crate::codec::export::{to_exchange_format, ExchangePayload};
    pub use crate::error::{Error, Result};
    pub use crate::ingest::{ImportPipeline, ImportSummary};
    pub use crate::snapshot::DataSet;
    pub use crate::store::AnnotationStore;
    pub use crate::train::Trainer;
    pub use crate::types::{
        AnnotatedSample, Annotation, AnnotationRef, Entity, EntityValue, Sample, SamplePurpose,
        TRAIT_LOOKUP,
    };
    pub use crate::{
        EngineKind, KeywordEngine, MockEngine, PredictedEntity, Prediction, RecognitionEngine,
    };
}

// =============================================================================
// Recognition engine contract
// =============================================================================

/// An intent hypothesis with confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredIntent {
    /// Intent label.
    pub name: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
}

/// One entity occurrence predicted by an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedEntity {
    /// Entity name.
    pub entity: String,
    /// Canonical value string.
    pub value: String,
    /// Start character offset, if the engine localized the match.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub start: Option<usize>,
    /// End character offset (exclusive), if localized.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end: Option<usize>,
    /// Confidence in [0, 1].
    pub confidence: f64,
}

/// Engine output for a single utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// The analyzed text.
    pub text: String,
    /// Best intent hypothesis, if the engine predicts intents.
    pub intent: Option<ScoredIntent>,
    /// Predicted entity occurrences.
    pub entities: Vec<PredictedEntity>,
}

/// Metrics reported by an engine's train operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Samples the engine consumed.
    pub samples_seen: usize,
    /// Entity values the engine ingested.
    pub values_memorized: usize,
    /// Engine-specific extras (losses, durations, ...).
    pub extra: BTreeMap<String, f64>,
}

/// Metrics reported by an engine's evaluate operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Micro precision over predicted (entity, value) pairs.
    pub precision: f64,
    /// Micro recall.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// Engine-specific extras.
    pub extra: BTreeMap<String, f64>,
}

/// The external recognition engine contract.
///
/// These three operations are everything the core depends on; any
/// conforming engine is swappable. Errors are surfaced to the caller
/// unmodified, and implementations must not assume the orchestrator
/// retries.
pub trait RecognitionEngine: Send + Sync {
    /// Train on the given samples and entity catalog snapshot.
    fn train(
        &self,
        samples: &[AnnotatedSample],
        entities: &[(Entity, Vec<EntityValue>)],
    ) -> Result<TrainingMetrics>;

    /// Evaluate against the given samples and entity catalog snapshot.
    fn evaluate(
        &self,
        samples: &[AnnotatedSample],
        entities: &[(Entity, Vec<EntityValue>)],
    ) -> Result<EvaluationMetrics>;

    /// Run inference on a single utterance.
    fn parse(&self, text: &str) -> Result<Prediction>;

    /// Engine name, for reports and logs.
    fn name(&self) -> &'static str {
        "unknown"
    }

    /// Whether the engine is ready to serve `parse`.
    fn is_ready(&self) -> bool;
}

// =============================================================================
// Engine selection
// =============================================================================

/// Built-in engine identifiers, for configuration-driven selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// [`KeywordEngine`], the always-available baseline.
    Keyword,
    /// [`MockEngine`] with default (empty) behavior; test/dev only.
    Mock,
}

impl std::str::FromStr for EngineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "keyword" => Ok(EngineKind::Keyword),
            "mock" => Ok(EngineKind::Mock),
            other => Err(Error::validation(format!("unknown engine: {other:?}"))),
        }
    }
}

/// Construct a built-in engine by kind.
///
/// Engines are selected by configuration, never by runtime type
/// inspection; external engines are wired by handing their
/// [`RecognitionEngine`] impl to [`Trainer::new`] directly.
#[must_use]
pub fn engine_for(kind: EngineKind) -> Box<dyn RecognitionEngine> {
    match kind {
        EngineKind::Keyword => Box::new(KeywordEngine::new()),
        EngineKind::Mock => Box::new(MockEngine::new("mock")),
    }
}

// =============================================================================
// Mock engine
// =============================================================================

/// A mock recognition engine for tests.
///
/// Returns configured predictions and metrics, or a configured error from
/// every operation, which is how engine-error pass-through is tested.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    name: &'static str,
    intent: Option<ScoredIntent>,
    entities: Vec<PredictedEntity>,
    failure: Option<String>,
}

impl MockEngine {
    /// Create a mock engine.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Return this intent from `parse`.
    #[must_use]
    pub fn with_intent(mut self, intent: ScoredIntent) -> Self {
        self.intent = Some(intent);
        self
    }

    /// Return these entities from `parse`.
    #[must_use]
    pub fn with_entities(mut self, entities: Vec<PredictedEntity>) -> Self {
        self.entities = entities;
        self
    }

    /// Fail every operation with this engine error message.
    #[must_use]
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    fn check(&self) -> Result<()> {
        match &self.failure {
            Some(message) => Err(Error::engine(message.clone())),
            None => Ok(()),
        }
    }
}

impl RecognitionEngine for MockEngine {
    fn train(
        &self,
        samples: &[AnnotatedSample],
        entities: &[(Entity, Vec<EntityValue>)],
    ) -> Result<TrainingMetrics> {
        self.check()?;
        Ok(TrainingMetrics {
            samples_seen: samples.len(),
            values_memorized: entities.iter().map(|(_, v)| v.len()).sum(),
            extra: BTreeMap::new(),
        })
    }

    fn evaluate(
        &self,
        samples: &[AnnotatedSample],
        _entities: &[(Entity, Vec<EntityValue>)],
    ) -> Result<EvaluationMetrics> {
        self.check()?;
        let mut extra = BTreeMap::new();
        extra.insert("samples".to_string(), samples.len() as f64);
        Ok(EvaluationMetrics {
            precision: 1.0,
            recall: 1.0,
            f1: 1.0,
            extra,
        })
    }

    fn parse(&self, text: &str) -> Result<Prediction> {
        self.check()?;
        Ok(Prediction {
            text: text.to_string(),
            intent: self.intent.clone(),
            entities: self.entities.clone(),
        })
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn is_ready(&self) -> bool {
        self.failure.is_none()
    }
}
