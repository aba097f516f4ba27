//! Keyword matching engine: the always-available baseline.
//!
//! Training memorizes every entity value (and synonym) in the catalog
//! snapshot. Parsing finds case-insensitive occurrences of memorized
//! forms and reports them with character offsets. Evaluation replays
//! parsing over the test samples and scores predicted (entity, value)
//! pairs against the gold annotations.
//!
//! This is not a statistical model; it exists so the full train → evaluate
//! → parse loop works with zero external dependencies, and as a floor any
//! real engine should beat.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::{AnnotatedSample, Entity, EntityValue};
use crate::{
    Error, EvaluationMetrics, PredictedEntity, Prediction, RecognitionEngine, Result,
    TrainingMetrics,
};

#[derive(Debug, Clone)]
struct Term {
    entity: String,
    value: String,
    // Canonical value plus synonyms.
    forms: Vec<String>,
}

#[derive(Debug, Default)]
struct Memorized {
    terms: Vec<Term>,
    trained: bool,
}

/// Case-insensitive substring recognizer over memorized entity values.
#[derive(Debug, Default)]
pub struct KeywordEngine {
    state: RwLock<Memorized>,
}

impl KeywordEngine {
    /// Create an untrained engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Memorized> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Memorized> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn memorize(entities: &[(Entity, Vec<EntityValue>)]) -> Vec<Term> {
        let mut terms = Vec::new();
        for (entity, values) in entities {
            for value in values {
                let mut forms = vec![value.value.clone()];
                forms.extend(value.synonyms.iter().cloned());
                forms.retain(|f| !f.trim().is_empty());
                if forms.is_empty() {
                    continue;
                }
                terms.push(Term {
                    entity: entity.name.clone(),
                    value: value.value.clone(),
                    forms,
                });
            }
        }
        terms
    }

    fn match_terms(terms: &[Term], text: &str) -> Vec<PredictedEntity> {
        let mut predicted: Vec<PredictedEntity> = Vec::new();
        for term in terms {
            for form in &term.forms {
                if let Some((start, end)) = find_ci(text, form) {
                    let duplicate = predicted
                        .iter()
                        .any(|p| p.entity == term.entity && p.value == term.value);
                    if !duplicate {
                        predicted.push(PredictedEntity {
                            entity: term.entity.clone(),
                            value: term.value.clone(),
                            start: Some(start),
                            end: Some(end),
                            confidence: 1.0,
                        });
                    }
                    break;
                }
            }
        }
        predicted
    }
}

impl RecognitionEngine for KeywordEngine {
    fn train(
        &self,
        samples: &[AnnotatedSample],
        entities: &[(Entity, Vec<EntityValue>)],
    ) -> Result<TrainingMetrics> {
        let terms = Self::memorize(entities);
        let values_memorized = terms.len();
        {
            let mut state = self.write();
            state.terms = terms;
            state.trained = true;
        }
        log::info!(
            "keyword engine memorized {values_memorized} values from {} entities",
            entities.len()
        );
        Ok(TrainingMetrics {
            samples_seen: samples.len(),
            values_memorized,
            extra: BTreeMap::new(),
        })
    }

    fn evaluate(
        &self,
        samples: &[AnnotatedSample],
        entities: &[(Entity, Vec<EntityValue>)],
    ) -> Result<EvaluationMetrics> {
        // Self-contained: evaluation builds its own term table from the
        // snapshot it was handed, so it works on an untrained instance.
        let terms = Self::memorize(entities);

        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        for sample in samples {
            let predicted = Self::match_terms(&terms, &sample.text);
            let gold: Vec<(&str, &str)> = sample
                .annotations
                .iter()
                .map(|a| (a.entity.as_str(), a.value.as_str()))
                .collect();
            for p in &predicted {
                if gold
                    .iter()
                    .any(|(e, v)| *e == p.entity && v.eq_ignore_ascii_case(&p.value))
                {
                    tp += 1;
                } else {
                    fp += 1;
                }
            }
            for (e, v) in &gold {
                if !predicted
                    .iter()
                    .any(|p| p.entity == *e && p.value.eq_ignore_ascii_case(v))
                {
                    fn_ += 1;
                }
            }
        }

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        let mut extra = BTreeMap::new();
        extra.insert("true_positives".to_string(), tp as f64);
        extra.insert("false_positives".to_string(), fp as f64);
        extra.insert("false_negatives".to_string(), fn_ as f64);

        Ok(EvaluationMetrics {
            precision,
            recall,
            f1,
            extra,
        })
    }

    fn parse(&self, text: &str) -> Result<Prediction> {
        let state = self.read();
        if !state.trained {
            return Err(Error::engine("keyword engine has not been trained"));
        }
        Ok(Prediction {
            text: text.to_string(),
            intent: None,
            entities: Self::match_terms(&state.terms, text),
        })
    }

    fn name(&self) -> &'static str {
        "keyword"
    }

    fn is_ready(&self) -> bool {
        self.read().trained
    }
}

// tp + fp == 0 means "predicted nothing"; treated as perfect precision so
// an empty test set scores 1.0, not NaN.
fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        1.0
    } else {
        num as f64 / denom as f64
    }
}

/// Case-insensitive substring search returning character offsets
/// (start, end exclusive).
fn find_ci(text: &str, needle: &str) -> Option<(usize, usize)> {
    let hay: Vec<char> = text.chars().collect();
    let pat: Vec<char> = needle.chars().collect();
    if pat.is_empty() || pat.len() > hay.len() {
        return None;
    }
    for start in 0..=hay.len() - pat.len() {
        let matched = hay[start..start + pat.len()]
            .iter()
            .zip(&pat)
            .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()));
        if matched {
            return Some((start, start + pat.len()));
        }
    }
    None
}
