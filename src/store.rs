//! Annotation store: owns samples and their annotation links.
//!
//! Multi-record operations (annotation replacement, cascade delete) run
//! under one write lock, so readers never observe a half-replaced
//! annotation set.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::catalog::EntityCatalog;
use crate::types::{
    AnnotatedSample, Annotation, AnnotationId, AnnotationRef, ResolvedAnnotation, Sample, SampleId,
    SamplePurpose, ValueId,
};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct Inner {
    samples: Vec<Sample>,
    annotations: Vec<Annotation>,
    // text -> number of samples with that exact text
    text_refs: HashMap<String, usize>,
    next_sample: u64,
    next_annotation: u64,
}

impl Inner {
    fn sample_mut(&mut self, id: SampleId) -> Result<&mut Sample> {
        self.samples
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::not_found(format!("sample {id}")))
    }
}

/// Owns [`Sample`] and [`Annotation`] lifecycles.
///
/// Thread-safe; all methods take `&self`. Samples are kept in creation
/// order, which fixes the ordering of [`AnnotationStore::find_by_purpose`]
/// and therefore of export payloads.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    inner: RwLock<Inner>,
}

impl AnnotationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a sample with `trained = false`.
    ///
    /// Fails with [`Error::Validation`] on empty text.
    pub fn create_sample(&self, text: &str, purpose: SamplePurpose) -> Result<Sample> {
        if text.trim().is_empty() {
            return Err(Error::validation("sample text must not be empty"));
        }
        let mut inner = self.write();
        let id = SampleId(inner.next_sample);
        inner.next_sample += 1;
        let sample = Sample {
            id,
            text: text.to_string(),
            purpose,
            trained: false,
        };
        *inner.text_refs.entry(text.to_string()).or_insert(0) += 1;
        inner.samples.push(sample.clone());
        log::debug!("created sample {id} ({purpose})");
        Ok(sample)
    }

    /// Fetch a sample by id.
    #[must_use]
    pub fn get_sample(&self, id: SampleId) -> Option<Sample> {
        self.read().samples.iter().find(|s| s.id == id).cloned()
    }

    /// Update a sample's text and/or purpose.
    ///
    /// Any change to text or purpose resets `trained` to false: the stored
    /// model no longer reflects this sample.
    pub fn update_sample(
        &self,
        id: SampleId,
        text: Option<&str>,
        purpose: Option<SamplePurpose>,
    ) -> Result<Sample> {
        if let Some(text) = text {
            if text.trim().is_empty() {
                return Err(Error::validation("sample text must not be empty"));
            }
        }
        let mut inner = self.write();
        let old_text = {
            let sample = inner.sample_mut(id)?;
            let old = sample.text.clone();
            if let Some(text) = text {
                sample.text = text.to_string();
                sample.trained = false;
            }
            if let Some(purpose) = purpose {
                sample.purpose = purpose;
                sample.trained = false;
            }
            old
        };
        if let Some(new_text) = text {
            if new_text != old_text {
                decrement_text_ref(&mut inner.text_refs, &old_text);
                *inner.text_refs.entry(new_text.to_string()).or_insert(0) += 1;
            }
        }
        let updated = inner
            .samples
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| Error::storage(format!("sample {id} vanished during update")))?;
        Ok(updated)
    }

    /// Replace a sample's full annotation set.
    ///
    /// Old links are deleted and the new set inserted as one logical unit;
    /// the two halves never become visible separately. Every referenced
    /// value must exist in the catalog at call time.
    pub fn replace_annotations(
        &self,
        id: SampleId,
        refs: &[AnnotationRef],
        catalog: &EntityCatalog,
    ) -> Result<Vec<Annotation>> {
        for r in refs {
            r.validate()?;
            if catalog.get_value(r.value).is_none() {
                return Err(Error::not_found(format!("entity value {}", r.value)));
            }
        }
        let mut inner = self.write();
        if !inner.samples.iter().any(|s| s.id == id) {
            return Err(Error::not_found(format!("sample {id}")));
        }
        inner.annotations.retain(|a| a.sample != id);
        let mut created = Vec::with_capacity(refs.len());
        for r in refs {
            let annotation_id = AnnotationId(inner.next_annotation);
            inner.next_annotation += 1;
            let annotation = Annotation {
                id: annotation_id,
                sample: id,
                value: r.value,
                start: r.start,
                end: r.end,
            };
            inner.annotations.push(annotation.clone());
            created.push(annotation);
        }
        log::debug!("replaced annotations for sample {id}: {} links", created.len());
        Ok(created)
    }

    /// Annotations of one sample, in insertion order.
    #[must_use]
    pub fn annotations_for(&self, id: SampleId) -> Vec<Annotation> {
        self.read()
            .annotations
            .iter()
            .filter(|a| a.sample == id)
            .cloned()
            .collect()
    }

    /// Fetch one annotation link by id.
    #[must_use]
    pub fn get_annotation(&self, id: AnnotationId) -> Option<Annotation> {
        self.read().annotations.iter().find(|a| a.id == id).cloned()
    }

    /// Delete a sample and all its annotation links.
    ///
    /// Returns the number of samples removed (0 or 1), so callers can tell
    /// "not found" from "deleted".
    pub fn delete_sample_cascade(&self, id: SampleId) -> usize {
        let mut inner = self.write();
        let Some(pos) = inner.samples.iter().position(|s| s.id == id) else {
            return 0;
        };
        let removed = inner.samples.remove(pos);
        decrement_text_ref(&mut inner.text_refs, &removed.text);
        let before = inner.annotations.len();
        inner.annotations.retain(|a| a.sample != id);
        log::info!(
            "deleted sample {id} and {} annotation links",
            before - inner.annotations.len()
        );
        1
    }

    /// Delete all annotation links referencing a value.
    ///
    /// Used when a value is removed from the catalog, so no link dangles.
    /// Returns the number of links removed.
    pub fn purge_value_links(&self, value: ValueId) -> usize {
        let mut inner = self.write();
        let before = inner.annotations.len();
        inner.annotations.retain(|a| a.value != value);
        before - inner.annotations.len()
    }

    /// Exact, case-sensitive existence probe on sample text.
    ///
    /// Same equality semantics as the primary lookup; the import pipeline
    /// uses this to skip duplicate rows.
    #[must_use]
    pub fn exists(&self, text: &str) -> bool {
        self.read().text_refs.get(text).copied().unwrap_or(0) > 0
    }

    /// Samples of one purpose, joined with resolved annotations, in
    /// creation order.
    ///
    /// A link whose value has been deleted out from under it is skipped
    /// with a warning rather than failing the whole read; the
    /// reconciliation sweep is responsible for cleaning such links up.
    #[must_use]
    pub fn find_by_purpose(
        &self,
        purpose: SamplePurpose,
        catalog: &EntityCatalog,
    ) -> Vec<AnnotatedSample> {
        let inner = self.read();
        inner
            .samples
            .iter()
            .filter(|s| s.purpose == purpose)
            .map(|s| {
                let annotations = inner
                    .annotations
                    .iter()
                    .filter(|a| a.sample == s.id)
                    .filter_map(|a| resolve_link(a, catalog))
                    .collect();
                AnnotatedSample {
                    id: s.id,
                    text: s.text.clone(),
                    purpose: s.purpose,
                    trained: s.trained,
                    annotations,
                }
            })
            .collect()
    }

    /// Mark samples as trained. Returns how many were updated.
    ///
    /// This is the explicit post-training commit step; training itself
    /// never flips the flag.
    pub fn mark_trained(&self, ids: &[SampleId]) -> usize {
        let mut inner = self.write();
        let mut updated = 0;
        for sample in inner.samples.iter_mut() {
            if ids.contains(&sample.id) && !sample.trained {
                sample.trained = true;
                updated += 1;
            }
        }
        updated
    }

    /// All value ids referenced by at least one annotation link.
    #[must_use]
    pub fn referenced_value_ids(&self) -> HashSet<ValueId> {
        self.read().annotations.iter().map(|a| a.value).collect()
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().samples.len()
    }

    /// True if the store holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().samples.is_empty()
    }

    /// Number of annotation links across all samples.
    #[must_use]
    pub fn annotation_count(&self) -> usize {
        self.read().annotations.len()
    }

    /// Snapshot for persistence.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.read();
        StoreSnapshot {
            samples: inner.samples.clone(),
            annotations: inner.annotations.clone(),
        }
    }

    /// Rebuild a store from a snapshot, restoring indexes and id counters.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        let mut inner = Inner::default();
        for sample in snapshot.samples {
            if sample.text.trim().is_empty() {
                return Err(Error::validation(format!(
                    "snapshot sample {} has empty text",
                    sample.id
                )));
            }
            *inner.text_refs.entry(sample.text.clone()).or_insert(0) += 1;
            inner.next_sample = inner.next_sample.max(sample.id.0 + 1);
            inner.samples.push(sample);
        }
        for annotation in snapshot.annotations {
            if !inner.samples.iter().any(|s| s.id == annotation.sample) {
                return Err(Error::validation(format!(
                    "snapshot annotation {} references missing sample {}",
                    annotation.id, annotation.sample
                )));
            }
            inner.next_annotation = inner.next_annotation.max(annotation.id.0 + 1);
            inner.annotations.push(annotation);
        }
        Ok(Self {
            inner: RwLock::new(inner),
        })
    }
}

fn resolve_link(annotation: &Annotation, catalog: &EntityCatalog) -> Option<ResolvedAnnotation> {
    let Some(value) = catalog.get_value(annotation.value) else {
        log::warn!(
            "annotation {} references deleted value {}; skipping",
            annotation.id,
            annotation.value
        );
        return None;
    };
    let Some(entity) = catalog.get_entity(value.entity) else {
        log::warn!(
            "value {} references deleted entity {}; skipping",
            value.id,
            value.entity
        );
        return None;
    };
    Some(ResolvedAnnotation {
        entity: entity.name,
        value: value.value,
        start: annotation.start,
        end: annotation.end,
    })
}

fn decrement_text_ref(text_refs: &mut HashMap<String, usize>, text: &str) {
    if let Some(count) = text_refs.get_mut(text) {
        *count -= 1;
        if *count == 0 {
            text_refs.remove(text);
        }
    }
}

/// Serializable store state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Samples in creation order.
    pub samples: Vec<Sample>,
    /// Annotation links in creation order.
    pub annotations: Vec<Annotation>,
}
