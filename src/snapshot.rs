//! Bundled data set: entity catalog plus annotation store, with JSON
//! snapshot persistence.
//!
//! The two stores are independent components; this bundle exists for the
//! operations that need both (export, import, cross-store cascade) and for
//! saving everything to one file so CLI invocations compose.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogSnapshot, EntityCatalog};
use crate::codec::export::{to_exchange_format, ExchangePayload};
use crate::ingest::{ImportPipeline, ImportSummary};
use crate::store::{AnnotationStore, StoreSnapshot};
use crate::types::{SamplePurpose, ValueId};
use crate::Result;

/// Serializable state of a whole data set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSetSnapshot {
    /// Catalog state.
    pub catalog: CatalogSnapshot,
    /// Store state.
    pub store: StoreSnapshot,
}

/// An entity catalog and an annotation store that belong together.
#[derive(Debug, Default)]
pub struct DataSet {
    /// The entity catalog.
    pub catalog: EntityCatalog,
    /// The annotation store.
    pub store: AnnotationStore,
}

impl DataSet {
    /// Create an empty data set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Import delimited text through the ingestion pipeline.
    pub fn import(&self, raw: &str) -> Result<ImportSummary> {
        ImportPipeline::new(&self.catalog, &self.store).run(raw)
    }

    /// Build the exchange payload, optionally restricted to one purpose.
    ///
    /// With no filter, train samples come first, then test samples, each
    /// group in creation order.
    #[must_use]
    pub fn export(&self, purpose: Option<SamplePurpose>) -> ExchangePayload {
        let samples = match purpose {
            Some(p) => self.store.find_by_purpose(p, &self.catalog),
            None => {
                let mut all = self.store.find_by_purpose(SamplePurpose::Train, &self.catalog);
                all.extend(self.store.find_by_purpose(SamplePurpose::Test, &self.catalog));
                all
            }
        };
        to_exchange_format(&samples, &self.catalog.list_all_with_values())
    }

    /// Delete an entity value and cascade its annotation links, so no link
    /// is left dangling. Returns the number of links removed.
    pub fn delete_value(&self, id: ValueId) -> usize {
        if !self.catalog.delete_value(id) {
            return 0;
        }
        self.store.purge_value_links(id)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        let snapshot = DataSetSnapshot {
            catalog: self.catalog.snapshot(),
            store: self.store.snapshot(),
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Deserialize from JSON, validating referential integrity.
    pub fn from_json(raw: &str) -> Result<Self> {
        let snapshot: DataSetSnapshot = serde_json::from_str(raw)?;
        Ok(Self {
            catalog: EntityCatalog::from_snapshot(snapshot.catalog)?,
            store: AnnotationStore::from_snapshot(snapshot.store)?,
        })
    }

    /// Save to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }

    /// Load from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    /// Load from a file, or start empty if the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("no data file at {}, starting empty", path.display());
            Ok(Self::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnnotationRef, TRAIT_LOOKUP};

    fn populated() -> DataSet {
        let ds = DataSet::new();
        ds.catalog.create_entity("city", &[TRAIT_LOOKUP]).unwrap();
        ds.import("text,intent,city\nhello,greet,Paris\nbye,farewell,\n")
            .unwrap();
        ds
    }

    #[test]
    fn json_roundtrip_preserves_everything() {
        let ds = populated();
        let restored = DataSet::from_json(&ds.to_json().unwrap()).unwrap();
        assert_eq!(restored.store.len(), 2);
        assert_eq!(restored.catalog.value_count(), 1);
        assert!(restored.store.exists("hello"));
        assert_eq!(restored.export(None), ds.export(None));
    }

    #[test]
    fn delete_value_cascades_links() {
        let ds = populated();
        let paris = ds.catalog.find_value("city", "Paris").unwrap();
        assert_eq!(ds.delete_value(paris.id), 1);
        assert_eq!(ds.store.annotation_count(), 0);
        assert_eq!(ds.delete_value(paris.id), 0);
    }

    #[test]
    fn export_filter_by_purpose() {
        let ds = populated();
        let sample = ds.store.create_sample("held out", SamplePurpose::Test).unwrap();
        ds.store
            .replace_annotations(sample.id, &[], &ds.catalog)
            .unwrap();

        assert_eq!(ds.export(Some(SamplePurpose::Test)).samples.len(), 1);
        assert_eq!(ds.export(Some(SamplePurpose::Train)).samples.len(), 2);
        assert_eq!(ds.export(None).samples.len(), 3);
    }

    #[test]
    fn corrupt_snapshot_is_rejected() {
        assert!(DataSet::from_json("{not json").is_err());
        // Valid JSON, broken reference: annotation points at a sample
        // that does not exist.
        let raw = r#"{
            "catalog": {"entities": [], "values": []},
            "store": {
                "samples": [],
                "annotations": [
                    {"id": 0, "sample": 9, "value": 0, "start": null, "end": null}
                ]
            }
        }"#;
        assert!(DataSet::from_json(raw).is_err());
    }
}
