//! Export to the canonical exchange payload.
//!
//! The payload has two top-level sections. `entities` carries the full
//! label set (including entities no sample references), `samples` carries
//! each utterance with its annotations. Field names and nesting are stable
//! for downstream trainer compatibility; do not rename them.

use serde::{Deserialize, Serialize};

use crate::types::{AnnotatedSample, Entity, EntityValue};

/// One entity in the catalog section of the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeEntity {
    /// Entity name.
    pub name: String,
    /// Known values, in creation order.
    pub values: Vec<String>,
}

/// One annotation on an exported sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeAnnotation {
    /// Entity name.
    pub name: String,
    /// Value string.
    pub value: String,
    /// Start character offset; omitted for trait-style annotations.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub start: Option<usize>,
    /// End character offset (exclusive); omitted for trait-style annotations.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end: Option<usize>,
}

/// One exported sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeSample {
    /// The utterance text.
    pub text: String,
    /// Annotations in link insertion order.
    pub entities: Vec<ExchangeAnnotation>,
}

/// The canonical exchange document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangePayload {
    /// Full entity catalog.
    pub entities: Vec<ExchangeEntity>,
    /// Annotated samples.
    pub samples: Vec<ExchangeSample>,
}

/// Build the exchange payload from resolved samples and the entity catalog.
///
/// Pure and deterministic: output ordering is the insertion order of the
/// inputs. Performs no I/O.
#[must_use]
pub fn to_exchange_format(
    samples: &[AnnotatedSample],
    entities: &[(Entity, Vec<EntityValue>)],
) -> ExchangePayload {
    ExchangePayload {
        entities: entities
            .iter()
            .map(|(entity, values)| ExchangeEntity {
                name: entity.name.clone(),
                values: values.iter().map(|v| v.value.clone()).collect(),
            })
            .collect(),
        samples: samples
            .iter()
            .map(|sample| ExchangeSample {
                text: sample.text.clone(),
                entities: sample
                    .annotations
                    .iter()
                    .map(|a| ExchangeAnnotation {
                        name: a.entity.clone(),
                        value: a.value.clone(),
                        start: a.start,
                        end: a.end,
                    })
                    .collect(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityId, ResolvedAnnotation, SampleId, SamplePurpose, ValueId};

    fn city_entity() -> (Entity, Vec<EntityValue>) {
        (
            Entity {
                id: EntityId(0),
                name: "city".into(),
                lookups: vec![],
            },
            vec![EntityValue {
                id: ValueId(0),
                entity: EntityId(0),
                value: "Paris".into(),
                synonyms: vec![],
            }],
        )
    }

    fn sample(text: &str, annotations: Vec<ResolvedAnnotation>) -> AnnotatedSample {
        AnnotatedSample {
            id: SampleId(0),
            text: text.into(),
            purpose: SamplePurpose::Train,
            trained: false,
            annotations,
        }
    }

    #[test]
    fn payload_field_names_are_stable() {
        let payload = to_exchange_format(
            &[sample(
                "Paris please",
                vec![ResolvedAnnotation {
                    entity: "city".into(),
                    value: "Paris".into(),
                    start: Some(0),
                    end: Some(5),
                }],
            )],
            &[city_entity()],
        );

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["entities"][0]["name"], "city");
        assert_eq!(json["entities"][0]["values"][0], "Paris");
        assert_eq!(json["samples"][0]["text"], "Paris please");
        assert_eq!(json["samples"][0]["entities"][0]["name"], "city");
        assert_eq!(json["samples"][0]["entities"][0]["value"], "Paris");
        assert_eq!(json["samples"][0]["entities"][0]["start"], 0);
        assert_eq!(json["samples"][0]["entities"][0]["end"], 5);
    }

    #[test]
    fn trait_annotations_omit_offsets() {
        let payload = to_exchange_format(
            &[sample(
                "hello",
                vec![ResolvedAnnotation {
                    entity: "sentiment".into(),
                    value: "positive".into(),
                    start: None,
                    end: None,
                }],
            )],
            &[],
        );
        let json = serde_json::to_value(&payload).unwrap();
        let annotation = &json["samples"][0]["entities"][0];
        assert!(annotation.get("start").is_none());
        assert!(annotation.get("end").is_none());
    }

    #[test]
    fn unreferenced_entities_stay_in_catalog_section() {
        let payload = to_exchange_format(&[sample("hello", vec![])], &[city_entity()]);
        assert_eq!(payload.entities.len(), 1);
        assert_eq!(payload.entities[0].name, "city");
        assert!(payload.samples[0].entities.is_empty());
    }

    #[test]
    fn export_is_deterministic() {
        let samples = vec![sample("a", vec![]), sample("b", vec![])];
        let entities = vec![city_entity()];
        let first = to_exchange_format(&samples, &entities);
        let second = to_exchange_format(&samples, &entities);
        assert_eq!(first, second);
        let texts: Vec<_> = first.samples.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }
}
