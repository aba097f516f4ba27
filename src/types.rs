//! Core data model: samples, entities, entity values, and annotations.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Lookup tag marking a non-positional entity: its value applies to the
/// whole sample rather than a character span.
pub const TRAIT_LOOKUP: &str = "trait";

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(
    /// Identifier of a [`Sample`].
    SampleId
);
id_newtype!(
    /// Identifier of an [`Entity`].
    EntityId
);
id_newtype!(
    /// Identifier of an [`EntityValue`].
    ValueId
);
id_newtype!(
    /// Identifier of an [`Annotation`].
    AnnotationId
);

/// What a sample is used for: training the recognizer or evaluating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplePurpose {
    /// Training data (the default for imported samples).
    #[default]
    Train,
    /// Held-out evaluation data.
    Test,
}

impl SamplePurpose {
    /// Stable label string ("train" / "test").
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SamplePurpose::Train => "train",
            SamplePurpose::Test => "test",
        }
    }
}

impl std::fmt::Display for SamplePurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SamplePurpose {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "train" | "training" => Ok(SamplePurpose::Train),
            "test" | "testing" => Ok(SamplePurpose::Test),
            other => Err(Error::validation(format!(
                "unknown sample purpose: {other:?} (expected \"train\" or \"test\")"
            ))),
        }
    }
}

/// A labeled text utterance used for training or testing the recognizer.
///
/// `text` is not required to be unique in storage, but the ingestion
/// pipeline treats exact-text duplicates as already present and skips them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Unique identifier.
    pub id: SampleId,
    /// The utterance text. Never empty.
    pub text: String,
    /// Train or test.
    pub purpose: SamplePurpose,
    /// Whether this sample has been included in a committed training run.
    /// Reset to false whenever text or purpose changes.
    pub trained: bool,
}

/// A named category of extractable information (e.g. "city").
///
/// The name is the stable external key: import column headers and export
/// payloads refer to entities by name, never by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier.
    pub id: EntityId,
    /// Unique, non-empty name.
    pub name: String,
    /// Categorical tags. Contains [`TRAIT_LOOKUP`] for non-positional entities.
    pub lookups: Vec<String>,
}

impl Entity {
    /// Whether this entity is annotated without character offsets.
    #[must_use]
    pub fn is_trait(&self) -> bool {
        self.lookups.iter().any(|l| l == TRAIT_LOOKUP)
    }
}

/// A concrete value belonging to an [`Entity`] (e.g. "Paris" for "city").
///
/// The (entity, value) pair is logically unique; resolution always returns
/// the stored record before creating a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityValue {
    /// Unique identifier.
    pub id: ValueId,
    /// Owning entity.
    pub entity: EntityId,
    /// The value string.
    pub value: String,
    /// Alternative surface forms.
    pub synonyms: Vec<String>,
}

/// The link annotating a [`Sample`] with an [`EntityValue`].
///
/// Offsets are character offsets into the sample text, end exclusive.
/// Both are present for positional annotations and both absent for
/// trait-style annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Unique identifier.
    pub id: AnnotationId,
    /// The annotated sample.
    pub sample: SampleId,
    /// The linked entity value.
    pub value: ValueId,
    /// Start character offset, if positional.
    pub start: Option<usize>,
    /// End character offset (exclusive), if positional.
    pub end: Option<usize>,
}

impl Annotation {
    /// The (start, end) span, if this annotation is positional.
    #[must_use]
    pub fn span(&self) -> Option<(usize, usize)> {
        match (self.start, self.end) {
            (Some(s), Some(e)) => Some((s, e)),
            _ => None,
        }
    }
}

/// Requested annotation content, used when (re)writing a sample's
/// annotation set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRef {
    /// The entity value to link.
    pub value: ValueId,
    /// Start character offset, if positional.
    pub start: Option<usize>,
    /// End character offset (exclusive), if positional.
    pub end: Option<usize>,
}

impl AnnotationRef {
    /// A trait-style (non-positional) annotation.
    #[must_use]
    pub fn trait_of(value: ValueId) -> Self {
        Self {
            value,
            start: None,
            end: None,
        }
    }

    /// A positional annotation with a character span.
    #[must_use]
    pub fn spanned(value: ValueId, start: usize, end: usize) -> Self {
        Self {
            value,
            start: Some(start),
            end: Some(end),
        }
    }

    /// Check span well-formedness: both offsets or neither, start < end.
    pub fn validate(&self) -> Result<()> {
        match (self.start, self.end) {
            (None, None) => Ok(()),
            (Some(s), Some(e)) if s < e => Ok(()),
            (Some(s), Some(e)) => Err(Error::validation(format!(
                "annotation span is empty or inverted: start={s}, end={e}"
            ))),
            _ => Err(Error::validation(
                "annotation span must set both start and end, or neither",
            )),
        }
    }
}

/// An annotation resolved to entity name and value string, the read view
/// consumed by export and training.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAnnotation {
    /// Entity name.
    pub entity: String,
    /// Value string.
    pub value: String,
    /// Start character offset, if positional.
    pub start: Option<usize>,
    /// End character offset (exclusive), if positional.
    pub end: Option<usize>,
}

/// A sample joined with its resolved annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedSample {
    /// Sample identifier.
    pub id: SampleId,
    /// The utterance text.
    pub text: String,
    /// Train or test.
    pub purpose: SamplePurpose,
    /// Whether the sample is marked trained.
    pub trained: bool,
    /// Resolved annotations, in annotation insertion order.
    pub annotations: Vec<ResolvedAnnotation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn purpose_label_roundtrip() {
        for p in [SamplePurpose::Train, SamplePurpose::Test] {
            assert_eq!(SamplePurpose::from_str(p.as_str()).unwrap(), p);
        }
        assert!(SamplePurpose::from_str("validation").is_err());
    }

    #[test]
    fn trait_lookup_detection() {
        let e = Entity {
            id: EntityId(1),
            name: "sentiment".into(),
            lookups: vec![TRAIT_LOOKUP.into()],
        };
        assert!(e.is_trait());

        let e2 = Entity {
            id: EntityId(2),
            name: "city".into(),
            lookups: vec!["keywords".into()],
        };
        assert!(!e2.is_trait());
    }

    #[test]
    fn annotation_ref_span_validation() {
        assert!(AnnotationRef::trait_of(ValueId(1)).validate().is_ok());
        assert!(AnnotationRef::spanned(ValueId(1), 0, 4).validate().is_ok());
        assert!(AnnotationRef::spanned(ValueId(1), 4, 4).validate().is_err());
        assert!(AnnotationRef {
            value: ValueId(1),
            start: Some(3),
            end: None,
        }
        .validate()
        .is_err());
    }

    #[test]
    fn annotation_span_requires_both_offsets() {
        let a = Annotation {
            id: AnnotationId(1),
            sample: SampleId(1),
            value: ValueId(1),
            start: Some(0),
            end: None,
        };
        assert_eq!(a.span(), None);
    }
}
