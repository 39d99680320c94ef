use crate::common::error::{Result, ScraperError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Every metadata field a source can supply and a record can store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Description,
    ReleaseDate,
    Director,
    Studio,
    Series,
    Category,
    Actors,
    CoverUrl,
    TrailerUrl,
    ImageUrls,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::Title,
        Field::Description,
        Field::ReleaseDate,
        Field::Director,
        Field::Studio,
        Field::Series,
        Field::Category,
        Field::Actors,
        Field::CoverUrl,
        Field::TrailerUrl,
        Field::ImageUrls,
    ];

    /// Column / config key for this field
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::ReleaseDate => "release_date",
            Field::Director => "director",
            Field::Studio => "studio",
            Field::Series => "series",
            Field::Category => "category",
            Field::Actors => "actors",
            Field::CoverUrl => "cover_url",
            Field::TrailerUrl => "trailer_url",
            Field::ImageUrls => "image_urls",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Title
            | Field::Description
            | Field::ReleaseDate
            | Field::Director
            | Field::Studio
            | Field::Series => FieldKind::Scalar,
            Field::Category | Field::Actors => FieldKind::Sequence,
            Field::CoverUrl | Field::TrailerUrl => FieldKind::TaggedScalar,
            Field::ImageUrls => FieldKind::TaggedSequence,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self> {
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| ScraperError::Config(format!("unknown field '{s}'")))
    }
}

/// Storage shape of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    Sequence,
    TaggedScalar,
    TaggedSequence,
}

/// A value paired with the name of the source that produced it.
///
/// Asset downloads need the producing source's session (cookies, Referer),
/// so the tag travels with the value through storage and post-processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTagged<T> {
    pub source: String,
    pub value: T,
}

impl<T> SourceTagged<T> {
    pub fn new(source: impl Into<String>, value: T) -> Self {
        Self {
            source: source.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaggedValue {
    Scalar(String),
    Sequence(Vec<String>),
}

/// Untyped view of a single field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Scalar(String),
    Sequence(Vec<String>),
    SourceTagged { source: String, value: TaggedValue },
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Scalar(_) => FieldKind::Scalar,
            FieldValue::Sequence(_) => FieldKind::Sequence,
            FieldValue::SourceTagged {
                value: TaggedValue::Scalar(_),
                ..
            } => FieldKind::TaggedScalar,
            FieldValue::SourceTagged {
                value: TaggedValue::Sequence(_),
                ..
            } => FieldKind::TaggedSequence,
        }
    }
}

/// Field set produced by one source, or the merged result of several.
/// `None` always means "not supplied"; `Some(vec![])` is a supplied empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub release_date: Option<String>,
    pub director: Option<String>,
    pub studio: Option<String>,
    pub series: Option<String>,
    pub category: Option<Vec<String>>,
    pub actors: Option<Vec<String>>,
    pub cover_url: Option<SourceTagged<String>>,
    pub trailer_url: Option<SourceTagged<String>>,
    pub image_urls: Option<SourceTagged<Vec<String>>>,
}

impl Metadata {
    pub fn is_set(&self, field: Field) -> bool {
        match field {
            Field::Title => self.title.is_some(),
            Field::Description => self.description.is_some(),
            Field::ReleaseDate => self.release_date.is_some(),
            Field::Director => self.director.is_some(),
            Field::Studio => self.studio.is_some(),
            Field::Series => self.series.is_some(),
            Field::Category => self.category.is_some(),
            Field::Actors => self.actors.is_some(),
            Field::CoverUrl => self.cover_url.is_some(),
            Field::TrailerUrl => self.trailer_url.is_some(),
            Field::ImageUrls => self.image_urls.is_some(),
        }
    }

    /// True when no field carries a value
    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| !self.is_set(*f))
    }

    pub fn populated_fields(&self) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|f| self.is_set(*f))
            .collect()
    }

    /// Overwrite one field with the value `other` holds for it (including `None`).
    pub fn copy_field_from(&mut self, field: Field, other: &Metadata) {
        match field {
            Field::Title => self.title = other.title.clone(),
            Field::Description => self.description = other.description.clone(),
            Field::ReleaseDate => self.release_date = other.release_date.clone(),
            Field::Director => self.director = other.director.clone(),
            Field::Studio => self.studio = other.studio.clone(),
            Field::Series => self.series = other.series.clone(),
            Field::Category => self.category = other.category.clone(),
            Field::Actors => self.actors = other.actors.clone(),
            Field::CoverUrl => self.cover_url = other.cover_url.clone(),
            Field::TrailerUrl => self.trailer_url = other.trailer_url.clone(),
            Field::ImageUrls => self.image_urls = other.image_urls.clone(),
        }
    }

    pub fn get(&self, field: Field) -> Option<FieldValue> {
        let scalar = |v: &Option<String>| v.clone().map(FieldValue::Scalar);
        let sequence = |v: &Option<Vec<String>>| v.clone().map(FieldValue::Sequence);
        match field {
            Field::Title => scalar(&self.title),
            Field::Description => scalar(&self.description),
            Field::ReleaseDate => scalar(&self.release_date),
            Field::Director => scalar(&self.director),
            Field::Studio => scalar(&self.studio),
            Field::Series => scalar(&self.series),
            Field::Category => sequence(&self.category),
            Field::Actors => sequence(&self.actors),
            Field::CoverUrl => self.cover_url.as_ref().map(tagged_scalar),
            Field::TrailerUrl => self.trailer_url.as_ref().map(tagged_scalar),
            Field::ImageUrls => self.image_urls.as_ref().map(|t| FieldValue::SourceTagged {
                source: t.source.clone(),
                value: TaggedValue::Sequence(t.value.clone()),
            }),
        }
    }

    /// Set a field from its untyped view. The value must match `field.kind()`.
    pub fn set(&mut self, field: Field, value: Option<FieldValue>) -> Result<()> {
        let Some(value) = value else {
            self.clear(field);
            return Ok(());
        };
        match (field, value) {
            (Field::Title, FieldValue::Scalar(s)) => self.title = Some(s),
            (Field::Description, FieldValue::Scalar(s)) => self.description = Some(s),
            (Field::ReleaseDate, FieldValue::Scalar(s)) => self.release_date = Some(s),
            (Field::Director, FieldValue::Scalar(s)) => self.director = Some(s),
            (Field::Studio, FieldValue::Scalar(s)) => self.studio = Some(s),
            (Field::Series, FieldValue::Scalar(s)) => self.series = Some(s),
            (Field::Category, FieldValue::Sequence(v)) => self.category = Some(v),
            (Field::Actors, FieldValue::Sequence(v)) => self.actors = Some(v),
            (
                Field::CoverUrl,
                FieldValue::SourceTagged {
                    source,
                    value: TaggedValue::Scalar(s),
                },
            ) => self.cover_url = Some(SourceTagged::new(source, s)),
            (
                Field::TrailerUrl,
                FieldValue::SourceTagged {
                    source,
                    value: TaggedValue::Scalar(s),
                },
            ) => self.trailer_url = Some(SourceTagged::new(source, s)),
            (
                Field::ImageUrls,
                FieldValue::SourceTagged {
                    source,
                    value: TaggedValue::Sequence(v),
                },
            ) => self.image_urls = Some(SourceTagged::new(source, v)),
            (field, value) => {
                return Err(ScraperError::Codec {
                    column: field.as_str().to_string(),
                    message: format!("expected {:?}, got {:?}", field.kind(), value.kind()),
                })
            }
        }
        Ok(())
    }

    fn clear(&mut self, field: Field) {
        self.copy_field_from(field, &Metadata::default());
    }

    /// First listed actor, if any
    pub fn primary_actor(&self) -> Option<&str> {
        self.actors
            .as_ref()
            .and_then(|actors| actors.first())
            .map(|s| s.as_str())
    }
}

fn tagged_scalar(t: &SourceTagged<String>) -> FieldValue {
    FieldValue::SourceTagged {
        source: t.source.clone(),
        value: TaggedValue::Scalar(t.value.clone()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Pending,
    Success,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "PENDING",
            RecordStatus::Success => "SUCCESS",
            RecordStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(RecordStatus::Pending),
            "SUCCESS" => Ok(RecordStatus::Success),
            "FAILED" => Ok(RecordStatus::Failed),
            other => Err(ScraperError::Codec {
                column: "status".to_string(),
                message: format!("unknown status '{other}'"),
            }),
        }
    }
}

/// The unit of work and persistence: one identifier and everything known about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub identifier: String,
    /// Where the media file lives during this run. Recomputed from each scan,
    /// never read back from the store.
    pub file_location: Option<PathBuf>,
    pub metadata: Metadata,
    pub status: RecordStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaRecord {
    pub fn new(identifier: impl Into<String>, file_location: Option<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            identifier: identifier.into(),
            file_location,
            metadata: Metadata::default(),
            status: RecordStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_round_trips_through_its_name() {
        for field in Field::ALL {
            assert_eq!(field.as_str().parse::<Field>().unwrap(), field);
        }
        assert!("poster".parse::<Field>().is_err());
    }

    #[test]
    fn test_empty_sequence_counts_as_set() {
        let mut meta = Metadata::default();
        assert!(meta.is_empty());
        meta.category = Some(vec![]);
        assert!(meta.is_set(Field::Category));
        assert!(!meta.is_empty());
    }

    #[test]
    fn test_copy_field_only_touches_that_field() {
        let mut target = Metadata {
            title: Some("keep".into()),
            ..Default::default()
        };
        let source = Metadata {
            title: Some("other".into()),
            actors: Some(vec!["A".into()]),
            ..Default::default()
        };
        target.copy_field_from(Field::Actors, &source);
        assert_eq!(target.title.as_deref(), Some("keep"));
        assert_eq!(target.actors, Some(vec!["A".to_string()]));
    }

    #[test]
    fn test_set_rejects_wrong_kind() {
        let mut meta = Metadata::default();
        let err = meta.set(Field::Title, Some(FieldValue::Sequence(vec!["x".into()])));
        assert!(err.is_err());
        assert!(meta.title.is_none());
    }

    #[test]
    fn test_get_set_preserves_source_tag() {
        let mut meta = Metadata::default();
        meta.image_urls = Some(SourceTagged::new("javbus", vec!["a".into(), "b".into()]));
        let value = meta.get(Field::ImageUrls);

        let mut copy = Metadata::default();
        copy.set(Field::ImageUrls, value).unwrap();
        assert_eq!(copy.image_urls, meta.image_urls);
        assert_eq!(copy.image_urls.unwrap().source, "javbus");
    }

    #[test]
    fn test_primary_actor() {
        let mut meta = Metadata::default();
        assert_eq!(meta.primary_actor(), None);
        meta.actors = Some(vec!["Jane Doe".into(), "Other".into()]);
        assert_eq!(meta.primary_actor(), Some("Jane Doe"));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("SUCCESS".parse::<RecordStatus>().unwrap(), RecordStatus::Success);
        assert!("DONE".parse::<RecordStatus>().is_err());
    }
}
