//! Text encoding for record columns.
//!
//! Scalars are stored as-is, sequences as JSON arrays and source-tagged
//! values as `{"source": .., "value": ..}` objects. Decoding is driven by the
//! column's `FieldKind`, never by the shape of the stored text, and SQL NULL
//! stays distinct from an empty list (`[]`).

use crate::common::error::{Result, ScraperError};
use crate::common::types::{Field, FieldKind, FieldValue, Metadata, SourceTagged, TaggedValue};

pub fn encode(value: &FieldValue) -> Result<String> {
    let text = match value {
        FieldValue::Scalar(s) => s.clone(),
        FieldValue::Sequence(items) => serde_json::to_string(items)?,
        FieldValue::SourceTagged {
            source,
            value: TaggedValue::Scalar(s),
        } => serde_json::to_string(&SourceTagged::new(source.as_str(), s))?,
        FieldValue::SourceTagged {
            source,
            value: TaggedValue::Sequence(items),
        } => serde_json::to_string(&SourceTagged::new(source.as_str(), items))?,
    };
    Ok(text)
}

pub fn decode(field: Field, text: &str) -> Result<FieldValue> {
    let invalid = |e: serde_json::Error| ScraperError::Codec {
        column: field.as_str().to_string(),
        message: e.to_string(),
    };
    let value = match field.kind() {
        FieldKind::Scalar => FieldValue::Scalar(text.to_string()),
        FieldKind::Sequence => FieldValue::Sequence(serde_json::from_str(text).map_err(invalid)?),
        FieldKind::TaggedScalar => {
            let tagged: SourceTagged<String> = serde_json::from_str(text).map_err(invalid)?;
            FieldValue::SourceTagged {
                source: tagged.source,
                value: TaggedValue::Scalar(tagged.value),
            }
        }
        FieldKind::TaggedSequence => {
            let tagged: SourceTagged<Vec<String>> = serde_json::from_str(text).map_err(invalid)?;
            FieldValue::SourceTagged {
                source: tagged.source,
                value: TaggedValue::Sequence(tagged.value),
            }
        }
    };
    Ok(value)
}

/// One encoded column per field, in `Field::ALL` order
pub fn encode_metadata(metadata: &Metadata) -> Result<Vec<(Field, Option<String>)>> {
    Field::ALL
        .iter()
        .map(|field| {
            let column = metadata.get(*field).map(|v| encode(&v)).transpose()?;
            Ok((*field, column))
        })
        .collect()
}

/// Rebuild metadata from stored columns; `column` returns the raw text for a field
pub fn decode_metadata<F>(mut column: F) -> Result<Metadata>
where
    F: FnMut(Field) -> Result<Option<String>>,
{
    let mut metadata = Metadata::default();
    for field in Field::ALL {
        let value = column(field)?.map(|text| decode(field, &text)).transpose()?;
        metadata.set(field, value)?;
    }
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn round_trip(metadata: &Metadata) -> Metadata {
        let columns: HashMap<Field, Option<String>> =
            encode_metadata(metadata).unwrap().into_iter().collect();
        decode_metadata(|f| Ok(columns.get(&f).cloned().flatten())).unwrap()
    }

    #[test]
    fn test_null_and_empty_list_stay_distinct() {
        let metadata = Metadata {
            category: Some(vec![]),
            actors: None,
            ..Default::default()
        };
        let columns: HashMap<Field, Option<String>> =
            encode_metadata(&metadata).unwrap().into_iter().collect();
        assert_eq!(columns[&Field::Category].as_deref(), Some("[]"));
        assert_eq!(columns[&Field::Actors], None);

        let decoded = round_trip(&metadata);
        assert_eq!(decoded.category, Some(vec![]));
        assert_eq!(decoded.actors, None);
    }

    #[test]
    fn test_tagged_values_keep_their_source() {
        let metadata = Metadata {
            title: Some("T".into()),
            cover_url: Some(SourceTagged::new("alpha", "https://a/c.jpg".to_string())),
            image_urls: Some(SourceTagged::new("beta", vec!["1".to_string(), "2".to_string()])),
            ..Default::default()
        };
        assert_eq!(round_trip(&metadata), metadata);
    }

    #[test]
    fn test_scalar_that_looks_like_json_stays_scalar() {
        let value = decode(Field::Title, "[\"not\", \"a list\"]").unwrap();
        assert_eq!(value, FieldValue::Scalar("[\"not\", \"a list\"]".to_string()));
    }

    #[test]
    fn test_malformed_sequence_is_codec_error() {
        let err = decode(Field::Actors, "Jane Doe, Mary Roe").unwrap_err();
        assert!(matches!(err, ScraperError::Codec { column, .. } if column == "actors"));
    }

    #[test]
    fn test_untagged_list_is_rejected_for_tagged_column() {
        assert!(decode(Field::ImageUrls, "[\"javbus\", \"u1\"]").is_err());
    }
}
