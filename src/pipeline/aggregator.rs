use crate::common::constants::NO_DATA_MESSAGE;
use crate::common::error::{Result, ScraperError};
use crate::common::types::{Field, MediaRecord, Metadata, RecordStatus};
use crate::config::Config;
use crate::sources::{collect_fields, create_enabled_adapters, SourceAdapter};
use metrics::counter;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument, warn};

/// Ordered list of source names per field, most trusted first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPriorityTable {
    entries: BTreeMap<Field, Vec<String>>,
}

impl FieldPriorityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        let mut table = Self::new();
        for field in Field::ALL {
            table.set(field, config.priority_for(field).to_vec());
        }
        table
    }

    pub fn set(&mut self, field: Field, sources: Vec<String>) {
        self.entries.insert(field, sources);
    }

    /// Builder-style `set`
    pub fn with(mut self, field: Field, sources: &[&str]) -> Self {
        self.set(field, sources.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn sources_for(&self, field: Field) -> &[String] {
        self.entries.get(&field).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Per-source field sets gathered for one identifier
pub type SourceResults = HashMap<String, Metadata>;

/// Queries every enabled source and merges their answers field by field.
pub struct Aggregator {
    adapters: Vec<Box<dyn SourceAdapter>>,
    enabled: Vec<String>,
    priority: FieldPriorityTable,
}

impl Aggregator {
    pub fn new(
        adapters: Vec<Box<dyn SourceAdapter>>,
        enabled: Vec<String>,
        priority: FieldPriorityTable,
    ) -> Self {
        for name in &enabled {
            if !adapters.iter().any(|a| a.name() == name.as_str()) {
                warn!("Source '{}' is enabled but has no adapter; it will be skipped", name);
            }
        }
        Self {
            adapters,
            enabled,
            priority,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            create_enabled_adapters(config)?,
            config.scraper.enabled.clone(),
            FieldPriorityTable::from_config(config),
        ))
    }

    /// Registered adapter by name, used by post-processing for fetch context
    pub fn adapter(&self, name: &str) -> Option<&dyn SourceAdapter> {
        self.adapters
            .iter()
            .find(|a| a.name() == name)
            .map(|a| a.as_ref())
    }

    fn is_usable(&self, name: &str) -> bool {
        self.enabled.iter().any(|e| e == name) && self.adapter(name).is_some()
    }

    /// Sources in the order the priority table first needs them, followed by
    /// enabled sources the table never mentions.
    pub fn query_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        let listed = Field::ALL
            .iter()
            .flat_map(|f| self.priority.sources_for(*f).iter())
            .chain(self.enabled.iter());
        for name in listed {
            if self.is_usable(name) && !order.contains(name) {
                order.push(name.clone());
            }
        }
        order
    }

    /// Locate the identifier on each source and collect full field sets.
    /// A source that fails to locate, or fails mid-collection, contributes nothing.
    pub async fn collect(&self, identifier: &str) -> SourceResults {
        let mut results = SourceResults::new();
        for name in self.query_order() {
            let Some(adapter) = self.adapter(&name) else {
                continue;
            };

            let reference = match adapter.locate(identifier).await {
                Ok(Some(reference)) => reference,
                Ok(None) => {
                    debug!("{} not found on {}", identifier, name);
                    continue;
                }
                Err(e) => {
                    warn!("Locating {} on {} failed, skipping source: {}", identifier, name, e);
                    counter!("media_scraper_source_failures_total", "source" => name.clone())
                        .increment(1);
                    continue;
                }
            };

            match collect_fields(adapter, &reference).await {
                Ok(metadata) => {
                    debug!(
                        "{} supplied {} fields for {}",
                        name,
                        metadata.populated_fields().len(),
                        identifier
                    );
                    results.insert(name, metadata);
                }
                Err(e) => {
                    warn!("Discarding {} result for {}: {}", name, identifier, e);
                    counter!("media_scraper_source_failures_total", "source" => name.clone())
                        .increment(1);
                }
            }
        }
        results
    }

    /// Strict first-match merge: each field comes from the first source in its
    /// priority list that supplied a value. Later sources never override.
    pub fn merge(&self, results: &SourceResults) -> Metadata {
        let mut merged = Metadata::default();
        for field in Field::ALL {
            for source in self.priority.sources_for(field) {
                if !self.enabled.iter().any(|e| e == source) {
                    continue;
                }
                let Some(result) = results.get(source) else {
                    continue;
                };
                if result.is_set(field) {
                    merged.copy_field_from(field, result);
                    debug!("field {} taken from {}", field, source);
                    break;
                }
            }
        }
        merged
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self, identifier: &str) -> Result<MediaRecord> {
        let results = self.collect(identifier).await;
        let merged = self.merge(&results);

        if merged.is_empty() {
            counter!("media_scraper_resolutions_total", "outcome" => "failed").increment(1);
            return Err(ScraperError::Resolution(NO_DATA_MESSAGE.to_string()));
        }

        info!(
            "Resolved {} from {} source(s), {} field(s)",
            identifier,
            results.len(),
            merged.populated_fields().len()
        );
        counter!("media_scraper_resolutions_total", "outcome" => "success").increment(1);

        let mut record = MediaRecord::new(identifier, None);
        record.metadata = merged;
        record.status = RecordStatus::Success;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{FieldKind, FieldValue, SourceTagged, TaggedValue};
    use crate::sources::testing::{Behavior, MockAdapter};
    use std::sync::atomic::Ordering;

    fn value_from(source: &str, field: Field) -> FieldValue {
        match field.kind() {
            FieldKind::Scalar => FieldValue::Scalar(format!("{source}-{field}")),
            FieldKind::Sequence => FieldValue::Sequence(vec![format!("{source}-{field}")]),
            FieldKind::TaggedScalar => FieldValue::SourceTagged {
                source: source.to_string(),
                value: TaggedValue::Scalar(format!("{source}-{field}")),
            },
            FieldKind::TaggedSequence => FieldValue::SourceTagged {
                source: source.to_string(),
                value: TaggedValue::Sequence(vec![format!("{source}-{field}")]),
            },
        }
    }

    fn all_fields(priority: &[&str]) -> FieldPriorityTable {
        Field::ALL
            .iter()
            .fold(FieldPriorityTable::new(), |t, f| t.with(*f, priority))
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_takes_first_non_null_in_priority_order() {
        let sources = ["alpha", "beta", "gamma"];
        let priority = ["gamma", "alpha", "beta"];
        let aggregator = Aggregator::new(Vec::new(), names(&sources), all_fields(&priority));

        for field in Field::ALL {
            for mask in 0u8..8 {
                let mut results = SourceResults::new();
                for (bit, source) in sources.iter().enumerate() {
                    let mut metadata = Metadata::default();
                    if mask & (1 << bit) != 0 {
                        metadata.set(field, Some(value_from(source, field))).unwrap();
                    }
                    results.insert(source.to_string(), metadata);
                }

                let expected = priority
                    .iter()
                    .find(|p| {
                        let bit = sources.iter().position(|s| *s == **p).unwrap();
                        mask & (1 << bit) != 0
                    })
                    .map(|winner| value_from(winner, field));

                let merged = aggregator.merge(&results);
                assert_eq!(merged.get(field), expected, "field {field} mask {mask:03b}");
                for other in Field::ALL.iter().filter(|f| **f != field) {
                    assert!(!merged.is_set(*other));
                }
            }
        }
    }

    #[test]
    fn test_merge_skips_sources_not_enabled() {
        let aggregator = Aggregator::new(Vec::new(), names(&["beta"]), all_fields(&["alpha", "beta"]));
        let mut results = SourceResults::new();
        results.insert(
            "alpha".into(),
            Metadata {
                title: Some("from alpha".into()),
                ..Default::default()
            },
        );
        results.insert(
            "beta".into(),
            Metadata {
                title: Some("from beta".into()),
                ..Default::default()
            },
        );
        assert_eq!(aggregator.merge(&results).title.as_deref(), Some("from beta"));
    }

    #[test]
    fn test_merge_keeps_empty_list_as_a_value() {
        let aggregator = Aggregator::new(Vec::new(), names(&["alpha", "beta"]), all_fields(&["alpha", "beta"]));
        let mut results = SourceResults::new();
        results.insert(
            "alpha".into(),
            Metadata {
                actors: Some(vec![]),
                ..Default::default()
            },
        );
        results.insert(
            "beta".into(),
            Metadata {
                actors: Some(vec!["X".into()]),
                ..Default::default()
            },
        );
        assert_eq!(aggregator.merge(&results).actors, Some(vec![]));
    }

    #[tokio::test]
    async fn test_two_source_scenario() {
        let alpha = MockAdapter::new(
            "Alpha",
            Metadata {
                title: Some("T1".into()),
                cover_url: Some(SourceTagged::new("Alpha", "u1".to_string())),
                ..Default::default()
            },
        );
        let beta = MockAdapter::new(
            "Beta",
            Metadata {
                title: Some("T2".into()),
                actors: Some(vec!["X".into()]),
                ..Default::default()
            },
        );
        let priority = FieldPriorityTable::new()
            .with(Field::Title, &["Beta", "Alpha"])
            .with(Field::CoverUrl, &["Alpha", "Beta"])
            .with(Field::Actors, &["Alpha", "Beta"]);
        let aggregator = Aggregator::new(
            vec![Box::new(alpha), Box::new(beta)],
            names(&["Alpha", "Beta"]),
            priority,
        );

        let record = aggregator.resolve("ABC-123").await.unwrap();
        assert_eq!(record.identifier, "ABC-123");
        assert_eq!(record.status, RecordStatus::Success);
        assert_eq!(record.metadata.title.as_deref(), Some("T2"));
        assert_eq!(
            record.metadata.cover_url,
            Some(SourceTagged::new("Alpha", "u1".to_string()))
        );
        assert_eq!(record.metadata.actors, Some(vec!["X".to_string()]));
    }

    #[tokio::test]
    async fn test_failing_source_is_isolated() {
        for behavior in [Behavior::LocateFails, Behavior::AccessorFails] {
            let broken = MockAdapter::new(
                "broken",
                Metadata {
                    title: Some("never seen".into()),
                    ..Default::default()
                },
            )
            .behaving(behavior);
            let healthy = MockAdapter::new(
                "healthy",
                Metadata {
                    title: Some("ok".into()),
                    studio: Some("S".into()),
                    ..Default::default()
                },
            );
            let aggregator = Aggregator::new(
                vec![Box::new(broken), Box::new(healthy)],
                names(&["broken", "healthy"]),
                all_fields(&["broken", "healthy"]),
            );

            let record = aggregator.resolve("ABC-123").await.unwrap();
            assert_eq!(record.metadata.title.as_deref(), Some("ok"));
            assert_eq!(record.metadata.studio.as_deref(), Some("S"));
        }
    }

    #[tokio::test]
    async fn test_all_null_is_resolution_failure() {
        let empty = MockAdapter::new("empty", Metadata::default());
        let missing = MockAdapter::new("missing", Metadata::default()).behaving(Behavior::NotFound);
        let aggregator = Aggregator::new(
            vec![Box::new(empty), Box::new(missing)],
            names(&["empty", "missing"]),
            all_fields(&["empty", "missing"]),
        );

        let err = aggregator.resolve("ABC-123").await.unwrap_err();
        assert!(matches!(err, ScraperError::Resolution(ref m) if m == NO_DATA_MESSAGE));
    }

    #[tokio::test]
    async fn test_not_found_source_is_never_asked_for_fields() {
        let missing = MockAdapter::new("missing", Metadata::default()).behaving(Behavior::NotFound);
        let calls = missing.calls.clone();
        let aggregator = Aggregator::new(
            vec![Box::new(missing)],
            names(&["missing"]),
            all_fields(&["missing"]),
        );
        let results = aggregator.collect("ABC-123").await;
        assert!(results.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_adapter_is_never_queried() {
        let disabled = MockAdapter::new(
            "disabled",
            Metadata {
                title: Some("x".into()),
                ..Default::default()
            },
        );
        let calls = disabled.calls.clone();
        let aggregator = Aggregator::new(
            vec![Box::new(disabled)],
            names(&["ghost"]),
            all_fields(&["disabled", "ghost"]),
        );
        assert!(aggregator.query_order().is_empty());
        assert!(aggregator.resolve("ABC-123").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_query_order_follows_priority_then_enabled() {
        let adapters: Vec<Box<dyn SourceAdapter>> = ["a", "b", "c"]
            .iter()
            .map(|n| Box::new(MockAdapter::new(n, Metadata::default())) as Box<dyn SourceAdapter>)
            .collect();
        let priority = FieldPriorityTable::new()
            .with(Field::Title, &["b"])
            .with(Field::Actors, &["c", "b"]);
        let aggregator = Aggregator::new(adapters, names(&["a", "b", "c"]), priority);
        assert_eq!(aggregator.query_order(), names(&["b", "c", "a"]));
    }
}
