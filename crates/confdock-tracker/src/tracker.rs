use crate::{MetadataStore, Result, TrackedResourceRecord};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;

/// Records successful synchronizations and answers "which page does this
/// file belong to".
#[derive(Clone)]
pub struct ResourceTracker {
    storage: Arc<dyn MetadataStore>,
}

impl ResourceTracker {
    pub fn new(storage: Arc<dyn MetadataStore>) -> Self {
        Self { storage }
    }

    pub async fn lookup(&self, source: &Path) -> Result<Option<TrackedResourceRecord>> {
        self.storage.find_by_source(source).await
    }

    /// Stamps `record` with the current time and persists it, replacing any
    /// previous record for the same id.
    pub async fn record(&self, mut record: TrackedResourceRecord) -> Result<TrackedResourceRecord> {
        record.last_updated = Utc::now();
        self.storage.save(&record).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryStorage, MetadataStore};
    use chrono::Duration;

    #[tokio::test]
    async fn test_record_refreshes_timestamp_and_replaces() {
        let storage = Arc::new(InMemoryStorage::new());
        let tracker = ResourceTracker::new(storage.clone());
        let source = Path::new("/work/page.html");

        let mut first = TrackedResourceRecord::new("5", "Page", 1).with_source(Some(source));
        first.last_updated = Utc::now() - Duration::days(2);
        let saved = tracker.record(first.clone()).await.unwrap();
        assert!(saved.last_updated > first.last_updated);

        tracker
            .record(TrackedResourceRecord { version: 2, ..saved })
            .await
            .unwrap();

        assert_eq!(storage.list().await.unwrap().len(), 1);
        assert_eq!(storage.load("5").await.unwrap().unwrap().version, 2);
        assert_eq!(tracker.lookup(source).await.unwrap().unwrap().version, 2);
    }
}
