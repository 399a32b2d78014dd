use std::path::PathBuf;
use std::sync::Arc;

use backup_store::{BackupStore, timestamp_now};
use sync_api::{BackupRecord, ChangeNotification, ErrorKind, FetchOutcome, ObjectSource, SyncError};

use crate::listen::{HandlerFuture, NotificationHandler};

// ═══════════════════════════════════════════════════════════════
//  Outcome of one notification
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Not CREATED/UPDATED.
    EventType(String),
    NoVersion,
    NoReferencedObject,
    /// Handler only observes notifications.
    WatchOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackupOutcome {
    Skipped(SkipReason),
    NoData,
    Saved(PathBuf),
    Failed(SyncError),
}

// ═══════════════════════════════════════════════════════════════
//  BackupJob: notification → fetch → file
// ═══════════════════════════════════════════════════════════════

pub struct BackupJob {
    project_id: String,
    source: Arc<dyn ObjectSource>,
    store: BackupStore,
}

impl BackupJob {
    pub fn new(project_id: impl Into<String>, source: Arc<dyn ObjectSource>, store: BackupStore) -> Self {
        Self {
            project_id: project_id.into(),
            source,
            store,
        }
    }

    pub fn store(&self) -> &BackupStore {
        &self.store
    }

    /// Back up the object a notification points at. Never panics and never
    /// returns an error: every failure is folded into the outcome so the
    /// listen loop keeps going.
    pub async fn process(&self, notification: &ChangeNotification) -> BackupOutcome {
        if !notification.event_type.is_version_change() {
            tracing::info!(event_type = %notification.event_type, "not a version change, skipping");
            return BackupOutcome::Skipped(SkipReason::EventType(
                notification.event_type.as_str().to_string(),
            ));
        }
        if notification.version.is_none() {
            tracing::warn!(event_type = %notification.event_type, "notification carries no version, skipping");
            return BackupOutcome::Skipped(SkipReason::NoVersion);
        }
        let Some(object_id) = notification.referenced_object_id() else {
            tracing::warn!(
                version_id = notification.version_id().unwrap_or("?"),
                "version has no referenced object, skipping"
            );
            return BackupOutcome::Skipped(SkipReason::NoReferencedObject);
        };

        tracing::info!(
            event_type = %notification.event_type,
            version_id = notification.version_id().unwrap_or("?"),
            object_id,
            message = notification.message(),
            "new version detected"
        );

        let data = match self.source.fetch_object(&self.project_id, object_id).await {
            Ok(FetchOutcome::Found(data)) => data,
            Ok(FetchOutcome::Empty) => {
                tracing::warn!(object_id, "no data for object, backup skipped");
                return BackupOutcome::NoData;
            }
            Err(e) => {
                tracing::error!(object_id, error = %e, "fetch failed");
                return BackupOutcome::Failed(e);
            }
        };

        let record = BackupRecord {
            project_id: self.project_id.clone(),
            version_id: notification.version_id().map(str::to_string),
            object_id: object_id.to_string(),
            message: Some(notification.message().to_string()),
            backup_timestamp: Some(timestamp_now()),
            data,
        };

        let store = self.store.clone();
        let written = tokio::task::spawn_blocking(move || store.write(&record))
            .await
            .unwrap_or_else(|e| Err(SyncError::io(format!("backup task: {e}"))));

        match written {
            Ok(path) => {
                tracing::info!(path = %path.display(), object_id, "backup saved");
                BackupOutcome::Saved(path)
            }
            Err(e) if e.kind() == ErrorKind::Empty => {
                tracing::warn!(object_id, "no data for object, backup skipped");
                BackupOutcome::NoData
            }
            Err(e) => {
                tracing::error!(object_id, error = %e, "backup write failed");
                BackupOutcome::Failed(e)
            }
        }
    }
}

impl NotificationHandler for BackupJob {
    fn handle<'a>(&'a self, notification: &'a ChangeNotification) -> HandlerFuture<'a> {
        Box::pin(self.process(notification))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use backup_store::FilenameStyle;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use sync_api::SyncFuture;
    use tempfile::TempDir;

    /// Object source that replays one canned answer and records calls.
    struct FakeSource {
        answer: Result<FetchOutcome, SyncError>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl FakeSource {
        fn new(answer: Result<FetchOutcome, SyncError>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ObjectSource for FakeSource {
        fn fetch_object<'a>(&'a self, project_id: &'a str, object_id: &'a str) -> SyncFuture<'a, FetchOutcome> {
            self.calls
                .lock()
                .unwrap()
                .push((project_id.to_string(), object_id.to_string()));
            let answer = self.answer.clone();
            Box::pin(async move { answer })
        }
    }

    fn notification(value: Value) -> ChangeNotification {
        serde_json::from_value(value).unwrap()
    }

    fn created(version: &str, object: &str) -> ChangeNotification {
        notification(json!({
            "id": "m1",
            "modelId": "m1",
            "type": "CREATED",
            "version": {
                "id": version,
                "message": "Updated geometry",
                "referencedObject": object
            }
        }))
    }

    fn files(dir: &std::path::Path) -> Vec<PathBuf> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn job(tmp: &TempDir, source: Arc<FakeSource>) -> BackupJob {
        let store = BackupStore::new(tmp.path().join("backups"), FilenameStyle::Version);
        BackupJob::new("p1", source, store)
    }

    #[tokio::test]
    async fn created_version_is_backed_up_once() {
        let tmp = TempDir::new().unwrap();
        let source = FakeSource::new(Ok(FetchOutcome::Found(json!({"foo": "bar"}))));
        let job = job(&tmp, source.clone());

        let outcome = job.process(&created("v1", "obj123")).await;

        let path = match outcome {
            BackupOutcome::Saved(path) => path,
            other => panic!("expected Saved, got {other:?}"),
        };
        assert_eq!(source.calls(), vec![("p1".to_string(), "obj123".to_string())]);
        assert_eq!(files(job.store().dir()), vec![path.clone()]);

        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("backup_") && name.ends_with("_v1.json"), "{name}");

        let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["projectId"], "p1");
        assert_eq!(saved["versionId"], "v1");
        assert_eq!(saved["objectId"], "obj123");
        assert_eq!(saved["message"], "Updated geometry");
        assert_eq!(saved["data"], json!({"foo": "bar"}));

        let stamp = saved["backupTimestamp"].as_str().unwrap();
        assert_eq!(name, format!("backup_{stamp}_v1.json"));
    }

    #[tokio::test]
    async fn empty_referenced_object_never_fetches() {
        let tmp = TempDir::new().unwrap();
        let source = FakeSource::new(Ok(FetchOutcome::Found(json!({"foo": "bar"}))));
        let job = job(&tmp, source.clone());

        let outcome = job.process(&created("v1", "")).await;

        assert_eq!(outcome, BackupOutcome::Skipped(SkipReason::NoReferencedObject));
        assert!(source.calls().is_empty());
        assert!(files(job.store().dir()).is_empty());
    }

    #[tokio::test]
    async fn other_event_types_and_missing_versions_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let source = FakeSource::new(Ok(FetchOutcome::Found(json!({"foo": "bar"}))));
        let job = job(&tmp, source.clone());

        let deleted = notification(json!({"type": "DELETED", "version": {"id": "v1", "referencedObject": "o"}}));
        assert_eq!(
            job.process(&deleted).await,
            BackupOutcome::Skipped(SkipReason::EventType("DELETED".into()))
        );
        let bare = notification(json!({"type": "UPDATED"}));
        assert_eq!(job.process(&bare).await, BackupOutcome::Skipped(SkipReason::NoVersion));

        assert!(source.calls().is_empty());
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn discarded_event_types_show_up_at_info() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let tmp = TempDir::new().unwrap();
        let job = job(&tmp, FakeSource::new(Ok(FetchOutcome::Empty)));
        let deleted = notification(json!({"type": "DELETED", "version": {"id": "v1", "referencedObject": "o"}}));
        job.process(&deleted).await;

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("INFO"), "{text}");
        assert!(text.contains("not a version change"), "{text}");
        assert!(text.contains("DELETED"), "{text}");
    }

    #[tokio::test]
    async fn empty_fetch_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let source = FakeSource::new(Ok(FetchOutcome::Empty));
        let job = job(&tmp, source.clone());

        assert_eq!(job.process(&created("v1", "obj123")).await, BackupOutcome::NoData);
        assert_eq!(source.calls().len(), 1);
        assert!(!job.store().dir().exists());
    }

    #[tokio::test]
    async fn fetch_failure_is_reported_not_raised() {
        let tmp = TempDir::new().unwrap();
        let source = FakeSource::new(Err(SyncError::query("boom")));
        let job = job(&tmp, source);

        let outcome = job.process(&created("v1", "obj123")).await;

        assert_eq!(outcome, BackupOutcome::Failed(SyncError::query("boom")));
        assert!(files(job.store().dir()).is_empty());
    }

    #[tokio::test]
    async fn distinct_versions_in_one_second_get_distinct_files() {
        let tmp = TempDir::new().unwrap();
        let source = FakeSource::new(Ok(FetchOutcome::Found(json!({"foo": "bar"}))));
        let job = job(&tmp, source);

        let a = job.process(&created("v1", "obj1")).await;
        let b = job.process(&created("v2", "obj2")).await;

        let (BackupOutcome::Saved(a), BackupOutcome::Saved(b)) = (a, b) else {
            panic!("both backups should be saved");
        };
        assert_ne!(a, b);
        assert_eq!(files(job.store().dir()).len(), 2);
    }
}
