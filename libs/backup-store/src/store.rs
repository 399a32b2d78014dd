use std::io::Write;
use std::path::{Path, PathBuf};

use sync_api::{BackupRecord, SyncError};

use super::config::{FilenameStyle, MAX_COLLISION_SUFFIX};
use super::filename::{backup_stem, timestamp_now, with_suffix};

// ════════════════════════════════════════════════════════════════
//  BackupStore
// ════════════════════════════════════════════════════════════════

/// Каталог бэкапов: один `BackupRecord` → ровно один JSON-файл.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
    style: FilenameStyle,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>, style: FilenameStyle) -> Self {
        Self {
            dir: dir.into(),
            style,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn style(&self) -> FilenameStyle {
        self.style
    }

    /// Записать бэкап. Имя строится из `backupTimestamp` записи
    /// (или текущего времени) и `versionId`. Существующие файлы
    /// не перезаписываются: при коллизии добавляется `-N`.
    pub fn write(&self, record: &BackupRecord) -> Result<PathBuf, SyncError> {
        if !record.has_data() {
            return Err(SyncError::empty(format!(
                "refusing to write empty backup for object {}",
                record.object_id
            )));
        }

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| SyncError::io(format!("mkdir {}: {e}", self.dir.display())))?;

        let timestamp = record.backup_timestamp.clone().unwrap_or_else(timestamp_now);
        let version_id = record.version_id.as_deref().unwrap_or(&record.object_id);
        let stem = backup_stem(self.style, &timestamp, version_id, record.message.as_deref());
        let body = render(record)?;

        for n in 0..MAX_COLLISION_SUFFIX {
            let path = self.dir.join(with_suffix(&stem, n));
            let file = std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path);
            match file {
                Ok(mut f) => {
                    f.write_all(&body)
                        .map_err(|e| SyncError::io(format!("write {}: {e}", path.display())))?;
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(SyncError::io(format!("create {}: {e}", path.display())));
                }
            }
        }

        Err(SyncError::io(format!(
            "no free file name for {stem} after {MAX_COLLISION_SUFFIX} attempts"
        )))
    }
}

/// Записать запись в заданный файл целиком (перезапись). Для `export`.
pub fn write_to(path: &Path, record: &BackupRecord) -> Result<(), SyncError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| SyncError::io(format!("mkdir {}: {e}", parent.display())))?;
    }
    let body = render(record)?;
    std::fs::write(path, body).map_err(|e| SyncError::io(format!("write {}: {e}", path.display())))
}

/// Pretty-printed UTF-8 JSON с переводом строки в конце.
fn render(record: &BackupRecord) -> Result<Vec<u8>, SyncError> {
    let mut body = serde_json::to_vec_pretty(record)
        .map_err(|e| SyncError::format_err(format!("json serialize: {e}")))?;
    body.push(b'\n');
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use sync_api::ErrorKind;
    use tempfile::TempDir;

    fn record(version: &str, data: serde_json::Value) -> BackupRecord {
        BackupRecord {
            project_id: "p1".into(),
            version_id: Some(version.into()),
            object_id: "obj123".into(),
            message: Some("Updated geometry".into()),
            backup_timestamp: Some("20260118_090507".into()),
            data,
        }
    }

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn writes_one_pretty_file_and_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let store = BackupStore::new(tmp.path().join("backups"), FilenameStyle::Version);

        let path = store.write(&record("v1", json!({"foo": "bar"}))).unwrap();

        assert_eq!(path.file_name().unwrap(), "backup_20260118_090507_v1.json");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"projectId\""));
        assert_eq!(
            read_json(&path),
            json!({
                "projectId": "p1",
                "versionId": "v1",
                "objectId": "obj123",
                "message": "Updated geometry",
                "backupTimestamp": "20260118_090507",
                "data": {"foo": "bar"}
            })
        );
        assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 1);
    }

    #[test]
    fn message_style_appends_fragment() {
        let tmp = TempDir::new().unwrap();
        let store = BackupStore::new(tmp.path(), FilenameStyle::VersionAndMessage);
        let path = store.write(&record("v1", json!({"foo": "bar"}))).unwrap();
        assert_eq!(
            path.file_name().unwrap(),
            "backup_20260118_090507_v1_Updated geometry.json"
        );
    }

    #[test]
    fn same_second_same_version_does_not_overwrite() {
        let tmp = TempDir::new().unwrap();
        let store = BackupStore::new(tmp.path(), FilenameStyle::Version);

        let first = store.write(&record("v1", json!({"n": 1}))).unwrap();
        let second = store.write(&record("v1", json!({"n": 2}))).unwrap();

        assert_ne!(first, second);
        assert_eq!(second.file_name().unwrap(), "backup_20260118_090507_v1-1.json");
        assert_eq!(read_json(&first)["data"], json!({"n": 1}));
        assert_eq!(read_json(&second)["data"], json!({"n": 2}));
    }

    #[test]
    fn empty_data_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = BackupStore::new(tmp.path().join("backups"), FilenameStyle::Version);

        let err = store.write(&record("v1", json!({}))).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Empty);
        assert!(!store.dir().exists());
    }

    #[test]
    fn export_overwrites_fixed_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("object_data.json");

        write_to(&path, &BackupRecord::export("p1", "obj", json!({"a": 1}))).unwrap();
        write_to(&path, &BackupRecord::export("p1", "obj", json!({"a": 2}))).unwrap();

        assert_eq!(
            read_json(&path),
            json!({"projectId": "p1", "objectId": "obj", "data": {"a": 2}})
        );
    }
}
