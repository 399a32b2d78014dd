use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::is_empty_payload;

/// Произвольный вложенный граф свойств объекта модели.
pub type ObjectPayload = serde_json::Value;

// ════════════════════════════════════════════════════════════════
//  Change Notification
// ════════════════════════════════════════════════════════════════

/// Тип события `projectVersionsUpdated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    Created,
    Updated,
    Other(String),
}

impl EventType {
    pub fn parse(s: &str) -> Self {
        match s {
            "CREATED" => EventType::Created,
            "UPDATED" => EventType::Updated,
            other => EventType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventType::Created => "CREATED",
            EventType::Updated => "UPDATED",
            EventType::Other(s) => s,
        }
    }

    /// CREATED или UPDATED: только они запускают бэкап.
    pub fn is_version_change(&self) -> bool {
        matches!(self, EventType::Created | EventType::Updated)
    }
}

impl Default for EventType {
    fn default() -> Self {
        EventType::Other(String::new())
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(EventType::parse(s.as_deref().unwrap_or("")))
    }
}

impl Serialize for EventType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Версия внутри уведомления.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub referenced_object: Option<String>,
}

/// Одно событие подписки. Живёт одну итерацию цикла, не хранится.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNotification {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(rename = "type", default)]
    pub event_type: EventType,
    #[serde(default)]
    pub version: Option<VersionInfo>,
}

impl ChangeNotification {
    pub fn version_id(&self) -> Option<&str> {
        self.version.as_ref()?.id.as_deref()
    }

    /// Id объекта, на который ссылается версия. Пустая строка = отсутствует.
    pub fn referenced_object_id(&self) -> Option<&str> {
        self.version
            .as_ref()?
            .referenced_object
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }

    pub fn message(&self) -> &str {
        self.version
            .as_ref()
            .and_then(|v| v.message.as_deref())
            .unwrap_or("no_message")
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.version.as_ref()?.created_at
    }

    pub fn is_backup_trigger(&self) -> bool {
        self.event_type.is_version_change() && self.referenced_object_id().is_some()
    }
}

// ════════════════════════════════════════════════════════════════
//  Snapshot fetch
// ════════════════════════════════════════════════════════════════

/// `project.object { id speckleType data }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub speckle_type: Option<String>,
    #[serde(default)]
    pub data: Option<ObjectPayload>,
}

/// Результат запроса объекта. `Empty`: не ошибка, вызывающий пропускает.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(ObjectPayload),
    Empty,
}

impl FetchOutcome {
    pub fn from_data(data: Option<ObjectPayload>) -> Self {
        match data {
            Some(v) if !is_empty_payload(&v) => FetchOutcome::Found(v),
            _ => FetchOutcome::Empty,
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Backup Record
// ════════════════════════════════════════════════════════════════

/// Содержимое файла бэкапа / экспорта. Неизменяем после записи.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    pub object_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_timestamp: Option<String>,
    pub data: ObjectPayload,
}

impl BackupRecord {
    /// Запись для одноразового экспорта: только projectId / objectId / data.
    pub fn export(project_id: impl Into<String>, object_id: impl Into<String>, data: ObjectPayload) -> Self {
        Self {
            project_id: project_id.into(),
            version_id: None,
            object_id: object_id.into(),
            message: None,
            backup_timestamp: None,
            data,
        }
    }

    pub fn has_data(&self) -> bool {
        !is_empty_payload(&self.data)
    }
}

// ════════════════════════════════════════════════════════════════
//  Versions
// ════════════════════════════════════════════════════════════════

/// `project.version { id message referencedObject }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRef {
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
    pub referenced_object: String,
}

/// Вход `versionMutations.create`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVersion {
    pub project_id: String,
    pub model_id: String,
    pub object_id: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn notification(value: serde_json::Value) -> ChangeNotification {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parses_full_subscription_payload() {
        let n = notification(json!({
            "id": "model-1",
            "modelId": "model-1",
            "type": "CREATED",
            "version": {
                "id": "v1",
                "message": "Updated geometry",
                "createdAt": "2026-01-18T10:00:00.000Z",
                "referencedObject": "obj123"
            }
        }));
        assert_eq!(n.event_type, EventType::Created);
        assert_eq!(n.version_id(), Some("v1"));
        assert_eq!(n.referenced_object_id(), Some("obj123"));
        assert_eq!(n.message(), "Updated geometry");
        assert!(n.created_at().is_some());
        assert!(n.is_backup_trigger());
    }

    #[test]
    fn unknown_type_and_missing_version_are_not_triggers() {
        let deleted = notification(json!({"type": "DELETED", "version": {"id": "v", "referencedObject": "o"}}));
        assert_eq!(deleted.event_type, EventType::Other("DELETED".into()));
        assert!(!deleted.is_backup_trigger());

        let bare = notification(json!({"type": "UPDATED"}));
        assert!(bare.version.is_none());
        assert!(!bare.is_backup_trigger());
        assert_eq!(bare.message(), "no_message");
    }

    #[test]
    fn empty_referenced_object_is_absent() {
        let n = notification(json!({"type": "CREATED", "version": {"id": "v1", "referencedObject": ""}}));
        assert_eq!(n.referenced_object_id(), None);
        assert!(!n.is_backup_trigger());
    }

    #[test]
    fn null_type_becomes_other() {
        let n = notification(json!({"type": null}));
        assert_eq!(n.event_type, EventType::Other(String::new()));
    }

    #[test]
    fn fetch_outcome_treats_empty_data_as_empty() {
        assert_eq!(FetchOutcome::from_data(None), FetchOutcome::Empty);
        assert_eq!(FetchOutcome::from_data(Some(json!({}))), FetchOutcome::Empty);
        assert_eq!(
            FetchOutcome::from_data(Some(json!({"foo": "bar"}))),
            FetchOutcome::Found(json!({"foo": "bar"}))
        );
    }

    #[test]
    fn backup_record_serializes_camel_case_and_omits_absent_fields() {
        let export = BackupRecord::export("p1", "obj123", json!({"foo": "bar"}));
        assert_eq!(
            serde_json::to_value(&export).unwrap(),
            json!({"projectId": "p1", "objectId": "obj123", "data": {"foo": "bar"}})
        );

        let backup = BackupRecord {
            version_id: Some("v1".into()),
            message: Some("m".into()),
            backup_timestamp: Some("20260118_100000".into()),
            ..export
        };
        let v = serde_json::to_value(&backup).unwrap();
        assert_eq!(v["versionId"], json!("v1"));
        assert_eq!(v["backupTimestamp"], json!("20260118_100000"));
    }
}
