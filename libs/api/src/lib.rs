mod error;
mod types;
pub mod util;

use std::future::Future;
use std::pin::Pin;

pub use error::{ErrorKind, SyncError};
pub use types::{
    BackupRecord, ChangeNotification, CreateVersion, EventType, FetchOutcome, FetchedObject,
    ObjectPayload, VersionInfo, VersionRef,
};

/// Boxed future, общий для всех трейтов клиента.
pub type SyncFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SyncError>> + Send + 'a>>;

// ════════════════════════════════════════════════════════════════
//  Remote seams
// ════════════════════════════════════════════════════════════════

/// Получение полного payload объекта по id (query-канал, не подписка).
///
/// Реализации: GraphQL-клиент поверх HTTPS, тестовые фейки.
pub trait ObjectSource: Send + Sync {
    /// `Empty`: API ответил без данных. Ошибка: транспорт или GraphQL `errors`.
    fn fetch_object<'a>(&'a self, project_id: &'a str, object_id: &'a str) -> SyncFuture<'a, FetchOutcome>;
}

/// Клиент мутаций: версия → граф объектов → отправка → новая версия.
pub trait RemoteClient: ObjectSource {
    /// Версия по id: нужна ради `referencedObject`.
    fn get_version<'a>(&'a self, project_id: &'a str, version_id: &'a str) -> SyncFuture<'a, VersionRef>;

    /// Граф объекта с раскрытыми ссылками на детей, пригодный для правки в памяти.
    fn receive_graph<'a>(&'a self, project_id: &'a str, object_id: &'a str) -> SyncFuture<'a, ObjectPayload>;

    /// Отправить граф, вернуть id, присвоенный сервером.
    fn send_graph<'a>(&'a self, project_id: &'a str, payload: &'a ObjectPayload) -> SyncFuture<'a, String>;

    /// Зарегистрировать новую версию, вернуть её id.
    fn create_version<'a>(&'a self, input: &'a CreateVersion) -> SyncFuture<'a, String>;
}
