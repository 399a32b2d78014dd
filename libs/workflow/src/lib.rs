//! Процессы поверх клиента Speckle: бэкап по подписке и правка версии.
//!
//! - [`BackupJob`]: уведомление → объект → файл бэкапа.
//! - [`listen`] / [`listen_with_reconnect`]: последовательный цикл подписки.
//! - [`annotate`]: версия → граф → правки → новый объект → новая версия.

pub mod annotate;
mod backup;
mod listen;

pub use backup::{BackupJob, BackupOutcome, SkipReason};
pub use listen::{
    HandlerFuture, ListenExit, ListenReport, ListenStats, NotificationHandler, ReconnectPolicy,
    listen, listen_with_reconnect,
};
