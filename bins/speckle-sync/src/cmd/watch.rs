use tokio_util::sync::CancellationToken;

use sync_api::ChangeNotification;
use workflow::{BackupOutcome, HandlerFuture, NotificationHandler, ReconnectPolicy, SkipReason, listen_with_reconnect};

use crate::config::Settings;
use crate::error::CliError;

/// Prints every notification, persists nothing.
struct LogNotifications;

impl NotificationHandler for LogNotifications {
    fn handle<'a>(&'a self, n: &'a ChangeNotification) -> HandlerFuture<'a> {
        Box::pin(async move {
            let version = n.version.clone().unwrap_or_default();
            tracing::info!(
                id = n.id.as_deref().unwrap_or("-"),
                model_id = n.model_id.as_deref().unwrap_or("-"),
                event_type = %n.event_type,
                version_id = version.id.as_deref().unwrap_or("-"),
                message = n.message(),
                created_at = version.created_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                referenced_object = version.referenced_object.as_deref().unwrap_or("-"),
                "project updated"
            );
            BackupOutcome::Skipped(SkipReason::WatchOnly)
        })
    }
}

pub async fn run(settings: &Settings) -> Result<(), CliError> {
    let subscriber = settings.subscriber();
    let project_id = settings.project_id.as_str();
    let token = CancellationToken::new();

    tracing::info!(project_id, protocol = settings.ws_protocol.subprotocol(), "watching project, Ctrl+C to stop");

    let report = super::until_ctrl_c(
        &token,
        listen_with_reconnect(
            || subscriber.subscribe(project_id),
            &token,
            &LogNotifications,
            ReconnectPolicy::default(),
        ),
    )
    .await?;
    super::finish(report)
}
