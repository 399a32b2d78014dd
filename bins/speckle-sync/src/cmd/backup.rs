use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use backup_store::BackupStore;
use speckle_graphql::GraphqlClient;
use workflow::{BackupJob, listen_with_reconnect};

use crate::config::{BackupArgs, Settings};
use crate::error::CliError;

pub async fn run(settings: &Settings, args: &BackupArgs) -> Result<(), CliError> {
    let backup = settings.backup(args);
    let project_id = settings.project_id.as_str();

    let client = GraphqlClient::new(settings.endpoint.clone())?;
    let store = BackupStore::new(&backup.dir, backup.style);
    let job = BackupJob::new(project_id, Arc::new(client), store);
    let subscriber = settings.subscriber();
    let token = CancellationToken::new();

    tracing::info!(
        project_id,
        dir = %backup.dir.display(),
        style = ?backup.style,
        reconnect_attempts = backup.reconnect.max_attempts,
        "backup listener starting, Ctrl+C to stop"
    );

    let report = super::until_ctrl_c(
        &token,
        listen_with_reconnect(|| subscriber.subscribe(project_id), &token, &job, backup.reconnect),
    )
    .await?;

    tracing::info!(
        saved = report.stats.saved,
        skipped = report.stats.skipped,
        empty = report.stats.empty,
        failed = report.stats.failed,
        "backup summary"
    );
    super::finish(report)
}
