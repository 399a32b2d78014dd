use backup_store::write_to;
use speckle_graphql::GraphqlClient;
use sync_api::{BackupRecord, FetchOutcome};

use crate::config::{ExportArgs, Settings};
use crate::error::CliError;

pub async fn run(settings: &Settings, args: &ExportArgs) -> Result<(), CliError> {
    let export = settings.export(args)?;
    let client = GraphqlClient::new(settings.endpoint.clone())?;

    tracing::info!(project_id = %settings.project_id, object_id = %export.object_id, "fetching object");

    match client.fetch_object_data(&settings.project_id, &export.object_id).await {
        Ok(FetchOutcome::Found(data)) => {
            let record = BackupRecord::export(settings.project_id.clone(), export.object_id.clone(), data);
            write_to(&export.output, &record)?;
            tracing::info!(path = %export.output.display(), "object data exported");
            Ok(())
        }
        Ok(FetchOutcome::Empty) => {
            tracing::warn!(object_id = %export.object_id, "no data returned, nothing written");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(object_id = %export.object_id, error = %e, "query failed");
            Err(e.into())
        }
    }
}
