use speckle_graphql::GraphqlClient;

use crate::config::{AnnotateArgs, Settings};
use crate::error::CliError;

pub async fn run(settings: &Settings, args: &AnnotateArgs) -> Result<(), CliError> {
    let request = settings.annotate(args)?;
    let client = GraphqlClient::new(settings.endpoint.clone())?;

    tracing::info!(
        project_id = %request.project_id,
        model_id = %request.model_id,
        version_id = %request.version_id,
        "annotating version"
    );

    let result = workflow::annotate::run(&client, &request).await?;

    tracing::info!(
        object_id = %result.object_id,
        version_id = %result.version_id,
        elements_tagged = result.report.elements_tagged,
        designers_set = result.report.designers_set,
        "new version published"
    );
    Ok(())
}
