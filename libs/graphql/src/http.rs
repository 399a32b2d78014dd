use std::collections::HashMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use sync_api::{
    CreateVersion, FetchOutcome, FetchedObject, ObjectPayload, ObjectSource, RemoteClient,
    SyncError, SyncFuture, VersionRef,
};

use crate::config::ServerEndpoint;
use crate::graph::{detach_for_send, inline_references};
use crate::queries;

/// Page size for `object.children` when rebuilding a graph.
const CHILDREN_PAGE: u32 = 1000;

// ═══════════════════════════════════════════════════════════════
//  GraphqlClient: request/response over HTTPS
// ═══════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct GraphqlClient {
    http: reqwest::Client,
    endpoint: ServerEndpoint,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphqlErrorItem>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlErrorItem {
    #[serde(default)]
    pub(crate) message: String,
}

/// Join GraphQL error messages; `None` when the list is absent or empty.
pub(crate) fn join_errors(errors: &[GraphqlErrorItem]) -> Option<String> {
    if errors.is_empty() {
        return None;
    }
    Some(
        errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; "),
    )
}

impl GraphqlClient {
    pub fn new(endpoint: ServerEndpoint) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(endpoint.timeout())
            .build()
            .map_err(|e| SyncError::config(format!("http client: {e}")))?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    /// Run one operation and return its `data` object.
    pub async fn execute(&self, query: &str, variables: Value) -> Result<Value, SyncError> {
        let url = self.endpoint.http_url();
        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.endpoint.token())
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| SyncError::transport(format!("HTTP request to {url} failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| SyncError::transport(format!("read response body: {e}")))?;

        if !status.is_success() {
            return Err(SyncError::transport(format!("GraphQL HTTP {status}: {body}")));
        }

        let parsed: GraphqlResponse = serde_json::from_str(&body)
            .map_err(|e| SyncError::query(format!("parse GraphQL response: {e}")))?;

        if let Some(msg) = parsed.errors.as_deref().and_then(join_errors) {
            return Err(SyncError::query(msg));
        }

        parsed
            .data
            .ok_or_else(|| SyncError::query("GraphQL response has no data"))
    }

    async fn execute_as<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
        pointer: &str,
    ) -> Result<T, SyncError> {
        let data = self.execute(query, variables).await?;
        let value = data
            .pointer(pointer)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| SyncError::query(format!("GraphQL response missing {pointer}")))?;
        serde_json::from_value(value)
            .map_err(|e| SyncError::query(format!("unexpected shape at {pointer}: {e}")))
    }

    pub async fn fetch_object_data(&self, project_id: &str, object_id: &str) -> Result<FetchOutcome, SyncError> {
        if object_id.trim().is_empty() {
            return Err(SyncError::query("object id is empty"));
        }
        let data = self
            .execute(
                queries::GET_OBJECT_DATA,
                json!({ "projectId": project_id, "objectId": object_id }),
            )
            .await?;

        let object = match data.pointer("/project/object") {
            Some(v) if !v.is_null() => v.clone(),
            _ => return Ok(FetchOutcome::Empty),
        };
        let object: FetchedObject = serde_json::from_value(object)
            .map_err(|e| SyncError::query(format!("unexpected object shape: {e}")))?;
        tracing::debug!(
            object_id = object.id.as_deref().unwrap_or(object_id),
            speckle_type = object.speckle_type.as_deref().unwrap_or("?"),
            "object fetched"
        );
        Ok(FetchOutcome::from_data(object.data))
    }

    pub async fn version(&self, project_id: &str, version_id: &str) -> Result<VersionRef, SyncError> {
        self.execute_as(
            queries::GET_VERSION,
            json!({ "projectId": project_id, "versionId": version_id }),
            "/project/version",
        )
        .await
    }

    /// Root object plus all children, references inlined.
    pub async fn object_graph(&self, project_id: &str, object_id: &str) -> Result<ObjectPayload, SyncError> {
        #[derive(Deserialize)]
        struct ChildPage {
            #[serde(default)]
            cursor: Option<String>,
            #[serde(default)]
            objects: Vec<ChildObject>,
        }
        #[derive(Deserialize)]
        struct ChildObject {
            id: String,
            #[serde(default)]
            data: Value,
        }

        let mut root: Option<Value> = None;
        let mut children: HashMap<String, Value> = HashMap::new();
        let mut cursor: Option<String> = None;

        loop {
            let data = self
                .execute(
                    queries::GET_OBJECT_WITH_CHILDREN,
                    json!({
                        "projectId": project_id,
                        "objectId": object_id,
                        "limit": CHILDREN_PAGE,
                        "cursor": cursor,
                    }),
                )
                .await?;

            let object = data
                .pointer("/project/object")
                .filter(|v| !v.is_null())
                .ok_or_else(|| SyncError::query(format!("object {object_id} not found")))?;

            if root.is_none() {
                root = object.get("data").filter(|v| !v.is_null()).cloned();
            }

            let page: ChildPage = match object.get("children") {
                Some(v) if !v.is_null() => serde_json::from_value(v.clone())
                    .map_err(|e| SyncError::query(format!("unexpected children shape: {e}")))?,
                _ => break,
            };
            let fetched = page.objects.len();
            children.extend(page.objects.into_iter().map(|c| (c.id, c.data)));

            match page.cursor {
                Some(next) if fetched > 0 && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        let root = root.ok_or_else(|| SyncError::empty(format!("object {object_id} has no data")))?;
        tracing::debug!(object_id, children = children.len(), "object graph received");
        Ok(inline_references(root, &children))
    }

    pub async fn create_object(&self, project_id: &str, payload: &ObjectPayload) -> Result<String, SyncError> {
        let ids: Vec<String> = self
            .execute_as(
                queries::OBJECT_CREATE,
                json!({
                    "input": {
                        "streamId": project_id,
                        "objects": [detach_for_send(payload)],
                    }
                }),
                "/objectCreate",
            )
            .await?;
        ids.into_iter()
            .next()
            .ok_or_else(|| SyncError::query("objectCreate returned no ids"))
    }

    pub async fn create_version_record(&self, input: &CreateVersion) -> Result<String, SyncError> {
        #[derive(Deserialize)]
        struct Created {
            id: String,
        }
        let created: Created = self
            .execute_as(
                queries::VERSION_CREATE,
                json!({ "input": input }),
                "/versionMutations/create",
            )
            .await?;
        Ok(created.id)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Trait impls
// ═══════════════════════════════════════════════════════════════

impl ObjectSource for GraphqlClient {
    fn fetch_object<'a>(&'a self, project_id: &'a str, object_id: &'a str) -> SyncFuture<'a, FetchOutcome> {
        Box::pin(self.fetch_object_data(project_id, object_id))
    }
}

impl RemoteClient for GraphqlClient {
    fn get_version<'a>(&'a self, project_id: &'a str, version_id: &'a str) -> SyncFuture<'a, VersionRef> {
        Box::pin(self.version(project_id, version_id))
    }

    fn receive_graph<'a>(&'a self, project_id: &'a str, object_id: &'a str) -> SyncFuture<'a, ObjectPayload> {
        Box::pin(self.object_graph(project_id, object_id))
    }

    fn send_graph<'a>(&'a self, project_id: &'a str, payload: &'a ObjectPayload) -> SyncFuture<'a, String> {
        Box::pin(self.create_object(project_id, payload))
    }

    fn create_version<'a>(&'a self, input: &'a CreateVersion) -> SyncFuture<'a, String> {
        Box::pin(self.create_version_record(input))
    }
}
