use std::collections::BTreeMap;

use serde_json::{Value, json};
use sync_api::util::{first_object_path, first_present, resolve_path_mut, scalar_key};
use sync_api::{CreateVersion, ObjectPayload, RemoteClient, SyncError};

pub const DEFAULT_VERSION_MESSAGE: &str = "Added custom properties via specklepy2";
pub const DEFAULT_IDENTITY_PATHS: [&str; 2] = ["properties.Identity", "parameters.Identity"];
const ELEMENT_KEYS: [&str; 2] = ["@elements", "elements"];

// ═══════════════════════════════════════════════════════════════
//  Rules
// ═══════════════════════════════════════════════════════════════

/// Field edits applied to a received object graph before it is sent back.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotateRules {
    /// Assigned on the root object, overwriting existing values.
    pub root_fields: BTreeMap<String, Value>,
    /// Where to look for an element's `Identity` object, first match wins.
    pub identity_paths: Vec<String>,
    /// `Identity.Module` value → `Identity.Designer`. Empty by default:
    /// the substitution does nothing until a table is configured.
    pub designers: BTreeMap<String, String>,
}

impl Default for AnnotateRules {
    fn default() -> Self {
        let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
        Self {
            root_fields: BTreeMap::from([
                ("custom_property".to_string(), json!("Hello from specklepy!")),
                ("analysis_date".to_string(), json!(today)),
                ("processed_by".to_string(), json!("Tower Teachers Script")),
            ]),
            identity_paths: DEFAULT_IDENTITY_PATHS.iter().map(|p| p.to_string()).collect(),
            designers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotateReport {
    pub root_fields: usize,
    pub elements_tagged: usize,
    pub designers_set: usize,
}

impl AnnotateRules {
    /// Edit `payload` in place. Every edit is an overwrite, so applying the
    /// same rules again leaves the payload unchanged.
    pub fn apply(&self, payload: &mut ObjectPayload) -> AnnotateReport {
        let mut report = AnnotateReport::default();

        let Some(root) = payload.as_object_mut() else {
            tracing::warn!("payload root is not an object, nothing to annotate");
            return report;
        };

        for (key, value) in &self.root_fields {
            root.insert(key.clone(), value.clone());
            report.root_fields += 1;
        }

        let elements_key = first_present(root, &ELEMENT_KEYS).map(|(k, _)| k.to_string());
        if let Some(Value::Array(elements)) = elements_key.as_deref().and_then(|k| root.get_mut(k)) {
            // Index is the position in the list, non-objects included.
            for (i, element) in elements.iter_mut().enumerate() {
                let Some(fields) = element.as_object_mut() else {
                    continue;
                };
                fields.insert("element_index".to_string(), json!(i));
                fields.insert("custom_tag".to_string(), json!(format!("Element_{i:03}")));
                report.elements_tagged += 1;

                if self.assign_designer(element) {
                    report.designers_set += 1;
                }
            }
        }

        if self.assign_designer(payload) {
            report.designers_set += 1;
        }

        report
    }

    fn assign_designer(&self, object: &mut Value) -> bool {
        if self.designers.is_empty() {
            return false;
        }
        let Some(path) = first_object_path(object, &self.identity_paths).map(str::to_string) else {
            return false;
        };
        let Some(identity) = resolve_path_mut(object, &path).and_then(Value::as_object_mut) else {
            return false;
        };
        let Some(designer) = identity
            .get("Module")
            .and_then(scalar_key)
            .and_then(|module| self.designers.get(&module))
        else {
            return false;
        };
        identity.insert("Designer".to_string(), Value::String(designer.clone()));
        true
    }
}

// ═══════════════════════════════════════════════════════════════
//  Fetch → mutate → send → new version
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct AnnotateRequest {
    pub project_id: String,
    pub model_id: String,
    pub version_id: String,
    pub message: String,
    pub rules: AnnotateRules,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotateResult {
    pub object_id: String,
    pub version_id: String,
    pub report: AnnotateReport,
}

pub async fn run<C>(client: &C, request: &AnnotateRequest) -> Result<AnnotateResult, SyncError>
where
    C: RemoteClient + ?Sized,
{
    let version = client
        .get_version(&request.project_id, &request.version_id)
        .await?;
    tracing::info!(
        version_id = %version.id,
        object_id = %version.referenced_object,
        message = version.message.as_deref().unwrap_or(""),
        "version loaded"
    );

    let mut payload = client
        .receive_graph(&request.project_id, &version.referenced_object)
        .await?;

    let report = request.rules.apply(&mut payload);
    tracing::info!(
        root_fields = report.root_fields,
        elements_tagged = report.elements_tagged,
        designers_set = report.designers_set,
        "payload annotated"
    );

    let object_id = client.send_graph(&request.project_id, &payload).await?;
    tracing::info!(object_id = %object_id, "object sent");

    let version_id = client
        .create_version(&CreateVersion {
            project_id: request.project_id.clone(),
            model_id: request.model_id.clone(),
            object_id: object_id.clone(),
            message: request.message.clone(),
        })
        .await?;
    tracing::info!(version_id = %version_id, "version created");

    Ok(AnnotateResult {
        object_id,
        version_id,
        report,
    })
}
