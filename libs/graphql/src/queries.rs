// ═══════════════════════════════════════════════════════════════
//  GraphQL documents
// ═══════════════════════════════════════════════════════════════

pub const PROJECT_VERSIONS_UPDATED: &str = r#"
subscription ProjectVersionsUpdated($projectId: String!) {
    projectVersionsUpdated(id: $projectId) {
        id
        modelId
        type
        version {
            id
            message
            createdAt
            referencedObject
        }
    }
}
"#;

pub const GET_OBJECT_DATA: &str = r#"
query GetObjectData($projectId: String!, $objectId: String!) {
    project(id: $projectId) {
        object(id: $objectId) {
            id
            speckleType
            data
        }
    }
}
"#;

pub const GET_VERSION: &str = r#"
query GetVersion($projectId: String!, $versionId: String!) {
    project(id: $projectId) {
        version(id: $versionId) {
            id
            message
            referencedObject
        }
    }
}
"#;

pub const GET_OBJECT_WITH_CHILDREN: &str = r#"
query GetObjectWithChildren($projectId: String!, $objectId: String!, $limit: Int!, $cursor: String) {
    project(id: $projectId) {
        object(id: $objectId) {
            id
            data
            children(limit: $limit, depth: 1000, cursor: $cursor) {
                totalCount
                cursor
                objects {
                    id
                    data
                }
            }
        }
    }
}
"#;

pub const OBJECT_CREATE: &str = r#"
mutation ObjectCreate($input: ObjectCreateInput!) {
    objectCreate(objectInput: $input)
}
"#;

pub const VERSION_CREATE: &str = r#"
mutation VersionCreate($input: CreateVersionInput!) {
    versionMutations {
        create(input: $input) {
            id
        }
    }
}
"#;

/// Field under `data` carrying subscription payloads.
pub const SUBSCRIPTION_FIELD: &str = "projectVersionsUpdated";
