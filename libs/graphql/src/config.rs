use std::time::Duration;

use serde::Deserialize;
use sync_api::SyncError;

// ═══════════════════════════════════════════════════════════════
//  Server endpoint
// ═══════════════════════════════════════════════════════════════

pub const DEFAULT_SERVER: &str = "app.speckle.systems";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the GraphQL API lives and how to authenticate against it.
///
/// `server` is either a bare host (`app.speckle.systems`, HTTPS assumed)
/// or a base URL with scheme (`http://localhost:3000`).
#[derive(Clone)]
pub struct ServerEndpoint {
    server: String,
    token: String,
    timeout: Duration,
}

impl ServerEndpoint {
    pub fn new(server: impl Into<String>, token: impl Into<String>) -> Result<Self, SyncError> {
        let server = server.into().trim().trim_end_matches('/').to_string();
        let token = token.into().trim().to_string();
        if server.is_empty() {
            return Err(SyncError::config("server is empty"));
        }
        if token.is_empty() {
            return Err(SyncError::config("api token is empty"));
        }
        Ok(Self {
            server,
            token,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn base_url(&self) -> String {
        if self.server.contains("://") {
            self.server.clone()
        } else {
            format!("https://{}", self.server)
        }
    }

    /// `https://{server}/graphql`
    pub fn http_url(&self) -> String {
        format!("{}/graphql", self.base_url())
    }

    /// `wss://{server}/graphql`
    pub fn ws_url(&self) -> String {
        self.http_url()
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1)
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl std::fmt::Debug for ServerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerEndpoint")
            .field("server", &self.server)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════
//  WebSocket sub-protocol
// ═══════════════════════════════════════════════════════════════

/// GraphQL-over-WebSocket dialect spoken by the subscription endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WsProtocol {
    /// Legacy `subscriptions-transport-ws` (`graphql-ws` sub-protocol).
    #[default]
    GraphqlWs,
    /// `graphql-ws` library protocol (`graphql-transport-ws` sub-protocol).
    GraphqlTransportWs,
}

impl std::str::FromStr for WsProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "graphql_ws" | "graphql-ws" => Ok(WsProtocol::GraphqlWs),
            "graphql_transport_ws" | "graphql-transport-ws" => Ok(WsProtocol::GraphqlTransportWs),
            other => Err(format!(
                "unknown websocket protocol '{other}' (expected graphql_ws | graphql_transport_ws)"
            )),
        }
    }
}

impl WsProtocol {
    pub fn subprotocol(self) -> &'static str {
        match self {
            WsProtocol::GraphqlWs => "graphql-ws",
            WsProtocol::GraphqlTransportWs => "graphql-transport-ws",
        }
    }

    pub(crate) fn start_type(self) -> &'static str {
        match self {
            WsProtocol::GraphqlWs => "start",
            WsProtocol::GraphqlTransportWs => "subscribe",
        }
    }

    pub(crate) fn data_type(self) -> &'static str {
        match self {
            WsProtocol::GraphqlWs => "data",
            WsProtocol::GraphqlTransportWs => "next",
        }
    }

    pub(crate) fn stop_type(self) -> &'static str {
        match self {
            WsProtocol::GraphqlWs => "stop",
            WsProtocol::GraphqlTransportWs => "complete",
        }
    }

    /// Only the legacy dialect has an explicit connection-level goodbye.
    pub(crate) fn terminate_type(self) -> Option<&'static str> {
        match self {
            WsProtocol::GraphqlWs => Some("connection_terminate"),
            WsProtocol::GraphqlTransportWs => None,
        }
    }
}
