//! GraphQL access to a Speckle server: request/response over HTTPS and
//! `projectVersionsUpdated` subscriptions over WebSocket.

mod config;
mod graph;
mod http;
pub mod queries;
mod ws;

pub use config::{DEFAULT_SERVER, DEFAULT_TIMEOUT, ServerEndpoint, WsProtocol};
pub use graph::{detach_for_send, inline_references};
pub use http::GraphqlClient;
pub use ws::{DEFAULT_CHANNEL_BUFFER, Subscription, SubscriptionClient};
