//! Client engine for MCP tool services reachable over an SSE push stream with
//! a separate JSON-RPC POST channel.
//!
//! Leaves first: [`transport`] decodes the event stream, [`session`] tracks
//! the connection lifecycle, [`dispatcher`] submits envelopes, [`correlator`]
//! routes inbound frames, and [`catalog`], [`stats`] and [`log_buffer`] hold
//! the engine-scoped views. [`engine`] ties them together behind a single
//! actor task.

pub mod catalog;
pub mod correlator;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod events;
pub mod log_buffer;
pub mod rpc;
pub mod session;
pub mod stats;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

/// Correlation id reserved for the `initialize` handshake call.
pub const INIT_REQUEST_ID: &str = "init_req";
/// Correlation id reserved for catalog fetches.
pub const LIST_TOOLS_REQUEST_ID: &str = "list_tools";

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// Methods with this prefix never carry an id.
pub const NOTIFICATION_PREFIX: &str = "notifications/";

/// Name of the SSE event that announces the submission address.
pub const ENDPOINT_EVENT: &str = "endpoint";

pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";
