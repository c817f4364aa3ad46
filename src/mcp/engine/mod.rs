//! The engine core and the actor that runs it.
//!
//! [`EngineCore`] is sans-IO: it consumes [`EngineInput`]s one at a time,
//! mutates the session, catalog, stats and log buffer, and returns the
//! [`EngineCommand`]s (POSTs, timers) the caller must execute. The actor in
//! [`handle`] owns one core on a single tokio task, so all state mutation is
//! serialized through it.

use rust_mcp_schema::{ClientCapabilities, ClientSampling, Implementation};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use super::catalog::{decode_tools, Tool, ToolCatalog};
use super::correlator::{is_logical_failure, CallReply, Correlator, Route};
use super::dispatcher::{prepare, PostJob};
use super::error::{CallError, EngineError};
use super::events::TransportEvent;
use super::log_buffer::{LogBuffer, LogCategory, LogEntry};
use super::rpc::{rpc_error_code, rpc_error_message, CorrelationId, FrameBody, InboundFrame};
use super::session::{ConnectionStatus, EndpointOutcome, SessionMachine, SessionState};
use super::stats::UsageStats;
use super::{
    DEFAULT_PROTOCOL_VERSION, ENDPOINT_EVENT, INIT_REQUEST_ID, LIST_TOOLS_REQUEST_ID,
    METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
};

pub mod handle;

pub use handle::{CallOptions, EngineConfig, EngineHandle};

pub type DispatchAck = oneshot::Sender<Result<(), EngineError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Protocol version offered in `initialize`.
    pub protocol_version: String,
    pub client_name: String,
    pub client_version: String,
    /// Pause between the handshake completing and the first `tools/list`.
    pub catalog_fetch_delay: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            catalog_fetch_delay: Duration::from_millis(500),
        }
    }
}

pub enum EngineInput {
    Transport(TransportEvent),
    /// Fire-and-forget send with a caller-chosen id.
    Dispatch {
        method: String,
        params: Value,
        id: Option<CorrelationId>,
        ack: Option<DispatchAck>,
    },
    /// Tool call with an engine-allocated id.
    CallTool {
        name: String,
        arguments: Value,
        reply: CallReply,
    },
    /// Operator-requested catalog reload.
    RefreshTools { ack: Option<DispatchAck> },
    /// Scheduled catalog fetch following the handshake.
    FetchCatalog,
    /// A POST issued for an earlier command did not go through.
    DispatchFailed {
        method: String,
        id: Option<CorrelationId>,
        reason: String,
        epoch: u64,
    },
    Shutdown,
}

#[derive(Debug)]
pub enum EngineCommand {
    Post {
        job: PostJob,
        ack: Option<DispatchAck>,
    },
    ScheduleCatalogFetch(Duration),
}

/// Copy-on-read view of the engine, published after every input.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub state: SessionState,
    pub status: ConnectionStatus,
    pub submission_address: Option<String>,
    /// Version the server answered with, once the handshake succeeded.
    pub protocol_version: Option<String>,
    pub tools: Arc<[Tool]>,
    pub catalog_generation: u64,
    pub stats: UsageStats,
    /// Newest first.
    pub logs: Vec<LogEntry>,
    pub last_result: Option<Value>,
    pub pending_calls: usize,
}

impl EngineSnapshot {
    pub fn find_tool(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|tool| tool.name == name)
    }
}

pub struct EngineCore {
    settings: EngineSettings,
    session: SessionMachine,
    correlator: Correlator,
    catalog: ToolCatalog,
    stats: UsageStats,
    logs: LogBuffer,
    last_result: Option<Value>,
    negotiated_version: Option<String>,
}

impl EngineCore {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            session: SessionMachine::new(),
            correlator: Correlator::new(),
            catalog: ToolCatalog::default(),
            stats: UsageStats::default(),
            logs: LogBuffer::new(),
            last_result: None,
            negotiated_version: None,
        }
    }

    pub fn start(&mut self) -> Vec<EngineCommand> {
        self.session.start();
        self.logs.push(LogCategory::Sys, "Connecting to event stream...");
        Vec::new()
    }

    pub fn session(&self) -> &SessionMachine {
        &self.session
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn stats(&self) -> &UsageStats {
        &self.stats
    }

    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    pub fn last_result(&self) -> Option<&Value> {
        self.last_result.as_ref()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            state: self.session.state(),
            status: self.session.status(),
            submission_address: self.session.submission_address().map(str::to_string),
            protocol_version: self.negotiated_version.clone(),
            tools: self.catalog.snapshot(),
            catalog_generation: self.catalog.generation(),
            stats: self.stats.clone(),
            logs: self.logs.to_vec(),
            last_result: self.last_result.clone(),
            pending_calls: self.correlator.pending_len(),
        }
    }

    pub fn handle(&mut self, input: EngineInput) -> Vec<EngineCommand> {
        if self.session.is_shut_down() {
            reject_after_shutdown(input);
            return Vec::new();
        }

        match input {
            EngineInput::Transport(event) => self.handle_transport(event),
            EngineInput::Dispatch {
                method,
                params,
                id,
                ack,
            } => self.post(&method, params, id, ack),
            EngineInput::CallTool {
                name,
                arguments,
                reply,
            } => self.call_tool(name, arguments, reply),
            EngineInput::RefreshTools { ack } => {
                self.logs.push(LogCategory::Mcp, "Refetching tools...");
                self.fetch_catalog(ack)
            }
            EngineInput::FetchCatalog => {
                self.logs.push(LogCategory::Mcp, "Fetching tools...");
                self.fetch_catalog(None)
            }
            EngineInput::DispatchFailed {
                method,
                id,
                reason,
                epoch,
            } => {
                self.dispatch_failed(method, id, reason, epoch);
                Vec::new()
            }
            EngineInput::Shutdown => {
                self.session.shutdown();
                self.negotiated_version = None;
                self.correlator.fail_all(CallError::EngineStopped);
                self.logs.push(LogCategory::Sys, "Engine stopped");
                Vec::new()
            }
        }
    }

    fn handle_transport(&mut self, event: TransportEvent) -> Vec<EngineCommand> {
        match event {
            TransportEvent::Opened => {
                self.session.on_opened();
                self.logs.push(LogCategory::Sys, "SSE connected");
                Vec::new()
            }
            TransportEvent::Named { name, data } if name == ENDPOINT_EVENT => {
                self.on_endpoint(&data)
            }
            TransportEvent::Named { name, .. } => {
                self.logs
                    .push(LogCategory::Mcp, format!("Ignoring '{name}' event"));
                Vec::new()
            }
            TransportEvent::Message(payload) => match InboundFrame::parse(&payload) {
                Ok(frame) => self.on_frame(frame),
                Err(err) => {
                    self.logs.push(LogCategory::Error, err.to_string());
                    Vec::new()
                }
            },
            TransportEvent::Error(reason) => {
                self.session.on_transport_error();
                self.negotiated_version = None;
                self.logs.push(
                    LogCategory::Sys,
                    format!("{} / reconnecting", EngineError::Transport(reason)),
                );
                let lost = self.correlator.fail_all(CallError::ConnectionLost);
                if lost > 0 {
                    self.logs.push(
                        LogCategory::Warn,
                        format!("{lost} pending call(s) lost with the connection"),
                    );
                }
                Vec::new()
            }
        }
    }

    fn on_endpoint(&mut self, address: &str) -> Vec<EngineCommand> {
        match self.session.on_endpoint(address) {
            EndpointOutcome::Accepted => {
                self.logs
                    .push(LogCategory::Sys, format!("Endpoint received: {address}"));
            }
            EndpointOutcome::Ignored(state) => {
                self.logs.push(
                    LogCategory::Warn,
                    format!("Ignoring endpoint frame while {state}"),
                );
                return Vec::new();
            }
        }

        if !self.session.begin_initialize() {
            return Vec::new();
        }
        self.logs.push(
            LogCategory::Mcp,
            format!("Sending initialize to {address}..."),
        );
        let params = self.initialize_params();
        self.post(METHOD_INITIALIZE, params, Some(INIT_REQUEST_ID.into()), None)
    }

    fn initialize_params(&self) -> Value {
        let capabilities = ClientCapabilities {
            sampling: Some(ClientSampling::default()),
            ..ClientCapabilities::default()
        };
        let client_info = Implementation {
            name: self.settings.client_name.clone(),
            version: self.settings.client_version.clone(),
            title: None,
            description: None,
            icons: Vec::new(),
            website_url: None,
        };
        json!({
            "protocolVersion": self.settings.protocol_version,
            "capabilities": capabilities,
            "clientInfo": client_info,
        })
    }

    fn on_frame(&mut self, frame: InboundFrame) -> Vec<EngineCommand> {
        match self.correlator.route(&frame) {
            Route::Handshake => self.on_handshake_response(frame.body),
            Route::InitializedEcho => {
                self.logs.push(LogCategory::Mcp, "Session ready");
                Vec::new()
            }
            Route::Catalog => {
                self.on_catalog_response(frame.body);
                Vec::new()
            }
            Route::ToolResult { tool, reply } => {
                self.on_tool_result(&tool, frame.body, reply);
                Vec::new()
            }
            Route::ServerMessage { method } => {
                self.logs
                    .push(LogCategory::Mcp, format!("Server message: {method}"));
                Vec::new()
            }
            Route::Orphan => {
                self.logs
                    .push(LogCategory::Warn, "Ignoring response without an id");
                Vec::new()
            }
        }
    }

    fn on_handshake_response(&mut self, body: FrameBody) -> Vec<EngineCommand> {
        let state = self.session.state();
        if state != SessionState::Initializing {
            self.logs.push(
                LogCategory::Warn,
                format!("Ignoring init response while {state}"),
            );
            return Vec::new();
        }
        self.logs.push(LogCategory::Mcp, "Init response received");

        let outcome = match &body {
            FrameBody::Result(result) => result
                .get("protocolVersion")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|version| !version.is_empty())
                .map(str::to_string)
                .ok_or_else(|| EngineError::Handshake("no protocolVersion".to_string())),
            FrameBody::Error(error) => Err(EngineError::Handshake(rpc_error_message(error))),
            FrameBody::Method(_) => Err(EngineError::Handshake(
                "unexpected request frame".to_string(),
            )),
        };

        match outcome {
            Ok(version) => {
                self.session.on_initialized();
                self.logs.push(
                    LogCategory::Mcp,
                    format!("Initialized (protocol {version}). Sending notification."),
                );
                self.negotiated_version = Some(version);

                let mut commands = self.post(METHOD_INITIALIZED, json!({}), None, None);
                commands.push(EngineCommand::ScheduleCatalogFetch(
                    self.settings.catalog_fetch_delay,
                ));
                commands
            }
            Err(err) => {
                self.logs.push(LogCategory::Error, err.to_string());
                self.session.on_handshake_failed();
                Vec::new()
            }
        }
    }

    fn on_catalog_response(&mut self, body: FrameBody) {
        match body {
            FrameBody::Result(result) => {
                let Some(entries) = result.get("tools").and_then(Value::as_array) else {
                    self.logs.push(
                        LogCategory::Warn,
                        "Tools array missing in result; keeping previous catalog",
                    );
                    return;
                };
                let (tools, warnings) = decode_tools(entries);
                for warning in warnings {
                    self.logs.push(LogCategory::Warn, warning);
                }
                let count = tools.len();
                self.catalog.replace(tools);
                self.logs
                    .push(LogCategory::Sys, format!("Tools fetched: {count} found"));
            }
            FrameBody::Error(error) => {
                let err = EngineError::Protocol {
                    code: rpc_error_code(&error),
                    message: rpc_error_message(&error),
                };
                self.logs
                    .push(LogCategory::Error, format!("Tool fetch failed: {err}"));
            }
            FrameBody::Method(_) => {
                self.logs
                    .push(LogCategory::Warn, "Ignoring request frame with list_tools id");
            }
        }
    }

    fn on_tool_result(&mut self, tool: &str, body: FrameBody, reply: Option<CallReply>) {
        let outcome = match body {
            FrameBody::Error(error) => {
                self.stats.record_failure(tool);
                self.logs.push(
                    LogCategory::Error,
                    format!("RPC error: {}", rpc_error_message(&error)),
                );
                self.last_result = Some(error.clone());
                Err(CallError::rpc(error))
            }
            FrameBody::Result(result) => {
                self.stats.record_success(tool);
                let label = if is_logical_failure(&result) {
                    "Logical failure"
                } else {
                    "Success"
                };
                self.logs.push(LogCategory::Result, label);
                self.last_result = Some(result.clone());
                Ok(result)
            }
            FrameBody::Method(_) => return,
        };

        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
    }

    fn call_tool(&mut self, name: String, arguments: Value, reply: CallReply) -> Vec<EngineCommand> {
        let id = self.correlator.allocate(&name, reply);
        let params = json!({"name": name, "arguments": arguments});
        match prepare(
            &self.session,
            &mut self.logs,
            METHOD_TOOLS_CALL,
            params,
            Some(id.clone()),
        ) {
            Ok(job) => vec![EngineCommand::Post { job, ack: None }],
            Err(_) => {
                self.correlator.fail(&id, CallError::NoEndpoint);
                Vec::new()
            }
        }
    }

    fn fetch_catalog(&mut self, ack: Option<DispatchAck>) -> Vec<EngineCommand> {
        self.post(
            METHOD_TOOLS_LIST,
            json!({}),
            Some(LIST_TOOLS_REQUEST_ID.into()),
            ack,
        )
    }

    fn post(
        &mut self,
        method: &str,
        params: Value,
        id: Option<CorrelationId>,
        ack: Option<DispatchAck>,
    ) -> Vec<EngineCommand> {
        match prepare(&self.session, &mut self.logs, method, params, id) {
            Ok(job) => vec![EngineCommand::Post { job, ack }],
            Err(err) => {
                if let Some(ack) = ack {
                    let _ = ack.send(Err(err));
                }
                Vec::new()
            }
        }
    }

    fn dispatch_failed(
        &mut self,
        method: String,
        id: Option<CorrelationId>,
        reason: String,
        epoch: u64,
    ) {
        let err = EngineError::Dispatch {
            method,
            reason: reason.clone(),
        };
        self.logs.push(LogCategory::Error, err.to_string());

        let Some(id) = id else {
            return;
        };
        if id.is(INIT_REQUEST_ID) {
            // The handshake this POST belonged to went away with its stream.
            if epoch != self.session.epoch() {
                self.logs.push(
                    LogCategory::Warn,
                    "Ignoring initialize failure from a previous connection",
                );
                return;
            }
            if self.session.on_handshake_failed() {
                self.logs.push(
                    LogCategory::Error,
                    EngineError::Handshake("initialize was not delivered".to_string())
                        .to_string(),
                );
            }
            return;
        }
        self.correlator.fail(&id, CallError::Dispatch(reason));
    }
}

fn reject_after_shutdown(input: EngineInput) {
    match input {
        EngineInput::Dispatch { method, ack, .. } => {
            if let Some(ack) = ack {
                let _ = ack.send(Err(EngineError::NoEndpoint { method }));
            }
        }
        EngineInput::RefreshTools { ack: Some(ack) } => {
            let _ = ack.send(Err(EngineError::NoEndpoint {
                method: METHOD_TOOLS_LIST.to_string(),
            }));
        }
        EngineInput::CallTool { reply, .. } => {
            let _ = reply.send(Err(CallError::EngineStopped));
        }
        _ => {}
    }
}
