//! Routes inbound frames to the operation they complete.

use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tokio::sync::oneshot;

use super::error::CallError;
use super::rpc::{CorrelationId, FrameBody, InboundFrame};
use super::{INIT_REQUEST_ID, LIST_TOOLS_REQUEST_ID, METHOD_INITIALIZED};

pub type CallReply = oneshot::Sender<Result<Value, CallError>>;

/// Text prefixes tool services use to report failures inside a successful
/// result.
const LOGICAL_FAILURE_PREFIXES: [&str; 3] = ["Error:", "User not found", "Missing"];

/// Calls whose caller stopped waiting, remembered so a late response is still
/// attributed to its tool. Oldest are forgotten first.
pub const ABANDONED_CAPACITY: usize = 64;

#[derive(Debug)]
struct PendingCall {
    tool: String,
    issued: i64,
    reply: Option<CallReply>,
}

impl PendingCall {
    fn is_abandoned(&self) -> bool {
        self.reply.as_ref().is_none_or(|reply| reply.is_closed())
    }
}

#[derive(Debug)]
pub enum Route {
    Handshake,
    InitializedEcho,
    Catalog,
    /// A tool-invocation response. `reply` is set when a hardened call is
    /// still waiting for it.
    ToolResult {
        tool: String,
        reply: Option<CallReply>,
    },
    /// A server-initiated notification or request.
    ServerMessage { method: String },
    /// A response without an id; nothing can claim it.
    Orphan,
}

#[derive(Debug)]
pub struct Correlator {
    pending: HashMap<CorrelationId, PendingCall>,
    abandoned: VecDeque<(CorrelationId, String)>,
    next_id: i64,
}

impl Default for Correlator {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
            abandoned: VecDeque::new(),
            next_id: 1,
        }
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hardened call and returns its id.
    pub fn allocate(&mut self, tool: &str, reply: CallReply) -> CorrelationId {
        self.prune_abandoned();
        let issued = self.next_id;
        let id = CorrelationId::Number(issued);
        self.next_id += 1;
        self.pending.insert(
            id.clone(),
            PendingCall {
                tool: tool.to_string(),
                issued,
                reply: Some(reply),
            },
        );
        id
    }

    /// Moves calls nobody waits on anymore out of the pending map.
    fn prune_abandoned(&mut self) {
        let mut closed: Vec<(i64, CorrelationId)> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.is_abandoned())
            .map(|(id, pending)| (pending.issued, id.clone()))
            .collect();
        closed.sort_by_key(|(issued, _)| *issued);

        for (_, id) in closed {
            if let Some(pending) = self.pending.remove(&id) {
                self.abandoned.push_back((id, pending.tool));
            }
        }
        while self.abandoned.len() > ABANDONED_CAPACITY {
            self.abandoned.pop_front();
        }
    }

    fn take_abandoned(&mut self, id: &CorrelationId) -> Option<String> {
        let index = self.abandoned.iter().position(|(known, _)| known == id)?;
        self.abandoned.remove(index).map(|(_, tool)| tool)
    }

    /// First match wins: handshake id, initialized echo, catalog id, then any
    /// other id as a tool result.
    pub fn route(&mut self, frame: &InboundFrame) -> Route {
        if frame.id.as_ref().is_some_and(|id| id.is(INIT_REQUEST_ID)) {
            return Route::Handshake;
        }
        if frame.method.as_deref() == Some(METHOD_INITIALIZED) {
            return Route::InitializedEcho;
        }
        if frame
            .id
            .as_ref()
            .is_some_and(|id| id.is(LIST_TOOLS_REQUEST_ID))
        {
            return Route::Catalog;
        }

        if let FrameBody::Method(_) = frame.body {
            return Route::ServerMessage {
                method: frame.method.clone().unwrap_or_default(),
            };
        }

        let Some(id) = &frame.id else {
            return Route::Orphan;
        };
        self.prune_abandoned();
        if let Some(pending) = self.pending.remove(id) {
            return Route::ToolResult {
                tool: pending.tool,
                reply: pending.reply,
            };
        }
        let tool = self
            .take_abandoned(id)
            .unwrap_or_else(|| id.to_string());
        Route::ToolResult { tool, reply: None }
    }

    /// Fails one pending call, e.g. when its POST did not go through.
    /// Returns the tool name when the id was pending.
    pub fn fail(&mut self, id: &CorrelationId, err: CallError) -> Option<String> {
        let pending = self.pending.remove(id)?;
        if let Some(reply) = pending.reply {
            let _ = reply.send(Err(err));
        }
        Some(pending.tool)
    }

    pub fn fail_all(&mut self, err: CallError) -> usize {
        self.abandoned.clear();
        let drained = self.pending.len();
        for (_, pending) in self.pending.drain() {
            if let Some(reply) = pending.reply {
                let _ = reply.send(Err(err.clone()));
            }
        }
        drained
    }

    /// Calls a caller is still waiting on.
    pub fn pending_len(&self) -> usize {
        self.pending
            .values()
            .filter(|pending| !pending.is_abandoned())
            .count()
    }
}

/// A result the service reports as successful but that describes a failure.
pub fn is_logical_failure(result: &Value) -> bool {
    if result.get("isError").and_then(Value::as_bool) == Some(true) {
        return true;
    }
    result
        .get("content")
        .and_then(Value::as_array)
        .and_then(|content| content.first())
        .and_then(|item| item.get("text"))
        .and_then(Value::as_str)
        .is_some_and(|text| {
            LOGICAL_FAILURE_PREFIXES
                .iter()
                .any(|prefix| text.starts_with(prefix))
        })
}
