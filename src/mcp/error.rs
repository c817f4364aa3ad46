use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use super::rpc::rpc_error_message;

/// Failure classes the engine degrades through. None of them is fatal; they
/// end up in the log buffer or as a failure tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The inbound stream failed; the transport reconnects on its own.
    Transport(String),
    /// The POST for `method` failed at the HTTP level.
    Dispatch { method: String, reason: String },
    /// No submission address is known yet.
    NoEndpoint { method: String },
    /// The server answered with a JSON-RPC error object.
    Protocol { code: Option<i64>, message: String },
    /// The `initialize` result was unusable.
    Handshake(String),
    /// An inbound payload was not a JSON-RPC frame.
    MalformedFrame(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Transport(reason) => write!(f, "Transport error: {reason}"),
            EngineError::Dispatch { reason, .. } => write!(f, "Send failed: {reason}"),
            EngineError::NoEndpoint { .. } => {
                f.write_str("Cannot send RPC: no submission endpoint")
            }
            EngineError::Protocol { code, message } => match code {
                Some(code) => write!(f, "RPC error {code}: {message}"),
                None => write!(f, "RPC error: {message}"),
            },
            EngineError::Handshake(reason) => write!(f, "Init failed: {reason}"),
            EngineError::MalformedFrame(reason) => write!(f, "Malformed frame: {reason}"),
        }
    }
}

impl StdError for EngineError {}

/// Why a tool call made through `EngineHandle::call_tool` did not produce a
/// result.
#[derive(Debug, Clone, PartialEq)]
pub enum CallError {
    /// The server answered with a JSON-RPC error object.
    Rpc { message: String, error: Value },
    NoEndpoint,
    Dispatch(String),
    Timeout(Duration),
    Cancelled,
    /// The stream dropped before the response arrived.
    ConnectionLost,
    EngineStopped,
}

impl CallError {
    pub fn rpc(error: Value) -> Self {
        CallError::Rpc {
            message: rpc_error_message(&error),
            error,
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Rpc { message, .. } => write!(f, "RPC error: {message}"),
            CallError::NoEndpoint => f.write_str("No submission endpoint; handshake not complete"),
            CallError::Dispatch(reason) => write!(f, "Send failed: {reason}"),
            CallError::Timeout(limit) => {
                write!(f, "No response within {:.1}s", limit.as_secs_f64())
            }
            CallError::Cancelled => f.write_str("Call cancelled"),
            CallError::ConnectionLost => f.write_str("Connection lost before a response arrived"),
            CallError::EngineStopped => f.write_str("Engine stopped"),
        }
    }
}

impl StdError for CallError {}
