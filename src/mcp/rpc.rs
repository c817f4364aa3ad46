//! JSON-RPC 2.0 envelopes and inbound frame parsing.

use super::error::EngineError;
use super::NOTIFICATION_PREFIX;
use rust_mcp_schema::RpcError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const JSONRPC_VERSION: &str = "2.0";

/// Value used to match an asynchronous response frame to its call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrelationId {
    Number(i64),
    Text(String),
}

impl CorrelationId {
    /// True when this is the given reserved text id.
    pub fn is(&self, reserved: &str) -> bool {
        matches!(self, CorrelationId::Text(text) if text == reserved)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationId::Number(number) => write!(f, "{number}"),
            CorrelationId::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        CorrelationId::Text(value.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        CorrelationId::Text(value)
    }
}

impl From<i64> for CorrelationId {
    fn from(value: i64) -> Self {
        CorrelationId::Number(value)
    }
}

pub fn is_notification(method: &str) -> bool {
    method.starts_with(NOTIFICATION_PREFIX)
}

/// Outbound request or notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcEnvelope {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<CorrelationId>,
}

impl RpcEnvelope {
    /// Builds an envelope. Notifications drop whatever id was passed.
    pub fn new(method: impl Into<String>, params: Value, id: Option<CorrelationId>) -> Self {
        let method = method.into();
        let id = if is_notification(&method) { None } else { id };
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
            id,
        }
    }

    pub fn is_notification(&self) -> bool {
        is_notification(&self.method)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameBody {
    Result(Value),
    Error(Value),
    /// A frame carrying `method` without `result`/`error`; holds its params.
    Method(Value),
}

/// Inbound JSON-RPC frame, loosely validated.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub id: Option<CorrelationId>,
    pub method: Option<String>,
    pub body: FrameBody,
}

impl InboundFrame {
    pub fn parse(payload: &str) -> Result<Self, EngineError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|err| EngineError::MalformedFrame(format!("invalid JSON: {err}")))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, EngineError> {
        let Value::Object(mut object) = value else {
            return Err(EngineError::MalformedFrame(
                "frame is not a JSON object".to_string(),
            ));
        };

        if !object.contains_key("jsonrpc") {
            return Err(EngineError::MalformedFrame(
                "missing jsonrpc field".to_string(),
            ));
        }

        let id = match object.remove("id") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(serde_json::from_value::<CorrelationId>(raw).map_err(|_| {
                EngineError::MalformedFrame("unsupported id type".to_string())
            })?),
        };

        let method = object
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_string);

        // A null `error` next to a result means no error.
        let error = object.remove("error").filter(|error| !error.is_null());
        let body = if let Some(error) = error {
            FrameBody::Error(error)
        } else if let Some(result) = object.remove("result") {
            FrameBody::Result(result)
        } else if method.is_some() {
            FrameBody::Method(object.remove("params").unwrap_or(Value::Null))
        } else {
            return Err(EngineError::MalformedFrame(
                "frame carries neither result, error nor method".to_string(),
            ));
        };

        Ok(Self { id, method, body })
    }
}

/// Human-readable message of a JSON-RPC error object.
pub fn rpc_error_message(error: &Value) -> String {
    match serde_json::from_value::<RpcError>(error.clone()) {
        Ok(error) => error.message,
        Err(_) => error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
    }
}

/// Numeric code of a JSON-RPC error object, when present.
pub fn rpc_error_code(error: &Value) -> Option<i64> {
    error.get("code").and_then(Value::as_i64)
}
