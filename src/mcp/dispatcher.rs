//! Outbound JSON-RPC submission over HTTP POST.

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::error::EngineError;
use super::log_buffer::{LogBuffer, LogCategory};
use super::rpc::{CorrelationId, RpcEnvelope};
use super::session::SessionMachine;
use super::transport::http::{apply_post_headers, resolve_submission_url};

/// An envelope bound to the address it goes to, tagged with the connection
/// epoch that address came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PostJob {
    pub address: String,
    pub envelope: RpcEnvelope,
    pub epoch: u64,
}

/// Builds the envelope and checks there is somewhere to send it. Logs the
/// `SEND`, or the `ERROR` when no submission address is known.
pub fn prepare(
    session: &SessionMachine,
    logs: &mut LogBuffer,
    method: &str,
    params: Value,
    id: Option<CorrelationId>,
) -> Result<PostJob, EngineError> {
    let Some(address) = session.submission_address() else {
        let err = EngineError::NoEndpoint {
            method: method.to_string(),
        };
        logs.push(LogCategory::Error, err.to_string());
        return Err(err);
    };

    let envelope = RpcEnvelope::new(method, params, id);
    logs.push(LogCategory::Send, method);
    Ok(PostJob {
        address: address.to_string(),
        envelope,
        epoch: session.epoch(),
    })
}

/// Delivers one envelope. Only acknowledges the POST; responses arrive on the
/// stream.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, address: &str, envelope: &RpcEnvelope) -> Result<(), String>;
}

pub struct HttpSubmitter {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpSubmitter {
    pub fn new(client: reqwest::Client, base_url: Url, timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            timeout,
        }
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(&self, address: &str, envelope: &RpcEnvelope) -> Result<(), String> {
        let url = resolve_submission_url(&self.base_url, address)?;
        let body = serde_json::to_vec(envelope).map_err(|err| err.to_string())?;
        debug!(url = %url, method = %envelope.method, "POST JSON-RPC envelope");

        let response = apply_post_headers(self.client.post(url))
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .map_err(|err| err.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP error: {status}"));
        }
        Ok(())
    }
}
