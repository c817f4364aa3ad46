//! Inbound push stream.
//!
//! The transport owns the single SSE connection, decodes its framing into
//! [`TransportEvent`]s and reconnects with backoff on its own. It never
//! interprets payloads; JSON-RPC parsing happens in the engine.

use futures_util::StreamExt;
use reqwest::Url;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::TransportEvent;

pub mod http;
pub mod sse;

use http::apply_stream_headers;
use sse::{is_event_stream_content_type, SseDecoder};

/// Query parameter carrying the auth token on the stream URL.
pub const TOKEN_QUERY_PARAM: &str = "token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct SseTransportConfig {
    pub url: Url,
    pub retry: RetryPolicy,
}

/// Builds the stream URL, appending the auth token when one is configured.
pub fn stream_url(base: &str, token: Option<&str>) -> Result<Url, String> {
    let mut url =
        Url::parse(base.trim()).map_err(|err| format!("Invalid SSE URL '{base}': {err}"))?;
    if let Some(token) = token.map(str::trim).filter(|token| !token.is_empty()) {
        url.query_pairs_mut().append_pair(TOKEN_QUERY_PARAM, token);
    }
    Ok(url)
}

/// The stream URL without its query, so the token stays out of diagnostics.
fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

pub fn spawn_sse_transport(
    client: reqwest::Client,
    config: SseTransportConfig,
    events: mpsc::UnboundedSender<TransportEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_sse_transport(client, config, events, cancel))
}

enum StreamOutcome {
    Failed { opened: bool, reason: String },
    ReceiverClosed,
}

#[derive(Default)]
struct StreamCursor {
    last_event_id: Option<String>,
    retry: Option<Duration>,
}

/// Connect, read, back off, repeat. Returns when cancelled or when nobody is
/// listening anymore.
pub async fn run_sse_transport(
    client: reqwest::Client,
    config: SseTransportConfig,
    events: mpsc::UnboundedSender<TransportEvent>,
    cancel: CancellationToken,
) {
    let mut cursor = StreamCursor::default();
    let mut delay = config.retry.initial_delay;

    loop {
        if events.is_closed() {
            break;
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = read_stream(&client, &config.url, &mut cursor, &events) => outcome,
        };

        match outcome {
            StreamOutcome::ReceiverClosed => break,
            StreamOutcome::Failed { opened, reason } => {
                if opened {
                    delay = cursor.retry.unwrap_or(config.retry.initial_delay);
                }
                warn!(url = %redacted(&config.url), "SSE stream failed: {reason}");
                if events.send(TransportEvent::Error(reason)).is_err() {
                    break;
                }
            }
        }

        debug!(delay_ms = delay.as_millis() as u64, "Reconnecting SSE stream");
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = config.retry.next_delay(delay);
    }

    debug!(url = %redacted(&config.url), "SSE transport stopped");
}

async fn read_stream(
    client: &reqwest::Client,
    url: &Url,
    cursor: &mut StreamCursor,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> StreamOutcome {
    let request = apply_stream_headers(client.get(url.clone()), cursor.last_event_id.as_deref());
    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            return StreamOutcome::Failed {
                opened: false,
                reason: format!("Stream connect failed: {err}"),
            }
        }
    };

    let status = response.status();
    if !status.is_success() {
        return StreamOutcome::Failed {
            opened: false,
            reason: format!("HTTP error: {status}"),
        };
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !is_event_stream_content_type(&content_type) {
        return StreamOutcome::Failed {
            opened: false,
            reason: format!("Unexpected content type: {content_type}"),
        };
    }

    info!(url = %redacted(url), "SSE stream opened");
    if events.send(TransportEvent::Opened).is_err() {
        return StreamOutcome::ReceiverClosed;
    }

    let mut decoder = SseDecoder::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                return StreamOutcome::Failed {
                    opened: true,
                    reason: format!("Stream read failed: {err}"),
                }
            }
        };

        for event in decoder.push(&chunk) {
            if events.send(event.into()).is_err() {
                return StreamOutcome::ReceiverClosed;
            }
        }
        if let Some(id) = decoder.last_event_id() {
            cursor.last_event_id = Some(id.to_string());
        }
        if let Some(millis) = decoder.retry() {
            cursor.retry = Some(Duration::from_millis(millis));
        }
    }
    decoder.finish();

    StreamOutcome::Failed {
        opened: true,
        reason: "Stream closed by server".to_string(),
    }
}
