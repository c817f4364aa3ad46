use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{EngineCommand, EngineCore, EngineInput, EngineSettings, EngineSnapshot};
use crate::mcp::catalog::Tool;
use crate::mcp::dispatcher::{HttpSubmitter, Submitter};
use crate::mcp::error::{CallError, EngineError};
use crate::mcp::events::TransportEvent;
use crate::mcp::log_buffer::LogEntry;
use crate::mcp::rpc::CorrelationId;
use crate::mcp::session::{ConnectionStatus, SessionState};
use crate::mcp::stats::UsageStats;
use crate::mcp::transport::http::build_http_client;
use crate::mcp::transport::{spawn_sse_transport, stream_url, RetryPolicy, SseTransportConfig};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sse_url: String,
    pub auth_token: Option<String>,
    pub settings: EngineSettings,
    pub retry: RetryPolicy,
    pub post_timeout: Duration,
    /// Default wait for hardened tool calls.
    pub call_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sse_url: crate::core::config::DEFAULT_SSE_URL.to_string(),
            auth_token: None,
            settings: EngineSettings::default(),
            retry: RetryPolicy::default(),
            post_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Per-call overrides for [`EngineHandle::call_tool`].
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

/// Cheap-to-clone front of a running engine. Reads come from the latest
/// published snapshot; writes are queued to the actor.
#[derive(Clone)]
pub struct EngineHandle {
    inputs: mpsc::UnboundedSender<EngineInput>,
    snapshots: watch::Receiver<EngineSnapshot>,
    cancel: CancellationToken,
    call_timeout: Duration,
}

impl EngineHandle {
    /// Opens the event stream and starts the engine actor.
    pub fn connect(config: EngineConfig) -> Result<Self, String> {
        let url = stream_url(&config.sse_url, config.auth_token.as_deref())?;
        let client = build_http_client()?;
        let cancel = CancellationToken::new();

        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        spawn_sse_transport(
            client.clone(),
            SseTransportConfig {
                url: url.clone(),
                retry: config.retry,
            },
            transport_tx,
            cancel.child_token(),
        );

        let submitter = Arc::new(HttpSubmitter::new(client, url, config.post_timeout));
        Ok(Self::spawn(
            config.settings,
            submitter,
            transport_rx,
            cancel,
            config.call_timeout,
        ))
    }

    /// Starts the actor over an arbitrary event source and submitter.
    pub fn spawn(
        settings: EngineSettings,
        submitter: Arc<dyn Submitter>,
        transport: mpsc::UnboundedReceiver<TransportEvent>,
        cancel: CancellationToken,
        call_timeout: Duration,
    ) -> Self {
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let mut core = EngineCore::new(settings);
        let commands = core.start();
        let (snapshot_tx, snapshot_rx) = watch::channel(core.snapshot());

        let actor = Actor {
            core,
            submitter,
            inputs: inputs_tx.downgrade(),
            snapshots: snapshot_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(actor.run(commands, inputs_rx, transport));

        Self {
            inputs: inputs_tx,
            snapshots: snapshot_rx,
            cancel,
            call_timeout,
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.snapshots.clone()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.snapshots.borrow().status.clone()
    }

    pub fn session_state(&self) -> SessionState {
        self.snapshots.borrow().state
    }

    pub fn tool_catalog(&self) -> Arc<[Tool]> {
        Arc::clone(&self.snapshots.borrow().tools)
    }

    pub fn usage_stats(&self) -> UsageStats {
        self.snapshots.borrow().stats.clone()
    }

    /// Newest first, at most 50 entries.
    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.snapshots.borrow().logs.clone()
    }

    pub fn last_result(&self) -> Option<Value> {
        self.snapshots.borrow().last_result.clone()
    }

    /// Sends a request or notification and waits for the POST to be
    /// acknowledged. The response, if any, arrives on the stream and is
    /// correlated by `id`.
    pub async fn dispatch(
        &self,
        method: &str,
        params: Value,
        id: Option<CorrelationId>,
    ) -> Result<(), EngineError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(
            method,
            EngineInput::Dispatch {
                method: method.to_string(),
                params,
                id,
                ack: Some(ack_tx),
            },
        )?;
        ack_rx.await.unwrap_or_else(|_| Err(stopped(method)))
    }

    pub async fn refresh_tools(&self) -> Result<(), EngineError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        let method = crate::mcp::METHOD_TOOLS_LIST;
        self.send(method, EngineInput::RefreshTools { ack: Some(ack_tx) })?;
        ack_rx.await.unwrap_or_else(|_| Err(stopped(method)))
    }

    /// Calls a tool under an engine-allocated id and waits for its response.
    /// Timeout and cancellation only stop the wait; a late response is still
    /// counted.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        options: CallOptions,
    ) -> Result<Value, CallError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inputs
            .send(EngineInput::CallTool {
                name: name.to_string(),
                arguments,
                reply: reply_tx,
            })
            .map_err(|_| CallError::EngineStopped)?;

        let limit = options.timeout.unwrap_or(self.call_timeout);
        let wait = async {
            match tokio::time::timeout(limit, reply_rx).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(_)) => Err(CallError::EngineStopped),
                Err(_) => Err(CallError::Timeout(limit)),
            }
        };

        match options.cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => Err(CallError::Cancelled),
                outcome = wait => outcome,
            },
            None => wait.await,
        }
    }

    /// Resolves with the first published snapshot that satisfies `predicate`.
    pub async fn wait_until(
        &self,
        predicate: impl FnMut(&EngineSnapshot) -> bool,
    ) -> Option<EngineSnapshot> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots.wait_for(predicate).await.ok()?;
        Some(snapshot.clone())
    }

    pub fn shutdown(&self) {
        let _ = self.inputs.send(EngineInput::Shutdown);
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    fn send(&self, method: &str, input: EngineInput) -> Result<(), EngineError> {
        self.inputs.send(input).map_err(|_| stopped(method))
    }
}

fn stopped(method: &str) -> EngineError {
    EngineError::Dispatch {
        method: method.to_string(),
        reason: "engine stopped".to_string(),
    }
}

struct Actor {
    core: EngineCore,
    submitter: Arc<dyn Submitter>,
    inputs: mpsc::WeakUnboundedSender<EngineInput>,
    snapshots: watch::Sender<EngineSnapshot>,
    cancel: CancellationToken,
}

impl Actor {
    async fn run(
        mut self,
        initial: Vec<EngineCommand>,
        mut inputs: mpsc::UnboundedReceiver<EngineInput>,
        mut transport: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        self.execute(initial);
        let mut transport_open = true;

        loop {
            let input = tokio::select! {
                _ = self.cancel.cancelled() => EngineInput::Shutdown,
                event = transport.recv(), if transport_open => match event {
                    Some(event) => EngineInput::Transport(event),
                    None => {
                        transport_open = false;
                        continue;
                    }
                },
                input = inputs.recv() => input.unwrap_or(EngineInput::Shutdown),
            };

            let stop = matches!(input, EngineInput::Shutdown);
            let commands = self.core.handle(input);
            self.snapshots.send_replace(self.core.snapshot());
            if stop {
                break;
            }
            self.execute(commands);
        }

        self.cancel.cancel();
        info!("MCP engine stopped");
    }

    fn execute(&self, commands: Vec<EngineCommand>) {
        for command in commands {
            match command {
                EngineCommand::Post { job, ack } => {
                    let submitter = Arc::clone(&self.submitter);
                    let inputs = self.inputs.clone();
                    tokio::spawn(async move {
                        let method = job.envelope.method.clone();
                        match submitter.submit(&job.address, &job.envelope).await {
                            Ok(()) => {
                                if let Some(ack) = ack {
                                    let _ = ack.send(Ok(()));
                                }
                            }
                            Err(reason) => {
                                debug!(method = %method, "POST failed: {reason}");
                                if let Some(inputs) = inputs.upgrade() {
                                    let _ = inputs.send(EngineInput::DispatchFailed {
                                        method: method.clone(),
                                        id: job.envelope.id.clone(),
                                        reason: reason.clone(),
                                        epoch: job.epoch,
                                    });
                                }
                                if let Some(ack) = ack {
                                    let _ = ack.send(Err(EngineError::Dispatch { method, reason }));
                                }
                            }
                        }
                    });
                }
                EngineCommand::ScheduleCatalogFetch(delay) => {
                    let inputs = self.inputs.clone();
                    let cancel = self.cancel.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = cancel.cancelled() => {}
                            _ = tokio::time::sleep(delay) => {
                                if let Some(inputs) = inputs.upgrade() {
                                    let _ = inputs.send(EngineInput::FetchCatalog);
                                }
                            }
                        }
                    });
                }
            }
        }
    }
}
