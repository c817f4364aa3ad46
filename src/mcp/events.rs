use super::transport::sse::SseEvent;

/// Raw events surfaced by the inbound stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The stream connected and the server answered with an event stream.
    Opened,
    /// A named event, e.g. `endpoint`.
    Named { name: String, data: String },
    /// An unnamed (or `message`) event carrying a JSON-RPC payload.
    Message(String),
    /// The stream failed or ended; the transport reconnects on its own.
    Error(String),
}

impl From<SseEvent> for TransportEvent {
    fn from(event: SseEvent) -> Self {
        match event.event.as_deref() {
            None | Some("") | Some("message") => TransportEvent::Message(event.data),
            Some(name) => TransportEvent::Named {
                name: name.to_string(),
                data: event.data,
            },
        }
    }
}
