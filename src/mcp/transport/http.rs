use reqwest::Url;
use std::time::Duration;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const EVENT_STREAM_ACCEPT: &str = "text/event-stream";
pub const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Client shared by the stream and the POST path. No overall request timeout
/// is set because the stream stays open indefinitely; POSTs set their own.
pub fn build_http_client() -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .build()
        .map_err(|err| format!("Failed to build HTTP client: {err}"))
}

pub fn apply_stream_headers(
    request: reqwest::RequestBuilder,
    last_event_id: Option<&str>,
) -> reqwest::RequestBuilder {
    let request = request
        .header("Accept", EVENT_STREAM_ACCEPT)
        .header("Cache-Control", "no-cache");
    match last_event_id {
        Some(id) if !id.is_empty() => request.header(LAST_EVENT_ID_HEADER, id),
        _ => request,
    }
}

pub fn apply_post_headers(request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    request.header("Content-Type", JSON_CONTENT_TYPE)
}

/// Resolves an address announced by the server against the stream URL.
/// Absolute addresses pass through unchanged.
pub fn resolve_submission_url(base: &Url, address: &str) -> Result<Url, String> {
    base.join(address)
        .map_err(|err| format!("Invalid submission address '{address}': {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_addresses_resolve_against_the_stream_origin() {
        let base = Url::parse("http://localhost:8000/sse?token=abc").expect("valid url");
        let resolved = resolve_submission_url(&base, "/messages?session_id=1").expect("resolves");
        assert_eq!(
            resolved.as_str(),
            "http://localhost:8000/messages?session_id=1"
        );
    }

    #[test]
    fn absolute_addresses_pass_through() {
        let base = Url::parse("http://localhost:8000/sse").expect("valid url");
        let resolved =
            resolve_submission_url(&base, "https://other.example/rpc").expect("resolves");
        assert_eq!(resolved.as_str(), "https://other.example/rpc");
    }

    #[test]
    fn last_event_id_header_skipped_when_blank() {
        let client = reqwest::Client::new();
        let req = apply_stream_headers(client.get("https://example.com"), Some(""))
            .build()
            .unwrap();
        assert!(req.headers().get(LAST_EVENT_ID_HEADER).is_none());
        assert_eq!(
            req.headers().get("Accept").and_then(|v| v.to_str().ok()),
            Some(EVENT_STREAM_ACCEPT)
        );
    }
}
