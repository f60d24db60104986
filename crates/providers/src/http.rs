//! HTTP plumbing shared by the backends: client construction, status mapping
//! and a server-sent-events line splitter.

use bolty_core::error::ProviderError;
use std::time::Duration;
use tracing::warn;

/// Build a client with a per-request timeout.
pub(crate) fn client(timeout: Duration) -> reqwest::Client {
    match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!(
                error = %e,
                timeout_secs = timeout.as_secs(),
                "Failed to build HTTP client; requests will run without a timeout"
            );
            reqwest::Client::new()
        }
    }
}

/// Map a transport failure to a provider error.
pub(crate) fn send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Map a non-success response to a provider error, consuming the body.
pub(crate) async fn status_error(response: reqwest::Response, model: &str) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    classify_status(status, model, &body)
}

pub(crate) fn classify_status(status: u16, model: &str, body: &str) -> ProviderError {
    let message = error_message(body);
    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: 5,
        },
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        404 => ProviderError::ModelNotFound(format!("{model}: {message}")),
        _ => {
            warn!(status, model, body = %message, "Backend returned error");
            ProviderError::ApiError {
                status_code: status,
                message,
            }
        }
    }
}

/// Pull `error.message` out of a JSON error body, or fall back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Splits an SSE byte stream into `data:` payloads.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across network reads decode correctly.
#[derive(Debug, Default)]
pub(crate) struct SseLines {
    buffer: Vec<u8>,
}

impl SseLines {
    /// Feed bytes and return the data payloads of every completed line.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = Self::data(&line) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flush a final line that was not newline-terminated.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        Self::data(&line)
    }

    fn data(line: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);
        // Empty lines separate events; lines starting with ':' are comments
        if line.is_empty() || line.starts_with(':') {
            return None;
        }
        line.strip_prefix("data:")
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
    }
}
