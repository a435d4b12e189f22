//! Server-sent-event transport used by the operation streams.
pub mod decoder;
pub mod http;

use futures::stream::BoxStream;
use url::Url;

pub use decoder::SseDecoder;
pub use http::HttpConnector;

/// Data payloads of consecutive SSE frames.
pub type EventStream = BoxStream<'static, Result<String, TransportError>>;

/// The stream could not be constructed at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("Invalid url: {0}")]
    InvalidUrl(String),
    #[error("Failed to build request: {0}")]
    Request(String),
}

/// The underlying stream failed or ended before a terminal message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Unexpected status: {0}")]
    Status(u16),
    #[error("Failed to read stream: {0}")]
    Body(String),
    #[error("Stream closed by server")]
    Closed,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return TransportError::Status(status.as_u16());
        }

        if err.is_body() || err.is_decode() {
            return TransportError::Body(err.to_string());
        }

        TransportError::Request(err.to_string())
    }
}

/// Opens event streams. Implemented over HTTP by [`HttpConnector`],
/// and by in-memory fakes in tests.
pub trait EventSourceConnector: Send + Sync + 'static {
    /// Returns `Err` when the stream cannot be constructed. Network failures
    /// surface later as items of the returned stream.
    fn connect(&self, url: Url) -> Result<EventStream, ConnectError>;
}
