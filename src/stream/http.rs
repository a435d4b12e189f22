use super::{decoder, ConnectError, EventSourceConnector, EventStream, TransportError};
use futures::{stream, StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL, COOKIE};
use url::Url;

/// Opens event streams over HTTP.
///
/// Like a browser `EventSource`, the request is only sent once the stream is polled.
/// Request failures and non-success statuses are yielded as [`TransportError`]s.
#[derive(Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
    /// Forwarded verbatim as the `Cookie` header.
    session_cookie: Option<String>,
}

impl HttpConnector {
    pub fn new(session_cookie: Option<String>) -> Result<Self, ConnectError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| ConnectError::Request(err.to_string()))?;

        Ok(Self {
            client,
            session_cookie,
        })
    }
}

impl EventSourceConnector for HttpConnector {
    #[tracing::instrument(name = "connect", skip_all, fields(%url))]
    fn connect(&self, url: Url) -> Result<EventStream, ConnectError> {
        match url.scheme() {
            "http" | "https" => {}
            other => {
                tracing::warn!(scheme = %other, "Unsupported scheme");

                return Err(ConnectError::InvalidUrl(format!(
                    "Unsupported scheme: {other}"
                )));
            }
        }

        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");

        if let Some(cookie) = &self.session_cookie {
            request = request.header(COOKIE, cookie);
        }

        let request = request
            .build()
            .map_err(|err| ConnectError::Request(err.to_string()))?;

        let client = self.client.clone();

        let events = stream::once(async move {
            let response = client.execute(request).await?.error_for_status()?;

            tracing::debug!(status = %response.status(), "Event stream opened");

            Ok::<_, TransportError>(decoder::decode(response.bytes_stream()))
        })
        .try_flatten()
        .boxed();

        Ok(events)
    }
}
