//! Client of the list endpoints behind the cascading selects.
use crate::selector::ServerTypeSource;
use reqwest::header::COOKIE;
use serde_json::Value;
use url::Url;

pub const CHANNEL_NAME_LIST_PATH: &str = "/ops_game/api/channel_name_list";
pub const GAME_TYPE_PATH: &str = "/ops_game/api/game_type";
pub const GAME_TYPE_LIST_PATH: &str = "/ops_game/add/api/game_type_list";
pub const GAME_NU_PATH: &str = "/ops_game/api/game_nu";

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("Invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Unexpected status: {0}")]
    Status(u16),
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct OpsApiClient {
    client: reqwest::Client,
    base_url: Url,
    session_cookie: Option<String>,
}

impl OpsApiClient {
    pub fn new(base_url: &str, session_cookie: Option<String>) -> Result<Self, ApiClientError> {
        let base_url = Url::parse(base_url)?;
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            base_url,
            session_cookie,
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiClientError> {
        let mut url = self.base_url.join(path)?;

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        Ok(url)
    }

    #[tracing::instrument(name = "list", skip_all, fields(%url))]
    async fn get_list(&self, url: Url) -> Result<Vec<String>, ApiClientError> {
        let mut request = self.client.get(url);

        if let Some(cookie) = &self.session_cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "List request failed");

            return Err(ApiClientError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let values = serde_json::from_str::<Vec<Value>>(&body)?;

        let items = values
            .into_iter()
            .map(|value| match value {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();

        Ok(items)
    }

    pub async fn channel_names(&self) -> Result<Vec<String>, ApiClientError> {
        let url = self.endpoint(CHANNEL_NAME_LIST_PATH, &[])?;

        self.get_list(url).await
    }

    /// Empty when `source` is [`ServerTypeSource::Disabled`].
    pub async fn server_types(
        &self,
        source: &ServerTypeSource,
    ) -> Result<Vec<String>, ApiClientError> {
        let url = match source {
            ServerTypeSource::Disabled => return Ok(Vec::new()),
            ServerTypeSource::Channel(channel) => {
                self.endpoint(GAME_TYPE_PATH, &[("channel_name", channel.as_str())])?
            }
            ServerTypeSource::All => self.endpoint(GAME_TYPE_LIST_PATH, &[])?,
        };

        self.get_list(url).await
    }

    pub async fn game_numbers(
        &self,
        channel: &str,
        server_type: &str,
    ) -> Result<Vec<String>, ApiClientError> {
        let url = self.endpoint(
            GAME_NU_PATH,
            &[("channel_name", channel), ("server_type", server_type)],
        )?;

        self.get_list(url).await
    }
}
