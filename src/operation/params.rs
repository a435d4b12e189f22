use crate::stream::ConnectError;
use url::Url;

pub const OPERATE_PATH: &str = "/ops_game/operate";
pub const OPERATE_CLIENT_PATH: &str = "/ops_game/operate_client";

/// Optional scalar value of an extra request parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamValue(Option<String>);

impl ParamValue {
    /// `None` for absent or empty values. Those are never sent.
    pub fn as_sendable(&self) -> Option<&str> {
        self.0.as_deref().filter(|value| !value.is_empty())
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self(Some(value.to_string()))
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self(Some(value))
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self(Some(value.to_string()))
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self(Some(value.to_string()))
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self(Some(value.to_string()))
    }
}

impl<T> From<Option<T>> for ParamValue
where
    T: Into<ParamValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Extra query parameters of an operation, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationParams {
    entries: Vec<(String, ParamValue)>,
}

impl OperationParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Replaces the value of an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn sendable(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(key, value)| value.as_sendable().map(|value| (key.as_str(), value)))
    }
}

impl<K, V> FromIterator<(K, V)> for OperationParams
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = OperationParams::new();
        for (key, value) in iter {
            params.insert(key, value);
        }

        params
    }
}

fn endpoint(base: &str, path: &str) -> Result<Url, ConnectError> {
    let base = Url::parse(base).map_err(|err| ConnectError::InvalidUrl(err.to_string()))?;
    if base.cannot_be_a_base() {
        return Err(ConnectError::InvalidUrl(format!("{base} cannot be a base")));
    }

    base.join(path)
        .map_err(|err| ConnectError::InvalidUrl(err.to_string()))
}

/// `{base}/ops_game/operate?script=<script>&<key>=<value>...`
///
/// Values are form encoded, so a space is sent as `+` rather than `%20`.
/// The backend decodes both the same way.
pub fn operate_url(base: &str, script: &str, params: &OperationParams) -> Result<Url, ConnectError> {
    let mut url = endpoint(base, OPERATE_PATH)?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("script", script);
        for (key, value) in params.sendable() {
            query.append_pair(key, value);
        }
    }

    Ok(url)
}

/// `{base}/ops_game/operate_client?channel=<channel>`
pub fn operate_client_url(base: &str, channel: &str) -> Result<Url, ConnectError> {
    let mut url = endpoint(base, OPERATE_CLIENT_PATH)?;
    url.query_pairs_mut().append_pair("channel", channel);

    Ok(url)
}
