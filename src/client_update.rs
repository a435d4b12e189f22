//! Frontend asset update of a single channel, streamed from `/ops_game/operate_client`.
use crate::{
    operation::params::operate_client_url,
    stream::{EventSourceConnector, TransportError},
};
use futures::StreamExt;
use serde_json::Value;
use std::{io::Write, sync::Arc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientUpdateStatus {
    Loading,
    Completed,
    Error,
    Heartbeat,
    Other(String),
}

impl From<&str> for ClientUpdateStatus {
    fn from(value: &str) -> Self {
        match value {
            "loading" => ClientUpdateStatus::Loading,
            "completed" => ClientUpdateStatus::Completed,
            "error" => ClientUpdateStatus::Error,
            "heartbeat" => ClientUpdateStatus::Heartbeat,
            other => ClientUpdateStatus::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientUpdateMessage {
    pub status: ClientUpdateStatus,
    pub message: Option<String>,
    /// The payload re-serialized, shown when there is no message.
    pub json: String,
}

impl ClientUpdateMessage {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let value = serde_json::from_str::<Value>(raw)?;

        let status = ClientUpdateStatus::from(
            value
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        );

        let message = match value.get("message") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };

        Ok(Self {
            status,
            message,
            json: value.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientUpdateState {
    Idle,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatusKind {
    Loading,
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Output,
    Success,
    Error,
    Heartbeat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientUpdateEffect {
    ClearLog,
    Status { text: String, kind: UpdateStatusKind },
    Log { text: String, kind: LogKind },
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientUpdateEvent {
    Payload(String),
    TransportError(String),
}

fn status(text: impl Into<String>, kind: UpdateStatusKind) -> ClientUpdateEffect {
    ClientUpdateEffect::Status {
        text: text.into(),
        kind,
    }
}

fn log(text: impl Into<String>, kind: LogKind) -> ClientUpdateEffect {
    ClientUpdateEffect::Log {
        text: text.into(),
        kind,
    }
}

/// A blank channel is rejected without connecting and leaves the state `Idle`.
pub fn begin(channel: &str) -> (ClientUpdateState, Vec<ClientUpdateEffect>) {
    let channel = channel.trim();
    if channel.is_empty() {
        return (
            ClientUpdateState::Idle,
            vec![status("Select a channel to update", UpdateStatusKind::Error)],
        );
    }

    let effects = vec![
        ClientUpdateEffect::ClearLog,
        status(
            format!("Updating frontend of channel [{channel}]..."),
            UpdateStatusKind::Loading,
        ),
        log(format!("[start] Updating channel {channel}"), LogKind::Success),
    ];

    (ClientUpdateState::Running, effects)
}

pub fn reduce(
    state: ClientUpdateState,
    event: ClientUpdateEvent,
) -> (ClientUpdateState, Vec<ClientUpdateEffect>) {
    if state != ClientUpdateState::Running {
        return (state, Vec::new());
    }

    let raw = match event {
        ClientUpdateEvent::Payload(raw) => raw,
        ClientUpdateEvent::TransportError(reason) => {
            let effects = vec![
                status("Update connection failed", UpdateStatusKind::Error),
                log(format!("[connection error] {reason}"), LogKind::Error),
                ClientUpdateEffect::Close,
            ];

            return (ClientUpdateState::Failed, effects);
        }
    };

    let msg = match ClientUpdateMessage::parse(&raw) {
        Ok(msg) => msg,
        Err(err) => {
            tracing::warn!(?err, %raw, "Failed to parse client update payload");

            return (state, vec![log(format!("[parse error] {raw}"), LogKind::Error)]);
        }
    };

    let message = msg.message.clone().unwrap_or_default();

    match msg.status {
        ClientUpdateStatus::Loading => (
            state,
            vec![
                status(message.clone(), UpdateStatusKind::Loading),
                log(format!("[progress] {message}"), LogKind::Output),
            ],
        ),
        ClientUpdateStatus::Completed => (
            ClientUpdateState::Completed,
            vec![
                status(message.clone(), UpdateStatusKind::Completed),
                log(format!("[done] {message}"), LogKind::Success),
                ClientUpdateEffect::Close,
            ],
        ),
        ClientUpdateStatus::Error => (
            ClientUpdateState::Failed,
            vec![
                status(message.clone(), UpdateStatusKind::Error),
                log(format!("[error] {message}"), LogKind::Error),
                ClientUpdateEffect::Close,
            ],
        ),
        ClientUpdateStatus::Heartbeat => (
            state,
            vec![log(format!("[waiting] {message}"), LogKind::Heartbeat)],
        ),
        ClientUpdateStatus::Other(_) => {
            let text = match msg.message {
                Some(message) if !message.is_empty() => message,
                _ => msg.json,
            };

            (state, vec![log(text, LogKind::Output)])
        }
    }
}

/// Receives the effects of a client update as they happen.
pub trait ClientUpdateSink {
    fn apply(&mut self, effect: &ClientUpdateEffect);
}

impl ClientUpdateSink for Vec<ClientUpdateEffect> {
    fn apply(&mut self, effect: &ClientUpdateEffect) {
        self.push(effect.clone());
    }
}

/// Prints status changes and log lines, one per line.
pub struct TerminalSink<W> {
    writer: W,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ClientUpdateSink for TerminalSink<W> {
    fn apply(&mut self, effect: &ClientUpdateEffect) {
        let res = match effect {
            ClientUpdateEffect::ClearLog | ClientUpdateEffect::Close => Ok(()),
            ClientUpdateEffect::Status { text, kind } => {
                writeln!(self.writer, "<{kind:?}> {text}")
            }
            ClientUpdateEffect::Log { text, .. } => writeln!(self.writer, "{text}"),
        };

        if let Err(err) = res {
            tracing::warn!(?err, "Failed to write client update output");
        }
    }
}

pub struct ClientUpdater {
    base_url: String,
    connector: Arc<dyn EventSourceConnector>,
}

impl ClientUpdater {
    pub fn new(base_url: impl Into<String>, connector: Arc<dyn EventSourceConnector>) -> Self {
        Self {
            base_url: base_url.into(),
            connector,
        }
    }

    /// Runs the update of `channel` until the stream reports a terminal status or fails.
    #[tracing::instrument(name = "client_update", skip(self, sink))]
    pub async fn run<S>(&self, channel: &str, sink: &mut S) -> ClientUpdateState
    where
        S: ClientUpdateSink + ?Sized,
    {
        let (mut state, effects) = begin(channel);
        effects.iter().for_each(|effect| sink.apply(effect));

        if state != ClientUpdateState::Running {
            return state;
        }

        let events = operate_client_url(&self.base_url, channel.trim())
            .and_then(|url| self.connector.connect(url));

        let mut events = match events {
            Ok(events) => events,
            Err(err) => {
                tracing::error!(%err, "Failed to initialize client update connection");

                let (state, effects) =
                    reduce(state, ClientUpdateEvent::TransportError(err.to_string()));
                effects.iter().for_each(|effect| sink.apply(effect));

                return state;
            }
        };

        loop {
            let event = match events.next().await {
                Some(Ok(data)) => ClientUpdateEvent::Payload(data),
                Some(Err(err)) => ClientUpdateEvent::TransportError(err.to_string()),
                None => ClientUpdateEvent::TransportError(TransportError::Closed.to_string()),
            };

            let (next, effects) = reduce(state, event);
            state = next;

            let mut closed = false;
            for effect in &effects {
                closed |= *effect == ClientUpdateEffect::Close;
                sink.apply(effect);
            }

            if closed {
                tracing::info!(?state, "Client update finished");

                return state;
            }
        }
    }
}
