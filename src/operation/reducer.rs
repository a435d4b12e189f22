use super::{
    kind::OperationType,
    message::{ServerMessage, Statistics},
};
use chrono::NaiveTime;
use std::time::Duration;

/// How long transient error banners stay visible.
pub const STATUS_AUTO_HIDE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OperationState {
    #[default]
    Idle,
    Connecting,
    Streaming,
    Completed,
    Errored,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationState::Completed | OperationState::Errored)
    }

    /// States in which stream events are still consumed.
    pub fn is_live(&self) -> bool {
        matches!(self, OperationState::Connecting | OperationState::Streaming)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Payload { data: String, received_at: NaiveTime },
    TransportError(String),
    InitFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Connecting,
    Error,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Connecting => "connecting",
            StatusKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub text: String,
    pub kind: StatusKind,
    pub auto_hide: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLine {
    pub task_id: Option<String>,
    pub status: String,
    pub message: String,
    pub received_at: NaiveTime,
}

impl TaskLine {
    /// `[HH:MM:SS] message`
    pub fn stamped(&self) -> String {
        format!("[{}] {}", self.received_at.format("%H:%M:%S"), self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEffect {
    ClearOutput,
    ShowStatus(StatusUpdate),
    HideStatus,
    AppendTaskLine(TaskLine),
    AppendStatistics(Statistics),
    AppendCompleted(String),
    AppendParseError { error: String, raw: String },
    CloseConnection,
}

/// Entering `Connecting` for a fresh operation of `ty`.
pub fn begin(ty: OperationType) -> (OperationState, Vec<RenderEffect>) {
    let effects = vec![
        RenderEffect::ClearOutput,
        RenderEffect::ShowStatus(StatusUpdate {
            text: format!("Running {} on game servers, please wait...", ty.verb()),
            kind: StatusKind::Connecting,
            auto_hide: None,
        }),
    ];

    (OperationState::Connecting, effects)
}

/// Pure transition function: applies a stream event and returns the render effects.
pub fn reduce(
    ty: OperationType,
    state: OperationState,
    event: StreamEvent,
) -> (OperationState, Vec<RenderEffect>) {
    match event {
        StreamEvent::InitFailed(reason) => {
            let effects = vec![RenderEffect::ShowStatus(StatusUpdate {
                text: format!("Failed to initialize {} connection: {reason}", ty.verb()),
                kind: StatusKind::Error,
                auto_hide: Some(STATUS_AUTO_HIDE),
            })];

            (OperationState::Errored, effects)
        }
        _ if !state.is_live() => (state, Vec::new()),
        StreamEvent::Payload { data, received_at } => match ServerMessage::parse(&data) {
            Err(err) => {
                let effects = vec![RenderEffect::AppendParseError {
                    error: err.error,
                    raw: err.raw,
                }];

                (state, effects)
            }
            Ok(ServerMessage::Statistics(stats)) => (
                OperationState::Streaming,
                vec![RenderEffect::AppendStatistics(stats)],
            ),
            Ok(ServerMessage::Completed { message }) => (
                OperationState::Completed,
                vec![
                    RenderEffect::AppendCompleted(message),
                    RenderEffect::CloseConnection,
                ],
            ),
            Ok(ServerMessage::Task(task)) => {
                let line = TaskLine {
                    task_id: task.task_id,
                    status: task.status,
                    message: task.message,
                    received_at,
                };

                (
                    OperationState::Streaming,
                    vec![RenderEffect::AppendTaskLine(line), RenderEffect::HideStatus],
                )
            }
        },
        StreamEvent::TransportError(_) => {
            let effects = vec![
                RenderEffect::CloseConnection,
                RenderEffect::ShowStatus(StatusUpdate {
                    text: String::from("Operation interrupted or failed"),
                    kind: StatusKind::Error,
                    auto_hide: Some(STATUS_AUTO_HIDE),
                }),
            ];

            (OperationState::Errored, effects)
        }
    }
}
