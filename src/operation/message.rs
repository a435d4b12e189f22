use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const STATUS_STATISTICS: &str = "statistics";
pub const STATUS_COMPLETED: &str = "completed";

/// A message received on an operation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Aggregate counters reported mid-stream.
    Statistics(Statistics),
    /// Terminal message. Ends the operation.
    Completed { message: String },
    /// Incremental progress line of a single backend task.
    Task(TaskProgress),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default)]
    pub total_executions: u64,
    #[serde(default)]
    pub total_failures: u64,
}

impl Statistics {
    /// Failure percentage with two decimals. `0.00` when nothing was executed.
    pub fn failure_rate(&self) -> String {
        if self.total_executions == 0 {
            return String::from("0.00");
        }

        let rate = self.total_failures as f64 / self.total_executions as f64 * 100.0;

        format!("{rate:.2}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    /// Missing for task-less lines such as backend warnings.
    pub task_id: Option<String>,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Payload parse error: {error}")]
pub struct PayloadParseError {
    pub error: String,
    pub raw: String,
}

/// Renders a scalar JSON value the way it should read on screen.
fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Non-negative whole number, also when sent as `10.0`.
fn counter(value: Option<&Value>) -> Option<u64> {
    let value = value?;

    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

/// Counters of a statistics message. Values under `data` win over top-level ones.
fn statistics(fields: &Map<String, Value>) -> Statistics {
    let nested = fields.get("data").and_then(Value::as_object);
    let read = |key: &str| {
        nested
            .and_then(|data| counter(data.get(key)))
            .or_else(|| counter(fields.get(key)))
            .unwrap_or(0)
    };

    Statistics {
        total_executions: read("total_executions"),
        total_failures: read("total_failures"),
    }
}

impl ServerMessage {
    pub fn parse(raw: &str) -> Result<Self, PayloadParseError> {
        let parse_error = |error: String| PayloadParseError {
            error,
            raw: raw.to_string(),
        };

        let value =
            serde_json::from_str::<Value>(raw).map_err(|err| parse_error(err.to_string()))?;
        let Value::Object(fields) = value else {
            return Err(parse_error(String::from("expected a JSON object")));
        };

        let status = scalar_text(fields.get("status")).unwrap_or_default();
        let message = scalar_text(fields.get("message")).unwrap_or_default();

        match status.as_str() {
            STATUS_STATISTICS => Ok(ServerMessage::Statistics(statistics(&fields))),
            STATUS_COMPLETED => Ok(ServerMessage::Completed { message }),
            _ => Ok(ServerMessage::Task(TaskProgress {
                task_id: scalar_text(fields.get("task_id")),
                status,
                message,
            })),
        }
    }
}
