use super::{
    kind::OperationType,
    message::Statistics,
    region::OperationRegion,
    reducer::{StatusKind, TaskLine},
};
use std::{
    io::Write,
    sync::{Mutex, PoisonError},
};

/// [`OperationRegion`] that prints one line per update, prefixed with the operation type.
pub struct TerminalRegion<W> {
    ty: OperationType,
    writer: Mutex<W>,
}

impl TerminalRegion<std::io::Stdout> {
    pub fn stdout(ty: OperationType) -> Self {
        Self::new(ty, std::io::stdout())
    }
}

impl<W> TerminalRegion<W>
where
    W: Write + Send,
{
    pub fn new(ty: OperationType, writer: W) -> Self {
        Self {
            ty,
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_line(&self, line: &str) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        for part in line.lines() {
            if let Err(err) = writeln!(writer, "[{}] {part}", self.ty) {
                tracing::warn!(?err, ty = %self.ty, "Failed to write region output");

                return;
            }
        }
    }
}

impl<W> OperationRegion for TerminalRegion<W>
where
    W: Write + Send,
{
    fn clear(&self) {}

    fn append_task_line(&self, line: &TaskLine) {
        let task_id = line.task_id.as_deref().unwrap_or("-");

        self.write_line(&format!("{task_id} ({}) {}", line.status, line.stamped()));
    }

    fn append_statistics(&self, stats: &Statistics) {
        self.write_line(&format!(
            "Statistics: executions {}, failures {} (failure rate {}%)",
            stats.total_executions,
            stats.total_failures,
            stats.failure_rate()
        ));
    }

    fn append_completed(&self, message: &str) {
        self.write_line(&format!("Completed: {message}"));
    }

    fn append_parse_error(&self, error: &str, raw: &str) {
        self.write_line(&format!("Payload parse error: {error}\nRaw payload: {raw}"));
    }

    fn show_status(&self, text: &str, kind: StatusKind) {
        self.write_line(&format!("<{}> {text}", kind.as_str()));
    }

    fn hide_status(&self) {}
}
