use super::{
    message::Statistics,
    region::OperationRegion,
    reducer::{StatusKind, TaskLine},
};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLine {
    /// State tag of the message, used for styling.
    pub status: String,
    pub text: String,
}

/// Accumulated lines of one backend task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskGroup {
    pub task_id: Option<String>,
    /// Status of the latest message.
    pub status: String,
    pub lines: Vec<GroupLine>,
}

impl TaskGroup {
    pub fn header(&self) -> String {
        format!("Task: {}", self.task_id.as_deref().unwrap_or("-"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputBlock {
    TaskGroup(TaskGroup),
    Statistics(Statistics),
    Completed(String),
    ParseError(String),
}

/// In-memory model of an output region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputLog {
    blocks: Vec<OutputBlock>,
    groups: HashMap<Option<String>, usize>,
}

impl OutputLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.groups.clear();
    }

    pub fn blocks(&self) -> &[OutputBlock] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn group(&self, task_id: Option<&str>) -> Option<&TaskGroup> {
        let index = *self.groups.get(&task_id.map(str::to_string))?;

        match &self.blocks[index] {
            OutputBlock::TaskGroup(group) => Some(group),
            _ => None,
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = &TaskGroup> {
        self.blocks.iter().filter_map(|block| match block {
            OutputBlock::TaskGroup(group) => Some(group),
            _ => None,
        })
    }

    pub fn append_task_line(&mut self, line: &TaskLine) {
        let entry = GroupLine {
            status: line.status.clone(),
            text: line.stamped(),
        };

        if let Some(&index) = self.groups.get(&line.task_id) {
            if let OutputBlock::TaskGroup(group) = &mut self.blocks[index] {
                group.status = line.status.clone();
                group.lines.push(entry);

                return;
            }
        }

        self.groups.insert(line.task_id.clone(), self.blocks.len());
        self.blocks.push(OutputBlock::TaskGroup(TaskGroup {
            task_id: line.task_id.clone(),
            status: line.status.clone(),
            lines: vec![entry],
        }));
    }

    pub fn append_statistics(&mut self, stats: Statistics) {
        self.blocks.push(OutputBlock::Statistics(stats));
    }

    pub fn append_completed(&mut self, message: &str) {
        self.blocks.push(OutputBlock::Completed(message.to_string()));
    }

    pub fn append_parse_error(&mut self, error: &str, raw: &str) {
        self.blocks.push(OutputBlock::ParseError(format!(
            "Payload parse error: {error}\nRaw payload: {raw}"
        )));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusBanner {
    pub text: String,
    pub kind: Option<StatusKind>,
    pub visible: bool,
}

/// [`OperationRegion`] that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryRegion {
    output: Mutex<OutputLog>,
    status: Mutex<StatusBanner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryRegion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> OutputLog {
        lock(&self.output).clone()
    }

    pub fn status(&self) -> StatusBanner {
        lock(&self.status).clone()
    }
}

impl OperationRegion for MemoryRegion {
    fn clear(&self) {
        lock(&self.output).clear();
    }

    fn append_task_line(&self, line: &TaskLine) {
        lock(&self.output).append_task_line(line);
    }

    fn append_statistics(&self, stats: &Statistics) {
        lock(&self.output).append_statistics(*stats);
    }

    fn append_completed(&self, message: &str) {
        lock(&self.output).append_completed(message);
    }

    fn append_parse_error(&self, error: &str, raw: &str) {
        lock(&self.output).append_parse_error(error, raw);
    }

    fn show_status(&self, text: &str, kind: StatusKind) {
        *lock(&self.status) = StatusBanner {
            text: text.to_string(),
            kind: Some(kind),
            visible: true,
        };
    }

    fn hide_status(&self) {
        lock(&self.status).visible = false;
    }
}
