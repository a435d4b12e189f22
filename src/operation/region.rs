use super::{
    kind::OperationType,
    message::Statistics,
    reducer::{StatusKind, TaskLine},
};
use std::sync::Arc;

/// View side of one operation type: its output log and its status banner.
///
/// Called while the controller holds its slot lock, so implementations must not block.
pub trait OperationRegion: Send + Sync {
    fn clear(&self);

    fn append_task_line(&self, line: &TaskLine);

    fn append_statistics(&self, stats: &Statistics);

    fn append_completed(&self, message: &str);

    fn append_parse_error(&self, error: &str, raw: &str);

    fn show_status(&self, text: &str, kind: StatusKind);

    fn hide_status(&self);
}

/// Region handles of every [`OperationType`], registered once at setup.
#[derive(Clone)]
pub struct Regions {
    handles: [Arc<dyn OperationRegion>; OperationType::COUNT],
}

impl Regions {
    pub fn from_fn<F>(mut f: F) -> Self
    where
        F: FnMut(OperationType) -> Arc<dyn OperationRegion>,
    {
        Self {
            handles: std::array::from_fn(|i| f(OperationType::ALL[i])),
        }
    }

    pub fn get(&self, ty: OperationType) -> &Arc<dyn OperationRegion> {
        &self.handles[ty.index()]
    }
}
