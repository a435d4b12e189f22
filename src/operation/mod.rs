//! Operation streams: one server-sent-event connection per [`OperationType`],
//! reduced into render effects for the region registered for that type.
pub mod controller;
pub mod kind;
pub mod message;
pub mod output_log;
pub mod params;
pub mod reducer;
pub mod region;
pub mod terminal;

pub use controller::OperationController;
pub use kind::OperationType;
pub use message::{ServerMessage, Statistics, TaskProgress};
pub use output_log::{MemoryRegion, OutputBlock, OutputLog, StatusBanner, TaskGroup};
pub use params::{OperationParams, ParamValue};
pub use reducer::{OperationState, RenderEffect, StatusKind, StreamEvent};
pub use region::{OperationRegion, Regions};
pub use terminal::TerminalRegion;
