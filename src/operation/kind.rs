use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Category of backend job. Every type owns its own connection slot,
/// output region and status region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Stop,
    Rsync,
    Update,
    Start,
    Reload,
    Initial,
    Battle,
}

impl OperationType {
    pub const COUNT: usize = 7;

    pub const ALL: [OperationType; Self::COUNT] = [
        OperationType::Stop,
        OperationType::Rsync,
        OperationType::Update,
        OperationType::Start,
        OperationType::Reload,
        OperationType::Initial,
        OperationType::Battle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Stop => "stop",
            OperationType::Rsync => "rsync",
            OperationType::Update => "update",
            OperationType::Start => "start",
            OperationType::Reload => "reload",
            OperationType::Initial => "initial",
            OperationType::Battle => "battle",
        }
    }

    /// Human readable verb used in status banners.
    pub fn verb(&self) -> &'static str {
        match self {
            OperationType::Stop => "stop",
            OperationType::Rsync => "sync",
            OperationType::Update => "update",
            OperationType::Start => "start",
            OperationType::Reload => "hot-reload",
            OperationType::Initial => "deploy",
            OperationType::Battle => "update battle replays",
        }
    }

    pub fn output_region_id(&self) -> String {
        format!("{}_game", self.as_str())
    }

    pub fn status_region_id(&self) -> String {
        format!("{}_status", self.as_str())
    }

    /// Script alias the backend expects for this operation, e.g. `start_game`.
    pub fn default_script(&self) -> String {
        format!("{}_game", self.as_str())
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown operation type: {0}")]
pub struct UnknownOperationType(pub String);

impl FromStr for OperationType {
    type Err = UnknownOperationType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| UnknownOperationType(s.to_string()))
    }
}
