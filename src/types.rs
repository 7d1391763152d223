use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PrepError;

/// Dataset variant a run operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Train,
    Validate,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Train => "train",
            Mode::Validate => "validate",
        }
    }

    pub fn all() -> [Mode; 2] {
        [Mode::Train, Mode::Validate]
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "train" => Ok(Mode::Train),
            "validate" => Ok(Mode::Validate),
            other => Err(PrepError::Config(format!("unknown mode '{}'", other))),
        }
    }
}

/// Every table the pipeline persists, cleaned or derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Base,
    Patent,
    Money,
    Report,
    Corp,
    Finance,
}

impl TableKind {
    /// The four tables loaded from CSV, in load order.
    pub const SOURCES: [TableKind; 4] = [
        TableKind::Base,
        TableKind::Patent,
        TableKind::Money,
        TableKind::Report,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TableKind::Base => "base",
            TableKind::Patent => "patent",
            TableKind::Money => "money",
            TableKind::Report => "report",
            TableKind::Corp => "corp",
            TableKind::Finance => "finance",
        }
    }

    /// Store key for this table under `mode`, e.g. `base_train`.
    pub fn key(&self, mode: Mode) -> String {
        format!("{}_{}", self.name(), mode)
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
