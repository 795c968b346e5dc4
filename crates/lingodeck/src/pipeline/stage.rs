//! Job lifecycle stages.

use serde::{Deserialize, Serialize};

/// One phase of the job state machine. Transitions are monotonic
/// (`pending → extracting → transcribing → explaining → ready`) except
/// `error`, which is reachable from any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    Extracting,
    Transcribing,
    Explaining,
    Ready,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Pending => "pending",
            Stage::Extracting => "extracting",
            Stage::Transcribing => "transcribing",
            Stage::Explaining => "explaining",
            Stage::Ready => "ready",
            Stage::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Stage> {
        match s {
            "pending" => Some(Stage::Pending),
            "extracting" => Some(Stage::Extracting),
            "transcribing" => Some(Stage::Transcribing),
            "explaining" => Some(Stage::Explaining),
            "ready" => Some(Stage::Ready),
            "error" => Some(Stage::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Ready | Stage::Error)
    }

    /// Human-readable description for presentation layers.
    pub fn description(&self) -> &'static str {
        match self {
            Stage::Pending => "Waiting to start...",
            Stage::Extracting => "Extracting audio...",
            Stage::Transcribing => "Transcribing audio to text...",
            Stage::Explaining => "Generating explanations...",
            Stage::Ready => "Processing complete",
            Stage::Error => "Processing failed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
