//! Pipeline run state machine with validated transitions.
//!
//! Idle -> FetchingMetadata -> ExtractingId -> FetchingTranscript
//!      -> Summarizing -> Done
//! Any running stage -> Failed(that stage)

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One ordered remote step of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FetchingMetadata,
    ExtractingId,
    FetchingTranscript,
    Summarizing,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 4] = [
        Stage::FetchingMetadata,
        Stage::ExtractingId,
        Stage::FetchingTranscript,
        Stage::Summarizing,
    ];

    /// Position in execution order, starting at 0.
    pub fn index(self) -> usize {
        match self {
            Stage::FetchingMetadata => 0,
            Stage::ExtractingId => 1,
            Stage::FetchingTranscript => 2,
            Stage::Summarizing => 3,
        }
    }

    /// The stage that follows this one, if any.
    pub fn next(self) -> Option<Stage> {
        Stage::ALL.get(self.index() + 1).copied()
    }

    /// Status line shown while the stage runs.
    pub fn status_line(self) -> &'static str {
        match self {
            Stage::FetchingMetadata => "Getting video details...",
            Stage::ExtractingId => "Extracting video id...",
            Stage::FetchingTranscript => "Fetching transcript...",
            Stage::Summarizing => "Summarizing transcript...",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::FetchingMetadata => write!(f, "fetching_metadata"),
            Stage::ExtractingId => write!(f, "extracting_id"),
            Stage::FetchingTranscript => write!(f, "fetching_transcript"),
            Stage::Summarizing => write!(f, "summarizing"),
        }
    }
}

/// State of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Running(Stage),
    Done,
    Failed(Stage),
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Running(stage) => write!(f, "{}", stage),
            PipelineState::Done => write!(f, "done"),
            PipelineState::Failed(stage) => write!(f, "failed({})", stage),
        }
    }
}

/// Rejected state change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid pipeline transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: PipelineState,
    pub to: PipelineState,
}

/// Validate that a state transition is allowed.
///
/// Valid transitions:
/// - Idle -> Running(FetchingMetadata)
/// - Running(s) -> Running(s.next())
/// - Running(Summarizing) -> Done
/// - Running(s) -> Failed(s)
pub fn validate_transition(from: PipelineState, to: PipelineState) -> Result<(), TransitionError> {
    let valid = match (from, to) {
        (PipelineState::Idle, PipelineState::Running(Stage::FetchingMetadata)) => true,
        (PipelineState::Running(current), PipelineState::Running(next)) => {
            current.next() == Some(next)
        }
        (PipelineState::Running(Stage::Summarizing), PipelineState::Done) => true,
        (PipelineState::Running(current), PipelineState::Failed(failed)) => current == failed,
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// Observable progress of the most recent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunProgress {
    /// `None` before any run started.
    pub run_id: Option<Uuid>,
    pub state: PipelineState,
    pub last_entered: Option<Stage>,
    pub last_completed: Option<Stage>,
    /// Human-readable status line.
    pub message: String,
}

impl RunProgress {
    pub fn idle() -> Self {
        Self {
            run_id: None,
            state: PipelineState::Idle,
            last_entered: None,
            last_completed: None,
            message: String::new(),
        }
    }

    /// Whether the last entered stage finished successfully.
    pub fn last_entered_completed(&self) -> bool {
        self.last_entered.is_some() && self.last_entered == self.last_completed
    }
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::idle()
    }
}
