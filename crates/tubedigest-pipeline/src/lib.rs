//! Cache-first video digest pipeline.
//!
//! Resolves a submitted reference against the record store, runs the four
//! remote stages on a miss, commits the result, and projects the stored
//! history into pages.

pub mod backend;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod resolver;
pub mod session;
pub mod state;
pub mod tokens;

pub use backend::{MockBackend, VideoBackend};
pub use error::{BackendError, PipelineFailure, StageError, SubmitError};
pub use history::{HistoryPage, HistoryProjector, HistorySnapshot};
pub use orchestrator::{Orchestrator, Outcome};
pub use resolver::CacheResolver;
pub use session::{HistoryView, Resolution, Session};
pub use state::{validate_transition, PipelineState, RunProgress, Stage};
pub use tokens::{RunToken, RunTokens};
