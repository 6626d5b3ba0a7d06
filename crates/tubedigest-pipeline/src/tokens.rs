//! Run tokens.
//!
//! Each submission that starts a pipeline run takes a token carrying the
//! next generation number. A token is current until a newer one is issued,
//! which lets a slow run discover that it has been overtaken before it
//! commits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Issues monotonically increasing run generations.
#[derive(Debug, Clone, Default)]
pub struct RunTokens {
    latest: Arc<AtomicU64>,
}

impl RunTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token for a new run, superseding every earlier token.
    pub fn issue(&self) -> RunToken {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        RunToken {
            generation,
            latest: Arc::clone(&self.latest),
        }
    }

    /// Generation of the most recently issued token, 0 if none.
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

/// Handle identifying one run's generation.
#[derive(Debug, Clone)]
pub struct RunToken {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl RunToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True while no newer token has been issued.
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.generation
    }
}
