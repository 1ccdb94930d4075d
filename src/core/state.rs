//! Build run state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Phase of a single build run
///
/// Runs move forward through the phases in declaration order; optional
/// phases are skipped when their feature is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildPhase {
    /// Resolving name, output directory and optimization options
    Initializing,
    /// Sources and dependencies flowing through split/optimize/rejoin
    Streaming,
    /// Sources and dependencies combined into one stream
    Merging,
    Bundling,
    Prefetching,
    /// Items being committed to the output directory
    Writing,
    /// Output fully flushed, service worker being generated
    ServiceWorker,
    Complete,
    Failed,
}

impl BuildPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildPhase::Complete | BuildPhase::Failed)
    }
}

/// State of one build run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildState {
    /// Unique run ID
    pub execution_id: Uuid,

    /// Build variant name
    pub name: String,

    /// Current phase
    pub phase: BuildPhase,

    pub started_at: Option<DateTime<Utc>>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Number of files committed to disk
    pub files_written: usize,
}

impl BuildState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            name: name.into(),
            phase: BuildPhase::Initializing,
            started_at: None,
            completed_at: None,
            files_written: 0,
        }
    }

    /// Mark the run as started
    pub fn start(&mut self) {
        self.phase = BuildPhase::Initializing;
        self.started_at = Some(Utc::now());
    }

    /// Move to the next phase. Going backwards or leaving a terminal phase is
    /// refused and reported as `false`.
    pub fn advance(&mut self, phase: BuildPhase) -> bool {
        if self.phase.is_terminal() || phase < self.phase {
            return false;
        }
        self.phase = phase;
        true
    }

    pub fn complete(&mut self) {
        self.phase = BuildPhase::Complete;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self) {
        self.phase = BuildPhase::Failed;
        self.completed_at = Some(Utc::now());
    }
}
