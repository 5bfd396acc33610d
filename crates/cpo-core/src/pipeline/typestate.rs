//! Typestate run lifecycle.
//!
//! Each phase is a zero-sized marker and `PipelineRun<S>` only offers the
//! transitions legal from `S`, so skipping a phase or leaving a terminal
//! state does not compile.
//!
//! ```text
//! Idle ──▶ Fetching ──▶ Normalizing ──▶ Merging ──▶ Done
//!             │              │             │
//!             ▼              ▼             ▼
//!           Failed         Failed        Failed
//! ```

use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use cpo_common::RunId;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Runtime mirror of the phase markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Fetching,
    Normalizing,
    Merging,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Fetching => "fetching",
            RunState::Normalizing => "normalizing",
            RunState::Merging => "merging",
            RunState::Done => "done",
            RunState::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker trait for run phases. Sealed.
pub trait RunPhase: sealed::Sealed {
    const STATE: RunState;
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Idle {}
    impl Sealed for super::Fetching {}
    impl Sealed for super::Normalizing {}
    impl Sealed for super::Merging {}
    impl Sealed for super::Done {}
    impl Sealed for super::Failed {}
}

#[derive(Debug, Clone, Copy)]
pub struct Idle;

#[derive(Debug, Clone, Copy)]
pub struct Fetching;

#[derive(Debug, Clone, Copy)]
pub struct Normalizing;

#[derive(Debug, Clone, Copy)]
pub struct Merging;

#[derive(Debug, Clone, Copy)]
pub struct Done;

#[derive(Debug, Clone, Copy)]
pub struct Failed;

impl RunPhase for Idle {
    const STATE: RunState = RunState::Idle;
}
impl RunPhase for Fetching {
    const STATE: RunState = RunState::Fetching;
}
impl RunPhase for Normalizing {
    const STATE: RunState = RunState::Normalizing;
}
impl RunPhase for Merging {
    const STATE: RunState = RunState::Merging;
}
impl RunPhase for Done {
    const STATE: RunState = RunState::Done;
}
impl RunPhase for Failed {
    const STATE: RunState = RunState::Failed;
}

/// Data carried through every phase of one run. The failure cause itself
/// travels in the run report.
#[derive(Debug, Clone)]
pub struct RunData {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    /// Phase the run failed in, if it failed.
    pub failed_in: Option<RunState>,
}

/// One ETL run with its phase tracked at compile time.
#[derive(Debug)]
pub struct PipelineRun<S: RunPhase> {
    data: RunData,
    _phase: PhantomData<S>,
}

impl<S: RunPhase> PipelineRun<S> {
    pub fn data(&self) -> &RunData {
        &self.data
    }

    pub fn run_id(&self) -> &RunId {
        &self.data.run_id
    }

    pub fn state(&self) -> RunState {
        S::STATE
    }

    fn advance<T: RunPhase>(self) -> PipelineRun<T> {
        let (from, to) = (S::STATE, T::STATE);
        info!(run_id = %self.data.run_id, %from, %to, "phase transition");
        PipelineRun {
            data: self.data,
            _phase: PhantomData,
        }
    }

    fn into_failed(self) -> PipelineRun<Failed> {
        let mut data = self.data;
        data.failed_in = Some(S::STATE);
        PipelineRun {
            data,
            _phase: PhantomData,
        }
    }
}

impl PipelineRun<Idle> {
    pub fn new(run_id: RunId) -> Self {
        Self {
            data: RunData {
                run_id,
                started_at: Utc::now(),
                failed_in: None,
            },
            _phase: PhantomData,
        }
    }

    /// Idle → Fetching.
    pub fn start_fetch(self) -> PipelineRun<Fetching> {
        self.advance()
    }
}

impl PipelineRun<Fetching> {
    /// Fetching → Normalizing.
    pub fn finish_fetch(self) -> PipelineRun<Normalizing> {
        self.advance()
    }

    /// Fetching → Failed.
    pub fn fail(self) -> PipelineRun<Failed> {
        self.into_failed()
    }
}

impl PipelineRun<Normalizing> {
    /// Normalizing → Merging.
    pub fn finish_normalize(self) -> PipelineRun<Merging> {
        self.advance()
    }

    /// Normalizing → Failed.
    pub fn fail(self) -> PipelineRun<Failed> {
        self.into_failed()
    }
}

impl PipelineRun<Merging> {
    /// Merging → Done. Call only once both outputs are durable.
    pub fn complete(self) -> PipelineRun<Done> {
        self.advance()
    }

    /// Merging → Failed.
    pub fn fail(self) -> PipelineRun<Failed> {
        self.into_failed()
    }
}

impl PipelineRun<Failed> {
    pub fn failed_in(&self) -> Option<RunState> {
        self.data.failed_in
    }
}
