//! Stage lifecycle tracking.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::debug;

/// Lifecycle of one pipeline stage. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StageState {
    /// Taking new work.
    Running,
    /// Input closed or cancelled; finishing in-flight work.
    Draining,
    /// Output closed; nothing further will be produced.
    Closed,
}

impl StageState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Closed => "closed",
        })
    }
}

/// Shared, monotonic state of one stage; safe to advance from any worker.
#[derive(Debug)]
pub struct StageTracker {
    stage: &'static str,
    state: AtomicU8,
}

impl StageTracker {
    pub fn new(stage: &'static str) -> Self {
        debug!(stage, state = %StageState::Running, "stage state");
        Self {
            stage,
            state: AtomicU8::new(StageState::Running as u8),
        }
    }

    pub fn state(&self) -> StageState {
        StageState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `to` if that is forward of the current state.
    ///
    /// Returns `true` for the caller that performed the transition, so each
    /// transition is logged once however many workers race to it.
    pub fn advance(&self, to: StageState) -> bool {
        let target = to as u8;
        let mut current = self.state.load(Ordering::Acquire);
        while current < target {
            match self.state.compare_exchange_weak(
                current,
                target,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    debug!(stage = self.stage, state = %to, "stage state");
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
        false
    }
}
