//! Session and chain state machines.

use std::fmt;

/// Phase of a region download session.
///
/// ```text
/// Idle → ComputingBaseline → InitializingCoverage → Fetching → Done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    ComputingBaseline,
    InitializingCoverage,
    Fetching,
    Done,
}

impl SessionState {
    pub fn is_done(&self) -> bool {
        matches!(self, SessionState::Done)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::ComputingBaseline => "computing baseline",
            SessionState::InitializingCoverage => "initializing coverage",
            SessionState::Fetching => "fetching",
            SessionState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Progress of one variant's walk over the zoom range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Pending,
    /// A fetch pass is running at this zoom
    Fetching { zoom: u8 },
    /// Every zoom was planned and fetched
    Completed,
    /// Planning or a pass failed at this zoom; later zooms were not tried
    Stalled { zoom: u8 },
    /// Cancelled before finishing
    Cancelled,
}

impl ChainState {
    /// True once the chain will make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChainState::Completed | ChainState::Stalled { .. } | ChainState::Cancelled
        )
    }
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainState::Pending => f.write_str("pending"),
            ChainState::Fetching { zoom } => write!(f, "fetching zoom {}", zoom),
            ChainState::Completed => f.write_str("completed"),
            ChainState::Stalled { zoom } => write!(f, "stalled at zoom {}", zoom),
            ChainState::Cancelled => f.write_str("cancelled"),
        }
    }
}
