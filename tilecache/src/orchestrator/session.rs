//! Session events, reports and the caller-side handle.

use super::state::{ChainState, SessionState};
use crate::coverage::ZoomCoverage;
use crate::fetch::FetchSummary;
use crate::store::ZoomStats;
use crate::tile::{TileRecord, TileVariant};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Events a session reports to its caller, in order.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A batch of tiles became available
    Tiles {
        variant: TileVariant,
        zoom: u8,
        tiles: Vec<TileRecord>,
    },
    /// A chain changed state
    Chain {
        variant: TileVariant,
        state: ChainState,
    },
    /// The session finished
    Completed(SessionReport),
}

/// Sender side of a session's event stream.
pub type SessionSink = mpsc::UnboundedSender<SessionEvent>;

/// One fetch pass run by a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub zoom: u8,
    /// Tiles inside the zoom's rectangle
    pub expected: u64,
    /// Tiles that had no payload for the variant when the pass was planned
    pub planned: usize,
    pub summary: FetchSummary,
}

/// Outcome of one variant's chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    pub variant: TileVariant,
    pub state: ChainState,
    pub passes: Vec<PassReport>,
}

impl ChainReport {
    pub(crate) fn new(variant: TileVariant) -> Self {
        Self {
            variant,
            state: ChainState::Pending,
            passes: Vec::new(),
        }
    }

    pub fn downloaded(&self) -> usize {
        self.passes.iter().map(|p| p.summary.downloaded).sum()
    }

    pub fn failed(&self) -> usize {
        self.passes.iter().map(|p| p.summary.failed).sum()
    }
}

/// Everything a finished session did.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub region: String,
    pub coverage: Vec<ZoomCoverage>,
    pub chains: Vec<ChainReport>,
    /// Store counts per zoom after the session
    pub final_stats: Vec<ZoomStats>,
    pub elapsed: Duration,
}

impl SessionReport {
    pub fn chain(&self, variant: TileVariant) -> Option<&ChainReport> {
        self.chains.iter().find(|c| c.variant == variant)
    }

    pub fn downloaded(&self) -> usize {
        self.chains.iter().map(|c| c.downloaded()).sum()
    }

    pub fn failed(&self) -> usize {
        self.chains.iter().map(|c| c.failed()).sum()
    }
}

/// Caller-side handle to a running session.
///
/// Dropping the handle does not stop the session; call [`cancel`](Self::cancel)
/// for that.
#[derive(Debug)]
pub struct SessionHandle {
    region: String,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
    task: JoinHandle<SessionReport>,
}

impl SessionHandle {
    pub(crate) fn new(
        region: String,
        events: mpsc::UnboundedReceiver<SessionEvent>,
        state: watch::Receiver<SessionState>,
        cancel: CancellationToken,
        task: JoinHandle<SessionReport>,
    ) -> Self {
        Self {
            region,
            events,
            state,
            cancel,
            task,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Current session phase.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// A receiver that observes every phase change.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Next event, or `None` once the session has finished and the stream
    /// is drained.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Stops chains from starting further passes. Running passes finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for the session to finish, discarding unread events.
    pub async fn wait(self) -> Result<SessionReport, JoinError> {
        self.task.await
    }
}
