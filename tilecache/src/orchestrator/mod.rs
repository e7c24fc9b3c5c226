//! Region download orchestration
//!
//! Turns a [`RegionDescriptor`](crate::region::RegionDescriptor) into a
//! sequence of fetch passes: baseline, coverage initialization, then one
//! chain of passes per tile variant.

mod download;
mod session;
mod state;

pub use download::{DownloadOrchestrator, SessionContext};
pub use session::{
    ChainReport, PassReport, SessionEvent, SessionHandle, SessionReport, SessionSink,
};
pub use state::{ChainState, SessionState};
