//! Progress reporting from background operations to the owner thread.

mod poller;
mod snapshot;

pub use poller::{FinishFlag, PollerHandle, ProgressCallback, ProgressPoller, ProgressSource};
pub use snapshot::{Outcome, ProgressSnapshot};
