//! Transfers: observable units of download work
//!
//! Split into focused submodules:
//! - [`fetch`] - Transport collaborator (ranged and plain HTTP fetches)
//! - [`single`] - One resumable, retried fetch of a single URL
//! - [`bundle`] - Fan-out of child transfers over a bounded worker pool
//!
//! Starting is split by how much of the caller it takes:
//! [`SingleTransfer::run`] drives the whole transfer in the calling task,
//! while [`Transfer::start`] never blocks for either variant.
//! [`Transfer::wait_till_finished`] starts a transfer that was never started.

pub mod bundle;
pub mod fetch;
pub mod single;

#[cfg(test)]
pub(crate) mod test_helpers;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use bundle::{BundleTransfer, DEFAULT_POOL_SIZE};
pub use fetch::{HttpFetcher, RangeFetcher, RangeResponse};
pub use single::{SingleTransfer, TransferState};

use crate::event::{EventSource, Listener, Source};
use crate::media::Downloadable;
use crate::types::Progress;
use async_trait::async_trait;
use std::sync::Arc;

/// Callback handed the owning item once a transfer is finished
pub type FinishedCallback = Box<dyn FnOnce(Arc<dyn Downloadable>) + Send>;

/// A runnable, observable unit of download work owning one subject item
///
/// Registering a listener follows the first-registration-wins rule: a
/// second registration is passed on to the subject's own listener slot
/// instead of replacing the first one.
#[async_trait]
pub trait Transfer: Listener + EventSource + Send + Sync {
    /// Identity used as event source
    fn source(&self) -> &Source;

    /// The item this transfer downloads
    fn subject(&self) -> Arc<dyn Downloadable>;

    /// Kick off the work without waiting for it
    ///
    /// Must be called from within a Tokio runtime. Calling it again, or on a
    /// finished transfer, does nothing.
    fn start(&self);

    /// Start if needed, then resolve once the transfer is finished
    async fn wait_till_finished(&self);

    /// Wait, then call `callback` exactly once with the subject item
    async fn when_finished(&self, callback: FinishedCallback) {
        self.wait_till_finished().await;
        callback(self.subject());
    }

    /// Current progress
    fn progress(&self) -> Progress;

    /// Whether the terminal state was reached
    fn is_finished(&self) -> bool;
}
