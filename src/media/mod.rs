//! Downloadable media items
//!
//! - [`Track`] - a single file, downloaded by one [`SingleTransfer`](crate::transfer::SingleTransfer)
//! - [`TrackSet`] - a loose set of tracks or an album, downloaded as one bundle
//! - [`Discography`] - albums of one artist, a bundle of album bundles
//!
//! Every item is the first listener of the transfer it builds, so it learns
//! about its own completion before anything further up the chain does.

mod discography;
mod track;
mod track_set;


pub use discography::Discography;
pub use track::{AlbumTag, Track};
pub use track_set::TrackSet;

use crate::config::Config;
use crate::error::Result;
use crate::event::{EventSource, Listener, Source};
use crate::retry::RetryPolicy;
use crate::save::SaveOptions;
use crate::transfer::{HttpFetcher, RangeFetcher, Transfer};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// An item that can be downloaded and saved
///
/// Listener registration on an item never replaces an earlier one: later
/// listeners are linked behind the first.
#[async_trait]
pub trait Downloadable: Listener + EventSource + Send + Sync {
    /// Identity used as event source
    fn source(&self) -> &Source;

    /// Build the transfer graph downloading this item, with the item wired
    /// in as the transfer's first listener
    ///
    /// The transfer is returned unstarted.
    fn download(self: Arc<Self>) -> Result<Arc<dyn Transfer>>;

    /// Whether a download of this item has finished, successfully or not
    fn is_downloaded(&self) -> bool;

    /// Write the item below `options.root()`, downloading it first if needed
    async fn save(self: Arc<Self>, options: &SaveOptions) -> Result<()>;
}

/// Everything an item needs to build its transfers
#[derive(Clone)]
pub struct TransferContext {
    /// Network access
    pub fetcher: Arc<dyn RangeFetcher>,
    /// Retry ceiling and backoff of single transfers
    pub retry: RetryPolicy,
    /// Settings (pool sizes, save options)
    pub config: Arc<Config>,
}

impl TransferContext {
    /// Validate the configuration and build an HTTP backed context
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(&config.transfer)?;
        Ok(Self {
            fetcher: Arc::new(fetcher),
            retry: RetryPolicy::from_config(&config.transfer),
            config: Arc::new(config),
        })
    }

    /// Context with a custom fetcher; the configuration is used as given
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn RangeFetcher>) -> Self {
        Self {
            fetcher,
            retry: RetryPolicy::from_config(&config.transfer),
            config: Arc::new(config),
        }
    }

    /// Replace the retry policy
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl fmt::Debug for TransferContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferContext")
            .field("retry", &self.retry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
