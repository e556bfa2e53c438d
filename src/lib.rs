//! # media-dl
//!
//! Download orchestration library for remotely hosted media collections.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Observable** - every node of a download tree reports events up a listener chain
//! - **Resumable** - single transfers continue from the last byte after transient failures
//! - **Bounded** - bundles fan their children out over a fixed-size worker pool
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{
//!     ChannelListener, Config, Downloadable, EventSource, SaveOptions, Track, TrackSet,
//!     TransferContext,
//! };
//! use std::sync::Arc;
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = TransferContext::new(Config::default())?;
//!
//!     let album = TrackSet::album(Url::parse("https://band.example.com/album/debut")?, "Debut", context.clone())
//!         .with_artist("Band");
//!     album.add(
//!         Track::new("Intro", Url::parse("https://cdn.example.com/1.mp3")?, context.clone())
//!             .with_index(1),
//!     );
//!     let album = Arc::new(album);
//!
//!     // Subscribe to events
//!     let (listener, mut events) = ChannelListener::channel();
//!     album.listener(listener);
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             println!("Event: {}", event);
//!         }
//!     });
//!
//!     album.save(&SaveOptions::new("downloads")).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Events and the listener chain
pub mod event;
/// Downloadable media items (decomposed into focused submodules)
pub mod media;
/// Page readers
pub mod reader;
/// Retry classification and backoff
pub mod retry;
/// Saving, naming and MIME lookup
pub mod save;
/// Transfers: single and bundled downloads
pub mod transfer;
/// Core value types
pub mod types;

// Re-export commonly used types
pub use config::{Config, SaveConfig, TransferConfig};
pub use error::{Error, Result};
pub use event::{
    ChannelListener, Event, EventKind, EventPayload, EventSource, FnListener, Listener, Source,
    SourceId, SourceKind,
};
pub use media::{AlbumTag, Discography, Downloadable, Track, TrackSet, TransferContext};
pub use reader::{Reader, ReaderEvents, ReaderRegistry};
pub use retry::RetryPolicy;
pub use save::SaveOptions;
pub use transfer::{BundleTransfer, HttpFetcher, RangeFetcher, SingleTransfer, Transfer};
pub use types::{Progress, TransferOutcome};
