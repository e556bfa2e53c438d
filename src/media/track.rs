//! A single downloadable file

use super::{Downloadable, TransferContext};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, EventPayload, EventSource, Listener, ListenerSlot, Source};
use crate::save::SaveOptions;
use crate::save::tags::{self, TrackTags};
use crate::transfer::{SingleTransfer, Transfer};
use crate::types::TransferOutcome;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// Album a track belongs to, as far as naming and tagging care
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlbumTag {
    /// Album title
    pub title: Option<String>,
    /// Album artist
    pub artist: Option<String>,
}

/// A track: one URL, one file
pub struct Track {
    source: Source,
    title: String,
    url: Url,
    artist: Option<String>,
    index: u32,
    year: Option<String>,
    album: Option<AlbumTag>,
    cover_art: Option<TransferOutcome>,
    context: TransferContext,
    listener: ListenerSlot,
    status: Mutex<DownloadStatus>,
}

#[derive(Default)]
struct DownloadStatus {
    finished: bool,
    outcome: Option<TransferOutcome>,
}

impl Track {
    /// Create a track downloaded from `url`
    pub fn new(title: impl Into<String>, url: Url, context: TransferContext) -> Self {
        let title = title.into();
        Self {
            source: Source::item(format!("[Track:{title}]")),
            title,
            url,
            artist: None,
            index: 0,
            year: None,
            album: None,
            cover_art: None,
            context,
            listener: ListenerSlot::new(),
            status: Mutex::new(DownloadStatus::default()),
        }
    }

    /// Set the track artist
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    /// Set the position within the album (1-based)
    pub fn with_index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    /// Set the release year
    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    /// Mark the track as part of an album
    pub fn with_album(mut self, album: AlbumTag) -> Self {
        self.album = Some(album);
        self
    }

    /// Attach cover art specific to this track
    pub fn with_cover_art(mut self, cover: TransferOutcome) -> Self {
        self.cover_art = Some(cover);
        self
    }

    /// Track title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Download URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Track artist
    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }

    /// Position within the album
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Release year
    pub fn year(&self) -> Option<&str> {
        self.year.as_deref()
    }

    /// Album the track belongs to
    pub fn album(&self) -> Option<&AlbumTag> {
        self.album.as_ref()
    }

    /// Cover art attached to the track
    pub fn cover_art(&self) -> Option<&TransferOutcome> {
        self.cover_art.as_ref()
    }

    /// Downloaded content, once a download succeeded
    pub fn outcome(&self) -> Option<TransferOutcome> {
        self.lock_status().outcome.clone()
    }

    /// Content type of the downloaded file
    pub fn mime_type(&self) -> Option<String> {
        self.lock_status()
            .outcome
            .as_ref()
            .and_then(|o| o.content_type().map(str::to_string))
    }

    /// Metadata written into the saved file
    ///
    /// The album artist stands in for a missing track artist; a year that
    /// is not a number is left out.
    pub fn tags(&self) -> TrackTags {
        let album = self.album.as_ref();
        let album_artist = album.and_then(|a| a.artist.clone());
        TrackTags {
            title: Some(self.title.clone()),
            artist: self.artist.clone().or_else(|| album_artist.clone()),
            album: album.and_then(|a| a.title.clone()),
            album_artist,
            track: (self.index > 0).then_some(self.index),
            year: self.year.as_deref().and_then(|y| y.trim().parse().ok()),
            cover: self.cover_art.clone(),
        }
    }

    /// Write the payload next to `path`, tag it, then move it into place
    async fn write_file(
        &self,
        path: &Path,
        outcome: &TransferOutcome,
        options: &SaveOptions,
    ) -> std::io::Result<()> {
        let partial = partial_path(path);
        tokio::fs::write(&partial, outcome.payload()).await?;
        if options.write_tags() && tags::is_taggable(outcome.content_type()) {
            self.tag_file(&partial).await;
        }
        if let Err(e) = tokio::fs::rename(&partial, path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
        Ok(())
    }

    async fn tag_file(&self, path: &Path) {
        let frames = self.tags();
        let target = path.to_path_buf();
        match tokio::task::spawn_blocking(move || tags::apply(&target, &frames)).await {
            Ok(Ok(written)) => tracing::trace!(track = %self, written, "tags applied"),
            Ok(Err(e)) => {
                tracing::warn!(track = %self, error = %e, "failed to tag track, saving it untagged")
            }
            Err(e) => tracing::warn!(track = %self, error = %e, "tagging task ended abnormally"),
        }
    }

    fn lock_status(&self) -> std::sync::MutexGuard<'_, DownloadStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_event(&self, event: &Event) {
        match event.kind() {
            EventKind::Error => {
                self.lock_status().finished = true;
            }
            EventKind::DownloadFinished => {
                let mut status = self.lock_status();
                if let Some(outcome) = event.outcome() {
                    status.outcome = Some(outcome.clone());
                }
                status.finished = true;
            }
            _ => {}
        }
    }

    fn trigger(&self, kind: EventKind, payload: EventPayload) {
        self.listener
            .emit(Event::new(self.source.clone(), kind, payload));
    }

    fn trigger_error(&self, error: Error) {
        self.listener.emit(Event::error(self.source.clone(), error));
    }
}

impl Listener for Track {
    fn event(&self, event: Event) {
        self.on_event(&event);
        self.listener.forward(&self.source, event);
    }
}

impl EventSource for Track {
    fn listener(&self, listener: Arc<dyn Listener>) {
        self.listener.set_or_chain(listener);
    }

    fn parent_listener(&self, parent: Arc<dyn Listener>) {
        self.listener.set_parent(parent);
    }
}

#[async_trait]
impl Downloadable for Track {
    fn source(&self) -> &Source {
        &self.source
    }

    fn download(self: Arc<Self>) -> Result<Arc<dyn Transfer>> {
        let transfer = SingleTransfer::new(
            Arc::clone(&self) as Arc<dyn Downloadable>,
            self.url.clone(),
            Arc::clone(&self.context.fetcher),
            self.context.retry.clone(),
        );
        transfer.listener(self as Arc<dyn Listener>);
        Ok(Arc::new(transfer))
    }

    fn is_downloaded(&self) -> bool {
        self.lock_status().finished
    }

    async fn save(self: Arc<Self>, options: &SaveOptions) -> Result<()> {
        if !self.is_downloaded() {
            let transfer = Arc::clone(&self).download()?;
            transfer.wait_till_finished().await;
        }

        let Some(outcome) = self.outcome() else {
            self.trigger_error(Error::NothingToSave {
                item: self.to_string(),
            });
            return Err(Error::NothingToSave {
                item: self.to_string(),
            });
        };

        let path = options.track_path(&self);
        self.trigger(
            EventKind::SaveStart,
            EventPayload::Message(format!("saving track file [{}]", path.display())),
        );
        if let Err(e) = self.write_file(&path, &outcome, options).await {
            tracing::warn!(track = %self, path = ?path, error = %e, "failed to write track");
            self.trigger_error(Error::Save {
                path: path.clone(),
                reason: e.to_string(),
            });
            return Err(Error::Save {
                path,
                reason: e.to_string(),
            });
        }

        tracing::debug!(track = %self, path = ?path, bytes = outcome.len(), "track saved");
        self.trigger(EventKind::SaveFinished, EventPayload::Path(path));
        Ok(())
    }
}

/// Sibling of `path` the payload is written to before it is complete
fn partial_path(path: &Path) -> PathBuf {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    PathBuf::from(partial)
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Track:{}]", self.title)
    }
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("title", &self.title)
            .field("url", &self.url.as_str())
            .field("index", &self.index)
            .field("album", &self.album)
            .finish_non_exhaustive()
    }
}
