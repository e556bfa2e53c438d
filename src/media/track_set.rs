//! A loose set of tracks or an album

use super::{AlbumTag, Downloadable, Track, TransferContext};
use crate::error::{Error, Result};
use crate::event::{
    Event, EventKind, EventPayload, EventSource, Listener, ListenerSlot, Source, SourceId,
};
use crate::save::{SaveOptions, mime};
use crate::transfer::{BundleTransfer, Transfer};
use crate::types::TransferOutcome;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use url::Url;

/// Tracks downloaded together by one bundle
///
/// A loose set only groups tracks of one artist. An album additionally has
/// a title and optional cover art, and tags every track added to it.
pub struct TrackSet {
    source: Source,
    url: Url,
    artist: Option<String>,
    album: Option<AlbumInfo>,
    context: TransferContext,
    listener: ListenerSlot,
    tracks: RwLock<Vec<Arc<Track>>>,
    bundle: Mutex<Option<SourceId>>,
    downloaded: AtomicBool,
}

struct AlbumInfo {
    title: String,
    cover_art: Option<TransferOutcome>,
}

impl TrackSet {
    /// Create a loose set of tracks found on the page at `url`
    pub fn loose(url: Url, context: TransferContext) -> Self {
        Self {
            source: Source::item(format!("TrackSet[{url}]")),
            url,
            artist: None,
            album: None,
            context,
            listener: ListenerSlot::new(),
            tracks: RwLock::new(Vec::new()),
            bundle: Mutex::new(None),
            downloaded: AtomicBool::new(false),
        }
    }

    /// Create an album found on the page at `url`
    pub fn album(url: Url, title: impl Into<String>, context: TransferContext) -> Self {
        let title = title.into();
        Self {
            source: Source::item(format!("Album[{title}]")),
            album: Some(AlbumInfo {
                title,
                cover_art: None,
            }),
            ..Self::loose(url, context)
        }
    }

    /// Set the artist of the whole set
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    /// Attach album cover art; ignored for loose sets
    pub fn with_cover_art(mut self, cover: TransferOutcome) -> Self {
        if let Some(album) = self.album.as_mut() {
            album.cover_art = Some(cover);
        }
        self
    }

    /// Add a track, tagging it with the album if this set is one
    ///
    /// Album tracks without cover art of their own take the album's.
    pub fn add(&self, track: Track) -> Arc<Track> {
        let track = match self.album_tag() {
            Some(tag) => track.with_album(tag),
            None => track,
        };
        let track = match self.cover_art() {
            Some(cover) if track.cover_art().is_none() => track.with_cover_art(cover.clone()),
            _ => track,
        };
        let track = Arc::new(track);
        self.tracks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&track));
        track
    }

    /// Tracks in insertion order
    pub fn tracks(&self) -> Vec<Arc<Track>> {
        self.tracks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Page the set was read from
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Artist of the set
    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }

    /// Whether this set is an album
    pub fn is_album(&self) -> bool {
        self.album.is_some()
    }

    /// Album title
    pub fn title(&self) -> Option<&str> {
        self.album.as_ref().map(|a| a.title.as_str())
    }

    /// Album cover art
    pub fn cover_art(&self) -> Option<&TransferOutcome> {
        self.album.as_ref().and_then(|a| a.cover_art.as_ref())
    }

    fn album_tag(&self) -> Option<AlbumTag> {
        self.album.as_ref().map(|album| AlbumTag {
            title: Some(album.title.clone()),
            artist: self.artist.clone(),
        })
    }

    fn trigger(&self, kind: EventKind, payload: EventPayload) {
        self.listener
            .emit(Event::new(self.source.clone(), kind, payload));
    }

    fn on_event(&self, event: &Event) {
        if event.kind() != EventKind::DownloadFinished {
            return;
        }
        let bundle = *self.bundle.lock().unwrap_or_else(PoisonError::into_inner);
        if bundle == Some(event.original_source().id()) {
            self.downloaded.store(true, Ordering::Release);
        }
    }

    async fn save_cover_art(&self, folder: &std::path::Path) {
        let Some(cover) = self.cover_art() else {
            return;
        };
        let extension = cover
            .content_type()
            .and_then(mime::extension_for)
            .unwrap_or("jpg");
        let path = folder.join(format!("cover.{extension}"));

        self.trigger(
            EventKind::SaveStart,
            EventPayload::Message(format!("saving cover art [{}]", path.display())),
        );
        match tokio::fs::write(&path, cover.payload()).await {
            Ok(()) => self.trigger(EventKind::SaveFinished, EventPayload::Path(path)),
            Err(e) => {
                tracing::warn!(set = %self, path = ?path, error = %e, "failed to save cover art");
                self.listener.emit(Event::error(
                    self.source.clone(),
                    Error::Save {
                        path,
                        reason: format!("unable to save cover art: {e}"),
                    },
                ));
            }
        }
    }
}

impl Listener for TrackSet {
    fn event(&self, event: Event) {
        self.on_event(&event);
        self.listener.forward(&self.source, event);
    }
}

impl EventSource for TrackSet {
    fn listener(&self, listener: Arc<dyn Listener>) {
        self.listener.set_or_chain(listener);
    }

    fn parent_listener(&self, parent: Arc<dyn Listener>) {
        self.listener.set_parent(parent);
    }
}

#[async_trait]
impl Downloadable for TrackSet {
    fn source(&self) -> &Source {
        &self.source
    }

    fn download(self: Arc<Self>) -> Result<Arc<dyn Transfer>> {
        let pool_size = self.context.config.transfer.bundle_pool_size;
        let bundle = BundleTransfer::new(Arc::clone(&self) as Arc<dyn Downloadable>, pool_size)?;
        *self.bundle.lock().unwrap_or_else(PoisonError::into_inner) = Some(bundle.source().id());
        bundle.listener(Arc::clone(&self) as Arc<dyn Listener>);

        for track in self.tracks() {
            bundle.add(track.download()?)?;
        }

        tracing::debug!(set = %self, tracks = bundle.children().len(), pool_size, "track set transfer built");
        Ok(Arc::new(bundle))
    }

    fn is_downloaded(&self) -> bool {
        self.downloaded.load(Ordering::Acquire)
    }

    async fn save(self: Arc<Self>, options: &SaveOptions) -> Result<()> {
        // Keeps the bundle, and with it the path of the tracks' save events, alive
        let _transfer = if self.is_downloaded() {
            None
        } else {
            let transfer = Arc::clone(&self).download()?;
            transfer.wait_till_finished().await;
            Some(transfer)
        };

        let folder = options.set_folder(&self);
        self.trigger(
            EventKind::SaveStart,
            EventPayload::Message(format!("saving {} into folder [{}]", self, folder.display())),
        );
        if let Err(e) = tokio::fs::create_dir_all(&folder).await {
            let reason = e.to_string();
            self.listener.emit(Event::error(
                self.source.clone(),
                Error::Save {
                    path: folder.clone(),
                    reason: reason.clone(),
                },
            ));
            return Err(Error::Save {
                path: folder,
                reason,
            });
        }

        let track_options = options.copy_with_root(&folder);
        let mut failed = 0usize;
        for track in self.tracks() {
            if let Err(e) = Arc::clone(&track).save(&track_options).await {
                failed += 1;
                tracing::warn!(set = %self, track = %track, error = %e, "track not saved");
            }
        }

        if options.save_cover_art_separately() {
            self.save_cover_art(&folder).await;
        }

        tracing::info!(set = %self, folder = ?folder, failed, "track set saved");
        self.trigger(EventKind::SaveFinished, EventPayload::Path(folder));
        Ok(())
    }
}

impl fmt::Display for TrackSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.album {
            Some(album) => write!(f, "Album[{}]", album.title),
            None => write!(f, "TrackSet[{}]", self.url),
        }
    }
}
