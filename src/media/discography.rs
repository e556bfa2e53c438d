//! Albums of one artist

use super::{Downloadable, TrackSet, TransferContext};
use crate::error::Result;
use crate::event::{
    Event, EventKind, EventPayload, EventSource, Listener, ListenerSlot, Source, SourceId,
};
use crate::save::SaveOptions;
use crate::transfer::{BundleTransfer, Transfer};
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use url::Url;

/// A bundle of album bundles
///
/// Albums are downloaded through a pool of `discography_pool_size` (default
/// one), while each album runs its own tracks through its own pool.
pub struct Discography {
    source: Source,
    url: Url,
    context: TransferContext,
    listener: ListenerSlot,
    albums: RwLock<Vec<Arc<TrackSet>>>,
    bundle: Mutex<Option<SourceId>>,
    downloaded: AtomicBool,
}

impl Discography {
    /// Create an empty discography read from `url`
    pub fn new(url: Url, context: TransferContext) -> Self {
        Self {
            source: Source::item(format!("Discography[{url}]")),
            url,
            context,
            listener: ListenerSlot::new(),
            albums: RwLock::new(Vec::new()),
            bundle: Mutex::new(None),
            downloaded: AtomicBool::new(false),
        }
    }

    /// Add an album
    pub fn add(&self, album: TrackSet) -> Arc<TrackSet> {
        let album = Arc::new(album);
        self.albums
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&album));
        album
    }

    /// Albums in insertion order
    pub fn albums(&self) -> Vec<Arc<TrackSet>> {
        self.albums
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Page the discography was read from
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn trigger(&self, kind: EventKind, payload: EventPayload) {
        self.listener
            .emit(Event::new(self.source.clone(), kind, payload));
    }
}

impl Listener for Discography {
    fn event(&self, event: Event) {
        if event.kind() == EventKind::DownloadFinished
            && *self.bundle.lock().unwrap_or_else(PoisonError::into_inner)
                == Some(event.original_source().id())
        {
            self.downloaded.store(true, Ordering::Release);
        }
        self.listener.forward(&self.source, event);
    }
}

impl EventSource for Discography {
    fn listener(&self, listener: Arc<dyn Listener>) {
        self.listener.set_or_chain(listener);
    }

    fn parent_listener(&self, parent: Arc<dyn Listener>) {
        self.listener.set_parent(parent);
    }
}

#[async_trait]
impl Downloadable for Discography {
    fn source(&self) -> &Source {
        &self.source
    }

    fn download(self: Arc<Self>) -> Result<Arc<dyn Transfer>> {
        let pool_size = self.context.config.transfer.discography_pool_size;
        let bundle = BundleTransfer::new(Arc::clone(&self) as Arc<dyn Downloadable>, pool_size)?;
        *self.bundle.lock().unwrap_or_else(PoisonError::into_inner) = Some(bundle.source().id());
        bundle.listener(Arc::clone(&self) as Arc<dyn Listener>);

        for album in self.albums() {
            bundle.add(album.download()?)?;
        }

        Ok(Arc::new(bundle))
    }

    fn is_downloaded(&self) -> bool {
        self.downloaded.load(Ordering::Acquire)
    }

    async fn save(self: Arc<Self>, options: &SaveOptions) -> Result<()> {
        let _transfer = if self.is_downloaded() {
            None
        } else {
            let transfer = Arc::clone(&self).download()?;
            transfer.wait_till_finished().await;
            Some(transfer)
        };

        let albums = self.albums();
        self.trigger(
            EventKind::SaveStart,
            EventPayload::Message(format!("saving discography with {} albums", albums.len())),
        );
        for album in albums {
            if let Err(e) = Arc::clone(&album).save(options).await {
                tracing::warn!(discography = %self, album = %album, error = %e, "album not saved");
            }
        }
        self.trigger(
            EventKind::SaveFinished,
            EventPayload::Path(options.root().to_path_buf()),
        );
        Ok(())
    }
}

impl fmt::Display for Discography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Discography[{}]", self.url)
    }
}
