//! Page readers and the registry picking one by host name
//!
//! A [`Reader`] turns the URL of a page into a [`Downloadable`] item tree.
//! Site specific readers live outside this crate and are plugged into a
//! [`ReaderRegistry`].

use crate::error::{Error, Result};
use crate::event::{Event, EventKind, EventPayload, EventSource, Listener, ListenerSlot, Source};
use crate::media::{Downloadable, TransferContext};
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Turns a page URL into a downloadable item
#[async_trait]
pub trait Reader: Send + Sync {
    /// Short name used in logs and status events
    fn name(&self) -> &str;

    /// Whether this reader understands `url`
    fn handles(&self, url: &Url) -> bool;

    /// Read the page and build the item tree
    ///
    /// Progress is reported through `events`; the returned item is not
    /// downloaded yet.
    async fn read(
        &self,
        url: &Url,
        context: &TransferContext,
        events: &ReaderEvents,
    ) -> Result<Arc<dyn Downloadable>>;
}

/// Status reporting handle passed to a reader
pub struct ReaderEvents {
    source: Source,
    listener: Option<Arc<dyn Listener>>,
}

impl ReaderEvents {
    fn trigger(&self, kind: EventKind, payload: EventPayload) {
        if let Some(listener) = &self.listener {
            listener.event(Event::new(self.source.clone(), kind, payload));
        }
    }

    /// Report what the reader is doing
    pub fn status(&self, message: impl Into<String>) {
        self.trigger(EventKind::ReaderStatus, EventPayload::Message(message.into()));
    }

    /// Report that all sub items of a page were found
    pub fn sub_items_found(&self, count: usize) {
        self.trigger(EventKind::SubItemsFound, EventPayload::Count(count));
    }

    /// Report an item that will be skipped
    pub fn disqualified(&self, reason: impl Into<String>) {
        self.trigger(EventKind::ItemDisqualified, EventPayload::Message(reason.into()));
    }

    /// Report a recoverable problem (e.g. a track that could not be interpreted)
    pub fn error(&self, error: Error) {
        if let Some(listener) = &self.listener {
            listener.event(Event::error(self.source.clone(), error));
        }
    }
}

/// Whether the host of `url` is `domain` or one of its subdomains
///
/// ```
/// use media_dl::reader::host_matches;
/// use url::Url;
///
/// let url = Url::parse("https://Artist.Bandcamp.com/album/x").unwrap();
/// assert!(host_matches(&url, "bandcamp.com"));
/// assert!(!host_matches(&url, "camp.com"));
/// ```
pub fn host_matches(url: &Url, domain: &str) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    let domain = domain.to_ascii_lowercase();
    host == domain
        || host
            .strip_suffix(domain.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Picks the first registered reader that handles a URL
pub struct ReaderRegistry {
    source: Source,
    readers: Vec<Arc<dyn Reader>>,
    context: TransferContext,
    listener: ListenerSlot,
}

impl ReaderRegistry {
    /// Create an empty registry whose items download through `context`
    pub fn new(context: TransferContext) -> Self {
        Self {
            source: Source::reader("reader registry"),
            readers: Vec::new(),
            context,
            listener: ListenerSlot::new(),
        }
    }

    /// Register a reader; earlier registrations take precedence
    pub fn register(&mut self, reader: Arc<dyn Reader>) {
        tracing::debug!(reader = reader.name(), "reader registered");
        self.readers.push(reader);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_reader(mut self, reader: Arc<dyn Reader>) -> Self {
        self.register(reader);
        self
    }

    /// Reader responsible for `url`
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoReader`] when no registered reader handles it.
    pub fn reader_for(&self, url: &Url) -> Result<Arc<dyn Reader>> {
        self.readers
            .iter()
            .find(|reader| reader.handles(url))
            .cloned()
            .ok_or_else(|| Error::NoReader(url.to_string()))
    }

    /// Read `url` with the responsible reader
    ///
    /// The registry's listener is registered on the returned item, so the
    /// item's download and save events reach the same receiver as the
    /// reader's status events.
    pub async fn read(&self, url: &Url) -> Result<Arc<dyn Downloadable>> {
        let reader = self.reader_for(url)?;
        let events = ReaderEvents {
            source: self.source.clone(),
            listener: self.listener.get(),
        };

        tracing::info!(url = %url, reader = reader.name(), "reading page");
        events.status(format!("reading {url} with {}", reader.name()));
        let item = reader.read(url, &self.context, &events).await?;

        if let Some(listener) = self.listener.get() {
            item.listener(listener);
        }
        Ok(item)
    }

    /// Parse `url` and [`read`](Self::read) it
    pub async fn read_str(&self, url: &str) -> Result<Arc<dyn Downloadable>> {
        let url = Url::parse(url)?;
        self.read(&url).await
    }
}

impl EventSource for ReaderRegistry {
    fn listener(&self, listener: Arc<dyn Listener>) {
        self.listener.set_or_chain(listener);
    }
}
