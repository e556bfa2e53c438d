//! Common test utilities for media-dl integration tests

use async_trait::async_trait;
use media_dl::reader::host_matches;
use media_dl::{
    Config, Downloadable, Event, EventKind, Reader, ReaderEvents, Result, Track, TrackSet,
    TransferContext,
};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Album page as served by the mock site
#[derive(Debug, Deserialize)]
pub struct AlbumPage {
    pub artist: String,
    pub title: String,
    #[serde(default)]
    pub cover: Option<String>,
    pub tracks: Vec<TrackEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TrackEntry {
    pub title: String,
    pub path: String,
}

/// Reads JSON album pages served under `/album/`
pub struct JsonAlbumReader {
    pub host: String,
}

#[async_trait]
impl Reader for JsonAlbumReader {
    fn name(&self) -> &str {
        "json album"
    }

    fn handles(&self, url: &Url) -> bool {
        host_matches(url, &self.host) && url.path().starts_with("/album/")
    }

    async fn read(
        &self,
        url: &Url,
        context: &TransferContext,
        events: &ReaderEvents,
    ) -> Result<Arc<dyn Downloadable>> {
        let page = context.fetcher.fetch(url).await?;
        let page: AlbumPage = serde_json::from_slice(page.payload())?;

        let mut album = TrackSet::album(url.clone(), page.title, context.clone())
            .with_artist(page.artist.clone());
        if let Some(cover) = &page.cover {
            events.status(format!("fetching cover {cover}"));
            album = album.with_cover_art(context.fetcher.fetch(&url.join(cover)?).await?);
        }

        for (index, entry) in (1u32..).zip(&page.tracks) {
            let track = Track::new(entry.title.clone(), url.join(&entry.path)?, context.clone())
                .with_artist(page.artist.clone())
                .with_index(index);
            album.add(track);
        }
        events.sub_items_found(page.tracks.len());
        Ok(Arc::new(album))
    }
}

/// Configuration with millisecond backoffs so retries stay fast
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.transfer.backoff_unit = Duration::from_millis(1);
    config.transfer.request_timeout = Duration::from_secs(5);
    config
}

/// Serve `body` at `route` with the given content type
pub async fn mount_file(server: &MockServer, route: &str, body: &[u8], content_type: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", content_type)
                .set_body_bytes(body.to_vec()),
        )
        .mount(server)
        .await;
}

/// Serve a JSON album page at `route`
pub async fn mount_album_page(server: &MockServer, route: &str, page: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(page))
        .mount(server)
        .await;
}

/// Everything received so far, without waiting
pub fn drain(rx: &mut UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn count(events: &[Event], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind() == kind).count()
}

/// Audio bytes of a saved track, without its ID3 tag
pub fn audio(path: impl AsRef<Path>) -> Vec<u8> {
    let path = path.as_ref();
    id3::Tag::remove_from_path(path).unwrap();
    std::fs::read(path).unwrap()
}
