//! Shared test helpers: scripted fetcher, recording listener and stub items.

use super::fetch::{RangeFetcher, RangeResponse};
use super::{SingleTransfer, Transfer};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, EventSource, Listener, ListenerSlot, Source};
use crate::media::{Downloadable, TransferContext};
use crate::retry::{NoBackoff, RetryPolicy};
use crate::save::SaveOptions;
use crate::types::TransferOutcome;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// How a scripted resource answers range requests
#[derive(Clone)]
pub(crate) struct Script {
    body: Bytes,
    content_type: Option<String>,
    chunk: usize,
    transient_failures: u32,
    fail_once_at: Option<u64>,
    status: Option<u16>,
    declare_total: bool,
    delay: Duration,
}

impl Script {
    /// Serve `body` in one response
    pub(crate) fn body(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            content_type: Some("audio/mpeg".to_string()),
            chunk: usize::MAX,
            transient_failures: 0,
            fail_once_at: None,
            status: None,
            declare_total: true,
            delay: Duration::ZERO,
        }
    }

    /// Serve at most `chunk` bytes per response
    pub(crate) fn chunked(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    /// Fail the first `n` requests with a transient error
    pub(crate) fn failing(mut self, n: u32) -> Self {
        self.transient_failures = n;
        self
    }

    /// Fail every request with a transient error
    pub(crate) fn always_failing(self) -> Self {
        self.failing(u32::MAX)
    }

    /// Fail the first request starting at `offset` with a transient error
    pub(crate) fn failing_once_at(mut self, offset: u64) -> Self {
        self.fail_once_at = Some(offset);
        self
    }

    /// Answer every request with an HTTP error status
    pub(crate) fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Do not declare the total length
    pub(crate) fn without_total(mut self) -> Self {
        self.declare_total = false;
        self
    }

    /// Set the declared content type
    pub(crate) fn content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    /// Sleep before answering
    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

struct Resource {
    script: Script,
    offsets: Vec<u64>,
}

/// In-memory [`RangeFetcher`] answering from per-URL scripts
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    resources: Mutex<HashMap<String, Resource>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script the answers for `url`
    pub(crate) fn route(&self, url: &str, script: Script) {
        self.resources.lock().unwrap().insert(
            url.to_string(),
            Resource {
                script,
                offsets: Vec::new(),
            },
        );
    }

    /// Offsets requested for `url`, in order
    pub(crate) fn offsets(&self, url: &str) -> Vec<u64> {
        self.resources
            .lock()
            .unwrap()
            .get(url)
            .map(|r| r.offsets.clone())
            .unwrap_or_default()
    }

    /// Number of requests made for `url`
    pub(crate) fn calls(&self, url: &str) -> usize {
        self.offsets(url).len()
    }

    /// Highest number of requests that were answered concurrently
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RangeFetcher for ScriptedFetcher {
    async fn fetch_range(&self, url: &Url, offset: u64) -> Result<RangeResponse> {
        let script = {
            let mut resources = self.resources.lock().unwrap();
            let Some(resource) = resources.get_mut(url.as_str()) else {
                return Err(Error::Http {
                    status: 404,
                    url: url.to_string(),
                });
            };
            resource.offsets.push(offset);
            let mut script = resource.script.clone();
            if resource.script.transient_failures > 0 && resource.script.transient_failures != u32::MAX
            {
                resource.script.transient_failures -= 1;
            }
            if resource.script.fail_once_at == Some(offset) {
                resource.script.fail_once_at = None;
                script.transient_failures = script.transient_failures.max(1);
            }
            script
        };

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(status) = script.status {
            return Err(Error::Http {
                status,
                url: url.to_string(),
            });
        }
        if script.transient_failures > 0 {
            return Err(Error::MalformedResponse {
                url: url.to_string(),
                reason: "connection reset".to_string(),
            });
        }

        let len = script.body.len();
        let start = (offset as usize).min(len);
        let end = start.saturating_add(script.chunk).min(len);
        Ok(RangeResponse {
            start: start as u64,
            body: script.body.slice(start..end),
            content_type: script.content_type,
            total_length: script.declare_total.then_some(len as u64),
        })
    }

    async fn fetch(&self, url: &Url) -> Result<TransferOutcome> {
        let response = self.fetch_range(url, 0).await?;
        Ok(TransferOutcome::new(response.content_type, response.body))
    }
}

/// Listener keeping every event it sees
#[derive(Default)]
pub(crate) struct RecordingListener {
    events: Mutex<Vec<Event>>,
}

impl RecordingListener {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(Event::kind).collect()
    }

    pub(crate) fn of_kind(&self, kind: EventKind) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind() == kind)
            .collect()
    }

    pub(crate) fn count(&self, kind: EventKind) -> usize {
        self.of_kind(kind).len()
    }
}

impl Listener for RecordingListener {
    fn event(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

/// Minimal item standing in as the subject of hand-built transfers
pub(crate) struct StubItem {
    source: Source,
    listener: ListenerSlot,
    seen: Mutex<Vec<Event>>,
}

impl StubItem {
    pub(crate) fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            source: Source::item(name),
            listener: ListenerSlot::new(),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Events delivered to the item itself
    pub(crate) fn seen(&self) -> Vec<Event> {
        self.seen.lock().unwrap().clone()
    }
}

impl Listener for StubItem {
    fn event(&self, event: Event) {
        self.seen.lock().unwrap().push(event.clone());
        self.listener.forward(&self.source, event);
    }
}

impl EventSource for StubItem {
    fn listener(&self, listener: Arc<dyn Listener>) {
        self.listener.set_or_chain(listener);
    }

    fn parent_listener(&self, parent: Arc<dyn Listener>) {
        self.listener.set_parent(parent);
    }
}

#[async_trait]
impl Downloadable for StubItem {
    fn source(&self) -> &Source {
        &self.source
    }

    fn download(self: Arc<Self>) -> Result<Arc<dyn Transfer>> {
        Err(Error::InvalidState("stub items build no transfers".to_string()))
    }

    fn is_downloaded(&self) -> bool {
        false
    }

    async fn save(self: Arc<Self>, _options: &SaveOptions) -> Result<()> {
        Ok(())
    }
}

/// Retry policy with the default ceiling and no sleeping
pub(crate) fn fast_policy() -> RetryPolicy {
    RetryPolicy::with_backoff(3, || Box::new(NoBackoff))
}

/// Context backed by `fetcher`, retrying without delays
pub(crate) fn context_with(fetcher: Arc<ScriptedFetcher>) -> TransferContext {
    TransferContext::with_fetcher(Config::default(), fetcher).retry_policy(fast_policy())
}

/// Context whose fetcher knows no URLs
pub(crate) fn test_context() -> TransferContext {
    context_with(ScriptedFetcher::new())
}

/// Parse a test URL
pub(crate) fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

/// Single transfer of `url` for a fresh stub item
pub(crate) fn single(fetcher: &Arc<ScriptedFetcher>, url: &str) -> (SingleTransfer, Arc<StubItem>) {
    let item = StubItem::new(url);
    let transfer = SingleTransfer::new(
        Arc::clone(&item) as Arc<dyn Downloadable>,
        self::url(url),
        Arc::clone(fetcher) as Arc<dyn RangeFetcher>,
        fast_policy(),
    );
    (transfer, item)
}
