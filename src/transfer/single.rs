//! One resumable, retried fetch of a single URL

use super::Transfer;
use super::fetch::{RangeFetcher, RangeResponse};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, EventPayload, EventSource, Listener, ListenerSlot, Source};
use crate::media::Downloadable;
use crate::retry::RetryPolicy;
use crate::types::{Progress, TransferOutcome};
use async_trait::async_trait;
use bytes::BytesMut;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use url::Url;

/// Lifecycle of a single transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferState {
    /// Not started yet
    Idle,
    /// Fetching (including sleeps between retries)
    Running,
    /// All bytes received, `DownloadFinished` emitted
    Succeeded,
    /// Retries exhausted or permanent failure, `Error` emitted
    Failed,
}

impl TransferState {
    /// Whether the state is terminal
    pub fn is_finished(&self) -> bool {
        matches!(self, TransferState::Succeeded | TransferState::Failed)
    }
}

/// Resumable fetch of one URL with local retries
///
/// Cloning yields another handle to the same transfer.
#[derive(Clone)]
pub struct SingleTransfer {
    inner: Arc<SingleInner>,
}

struct SingleInner {
    source: Source,
    url: Url,
    subject: Arc<dyn Downloadable>,
    fetcher: Arc<dyn RangeFetcher>,
    retry: RetryPolicy,
    listener: ListenerSlot,
    read: AtomicU64,
    total: AtomicU64,
    state: watch::Sender<TransferState>,
}

/// Bytes gathered so far by the task running the transfer
struct Accumulator {
    buffer: BytesMut,
    content_type: Option<String>,
    total: Option<u64>,
}

impl SingleTransfer {
    /// Create an idle transfer of `url` on behalf of `subject`
    pub fn new(
        subject: Arc<dyn Downloadable>,
        url: Url,
        fetcher: Arc<dyn RangeFetcher>,
        retry: RetryPolicy,
    ) -> Self {
        let (state, _) = watch::channel(TransferState::Idle);
        Self {
            inner: Arc::new(SingleInner {
                source: Source::transfer(url.as_str()),
                url,
                subject,
                fetcher,
                retry,
                listener: ListenerSlot::new(),
                read: AtomicU64::new(0),
                total: AtomicU64::new(0),
                state,
            }),
        }
    }

    /// The URL being fetched
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Current lifecycle state
    pub fn state(&self) -> TransferState {
        *self.inner.state.borrow()
    }

    /// Perform the whole transfer in the calling task
    ///
    /// Resolves once the transfer is finished, including every retry and
    /// backoff sleep. If another task is already running it, this waits for
    /// that run instead; on a finished transfer it returns immediately.
    pub async fn run(&self) {
        let claimed = self.inner.state.send_if_modified(|state| {
            if *state == TransferState::Idle {
                *state = TransferState::Running;
                true
            } else {
                false
            }
        });
        if !claimed {
            self.finished().await;
            return;
        }

        match self.inner.fetch_all().await {
            Ok(outcome) => {
                tracing::info!(
                    url = %self.inner.url,
                    bytes = outcome.len(),
                    content_type = ?outcome.content_type(),
                    "transfer finished"
                );
                self.inner.emit(EventKind::DownloadFinished, EventPayload::Outcome(outcome));
                self.inner.state.send_replace(TransferState::Succeeded);
            }
            Err(e) => {
                let read = self.inner.read.load(Ordering::Acquire);
                let total = self.inner.total.load(Ordering::Acquire);
                tracing::error!(
                    url = %self.inner.url,
                    read,
                    total,
                    error = %e,
                    "transfer failed"
                );
                let error = Error::Transfer {
                    url: self.inner.url.to_string(),
                    read,
                    total,
                    source: Box::new(e),
                };
                self.inner.listener.emit(Event::error(self.inner.source.clone(), error));
                self.inner.state.send_replace(TransferState::Failed);
            }
        }
    }

    async fn finished(&self) {
        let mut rx = self.inner.state.subscribe();
        // The sender lives in `inner`, which `self` keeps alive
        let _ = rx.wait_for(TransferState::is_finished).await;
    }
}

impl SingleInner {
    async fn fetch_all(&self) -> Result<TransferOutcome> {
        let mut acc = Accumulator {
            buffer: BytesMut::new(),
            content_type: None,
            total: None,
        };
        let mut backoff = self.retry.backoff();
        let mut retries = 0u32;

        loop {
            match self.attempt(&mut acc).await {
                Ok(true) => {
                    return Ok(TransferOutcome::new(acc.content_type, acc.buffer.freeze()));
                }
                Ok(false) => {}
                Err(e) => {
                    retries += 1;
                    if !self.retry.should_retry(&e, retries) {
                        return Err(e);
                    }
                    let delay = backoff.delay(retries);
                    tracing::warn!(
                        url = %self.url,
                        attempt = retries,
                        max_retries = self.retry.max_retries(),
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient transfer error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// One request from the current offset; `Ok(true)` once complete
    async fn attempt(&self, acc: &mut Accumulator) -> Result<bool> {
        let offset = acc.buffer.len() as u64;
        let response = self.fetcher.fetch_range(&self.url, offset).await?;
        self.append(acc, offset, response)
    }

    fn append(&self, acc: &mut Accumulator, offset: u64, response: RangeResponse) -> Result<bool> {
        if response.start > offset {
            return Err(Error::MalformedResponse {
                url: self.url.to_string(),
                reason: format!(
                    "response starts at byte {} but {offset} was requested",
                    response.start
                ),
            });
        }
        if response.start < offset {
            tracing::debug!(
                url = %self.url,
                requested = offset,
                start = response.start,
                "server resent earlier bytes, rewinding"
            );
            acc.buffer.truncate(response.start as usize);
        }

        if acc.content_type.is_none() {
            acc.content_type = response.content_type;
        }
        if acc.total.is_none()
            && let Some(total) = response.total_length
        {
            acc.total = Some(total);
            self.total.store(total, Ordering::Release);
        }

        acc.buffer.extend_from_slice(&response.body);
        let read = acc.buffer.len() as u64;
        self.read.store(read, Ordering::Release);

        // Without a declared length the body is all there is
        let complete = acc.total.is_none_or(|total| read >= total);
        if response.body.is_empty() && !complete {
            return Err(Error::MalformedResponse {
                url: self.url.to_string(),
                reason: "empty body before the declared length was reached".to_string(),
            });
        }

        let progress = Progress::new(read, acc.total.unwrap_or(0));
        tracing::debug!(
            url = %self.url,
            received = response.body.len(),
            read,
            total = progress.total_bytes,
            "chunk received"
        );
        self.emit(EventKind::DownloadProgress, EventPayload::Progress(progress));

        Ok(complete)
    }

    fn emit(&self, kind: EventKind, payload: EventPayload) {
        self.listener
            .emit(Event::new(self.source.clone(), kind, payload));
    }
}

impl Listener for SingleTransfer {
    fn event(&self, event: Event) {
        self.inner.listener.forward(&self.inner.source, event);
    }
}

impl EventSource for SingleTransfer {
    fn listener(&self, listener: Arc<dyn Listener>) {
        if let Err(listener) = self.inner.listener.try_set(listener) {
            self.inner.subject.listener(listener);
        }
    }

    fn parent_listener(&self, parent: Arc<dyn Listener>) {
        if let Err(parent) = self.inner.listener.try_set(parent) {
            self.inner.subject.parent_listener(parent);
        }
    }
}

#[async_trait]
impl Transfer for SingleTransfer {
    fn source(&self) -> &Source {
        &self.inner.source
    }

    fn subject(&self) -> Arc<dyn Downloadable> {
        Arc::clone(&self.inner.subject)
    }

    fn start(&self) {
        if self.state() != TransferState::Idle {
            return;
        }
        let this = self.clone();
        tokio::spawn(async move { this.run().await });
    }

    async fn wait_till_finished(&self) {
        self.run().await;
    }

    fn progress(&self) -> Progress {
        Progress::new(
            self.inner.read.load(Ordering::Acquire),
            self.inner.total.load(Ordering::Acquire),
        )
    }

    fn is_finished(&self) -> bool {
        self.state().is_finished()
    }
}
