//! Fan-out of child transfers over a bounded worker pool

use super::Transfer;
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, EventPayload, EventSource, Listener, ListenerSlot, Source, SourceId};
use crate::media::Downloadable;
use crate::types::Progress;
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;

/// Worker pool size used by [`BundleTransfer::with_default_pool`]
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Transfer that is finished once every child reported a terminal event
///
/// Each bundle owns its own pool, so nested bundles multiply the number of
/// concurrently running leaf transfers. A failed child still counts as
/// finished: the bundle's own completion does not tell success from failure.
///
/// Children finish on different workers, so the bundle's listener may be
/// called from several tasks at once. The bundle's own terminal event is
/// emitted only after every child's terminal event was passed on.
///
/// Cloning yields another handle to the same bundle.
#[derive(Clone)]
pub struct BundleTransfer {
    inner: Arc<BundleInner>,
}

struct BundleInner {
    source: Source,
    subject: Arc<dyn Downloadable>,
    listener: ListenerSlot,
    children: RwLock<Vec<Arc<dyn Transfer>>>,
    finished: Mutex<HashSet<SourceId>>,
    forwarded: AtomicUsize,
    started: AtomicBool,
    completed: AtomicBool,
    pool: Semaphore,
    pool_size: usize,
    workers: Mutex<Vec<JoinHandle<()>>>,
    done: watch::Sender<bool>,
}

/// Listener a bundle registers on its children
///
/// Weak, so a child never keeps its parent bundle alive.
struct BundleLink(Weak<BundleInner>);

impl Listener for BundleLink {
    fn event(&self, event: Event) {
        if let Some(inner) = self.0.upgrade() {
            inner.handle(event);
        }
    }
}

impl BundleTransfer {
    /// Create an empty bundle running at most `pool_size` children at once
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `pool_size` is zero.
    pub fn new(subject: Arc<dyn Downloadable>, pool_size: usize) -> Result<Self> {
        if pool_size < 1 {
            return Err(Error::config(
                "bundle pool size must be at least one",
                "bundle_pool_size",
            ));
        }
        Ok(Self::build(subject, pool_size))
    }

    /// Create an empty bundle with a pool of [`DEFAULT_POOL_SIZE`]
    pub fn with_default_pool(subject: Arc<dyn Downloadable>) -> Self {
        Self::build(subject, DEFAULT_POOL_SIZE)
    }

    fn build(subject: Arc<dyn Downloadable>, pool_size: usize) -> Self {
        let (done, _) = watch::channel(false);
        let source = Source::transfer(format!("bundle of {}", subject.source().name()));
        Self {
            inner: Arc::new(BundleInner {
                source,
                subject,
                listener: ListenerSlot::new(),
                children: RwLock::new(Vec::new()),
                finished: Mutex::new(HashSet::new()),
                forwarded: AtomicUsize::new(0),
                started: AtomicBool::new(false),
                completed: AtomicBool::new(false),
                pool: Semaphore::new(pool_size),
                pool_size,
                workers: Mutex::new(Vec::new()),
                done,
            }),
        }
    }

    /// Append a child and register this bundle as its parent
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] once the bundle was started.
    pub fn add(&self, child: Arc<dyn Transfer>) -> Result<()> {
        // Checked under the lock `start` takes its snapshot under
        let mut children = self.inner.write_children();
        if self.inner.started.load(Ordering::SeqCst) {
            return Err(Error::InvalidState(format!(
                "cannot add {} to {}: already started",
                child.source(),
                self.inner.source
            )));
        }
        child.parent_listener(Arc::new(BundleLink(Arc::downgrade(&self.inner))));
        children.push(child);
        Ok(())
    }

    /// Children in insertion order
    pub fn children(&self) -> Vec<Arc<dyn Transfer>> {
        self.inner.read_children().clone()
    }

    /// Number of children that reported a terminal event
    pub fn finished_count(&self) -> usize {
        self.inner.lock_finished().len()
    }

    /// Maximum number of children running at once
    pub fn pool_size(&self) -> usize {
        self.inner.pool_size
    }

    fn take_workers(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(
            &mut *self
                .inner
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

impl BundleInner {
    fn read_children(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<dyn Transfer>>> {
        self.children.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_children(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<dyn Transfer>>> {
        self.children.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_finished(&self) -> std::sync::MutexGuard<'_, HashSet<SourceId>> {
        self.finished.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// React to an event from below, then pass it on
    ///
    /// A child only counts towards completion once its terminal event was
    /// forwarded, so the bundle's own event always comes last.
    fn handle(&self, event: Event) {
        let counted = event.kind().is_terminal() && self.record_finished(event.original_source().id());
        self.listener.forward(&self.source, event);
        if counted {
            let forwarded = self.forwarded.fetch_add(1, Ordering::SeqCst) + 1;
            if forwarded == self.read_children().len() && self.started.load(Ordering::SeqCst) {
                self.finish();
            }
        }
    }

    /// Record a direct child as finished; `false` for duplicates and strangers
    fn record_finished(&self, id: SourceId) -> bool {
        let total = {
            let children = self.read_children();
            if !children.iter().any(|child| child.source().id() == id) {
                return false;
            }
            children.len()
        };

        let mut finished = self.lock_finished();
        if !finished.insert(id) {
            tracing::trace!(bundle = %self.source, child = %id, "duplicate terminal event ignored");
            return false;
        }
        tracing::debug!(
            bundle = %self.source,
            finished = finished.len(),
            total,
            "child finished"
        );
        true
    }

    fn is_converged(&self) -> bool {
        self.forwarded.load(Ordering::SeqCst) == self.read_children().len()
    }

    fn finish(&self) {
        if self.completed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!(
            bundle = %self.source,
            children = self.read_children().len(),
            "bundle finished"
        );
        self.listener.emit(Event::new(
            self.source.clone(),
            EventKind::DownloadFinished,
            EventPayload::None,
        ));
        self.done.send_replace(true);
    }

    async fn run_child(self: Arc<Self>, child: Arc<dyn Transfer>) {
        // The semaphore is never closed
        let Ok(_permit) = self.pool.acquire().await else {
            return;
        };

        let outcome = AssertUnwindSafe(child.wait_till_finished())
            .catch_unwind()
            .await;
        if outcome.is_err() {
            tracing::error!(
                bundle = %self.source,
                child = %child.source(),
                "child transfer panicked"
            );
            let error = Error::Other(format!("transfer {} panicked", child.source()));
            self.handle(Event::error(child.source().clone(), error));
        }
    }
}

impl Listener for BundleTransfer {
    fn event(&self, event: Event) {
        self.inner.handle(event);
    }
}

impl EventSource for BundleTransfer {
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
impl Transfer for BundleTransfer {
    fn source(&self) -> &Source {
        &self.inner.source
    }

    fn subject(&self) -> Arc<dyn Downloadable> {
        Arc::clone(&self.inner.subject)
    }

    fn start(&self) {
        let children = {
            let children = self.inner.write_children();
            if self.inner.started.swap(true, Ordering::SeqCst) {
                return;
            }
            children.clone()
        };
        tracing::debug!(
            bundle = %self.inner.source,
            children = children.len(),
            pool_size = self.inner.pool_size,
            "starting bundle"
        );

        // Empty, or every child finished before the bundle was started
        if self.inner.is_converged() {
            self.inner.finish();
            return;
        }

        let handles: Vec<_> = children
            .into_iter()
            .map(|child| tokio::spawn(Arc::clone(&self.inner).run_child(child)))
            .collect();
        self.inner
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(handles);
    }

    async fn wait_till_finished(&self) {
        self.start();

        for handle in self.take_workers() {
            if let Err(e) = handle.await {
                tracing::warn!(bundle = %self.inner.source, error = %e, "bundle worker ended abnormally");
            }
        }

        let mut rx = self.inner.done.subscribe();
        // The sender lives in `inner`, which `self` keeps alive
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Sum of the children's bytes read; the total is the last child's total
    fn progress(&self) -> Progress {
        let children = self.inner.read_children();
        let bytes_read: u64 = children.iter().map(|c| c.progress().bytes_read).sum();
        let total_bytes = children
            .last()
            .map(|c| c.progress().total_bytes)
            .unwrap_or(0);
        Progress::new(bytes_read, total_bytes)
    }

    fn is_finished(&self) -> bool {
        *self.inner.done.borrow()
    }
}
