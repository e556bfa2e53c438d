//! Listener traits and the single-slot registration used by every node

use super::{Event, Source};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;

/// Receiver of events
///
/// Implementations must be cheap and must not block: events are delivered
/// synchronously on whichever task emitted them.
pub trait Listener: Send + Sync {
    /// Handle one event
    fn event(&self, event: Event);
}

/// Something that reports events to one registered listener
pub trait EventSource {
    /// Register the listener that receives this node's events
    fn listener(&self, listener: Arc<dyn Listener>);

    /// Register the bundle this node currently reports to
    ///
    /// Unlike [`listener`](Self::listener), a later parent replaces the
    /// earlier one, so downloading an item again moves its events over to
    /// the new bundle. Defaults to a plain registration.
    fn parent_listener(&self, parent: Arc<dyn Listener>) {
        self.listener(parent);
    }
}

/// Holds the listener of a node, plus the bundle it reports to
///
/// Listeners are read under a short lock and called after the lock is
/// released, so a listener may freely call back into the emitting node.
/// Events go to the listener first, then to the parent.
#[derive(Default)]
pub struct ListenerSlot {
    inner: RwLock<Option<Arc<dyn Listener>>>,
    parent: RwLock<Option<Arc<dyn Listener>>>,
}

impl ListenerSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently registered listener
    pub fn get(&self) -> Option<Arc<dyn Listener>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a listener is registered
    pub fn is_set(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Store the listener if the slot is empty
    ///
    /// The first registration wins. A rejected listener is handed back so
    /// the caller can pass it further down.
    pub fn try_set(&self, listener: Arc<dyn Listener>) -> Result<(), Arc<dyn Listener>> {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(listener);
        }
        *slot = Some(listener);
        Ok(())
    }

    /// Store the listener, linking it behind any listener already present
    pub fn set_or_chain(&self, listener: Arc<dyn Listener>) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let next = match slot.take() {
            None => listener,
            Some(first) => Arc::new(ListenerChain::new(first, listener)),
        };
        *slot = Some(next);
    }

    /// Store the parent, replacing any earlier one
    pub fn set_parent(&self, parent: Arc<dyn Listener>) {
        *self.parent.write().unwrap_or_else(PoisonError::into_inner) = Some(parent);
    }

    /// Whether a parent is registered
    pub fn has_parent(&self) -> bool {
        self.parent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn parent(&self) -> Option<Arc<dyn Listener>> {
        self.parent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Deliver an event created by this node
    pub fn emit(&self, event: Event) {
        match (self.get(), self.parent()) {
            (Some(listener), Some(parent)) => {
                listener.event(event.clone());
                parent.event(event);
            }
            (Some(only), None) | (None, Some(only)) => only.event(event),
            (None, None) => {}
        }
    }

    /// Pass an event from below to the registered listeners
    ///
    /// The event is presented as coming from `me`, unless a domain item is
    /// already its source.
    pub fn forward(&self, me: &Source, event: Event) {
        let event = if event.source().is_item() {
            event
        } else {
            event.with_source(me.clone())
        };
        self.emit(event);
    }
}

impl fmt::Debug for ListenerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSlot")
            .field("set", &self.is_set())
            .field("parent", &self.has_parent())
            .finish()
    }
}

/// Two listeners called one after the other
pub struct ListenerChain {
    first: Arc<dyn Listener>,
    next: Arc<dyn Listener>,
}

impl ListenerChain {
    /// Link `next` behind `first`
    pub fn new(first: Arc<dyn Listener>, next: Arc<dyn Listener>) -> Self {
        Self { first, next }
    }
}

impl Listener for ListenerChain {
    fn event(&self, event: Event) {
        self.first.event(event.clone());
        self.next.event(event);
    }
}

/// Listener that pushes every event into an unbounded channel
///
/// Useful at the top of a tree: a UI or a test drains the receiver at its
/// own pace without ever blocking the emitting transfer.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelListener {
    /// Create the listener together with its receiving end
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl Listener for ChannelListener {
    fn event(&self, event: Event) {
        // Ignore send errors (no receivers is fine)
        let _ = self.tx.send(event);
    }
}

/// Listener backed by a closure
pub struct FnListener<F>(F);

impl<F> FnListener<F>
where
    F: Fn(Event) + Send + Sync,
{
    /// Wrap a closure
    pub fn new(f: F) -> Arc<Self> {
        Arc::new(Self(f))
    }
}

impl<F> Listener for FnListener<F>
where
    F: Fn(Event) + Send + Sync,
{
    fn event(&self, event: Event) {
        (self.0)(event)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, EventPayload};
    use std::sync::Mutex;

    fn recorder() -> (Arc<dyn Listener>, Arc<Mutex<Vec<Event>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener = FnListener::new(move |e| sink.lock().unwrap().push(e));
        (listener, seen)
    }

    fn progress_from(source: &Source) -> Event {
        Event::new(source.clone(), EventKind::DownloadProgress, EventPayload::None)
    }

    #[test]
    fn first_registration_wins() {
        let slot = ListenerSlot::new();
        let (first, first_seen) = recorder();
        let (second, second_seen) = recorder();

        assert!(slot.try_set(first).is_ok());
        assert!(slot.try_set(second).is_err(), "second registration must be rejected");

        slot.emit(progress_from(&Source::transfer("t")));

        assert_eq!(first_seen.lock().unwrap().len(), 1);
        assert!(second_seen.lock().unwrap().is_empty());
    }

    #[test]
    fn chained_registrations_are_called_in_order() {
        let slot = ListenerSlot::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            slot.set_or_chain(FnListener::new(move |_| order.lock().unwrap().push(tag)));
        }

        slot.emit(progress_from(&Source::item("track")));

        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn forward_rewrites_transfer_source_but_not_item_source() {
        let slot = ListenerSlot::new();
        let (listener, seen) = recorder();
        assert!(slot.try_set(listener).is_ok());

        let me = Source::transfer("bundle");
        let child = Source::transfer("single");
        let item = Source::item("track");

        slot.forward(&me, progress_from(&child));
        slot.forward(&me, progress_from(&item));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].source(), &me);
        assert_eq!(seen[0].original_source(), &child);
        assert_eq!(seen[1].source(), &item, "item sources are kept");
    }

    #[test]
    fn parent_is_replaced_not_chained() {
        let slot = ListenerSlot::new();
        let (listener, listener_seen) = recorder();
        let (old_parent, old_seen) = recorder();
        let (new_parent, new_seen) = recorder();
        slot.set_or_chain(listener);

        slot.set_parent(old_parent);
        slot.set_parent(new_parent);
        slot.emit(progress_from(&Source::item("track")));

        assert_eq!(listener_seen.lock().unwrap().len(), 1);
        assert!(old_seen.lock().unwrap().is_empty(), "a replaced parent hears nothing");
        assert_eq!(new_seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn parent_alone_receives_events() {
        let slot = ListenerSlot::new();
        let (parent, seen) = recorder();
        slot.set_parent(parent);

        let me = Source::transfer("single");
        slot.forward(&me, progress_from(&Source::transfer("child")));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].source(), &me);
        assert!(!slot.is_set());
    }

    #[test]
    fn emit_without_listener_is_a_no_op() {
        let slot = ListenerSlot::new();
        slot.emit(progress_from(&Source::transfer("t")));
        assert!(!slot.is_set());
    }

    #[test]
    fn listener_may_reenter_the_slot() {
        let slot = Arc::new(ListenerSlot::new());
        let inner = Arc::clone(&slot);
        let reentering = FnListener::new(move |_| {
            // Would deadlock if the slot held its lock while calling out
            assert!(inner.is_set());
            assert!(!inner.has_parent());
        });
        assert!(slot.try_set(reentering).is_ok());

        slot.emit(progress_from(&Source::transfer("t")));
    }

    #[tokio::test]
    async fn channel_listener_delivers_events() {
        let (listener, mut rx) = ChannelListener::channel();
        let source = Source::transfer("t");

        listener.event(progress_from(&source));
        drop(listener);

        let event = rx.recv().await.expect("event must be delivered");
        assert_eq!(event.source(), &source);
        assert!(rx.recv().await.is_none());
    }
}
