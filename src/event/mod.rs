//! Events and the listener chain
//!
//! Every node of a download tree (transfers, domain items, readers) is both
//! an event source and a listener. A node that receives an event from below
//! first reacts to it itself and then forwards it to its single registered
//! listener, presenting itself as the new `source` unless the event is already
//! attributed to a domain item. `original_source` never changes, so a bundle
//! can always tell which of its direct children an event came from.
//!
//! - [`Event`], [`EventKind`], [`EventPayload`] - what travels up the chain
//! - [`Source`], [`SourceId`], [`SourceKind`] - who emitted it
//! - [`Listener`], [`EventSource`], [`ListenerSlot`] - how nodes are linked

mod listener;

pub use listener::{ChannelListener, EventSource, FnListener, Listener, ListenerChain, ListenerSlot};

use crate::error::Error;
use crate::types::{Progress, TransferOutcome};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of an event source
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(u64);

impl SourceId {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of node emitted an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A single or bundled transfer
    Transfer,
    /// A domain item (track, track set, discography)
    Item,
    /// A page reader
    Reader,
}

/// Identity plus a display name of an event source
///
/// Two sources are equal when their ids are equal.
#[derive(Clone, Debug)]
pub struct Source {
    id: SourceId,
    kind: SourceKind,
    name: Arc<str>,
}

impl Source {
    /// Create a source with a fresh identity
    pub fn new(kind: SourceKind, name: impl Into<String>) -> Self {
        Self {
            id: SourceId::next(),
            kind,
            name: Arc::from(name.into()),
        }
    }

    /// Source of a transfer
    pub fn transfer(name: impl Into<String>) -> Self {
        Self::new(SourceKind::Transfer, name)
    }

    /// Source of a domain item
    pub fn item(name: impl Into<String>) -> Self {
        Self::new(SourceKind::Item, name)
    }

    /// Source of a reader
    pub fn reader(name: impl Into<String>) -> Self {
        Self::new(SourceKind::Reader, name)
    }

    /// Identity
    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Kind of node
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the source is a domain item; such sources are never rewritten
    pub fn is_item(&self) -> bool {
        self.kind == SourceKind::Item
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Source {}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

/// Closed set of event kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The status of a reader changed
    ReaderStatus,
    /// All sub items of an item were found
    SubItemsFound,
    /// An item got disqualified and will not be processed
    ItemDisqualified,
    /// A transfer made progress
    DownloadProgress,
    /// A transfer finished successfully (bundles: every child reported)
    DownloadFinished,
    /// Writing to disk starts
    SaveStart,
    /// Writing to disk finished
    SaveFinished,
    /// Something failed
    Error,
}

impl EventKind {
    /// Whether the kind ends a transfer (counted by bundles)
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::DownloadFinished | EventKind::Error)
    }
}

/// Data attached to an event
#[derive(Clone, Debug)]
pub enum EventPayload {
    /// Nothing attached
    None,
    /// Progress of the emitting transfer
    Progress(Progress),
    /// The downloaded content of a single transfer
    Outcome(TransferOutcome),
    /// The failure, shared along the chain
    Error(Arc<Error>),
    /// Free-form status text
    Message(String),
    /// A file or folder that was written
    Path(PathBuf),
    /// A number of things (e.g. sub items found)
    Count(usize),
}

/// An event travelling up the listener chain
#[derive(Clone, Debug)]
pub struct Event {
    kind: EventKind,
    source: Source,
    original_source: Source,
    payload: EventPayload,
}

impl Event {
    /// Create an event; the source is also its original source
    pub fn new(source: Source, kind: EventKind, payload: EventPayload) -> Self {
        Self {
            kind,
            original_source: source.clone(),
            source,
            payload,
        }
    }

    /// Create an `Error` event for the given failure
    pub fn error(source: Source, error: Error) -> Self {
        Self::new(source, EventKind::Error, EventPayload::Error(Arc::new(error)))
    }

    /// Same event presented by another source; the original source is kept
    pub fn with_source(self, source: Source) -> Self {
        Self { source, ..self }
    }

    /// Kind of event
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Current (possibly rewritten) source
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// The node that created the event
    pub fn original_source(&self) -> &Source {
        &self.original_source
    }

    /// Attached data
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Progress payload, if any
    pub fn progress(&self) -> Option<Progress> {
        match &self.payload {
            EventPayload::Progress(p) => Some(*p),
            _ => None,
        }
    }

    /// Downloaded content, if any
    pub fn outcome(&self) -> Option<&TransferOutcome> {
        match &self.payload {
            EventPayload::Outcome(o) => Some(o),
            _ => None,
        }
    }

    /// Failure, if any
    pub fn error_payload(&self) -> Option<&Arc<Error>> {
        match &self.payload {
            EventPayload::Error(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} / {} ({})",
            self.kind, self.source, self.original_source
        )
    }
}
