//! Entry listener trait for map data structures.

use hazelcast_core::protocol::codecs::map::{EntryEvent, EntryEventType};
use hazelcast_core::protocol::Frame;

use super::EventHandler;

/// A listener for entry-level events on maps.
///
/// Keys and values arrive as serialized `Data`; turn them back into objects
/// with `HazelcastClient::to_object`. All methods default to doing nothing.
///
/// # Example
///
/// ```ignore
/// struct Audit;
///
/// impl EntryListener for Audit {
///     fn entry_added(&self, event: EntryEvent) {
///         println!("added by {}", event.member_uuid);
///     }
/// }
///
/// let id = client.add_listener("orders", request_fn, EntryListenerHandler::new(Audit)).await?;
/// ```
pub trait EntryListener: Send + Sync + 'static {
    /// Called when a new entry is added to the map.
    fn entry_added(&self, event: EntryEvent) {
        let _ = event;
    }

    /// Called when an entry is removed from the map.
    fn entry_removed(&self, event: EntryEvent) {
        let _ = event;
    }

    /// Called when an existing entry is updated in the map.
    fn entry_updated(&self, event: EntryEvent) {
        let _ = event;
    }

    /// Called when an entry is evicted from the map.
    fn entry_evicted(&self, event: EntryEvent) {
        let _ = event;
    }

    /// Called when an entry expires.
    fn entry_expired(&self, event: EntryEvent) {
        let _ = event;
    }

    /// Called for map-wide events: evict-all and clear-all.
    fn map_event(&self, event: EntryEvent) {
        let _ = event;
    }

    /// Called when an entry is merged after a split-brain heal.
    fn entry_merged(&self, event: EntryEvent) {
        let _ = event;
    }
}

/// Adapts an [`EntryListener`] to the raw frame [`EventHandler`] interface.
///
/// Frames that do not decode as entry events are logged and skipped.
#[derive(Debug)]
pub struct EntryListenerHandler<L> {
    listener: L,
}

impl<L: EntryListener> EntryListenerHandler<L> {
    /// Wraps `listener`.
    pub fn new(listener: L) -> Self {
        Self { listener }
    }
}

impl<L: EntryListener> EventHandler for EntryListenerHandler<L> {
    fn handle(&self, frame: Frame) {
        let event = match EntryEvent::decode(&frame) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable entry event");
                return;
            }
        };
        match event.event_type {
            EntryEventType::Added => self.listener.entry_added(event),
            EntryEventType::Removed => self.listener.entry_removed(event),
            EntryEventType::Updated => self.listener.entry_updated(event),
            EntryEventType::Evicted => self.listener.entry_evicted(event),
            EntryEventType::Expired => self.listener.entry_expired(event),
            EntryEventType::EvictAll | EntryEventType::ClearAll => self.listener.map_event(event),
            EntryEventType::Merged => self.listener.entry_merged(event),
        }
    }
}

type Callback = Box<dyn Fn(EntryEvent) + Send + Sync>;

/// An entry listener implementation using closures.
///
/// Use [`FnEntryListener::builder`] to create a new instance.
pub struct FnEntryListener {
    on_added: Option<Callback>,
    on_removed: Option<Callback>,
    on_updated: Option<Callback>,
    on_any: Option<Callback>,
}

impl FnEntryListener {
    /// Creates a new builder for constructing an `FnEntryListener`.
    pub fn builder() -> FnEntryListenerBuilder {
        FnEntryListenerBuilder::default()
    }

    fn fire(&self, specific: &Option<Callback>, event: EntryEvent) {
        match (specific, &self.on_any) {
            (Some(f), _) => f(event),
            (None, Some(f)) => f(event),
            (None, None) => {}
        }
    }
}

impl EntryListener for FnEntryListener {
    fn entry_added(&self, event: EntryEvent) {
        self.fire(&self.on_added, event);
    }

    fn entry_removed(&self, event: EntryEvent) {
        self.fire(&self.on_removed, event);
    }

    fn entry_updated(&self, event: EntryEvent) {
        self.fire(&self.on_updated, event);
    }

    fn entry_evicted(&self, event: EntryEvent) {
        self.fire(&None, event);
    }

    fn entry_expired(&self, event: EntryEvent) {
        self.fire(&None, event);
    }

    fn map_event(&self, event: EntryEvent) {
        self.fire(&None, event);
    }

    fn entry_merged(&self, event: EntryEvent) {
        self.fire(&None, event);
    }
}

impl std::fmt::Debug for FnEntryListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnEntryListener")
            .field("on_added", &self.on_added.is_some())
            .field("on_removed", &self.on_removed.is_some())
            .field("on_updated", &self.on_updated.is_some())
            .field("on_any", &self.on_any.is_some())
            .finish()
    }
}

/// Builder for creating [`FnEntryListener`] instances.
#[derive(Default)]
pub struct FnEntryListenerBuilder {
    on_added: Option<Callback>,
    on_removed: Option<Callback>,
    on_updated: Option<Callback>,
    on_any: Option<Callback>,
}

impl FnEntryListenerBuilder {
    /// Sets the handler for entry added events.
    pub fn on_added<F>(mut self, f: F) -> Self
    where
        F: Fn(EntryEvent) + Send + Sync + 'static,
    {
        self.on_added = Some(Box::new(f));
        self
    }

    /// Sets the handler for entry removed events.
    pub fn on_removed<F>(mut self, f: F) -> Self
    where
        F: Fn(EntryEvent) + Send + Sync + 'static,
    {
        self.on_removed = Some(Box::new(f));
        self
    }

    /// Sets the handler for entry updated events.
    pub fn on_updated<F>(mut self, f: F) -> Self
    where
        F: Fn(EntryEvent) + Send + Sync + 'static,
    {
        self.on_updated = Some(Box::new(f));
        self
    }

    /// Sets the fallback handler for every event without a specific handler.
    pub fn on_any<F>(mut self, f: F) -> Self
    where
        F: Fn(EntryEvent) + Send + Sync + 'static,
    {
        self.on_any = Some(Box::new(f));
        self
    }

    /// Builds the [`FnEntryListener`].
    pub fn build(self) -> FnEntryListener {
        FnEntryListener {
            on_added: self.on_added,
            on_removed: self.on_removed,
            on_updated: self.on_updated,
            on_any: self.on_any,
        }
    }
}
