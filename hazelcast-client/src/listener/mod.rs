//! Event listener infrastructure.
//!
//! Members push events as frames flagged EVENT whose payload opens with the
//! registration id. The [`EventDispatcher`] maps that id to a handler and
//! delivers on a per-registration task.

mod dispatcher;
mod entry_listener;
mod lifecycle;

use std::borrow::Borrow;

use uuid::Uuid;

pub use dispatcher::{EventDispatcher, EventHandler, ReregistrationNeeded};
pub use entry_listener::{
    EntryListener, EntryListenerHandler, FnEntryListener, FnEntryListenerBuilder,
};
pub use lifecycle::LifecycleEvent;

/// Unique identifier for a listener registration.
///
/// The same id is sent to the member in the add-listener request and comes
/// back at the start of every event payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(String);

impl RegistrationId {
    /// Creates a new random registration id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RegistrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Borrow<str> for RegistrationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for RegistrationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_id_uniqueness() {
        let id1 = RegistrationId::new();
        let id2 = RegistrationId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_registration_id_is_uuid() {
        let id = RegistrationId::new();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
        assert_eq!(id.to_string(), id.as_str());
    }
}
