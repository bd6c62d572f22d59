//! Routing of pushed event frames to registered handlers.

use std::collections::HashMap;
use std::net::SocketAddr;

use hazelcast_core::protocol::codecs::event_registration_id;
use hazelcast_core::protocol::Frame;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::RegistrationId;

/// Receives the event frames of one registration.
///
/// Calls for one registration happen one at a time, in arrival order, on
/// that registration's delivery task.
pub trait EventHandler: Send + Sync + 'static {
    /// Handles one event frame.
    fn handle(&self, frame: Frame);
}

impl<F> EventHandler for F
where
    F: Fn(Frame) + Send + Sync + 'static,
{
    fn handle(&self, frame: Frame) {
        self(frame)
    }
}

/// Emitted when the member a registration was added through is lost and the
/// registration has to be added again elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReregistrationNeeded {
    /// The registration that lost its member.
    pub registration_id: RegistrationId,
    /// The target the registration listens on.
    pub target: String,
}

struct Registration {
    target: String,
    member: Option<SocketAddr>,
    queue: mpsc::UnboundedSender<Frame>,
    task: JoinHandle<()>,
}

/// Table of listener registrations.
///
/// Reader tasks only enqueue; handlers run on one delivery task per
/// registration.
pub struct EventDispatcher {
    registrations: Mutex<HashMap<RegistrationId, Registration>>,
    reregistration: broadcast::Sender<ReregistrationNeeded>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("registrations", &self.len())
            .finish()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        let (reregistration, _) = broadcast::channel(64);
        Self {
            registrations: Mutex::new(HashMap::new()),
            reregistration,
        }
    }

    /// Registers `handler` for events on `target` and returns a fresh id.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn register(
        &self,
        target: impl Into<String>,
        handler: impl EventHandler,
    ) -> RegistrationId {
        let id = RegistrationId::new();
        let target = target.into();
        let (queue, mut events) = mpsc::unbounded_channel::<Frame>();

        let task_id = id.clone();
        let task = tokio::spawn(async move {
            while let Some(frame) = events.recv().await {
                handler.handle(frame);
            }
            tracing::trace!(registration_id = %task_id, "delivery task finished");
        });

        tracing::debug!(registration_id = %id, target = %target, "registered listener");
        self.registrations.lock().insert(
            id.clone(),
            Registration {
                target,
                member: None,
                queue,
                task,
            },
        );
        id
    }

    /// Removes a registration. Events already queued are still delivered.
    ///
    /// Returns false if `id` is not registered.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.registrations.lock().remove(id);
        match removed {
            Some(_) => {
                tracing::debug!(registration_id = id, "unregistered listener");
                true
            }
            None => false,
        }
    }

    /// Records the member a registration was added through.
    ///
    /// Returns false if `id` is not registered.
    pub fn bind(&self, id: &str, member: SocketAddr) -> bool {
        match self.registrations.lock().get_mut(id) {
            Some(registration) => {
                registration.member = Some(member);
                true
            }
            None => false,
        }
    }

    /// Returns the member a registration is bound to.
    pub fn member_of(&self, id: &str) -> Option<SocketAddr> {
        self.registrations.lock().get(id).and_then(|r| r.member)
    }

    /// Returns the target of a registration.
    pub fn target_of(&self, id: &str) -> Option<String> {
        self.registrations.lock().get(id).map(|r| r.target.clone())
    }

    /// Queues an event frame for the registration named in its payload.
    pub fn dispatch(&self, frame: Frame) {
        let id = match event_registration_id(&frame) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "dropping event without registration id");
                return;
            }
        };

        let queue = self.registrations.lock().get(id.as_str()).map(|r| r.queue.clone());
        match queue {
            Some(queue) => {
                tracing::debug!(registration_id = %id, "dispatching event");
                if queue.send(frame).is_err() {
                    tracing::debug!(registration_id = %id, "delivery task gone, event dropped");
                }
            }
            None => {
                tracing::debug!(registration_id = %id, "dropping event for unknown registration");
            }
        }
    }

    /// Unbinds every registration added through `member` and announces each
    /// one on the re-registration channel.
    pub fn connection_lost(&self, member: SocketAddr) {
        let lost: Vec<ReregistrationNeeded> = {
            let mut registrations = self.registrations.lock();
            registrations
                .iter_mut()
                .filter(|(_, r)| r.member == Some(member))
                .map(|(id, r)| {
                    r.member = None;
                    ReregistrationNeeded {
                        registration_id: id.clone(),
                        target: r.target.clone(),
                    }
                })
                .collect()
        };

        for needed in lost {
            tracing::debug!(
                registration_id = %needed.registration_id,
                member = %member,
                "registration lost its member"
            );
            let _ = self.reregistration.send(needed);
        }
    }

    /// Subscribes to registrations that need to be added again.
    pub fn subscribe_reregistration(&self) -> broadcast::Receiver<ReregistrationNeeded> {
        self.reregistration.subscribe()
    }

    /// Returns true if `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.registrations.lock().contains_key(id)
    }

    /// Returns the ids of all registrations.
    pub fn registration_ids(&self) -> Vec<RegistrationId> {
        self.registrations.lock().keys().cloned().collect()
    }

    /// Returns the number of registrations.
    pub fn len(&self) -> usize {
        self.registrations.lock().len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.lock().is_empty()
    }

    /// Drops every registration and stops their delivery tasks.
    pub fn clear(&self) {
        let drained: Vec<Registration> =
            self.registrations.lock().drain().map(|(_, r)| r).collect();
        for registration in drained {
            registration.task.abort();
        }
    }
}
