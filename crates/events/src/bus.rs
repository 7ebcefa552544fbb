//! Event bus: subscription registry plus synchronous dispatcher.
//!
//! ## Dispatch rules
//!
//! - **Exact type**: `post::<E>` reaches handlers declared for `E` only.
//!   `Wrapper(E)`, `Box<E>` or `Arc<E>` are different event types.
//! - **Priority order**: lower priority values run first; equal priorities run
//!   in subscription order.
//! - **Synchronous**: `post` returns after every handler ran (or one failed,
//!   depending on the [`FaultPolicy`]).
//! - **Snapshot iteration**: the handler list is captured before the first
//!   handler runs and no lock is held while handlers run. Handlers may post,
//!   subscribe or unsubscribe on the same bus; changes apply to later posts.
//!
//! ## Subscription rules
//!
//! - Subscribing the same listener twice binds its handlers twice (each event
//!   is delivered twice). This is not deduplicated.
//! - Unsubscribing an unknown listener is a no-op.
//! - The bus holds listeners weakly. A dropped listener stops receiving events
//!   and its bindings are purged on the next subscribe/unsubscribe.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::binding::ListenerId;
use crate::config::{BusConfig, FaultPolicy};
use crate::error::{HandlerFault, PostError};
use crate::event::{Event, EventType};
use crate::listener::{Handlers, Listener};
use crate::registry::Registry;

/// Identifier of a bus instance (shows up in logs).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(Uuid);

impl BusId {
    /// Uses UUIDv7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BusId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for BusId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// In-process typed pub/sub bus.
#[derive(Debug)]
pub struct EventBus {
    id: BusId,
    config: BusConfig,
    registry: RwLock<Registry>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> Self {
        Self {
            id: BusId::new(),
            config,
            registry: RwLock::new(Registry::new()),
        }
    }

    pub fn id(&self) -> BusId {
        self.id
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    // The table is only mutated through methods that cannot panic halfway,
    // so a poisoned lock still guards a consistent table.
    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind every handler `L` declares to this listener instance.
    ///
    /// Declarations that break the contract are logged and skipped. Returns the
    /// number of bindings created.
    pub fn subscribe<L: Listener>(&self, listener: &Arc<L>) -> usize {
        let handlers = Handlers::<L>::inspect();
        for rejected in handlers.rejected() {
            warn!(
                bus = %self.id,
                name = %self.config.name,
                listener = std::any::type_name::<L>(),
                "skipping handler declaration: {rejected}"
            );
        }

        let bindings = handlers.bind(listener);
        let count = bindings.len();
        let purged = {
            let mut registry = self.write();
            let purged = registry.purge_dead();
            registry.insert(bindings);
            purged
        };

        debug!(
            bus = %self.id,
            name = %self.config.name,
            listener = std::any::type_name::<L>(),
            listener_id = %ListenerId::of(listener),
            bindings = count,
            purged,
            "listener subscribed"
        );
        count
    }

    /// Remove every binding owned by `listener`. Returns how many were removed.
    pub fn unsubscribe<L: Listener>(&self, listener: &Arc<L>) -> usize {
        let listener_id = ListenerId::of(listener);
        let (removed, purged) = {
            let mut registry = self.write();
            (registry.remove(listener_id), registry.purge_dead())
        };

        debug!(
            bus = %self.id,
            name = %self.config.name,
            listener = std::any::type_name::<L>(),
            listener_id = %listener_id,
            bindings = removed,
            purged,
            "listener unsubscribed"
        );
        removed
    }

    /// Deliver `event` to every handler bound to its exact type, in priority order.
    ///
    /// No subscribers is not an error. With [`FaultPolicy::Abort`] the first
    /// handler error stops dispatch and is returned; with
    /// [`FaultPolicy::Isolate`] every handler runs and all errors are returned
    /// together.
    pub fn post<E: Event>(&self, event: &E) -> Result<(), PostError> {
        let event_type = EventType::of::<E>();
        let Some(bindings) = self.read().snapshot(&event_type) else {
            trace!(bus = %self.id, event = %event_type, "no subscribers");
            return Ok(());
        };

        trace!(bus = %self.id, event = %event_type, handlers = bindings.len(), "dispatching");

        let mut faults = Vec::new();
        for binding in &bindings {
            let Some(outcome) = binding.invoke(event) else {
                trace!(bus = %self.id, handler = binding.name(), "listener dropped; skipping");
                continue;
            };
            let Err(source) = outcome else {
                continue;
            };

            let fault = HandlerFault {
                event: event_type,
                handler: binding.name(),
                priority: binding.priority(),
                source,
            };
            match self.config.fault_policy {
                FaultPolicy::Abort => {
                    debug!(bus = %self.id, "{fault}; aborting dispatch");
                    return Err(PostError::Handler(fault));
                }
                FaultPolicy::Isolate => {
                    warn!(bus = %self.id, error = %fault.source, "{fault}");
                    faults.push(fault);
                }
            }
        }

        if faults.is_empty() {
            Ok(())
        } else {
            Err(PostError::Aggregate {
                event: event_type,
                faults,
            })
        }
    }

    /// Number of live bindings for `E`. Bindings of dropped listeners are not
    /// counted, even before they are purged.
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.read().count(&EventType::of::<E>())
    }

    pub fn has_subscribers<E: Event>(&self) -> bool {
        self.subscriber_count::<E>() > 0
    }

    pub fn is_subscribed<L: Listener>(&self, listener: &Arc<L>) -> bool {
        self.read().contains_listener(ListenerId::of(listener))
    }

    /// Event types that currently have at least one binding.
    pub fn event_types(&self) -> Vec<EventType> {
        self.read().event_types()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
