//! `herald-events`: in-process typed publish/subscribe.
//!
//! Listeners declare handlers per event type ([`Listener`]); an [`EventBus`]
//! binds them on `subscribe`, keeps them sorted by [`Priority`], and invokes
//! them synchronously on `post`.

pub mod binding;
pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod listener;
mod registry;
pub mod scope;

pub use binding::{ListenerId, Priority};
pub use bus::{BusId, EventBus};
pub use config::{BusConfig, FaultPolicy};
pub use error::{ConfigError, ConfigLoadError, HandlerFault, PostError};
pub use event::{Event, EventType};
pub use listener::{Handlers, Listener};
pub use scope::{BusRegistry, Scope};
