//! Handler declaration contract for listeners.
//!
//! A listener declares its handlers once per type through [`Listener::declare`].
//! Every `subscribe` replays those declarations and binds them to the listener
//! instance being subscribed:
//!
//! ```ignore
//! struct Audit { seen: AtomicUsize }
//!
//! impl Listener for Audit {
//!     fn declare(handlers: &mut Handlers<Self>) {
//!         handlers
//!             .on("record", |audit, _: &OrderPlaced| {
//!                 audit.seen.fetch_add(1, Ordering::SeqCst);
//!                 Ok(())
//!             })
//!             .on_signal::<Shutdown, _>("flush", Priority::LAST, |audit| audit.flush());
//!     }
//! }
//! ```

use std::any::Any;
use std::sync::Arc;

use crate::binding::{HandlerBinding, HandlerFn, Priority};
use crate::error::ConfigError;
use crate::event::{Event, EventType};

/// An object owning one or more event handlers.
pub trait Listener: Sized + Send + Sync + 'static {
    /// Declare this listener type's handlers.
    fn declare(handlers: &mut Handlers<Self>);
}

struct Declaration<L> {
    event: EventType,
    name: &'static str,
    priority: Priority,
    handler: HandlerFn<L>,
}

/// Collects the handler declarations of a listener type.
pub struct Handlers<L> {
    declarations: Vec<Declaration<L>>,
    rejected: Vec<ConfigError>,
}

impl<L> Handlers<L>
where
    L: Listener,
{
    /// Collect `L`'s declarations without binding them.
    ///
    /// `subscribe` goes through the same collection, so `rejected()` here lists
    /// exactly the declarations `subscribe` skips.
    pub fn inspect() -> Self {
        let mut handlers = Self {
            declarations: Vec::new(),
            rejected: Vec::new(),
        };
        L::declare(&mut handlers);
        handlers
    }

    /// Handle every `E` with the default priority.
    pub fn on<E, F>(&mut self, name: &'static str, handler: F) -> &mut Self
    where
        E: Event,
        F: Fn(&L, &E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_with_priority(name, Priority::DEFAULT, handler)
    }

    /// Handle every `E` with an explicit priority (lower runs earlier).
    pub fn on_with_priority<E, F>(
        &mut self,
        name: &'static str,
        priority: impl Into<Priority>,
        handler: F,
    ) -> &mut Self
    where
        E: Event,
        F: Fn(&L, &E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.push(
            EventType::of::<E>(),
            name,
            priority.into(),
            Arc::new(move |listener: &L, event: &dyn Any| match event.downcast_ref::<E>() {
                Some(event) => handler(listener, event),
                None => Ok(()),
            }),
        )
    }

    /// React to `E` without looking at the event value.
    pub fn on_signal<E, F>(
        &mut self,
        name: &'static str,
        priority: impl Into<Priority>,
        handler: F,
    ) -> &mut Self
    where
        E: Event,
        F: Fn(&L) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.push(
            EventType::of::<E>(),
            name,
            priority.into(),
            Arc::new(move |listener: &L, _: &dyn Any| handler(listener)),
        )
    }

    fn push(
        &mut self,
        event: EventType,
        name: &'static str,
        priority: Priority,
        handler: HandlerFn<L>,
    ) -> &mut Self {
        if name.trim().is_empty() {
            self.rejected.push(ConfigError::EmptyName { event });
            return self;
        }
        if self
            .declarations
            .iter()
            .any(|d| d.event == event && d.name == name)
        {
            self.rejected
                .push(ConfigError::DuplicateHandler { name, event });
            return self;
        }

        self.declarations.push(Declaration {
            event,
            name,
            priority,
            handler,
        });
        self
    }

    /// Declarations that were skipped because they broke the contract.
    pub fn rejected(&self) -> &[ConfigError] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Bind every accepted declaration to `listener`, in declaration order.
    pub(crate) fn bind(&self, listener: &Arc<L>) -> Vec<(EventType, HandlerBinding)> {
        self.declarations
            .iter()
            .map(|d| {
                (
                    d.event,
                    HandlerBinding::new(listener, d.name, d.priority, Arc::clone(&d.handler)),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Opened;
    struct Closed;

    struct Door;

    impl Listener for Door {
        fn declare(handlers: &mut Handlers<Self>) {
            handlers
                .on("opened", |_, _: &Opened| Ok(()))
                .on_with_priority("closed", -5, |_, _: &Closed| Ok(()))
                .on_signal::<Closed, _>("lock", Priority::LAST, |_| Ok(()))
                // rejected: duplicate name for the same event type
                .on("opened", |_, _: &Opened| Ok(()))
                // rejected: blank name
                .on(" ", |_, _: &Opened| Ok(()));
        }
    }

    #[test]
    fn collects_valid_declarations_and_skips_broken_ones() {
        let handlers = Handlers::<Door>::inspect();

        assert_eq!(handlers.len(), 3);
        assert_eq!(
            handlers.rejected(),
            &[
                ConfigError::DuplicateHandler {
                    name: "opened",
                    event: EventType::of::<Opened>(),
                },
                ConfigError::EmptyName {
                    event: EventType::of::<Opened>(),
                },
            ]
        );
    }

    #[test]
    fn bind_keeps_declaration_order_and_priorities() {
        let door = Arc::new(Door);
        let bound = Handlers::<Door>::inspect().bind(&door);

        let summary: Vec<(bool, &str, i32)> = bound
            .iter()
            .map(|(ty, b)| (ty.is::<Closed>(), b.name(), b.priority().value()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (false, "opened", 0),
                (true, "closed", -5),
                (true, "lock", i32::MAX),
            ]
        );
        assert!(bound.iter().all(|(_, b)| b.listener() == crate::ListenerId::of(&door)));
    }
}
