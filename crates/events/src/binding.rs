//! Handler bindings: a declared handler bound to one listener instance.

use std::any::Any;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

/// Dispatch priority of a handler.
///
/// Lower values run earlier. Handlers with equal priority run in subscription order.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Priority(i32);

impl Priority {
    /// Runs before every other priority.
    pub const FIRST: Priority = Priority(i32::MIN);
    pub const DEFAULT: Priority = Priority(0);
    /// Runs after every other priority.
    pub const LAST: Priority = Priority(i32::MAX);

    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> i32 {
        self.0
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl core::fmt::Display for Priority {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Identity of a subscribed listener instance.
///
/// Derived from the address of the listener's `Arc` allocation, so every clone
/// of the same `Arc` maps to the same id. Bindings keep a `Weak` to the
/// allocation, which pins the address for as long as any binding refers to it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

impl ListenerId {
    pub fn of<L: Send + Sync + 'static>(listener: &Arc<L>) -> Self {
        Self(Arc::as_ptr(listener) as *const () as usize)
    }
}

impl core::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Type-erased call into a listener's handler. Returns `None` once the
/// listener has been dropped.
type Invoke = Box<dyn Fn(&dyn Any) -> Option<anyhow::Result<()>> + Send + Sync>;

/// Typed handler shared by every binding created from the same declaration.
pub(crate) type HandlerFn<L> = Arc<dyn Fn(&L, &dyn Any) -> anyhow::Result<()> + Send + Sync>;

/// A handler declaration bound to a specific listener instance.
pub(crate) struct HandlerBinding {
    listener: ListenerId,
    owner: Weak<dyn Any + Send + Sync>,
    name: &'static str,
    priority: Priority,
    invoke: Invoke,
}

impl HandlerBinding {
    pub(crate) fn new<L: Send + Sync + 'static>(
        listener: &Arc<L>,
        name: &'static str,
        priority: Priority,
        handler: HandlerFn<L>,
    ) -> Self {
        let target: Weak<L> = Arc::downgrade(listener);
        let owner: Weak<dyn Any + Send + Sync> = target.clone();

        Self {
            listener: ListenerId::of(listener),
            owner,
            name,
            priority,
            invoke: Box::new(move |event| {
                let listener = target.upgrade()?;
                Some(handler(&*listener, event))
            }),
        }
    }

    pub fn listener(&self) -> ListenerId {
        self.listener
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Whether the owning listener is still alive.
    pub fn is_live(&self) -> bool {
        self.owner.strong_count() > 0
    }

    pub(crate) fn invoke(&self, event: &dyn Any) -> Option<anyhow::Result<()>> {
        (self.invoke)(event)
    }
}

impl core::fmt::Debug for HandlerBinding {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("listener", &self.listener)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("live", &self.is_live())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter;

    #[test]
    fn priorities_order_ascending() {
        assert!(Priority::FIRST < Priority::new(-1));
        assert!(Priority::new(-1) < Priority::DEFAULT);
        assert!(Priority::DEFAULT < Priority::LAST);
        assert_eq!(Priority::default(), Priority::from(0));
    }

    #[test]
    fn listener_id_is_shared_by_clones_only() {
        let a = Arc::new(Counter);
        let b = Arc::new(Counter);
        assert_eq!(ListenerId::of(&a), ListenerId::of(&a.clone()));
        assert_ne!(ListenerId::of(&a), ListenerId::of(&b));
    }

    #[test]
    fn binding_goes_dead_with_its_listener() {
        let listener = Arc::new(Counter);
        let binding = HandlerBinding::new(
            &listener,
            "noop",
            Priority::DEFAULT,
            Arc::new(|_: &Counter, _: &dyn Any| Ok::<(), anyhow::Error>(())),
        );

        assert!(binding.is_live());
        assert!(matches!(binding.invoke(&()), Some(Ok(()))));

        drop(listener);
        assert!(!binding.is_live());
        assert!(binding.invoke(&()).is_none());
    }
}
