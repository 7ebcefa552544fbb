//! Keyed bus lookup: one bus per scope, created on first use, never evicted.
//!
//! Prefer passing `Arc<EventBus>` explicitly. The process-wide registry behind
//! [`bus`] is meant for cross-cutting access points only.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::debug;

use crate::bus::EventBus;
use crate::config::BusConfig;

/// Key identifying a bus in a [`BusRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Named(String),
    Type { id: TypeId, name: &'static str },
}

impl Scope {
    pub fn named(name: impl Into<String>) -> Self {
        Scope::Named(name.into())
    }

    /// Scope keyed by a Rust type (e.g. the component owning the bus).
    pub fn of<T: ?Sized + 'static>() -> Self {
        Scope::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

impl From<&str> for Scope {
    fn from(value: &str) -> Self {
        Scope::Named(value.to_string())
    }
}

impl From<String> for Scope {
    fn from(value: String) -> Self {
        Scope::Named(value)
    }
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Scope::Named(name) => f.write_str(name),
            Scope::Type { name, .. } => f.write_str(name),
        }
    }
}

type ConfigFactory = Box<dyn Fn(&Scope) -> BusConfig + Send + Sync>;

/// Map from scope to bus instance.
pub struct BusRegistry {
    buses: Mutex<HashMap<Scope, Arc<EventBus>>>,
    config: ConfigFactory,
}

impl Default for BusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BusRegistry {
    /// Buses get the default config, named after their scope.
    pub fn new() -> Self {
        Self::with_config(|scope| BusConfig::default().with_name(scope.to_string()))
    }

    /// Use `factory` to configure each bus this registry creates.
    pub fn with_config(factory: impl Fn(&Scope) -> BusConfig + Send + Sync + 'static) -> Self {
        Self {
            buses: Mutex::new(HashMap::new()),
            config: Box::new(factory),
        }
    }

    /// Return the bus for `scope`, creating it on first lookup.
    pub fn get_or_create(&self, scope: impl Into<Scope>) -> Arc<EventBus> {
        let scope = scope.into();
        if let Some(bus) = self.get(scope.clone()) {
            return bus;
        }

        // The factory runs unlocked: it may look up other scopes on this registry.
        let config = (self.config)(&scope);

        let mut buses = self.buses.lock().unwrap_or_else(PoisonError::into_inner);
        // A racing caller may have inserted first; its bus wins.
        let bus = buses.entry(scope).or_insert_with_key(|scope| {
            let bus = Arc::new(EventBus::with_config(config));
            debug!(scope = %scope, bus = %bus.id(), "bus created");
            bus
        });
        Arc::clone(bus)
    }

    pub fn get(&self, scope: impl Into<Scope>) -> Option<Arc<EventBus>> {
        let buses = self.buses.lock().unwrap_or_else(PoisonError::into_inner);
        buses.get(&scope.into()).cloned()
    }

    pub fn len(&self) -> usize {
        self.buses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl core::fmt::Debug for BusRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BusRegistry")
            .field("buses", &self.len())
            .finish_non_exhaustive()
    }
}

static GLOBAL: OnceLock<BusRegistry> = OnceLock::new();

/// The process-wide registry.
pub fn global() -> &'static BusRegistry {
    GLOBAL.get_or_init(BusRegistry::new)
}

/// Process-wide bus for `scope`.
pub fn bus(scope: impl Into<Scope>) -> Arc<EventBus> {
    global().get_or_create(scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FaultPolicy;

    struct Application;
    struct Plugin;

    #[test]
    fn same_scope_returns_the_same_bus() {
        let registry = BusRegistry::new();

        let a = registry.get_or_create("ui");
        let b = registry.get_or_create(String::from("ui"));
        let c = registry.get_or_create(Scope::of::<Application>());

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
        assert_eq!(a.config().name, "ui");
    }

    #[test]
    fn type_scopes_are_distinct_from_names() {
        let registry = BusRegistry::new();
        let by_type = registry.get_or_create(Scope::of::<Plugin>());
        let by_name = registry.get_or_create(Scope::of::<Plugin>().to_string());

        assert!(!Arc::ptr_eq(&by_type, &by_name));
        assert!(registry.get(Scope::of::<Application>()).is_none());
    }

    #[test]
    fn factory_configures_new_buses() {
        let registry = BusRegistry::with_config(|scope| {
            BusConfig::default()
                .with_name(format!("bus:{scope}"))
                .with_fault_policy(FaultPolicy::Isolate)
        });

        let bus = registry.get_or_create("audit");
        assert_eq!(bus.config().name, "bus:audit");
        assert_eq!(bus.config().fault_policy, FaultPolicy::Isolate);
    }

    #[test]
    fn factory_may_look_up_other_scopes() {
        static REGISTRY: OnceLock<BusRegistry> = OnceLock::new();
        let registry = REGISTRY.get_or_init(|| {
            BusRegistry::with_config(|scope| {
                if *scope == Scope::named("parent") {
                    return BusConfig::default().with_fault_policy(FaultPolicy::Isolate);
                }
                let parent = REGISTRY
                    .get()
                    .map(|registry| registry.get_or_create("parent").config().clone())
                    .unwrap_or_default();
                parent.with_name(scope.to_string())
            })
        });

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let child = registry.get_or_create("child");
            let _ = tx.send(child.config().clone());
        });

        let config = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("factory lookup deadlocked");
        assert_eq!(config.name, "child");
        assert_eq!(config.fault_policy, FaultPolicy::Isolate);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn racing_lookups_share_one_bus() {
        let registry = Arc::new(BusRegistry::new());
        let buses: Vec<Arc<EventBus>> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.get_or_create("shared"))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap())
            .collect();

        assert!(buses.iter().all(|bus| Arc::ptr_eq(bus, &buses[0])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn global_registry_is_shared() {
        let a = bus("scope-tests/global");
        let b = global().get_or_create("scope-tests/global");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
