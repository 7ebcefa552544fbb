//! Error model for subscription and dispatch.

use thiserror::Error;

use crate::binding::Priority;
use crate::event::EventType;

/// A handler declaration that violates the declaration contract.
///
/// These are reported and skipped; they never fail `subscribe`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Handlers must carry a non-empty name (used for logs and fault reports).
    #[error("handler for `{event}` has an empty name")]
    EmptyName { event: EventType },

    /// The same handler name was declared twice for one event type.
    #[error("handler `{name}` is declared more than once for `{event}`")]
    DuplicateHandler { name: &'static str, event: EventType },
}

/// A fault raised by a single handler during `post`.
///
/// The handler's own error is kept untouched as the source.
#[derive(Debug, Error)]
#[error("handler `{handler}` (priority {priority}) failed while handling `{event}`")]
pub struct HandlerFault {
    pub event: EventType,
    pub handler: &'static str,
    pub priority: Priority,
    #[source]
    pub source: anyhow::Error,
}

impl HandlerFault {
    /// The error the handler returned.
    pub fn source_error(&self) -> &anyhow::Error {
        &self.source
    }

    pub fn into_source(self) -> anyhow::Error {
        self.source
    }

    /// Downcast the handler's error to a concrete type.
    pub fn downcast_ref<T>(&self) -> Option<&T>
    where
        T: core::fmt::Display + core::fmt::Debug + Send + Sync + 'static,
    {
        self.source.downcast_ref::<T>()
    }
}

/// Failure of a `post` call.
#[derive(Debug, Error)]
pub enum PostError {
    /// A handler failed and dispatch stopped there (`FaultPolicy::Abort`).
    #[error(transparent)]
    Handler(HandlerFault),

    /// One or more handlers failed while every handler still ran (`FaultPolicy::Isolate`).
    #[error("{} handler(s) failed while handling `{event}`", .faults.len())]
    Aggregate {
        event: EventType,
        faults: Vec<HandlerFault>,
    },
}

impl PostError {
    /// All handler faults, in dispatch order.
    pub fn faults(&self) -> &[HandlerFault] {
        match self {
            PostError::Handler(fault) => core::slice::from_ref(fault),
            PostError::Aggregate { faults, .. } => faults,
        }
    }

    pub fn into_faults(self) -> Vec<HandlerFault> {
        match self {
            PostError::Handler(fault) => vec![fault],
            PostError::Aggregate { faults, .. } => faults,
        }
    }

    /// Downcast the first handler fault to a concrete error type.
    pub fn downcast_ref<T>(&self) -> Option<&T>
    where
        T: core::fmt::Display + core::fmt::Debug + Send + Sync + 'static,
    {
        self.faults().first().and_then(|fault| fault.downcast_ref::<T>())
    }
}

/// Failure to load a `BusConfig`.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("invalid bus configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bus name must not be empty")]
    EmptyName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error, PartialEq, Eq)]
    #[error("out of stock")]
    struct OutOfStock;

    struct Order;

    fn fault(source: anyhow::Error) -> HandlerFault {
        HandlerFault {
            event: EventType::of::<Order>(),
            handler: "reserve",
            priority: Priority::DEFAULT,
            source,
        }
    }

    #[test]
    fn handler_fault_preserves_the_original_error() {
        let err = PostError::Handler(fault(OutOfStock.into()));

        assert_eq!(err.downcast_ref::<OutOfStock>(), Some(&OutOfStock));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("out of stock"));
        assert!(err.to_string().contains("reserve"));
    }

    #[test]
    fn aggregate_reports_every_fault_in_order() {
        let err = PostError::Aggregate {
            event: EventType::of::<Order>(),
            faults: vec![fault(anyhow::anyhow!("first")), fault(OutOfStock.into())],
        };

        assert!(err.to_string().starts_with("2 handler(s) failed"));
        let messages: Vec<String> = err
            .into_faults()
            .into_iter()
            .map(|f| f.into_source().to_string())
            .collect();
        assert_eq!(messages, vec!["first", "out of stock"]);
    }
}
