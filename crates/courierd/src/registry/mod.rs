//! Registry of exposed methods keyed by action and method name.
//!
//! The [`ActionRegistry`] is filled once at startup and then shared
//! read-only behind an `Arc`; lookups take no lock. Registering the same
//! action and method twice is a configuration error, as is a descriptor
//! whose parameters make no sense for its call type.

mod api;
mod descriptor;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

pub use api::{ApiMethod, PollingProvider, RemotingApi};
pub use descriptor::{CallType, MethodDescriptor, ParamKind, ParamSpec};

pub(crate) const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// Errors raised while registering methods.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The action already exposes a method with this name.
    #[error("method '{action}.{method}' is already registered")]
    DuplicateMethod {
        /// Action name.
        action: String,
        /// Method name.
        method: String,
    },
    /// The descriptor is inconsistent with its call type.
    #[error("invalid descriptor for '{action}.{method}': {reason}")]
    InvalidDescriptor {
        /// Action name.
        action: String,
        /// Method name.
        method: String,
        /// What is wrong with the descriptor.
        reason: String,
    },
}

impl RegistryError {
    fn invalid(action: &str, method: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            action: action.to_owned(),
            method: method.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Registered methods, grouped by action.
///
/// # Example
///
/// ```
/// use courierd::{ActionRegistry, CallType, HandlerOutput, MethodDescriptor};
///
/// let mut registry = ActionRegistry::new();
/// let ping = MethodDescriptor::new(CallType::Simple, |_| Ok(HandlerOutput::Empty));
/// registry.register("Health", "ping", ping.clone()).expect("first registration");
/// assert!(registry.lookup("Health", "ping").is_some());
/// assert!(registry.register("Health", "ping", ping).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: BTreeMap<String, BTreeMap<String, Arc<MethodDescriptor>>>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `descriptor` as `action.method`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateMethod`] if the pair is already
    /// taken and [`RegistryError::InvalidDescriptor`] if the descriptor does
    /// not fit its call type.
    pub fn register(
        &mut self,
        action: impl Into<String>,
        method: impl Into<String>,
        descriptor: MethodDescriptor,
    ) -> Result<(), RegistryError> {
        let action = action.into();
        let method = method.into();
        validate(&action, &method, &descriptor)?;

        let methods = self.actions.entry(action.clone()).or_default();
        if methods.contains_key(&method) {
            return Err(RegistryError::DuplicateMethod { action, method });
        }
        debug!(
            target: REGISTRY_TARGET,
            action = %action,
            method = %method,
            call_type = %descriptor.call_type(),
            "method registered"
        );
        methods.insert(method, Arc::new(descriptor));
        Ok(())
    }

    /// Looks up a method; absence is an ordinary outcome.
    pub fn lookup(&self, action: &str, method: &str) -> Option<&Arc<MethodDescriptor>> {
        self.actions.get(action)?.get(method)
    }

    /// Iterates over `(action, method, descriptor)` in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &Arc<MethodDescriptor>)> {
        self.actions.iter().flat_map(|(action, methods)| {
            methods
                .iter()
                .map(move |(method, descriptor)| (action.as_str(), method.as_str(), descriptor))
        })
    }

    /// Number of registered methods across all actions.
    pub fn len(&self) -> usize {
        self.actions.values().map(BTreeMap::len).sum()
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

fn validate(action: &str, method: &str, descriptor: &MethodDescriptor) -> Result<(), RegistryError> {
    if action.is_empty() || method.is_empty() {
        return Err(RegistryError::invalid(
            action,
            method,
            "action and method names must not be empty",
        ));
    }

    let mut seen = HashSet::new();
    for spec in descriptor.params() {
        if !seen.insert(spec.name()) {
            return Err(RegistryError::invalid(
                action,
                method,
                format!("parameter '{}' is declared twice", spec.name()),
            ));
        }
        match (spec.kind(), descriptor.call_type()) {
            (ParamKind::ReadRequest, CallType::StoreRead)
            | (ParamKind::Records, CallType::StoreModify) => {}
            (ParamKind::ReadRequest | ParamKind::Records, call_type) => {
                return Err(RegistryError::invalid(
                    action,
                    method,
                    format!(
                        "{} parameter '{}' is not allowed on a {call_type} method",
                        spec.kind().as_str(),
                        spec.name()
                    ),
                ));
            }
            _ => {}
        }
    }

    if descriptor.form_validator().is_some() && descriptor.call_type() != CallType::FormPost {
        return Err(RegistryError::invalid(
            action,
            method,
            "only FORM_POST methods take a validator",
        ));
    }
    if descriptor.event_name().is_some() && descriptor.call_type() != CallType::Poll {
        return Err(RegistryError::invalid(
            action,
            method,
            "only POLL methods publish events",
        ));
    }
    Ok(())
}
