//! Per-call failure taxonomy.

use std::time::Duration;

use thiserror::Error;

use courier_query::QueryError;

use crate::binder::BindingError;
use crate::invocation::HandlerError;
use crate::session::SessionError;

/// Why a single call failed.
///
/// A `CallError` never escapes its call: the router turns it into an
/// exception envelope and carries on with the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// No method is registered under the action and method name.
    #[error("no method '{method}' on action '{action}'")]
    Routing {
        /// Requested action.
        action: String,
        /// Requested method.
        method: String,
    },

    /// A parameter could not be bound.
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// The read request of a store read was malformed, or its records
    /// could not be ordered.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The handler failed.
    #[error(transparent)]
    Invocation(#[from] HandlerError),

    /// The batch deadline passed before the call completed.
    #[error("call did not complete within {}ms", budget.as_millis())]
    Timeout {
        /// The batch budget.
        budget: Duration,
    },

    /// The call object lacks its action or method.
    #[error("malformed call: {reason}")]
    MalformedCall {
        /// What is missing or wrong.
        reason: String,
    },

    /// The dispatcher itself failed, e.g. a poisoned lock.
    #[error("internal dispatcher error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl CallError {
    /// Creates a routing error.
    pub fn routing(action: impl Into<String>, method: impl Into<String>) -> Self {
        Self::Routing {
            action: action.into(),
            method: method.into(),
        }
    }

    /// Creates a malformed call error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedCall {
            reason: reason.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Failure class, used to look up a client message.
    pub fn kind(&self) -> &str {
        match self {
            Self::Routing { .. } => "RoutingError",
            Self::Binding(_) => "BindingError",
            Self::Query(error) => error.kind(),
            Self::Invocation(error) => error.kind(),
            Self::Timeout { .. } => "TimeoutError",
            Self::MalformedCall { .. } => "MalformedCallError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// Full diagnostic text, including handler detail when present.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Invocation(error) => match error.detail() {
                Some(detail) => format!("{}: {error}\n{detail}", error.kind()),
                None => format!("{}: {error}", error.kind()),
            },
            other => format!("{}: {other}", other.kind()),
        }
    }
}

impl From<SessionError> for CallError {
    fn from(error: SessionError) -> Self {
        Self::internal(error.to_string())
    }
}
