//! Binds loose call payloads to declared method parameters.
//!
//! Each call type has its own payload convention (positional array, named
//! object, read request, record list). [`bind`] first splits the payload
//! into its named map, positional elements, read request and records, then
//! walks the declared parameters in order. A parameter takes the first
//! value found in:
//!
//! 1. the invocation context, for injected kinds (locale, session, request
//!    metadata, read request, records);
//! 2. its request header, when declared header-sourced;
//! 3. the named map;
//! 4. the next unconsumed positional element;
//! 5. its declared default.
//!
//! Required parameters with no value fail the call before the handler runs.

mod arguments;
mod coerce;
mod payload;

use std::slice;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::context::RequestContext;
use crate::dispatch::CallError;
use crate::registry::{MethodDescriptor, ParamKind, ParamSpec};
use crate::session::{SessionHandle, SessionStore};

pub use arguments::{ArgValue, Arguments};

use self::payload::Payload;

/// A parameter could not be given a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot bind parameter '{parameter}': {reason}")]
pub struct BindingError {
    /// Declared parameter name.
    pub parameter: String,
    /// Why binding failed.
    pub reason: String,
}

impl BindingError {
    /// Creates a binding error for `parameter`.
    pub fn new(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    fn missing(spec: &ParamSpec) -> Self {
        Self::new(spec.name(), "missing required parameter")
    }
}

/// What the binder may draw on besides the payload.
#[derive(Clone, Copy)]
pub struct InvocationContext<'a> {
    request: &'a RequestContext,
    sessions: &'a Arc<dyn SessionStore>,
}

impl<'a> InvocationContext<'a> {
    /// Pairs request metadata with the session store.
    pub fn new(request: &'a RequestContext, sessions: &'a Arc<dyn SessionStore>) -> Self {
        Self { request, sessions }
    }

    /// Request metadata.
    pub fn request(&self) -> &'a RequestContext {
        self.request
    }
}

/// Binds `data` to the parameters of `descriptor`.
///
/// # Errors
///
/// Returns [`CallError::Binding`] for missing or mistyped parameters and
/// [`CallError::Query`] when a store read's read request is malformed.
pub fn bind(
    descriptor: &MethodDescriptor,
    data: &Value,
    context: InvocationContext<'_>,
) -> Result<Arguments, CallError> {
    let payload = Payload::split(descriptor.call_type(), data)?;
    let mut positional = payload.positional.iter();
    let mut arguments = Arguments::new();

    for spec in descriptor.params() {
        let value = match spec.kind() {
            ParamKind::Locale => ArgValue::Locale(context.request.locale().map(str::to_owned)),
            ParamKind::Request => ArgValue::Request(context.request.clone()),
            ParamKind::Session => ArgValue::Session(session(spec, context)?),
            ParamKind::ReadRequest => {
                ArgValue::ReadRequest(payload.read_request.clone().unwrap_or_default())
            }
            ParamKind::Records => ArgValue::Records(payload.records.clone().unwrap_or_default()),
            _ => ArgValue::Json(bind_value(spec, &payload, &mut positional, context)?),
        };
        arguments.push(spec.name(), value);
    }
    Ok(arguments)
}

fn session(spec: &ParamSpec, context: InvocationContext<'_>) -> Result<SessionHandle, BindingError> {
    context
        .request
        .session_id()
        .map(|id| SessionHandle::new(id, Arc::clone(context.sessions)))
        .ok_or_else(|| BindingError::new(spec.name(), "request carries no session"))
}

fn bind_value(
    spec: &ParamSpec,
    payload: &Payload<'_>,
    positional: &mut slice::Iter<'_, Value>,
    context: InvocationContext<'_>,
) -> Result<Value, BindingError> {
    let found = if let Some(text) = spec.header().and_then(|name| context.request.header(name)) {
        Some(Value::String(text.to_owned()))
    } else if let Some(value) = payload.named.get(spec.name()) {
        Some(value.clone())
    } else if spec.header().is_none() {
        positional.next().cloned()
    } else {
        None
    };

    match (found.filter(|value| !value.is_null()), spec.default_value()) {
        (Some(value), _) => coerce::to_kind(spec, &value),
        (None, Some(default)) => coerce::to_kind(spec, default),
        (None, None) if spec.is_required() => Err(BindingError::missing(spec)),
        (None, None) => Ok(Value::Null),
    }
}
