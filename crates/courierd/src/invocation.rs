//! Types exchanged between the dispatcher and business handlers.
//!
//! A handler receives bound [`Arguments`](crate::binder::Arguments) and
//! returns a [`HandlerOutput`] or a [`HandlerError`]. The dispatcher shapes
//! the output according to the method's call type before enveloping it.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use courier_query::StoreResponse;

use crate::binder::Arguments;
use crate::session::SessionError;

/// Failure raised by a business handler.
///
/// `kind` names the failure class and drives the exception message mapping;
/// `detail` carries diagnostics that only developer mode exposes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    kind: String,
    message: String,
    detail: Option<String>,
}

impl HandlerError {
    /// Creates a handler error of the given kind.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            detail: None,
        }
    }

    /// Creates an error for arguments the handler cannot work with.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new("IllegalArgument", message)
    }

    /// Creates an error for an unexpected failure inside the handler.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("InternalError", message)
    }

    /// Attaches diagnostic detail.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Failure class used for message mapping.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Message written by the handler.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Diagnostic detail, if any.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl From<SessionError> for HandlerError {
    fn from(error: SessionError) -> Self {
        Self::internal(error.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(error: serde_json::Error) -> Self {
        Self::new("SerializationError", error.to_string())
    }
}

/// Result of a form load: `{"success": true, "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormLoadResult {
    /// Protocol-level success flag.
    pub success: bool,
    /// Field values to populate the form with.
    pub data: Value,
}

impl FormLoadResult {
    /// Wraps field values in a successful form load result.
    pub fn new(data: Value) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Field name to messages, in field order.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Result of a form submission.
///
/// Failed submissions carry per-field error messages; handlers may attach
/// extra top-level keys such as a generated identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormPostResult {
    success: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    errors: FieldErrors,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl FormPostResult {
    /// A successful submission.
    pub fn success() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// A failed submission carrying the given field errors.
    pub fn from_errors(errors: FieldErrors) -> Self {
        Self {
            success: errors.is_empty(),
            errors,
            extra: Map::new(),
        }
    }

    /// Records a field error and marks the submission as failed.
    #[must_use]
    pub fn with_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self.success = false;
        self
    }

    /// Adds an extra top-level key to the result.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Whether the submission succeeded.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Field errors, keyed by field name.
    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }
}

/// What a handler hands back to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    /// Any JSON value, returned as the call result.
    Value(Value),
    /// A record collection; store reads page it, store modifies may wrap it.
    Records(Vec<Value>),
    /// A store response the handler built itself.
    Store(StoreResponse<Value>),
    /// A form load result.
    FormLoad(FormLoadResult),
    /// A form submission result.
    FormPost(FormPostResult),
    /// Nothing to return.
    Empty,
}

impl HandlerOutput {
    /// Serialises any value into a [`HandlerOutput::Value`].
    ///
    /// # Errors
    ///
    /// Returns a `SerializationError` handler error when serialisation fails.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, HandlerError> {
        Ok(Self::Value(serde_json::to_value(value)?))
    }
}

impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Vec<Value>> for HandlerOutput {
    fn from(records: Vec<Value>) -> Self {
        Self::Records(records)
    }
}

impl From<StoreResponse<Value>> for HandlerOutput {
    fn from(response: StoreResponse<Value>) -> Self {
        Self::Store(response)
    }
}

impl From<FormPostResult> for HandlerOutput {
    fn from(result: FormPostResult) -> Self {
        Self::FormPost(result)
    }
}

impl From<FormLoadResult> for HandlerOutput {
    fn from(result: FormLoadResult) -> Self {
        Self::FormLoad(result)
    }
}

/// Signature every exposed method implements.
pub type HandlerFn = dyn Fn(&Arguments) -> Result<HandlerOutput, HandlerError> + Send + Sync;

/// Validates form submissions before the handler runs.
///
/// A non-empty result stops the call: the handler is not invoked and the
/// caller receives a failed [`FormPostResult`] carrying the errors.
#[cfg_attr(test, mockall::automock)]
pub trait Validator: Send + Sync {
    /// Returns messages for every invalid field.
    fn validate(&self, arguments: &Arguments) -> FieldErrors;
}
