//! Method descriptors: how a registered method is called and bound.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::binder::Arguments;
use crate::invocation::{HandlerError, HandlerFn, HandlerOutput, Validator};

/// Protocol-level kind of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallType {
    /// Positional arguments in a JSON array.
    Simple,
    /// Named arguments in a JSON object.
    SimpleNamed,
    /// Loads the values of a form.
    FormLoad,
    /// Receives a submitted form.
    FormPost,
    /// Reads a page of store records.
    StoreRead,
    /// Creates, updates or destroys store records.
    StoreModify,
    /// Produces server-pushed events.
    Poll,
}

impl CallType {
    /// Wire name of the call type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "SIMPLE",
            Self::SimpleNamed => "SIMPLE_NAMED",
            Self::FormLoad => "FORM_LOAD",
            Self::FormPost => "FORM_POST",
            Self::StoreRead => "STORE_READ",
            Self::StoreModify => "STORE_MODIFY",
            Self::Poll => "POLL",
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Declared type of a method parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Signed 64-bit integer; numeric strings are accepted.
    Integer,
    /// Finite floating point number; numeric strings are accepted.
    Float,
    /// Boolean; `true`/`false`/`on`/`off`/`yes`/`no`/`1`/`0` strings are accepted.
    Boolean,
    /// Text; numbers and booleans are rendered as text.
    String,
    /// Any JSON value, passed through unchanged.
    Json,
    /// The read request of a store read.
    ReadRequest,
    /// The record list of a store modify.
    Records,
    /// The client locale.
    Locale,
    /// The caller's session.
    Session,
    /// Metadata of the inbound request.
    Request,
}

impl ParamKind {
    /// Whether the value comes from context rather than the payload scan.
    pub const fn is_injected(self) -> bool {
        matches!(
            self,
            Self::ReadRequest | Self::Records | Self::Locale | Self::Session | Self::Request
        )
    }

    /// Name used in binding diagnostics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Json => "json",
            Self::ReadRequest => "read request",
            Self::Records => "records",
            Self::Locale => "locale",
            Self::Session => "session",
            Self::Request => "request",
        }
    }
}

/// A declared method parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    name: String,
    kind: ParamKind,
    required: bool,
    default: Option<Value>,
    header: Option<String>,
}

impl ParamSpec {
    /// A required parameter.
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
            header: None,
        }
    }

    /// Makes the parameter optional; absent values bind as null.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Makes the parameter optional with a default value.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.required = false;
        self.default = Some(default);
        self
    }

    /// Reads the parameter from a request header before the payload.
    #[must_use]
    pub fn from_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared kind.
    pub const fn kind(&self) -> ParamKind {
        self.kind
    }

    /// Whether binding fails when no value is found.
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Declared default value.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Header the parameter is read from, if any.
    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }
}

/// Everything the dispatcher needs to call one method.
///
/// # Example
///
/// ```
/// use courierd::{CallType, HandlerOutput, MethodDescriptor, ParamKind, ParamSpec};
/// use serde_json::json;
///
/// let descriptor = MethodDescriptor::new(CallType::Simple, |args| {
///     let a = args.i64("a").unwrap_or_default();
///     let b = args.i64("b").unwrap_or_default();
///     Ok(HandlerOutput::Value(json!(a + b)))
/// })
/// .param(ParamSpec::new("a", ParamKind::Integer))
/// .param(ParamSpec::new("b", ParamKind::Integer));
/// assert_eq!(descriptor.payload_len(), 2);
/// ```
#[derive(Clone)]
pub struct MethodDescriptor {
    call_type: CallType,
    groups: Vec<String>,
    params: Vec<ParamSpec>,
    synchronize_on_session: bool,
    event: Option<String>,
    validator: Option<Arc<dyn Validator>>,
    handler: Arc<HandlerFn>,
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MethodDescriptor")
            .field("call_type", &self.call_type)
            .field("groups", &self.groups)
            .field("params", &self.params)
            .field("synchronize_on_session", &self.synchronize_on_session)
            .field("event", &self.event)
            .field("validator", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}

impl MethodDescriptor {
    /// Describes a method of the given call type served by `handler`.
    pub fn new<F>(call_type: CallType, handler: F) -> Self
    where
        F: Fn(&Arguments) -> Result<HandlerOutput, HandlerError> + Send + Sync + 'static,
    {
        Self {
            call_type,
            groups: Vec::new(),
            params: Vec::new(),
            synchronize_on_session: false,
            event: None,
            validator: None,
            handler: Arc::new(handler),
        }
    }

    /// Appends a declared parameter.
    #[must_use]
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Tags the method with a group.
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// Serialises invocations of this method per session.
    #[must_use]
    pub fn synchronized(mut self) -> Self {
        self.synchronize_on_session = true;
        self
    }

    /// Names the event a poll method publishes.
    #[must_use]
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Runs `validator` over form submissions before the handler.
    #[must_use]
    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Call type.
    pub const fn call_type(&self) -> CallType {
        self.call_type
    }

    /// Group tags.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Whether the method carries `group`.
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|tag| tag == group)
    }

    /// Declared parameters in declaration order.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Number of parameters the client supplies positionally.
    pub fn payload_len(&self) -> usize {
        self.params
            .iter()
            .filter(|spec| !spec.kind().is_injected() && spec.header().is_none())
            .count()
    }

    /// Whether invocations must be serialised per session.
    pub const fn synchronize_on_session(&self) -> bool {
        self.synchronize_on_session
    }

    /// Event name of a poll method, if set explicitly.
    pub fn event_name(&self) -> Option<&str> {
        self.event.as_deref()
    }

    /// Form validator, if any.
    pub fn form_validator(&self) -> Option<&Arc<dyn Validator>> {
        self.validator.as_ref()
    }

    /// Invokes the handler.
    ///
    /// # Errors
    ///
    /// Returns whatever the handler returns.
    pub fn invoke(&self, arguments: &Arguments) -> Result<HandlerOutput, HandlerError> {
        (self.handler)(arguments)
    }
}
