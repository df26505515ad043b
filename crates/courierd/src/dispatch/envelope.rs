//! Call objects and the envelopes sent back for them.

use serde::Serialize;
use serde_json::Value;

use super::errors::CallError;

const DEFAULT_TYPE: &str = "rpc";

/// One call of a batch, read leniently so that even a malformed call can be
/// answered with its tid.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    action: Option<String>,
    method: Option<String>,
    kind: String,
    tid: Value,
    data: Value,
}

impl CallRequest {
    /// Extracts the call fields from a JSON value.
    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_owned);
        Self {
            action: text("action").filter(|name| !name.is_empty()),
            method: text("method").filter(|name| !name.is_empty()),
            kind: text("type").unwrap_or_else(|| DEFAULT_TYPE.to_owned()),
            tid: value.get("tid").cloned().unwrap_or(Value::Null),
            data: value.get("data").cloned().unwrap_or(Value::Null),
        }
    }

    /// Returns the action and method, or why the call cannot be routed.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::MalformedCall`] when either name is missing.
    pub fn target(&self) -> Result<(&str, &str), CallError> {
        match (self.action.as_deref(), self.method.as_deref()) {
            (Some(action), Some(method)) => Ok((action, method)),
            (None, _) => Err(CallError::malformed("call has no action")),
            (Some(_), None) => Err(CallError::malformed("call has no method")),
        }
    }

    /// Caller-assigned transaction id.
    pub fn tid(&self) -> &Value {
        &self.tid
    }

    /// Call payload.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Request type echoed on success.
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

/// The answer to one call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "type")]
    kind: String,
    tid: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    diagnostic: Option<String>,
}

impl ResponseEnvelope {
    /// A successful call carrying `result`.
    pub fn success(request: &CallRequest, result: Value) -> Self {
        Self {
            kind: request.kind.clone(),
            tid: request.tid.clone(),
            action: request.action.clone(),
            method: request.method.clone(),
            result: Some(result),
            message: None,
            diagnostic: None,
        }
    }

    /// A failed call.
    pub fn exception(request: &CallRequest, message: String, diagnostic: Option<String>) -> Self {
        Self {
            kind: "exception".to_owned(),
            tid: request.tid.clone(),
            action: request.action.clone(),
            method: request.method.clone(),
            result: None,
            message: Some(message),
            diagnostic,
        }
    }

    /// Whether this envelope reports a failure.
    pub fn is_exception(&self) -> bool {
        self.kind == "exception"
    }

    /// Echoed transaction id.
    pub fn tid(&self) -> &Value {
        &self.tid
    }

    /// Call result, on success.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Client-facing failure message.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Serialises the envelope.
    pub fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A message pushed to subscribers of a poll event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    diagnostic: Option<String>,
}

impl PollMessage {
    /// An event carrying `data`.
    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Self {
            kind: "event",
            name: name.into(),
            data: Some(data),
            message: None,
            diagnostic: None,
        }
    }

    /// A failed poll.
    pub fn exception(name: impl Into<String>, message: String, diagnostic: Option<String>) -> Self {
        Self {
            kind: "exception",
            name: name.into(),
            data: None,
            message: Some(message),
            diagnostic,
        }
    }

    /// Event name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event payload, on success.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Whether the poll failed.
    pub fn is_exception(&self) -> bool {
        self.kind == "exception"
    }

    /// Failure message.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}
