use serde_json::{Map, Value};

use courier_query::ReadRequest;

use crate::context::RequestContext;
use crate::session::SessionHandle;

/// A bound argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// A payload value, already coerced to the declared kind.
    Json(Value),
    /// The read request of a store read.
    ReadRequest(ReadRequest),
    /// The record list of a store modify.
    Records(Vec<Value>),
    /// The client locale, when known.
    Locale(Option<String>),
    /// The caller's session.
    Session(SessionHandle),
    /// Metadata of the inbound request.
    Request(RequestContext),
}

/// Bound arguments in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Vec<(String, ArgValue)>,
}

impl Arguments {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an argument.
    pub fn push(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.push((name.into(), value));
    }

    /// Appends an argument, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: ArgValue) -> Self {
        self.push(name, value);
        self
    }

    /// The argument bound to `name`.
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
    }

    /// The argument at declaration position `index`.
    pub fn at(&self, index: usize) -> Option<&ArgValue> {
        self.values.get(index).map(|(_, value)| value)
    }

    /// The payload value bound to `name`, null included.
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.get(name)? {
            ArgValue::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Integer argument.
    pub fn i64(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(Value::as_i64)
    }

    /// Floating point argument.
    pub fn f64(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(Value::as_f64)
    }

    /// Boolean argument.
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.value(name).and_then(Value::as_bool)
    }

    /// Text argument.
    pub fn str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    /// The first read request argument.
    pub fn read_request(&self) -> Option<&ReadRequest> {
        self.values.iter().find_map(|(_, value)| match value {
            ArgValue::ReadRequest(request) => Some(request),
            _ => None,
        })
    }

    /// The first record list argument.
    pub fn records(&self) -> Option<&[Value]> {
        self.values.iter().find_map(|(_, value)| match value {
            ArgValue::Records(records) => Some(records.as_slice()),
            _ => None,
        })
    }

    /// The first session argument.
    pub fn session(&self) -> Option<&SessionHandle> {
        self.values.iter().find_map(|(_, value)| match value {
            ArgValue::Session(session) => Some(session),
            _ => None,
        })
    }

    /// The first locale argument.
    pub fn locale(&self) -> Option<&str> {
        self.values.iter().find_map(|(_, value)| match value {
            ArgValue::Locale(locale) => locale.as_deref(),
            _ => None,
        })
    }

    /// The first request metadata argument.
    pub fn request(&self) -> Option<&RequestContext> {
        self.values.iter().find_map(|(_, value)| match value {
            ArgValue::Request(request) => Some(request),
            _ => None,
        })
    }

    /// Payload values as a JSON object, e.g. for form validation.
    pub fn fields(&self) -> Map<String, Value> {
        self.values
            .iter()
            .filter_map(|(name, value)| match value {
                ArgValue::Json(json) => Some((name.clone(), json.clone())),
                _ => None,
            })
            .collect()
    }

    /// Iterates over `(name, value)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of bound arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing was bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
