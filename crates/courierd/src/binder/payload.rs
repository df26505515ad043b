//! Splits a call's `data` according to its call type.

use std::slice;

use serde_json::{Map, Value};

use courier_query::ReadRequest;

use crate::dispatch::CallError;
use crate::registry::CallType;

/// The parts of a payload the binder draws values from.
#[derive(Debug, Default)]
pub(super) struct Payload<'a> {
    pub(super) named: Map<String, Value>,
    pub(super) positional: &'a [Value],
    pub(super) read_request: Option<ReadRequest>,
    pub(super) records: Option<Vec<Value>>,
}

impl<'a> Payload<'a> {
    pub(super) fn split(call_type: CallType, data: &'a Value) -> Result<Self, CallError> {
        match data {
            Value::Null => Self::from_object(call_type, &Map::new()),
            Value::Object(fields) => Self::from_object(call_type, fields),
            Value::Array(items) => Self::from_array(call_type, items),
            scalar => Ok(Self {
                positional: slice::from_ref(scalar),
                ..Self::default()
            }),
        }
    }

    fn from_object(call_type: CallType, fields: &Map<String, Value>) -> Result<Self, CallError> {
        match call_type {
            CallType::StoreRead => {
                let request = ReadRequest::from_json(fields)?;
                Ok(Self {
                    named: request.params.clone(),
                    read_request: Some(request),
                    ..Self::default()
                })
            }
            CallType::StoreModify => Ok(Self::modification(fields)),
            _ => Ok(Self {
                named: fields.clone(),
                ..Self::default()
            }),
        }
    }

    fn from_array(call_type: CallType, items: &'a [Value]) -> Result<Self, CallError> {
        let Some((first, rest)) = items.split_first() else {
            return Self::from_object(call_type, &Map::new());
        };

        match (call_type, first) {
            (CallType::Simple | CallType::Poll, _) => Ok(Self {
                positional: items,
                ..Self::default()
            }),
            (CallType::SimpleNamed | CallType::FormPost, Value::Object(fields))
                if rest.is_empty() =>
            {
                Self::from_object(call_type, fields)
            }
            (CallType::FormLoad | CallType::StoreRead, Value::Object(fields)) => {
                let mut payload = Self::from_object(call_type, fields)?;
                payload.positional = rest;
                Ok(payload)
            }
            (CallType::StoreRead, Value::Null) => Ok(Self {
                positional: rest,
                read_request: Some(ReadRequest::default()),
                ..Self::default()
            }),
            (CallType::StoreModify, Value::Array(records)) => Ok(Self {
                positional: rest,
                records: Some(records.clone()),
                ..Self::default()
            }),
            (CallType::StoreModify, Value::Object(fields)) => {
                let mut payload = Self::modification(fields);
                payload.positional = rest;
                Ok(payload)
            }
            _ => Ok(Self {
                positional: items,
                ..Self::default()
            }),
        }
    }

    /// A store modify object either wraps its records under `records`,
    /// with the remaining keys as named parameters, or is itself a record.
    fn modification(fields: &Map<String, Value>) -> Self {
        let Some(records) = fields.get("records") else {
            return Self {
                records: Some(vec![Value::Object(fields.clone())]),
                ..Self::default()
            };
        };
        let records = match records {
            Value::Array(items) => items.clone(),
            Value::Null => Vec::new(),
            single => vec![single.clone()],
        };
        Self {
            named: fields
                .iter()
                .filter(|(key, _)| key.as_str() != "records")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            records: Some(records),
            ..Self::default()
        }
    }
}
