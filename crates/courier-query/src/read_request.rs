//! Store read requests.
//!
//! A read request is pulled out of the first argument of a store read call.
//! Recognised keys (`page`, `limit`, `start`, `query`, `sort`, `dir`,
//! `group`, `groupBy`, `groupDir`, `filter`) populate typed fields; every
//! other key is kept in [`ReadRequest::params`] so the binder can hand it to
//! named method parameters.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{Filter, QueryError, SortDirection, SortSpec};

const CONSUMED_KEYS: &[&str] = &[
    "page", "limit", "start", "query", "sort", "dir", "group", "groupBy", "groupDir", "filter",
];

/// Paging, ordering, grouping and filtering parameters of a store read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadRequest {
    /// One-based page number.
    pub page: Option<i64>,
    /// Page size.
    pub limit: Option<i64>,
    /// Zero-based row offset.
    pub start: Option<i64>,
    /// Free text typed into a remote combo box.
    pub query: Option<String>,
    /// Ordering clauses, primary first.
    pub sorters: Vec<SortSpec>,
    /// Grouping clauses, primary first.
    pub groups: Vec<SortSpec>,
    /// Group tag naming which handler variant serves the read.
    pub group: Option<String>,
    /// Parsed filters; descriptors that resolve to nothing are omitted.
    pub filters: Vec<Filter>,
    /// Keys the read request did not consume.
    pub params: Map<String, Value>,
}

impl ReadRequest {
    /// Builds a read request from the first argument of a store read call.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::TypeCoercion`] when `page`, `limit` or `start`
    /// is not an integer, and propagates filter parse failures.
    pub fn from_json(data: &Map<String, Value>) -> Result<Self, QueryError> {
        let mut request = Self {
            page: integer(data, "page")?,
            limit: integer(data, "limit")?,
            start: integer(data, "start")?,
            query: text(data, "query"),
            ..Self::default()
        };

        if let Some(limit) = request.limit.filter(|limit| *limit > 0) {
            match (request.page, request.start) {
                (Some(page), None) => request.start = Some(limit.saturating_mul(page.saturating_sub(1))),
                (None, Some(start)) => request.page = start.checked_div(limit).map(|rows| rows.saturating_add(1)),
                _ => {}
            }
        }

        request.sorters = match (data.get("sort"), text(data, "dir")) {
            (Some(Value::String(property)), Some(dir)) if !property.starts_with('[') => {
                vec![SortSpec::new(property.clone(), SortDirection::parse(&dir))]
            }
            (Some(value), _) => clauses(value),
            (None, _) => Vec::new(),
        };

        match data.get("group") {
            Some(Value::String(tag)) => request.group = Some(tag.clone()),
            Some(value) => request.groups = clauses(value),
            None => {}
        }
        if let (Some(property), Some(dir)) = (text(data, "groupBy"), text(data, "groupDir")) {
            request.groups = vec![SortSpec::new(property, SortDirection::parse(&dir))];
        }

        if let Some(raw) = data.get("filter") {
            request.filters = filters(raw)?;
        }

        request.params = data
            .iter()
            .filter(|(key, _)| !CONSUMED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(request)
    }

    /// Returns true when both `page` and `limit` are present.
    #[must_use]
    pub const fn is_paged(&self) -> bool {
        self.page.is_some() && self.limit.is_some()
    }

    /// Returns the first filter on `field`.
    #[must_use]
    pub fn first_filter_for_field(&self, field: &str) -> Option<&Filter> {
        self.filters.iter().find(|filter| filter.field() == field)
    }

    /// Returns every filter on `field`, in submission order.
    pub fn all_filters_for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a Filter> {
        self.filters.iter().filter(move |filter| filter.field() == field)
    }
}

fn integer(data: &Map<String, Value>, key: &str) -> Result<Option<i64>, QueryError> {
    match data.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_i64()
            .map(Some)
            .ok_or_else(|| QueryError::type_coercion(key, "integer", number.to_string())),
        Some(Value::String(raw)) if raw.trim().is_empty() => Ok(None),
        Some(Value::String(raw)) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| QueryError::type_coercion(key, "integer", raw.clone())),
        Some(other) => Err(QueryError::type_coercion(key, "integer", other.to_string())),
    }
}

fn text(data: &Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(raw) => Some(raw.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Reads sort or group clauses from an array of `{property, direction}`
/// objects, or from a JSON string holding such an array. Entries without a
/// property are skipped.
fn clauses(value: &Value) -> Vec<SortSpec> {
    let decoded;
    let items = match value {
        Value::Array(items) => items,
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => {
                decoded = items;
                &decoded
            }
            _ => return Vec::new(),
        },
        Value::Object(_) => return clause(value).into_iter().collect(),
        _ => return Vec::new(),
    };
    items.iter().filter_map(clause).collect()
}

fn clause(value: &Value) -> Option<SortSpec> {
    let fields = value.as_object()?;
    let property = fields.get("property")?.as_str()?;
    let direction = fields
        .get("direction")
        .and_then(Value::as_str)
        .map(SortDirection::parse)
        .unwrap_or_default();
    Some(SortSpec::new(property, direction))
}

fn filters(raw: &Value) -> Result<Vec<Filter>, QueryError> {
    let decoded;
    let items = match raw {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        Value::String(encoded) => {
            decoded = serde_json::from_str::<Vec<Value>>(encoded)
                .map_err(|err| QueryError::filter_parse("filter", err.to_string()))?;
            &decoded
        }
        other => {
            return Err(QueryError::filter_parse(
                "filter",
                format!("expected an array of filter objects, got {other}"),
            ));
        }
    };

    let mut parsed = Vec::with_capacity(items.len());
    for item in items {
        let fields = item.as_object().ok_or_else(|| {
            QueryError::filter_parse("filter", format!("expected a filter object, got {item}"))
        })?;
        if let Some(filter) = Filter::parse(fields)? {
            parsed.push(filter);
        }
    }
    Ok(parsed)
}
