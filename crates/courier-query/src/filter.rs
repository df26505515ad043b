//! Typed store filters and the factory that builds them from loose JSON.
//!
//! Grid components submit filters as JSON objects. Filters produced by a
//! filter feature carry an explicit `type` tag; filters produced by a plain
//! `store.filter(...)` call only carry a property and a value, so the variant
//! is inferred from the runtime type of the value. A descriptor without a
//! field name, or with a tag this module does not know, is dropped rather
//! than rejected.

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::{Comparison, QueryError};

/// Typed payload of a filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FilterValue {
    /// Numeric comparison value.
    Numeric(Number),
    /// Free text value.
    String(String),
    /// Date kept in the client's textual format; comparators parse it.
    Date(String),
    /// Ordered list of accepted values.
    List(Vec<String>),
    /// Boolean flag.
    Boolean(bool),
}

impl FilterValue {
    /// Returns the variant name used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Numeric(_) => "numeric",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::List(_) => "list",
            Self::Boolean(_) => "boolean",
        }
    }
}

/// A single field-level predicate from a store read request.
///
/// # Example
///
/// ```
/// use courier_query::{Comparison, Filter, FilterValue};
/// use serde_json::json;
///
/// let raw = json!({"field": "age", "type": "numeric", "comparison": "lt", "value": 12});
/// let filter = Filter::parse(raw.as_object().expect("object"))
///     .expect("valid filter")
///     .expect("filter present");
/// assert_eq!(filter.field(), "age");
/// assert_eq!(filter.comparison(), Some(Comparison::LessThan));
/// assert_eq!(filter.value(), &FilterValue::Numeric(12.into()));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_comparison: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison: Option<Comparison>,
    #[serde(flatten)]
    value: FilterValue,
}

impl Filter {
    /// Builds a filter without a comparison operator.
    #[must_use]
    pub fn new(field: impl Into<String>, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            raw_comparison: None,
            comparison: None,
            value,
        }
    }

    /// Attaches a resolved comparison operator.
    #[must_use]
    pub fn with_comparison(mut self, comparison: Comparison) -> Self {
        self.raw_comparison = Some(comparison.code().to_owned());
        self.comparison = Some(comparison);
        self
    }

    /// Parses a filter descriptor.
    ///
    /// Returns `Ok(None)` when the descriptor names no field (neither
    /// `field` nor `property`) or carries an unrecognised `type` tag.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownComparison`] for an unrecognised
    /// `comparison`/`operator` code, [`QueryError::TypeCoercion`] when a
    /// numeric or boolean tag meets a value that cannot be converted, and
    /// [`QueryError::FilterParse`] when the descriptor or its value has the
    /// wrong shape for its tag.
    pub fn parse(fields: &Map<String, Value>) -> Result<Option<Self>, QueryError> {
        let Some(field) = field_name(fields)? else {
            return Ok(None);
        };
        let raw_comparison = comparison_code(fields, &field)?;
        let comparison = raw_comparison
            .as_deref()
            .map(Comparison::resolve)
            .transpose()?;
        let source = fields.get("value").unwrap_or(&Value::Null);

        let value = match fields.get("type") {
            None | Some(Value::Null) => infer_value(source),
            Some(Value::String(tag)) => match tagged_value(tag, &field, source)? {
                Some(value) => value,
                None => return Ok(None),
            },
            Some(other) => {
                return Err(QueryError::filter_parse(
                    field,
                    format!("type tag must be a string, got {other}"),
                ));
            }
        };

        Ok(Some(Self {
            field,
            raw_comparison,
            comparison,
            value,
        }))
    }

    /// Field or property the filter applies to.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Comparison code exactly as the client sent it.
    #[must_use]
    pub fn raw_comparison(&self) -> Option<&str> {
        self.raw_comparison.as_deref()
    }

    /// Resolved comparison operator, if the filter carried one.
    #[must_use]
    pub const fn comparison(&self) -> Option<Comparison> {
        self.comparison
    }

    /// Typed filter value.
    #[must_use]
    pub const fn value(&self) -> &FilterValue {
        &self.value
    }

    /// Returns the numeric value for numeric filters.
    #[must_use]
    pub const fn as_numeric(&self) -> Option<&Number> {
        match &self.value {
            FilterValue::Numeric(number) => Some(number),
            _ => None,
        }
    }

    /// Returns the text for string filters.
    #[must_use]
    pub fn as_string(&self) -> Option<&str> {
        match &self.value {
            FilterValue::String(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the unparsed date text for date filters.
    #[must_use]
    pub fn as_date(&self) -> Option<&str> {
        match &self.value {
            FilterValue::Date(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the accepted values for list filters.
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match &self.value {
            FilterValue::List(values) => Some(values),
            _ => None,
        }
    }

    /// Returns the flag for boolean filters.
    #[must_use]
    pub const fn as_boolean(&self) -> Option<bool> {
        match self.value {
            FilterValue::Boolean(flag) => Some(flag),
            _ => None,
        }
    }
}

fn field_name(fields: &Map<String, Value>) -> Result<Option<String>, QueryError> {
    let raw = fields.get("field").or_else(|| fields.get("property"));
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(name)) => Ok(Some(name.clone())),
        Some(other) => Err(QueryError::filter_parse(
            "",
            format!("field name must be a string, got {other}"),
        )),
    }
}

fn comparison_code(fields: &Map<String, Value>, field: &str) -> Result<Option<String>, QueryError> {
    let raw = match fields.get("comparison") {
        None | Some(Value::Null) => fields.get("operator"),
        present => present,
    };
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(code)) => Ok(Some(code.clone())),
        Some(other) => Err(QueryError::filter_parse(
            field,
            format!("comparison must be a string, got {other}"),
        )),
    }
}

fn tagged_value(tag: &str, field: &str, source: &Value) -> Result<Option<FilterValue>, QueryError> {
    let value = match tag.to_ascii_lowercase().as_str() {
        "numeric" | "int" | "float" | "number" => FilterValue::Numeric(coerce_number(field, source)?),
        "string" => FilterValue::String(scalar_text(field, source)?),
        "date" => match source {
            Value::String(text) => FilterValue::Date(text.clone()),
            other => {
                return Err(QueryError::filter_parse(
                    field,
                    format!("date filter expects a string, got {other}"),
                ));
            }
        },
        "list" | "combo" => FilterValue::List(list_values(field, source)?),
        "boolean" => FilterValue::Boolean(coerce_boolean(field, source)?),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn infer_value(source: &Value) -> FilterValue {
    match source {
        Value::Number(number) => FilterValue::Numeric(number.clone()),
        Value::Bool(flag) => FilterValue::Boolean(*flag),
        Value::Array(items) => FilterValue::List(items.iter().map(render).collect()),
        Value::String(text) => FilterValue::String(text.clone()),
        Value::Null => FilterValue::String(String::new()),
        Value::Object(_) => FilterValue::String(source.to_string()),
    }
}

/// Converts numbers and numeric strings into a JSON number.
fn coerce_number(field: &str, source: &Value) -> Result<Number, QueryError> {
    match source {
        Value::Number(number) => Ok(number.clone()),
        Value::String(text) => {
            let trimmed = text.trim();
            if let Ok(integer) = trimmed.parse::<i64>() {
                return Ok(Number::from(integer));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .ok_or_else(|| QueryError::type_coercion(field, "numeric", source.to_string()))
        }
        other => Err(QueryError::type_coercion(field, "numeric", other.to_string())),
    }
}

/// Accepts booleans and the usual textual spellings of true and false.
fn coerce_boolean(field: &str, source: &Value) -> Result<bool, QueryError> {
    match source {
        Value::Bool(flag) => Ok(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => Ok(true),
            "false" | "off" | "no" | "0" => Ok(false),
            _ => Err(QueryError::type_coercion(field, "boolean", source.to_string())),
        },
        other => Err(QueryError::type_coercion(field, "boolean", other.to_string())),
    }
}

fn scalar_text(field: &str, source: &Value) -> Result<String, QueryError> {
    match source {
        Value::String(text) => Ok(text.clone()),
        Value::Number(_) | Value::Bool(_) => Ok(source.to_string()),
        other => Err(QueryError::filter_parse(
            field,
            format!("string filter expects a scalar value, got {other}"),
        )),
    }
}

fn list_values(field: &str, source: &Value) -> Result<Vec<String>, QueryError> {
    match source {
        Value::String(text) => Ok(text.split(',').map(str::to_owned).collect()),
        Value::Array(items) => items
            .iter()
            .map(|item| scalar_text(field, item))
            .collect(),
        other => Err(QueryError::filter_parse(
            field,
            format!("list filter expects a string or an array, got {other}"),
        )),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
