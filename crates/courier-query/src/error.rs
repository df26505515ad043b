//! Error types raised while parsing and evaluating store queries.
//!
//! Filter construction, comparison lookup, and ordering evaluation all report
//! through [`QueryError`]. Each variant names the failing field or property so
//! the dispatcher can surface an actionable message for the affected call.

use thiserror::Error;

/// Errors surfaced by the query model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A comparison code did not match any known operator.
    #[error("unknown comparison '{code}'")]
    UnknownComparison {
        /// The code as supplied by the client.
        code: String,
    },

    /// A filter value could not be converted to the type its tag demands.
    #[error("filter '{field}' expects a {expected} value, got {found}")]
    TypeCoercion {
        /// Field the filter applies to.
        field: String,
        /// Name of the expected value type.
        expected: &'static str,
        /// Rendering of the offending value.
        found: String,
    },

    /// A filter descriptor had a structure that cannot be interpreted.
    #[error("malformed filter '{field}': {reason}")]
    FilterParse {
        /// Field the filter applies to, or an empty string when unknown.
        field: String,
        /// Description of the structural problem.
        reason: String,
    },

    /// Two extracted sort keys cannot be ordered against each other.
    #[error("cannot order property '{property}': {left} is not comparable with {right}")]
    NotComparable {
        /// Property path that produced the keys.
        property: String,
        /// Kind of the first key.
        left: &'static str,
        /// Kind of the second key.
        right: &'static str,
    },
}

impl QueryError {
    /// Creates an unknown comparison error.
    #[must_use]
    pub fn unknown_comparison(code: impl Into<String>) -> Self {
        Self::UnknownComparison { code: code.into() }
    }

    /// Creates a type coercion error.
    #[must_use]
    pub fn type_coercion(
        field: impl Into<String>,
        expected: &'static str,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeCoercion {
            field: field.into(),
            expected,
            found: found.into(),
        }
    }

    /// Creates a malformed filter error.
    #[must_use]
    pub fn filter_parse(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FilterParse {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a not comparable error.
    #[must_use]
    pub fn not_comparable(
        property: impl Into<String>,
        left: &'static str,
        right: &'static str,
    ) -> Self {
        Self::NotComparable {
            property: property.into(),
            left,
            right,
        }
    }

    /// Returns a stable kind label used when reporting the error to clients.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownComparison { .. } => "ComparisonLookupError",
            Self::TypeCoercion { .. } => "TypeCoercionError",
            Self::FilterParse { .. } => "FilterParseError",
            Self::NotComparable { .. } => "NotComparableError",
        }
    }
}
