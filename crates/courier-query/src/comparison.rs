//! Comparison operators carried by typed filters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::QueryError;

/// Comparison operator attached to numeric and date filters.
///
/// # Example
///
/// ```
/// use courier_query::Comparison;
///
/// assert_eq!(Comparison::resolve("LT").ok(), Some(Comparison::LessThan));
/// assert!(Comparison::resolve("like").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    /// Strictly less than (`lt`).
    #[serde(rename = "lt")]
    LessThan,
    /// Strictly greater than (`gt`).
    #[serde(rename = "gt")]
    GreaterThan,
    /// Equal to (`eq`).
    #[serde(rename = "eq")]
    Equal,
}

impl Comparison {
    /// Resolves a comparison code (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownComparison`] when the code is not one of
    /// `lt`, `gt`, or `eq`.
    pub fn resolve(code: &str) -> Result<Self, QueryError> {
        match code.to_ascii_lowercase().as_str() {
            "lt" => Ok(Self::LessThan),
            "gt" => Ok(Self::GreaterThan),
            "eq" => Ok(Self::Equal),
            _ => Err(QueryError::unknown_comparison(code)),
        }
    }

    /// Returns the canonical short code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::LessThan => "lt",
            Self::GreaterThan => "gt",
            Self::Equal => "eq",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Comparison {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
    }
}
