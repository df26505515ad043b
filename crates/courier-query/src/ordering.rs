//! Compound ordering over records.
//!
//! An [`Ordering`] is built once from a list of [`SortSpec`] clauses. Each
//! clause parses its property path up front; records expose values for a
//! path through the [`Record`] trait. Sorting extracts every key once per
//! record, checks the keys of each clause are mutually orderable, and then
//! performs a stable sort so records that tie on every clause keep their
//! original relative order.

use std::cmp;

use serde_json::{Number, Value};

use crate::{QueryError, SortDirection, SortSpec};

/// A dotted property path, split into segments once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    raw: String,
    segments: Vec<String>,
}

impl PropertyPath {
    /// Parses a dotted path such as `address.city`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_owned(),
            segments: raw.split('.').map(str::to_owned).collect(),
        }
    }

    /// Returns the path as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the path segments in traversal order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

/// A value extracted from a record for ordering.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// Missing property or explicit null; sorts before every other key.
    Null,
    /// Boolean value; `false` sorts before `true`.
    Bool(bool),
    /// Numeric value.
    Number(Number),
    /// Text, compared by code point.
    String(String),
    /// A value with no natural order (objects, arrays).
    Unorderable(&'static str),
}

impl SortKey {
    /// Extracts a key from a JSON value.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(*flag),
            Value::Number(number) => Self::Number(number.clone()),
            Value::String(text) => Self::String(text.clone()),
            Value::Array(_) => Self::Unorderable("array"),
            Value::Object(_) => Self::Unorderable("object"),
        }
    }

    /// Name of the key's kind, used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Unorderable(kind) => *kind,
        }
    }

    /// Compares two keys by their natural order.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NotComparable`] when the keys are of different
    /// kinds or either has no natural order.
    pub fn try_cmp(&self, other: &Self, property: &str) -> Result<cmp::Ordering, QueryError> {
        match (self, other) {
            (Self::Null, Self::Null) => Ok(cmp::Ordering::Equal),
            (Self::Null, right) if right.is_orderable() => Ok(cmp::Ordering::Less),
            (left, Self::Null) if left.is_orderable() => Ok(cmp::Ordering::Greater),
            (Self::Bool(left), Self::Bool(right)) => Ok(left.cmp(right)),
            (Self::Number(left), Self::Number(right)) => Ok(compare_numbers(left, right)),
            (Self::String(left), Self::String(right)) => Ok(left.cmp(right)),
            (left, right) => Err(QueryError::not_comparable(
                property,
                left.kind(),
                right.kind(),
            )),
        }
    }

    const fn is_orderable(&self) -> bool {
        !matches!(self, Self::Unorderable(_))
    }
}

fn compare_numbers(left: &Number, right: &Number) -> cmp::Ordering {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (left.as_u64(), right.as_u64()) {
        return a.cmp(&b);
    }
    let a = left.as_f64().unwrap_or(f64::NAN);
    let b = right.as_f64().unwrap_or(f64::NAN);
    a.total_cmp(&b)
}

/// Something an [`Ordering`] can sort.
pub trait Record {
    /// Returns the value found at `path`, or [`SortKey::Null`] when the path
    /// does not resolve.
    fn sort_key(&self, path: &PropertyPath) -> SortKey;
}

impl Record for Value {
    fn sort_key(&self, path: &PropertyPath) -> SortKey {
        let mut current = self;
        for segment in path.segments() {
            let next = match current {
                Self::Object(fields) => fields.get(segment),
                Self::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return SortKey::Null,
            }
        }
        SortKey::from_json(current)
    }
}

impl<T: Record + ?Sized> Record for &T {
    fn sort_key(&self, path: &PropertyPath) -> SortKey {
        (**self).sort_key(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Clause {
    path: PropertyPath,
    direction: SortDirection,
}

/// A lexicographic compound order; the first clause is primary.
///
/// # Example
///
/// ```
/// use courier_query::{Ordering, SortSpec};
/// use serde_json::json;
///
/// let ordering = Ordering::build(&[SortSpec::descending("age"), SortSpec::ascending("name")])
///     .expect("clauses present");
/// let sorted = ordering
///     .sorted(vec![
///         json!({"age": 5, "name": "b"}),
///         json!({"age": 5, "name": "a"}),
///         json!({"age": 7, "name": "z"}),
///     ])
///     .expect("orderable");
/// assert_eq!(sorted[0]["name"], "z");
/// assert_eq!(sorted[1]["name"], "a");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    clauses: Vec<Clause>,
}

impl Ordering {
    /// Builds an ordering, or returns `None` for an empty clause list.
    #[must_use]
    pub fn build(specs: &[SortSpec]) -> Option<Self> {
        if specs.is_empty() {
            return None;
        }
        let clauses = specs
            .iter()
            .map(|spec| Clause {
                path: PropertyPath::parse(&spec.property),
                direction: spec.direction,
            })
            .collect();
        Some(Self { clauses })
    }

    /// Number of clauses.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Always false; empty orderings are never built.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Compares two records clause by clause.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NotComparable`] when a clause that is reached
    /// extracts keys that cannot be ordered against each other.
    pub fn compare<R: Record>(&self, left: &R, right: &R) -> Result<cmp::Ordering, QueryError> {
        for clause in &self.clauses {
            let a = left.sort_key(&clause.path);
            let b = right.sort_key(&clause.path);
            let ordering = clause
                .direction
                .apply(a.try_cmp(&b, clause.path.as_str())?);
            if ordering != cmp::Ordering::Equal {
                return Ok(ordering);
            }
        }
        Ok(cmp::Ordering::Equal)
    }

    /// Returns the records in this order; ties keep their input order.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NotComparable`] when any clause extracts keys
    /// of mixed kinds (nulls aside) or keys with no natural order.
    pub fn sorted<R: Record>(&self, records: Vec<R>) -> Result<Vec<R>, QueryError> {
        let mut keyed: Vec<(Vec<SortKey>, R)> = records
            .into_iter()
            .map(|record| {
                let keys = self
                    .clauses
                    .iter()
                    .map(|clause| record.sort_key(&clause.path))
                    .collect();
                (keys, record)
            })
            .collect();

        if keyed.len() > 1 {
            for (index, clause) in self.clauses.iter().enumerate() {
                check_orderable(
                    clause.path.as_str(),
                    keyed.iter().filter_map(|(keys, _)| keys.get(index)),
                )?;
            }
        }

        keyed.sort_by(|(left, _), (right, _)| self.compare_checked(left, right));
        Ok(keyed.into_iter().map(|(_, record)| record).collect())
    }

    /// Compares key vectors that [`check_orderable`] has already accepted.
    fn compare_checked(&self, left: &[SortKey], right: &[SortKey]) -> cmp::Ordering {
        self.clauses
            .iter()
            .zip(left.iter().zip(right))
            .map(|(clause, (a, b))| {
                clause.direction.apply(
                    a.try_cmp(b, clause.path.as_str())
                        .unwrap_or(cmp::Ordering::Equal),
                )
            })
            .find(|ordering| *ordering != cmp::Ordering::Equal)
            .unwrap_or(cmp::Ordering::Equal)
    }
}

/// Verifies every non-null key of one clause shares a single orderable kind.
fn check_orderable<'a>(
    property: &str,
    keys: impl Iterator<Item = &'a SortKey>,
) -> Result<(), QueryError> {
    let mut seen: Option<&SortKey> = None;
    for key in keys {
        if let SortKey::Unorderable(kind) = key {
            return Err(QueryError::not_comparable(property, kind, kind));
        }
        if matches!(key, SortKey::Null) {
            continue;
        }
        match seen {
            None => seen = Some(key),
            Some(first) if std::mem::discriminant(first) != std::mem::discriminant(key) => {
                return Err(QueryError::not_comparable(property, first.kind(), key.kind()));
            }
            Some(_) => {}
        }
    }
    Ok(())
}
