//! Store responses and the paging builder.

use serde::Serialize;

use crate::{Ordering, QueryError, ReadRequest, Record};

/// Result of a store read: one page of records plus the unpaged total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreResponse<T> {
    /// Number of records before paging.
    pub total: usize,
    /// The requested page, in request order.
    pub records: Vec<T>,
    /// Protocol-level success flag.
    pub success: bool,
    /// Optional message shown by the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> StoreResponse<T> {
    /// Creates a successful response whose total is the record count.
    #[must_use]
    pub fn new(records: Vec<T>) -> Self {
        Self {
            total: records.len(),
            records,
            success: true,
            message: None,
        }
    }

    /// Creates a successful response with an explicit total.
    #[must_use]
    pub const fn with_total(records: Vec<T>, total: usize) -> Self {
        Self {
            total,
            records,
            success: true,
            message: None,
        }
    }

    /// Creates an empty response.
    #[must_use]
    pub const fn empty() -> Self {
        Self::with_total(Vec::new(), 0)
    }

    /// Marks the response as failed with a message.
    #[must_use]
    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.message = Some(message.into());
        self
    }

    /// Maps every record, keeping the total and flags.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> StoreResponse<U> {
        StoreResponse {
            total: self.total,
            records: self.records.into_iter().map(f).collect(),
            success: self.success,
            message: self.message,
        }
    }
}

/// Orders and pages `records` according to `request`.
///
/// Records are sorted by the request's sorters when there are any. Paging
/// applies only when both `page` and `limit` are present: the slice starts
/// at `(page - 1) * limit`, clamped to the record count, and holds at most
/// `limit` records. A non-positive limit yields an empty page.
///
/// # Errors
///
/// Returns [`QueryError::NotComparable`] when the sorters extract keys that
/// cannot be ordered.
///
/// # Example
///
/// ```
/// use courier_query::{build_paging_response, ReadRequest};
///
/// let request = ReadRequest { page: Some(2), limit: Some(10), ..ReadRequest::default() };
/// let records: Vec<serde_json::Value> = (0..25).map(serde_json::Value::from).collect();
/// let response = build_paging_response(&request, records).expect("no sorters");
/// assert_eq!(response.total, 25);
/// assert_eq!(response.records.first(), Some(&serde_json::Value::from(10)));
/// assert_eq!(response.records.len(), 10);
/// ```
pub fn build_paging_response<T: Record>(
    request: &ReadRequest,
    records: Vec<T>,
) -> Result<StoreResponse<T>, QueryError> {
    let total = records.len();
    let ordered = match Ordering::build(&request.sorters) {
        Some(ordering) => ordering.sorted(records)?,
        None => records,
    };

    let (Some(page), Some(limit)) = (request.page, request.limit) else {
        return Ok(StoreResponse::with_total(ordered, total));
    };

    let (start, end) = page_bounds(page, limit, total);
    let slice = ordered.into_iter().skip(start).take(end - start).collect();
    Ok(StoreResponse::with_total(slice, total))
}

/// Returns the half-open index range `[start, end)` of a page.
fn page_bounds(page: i64, limit: i64, total: usize) -> (usize, usize) {
    if limit <= 0 {
        return (0, 0);
    }
    let offset = page.saturating_sub(1).saturating_mul(limit).max(0);
    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(total);
    let span = usize::try_from(limit).unwrap_or(usize::MAX);
    let end = start.saturating_add(span).min(total);
    (start, end)
}
