//! Query model and engine for store reads.
//!
//! Grid and list components on the client describe what they want to see as
//! a loose JSON object: which page, how large, how to order, how to group and
//! how to filter. This crate turns that object into typed values and applies
//! the ordering and paging parts to an in-memory result set.
//!
//! # Core types
//!
//! - [`Comparison`]: the `lt` / `gt` / `eq` operator vocabulary
//! - [`Filter`] and [`FilterValue`]: typed field predicates
//! - [`SortSpec`] and [`SortDirection`]: ordering and grouping clauses
//! - [`Ordering`] and [`Record`]: compound, stable record ordering
//! - [`ReadRequest`]: the parsed read descriptor
//! - [`StoreResponse`] and [`build_paging_response`]: sorted, paged results
//!
//! # Example
//!
//! ```
//! use courier_query::{build_paging_response, ReadRequest};
//! use serde_json::json;
//!
//! let raw = json!({"page": 1, "limit": 2, "sort": [{"property": "n", "direction": "DESC"}]});
//! let request = ReadRequest::from_json(raw.as_object().expect("object")).expect("valid request");
//! let records = vec![json!({"n": 1}), json!({"n": 3}), json!({"n": 2})];
//! let response = build_paging_response(&request, records).expect("orderable");
//! assert_eq!(response.total, 3);
//! assert_eq!(response.records, vec![json!({"n": 3}), json!({"n": 2})]);
//! ```

mod comparison;
mod error;
mod filter;
mod ordering;
mod paging;
mod read_request;
mod sort;

pub use comparison::Comparison;
pub use error::QueryError;
pub use filter::{Filter, FilterValue};
pub use ordering::{Ordering, PropertyPath, Record, SortKey};
pub use paging::{StoreResponse, build_paging_response};
pub use read_request::ReadRequest;
pub use sort::{SortDirection, SortSpec};

#[cfg(test)]
mod tests;
