//! Tests for [`build_paging_response`].

use rstest::{fixture, rstest};
use serde_json::{Value, json};

use crate::{ReadRequest, SortSpec, StoreResponse, build_paging_response};

#[fixture]
fn records() -> Vec<Value> {
    (0..25).map(|id| json!({"id": id, "bucket": id % 3})).collect()
}

fn paged(page: Option<i64>, limit: Option<i64>) -> ReadRequest {
    ReadRequest {
        page,
        limit,
        ..ReadRequest::default()
    }
}

fn ids(response: &StoreResponse<Value>) -> Vec<i64> {
    response
        .records
        .iter()
        .map(|record| record["id"].as_i64().expect("id"))
        .collect()
}

#[rstest]
fn second_page_holds_rows_ten_to_nineteen(records: Vec<Value>) {
    let response = build_paging_response(&paged(Some(2), Some(10)), records).expect("paged");
    assert_eq!(response.total, 25);
    assert!(response.success);
    assert_eq!(ids(&response), (10..20).collect::<Vec<_>>());
}

#[rstest]
fn third_page_is_partial(records: Vec<Value>) {
    let response = build_paging_response(&paged(Some(3), Some(10)), records).expect("paged");
    assert_eq!(ids(&response), (20..25).collect::<Vec<_>>());
}

#[rstest]
fn page_past_the_end_is_empty(records: Vec<Value>) {
    let response = build_paging_response(&paged(Some(4), Some(10)), records).expect("paged");
    assert_eq!(response.total, 25);
    assert!(response.records.is_empty());
}

#[rstest]
#[case::page_only(Some(2), None)]
#[case::limit_only(None, Some(10))]
#[case::neither(None, None)]
fn paging_needs_both_page_and_limit(
    records: Vec<Value>,
    #[case] page: Option<i64>,
    #[case] limit: Option<i64>,
) {
    let response = build_paging_response(&paged(page, limit), records).expect("unpaged");
    assert_eq!(response.total, 25);
    assert_eq!(response.records.len(), 25);
}

#[rstest]
#[case::zero_limit(Some(1), Some(0))]
#[case::negative_limit(Some(1), Some(-1))]
fn non_positive_limit_is_empty(
    records: Vec<Value>,
    #[case] page: Option<i64>,
    #[case] limit: Option<i64>,
) {
    let response = build_paging_response(&paged(page, limit), records).expect("paged");
    assert_eq!(response.total, 25);
    assert!(response.records.is_empty());
}

#[rstest]
fn non_positive_page_clamps_to_first_page(records: Vec<Value>) {
    let response = build_paging_response(&paged(Some(0), Some(5)), records).expect("paged");
    assert_eq!(ids(&response), [0, 1, 2, 3, 4]);
}

#[rstest]
fn pages_follow_sort_order(records: Vec<Value>) {
    let request = ReadRequest {
        sorters: vec![SortSpec::descending("bucket"), SortSpec::descending("id")],
        ..paged(Some(1), Some(4))
    };
    let response = build_paging_response(&request, records).expect("sorted");
    assert_eq!(ids(&response), [23, 20, 17, 14]);
}

#[test]
fn store_response_serializes_flat() {
    let response = StoreResponse::new(vec![json!({"id": 1})]);
    let json = serde_json::to_value(&response).expect("serialize");
    assert_eq!(json, json!({"total": 1, "records": [{"id": 1}], "success": true}));
}

#[test]
fn failed_response_carries_message() {
    let response = StoreResponse::<Value>::empty().failed("no access");
    assert!(!response.success);
    assert_eq!(response.message.as_deref(), Some("no access"));
}
