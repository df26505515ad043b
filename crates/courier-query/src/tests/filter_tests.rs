//! Tests for [`Filter::parse`].

use rstest::rstest;
use serde_json::{Map, Value, json};

use crate::{Comparison, Filter, FilterValue, QueryError};

fn parse(raw: &Value) -> Result<Option<Filter>, QueryError> {
    Filter::parse(raw.as_object().expect("filter descriptor must be an object"))
}

fn parse_present(raw: &Value) -> Filter {
    parse(raw)
        .expect("filter should parse")
        .expect("filter should be present")
}

#[test]
fn typed_numeric_filter_with_comparison() {
    let filter = parse_present(&json!({
        "field": "a", "type": "numeric", "comparison": "lt", "value": 12
    }));
    assert_eq!(filter.field(), "a");
    assert_eq!(filter.comparison(), Some(Comparison::LessThan));
    assert_eq!(filter.raw_comparison(), Some("lt"));
    assert_eq!(filter.value(), &FilterValue::Numeric(12.into()));
}

#[test]
fn untyped_number_infers_numeric_filter() {
    let filter = parse_present(&json!({"property": "a", "value": 10}));
    assert_eq!(filter.field(), "a");
    assert_eq!(filter.comparison(), None);
    assert_eq!(filter.as_numeric().and_then(serde_json::Number::as_i64), Some(10));
}

#[test]
fn list_string_is_split_in_order() {
    let filter = parse_present(&json!({"field": "a", "type": "list", "value": "one,two,three"}));
    assert_eq!(
        filter.as_list(),
        Some(["one", "two", "three"].map(String::from).as_slice())
    );
}

#[test]
fn combo_array_keeps_elements() {
    let filter = parse_present(&json!({"field": "a", "type": "combo", "value": ["x", 2, true]}));
    assert_eq!(
        filter.value(),
        &FilterValue::List(vec!["x".to_owned(), "2".to_owned(), "true".to_owned()])
    );
}

#[rstest]
#[case::unknown_type_without_field(json!({"type": "xy", "value": "v"}))]
#[case::no_field_no_type(json!({"value": "v"}))]
#[case::unknown_type_with_field(json!({"field": "a", "type": "xy", "value": "v"}))]
#[case::null_field(json!({"field": null, "value": 1}))]
fn ambiguous_descriptors_are_dropped(#[case] raw: Value) {
    assert_eq!(parse(&raw), Ok(None));
}

#[rstest]
#[case::numeric_string(json!("42"), 42.into())]
#[case::negative(json!(-7), (-7).into())]
#[case::padded(json!(" 5 "), 5.into())]
fn numeric_tag_coerces(#[case] value: Value, #[case] expected: serde_json::Number) {
    let filter = parse_present(&json!({"field": "n", "type": "int", "value": value}));
    assert_eq!(filter.value(), &FilterValue::Numeric(expected));
}

#[test]
fn numeric_tag_accepts_fractional_strings() {
    let filter = parse_present(&json!({"field": "n", "type": "float", "value": "2.5"}));
    assert_eq!(filter.as_numeric().and_then(serde_json::Number::as_f64), Some(2.5));
}

#[rstest]
#[case::text(json!("abc"))]
#[case::boolean(json!(true))]
#[case::null(Value::Null)]
#[case::array(json!([1]))]
fn numeric_tag_rejects_non_numbers(#[case] value: Value) {
    let err = parse(&json!({"field": "n", "type": "number", "value": value}))
        .expect_err("non numeric value");
    assert!(matches!(err, QueryError::TypeCoercion { ref field, expected: "numeric", .. } if field == "n"));
    assert_eq!(err.kind(), "TypeCoercionError");
}

#[rstest]
#[case(json!(true), true)]
#[case(json!("false"), false)]
#[case(json!("TRUE"), true)]
#[case(json!("off"), false)]
fn boolean_tag_coerces(#[case] value: Value, #[case] expected: bool) {
    let filter = parse_present(&json!({"field": "b", "type": "boolean", "value": value}));
    assert_eq!(filter.as_boolean(), Some(expected));
}

#[test]
fn boolean_tag_rejects_other_text() {
    let err = parse(&json!({"field": "b", "type": "boolean", "value": "maybe"}))
        .expect_err("not a boolean");
    assert_eq!(err.kind(), "TypeCoercionError");
}

#[test]
fn date_tag_keeps_text_unparsed() {
    let filter = parse_present(&json!({
        "field": "d", "type": "date", "comparison": "gt", "value": "03/15/2024"
    }));
    assert_eq!(filter.as_date(), Some("03/15/2024"));
    assert_eq!(filter.comparison(), Some(Comparison::GreaterThan));
}

#[rstest]
#[case::date_number(json!({"field": "d", "type": "date", "value": 3}))]
#[case::list_number(json!({"field": "l", "type": "list", "value": 3}))]
#[case::list_nested(json!({"field": "l", "type": "list", "value": [[1]]}))]
#[case::string_object(json!({"field": "s", "type": "string", "value": {"x": 1}}))]
#[case::type_not_text(json!({"field": "s", "type": 4, "value": "x"}))]
#[case::field_not_text(json!({"field": 4, "value": "x"}))]
fn wrong_shapes_are_parse_errors(#[case] raw: Value) {
    let err = parse(&raw).expect_err("malformed descriptor");
    assert_eq!(err.kind(), "FilterParseError");
}

#[test]
fn unknown_comparison_is_fatal() {
    let err = parse(&json!({"field": "a", "type": "numeric", "comparison": "like", "value": 1}))
        .expect_err("bad comparison");
    assert_eq!(err, QueryError::unknown_comparison("like"));
}

#[test]
fn operator_is_comparison_fallback() {
    let filter = parse_present(&json!({"property": "a", "operator": "GT", "value": 3}));
    assert_eq!(filter.comparison(), Some(Comparison::GreaterThan));
    assert_eq!(filter.raw_comparison(), Some("GT"));
}

#[test]
fn field_wins_over_property() {
    let filter = parse_present(&json!({"field": "f", "property": "p", "value": "x"}));
    assert_eq!(filter.field(), "f");
}

#[rstest]
#[case::boolean(json!(false), FilterValue::Boolean(false))]
#[case::array(json!(["a", "b"]), FilterValue::List(vec!["a".to_owned(), "b".to_owned()]))]
#[case::text(json!("abc"), FilterValue::String("abc".to_owned()))]
#[case::null(Value::Null, FilterValue::String(String::new()))]
fn untyped_values_infer_variant(#[case] value: Value, #[case] expected: FilterValue) {
    let filter = parse_present(&json!({"property": "p", "value": value}));
    assert_eq!(filter.value(), &expected);
}

#[test]
fn missing_value_without_type_is_empty_string() {
    let filter = parse_present(&json!({"property": "p"}));
    assert_eq!(filter.as_string(), Some(""));
}

#[test]
fn string_tag_stringifies_scalars() {
    let filter = parse_present(&json!({"field": "s", "type": "string", "value": 12}));
    assert_eq!(filter.as_string(), Some("12"));
}

#[test]
fn empty_map_is_dropped() {
    assert_eq!(Filter::parse(&Map::new()), Ok(None));
}

#[test]
fn builder_attaches_comparison() {
    let filter = Filter::new("age", FilterValue::Numeric(3.into())).with_comparison(Comparison::Equal);
    assert_eq!(filter.raw_comparison(), Some("eq"));
    let json = serde_json::to_value(&filter).expect("serialize");
    assert_eq!(json["type"], "numeric");
    assert_eq!(json["value"], 3);
}
