//! Turns handler output into the result value for each call type.

use serde::Serialize;
use serde_json::Value;

use courier_query::{StoreResponse, build_paging_response};

use crate::binder::Arguments;
use crate::invocation::{FormLoadResult, FormPostResult, HandlerOutput};
use crate::registry::CallType;

use super::errors::CallError;

pub(super) fn result_value(
    call_type: CallType,
    output: HandlerOutput,
    arguments: &Arguments,
    always_wrap_store_response: bool,
) -> Result<Value, CallError> {
    match call_type {
        CallType::StoreRead => store_read(output, arguments),
        CallType::StoreModify => store_modify(output, always_wrap_store_response),
        CallType::FormLoad => form_load(output),
        CallType::FormPost => form_post(output),
        CallType::Simple | CallType::SimpleNamed | CallType::Poll => plain(output),
    }
}

fn store_read(output: HandlerOutput, arguments: &Arguments) -> Result<Value, CallError> {
    let records = match output {
        HandlerOutput::Records(records) => records,
        HandlerOutput::Value(Value::Array(records)) => records,
        HandlerOutput::Empty | HandlerOutput::Value(Value::Null) => {
            return to_json(&StoreResponse::<Value>::empty());
        }
        other => return plain(other),
    };
    let request = arguments.read_request().cloned().unwrap_or_default();
    to_json(&build_paging_response(&request, records)?)
}

fn store_modify(output: HandlerOutput, always_wrap: bool) -> Result<Value, CallError> {
    let records = match output {
        HandlerOutput::Records(records) => records,
        HandlerOutput::Value(Value::Array(records)) => records,
        HandlerOutput::Empty => Vec::new(),
        other => return plain(other),
    };
    if always_wrap {
        to_json(&StoreResponse::new(records))
    } else {
        Ok(Value::Array(records))
    }
}

fn form_load(output: HandlerOutput) -> Result<Value, CallError> {
    match output {
        HandlerOutput::FormLoad(result) => to_json(&result),
        HandlerOutput::Value(data) => to_json(&FormLoadResult::new(data)),
        HandlerOutput::Records(records) => to_json(&FormLoadResult::new(Value::Array(records))),
        HandlerOutput::Empty => to_json(&FormLoadResult::new(Value::Null)),
        other => plain(other),
    }
}

fn form_post(output: HandlerOutput) -> Result<Value, CallError> {
    match output {
        HandlerOutput::Empty => to_json(&FormPostResult::success()),
        other => plain(other),
    }
}

fn plain(output: HandlerOutput) -> Result<Value, CallError> {
    match output {
        HandlerOutput::Value(value) => Ok(value),
        HandlerOutput::Records(records) => Ok(Value::Array(records)),
        HandlerOutput::Store(response) => to_json(&response),
        HandlerOutput::FormLoad(result) => to_json(&result),
        HandlerOutput::FormPost(result) => to_json(&result),
        HandlerOutput::Empty => Ok(Value::Null),
    }
}

pub(super) fn to_json<T: Serialize>(value: &T) -> Result<Value, CallError> {
    serde_json::to_value(value)
        .map_err(|error| CallError::internal(format!("failed to serialise result: {error}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use courier_query::ReadRequest;

    use crate::binder::ArgValue;

    use super::*;

    fn paged(page: i64, limit: i64) -> Arguments {
        Arguments::new().with(
            "request",
            ArgValue::ReadRequest(ReadRequest {
                page: Some(page),
                limit: Some(limit),
                ..ReadRequest::default()
            }),
        )
    }

    #[test]
    fn store_read_pages_bare_collections() {
        let records = (0..5).map(|n| json!({"n": n})).collect();
        let value = result_value(
            CallType::StoreRead,
            HandlerOutput::Records(records),
            &paged(2, 2),
            false,
        )
        .expect("shaped");
        assert_eq!(value["total"], 5);
        assert_eq!(value["records"], json!([{"n": 2}, {"n": 3}]));
        assert_eq!(value["success"], true);
    }

    #[test]
    fn store_read_keeps_handler_built_responses() {
        let response = StoreResponse::with_total(vec![json!(1)], 40);
        let value = result_value(
            CallType::StoreRead,
            HandlerOutput::Store(response),
            &paged(1, 1),
            false,
        )
        .expect("shaped");
        assert_eq!(value, json!({"total": 40, "records": [1], "success": true}));
    }

    #[test]
    fn empty_store_read_is_an_empty_response() {
        let value = result_value(CallType::StoreRead, HandlerOutput::Empty, &Arguments::new(), false)
            .expect("shaped");
        assert_eq!(value, json!({"total": 0, "records": [], "success": true}));
    }

    #[test]
    fn store_modify_wraps_only_when_configured() {
        let records = vec![json!({"id": 1})];
        let bare = result_value(
            CallType::StoreModify,
            HandlerOutput::Records(records.clone()),
            &Arguments::new(),
            false,
        )
        .expect("shaped");
        assert_eq!(bare, json!([{"id": 1}]));

        let wrapped = result_value(
            CallType::StoreModify,
            HandlerOutput::Records(records),
            &Arguments::new(),
            true,
        )
        .expect("shaped");
        assert_eq!(wrapped, json!({"total": 1, "records": [{"id": 1}], "success": true}));
    }

    #[test]
    fn form_load_wraps_plain_values() {
        let value = result_value(
            CallType::FormLoad,
            HandlerOutput::Value(json!({"name": "Ada"})),
            &Arguments::new(),
            false,
        )
        .expect("shaped");
        assert_eq!(value, json!({"success": true, "data": {"name": "Ada"}}));
    }

    #[test]
    fn unserialisable_results_are_internal_errors() {
        let keyed_by_pairs = std::collections::BTreeMap::from([((1, 2), "cell")]);
        let error = to_json(&keyed_by_pairs).expect_err("tuple keys are not JSON keys");
        assert_eq!(error.kind(), "InternalError");
    }
}
