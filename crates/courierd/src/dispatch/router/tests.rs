//! Unit tests for batch routing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rstest::{fixture, rstest};
use serde_json::json;

use crate::invocation::{HandlerError, MockValidator};
use crate::registry::{ParamKind, ParamSpec};
use crate::session::InMemorySessionStore;

use super::*;

const SLOW: Duration = Duration::from_millis(300);

fn registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    registry
        .register(
            "Math",
            "add",
            MethodDescriptor::new(CallType::Simple, |args| {
                let sum = args.i64("a").unwrap_or(0) + args.i64("b").unwrap_or(0);
                Ok(HandlerOutput::Value(json!(sum)))
            })
            .param(ParamSpec::new("a", ParamKind::Integer))
            .param(ParamSpec::new("b", ParamKind::Integer)),
        )
        .expect("add");
    registry
        .register(
            "Math",
            "divide",
            MethodDescriptor::new(CallType::Simple, |args| {
                match (args.i64("a"), args.i64("b")) {
                    (Some(a), Some(b)) if b != 0 => Ok(HandlerOutput::Value(json!(a / b))),
                    _ => Err(HandlerError::invalid_argument("division by zero")
                        .with_detail("b was 0")),
                }
            })
            .param(ParamSpec::new("a", ParamKind::Integer))
            .param(ParamSpec::new("b", ParamKind::Integer)),
        )
        .expect("divide");
    registry
        .register(
            "Slow",
            "wait",
            MethodDescriptor::new(CallType::Simple, |_| {
                thread::sleep(SLOW);
                Ok(HandlerOutput::Value(json!("done")))
            }),
        )
        .expect("wait");
    registry
        .register(
            "Slow",
            "crash",
            MethodDescriptor::new(CallType::Simple, |_| -> Result<HandlerOutput, HandlerError> {
                panic!("handler blew up")
            }),
        )
        .expect("crash");
    registry
        .register(
            "Counter",
            "bump",
            MethodDescriptor::new(CallType::Simple, |args| {
                let session = args
                    .session()
                    .ok_or_else(|| HandlerError::internal("no session"))?;
                let current = session.get("count")?.and_then(|value| value.as_i64()).unwrap_or(0);
                thread::sleep(Duration::from_millis(5));
                session.put("count", json!(current + 1))?;
                Ok(HandlerOutput::Value(json!(current + 1)))
            })
            .param(ParamSpec::new("session", ParamKind::Session))
            .synchronized(),
        )
        .expect("bump");
    registry
        .register(
            "Counter",
            "nap",
            MethodDescriptor::new(CallType::Simple, |_| {
                thread::sleep(SLOW);
                Ok(HandlerOutput::Empty)
            })
            .param(ParamSpec::new("session", ParamKind::Session))
            .synchronized(),
        )
        .expect("nap");
    registry
        .register(
            "Books",
            "read",
            MethodDescriptor::new(CallType::StoreRead, |_| {
                Ok(HandlerOutput::Records(
                    (1..=7).map(|id| json!({"id": id, "rank": 8 - id})).collect(),
                ))
            })
            .param(ParamSpec::new("request", ParamKind::ReadRequest)),
        )
        .expect("read");
    registry
        .register(
            "Clock",
            "now",
            MethodDescriptor::new(CallType::Poll, |args| {
                Ok(HandlerOutput::Value(json!({"zone": args.str("zone")})))
            })
            .param(ParamSpec::new("zone", ParamKind::String).with_default(json!("UTC")))
            .event("tick"),
        )
        .expect("now");
    registry
}

fn router_with(policy: ErrorPolicy, settings: RouterSettings) -> Router {
    Router::new(
        registry(),
        Arc::new(InMemorySessionStore::new()),
        policy,
        settings,
    )
}

#[fixture]
fn router() -> Router {
    router_with(ErrorPolicy::default(), RouterSettings::default())
}

fn rpc(tid: i64, action: &str, method: &str, data: Value) -> Value {
    json!({"type": "rpc", "tid": tid, "action": action, "method": method, "data": data})
}

#[rstest]
fn batches_answer_every_call_in_request_order(router: Router) {
    let batch = json!([
        rpc(1, "Math", "add", json!([1, 2])),
        rpc(2, "Nope", "missing", json!(null)),
        rpc(3, "Math", "add", json!([1])),
        rpc(4, "Math", "divide", json!([1, 0])),
        rpc(5, "Math", "add", json!([20, 22])),
    ]);
    let reply = router.route(&batch, &RequestContext::new());
    let envelopes = reply.as_array().expect("array reply");

    assert_eq!(envelopes.len(), 5);
    for (index, envelope) in envelopes.iter().enumerate() {
        assert_eq!(envelope["tid"], json!(index + 1));
    }
    assert_eq!(envelopes[0]["result"], 3);
    assert_eq!(envelopes[1]["type"], "exception");
    assert_eq!(envelopes[2]["type"], "exception");
    assert_eq!(envelopes[3]["type"], "exception");
    assert_eq!(envelopes[4]["result"], 42);
}

#[rstest]
fn a_single_call_object_gets_a_single_envelope(router: Router) {
    let reply = router.route(&rpc(9, "Math", "add", json!([2, 2])), &RequestContext::new());
    assert_eq!(
        reply,
        json!({"type": "rpc", "tid": 9, "action": "Math", "method": "add", "result": 4})
    );
}

#[rstest]
fn an_empty_batch_yields_an_empty_array(router: Router) {
    assert_eq!(router.route(&json!([]), &RequestContext::new()), json!([]));
}

#[rstest]
fn a_scalar_body_is_a_malformed_call(router: Router) {
    let reply = router.route(&json!("hello"), &RequestContext::new());
    assert_eq!(reply["type"], "exception");
    assert_eq!(reply["message"], "Server Error");
}

#[rstest]
fn calls_without_a_target_are_malformed() {
    let router = router_with(
        ErrorPolicy::default().with_developer_mode(true),
        RouterSettings::default(),
    );
    let envelope = router.call(&json!({"tid": 3, "data": []}), &RequestContext::new());
    assert!(envelope.is_exception());
    assert_eq!(envelope.tid(), &json!(3));
    let value = envelope.into_value();
    assert!(
        value["where"]
            .as_str()
            .is_some_and(|diagnostic| diagnostic.starts_with("MalformedCallError"))
    );
}

#[rstest]
fn policy_chooses_the_exception_message() {
    let call = rpc(1, "Math", "divide", json!([1, 0]));

    let hidden = router_with(ErrorPolicy::default(), RouterSettings::default());
    let envelope = hidden.call(&call, &RequestContext::new());
    assert_eq!(envelope.message(), Some("Server Error"));
    assert!(envelope.into_value().get("where").is_none());

    let mapped = router_with(
        ErrorPolicy::default().with_message("IllegalArgument", "Check your input"),
        RouterSettings::default(),
    );
    assert_eq!(
        mapped.call(&call, &RequestContext::new()).message(),
        Some("Check your input")
    );

    let developer = router_with(
        ErrorPolicy::default()
            .with_send_exception_message(true)
            .with_developer_mode(true),
        RouterSettings::default(),
    );
    let value = developer.call(&call, &RequestContext::new()).into_value();
    assert_eq!(value["message"], "division by zero");
    assert_eq!(value["where"], "IllegalArgument: division by zero\nb was 0");
}

#[rstest]
fn store_reads_are_sorted_and_paged(router: Router) {
    let call = rpc(
        1,
        "Books",
        "read",
        json!([{"page": 2, "limit": 3, "sort": [{"property": "rank", "direction": "ASC"}]}]),
    );
    let envelope = router.call(&call, &RequestContext::new());
    let result = envelope.result().expect("result");
    assert_eq!(result["total"], 7);
    assert_eq!(
        result["records"],
        json!([{"id": 4, "rank": 4}, {"id": 3, "rank": 5}, {"id": 2, "rank": 6}])
    );
}

#[rstest]
fn malformed_filters_fail_only_their_call(router: Router) {
    let batch = json!([
        rpc(
            1,
            "Books",
            "read",
            json!([{"filter": [{"field": "id", "comparison": "near", "value": 1}]}])
        ),
        rpc(2, "Math", "add", json!([1, 1])),
    ]);
    let reply = router.route(&batch, &RequestContext::new());
    assert_eq!(reply[0]["type"], "exception");
    assert_eq!(reply[1]["result"], 2);
}

#[rstest]
fn rejected_forms_skip_the_handler() {
    let invoked = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invoked);
    let mut validator = MockValidator::new();
    validator.expect_validate().times(1).returning(|arguments| {
        let mut errors = BTreeMap::new();
        if arguments.str("email").is_none_or(|email| !email.contains('@')) {
            errors.insert("email".to_owned(), vec!["invalid".to_owned()]);
        }
        errors
    });

    let mut registry = ActionRegistry::new();
    registry
        .register(
            "Profile",
            "save",
            MethodDescriptor::new(CallType::FormPost, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(HandlerOutput::Empty)
            })
            .param(ParamSpec::new("email", ParamKind::String).optional())
            .validator(Arc::new(validator)),
        )
        .expect("save");
    let router = Router::new(
        registry,
        Arc::new(InMemorySessionStore::new()),
        ErrorPolicy::default(),
        RouterSettings::default(),
    );

    let envelope = router.call(
        &rpc(1, "Profile", "save", json!({"email": "nope"})),
        &RequestContext::new(),
    );
    assert!(!envelope.is_exception());
    assert_eq!(
        envelope.result(),
        Some(&json!({"success": false, "errors": {"email": ["invalid"]}}))
    );
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

#[rstest]
fn accepted_forms_reach_the_handler() {
    let mut validator = MockValidator::new();
    validator
        .expect_validate()
        .times(1)
        .returning(|_| BTreeMap::new());
    let mut registry = ActionRegistry::new();
    registry
        .register(
            "Profile",
            "save",
            MethodDescriptor::new(CallType::FormPost, |_| Ok(HandlerOutput::Empty))
                .validator(Arc::new(validator)),
        )
        .expect("save");
    let router = Router::new(
        registry,
        Arc::new(InMemorySessionStore::new()),
        ErrorPolicy::default(),
        RouterSettings::default(),
    );
    let envelope = router.call(&rpc(1, "Profile", "save", json!({})), &RequestContext::new());
    assert_eq!(envelope.result(), Some(&json!({"success": true})));
}

#[rstest]
fn the_deadline_answers_unfinished_calls_with_timeouts() {
    let router = router_with(
        ErrorPolicy::default().with_developer_mode(true),
        RouterSettings {
            batch_timeout: Some(Duration::from_millis(50)),
            ..RouterSettings::default()
        },
    );
    let batch = json!([rpc(1, "Slow", "wait", json!(null)), rpc(2, "Math", "add", json!([1, 2]))]);
    let started = Instant::now();
    let reply = router.route(&batch, &RequestContext::new());

    assert!(started.elapsed() < SLOW);
    assert_eq!(reply[0]["type"], "exception");
    assert_eq!(reply[0]["tid"], 1);
    assert!(
        reply[0]["where"]
            .as_str()
            .is_some_and(|diagnostic| diagnostic.starts_with("TimeoutError"))
    );
    assert_eq!(reply[1]["result"], 3);
}

#[rstest]
fn a_panicking_handler_fails_only_its_call(router: Router) {
    let batch = json!([rpc(1, "Slow", "crash", json!(null)), rpc(2, "Math", "add", json!([2, 3]))]);
    let reply = router.route(&batch, &RequestContext::new());
    assert_eq!(reply[0]["type"], "exception");
    assert_eq!(reply[0]["tid"], 1);
    assert_eq!(reply[1]["result"], 5);
}

#[rstest]
#[case::lone_call(rpc(9, "Slow", "crash", json!(null)))]
#[case::one_call_batch(json!([rpc(9, "Slow", "crash", json!(null))]))]
fn a_panic_on_the_inline_path_becomes_an_envelope(#[case] body: Value) {
    let router = router_with(
        ErrorPolicy::default().with_developer_mode(true),
        RouterSettings::default(),
    );
    let reply = router.route(&body, &RequestContext::new());
    let envelope = reply.as_array().and_then(|envelopes| envelopes.first()).unwrap_or(&reply);

    assert_eq!(envelope["type"], "exception");
    assert_eq!(envelope["tid"], 9);
    assert_eq!(envelope["message"], "Server Error");
    assert_eq!(
        envelope["where"],
        "InternalError: internal dispatcher error: handler panicked: handler blew up"
    );
}

#[rstest]
fn synchronized_calls_on_one_session_do_not_lose_updates(router: Router) {
    const CALLS: usize = 16;
    let batch = Value::Array(
        (0..CALLS)
            .map(|n| rpc(i64::try_from(n).unwrap_or_default(), "Counter", "bump", json!(null)))
            .collect(),
    );
    let context = RequestContext::new().with_session("alpha");
    let reply = router.route(&batch, &context);
    assert!(
        reply
            .as_array()
            .is_some_and(|envelopes| envelopes.iter().all(|envelope| envelope["type"] == "rpc"))
    );

    let total = router.call(&rpc(99, "Counter", "bump", json!(null)), &context);
    assert_eq!(total.result(), Some(&json!(CALLS + 1)));
}

#[rstest]
fn different_sessions_do_not_wait_for_each_other(router: Router) {
    let started = Instant::now();
    let workers: Vec<_> = ["left", "right"]
        .into_iter()
        .map(|session| {
            let router = router.clone();
            thread::spawn(move || {
                router.call(
                    &rpc(1, "Counter", "nap", json!(null)),
                    &RequestContext::new().with_session(session),
                )
            })
        })
        .collect();
    for worker in workers {
        assert!(!worker.join().expect("worker").is_exception());
    }
    assert!(started.elapsed() < SLOW * 2);
}

#[rstest]
fn same_session_synchronized_calls_run_one_at_a_time(router: Router) {
    let started = Instant::now();
    let batch = json!([
        rpc(1, "Counter", "nap", json!(null)),
        rpc(2, "Counter", "nap", json!(null)),
    ]);
    router.route(&batch, &RequestContext::new().with_session("solo"));
    assert!(started.elapsed() >= SLOW * 2);
}

#[rstest]
fn polls_publish_their_event(router: Router) {
    let mut params = Map::new();
    params.insert("zone".to_owned(), json!("CET"));
    let message = router.poll("Clock", "now", &params, &RequestContext::new());
    assert_eq!(message.name(), "tick");
    assert_eq!(message.data(), Some(&json!({"zone": "CET"})));

    let defaulted = router.poll("Clock", "now", &Map::new(), &RequestContext::new());
    assert_eq!(defaulted.data(), Some(&json!({"zone": "UTC"})));
}

#[rstest]
#[case::unknown_method("Clock", "later", "later")]
#[case::not_a_poll("Math", "add", "add")]
fn failed_polls_are_exceptions(
    router: Router,
    #[case] action: &str,
    #[case] method: &str,
    #[case] event: &str,
) {
    let message = router.poll(action, method, &Map::new(), &RequestContext::new());
    assert!(message.is_exception());
    assert_eq!(message.name(), event);
    assert_eq!(message.message(), Some("Server Error"));
}
