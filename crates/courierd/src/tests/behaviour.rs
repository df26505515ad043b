//! Behavioural tests for request routing over a live listener.

use std::cell::RefCell;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};

use courier_config::SocketEndpoint;

use crate::actions::SampleCatalogue;
use crate::bootstrap::ActionCatalogue;
use crate::dispatch::{CourierConnectionHandler, ErrorPolicy, Router, RouterSettings};
use crate::poll::EventBroadcaster;
use crate::registry::ActionRegistry;
use crate::session::InMemorySessionStore;
use crate::transport::{ListenerHandle, SocketListener};

struct DispatchWorld {
    listener: Option<ListenerHandle>,
    address: Option<SocketAddr>,
    session: Option<String>,
    reply: Value,
}

impl DispatchWorld {
    fn start(&mut self) {
        let mut registry = ActionRegistry::new();
        SampleCatalogue
            .register(&mut registry)
            .expect("sample methods register");
        let router = Router::new(
            registry,
            Arc::new(InMemorySessionStore::new()),
            SampleCatalogue.error_policy(ErrorPolicy::default()),
            RouterSettings::default(),
        );
        let handler = Arc::new(CourierConnectionHandler::new(
            router,
            Arc::new(EventBroadcaster::new()),
            "/router",
        ));
        let listener =
            SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0)).expect("bind listener");
        self.address = listener.local_addr();
        self.listener = Some(listener.start(handler).expect("start listener"));
    }

    fn send(&mut self, line: &str) {
        let addr = self.address.expect("listener started");
        let mut stream = TcpStream::connect(addr).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("set read timeout");
        stream.write_all(line.as_bytes()).expect("write request");
        stream.write_all(b"\n").expect("write newline");
        stream.flush().expect("flush");

        let mut reply = String::new();
        BufReader::new(stream)
            .read_line(&mut reply)
            .expect("read reply");
        self.reply = serde_json::from_str(&reply).expect("reply is JSON");
    }

    fn envelope(&self, index: usize) -> &Value {
        self.reply
            .get(index)
            .unwrap_or_else(|| panic!("no envelope {index} in {}", self.reply))
    }
}

impl Drop for DispatchWorld {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.shutdown();
            let _ = handle.join();
        }
    }
}

#[fixture]
fn world() -> RefCell<DispatchWorld> {
    RefCell::new(DispatchWorld {
        listener: None,
        address: None,
        session: None,
        reply: Value::Null,
    })
}

/// Strips the single quotes that delimit JSON arguments in the feature file.
fn json_arg(raw: &str) -> Value {
    serde_json::from_str(raw.trim().trim_matches('\'')).expect("step argument should be JSON")
}

fn strip_quotes(s: &str) -> &str {
    s.trim_matches('"')
}

// =============================================================================
// Given Steps
// =============================================================================

#[given("a daemon serving the sample actions")]
fn given_daemon(world: &RefCell<DispatchWorld>) {
    world.borrow_mut().start();
}

#[given("the session {session}")]
fn given_session(world: &RefCell<DispatchWorld>, session: String) {
    world.borrow_mut().session = Some(strip_quotes(&session).to_owned());
}

// =============================================================================
// When Steps
// =============================================================================

#[when("the batch {raw} is routed")]
fn when_batch_routed(world: &RefCell<DispatchWorld>, raw: String) {
    let mut world = world.borrow_mut();
    let request = json!({
        "kind": "router",
        "session": world.session,
        "body": json_arg(&raw),
    });
    world.send(&request.to_string());
}

#[when("the API for group {group} is requested")]
fn when_api_requested(world: &RefCell<DispatchWorld>, group: String) {
    let request = json!({"kind": "api", "group": strip_quotes(&group)});
    world.borrow_mut().send(&request.to_string());
}

#[when("the poll {action} {method} is requested")]
fn when_poll_requested(world: &RefCell<DispatchWorld>, action: String, method: String) {
    let request = json!({
        "kind": "poll",
        "action": strip_quotes(&action),
        "method": strip_quotes(&method),
    });
    world.borrow_mut().send(&request.to_string());
}

#[when("the raw line {line} is sent")]
fn when_raw_line(world: &RefCell<DispatchWorld>, line: String) {
    world.borrow_mut().send(strip_quotes(&line));
}

// =============================================================================
// Then Steps
// =============================================================================

#[then("the reply holds {count} envelopes")]
fn then_envelope_count(world: &RefCell<DispatchWorld>, count: usize) {
    assert_eq!(world.borrow().reply.as_array().map(Vec::len), Some(count));
}

#[then("envelope {index} has tid {tid}")]
fn then_envelope_tid(world: &RefCell<DispatchWorld>, index: usize, tid: i64) {
    assert_eq!(world.borrow().envelope(index)["tid"], json!(tid));
}

#[then("envelope {index} has result {raw}")]
fn then_envelope_result(world: &RefCell<DispatchWorld>, index: usize, raw: String) {
    let world = world.borrow();
    let envelope = world.envelope(index);
    assert_eq!(envelope["type"], "rpc", "unexpected envelope {envelope}");
    assert_eq!(envelope["result"], json_arg(&raw));
}

#[then("envelope {index} is an exception")]
fn then_envelope_exception(world: &RefCell<DispatchWorld>, index: usize) {
    let world = world.borrow();
    let envelope = world.envelope(index);
    assert_eq!(envelope["type"], "exception");
    assert_eq!(envelope["message"], "Server Error");
}

#[then("the API lists action {action}")]
fn then_api_lists(world: &RefCell<DispatchWorld>, action: String) {
    let world = world.borrow();
    assert!(world.reply["actions"][strip_quotes(&action)].is_array());
}

#[then("the API does not list action {action}")]
fn then_api_omits(world: &RefCell<DispatchWorld>, action: String) {
    let world = world.borrow();
    assert!(world.reply["actions"].get(strip_quotes(&action)).is_none());
}

#[then("the reply is a {name} event")]
fn then_event(world: &RefCell<DispatchWorld>, name: String) {
    let world = world.borrow();
    assert_eq!(world.reply["type"], "event");
    assert_eq!(world.reply["name"], strip_quotes(&name));
}

#[then("the reply is an exception")]
fn then_exception(world: &RefCell<DispatchWorld>) {
    assert_eq!(world.borrow().reply["type"], "exception");
}

// =============================================================================
// Scenarios
// =============================================================================

#[scenario(
    path = "tests/features/dispatch.feature",
    name = "A batch answers every call in request order"
)]
fn batch_in_request_order(world: RefCell<DispatchWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/dispatch.feature",
    name = "Named calls bind by parameter name"
)]
fn named_calls(world: RefCell<DispatchWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/dispatch.feature",
    name = "A rejected form reports field errors as its result"
)]
fn rejected_form(world: RefCell<DispatchWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/dispatch.feature",
    name = "Store reads come back sorted and paged"
)]
fn store_read(world: RefCell<DispatchWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/dispatch.feature",
    name = "Session state follows the session id"
)]
fn session_state(world: RefCell<DispatchWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/dispatch.feature",
    name = "The remoting API can be restricted to a group"
)]
fn grouped_api(world: RefCell<DispatchWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/dispatch.feature",
    name = "Poll methods can be run on demand"
)]
fn on_demand_poll(world: RefCell<DispatchWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/dispatch.feature",
    name = "Malformed request lines are answered with an exception"
)]
fn malformed_line(world: RefCell<DispatchWorld>) {
    let _ = world;
}
