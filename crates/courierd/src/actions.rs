//! Built-in sample methods served by the `courierd` binary.
//!
//! One action per call type, plus a session-backed cart and a clock that
//! pushes `tick` events every few seconds.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};

use courier_query::{Comparison, Filter, FilterValue, ReadRequest};

use crate::binder::Arguments;
use crate::bootstrap::ActionCatalogue;
use crate::dispatch::ErrorPolicy;
use crate::invocation::{FieldErrors, FormLoadResult, HandlerError, HandlerOutput, Validator};
use crate::poll::{Cadence, PollJob};
use crate::registry::{ActionRegistry, CallType, MethodDescriptor, ParamKind, ParamSpec, RegistryError};

const TICK_PERIOD: Duration = Duration::from_secs(5);
const CART_KEY: &str = "cart";

/// Registers the sample actions.
#[derive(Debug, Default, Clone, Copy)]
pub struct SampleCatalogue;

impl ActionCatalogue for SampleCatalogue {
    fn register(&self, registry: &mut ActionRegistry) -> Result<(), RegistryError> {
        registry.register(
            "Greeter",
            "hello",
            MethodDescriptor::new(CallType::Simple, |args| {
                let name = args.str("name").unwrap_or("world");
                Ok(json!(format!("Hello, {name}!")).into())
            })
            .param(ParamSpec::new("name", ParamKind::String).with_default(json!("world")))
            .group("public"),
        )?;
        registry.register(
            "Greeter",
            "echoNamed",
            MethodDescriptor::new(CallType::SimpleNamed, echo_named)
                .param(ParamSpec::new("text", ParamKind::String))
                .param(ParamSpec::new("times", ParamKind::Integer).with_default(json!(1)))
                .group("public"),
        )?;
        registry.register(
            "Greeter",
            "whoami",
            MethodDescriptor::new(CallType::Simple, |args| {
                Ok(json!({
                    "session": args.request().and_then(|request| request.session_id()),
                    "locale": args.locale(),
                    "client": args.str("client"),
                })
                .into())
            })
            .param(ParamSpec::new("request", ParamKind::Request))
            .param(ParamSpec::new("locale", ParamKind::Locale))
            .param(
                ParamSpec::new("client", ParamKind::String)
                    .optional()
                    .from_header("x-client"),
            ),
        )?;
        registry.register(
            "Calculator",
            "add",
            MethodDescriptor::new(CallType::Simple, |args| {
                let (Some(a), Some(b)) = (args.i64("a"), args.i64("b")) else {
                    return Err(HandlerError::invalid_argument("both operands are required"));
                };
                a.checked_add(b)
                    .map(|sum| json!(sum).into())
                    .ok_or_else(|| HandlerError::invalid_argument("sum overflows"))
            })
            .param(ParamSpec::new("a", ParamKind::Integer))
            .param(ParamSpec::new("b", ParamKind::Integer))
            .group("public"),
        )?;
        registry.register(
            "Profile",
            "load",
            MethodDescriptor::new(CallType::FormLoad, |args| {
                let id = args.i64("id").unwrap_or(1);
                Ok(FormLoadResult::new(json!({
                    "id": id,
                    "name": "Ada Lovelace",
                    "email": "ada@example.org",
                }))
                .into())
            })
            .param(ParamSpec::new("id", ParamKind::Integer).with_default(json!(1))),
        )?;
        registry.register(
            "Profile",
            "update",
            MethodDescriptor::new(CallType::FormPost, |_| Ok(HandlerOutput::Empty))
                .param(ParamSpec::new("name", ParamKind::String).optional())
                .param(ParamSpec::new("email", ParamKind::String).optional())
                .validator(Arc::new(ProfileValidator)),
        )?;
        registry.register(
            "Books",
            "read",
            MethodDescriptor::new(CallType::StoreRead, read_books)
                .param(ParamSpec::new("request", ParamKind::ReadRequest)),
        )?;
        registry.register(
            "Books",
            "update",
            MethodDescriptor::new(CallType::StoreModify, |args| {
                let records = args.records().unwrap_or_default();
                Ok(HandlerOutput::Records(records.to_vec()))
            })
            .param(ParamSpec::new("records", ParamKind::Records)),
        )?;
        registry.register(
            "Cart",
            "add",
            MethodDescriptor::new(CallType::Simple, add_to_cart)
                .param(ParamSpec::new("item", ParamKind::String))
                .param(ParamSpec::new("session", ParamKind::Session))
                .synchronized(),
        )?;
        registry.register(
            "Cart",
            "items",
            MethodDescriptor::new(CallType::Simple, |args| {
                let session = args
                    .session()
                    .ok_or_else(|| HandlerError::internal("session missing"))?;
                Ok(session.get(CART_KEY)?.unwrap_or_else(|| json!([])).into())
            })
            .param(ParamSpec::new("session", ParamKind::Session)),
        )?;
        registry.register(
            "Clock",
            "now",
            MethodDescriptor::new(CallType::Poll, |args| {
                let millis = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_err(|error| HandlerError::internal(error.to_string()))?
                    .as_millis();
                Ok(json!({"epochMillis": millis, "locale": args.locale()}).into())
            })
            .param(ParamSpec::new("locale", ParamKind::Locale))
            .event("tick"),
        )?;
        Ok(())
    }

    fn poll_jobs(&self) -> Vec<PollJob> {
        vec![PollJob::new("Clock", "now", Cadence::Every(TICK_PERIOD))]
    }

    fn error_policy(&self, policy: ErrorPolicy) -> ErrorPolicy {
        policy.with_own_message("IllegalArgument")
    }
}

fn echo_named(args: &Arguments) -> Result<HandlerOutput, HandlerError> {
    let text = args.str("text").unwrap_or_default();
    let times = args.i64("times").unwrap_or(1);
    let times = usize::try_from(times)
        .ok()
        .filter(|times| *times <= 100)
        .ok_or_else(|| HandlerError::invalid_argument("times must be between 0 and 100"))?;
    Ok(json!(text.repeat(times)).into())
}

fn add_to_cart(args: &Arguments) -> Result<HandlerOutput, HandlerError> {
    let item = args
        .str("item")
        .ok_or_else(|| HandlerError::invalid_argument("item is required"))?;
    let session = args
        .session()
        .ok_or_else(|| HandlerError::internal("session missing"))?;
    let mut items = match session.get(CART_KEY)? {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    items.push(json!(item));
    let count = items.len();
    session.put(CART_KEY, Value::Array(items))?;
    Ok(json!(count).into())
}

fn read_books(args: &Arguments) -> Result<HandlerOutput, HandlerError> {
    let request = args.read_request().cloned().unwrap_or_default();
    let records = books()
        .into_iter()
        .filter(|book| matches_query(&request, book))
        .filter(|book| request.filters.iter().all(|filter| matches_filter(filter, book)))
        .collect::<Vec<_>>();
    Ok(HandlerOutput::Records(records))
}

fn books() -> Vec<Value> {
    vec![
        json!({"id": 1, "title": "The Difference Engine", "year": 1990, "inPrint": true}),
        json!({"id": 2, "title": "Cryptonomicon", "year": 1999, "inPrint": true}),
        json!({"id": 3, "title": "The Analytical Engine", "year": 1864, "inPrint": false}),
        json!({"id": 4, "title": "Snow Crash", "year": 1992, "inPrint": true}),
        json!({"id": 5, "title": "Neuromancer", "year": 1984, "inPrint": true}),
    ]
}

fn matches_query(request: &ReadRequest, book: &Value) -> bool {
    let Some(query) = request.query.as_deref().filter(|query| !query.is_empty()) else {
        return true;
    };
    book["title"]
        .as_str()
        .is_some_and(|title| title.to_lowercase().contains(&query.to_lowercase()))
}

fn matches_filter(filter: &Filter, book: &Value) -> bool {
    let field = &book[filter.field()];
    match filter.value() {
        FilterValue::String(text) => field
            .as_str()
            .is_some_and(|value| value.to_lowercase().contains(&text.to_lowercase())),
        FilterValue::Numeric(number) => {
            let (Some(value), Some(bound)) = (field.as_f64(), number.as_f64()) else {
                return false;
            };
            match filter.comparison().unwrap_or(Comparison::Equal) {
                Comparison::LessThan => value < bound,
                Comparison::GreaterThan => value > bound,
                Comparison::Equal => (value - bound).abs() < f64::EPSILON,
            }
        }
        FilterValue::Boolean(flag) => field.as_bool() == Some(*flag),
        FilterValue::List(accepted) => field
            .as_str()
            .is_some_and(|value| accepted.iter().any(|candidate| candidate == value)),
        FilterValue::Date(date) => field.as_str() == Some(date.as_str()),
    }
}

struct ProfileValidator;

impl Validator for ProfileValidator {
    fn validate(&self, arguments: &Arguments) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if arguments.str("name").is_none_or(|name| name.trim().is_empty()) {
            errors
                .entry("name".to_owned())
                .or_default()
                .push("name is required".to_owned());
        }
        if let Some(email) = arguments.str("email")
            && !email.contains('@')
        {
            errors
                .entry("email".to_owned())
                .or_default()
                .push("not a valid email address".to_owned());
        }
        errors
    }
}
