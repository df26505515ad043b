//! Batch routing.
//!
//! The router resolves, binds, invokes and envelopes every call of a batch
//! independently. Batches of more than one call, and every batch when a
//! deadline is configured, run each call on its own thread; envelopes are
//! written back into request order whatever order the calls finish in.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::slice;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use courier_config::Config;

use crate::binder::{self, Arguments, InvocationContext};
use crate::context::RequestContext;
use crate::invocation::{FormPostResult, HandlerOutput};
use crate::registry::{ActionRegistry, CallType, MethodDescriptor};
use crate::session::{SessionLocks, SessionStore};

use super::envelope::{CallRequest, PollMessage, ResponseEnvelope};
use super::errors::CallError;
use super::policy::ErrorPolicy;
use super::shape;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Dispatcher switches taken from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterSettings {
    /// Serialise every method per session.
    pub synchronize_on_session: bool,
    /// Wrap bare store modify collections in a store response.
    pub always_wrap_store_response: bool,
    /// Deadline for a whole batch.
    pub batch_timeout: Option<Duration>,
}

impl RouterSettings {
    /// Reads the dispatcher switches from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            synchronize_on_session: config.synchronize_on_session,
            always_wrap_store_response: config.always_wrap_store_response,
            batch_timeout: config.batch_timeout(),
        }
    }
}

struct RouterInner {
    registry: ActionRegistry,
    sessions: Arc<dyn SessionStore>,
    locks: SessionLocks,
    policy: ErrorPolicy,
    settings: RouterSettings,
}

/// Routes call batches to registered methods.
///
/// Cloning is cheap; clones share the registry, sessions and locks.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl fmt::Debug for Router {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Router")
            .field("methods", &self.inner.registry.len())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Creates a router over a fully populated registry.
    pub fn new(
        registry: ActionRegistry,
        sessions: Arc<dyn SessionStore>,
        policy: ErrorPolicy,
        settings: RouterSettings,
    ) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                registry,
                sessions,
                locks: SessionLocks::new(),
                policy,
                settings,
            }),
        }
    }

    /// The registry this router serves.
    pub fn registry(&self) -> &ActionRegistry {
        &self.inner.registry
    }

    /// Routes a request body: one call object in, one envelope out; an
    /// array of calls in, an array of envelopes of the same length out.
    pub fn route(&self, body: &Value, context: &RequestContext) -> Value {
        match body {
            Value::Array(calls) => Value::Array(
                self.route_batch(calls, context)
                    .into_iter()
                    .map(ResponseEnvelope::into_value)
                    .collect(),
            ),
            Value::Object(_) => self
                .route_batch(slice::from_ref(body), context)
                .into_iter()
                .next()
                .map_or(Value::Null, ResponseEnvelope::into_value),
            other => {
                let request = CallRequest::from_value(other);
                let error =
                    CallError::malformed("request body must be a call or an array of calls");
                self.failure(&request, &error).into_value()
            }
        }
    }

    /// Routes every call of a batch, returning envelopes in request order.
    ///
    /// Calls still running when the batch deadline passes are answered with
    /// a timeout exception; calls already finished keep their results.
    pub fn route_batch(&self, calls: &[Value], context: &RequestContext) -> Vec<ResponseEnvelope> {
        let budget = self.inner.settings.batch_timeout;
        debug!(
            target: DISPATCH_TARGET,
            calls = calls.len(),
            "routing batch"
        );
        if budget.is_none() && calls.len() <= 1 {
            return calls.iter().map(|call| self.call(call, context)).collect();
        }

        let (sender, receiver) = mpsc::channel();
        let mut slots: Vec<Option<ResponseEnvelope>> = calls.iter().map(|_| None).collect();
        for (index, call) in calls.iter().enumerate() {
            let router = self.clone();
            let owned_call = call.clone();
            let owned_context = context.clone();
            let sender = sender.clone();
            let spawned = thread::Builder::new()
                .name(format!("courier-call-{index}"))
                .spawn(move || {
                    let envelope = router.call(&owned_call, &owned_context);
                    if sender.send((index, envelope)).is_err() {
                        debug!(
                            target: DISPATCH_TARGET,
                            index,
                            "batch answered before the call finished; result dropped"
                        );
                    }
                });
            if let Err(error) = spawned {
                warn!(
                    target: DISPATCH_TARGET,
                    %error,
                    "failed to spawn call thread; running inline"
                );
                if let Some(slot) = slots.get_mut(index) {
                    *slot = Some(self.call(call, context));
                }
            }
        }
        drop(sender);

        let deadline = budget.map(|budget| Instant::now() + budget);
        let mut pending = slots.iter().filter(|slot| slot.is_none()).count();
        let mut timed_out = false;
        while pending > 0 {
            let received = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match receiver.recv_timeout(remaining) {
                        Ok(message) => Some(message),
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            timed_out = true;
                            None
                        }
                        Err(mpsc::RecvTimeoutError::Disconnected) => None,
                    }
                }
                None => receiver.recv().ok(),
            };
            let Some((index, envelope)) = received else {
                break;
            };
            if let Some(slot) = slots.get_mut(index).filter(|slot| slot.is_none()) {
                *slot = Some(envelope);
                pending = pending.saturating_sub(1);
            }
        }

        if timed_out {
            warn!(
                target: DISPATCH_TARGET,
                unfinished = pending,
                budget_ms = budget.map_or(0, |budget| budget.as_millis()),
                "batch deadline passed"
            );
        }

        slots
            .into_iter()
            .zip(calls)
            .map(|(slot, call)| {
                slot.unwrap_or_else(|| {
                    let request = CallRequest::from_value(call);
                    let error = match budget.filter(|_| timed_out) {
                        Some(budget) => CallError::Timeout { budget },
                        None => CallError::internal("call thread ended without a result"),
                    };
                    self.failure(&request, &error)
                })
            })
            .collect()
    }

    /// Processes one call on the current thread.
    pub fn call(&self, call: &Value, context: &RequestContext) -> ResponseEnvelope {
        let request = CallRequest::from_value(call);
        match self.execute(&request, context) {
            Ok(result) => ResponseEnvelope::success(&request, result),
            Err(error) => self.failure(&request, &error),
        }
    }

    /// Runs a poll method with static `params` and builds the push message.
    pub fn poll(
        &self,
        action: &str,
        method: &str,
        params: &Map<String, Value>,
        context: &RequestContext,
    ) -> PollMessage {
        let event = self.event_for(action, method);
        match self.execute_poll(action, method, params, context) {
            Ok(data) => {
                debug!(target: DISPATCH_TARGET, action, method, event = %event, "poll completed");
                PollMessage::event(event, data)
            }
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    action,
                    method,
                    kind = error.kind(),
                    %error,
                    "poll failed"
                );
                let policy = &self.inner.policy;
                PollMessage::exception(
                    event,
                    policy.message_for(&error),
                    policy.diagnostic_for(&error),
                )
            }
        }
    }

    /// Event published by a poll method; the method name when unset.
    pub fn event_for(&self, action: &str, method: &str) -> String {
        self.inner
            .registry
            .lookup(action, method)
            .and_then(|descriptor| descriptor.event_name())
            .unwrap_or(method)
            .to_owned()
    }

    fn execute(&self, request: &CallRequest, context: &RequestContext) -> Result<Value, CallError> {
        let (action, method) = request.target()?;
        let descriptor = self
            .inner
            .registry
            .lookup(action, method)
            .ok_or_else(|| CallError::routing(action, method))?;
        debug!(
            target: DISPATCH_TARGET,
            action,
            method,
            tid = %request.tid(),
            call_type = %descriptor.call_type(),
            "call routed"
        );

        let invocation = InvocationContext::new(context, &self.inner.sessions);
        let arguments = binder::bind(descriptor, request.data(), invocation)?;
        if let Some(rejected) = self.reject_form(descriptor, &arguments)? {
            return Ok(rejected);
        }
        let output = self.invoke(descriptor, &arguments, context)?;
        self.shape(descriptor, output, &arguments)
    }

    fn execute_poll(
        &self,
        action: &str,
        method: &str,
        params: &Map<String, Value>,
        context: &RequestContext,
    ) -> Result<Value, CallError> {
        let descriptor = self
            .inner
            .registry
            .lookup(action, method)
            .ok_or_else(|| CallError::routing(action, method))?;
        if descriptor.call_type() != CallType::Poll {
            return Err(CallError::malformed(format!(
                "'{action}.{method}' is not a poll method"
            )));
        }
        let data = Value::Object(params.clone());
        let invocation = InvocationContext::new(context, &self.inner.sessions);
        let arguments = binder::bind(descriptor, &data, invocation)?;
        let output = self.invoke(descriptor, &arguments, context)?;
        self.shape(descriptor, output, &arguments)
    }

    /// Runs the form validator; a rejection replaces the handler result.
    fn reject_form(
        &self,
        descriptor: &MethodDescriptor,
        arguments: &Arguments,
    ) -> Result<Option<Value>, CallError> {
        let Some(validator) = descriptor.form_validator() else {
            return Ok(None);
        };
        let errors = validator.validate(arguments);
        if errors.is_empty() {
            return Ok(None);
        }
        debug!(
            target: DISPATCH_TARGET,
            fields = errors.len(),
            "form submission rejected"
        );
        shape::to_json(&FormPostResult::from_errors(errors)).map(Some)
    }

    /// Invokes the handler, holding the session lock only for the call.
    fn invoke(
        &self,
        descriptor: &MethodDescriptor,
        arguments: &Arguments,
        context: &RequestContext,
    ) -> Result<HandlerOutput, CallError> {
        let synchronized =
            descriptor.synchronize_on_session() || self.inner.settings.synchronize_on_session;
        let Some(session) = context.session_id().filter(|_| synchronized) else {
            return run_handler(descriptor, arguments);
        };
        let lock = self.inner.locks.lock_for(session)?;
        let _guard = lock
            .lock()
            .map_err(|_| CallError::internal(format!("session lock for '{session}' poisoned")))?;
        run_handler(descriptor, arguments)
    }

    fn shape(
        &self,
        descriptor: &MethodDescriptor,
        output: HandlerOutput,
        arguments: &Arguments,
    ) -> Result<Value, CallError> {
        shape::result_value(
            descriptor.call_type(),
            output,
            arguments,
            self.inner.settings.always_wrap_store_response,
        )
    }

    fn failure(&self, request: &CallRequest, error: &CallError) -> ResponseEnvelope {
        warn!(
            target: DISPATCH_TARGET,
            tid = %request.tid(),
            kind = error.kind(),
            %error,
            "call failed"
        );
        let policy = &self.inner.policy;
        ResponseEnvelope::exception(
            request,
            policy.message_for(error),
            policy.diagnostic_for(error),
        )
    }
}

/// Runs the handler; a panic fails this call only.
fn run_handler(
    descriptor: &MethodDescriptor,
    arguments: &Arguments,
) -> Result<HandlerOutput, CallError> {
    match panic::catch_unwind(AssertUnwindSafe(|| descriptor.invoke(arguments))) {
        Ok(outcome) => Ok(outcome?),
        Err(payload) => Err(CallError::internal(format!(
            "handler panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests;
