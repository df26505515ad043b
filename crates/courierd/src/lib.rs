//! Remoting router daemon.
//!
//! Browser clients batch calls to server-side methods as JSON envelopes
//! `{type, tid, action, method, data}`. The daemon looks each call up in an
//! [`ActionRegistry`], binds its payload to the method's declared parameters,
//! invokes the handler and answers with one envelope per call, in request
//! order, whatever the individual outcome.
//!
//! The crate is organised around that pipeline:
//!
//! - [`registry`] holds [`MethodDescriptor`]s and derives the remoting API
//!   descriptor clients bootstrap from;
//! - [`binder`] maps call payloads onto parameters for each [`CallType`];
//! - [`dispatch`] routes batches, applies the exception policy and speaks
//!   the line protocol;
//! - [`poll`] runs poll methods on a schedule and pushes their events to
//!   subscribers;
//! - [`session`] keeps per-session state and serialises synchronized
//!   methods per session.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use courierd::{
//!     ActionRegistry, CallType, ErrorPolicy, HandlerOutput, InMemorySessionStore,
//!     MethodDescriptor, ParamKind, ParamSpec, RequestContext, Router, RouterSettings,
//! };
//! use serde_json::json;
//!
//! let mut registry = ActionRegistry::new();
//! registry
//!     .register(
//!         "Calculator",
//!         "add",
//!         MethodDescriptor::new(CallType::Simple, |args| {
//!             let sum = args.i64("a").unwrap_or(0) + args.i64("b").unwrap_or(0);
//!             Ok(HandlerOutput::Value(json!(sum)))
//!         })
//!         .param(ParamSpec::new("a", ParamKind::Integer))
//!         .param(ParamSpec::new("b", ParamKind::Integer)),
//!     )
//!     .expect("register");
//!
//! let router = Router::new(
//!     registry,
//!     Arc::new(InMemorySessionStore::new()),
//!     ErrorPolicy::default(),
//!     RouterSettings::default(),
//! );
//! let reply = router.route(
//!     &json!([{"type": "rpc", "tid": 7, "action": "Calculator", "method": "add", "data": [2, 3]}]),
//!     &RequestContext::new(),
//! );
//! assert_eq!(reply[0]["result"], 5);
//! assert_eq!(reply[0]["tid"], 7);
//! ```

pub mod actions;
pub mod binder;
mod bootstrap;
mod context;
pub mod dispatch;
mod invocation;
pub mod poll;
pub mod registry;
pub mod session;
mod shutdown;
pub mod telemetry;
pub mod transport;

pub use actions::SampleCatalogue;
pub use binder::{ArgValue, Arguments, BindingError, InvocationContext, bind};
pub use bootstrap::{
    ActionCatalogue, BootstrapError, ConfigLoader, Daemon, RunningDaemon, StaticConfigLoader,
    SystemConfigLoader, bootstrap_with, run_daemon,
};
pub use context::RequestContext;
pub use dispatch::{
    CallError, CallRequest, CourierConnectionHandler, ErrorPolicy, PollMessage, ResponseEnvelope,
    Router, RouterSettings,
};
pub use invocation::{
    FieldErrors, FormLoadResult, FormPostResult, HandlerError, HandlerFn, HandlerOutput, Validator,
};
pub use poll::{Cadence, EventBroadcaster, PollError, PollJob, PollScheduler, PushSink};
pub use registry::{
    ActionRegistry, ApiMethod, CallType, MethodDescriptor, ParamKind, ParamSpec, PollingProvider,
    RegistryError, RemotingApi,
};
pub use session::{InMemorySessionStore, SessionError, SessionHandle, SessionStore};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
