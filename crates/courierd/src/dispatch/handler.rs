//! Connection handler speaking the daemon's JSON line protocol.
//!
//! A client writes one JSON line tagged by `kind`:
//!
//! - `router`: a call or batch in `body`, answered with one line holding the
//!   envelope(s);
//! - `poll`: runs a poll method on demand, answered with one poll message;
//! - `api`: answered with the remoting API descriptor;
//! - `subscribe`: answered with a stream of poll messages for `event` until
//!   the client goes away.
//!
//! Unreadable or oversized lines are answered with a single exception line.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::poll::EventBroadcaster;
use crate::transport::{ConnectionHandler, ConnectionStream, TransportError, read_request_line};

use super::router::{DISPATCH_TARGET, Router};

/// A request line.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum DaemonRequest {
    Router {
        #[serde(default)]
        session: Option<String>,
        #[serde(default)]
        locale: Option<String>,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        body: Value,
    },
    Poll {
        #[serde(default)]
        session: Option<String>,
        #[serde(default)]
        locale: Option<String>,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        action: String,
        method: String,
        #[serde(default)]
        params: Map<String, Value>,
    },
    Api {
        #[serde(default)]
        group: Option<String>,
    },
    Subscribe {
        event: String,
    },
}

fn request_context(
    session: Option<String>,
    locale: Option<String>,
    headers: &BTreeMap<String, String>,
) -> RequestContext {
    let mut context = RequestContext::new();
    if let Some(session) = session {
        context = context.with_session(session);
    }
    if let Some(locale) = locale {
        context = context.with_locale(locale);
    }
    headers
        .iter()
        .fold(context, |context, (name, value)| context.with_header(name, value.clone()))
}

/// Writes JSON lines to a stream.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Wraps an output stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes `message` as one line and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub fn write_line<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<(), TransportError> {
        serde_json::to_writer(&mut self.writer, message)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes a bare exception line.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_exception(&mut self, message: &str) -> Result<(), TransportError> {
        self.write_line(&json!({"type": "exception", "message": message}))
    }
}

/// Serves router, poll, api and subscribe requests.
#[derive(Debug, Clone)]
pub struct CourierConnectionHandler {
    router: Router,
    events: Arc<EventBroadcaster>,
    api_url: String,
}

impl CourierConnectionHandler {
    /// Creates a handler; `api_url` is advertised in the API descriptor.
    pub fn new(router: Router, events: Arc<EventBroadcaster>, api_url: impl Into<String>) -> Self {
        Self {
            router,
            events,
            api_url: api_url.into(),
        }
    }

    fn serve(&self, stream: &mut ConnectionStream) -> Result<(), TransportError> {
        let line = match read_request_line(stream) {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!(target: DISPATCH_TARGET, "client disconnected without request");
                return Ok(());
            }
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "failed to read request");
                return ResponseWriter::new(stream).write_exception(&error.to_string());
            }
        };

        let mut writer = ResponseWriter::new(stream);
        let request = match serde_json::from_slice::<DaemonRequest>(&line) {
            Ok(request) => request,
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "malformed request");
                return writer.write_exception(&format!("malformed request: {error}"));
            }
        };

        match request {
            DaemonRequest::Router {
                session,
                locale,
                headers,
                body,
            } => {
                let context = request_context(session, locale, &headers);
                writer.write_line(&self.router.route(&body, &context))
            }
            DaemonRequest::Poll {
                session,
                locale,
                headers,
                action,
                method,
                params,
            } => {
                let context = request_context(session, locale, &headers);
                writer.write_line(&self.router.poll(&action, &method, &params, &context))
            }
            DaemonRequest::Api { group } => {
                let api = self.router.registry().remoting_api(&self.api_url, group.as_deref());
                writer.write_line(&api)
            }
            DaemonRequest::Subscribe { event } => self.stream_events(&mut writer, &event),
        }
    }

    fn stream_events<W: Write>(
        &self,
        writer: &mut ResponseWriter<W>,
        event: &str,
    ) -> Result<(), TransportError> {
        let receiver = match self.events.subscribe(event) {
            Ok(receiver) => receiver,
            Err(error) => return writer.write_exception(&error.to_string()),
        };
        for message in receiver {
            writer.write_line(&message)?;
        }
        Ok(())
    }
}

impl ConnectionHandler for CourierConnectionHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        if let Err(error) = self.serve(&mut stream) {
            debug!(target: DISPATCH_TARGET, %error, "connection closed with error");
        }
    }
}
