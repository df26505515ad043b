//! Socket transport for the daemon.
//!
//! The listener binds the configured endpoint and accepts connections on a
//! background thread; every accepted connection is handed to a
//! [`ConnectionHandler`] on a thread of its own. Requests are single JSON
//! lines bounded by [`MAX_REQUEST_BYTES`].

mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod test_utils;

pub use self::errors::{ListenerError, TransportError};
pub use self::handler::{ConnectionHandler, ConnectionStream, MAX_REQUEST_BYTES, read_request_line};
pub use self::listener::{ListenerHandle, SocketListener};
#[cfg(test)]
pub(crate) use self::test_utils::RecordingHandler;

pub(crate) const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
