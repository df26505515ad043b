use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// TCP port used when Unix domain sockets are unavailable.
pub const DEFAULT_TCP_PORT: u16 = 9780;

/// Log filter applied when none is configured.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Message sent to clients for failures without a more specific message.
pub const DEFAULT_EXCEPTION_MESSAGE: &str = "Server Error";

/// URL advertised to clients in the remoting API descriptor.
pub const DEFAULT_ROUTER_URL: &str = "/router";

/// Default log filter expression.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default log format.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Owned default exception message.
#[must_use]
pub fn default_exception_message() -> String {
    DEFAULT_EXCEPTION_MESSAGE.to_owned()
}

/// Owned default router URL.
#[must_use]
pub fn default_router_url() -> String {
    DEFAULT_ROUTER_URL.to_owned()
}

/// Computes the default listening endpoint.
///
/// On Unix this is `courier/courierd.sock` under the user's runtime
/// directory, falling back to a per-user directory under the temporary
/// directory. Elsewhere it is a loopback TCP port.
#[must_use]
pub fn default_listen_endpoint() -> SocketEndpoint {
    default_listen_endpoint_inner()
}

#[cfg(unix)]
fn default_listen_endpoint_inner() -> SocketEndpoint {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("courier");
    if apply_namespace {
        base.push(user_namespace());
    }

    SocketEndpoint::unix(base.join("courierd.sock"))
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(unix)]
fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    // SAFETY: geteuid has no preconditions and cannot fail.
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn default_listen_endpoint_inner() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
}
