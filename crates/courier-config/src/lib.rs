//! Layered configuration for the courier daemon.
//!
//! [`Config`] is resolved by `ortho_config` from, in increasing precedence:
//! built-in defaults, a TOML file (`--config-path` or `COURIER_CONFIG_PATH`),
//! `COURIER_*` environment variables, and command-line flags.

mod defaults;
mod logging;
mod socket;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_EXCEPTION_MESSAGE, DEFAULT_LOG_FILTER, DEFAULT_ROUTER_URL, DEFAULT_TCP_PORT,
    default_exception_message, default_listen_endpoint, default_log_filter, default_log_format,
    default_router_url,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "COURIER")]
pub struct Config {
    /// Endpoint the daemon listens on.
    #[ortho_config(default = default_listen_endpoint())]
    pub listen: SocketEndpoint,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter().to_owned())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Include raw failure diagnostics in exception envelopes.
    #[ortho_config(default = false)]
    pub developer_mode: bool,
    /// Expose a handler's own error message when no mapping applies.
    #[ortho_config(default = false)]
    pub send_exception_message: bool,
    /// Message used for failures that are neither mapped nor exposed.
    #[ortho_config(default = default_exception_message())]
    pub default_exception_message: String,
    /// Serialise every method per session, not only those that ask for it.
    #[ortho_config(default = false)]
    pub synchronize_on_session: bool,
    /// Wrap bare store-modify results in a store response.
    #[ortho_config(default = false)]
    pub always_wrap_store_response: bool,
    /// Deadline for a whole batch, in milliseconds.
    pub batch_timeout_ms: Option<u64>,
    /// Router URL advertised in the remoting API descriptor.
    #[ortho_config(default = default_router_url())]
    pub router_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen_endpoint(),
            log_filter: default_log_filter().to_owned(),
            log_format: default_log_format(),
            developer_mode: false,
            send_exception_message: false,
            default_exception_message: default_exception_message(),
            synchronize_on_session: false,
            always_wrap_store_response: false,
            batch_timeout_ms: None,
            router_url: default_router_url(),
        }
    }
}

impl Config {
    /// Endpoint the daemon listens on.
    #[must_use]
    pub fn listen(&self) -> &SocketEndpoint {
        &self.listen
    }

    /// `tracing` filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Whether exception envelopes carry raw diagnostics.
    #[must_use]
    pub fn developer_mode(&self) -> bool {
        self.developer_mode
    }

    /// Batch deadline, if one is configured.
    #[must_use]
    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout_ms.map(Duration::from_millis)
    }

    /// Router URL advertised to clients.
    #[must_use]
    pub fn router_url(&self) -> &str {
        &self.router_url
    }
}
