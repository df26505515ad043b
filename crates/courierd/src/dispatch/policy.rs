//! Chooses what a failed call tells the client.

use std::collections::HashMap;

use courier_config::Config;

use super::errors::CallError;

/// Maps failures to client-facing messages.
///
/// The message for a failure is, in order: the mapping registered for its
/// kind (a mapping without text means "use the error's own message"), the
/// error's own message when `send_exception_message` is on, and finally the
/// default message. Developer mode adds the raw diagnostic as `where`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPolicy {
    developer_mode: bool,
    send_exception_message: bool,
    default_message: String,
    mappings: HashMap<String, Option<String>>,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ErrorPolicy {
    /// Builds the policy from configuration, with no mappings.
    pub fn from_config(config: &Config) -> Self {
        Self {
            developer_mode: config.developer_mode(),
            send_exception_message: config.send_exception_message,
            default_message: config.default_exception_message.clone(),
            mappings: HashMap::new(),
        }
    }

    /// Maps `kind` to a fixed message.
    #[must_use]
    pub fn with_message(mut self, kind: impl Into<String>, message: impl Into<String>) -> Self {
        self.mappings.insert(kind.into(), Some(message.into()));
        self
    }

    /// Exposes the error's own message for `kind`.
    #[must_use]
    pub fn with_own_message(mut self, kind: impl Into<String>) -> Self {
        self.mappings.insert(kind.into(), None);
        self
    }

    /// Toggles developer mode.
    #[must_use]
    pub fn with_developer_mode(mut self, enabled: bool) -> Self {
        self.developer_mode = enabled;
        self
    }

    /// Toggles exposing unmapped error messages.
    #[must_use]
    pub fn with_send_exception_message(mut self, enabled: bool) -> Self {
        self.send_exception_message = enabled;
        self
    }

    /// Client-facing message for `error`.
    pub fn message_for(&self, error: &CallError) -> String {
        match self.mappings.get(error.kind()) {
            Some(Some(message)) => message.clone(),
            Some(None) => own_message(error),
            None if self.send_exception_message => own_message(error),
            None => self.default_message.clone(),
        }
    }

    /// Raw diagnostic for `error`, only in developer mode.
    pub fn diagnostic_for(&self, error: &CallError) -> Option<String> {
        self.developer_mode.then(|| error.diagnostic())
    }
}

fn own_message(error: &CallError) -> String {
    match error {
        CallError::Invocation(handler) => handler.message().to_owned(),
        other => other.to_string(),
    }
}
