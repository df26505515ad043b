//! The remoting API descriptor clients bootstrap from.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{ActionRegistry, CallType, MethodDescriptor};

/// `{"type": "remoting", "url", "actions", "pollingProviders"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemotingApi {
    #[serde(rename = "type")]
    kind: &'static str,
    url: String,
    actions: BTreeMap<String, Vec<ApiMethod>>,
    #[serde(rename = "pollingProviders", skip_serializing_if = "Vec::is_empty")]
    polling_providers: Vec<PollingProvider>,
}

impl RemotingApi {
    /// Methods advertised per action.
    pub fn actions(&self) -> &BTreeMap<String, Vec<ApiMethod>> {
        &self.actions
    }

    /// Poll methods and the events they publish.
    pub fn polling_providers(&self) -> &[PollingProvider] {
        &self.polling_providers
    }
}

/// One advertised method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiMethod {
    /// Method name.
    pub name: String,
    /// Positional argument count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len: Option<usize>,
    /// Parameter names of a named method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<String>>,
    /// Set for form submission methods.
    #[serde(rename = "formHandler", skip_serializing_if = "std::ops::Not::not")]
    pub form_handler: bool,
}

/// A poll method and its event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollingProvider {
    /// Action name.
    pub action: String,
    /// Method name.
    pub method: String,
    /// Event the method publishes.
    pub event: String,
}

impl ActionRegistry {
    /// Builds the descriptor advertised at `url`.
    ///
    /// With a `group`, only methods tagged with that group are listed.
    pub fn remoting_api(&self, url: &str, group: Option<&str>) -> RemotingApi {
        let mut actions: BTreeMap<String, Vec<ApiMethod>> = BTreeMap::new();
        let mut polling_providers = Vec::new();

        for (action, method, descriptor) in self.iter() {
            if group.is_some_and(|tag| !descriptor.in_group(tag)) {
                continue;
            }
            if descriptor.call_type() == CallType::Poll {
                polling_providers.push(PollingProvider {
                    action: action.to_owned(),
                    method: method.to_owned(),
                    event: descriptor.event_name().unwrap_or(method).to_owned(),
                });
                continue;
            }
            actions
                .entry(action.to_owned())
                .or_default()
                .push(api_method(method, descriptor));
        }

        RemotingApi {
            kind: "remoting",
            url: url.to_owned(),
            actions,
            polling_providers,
        }
    }
}

fn api_method(name: &str, descriptor: &MethodDescriptor) -> ApiMethod {
    let mut method = ApiMethod {
        name: name.to_owned(),
        len: None,
        params: None,
        form_handler: false,
    };
    match descriptor.call_type() {
        CallType::Simple => method.len = Some(descriptor.payload_len()),
        CallType::SimpleNamed => {
            method.params = Some(
                descriptor
                    .params()
                    .iter()
                    .filter(|spec| !spec.kind().is_injected() && spec.header().is_none())
                    .map(|spec| spec.name().to_owned())
                    .collect(),
            );
        }
        CallType::FormLoad | CallType::StoreRead | CallType::StoreModify => method.len = Some(1),
        CallType::FormPost => {
            method.len = Some(0);
            method.form_handler = true;
        }
        CallType::Poll => {}
    }
    method
}
