//! The little JSON-RPC the proxy has to understand.
//!
//! Message bodies are forwarded as opaque bytes. The proxy only looks inside
//! to find the method name, to add `initializationOptions` to `initialize`,
//! and to build the `exit` notification it sends on shutdown.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
}

impl Notification {
    pub fn new(method: &'static str) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
        }
    }
}

#[derive(Deserialize)]
struct MethodOnly {
    method: Option<String>,
}

/// Body of the `exit` notification: `{"jsonrpc":"2.0","method":"exit"}`.
pub(crate) fn exit_notification() -> Result<Vec<u8>> {
    serde_json::to_vec(&Notification::new("exit")).context("serializing exit notification")
}

/// JSON-RPC method of `body`, or `None` for responses and unparseable bodies.
pub(crate) fn method_of(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<MethodOnly>(body).ok()?.method
}

/// Re-serialize an `initialize` request with `options` as its
/// `initializationOptions`.
///
/// Returns `None` when `body` is not an `initialize` request or when the editor
/// already sent non-null options; the caller then forwards `body` unchanged.
pub(crate) fn with_initialization_options(
    body: &[u8],
    options: &serde_json::Value,
) -> Option<Vec<u8>> {
    let mut request: serde_json::Value = serde_json::from_slice(body).ok()?;
    if request.get("method")?.as_str()? != "initialize" {
        return None;
    }

    let params = request.get_mut("params")?.as_object_mut()?;
    if params
        .get("initializationOptions")
        .is_some_and(|existing| !existing.is_null())
    {
        return None;
    }

    params.insert("initializationOptions".to_string(), options.clone());
    serde_json::to_vec(&request).ok()
}
