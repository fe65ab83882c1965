//! Request/response correlation over a [`Channel`].
//!
//! Every call gets a fresh nonce from a per-bridge counter and a pending
//! entry keyed by that nonce. The request goes out under the method's own
//! event name; every answer comes back on [`CALLBACK_EVENT`] and is routed to
//! its waiter by `callbackNonce`. Answers may arrive in any order.
//!
//! ```text
//! host                         channel                        wallet
//!  │ call("signIn", p) ──► {eventName, callbackNonce: 7, params: p} ──►│
//!  │                                                                    │
//!  │◄── "callback": {success, callbackNonce: 7, result} ◄───────────────│
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;

use crate::channel::{Channel, Connector};
use crate::codec::{self, ErrorValue, Value};
use crate::config::EmbedOptions;
use crate::constants::CALLBACK_EVENT;
use crate::presentation::{NoPresentation, Presentation, Restore};
use crate::WalletError;

/// Request envelope sent to the wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub event_name: String,
    pub callback_nonce: u64,
    pub params: Value,
}

impl RpcRequest {
    pub fn to_value(&self) -> Value {
        Value::object([
            ("callbackNonce", Value::from(self.callback_nonce)),
            ("eventName", Value::from(self.event_name.as_str())),
            ("params", self.params.clone()),
        ])
    }

    pub fn from_value(value: Value) -> Result<Self, WalletError> {
        let Value::Object(mut fields) = value else {
            return Err(WalletError::Validation(
                "request envelope must be an object".to_string(),
            ));
        };
        let event_name = match fields.remove("eventName") {
            Some(Value::String(name)) => name,
            _ => {
                return Err(WalletError::Validation(
                    "request envelope is missing eventName".to_string(),
                ))
            }
        };
        let callback_nonce = fields
            .get("callbackNonce")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                WalletError::Validation("request envelope is missing callbackNonce".to_string())
            })?;
        let params = fields.remove("params").unwrap_or(Value::Null);
        Ok(Self {
            event_name,
            callback_nonce,
            params,
        })
    }
}

/// Response envelope received on [`CALLBACK_EVENT`].
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub success: bool,
    pub callback_nonce: u64,
    pub result: Value,
}

impl RpcResponse {
    pub fn ok(callback_nonce: u64, result: Value) -> Self {
        Self {
            success: true,
            callback_nonce,
            result,
        }
    }

    pub fn err(callback_nonce: u64, error: ErrorValue) -> Self {
        Self {
            success: false,
            callback_nonce,
            result: Value::Error(error),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::object([
            ("callbackNonce", Value::from(self.callback_nonce)),
            ("result", self.result.clone()),
            ("success", Value::from(self.success)),
        ])
    }

    pub fn from_value(value: Value) -> Result<Self, WalletError> {
        let Value::Object(mut fields) = value else {
            return Err(WalletError::Validation(
                "response envelope must be an object".to_string(),
            ));
        };
        let success = fields
            .get("success")
            .and_then(Value::as_bool)
            .ok_or_else(|| {
                WalletError::Validation("response envelope is missing success".to_string())
            })?;
        let callback_nonce = fields
            .get("callbackNonce")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                WalletError::Validation("response envelope is missing callbackNonce".to_string())
            })?;
        let result = fields.remove("result").unwrap_or(Value::Null);
        Ok(Self {
            success,
            callback_nonce,
            result,
        })
    }
}

/// Waiters for outstanding calls, keyed by nonce.
///
/// Entries are removed exactly once, when their response arrives. A response
/// that never arrives leaves its entry behind for the life of the bridge.
#[derive(Default)]
struct PendingCalls {
    waiters: DashMap<u64, oneshot::Sender<RpcResponse>>,
}

impl PendingCalls {
    fn register(&self, nonce: u64) -> oneshot::Receiver<RpcResponse> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(nonce, tx);
        rx
    }

    fn cancel(&self, nonce: u64) {
        self.waiters.remove(&nonce);
    }

    fn nonces(&self) -> Vec<u64> {
        let mut nonces: Vec<u64> = self.waiters.iter().map(|entry| *entry.key()).collect();
        nonces.sort_unstable();
        nonces
    }

    /// Route one raw callback payload. Never fails: anything that cannot be
    /// matched to a waiter is logged and dropped.
    fn handle_callback(&self, text: String) {
        let response = match codec::decode_unchecked(&text)
            .map_err(WalletError::from)
            .and_then(RpcResponse::from_value)
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable wallet callback");
                return;
            }
        };

        let nonce = response.callback_nonce;
        match self.waiters.remove(&nonce) {
            Some((_, waiter)) => {
                tracing::debug!(nonce, success = response.success, "wallet call settled");
                if waiter.send(response).is_err() {
                    tracing::debug!(nonce, "caller stopped waiting before the response arrived");
                }
            }
            None => {
                tracing::warn!(nonce, "dropping wallet callback for unknown nonce");
            }
        }
    }
}

/// RPC bridge to the embedded wallet.
///
/// Owns the channel handle (absent until [`RpcBridge::init`] completes), the
/// nonce counter, and the pending-call table.
pub struct RpcBridge {
    channel: OnceLock<Arc<dyn Channel>>,
    pending: Arc<PendingCalls>,
    next_nonce: AtomicU64,
    presentation: Arc<dyn Presentation>,
}

impl RpcBridge {
    pub fn new() -> Self {
        Self::with_presentation(NoPresentation)
    }

    pub fn with_presentation(presentation: impl Presentation + 'static) -> Self {
        Self {
            channel: OnceLock::new(),
            pending: Arc::new(PendingCalls::default()),
            next_nonce: AtomicU64::new(0),
            presentation: Arc::new(presentation),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.channel.get().is_some()
    }

    /// Run the handshake and start listening for callbacks.
    ///
    /// Calling this on an initialized bridge does nothing.
    pub async fn init<K: Connector>(
        &self,
        connector: &K,
        options: &EmbedOptions,
    ) -> Result<(), WalletError> {
        if self.is_initialized() {
            tracing::debug!("wallet bridge already initialized");
            return Ok(());
        }
        let channel = connector.connect(options).await?;
        self.attach(channel);
        Ok(())
    }

    /// Adopt a channel whose handshake already completed elsewhere.
    ///
    /// Returns false (and drops `channel`) if the bridge already has one.
    pub fn attach<C: Channel>(&self, channel: C) -> bool {
        if self.is_initialized() {
            return false;
        }
        let pending = self.pending.clone();
        channel.on(
            CALLBACK_EVENT,
            Arc::new(move |text: String| pending.handle_callback(text)),
        );
        self.channel.set(Arc::new(channel)).is_ok()
    }

    /// Call a wallet method and wait for its result.
    ///
    /// When `requires_interaction` is set, the presentation controller is
    /// prepared before dispatch and restored once the call settles, however
    /// it settles.
    pub async fn call(
        &self,
        event_name: &str,
        params: Value,
        requires_interaction: bool,
    ) -> Result<Value, WalletError> {
        let channel = self
            .channel
            .get()
            .cloned()
            .ok_or(WalletError::NotInitialized)?;

        let _restore = if requires_interaction {
            self.presentation.prepare(true)
        } else {
            Restore::noop()
        };

        let nonce = self.next_nonce.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            event_name: event_name.to_string(),
            callback_nonce: nonce,
            params,
        };
        tracing::debug!(
            event = event_name,
            nonce,
            params = %codec::fingerprint(&request.params),
            requires_interaction,
            "dispatching wallet call"
        );

        let response = self.pending.register(nonce);
        if let Err(e) = channel.call(event_name, codec::encode(&request.to_value())) {
            self.pending.cancel(nonce);
            return Err(e);
        }

        let response = response.await.map_err(|_| {
            WalletError::Transport(format!(
                "wallet call '{event_name}' dropped before a response arrived"
            ))
        })?;

        if response.success {
            Ok(response.result)
        } else {
            Err(WalletError::Remote(ErrorValue::from_value(response.result)))
        }
    }

    /// [`RpcBridge::call`], deserializing the result.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        event_name: &str,
        params: Value,
        requires_interaction: bool,
    ) -> Result<T, WalletError> {
        self.call(event_name, params, requires_interaction)
            .await?
            .deserialize_into()
    }

    /// Nonces of calls still waiting for a response, sorted.
    pub fn pending_nonces(&self) -> Vec<u64> {
        self.pending.nonces()
    }
}

impl Default for RpcBridge {
    fn default() -> Self {
        Self::new()
    }
}
