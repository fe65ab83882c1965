//! Wallet side of the correlation protocol.
//!
//! A [`Responder`] subscribes async handlers to method events, and answers
//! each request on [`CALLBACK_EVENT`] with the nonce it came in with. Every
//! request runs on its own task, so answers go out in completion order,
//! not arrival order.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::channel::Channel;
use crate::codec::{self, ErrorValue, Value};
use crate::constants::{CALLBACK_EVENT, HANDSHAKE_EVENT};
use crate::rpc::{RpcRequest, RpcResponse};

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ErrorValue>> + Send + Sync>;

/// Serves wallet methods over a channel.
#[derive(Clone)]
pub struct Responder {
    channel: Arc<dyn Channel>,
}

impl Responder {
    pub fn new(channel: impl Channel) -> Self {
        Self {
            channel: Arc::new(channel),
        }
    }

    /// Announce the wallet context to the host under `name`. A host waiting
    /// in [`crate::channel::Connector::connect`] resolves on this, and fails
    /// if `name` is not the one it asked for.
    pub fn announce(&self, name: &str) -> &Self {
        if let Err(e) = self.channel.call(HANDSHAKE_EVENT, name.to_string()) {
            tracing::warn!(name, error = %e, "failed to announce wallet context");
        }
        self
    }

    /// Serve `event` with `handler`. An `Err` is sent back as an encoded
    /// `Error` and surfaces on the host as a remote error.
    pub fn handle<F, Fut>(&self, event: &str, handler: F) -> &Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ErrorValue>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |params: Value| handler(params).boxed());
        let channel = self.channel.clone();
        let event_name = event.to_string();

        self.channel.on(
            event,
            Arc::new(move |text: String| {
                let request = match codec::decode(&text).and_then(RpcRequest::from_value) {
                    Ok(request) => request,
                    Err(e) => {
                        tracing::warn!(event = %event_name, error = %e, "ignoring malformed request");
                        return;
                    }
                };

                let handler = handler.clone();
                let channel = channel.clone();
                tokio::spawn(async move {
                    let nonce = request.callback_nonce;
                    let response = match handler(request.params).await {
                        Ok(result) => RpcResponse::ok(nonce, result),
                        Err(error) => RpcResponse::err(nonce, error),
                    };
                    if let Err(e) = channel.call(CALLBACK_EVENT, codec::encode(&response.to_value())) {
                        tracing::warn!(
                            event = %request.event_name,
                            nonce,
                            error = %e,
                            "failed to answer wallet request"
                        );
                    }
                });
            }),
        );
        self
    }
}
