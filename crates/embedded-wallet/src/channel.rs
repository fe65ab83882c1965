//! Channel handshake and the messaging primitive the bridge runs on.
//!
//! A [`Channel`] carries named text events in both directions between the
//! host and the embedded wallet context. It is established once by a
//! [`Connector`], and everything after that is fire-and-forget: `call`
//! enqueues, `on` subscribes. Correlation lives one layer up in
//! [`crate::rpc::RpcBridge`].

use std::future::Future;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::config::EmbedOptions;
use crate::constants::HANDSHAKE_EVENT;
use crate::WalletError;

/// Handler invoked with the raw text payload of an inbound event.
pub type EventHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Bidirectional named-event channel to the remote context.
pub trait Channel: Send + Sync + 'static {
    /// Subscribe `handler` to inbound events named `event`.
    fn on(&self, event: &str, handler: EventHandler);

    /// Dispatch an outbound event. Returns once the message is queued.
    fn call(&self, event: &str, payload: String) -> Result<(), WalletError>;
}

/// Establishes a [`Channel`] to the embedded wallet.
pub trait Connector: Send + Sync {
    type Channel: Channel;

    fn connect(
        &self,
        options: &EmbedOptions,
    ) -> impl Future<Output = Result<Self::Channel, WalletError>> + Send;
}

// --- In-process channel ---

#[derive(Default)]
struct Endpoint {
    handlers: DashMap<String, Vec<EventHandler>>,
}

impl Endpoint {
    fn deliver(&self, event: &str, payload: String) {
        // Clone out of the map so handlers may subscribe or call without
        // holding the shard lock.
        let handlers = self.handlers.get(event).map(|h| h.value().clone());
        match handlers {
            Some(handlers) => {
                for handler in handlers {
                    handler(payload.clone());
                }
            }
            None => tracing::debug!(event, "dropping event with no subscriber"),
        }
    }
}

/// One end of an in-process channel pair.
///
/// Each direction is an unbounded queue drained by its own Tokio task, so
/// delivery is asynchronous with respect to the sender, as it is across a
/// real frame boundary.
#[derive(Clone)]
pub struct LocalChannel {
    local: Arc<Endpoint>,
    outbound: mpsc::UnboundedSender<(String, String)>,
}

impl LocalChannel {
    /// Create a connected pair. Must be called inside a Tokio runtime.
    pub fn pair() -> (LocalChannel, LocalChannel) {
        let left = Arc::new(Endpoint::default());
        let right = Arc::new(Endpoint::default());

        let (to_right, right_rx) = mpsc::unbounded_channel();
        let (to_left, left_rx) = mpsc::unbounded_channel();

        tokio::spawn(pump(right_rx, right.clone()));
        tokio::spawn(pump(left_rx, left.clone()));

        (
            LocalChannel {
                local: left,
                outbound: to_right,
            },
            LocalChannel {
                local: right,
                outbound: to_left,
            },
        )
    }
}

async fn pump(mut rx: mpsc::UnboundedReceiver<(String, String)>, peer: Arc<Endpoint>) {
    while let Some((event, payload)) = rx.recv().await {
        peer.deliver(&event, payload);
    }
    // Nothing can reach the peer any more. Its handlers may hold channel
    // clones (a responder replying on the callback event), so release them.
    peer.handlers.clear();
}

impl Channel for LocalChannel {
    fn on(&self, event: &str, handler: EventHandler) {
        self.local
            .handlers
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    fn call(&self, event: &str, payload: String) -> Result<(), WalletError> {
        self.outbound
            .send((event.to_string(), payload))
            .map_err(|_| WalletError::Transport(format!("channel closed, cannot send '{event}'")))
    }
}

/// Connector for wallets hosted in the same process.
///
/// `mount` receives the remote end of a fresh channel pair. It registers the
/// wallet's handlers on it (typically through a
/// [`crate::responder::Responder`]) and announces the context on the
/// handshake event. `connect` resolves once the host has seen that
/// announcement. A mount that drops the remote end without announcing fails
/// the handshake; one that keeps it and never announces leaves `connect`
/// pending, as an embedded page that never loads would.
pub struct LocalConnector<F> {
    mount: F,
}

impl<F> LocalConnector<F>
where
    F: Fn(LocalChannel, &EmbedOptions) + Send + Sync,
{
    pub fn new(mount: F) -> Self {
        Self { mount }
    }
}

impl<F> Connector for LocalConnector<F>
where
    F: Fn(LocalChannel, &EmbedOptions) + Send + Sync,
{
    type Channel = LocalChannel;

    async fn connect(&self, options: &EmbedOptions) -> Result<LocalChannel, WalletError> {
        Url::parse(&options.url)
            .map_err(|e| WalletError::Config(format!("invalid wallet url '{}': {e}", options.url)))?;

        let (host, remote) = LocalChannel::pair();

        let (ready_tx, ready_rx) = oneshot::channel::<String>();
        let ready_tx = Mutex::new(Some(ready_tx));
        host.on(
            HANDSHAKE_EVENT,
            Arc::new(move |peer_name: String| {
                let sender = ready_tx.lock().ok().and_then(|mut slot| slot.take());
                if let Some(sender) = sender {
                    let _ = sender.send(peer_name);
                }
            }),
        );

        (self.mount)(remote, options);

        let peer_name = ready_rx
            .await
            .map_err(|_| WalletError::Transport("handshake aborted by remote".to_string()))?;
        if peer_name != options.name {
            return Err(WalletError::Transport(format!(
                "handshake name mismatch: expected '{}', got '{peer_name}'",
                options.name
            )));
        }

        tracing::info!(
            url = %options.url,
            name = %options.name,
            container = %options.container,
            "wallet channel connected"
        );
        Ok(host)
    }
}
