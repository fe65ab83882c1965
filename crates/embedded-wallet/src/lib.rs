//! RPC bridge to a wallet running in an isolated embedded context.
//!
//! The host and the wallet share nothing but a text channel. This crate
//! layers a correlated request/response protocol over that channel and
//! carries values plain JSON cannot (errors, big integers, maps, sets)
//! through a tagged codec.
//!
//! # Pieces
//!
//! - **Channel** ([`Channel`], [`Connector`]): one-time handshake, then named events
//! - **Bridge** ([`RpcBridge`]): nonces, pending calls, result routing
//! - **Codec** ([`codec`]): tagged JSON encoding with deterministic key order
//! - **Wallet** ([`EmbeddedWallet`]): typed wallet methods on top of the bridge
//! - **Responder** ([`Responder`]): the wallet side, for in-process hosts and tests
//!
//! # Quick example
//!
//! ```no_run
//! use embedded_wallet::{EmbedOptions, EmbeddedWallet, LocalChannel, LocalConnector, Responder, Value};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), embedded_wallet::WalletError> {
//! let connector = LocalConnector::new(|remote: LocalChannel, options: &EmbedOptions| {
//!     Responder::new(remote)
//!         .handle("getAccountAddress", |_params: Value| async {
//!             Ok(Value::from("0x1111111111111111111111111111111111111111"))
//!         })
//!         .announce(&options.name);
//! });
//! let options = EmbedOptions::new("https://wallet.example.com/embed");
//! let wallet = EmbeddedWallet::connect(&connector, &options).await?;
//! let address = wallet.get_account_address().await?;
//! # Ok(())
//! # }
//! ```

// Core types
pub mod codec;
pub mod constants;
pub mod error;

// Channel and correlation
pub mod channel;
pub mod presentation;
pub mod responder;
pub mod rpc;

// Host configuration and wallet surface
pub mod config;
pub mod wallet;

pub use channel::{Channel, Connector, EventHandler, LocalChannel, LocalConnector};
pub use codec::{ErrorValue, Value};
pub use config::EmbedOptions;
pub use constants::*;
pub use error::{RemoteError, WalletError};
pub use presentation::{NoPresentation, Presentation, Restore};
pub use responder::Responder;
pub use rpc::{RpcBridge, RpcRequest, RpcResponse};
pub use wallet::{
    EmbeddedWallet, Erc3009Request, PermitRequest, PermitSignature, SignedAuthorization,
    WalletStatus,
};
