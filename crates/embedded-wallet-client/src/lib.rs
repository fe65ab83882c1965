//! x402 client that pays with an embedded wallet.
//!
//! Handles the HTTP 402 flow: request -> 402 -> parse and check the
//! challenge -> wallet signs an ERC-3009 authorization -> retry with
//! `PAYMENT-SIGNATURE`.
//!
//! Only the `exact` scheme, one allowlisted chain/asset pair (USDC on Base
//! by default) and the `eip3009` transfer method are accepted. Anything else
//! is refused before the wallet sees it.
//!
//! # Quick Example
//!
//! ```no_run
//! use embedded_wallet::{EmbedOptions, EmbeddedWallet, LocalChannel, LocalConnector};
//! use embedded_wallet_client::{HttpRequest, PaymentClient};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), embedded_wallet::WalletError> {
//! # let connector = LocalConnector::new(|remote: LocalChannel, options: &EmbedOptions| {
//! #     embedded_wallet::Responder::new(remote).announce(&options.name);
//! # });
//! let options = EmbedOptions::from_env()?;
//! let wallet = EmbeddedWallet::connect(&connector, &options).await?;
//! let client = PaymentClient::new(wallet)?;
//!
//! let resp = client
//!     .fetch_with_payment(HttpRequest::get("https://api.example.com/data"))
//!     .await?;
//! if let Some(s) = resp.settlement() {
//!     println!("Paid via tx: {:?}", s.transaction);
//! }
//! # Ok(())
//! # }
//! ```

pub mod challenge;
pub mod config;
pub mod constants;
mod http_client;
pub mod payment;
pub mod signer;
pub mod transport;
pub mod validate;

pub use challenge::{PaymentChallenge, PaymentRequirement, ResourceInfo};
pub use config::PaymentConfig;
pub use constants::*;
pub use http_client::PaymentClient;
pub use payment::{
    decode_payment, decode_settlement, encode_payment, AcceptedPayment, Authorization,
    ExactPayload, PaymentPayload, SettleResponse,
};
pub use signer::{AuthorizationSigner, TransferRequest};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use validate::{select_exact, validate, ValidatedPayment};

// Re-export commonly needed types from core
pub use embedded_wallet::{EmbeddedWallet, SignedAuthorization, WalletError};
