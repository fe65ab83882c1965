//! Typed surface over the wallet's RPC methods.

use std::sync::Arc;

use alloy::primitives::{Address, I256, U256};
use serde::{Deserialize, Deserializer, Serialize};

use crate::channel::Connector;
use crate::codec::Value;
use crate::config::EmbedOptions;
use crate::constants::{
    METHOD_GET_ACCOUNT_ADDRESS, METHOD_GET_ERC3009_SIGNATURE, METHOD_GET_PERMIT_SIGNATURE,
    METHOD_GET_STATUS, METHOD_SIGN_IN, METHOD_SIGN_OUT,
};
use crate::rpc::RpcBridge;
use crate::WalletError;

// --- Wallet types ---

/// Session state reported by `getStatus`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WalletStatus {
    pub signed_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// ERC-3009 `transferWithAuthorization` signature returned by the wallet.
///
/// Fields are kept as the wallet sent them so they can be embedded verbatim
/// in a payment proof. Numeric fields accept either JSON numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAuthorization {
    pub signature: String,
    pub from: String,
    pub to: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
    #[serde(deserialize_with = "string_or_number")]
    pub valid_after: String,
    #[serde(deserialize_with = "string_or_number")]
    pub valid_before: String,
    pub nonce: String,
}

/// EIP-2612 permit signature returned by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitSignature {
    pub signature: String,
    pub owner: String,
    pub spender: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
    #[serde(deserialize_with = "string_or_number")]
    pub nonce: String,
    #[serde(deserialize_with = "string_or_number")]
    pub deadline: String,
}

/// Arguments of `getERC3009Signature`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc3009Request {
    /// Human-readable label shown to the user (the paid resource).
    pub recipient: String,
    pub destination_address: Address,
    pub amount: U256,
    /// Unix seconds.
    pub valid_until: u64,
    /// Unix seconds.
    pub valid_after: u64,
}

impl Erc3009Request {
    fn to_params(&self) -> Result<Value, WalletError> {
        Ok(Value::object([
            ("amount", amount_value(self.amount)?),
            ("destinationAddress", Value::from(self.destination_address.to_string())),
            ("recipient", Value::from(self.recipient.as_str())),
            ("validAfter", Value::from(self.valid_after)),
            ("validUntil", Value::from(self.valid_until)),
        ]))
    }
}

/// Arguments of `getPermitSignature`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitRequest {
    pub recipient: String,
    pub destination_address: Address,
    pub amount: U256,
    pub nonce: u64,
    pub deadline_seconds: u64,
}

impl PermitRequest {
    fn to_params(&self) -> Result<Value, WalletError> {
        Ok(Value::object([
            ("amount", amount_value(self.amount)?),
            ("deadlineSeconds", Value::from(self.deadline_seconds)),
            ("destinationAddress", Value::from(self.destination_address.to_string())),
            ("nonce", Value::from(self.nonce)),
            ("recipient", Value::from(self.recipient.as_str())),
        ]))
    }
}

/// Token amounts travel as tagged BigInt values, which are signed 256-bit.
fn amount_value(amount: U256) -> Result<Value, WalletError> {
    let signed = I256::from_raw(amount);
    if signed.is_negative() {
        return Err(WalletError::Validation(format!(
            "amount {amount} does not fit a signed 256-bit integer"
        )));
    }
    Ok(Value::BigInt(signed))
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

// --- Wallet handle ---

/// Host-side handle to the embedded wallet.
///
/// Cheap to clone; clones share one bridge, so one nonce space and one
/// pending table.
#[derive(Clone)]
pub struct EmbeddedWallet {
    bridge: Arc<RpcBridge>,
}

impl EmbeddedWallet {
    pub fn new(bridge: RpcBridge) -> Self {
        Self {
            bridge: Arc::new(bridge),
        }
    }

    /// Create a bridge and run the handshake with `connector`.
    pub async fn connect<K: Connector>(
        connector: &K,
        options: &EmbedOptions,
    ) -> Result<Self, WalletError> {
        let wallet = Self::new(RpcBridge::new());
        wallet.bridge.init(connector, options).await?;
        Ok(wallet)
    }

    pub fn bridge(&self) -> &RpcBridge {
        &self.bridge
    }

    pub async fn get_status(&self) -> Result<WalletStatus, WalletError> {
        self.bridge
            .call_as(METHOD_GET_STATUS, Value::Null, false)
            .await
    }

    /// Prompt the user to sign in as `username`.
    pub async fn sign_in(&self, username: &str) -> Result<(), WalletError> {
        let params = Value::object([("username", Value::from(username))]);
        self.bridge.call(METHOD_SIGN_IN, params, true).await?;
        tracing::info!(username, "wallet sign-in completed");
        Ok(())
    }

    /// Ask the user to authorize an ERC-3009 transfer.
    pub async fn get_erc3009_signature(
        &self,
        request: &Erc3009Request,
    ) -> Result<SignedAuthorization, WalletError> {
        self.bridge
            .call_as(METHOD_GET_ERC3009_SIGNATURE, request.to_params()?, true)
            .await
    }

    /// Ask the user to sign an EIP-2612 permit.
    pub async fn get_permit_signature(
        &self,
        request: &PermitRequest,
    ) -> Result<PermitSignature, WalletError> {
        self.bridge
            .call_as(METHOD_GET_PERMIT_SIGNATURE, request.to_params()?, true)
            .await
    }

    pub async fn sign_out(&self) -> Result<(), WalletError> {
        self.bridge.call(METHOD_SIGN_OUT, Value::Null, false).await?;
        Ok(())
    }

    pub async fn get_account_address(&self) -> Result<Address, WalletError> {
        let raw: String = self
            .bridge
            .call_as(METHOD_GET_ACCOUNT_ADDRESS, Value::Null, false)
            .await?;
        raw.parse::<Address>()
            .map_err(|e| WalletError::Validation(format!("invalid account address '{raw}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{LocalChannel, LocalConnector};
    use crate::codec::ErrorValue;
    use crate::responder::Responder;
    use alloy::primitives::address;
    use serde_json::json;
    use tokio::sync::mpsc;

    const DEST: Address = address!("1111111111111111111111111111111111111111");

    fn options() -> EmbedOptions {
        EmbedOptions::new("https://wallet.example.com/embed")
    }

    #[test]
    fn test_erc3009_params_carry_bigint_amount() {
        let request = Erc3009Request {
            recipient: "https://api.example.com/data".to_string(),
            destination_address: DEST,
            amount: U256::from(1000u64),
            valid_until: 160,
            valid_after: 100,
        };
        let params = request.to_params().unwrap();
        assert_eq!(params.get("amount"), Some(&Value::BigInt(I256::from_raw(U256::from(1000u64)))));
        assert_eq!(params.get("validUntil").and_then(Value::as_u64), Some(160));
        assert_eq!(params.get("validAfter").and_then(Value::as_u64), Some(100));
        assert_eq!(
            params.get("recipient").and_then(Value::as_str),
            Some("https://api.example.com/data")
        );
        assert_eq!(
            params
                .get("destinationAddress")
                .and_then(Value::as_str)
                .map(str::to_lowercase),
            Some("0x1111111111111111111111111111111111111111".to_string())
        );
    }

    #[test]
    fn test_amount_above_signed_range_is_rejected() {
        assert!(matches!(amount_value(U256::MAX), Err(WalletError::Validation(_))));
    }

    #[test]
    fn test_signed_authorization_accepts_numbers() {
        let auth: SignedAuthorization = serde_json::from_value(json!({
            "signature": "0xsig",
            "from": "0xfrom",
            "to": "0xto",
            "value": 1000,
            "validAfter": "100",
            "validBefore": 160,
            "nonce": "0x01"
        }))
        .unwrap();
        assert_eq!(auth.value, "1000");
        assert_eq!(auth.valid_after, "100");
        assert_eq!(auth.valid_before, "160");
    }

    #[tokio::test]
    async fn test_wallet_methods_over_local_channel() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<(String, Value)>();
        let connector = LocalConnector::new(move |remote: LocalChannel, options: &EmbedOptions| {
            let responder = Responder::new(remote);
            let seen = seen_tx.clone();
            responder.handle(METHOD_GET_STATUS, |_params: Value| async {
                Ok(Value::from(json!({"signedIn": true, "username": "alice"})))
            });
            responder.handle(METHOD_SIGN_IN, move |params: Value| {
                let seen = seen.clone();
                async move {
                    let _ = seen.send((METHOD_SIGN_IN.to_string(), params));
                    Ok(Value::Null)
                }
            });
            responder.handle(METHOD_GET_ACCOUNT_ADDRESS, |_params: Value| async {
                Ok(Value::from("0x1111111111111111111111111111111111111111"))
            });
            responder.handle(METHOD_SIGN_OUT, |_params: Value| async {
                Err(ErrorValue::new("Error", "no session"))
            });
            responder.announce(&options.name);
        });

        let wallet = EmbeddedWallet::connect(&connector, &options()).await.unwrap();
        assert!(wallet.bridge().is_initialized());

        let status = wallet.get_status().await.unwrap();
        assert!(status.signed_in);
        assert_eq!(status.username.as_deref(), Some("alice"));

        wallet.sign_in("alice").await.unwrap();
        let (method, params) = seen_rx.recv().await.unwrap();
        assert_eq!(method, METHOD_SIGN_IN);
        assert_eq!(params.get("username").and_then(Value::as_str), Some("alice"));

        assert_eq!(wallet.get_account_address().await.unwrap(), DEST);

        match wallet.sign_out().await {
            Err(WalletError::Remote(err)) => assert_eq!(err.message, "no session"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bad_account_address_is_validation_error() {
        let connector = LocalConnector::new(|remote: LocalChannel, options: &EmbedOptions| {
            Responder::new(remote)
                .handle(METHOD_GET_ACCOUNT_ADDRESS, |_params: Value| async {
                    Ok(Value::from("not-an-address"))
                })
                .announce(&options.name);
        });
        let wallet = EmbeddedWallet::connect(&connector, &options()).await.unwrap();
        assert!(matches!(
            wallet.get_account_address().await,
            Err(WalletError::Validation(_))
        ));
    }
}
