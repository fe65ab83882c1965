use base64::Engine;
use embedded_wallet::{SignedAuthorization, WalletError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::challenge::ResourceInfo;

/// The accepted-payment entry echoed back in the proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedPayment {
    pub scheme: String,
    pub network: String,
    pub amount: String,
    pub asset: String,
    pub pay_to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Map<String, Json>>,
}

/// ERC-3009 authorization fields, copied verbatim from the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub from: String,
    pub to: String,
    pub value: String,
    pub valid_after: String,
    pub valid_before: String,
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactPayload {
    pub signature: String,
    pub authorization: Authorization,
}

impl From<SignedAuthorization> for ExactPayload {
    fn from(signed: SignedAuthorization) -> Self {
        Self {
            signature: signed.signature,
            authorization: Authorization {
                from: signed.from,
                to: signed.to,
                value: signed.value,
                valid_after: signed.valid_after,
                valid_before: signed.valid_before,
                nonce: signed.nonce,
            },
        }
    }
}

/// Wire-format payment proof (sent in the PAYMENT-SIGNATURE header, base64-encoded JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: u32,
    pub resource: ResourceInfo,
    pub accepted: AcceptedPayment,
    pub payload: ExactPayload,
}

/// Settlement result a paid server may return in the PAYMENT-RESPONSE header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    /// Payer address as the server reported it. Not checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Transaction hash, if settlement succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(default)]
    pub network: String,
}

/// Base64-encode a payment payload for the PAYMENT-SIGNATURE header.
pub fn encode_payment(payload: &PaymentPayload) -> Result<String, WalletError> {
    let json = serde_json::to_vec(payload)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(&json))
}

/// Decode a payment payload from the PAYMENT-SIGNATURE header.
pub fn decode_payment(encoded: &str) -> Result<PaymentPayload, WalletError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| WalletError::Validation(format!("invalid base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| WalletError::Validation(format!("invalid payment JSON: {e}")))
}

/// Parse a PAYMENT-RESPONSE header: base64 JSON first, plain JSON as fallback.
pub fn decode_settlement(header: &str) -> Option<SettleResponse> {
    base64::engine::general_purpose::STANDARD
        .decode(header)
        .ok()
        .and_then(|bytes| serde_json::from_slice::<SettleResponse>(&bytes).ok())
        .or_else(|| serde_json::from_str::<SettleResponse>(header).ok())
}
