//! Parsing of the `PAYMENT-REQUIRED` challenge header.
//!
//! Servers disagree on how the descriptor is packed (raw JSON, base64 in
//! either alphabet, sometimes wrapped in a JSON string) and on what the
//! accepted-entry list is called. Everything is folded into one
//! [`PaymentChallenge`] here, so validation only ever sees one shape.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::engine::GeneralPurpose;
use base64::Engine;
use embedded_wallet::WalletError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

const ENGINES: [GeneralPurpose; 4] = [STANDARD, URL_SAFE, STANDARD_NO_PAD, URL_SAFE_NO_PAD];

/// Keys servers use for the accepted-payment list, in lookup order.
const ACCEPTED_KEYS: [&str; 3] = ["accepted", "accepts", "paymentRequirements"];

/// What is being paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ResourceInfo {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: None,
            mime_type: None,
        }
    }
}

/// One accepted-payment entry, as offered. Nothing here is validated yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentRequirement {
    pub scheme: String,
    pub network: Option<String>,
    /// Decimal string, as sent (numbers are stringified).
    pub amount: Option<String>,
    pub asset: Option<String>,
    pub pay_to: Option<String>,
    pub max_timeout_seconds: Option<u64>,
    pub extra: Option<Map<String, Json>>,
}

impl PaymentRequirement {
    /// The requested transfer method, under either spelling of its key.
    /// A null value counts as absent.
    pub fn transfer_method(&self) -> Option<&Json> {
        let extra = self.extra.as_ref()?;
        ["assetTransferMethod", "asset_transfer_method"]
            .iter()
            .find_map(|key| extra.get(*key).filter(|v| !v.is_null()))
    }

    /// `None` for entries this client cannot read; they are skipped.
    fn from_json(entry: Json) -> Option<Self> {
        let mut fields = match entry {
            Json::Object(fields) => fields,
            other => {
                tracing::debug!(entry = %other, "Skipping accepted payment entry that is not an object");
                return None;
            }
        };
        let extra = match fields.remove("extra") {
            Some(Json::Object(extra)) => Some(extra),
            Some(Json::Null) | None => None,
            Some(other) => {
                tracing::debug!(
                    scheme = ?fields.get("scheme"),
                    extra = %other,
                    "Skipping accepted payment entry whose extra is not an object"
                );
                return None;
            }
        };
        Some(Self {
            scheme: text_field(&fields, "scheme").unwrap_or_default(),
            network: text_field(&fields, "network"),
            amount: text_field(&fields, "amount")
                .or_else(|| text_field(&fields, "maxAmountRequired")),
            asset: text_field(&fields, "asset"),
            pay_to: text_field(&fields, "payTo"),
            max_timeout_seconds: fields.get("maxTimeoutSeconds").and_then(|v| match v {
                Json::Number(n) => n.as_u64(),
                Json::String(s) => s.trim().parse().ok(),
                _ => None,
            }),
            extra,
        })
    }
}

/// A normalised 402 challenge.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentChallenge {
    pub x402_version: Option<u32>,
    pub resource: Option<ResourceInfo>,
    /// Never empty. Entries that are not objects, or carry a non-object
    /// `extra`, have been dropped.
    pub accepted: Vec<PaymentRequirement>,
}

impl PaymentChallenge {
    /// Parse a raw header value.
    pub fn parse(header: &str) -> Result<Self, WalletError> {
        Self::normalize(decode_header(header)?)
    }

    /// Fold any supported descriptor shape into a challenge.
    pub fn normalize(descriptor: Json) -> Result<Self, WalletError> {
        let (x402_version, resource, entries) = match descriptor {
            Json::Array(entries) => (None, None, entries),
            Json::Object(mut fields) => {
                let x402_version = fields
                    .get("x402Version")
                    .and_then(Json::as_u64)
                    .and_then(|v| u32::try_from(v).ok());
                let resource = fields.get("resource").and_then(resource_info);
                let entries = match ACCEPTED_KEYS.iter().find_map(|key| fields.remove(*key)) {
                    Some(Json::Array(entries)) => entries,
                    Some(entry @ Json::Object(_)) => vec![entry],
                    Some(other) => {
                        return Err(WalletError::ChallengeParse(format!(
                            "accepted payments must be an object or array, got {other}"
                        )))
                    }
                    None if fields.contains_key("scheme") => vec![Json::Object(fields)],
                    None => {
                        return Err(WalletError::ChallengeParse(
                            "challenge lists no accepted payments".to_string(),
                        ))
                    }
                };
                (x402_version, resource, entries)
            }
            other => {
                return Err(WalletError::ChallengeParse(format!(
                    "challenge must be an object or array, got {other}"
                )))
            }
        };

        let accepted = entries
            .into_iter()
            .filter_map(PaymentRequirement::from_json)
            .collect::<Vec<_>>();
        if accepted.is_empty() {
            return Err(WalletError::ChallengeParse(
                "challenge lists no accepted payments".to_string(),
            ));
        }

        Ok(Self {
            x402_version,
            resource,
            accepted,
        })
    }
}

/// Decode the header text into a JSON descriptor.
///
/// Tries plain JSON, then base64 JSON (standard alphabet first), then the
/// same two inside a JSON string literal.
pub fn decode_header(header: &str) -> Result<Json, WalletError> {
    let header = header.trim();
    if let Some(json) = decode_layer(header) {
        return Ok(json);
    }
    if let Ok(Json::String(inner)) = serde_json::from_str::<Json>(header) {
        if let Some(json) = decode_layer(inner.trim()) {
            return Ok(json);
        }
    }
    Err(WalletError::ChallengeParse(
        "PAYMENT-REQUIRED header is neither JSON nor base64 JSON".to_string(),
    ))
}

fn decode_layer(text: &str) -> Option<Json> {
    if let Ok(json) = serde_json::from_str::<Json>(text) {
        if is_descriptor(&json) {
            return Some(json);
        }
    }
    ENGINES.iter().find_map(|engine| {
        let bytes = engine.decode(text).ok()?;
        serde_json::from_slice::<Json>(&bytes)
            .ok()
            .filter(is_descriptor)
    })
}

fn is_descriptor(json: &Json) -> bool {
    json.is_object() || json.is_array()
}

fn text_field(fields: &Map<String, Json>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn resource_info(value: &Json) -> Option<ResourceInfo> {
    match value {
        Json::String(url) => Some(ResourceInfo::from_url(url.clone())),
        Json::Object(_) => serde_json::from_value(value.clone()).ok(),
        _ => None,
    }
}
