//! Allowlist checks run before the wallet is asked for anything.

use alloy::primitives::{Address, U256};
use embedded_wallet::WalletError;
use serde_json::Value as Json;

use crate::challenge::{PaymentChallenge, PaymentRequirement};
use crate::config::PaymentConfig;
use crate::constants::{EIP155_PREFIX, EIP3009_METHOD, EXACT_SCHEME};
use crate::payment::AcceptedPayment;

/// An entry that passed every check, with its fields in typed form.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPayment {
    pub chain_id: u64,
    pub asset: Address,
    pub pay_to: Address,
    pub amount: U256,
    pub max_timeout_seconds: u64,
    /// The entry as offered, for echoing back in the proof.
    pub accepted: AcceptedPayment,
}

/// First entry whose scheme is `exact` (any case).
pub fn select_exact(challenge: &PaymentChallenge) -> Result<&PaymentRequirement, WalletError> {
    challenge
        .accepted
        .iter()
        .find(|entry| entry.scheme.eq_ignore_ascii_case(EXACT_SCHEME))
        .ok_or_else(|| {
            WalletError::UnsupportedScheme(format!(
                "no supported scheme found in {:?}",
                challenge
                    .accepted
                    .iter()
                    .map(|entry| &entry.scheme)
                    .collect::<Vec<_>>()
            ))
        })
}

/// Chain id of a CAIP-2 `eip155:<digits>` network.
pub fn parse_chain_id(network: &str) -> Option<u64> {
    let digits = network.strip_prefix(EIP155_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Check an entry against the allowlist.
pub fn validate(
    entry: &PaymentRequirement,
    config: &PaymentConfig,
) -> Result<ValidatedPayment, WalletError> {
    let network = entry
        .network
        .as_deref()
        .ok_or_else(|| WalletError::UnsupportedNetwork("payment entry has no network".to_string()))?;
    let chain_id = parse_chain_id(network)
        .ok_or_else(|| WalletError::UnsupportedNetwork(format!("unrecognized network '{network}'")))?;

    let amount_raw = required(&entry.amount, "amount")?;
    let asset_raw = required(&entry.asset, "asset")?;
    let pay_to_raw = required(&entry.pay_to, "payTo")?;

    let asset_allowed = chain_id == config.chain_id
        && asset_raw
            .trim()
            .eq_ignore_ascii_case(&config.asset.to_string());
    if !asset_allowed {
        return Err(WalletError::UnsupportedAsset(format!(
            "{asset_raw} on chain {chain_id} (only {} on chain {} is accepted)",
            config.asset, config.chain_id
        )));
    }

    if let Some(method) = entry.transfer_method() {
        let supported = matches!(method, Json::String(m) if m.eq_ignore_ascii_case(EIP3009_METHOD));
        if !supported {
            return Err(WalletError::UnsupportedMethod(format!(
                "{method} (only {EIP3009_METHOD} is supported)"
            )));
        }
    }

    let amount = parse_amount(amount_raw)?;
    let pay_to = pay_to_raw
        .trim()
        .parse::<Address>()
        .map_err(|e| WalletError::ChallengeParse(format!("invalid payTo '{pay_to_raw}': {e}")))?;

    let max_timeout_seconds = entry
        .max_timeout_seconds
        .filter(|secs| *secs > 0)
        .unwrap_or(config.default_timeout_secs);

    Ok(ValidatedPayment {
        chain_id,
        asset: config.asset,
        pay_to,
        amount,
        max_timeout_seconds,
        accepted: AcceptedPayment {
            scheme: entry.scheme.clone(),
            network: network.to_string(),
            amount: amount_raw.to_string(),
            asset: asset_raw.to_string(),
            pay_to: pay_to_raw.to_string(),
            max_timeout_seconds: entry.max_timeout_seconds,
            extra: entry.extra.clone(),
        },
    })
}

fn required<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str, WalletError> {
    field
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| WalletError::ChallengeParse(format!("payment entry is missing {name}")))
}

/// Base-unit amount: plain decimal digits, no sign, fits 256 bits.
fn parse_amount(raw: &str) -> Result<U256, WalletError> {
    let digits = raw.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WalletError::ChallengeParse(format!(
            "amount must be a non-negative decimal integer, got '{raw}'"
        )));
    }
    U256::from_str_radix(digits, 10)
        .map_err(|e| WalletError::ChallengeParse(format!("amount '{raw}' out of range: {e}")))
}
