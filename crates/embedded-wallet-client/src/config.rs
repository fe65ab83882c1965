use std::env;

use alloy::primitives::Address;
use embedded_wallet::WalletError;

use crate::constants::{BASE_CHAIN_ID, BASE_USDC, DEFAULT_MAX_TIMEOUT_SECS, DEFAULT_X402_VERSION};

/// What the client is willing to pay with.
///
/// Exactly one chain/asset pair is allowlisted. Challenges asking for
/// anything else are refused before the wallet is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfig {
    /// Allowlisted chain (the `<id>` of `eip155:<id>`).
    pub chain_id: u64,
    /// Allowlisted token contract on that chain.
    pub asset: Address,
    /// Validity window when the challenge has no `maxTimeoutSeconds`.
    pub default_timeout_secs: u64,
    /// Protocol version written when the challenge has none.
    pub x402_version: u32,
}

impl Default for PaymentConfig {
    /// USDC on Base.
    fn default() -> Self {
        Self {
            chain_id: BASE_CHAIN_ID,
            asset: BASE_USDC,
            default_timeout_secs: DEFAULT_MAX_TIMEOUT_SECS,
            x402_version: DEFAULT_X402_VERSION,
        }
    }
}

impl PaymentConfig {
    /// Load overrides from the environment (and `.env`, if present).
    /// Every variable is optional; unset ones keep the defaults.
    pub fn from_env() -> Result<Self, WalletError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, WalletError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get("X402_CHAIN_ID") {
            config.chain_id = parse_number("X402_CHAIN_ID", &raw)?;
        }
        if let Some(raw) = get("X402_ASSET") {
            config.asset = raw
                .trim()
                .parse::<Address>()
                .map_err(|e| WalletError::Config(format!("invalid X402_ASSET '{raw}': {e}")))?;
        }
        if let Some(raw) = get("X402_DEFAULT_TIMEOUT_SECS") {
            config.default_timeout_secs = parse_number("X402_DEFAULT_TIMEOUT_SECS", &raw)?;
            if config.default_timeout_secs == 0 {
                return Err(WalletError::Config(
                    "X402_DEFAULT_TIMEOUT_SECS must be greater than zero".to_string(),
                ));
            }
        }
        if let Some(raw) = get("X402_VERSION") {
            config.x402_version = parse_number("X402_VERSION", &raw)?;
        }
        Ok(config)
    }

    /// CAIP-2 identifier of the allowlisted chain.
    pub fn network(&self) -> String {
        format!("eip155:{}", self.chain_id)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, WalletError> {
    raw.trim()
        .parse()
        .map_err(|_| WalletError::Config(format!("{key} must be a non-negative integer, got '{raw}'")))
}
