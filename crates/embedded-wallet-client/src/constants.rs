use alloy::primitives::{address, Address};

/// Base mainnet chain ID.
pub const BASE_CHAIN_ID: u64 = 8453;

/// USDC on Base. The only asset this client pays with by default.
pub const BASE_USDC: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54BdA02913");

/// The one payment scheme the client accepts.
pub const EXACT_SCHEME: &str = "exact";

/// The one transfer method the client can sign for.
pub const EIP3009_METHOD: &str = "eip3009";

/// CAIP-2 namespace for EVM chains.
pub const EIP155_PREFIX: &str = "eip155:";

/// Signature validity window when the challenge gives none.
pub const DEFAULT_MAX_TIMEOUT_SECS: u64 = 60;

/// x402 protocol version assumed when the challenge omits it.
pub const DEFAULT_X402_VERSION: u32 = 2;

/// Request timeout for the reqwest transport.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

// Header names, lowercase as they appear on the wire.
pub const PAYMENT_REQUIRED_HEADER: &str = "payment-required";
pub const PAYMENT_SIGNATURE_HEADER: &str = "payment-signature";
pub const PAYMENT_RESPONSE_HEADER: &str = "payment-response";
