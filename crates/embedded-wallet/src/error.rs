use crate::codec::ErrorValue;
use thiserror::Error;

/// Error reported by the remote wallet, rebuilt from its encoded `Error` value.
pub type RemoteError = ErrorValue;

/// Errors returned by wallet bridge and payment operations.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("wallet bridge is not initialized")]
    NotInitialized,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("payment challenge parse error: {0}")]
    ChallengeParse(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("unsupported asset: {0}")]
    UnsupportedAsset(String),

    #[error("unsupported transfer method: {0}")]
    UnsupportedMethod(String),

    #[error("remote error: {0}")]
    Remote(RemoteError),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl WalletError {
    /// True for the reasons the payment flow refuses a challenge before signing.
    pub fn is_payment_refusal(&self) -> bool {
        matches!(
            self,
            WalletError::ChallengeParse(_)
                | WalletError::UnsupportedScheme(_)
                | WalletError::UnsupportedNetwork(_)
                | WalletError::UnsupportedAsset(_)
                | WalletError::UnsupportedMethod(_)
        )
    }
}
