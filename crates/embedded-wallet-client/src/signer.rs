use std::future::Future;

use alloy::primitives::{Address, U256};
use embedded_wallet::{EmbeddedWallet, Erc3009Request, SignedAuthorization, WalletError};

/// A transfer the payment flow needs authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Label shown to the user, normally the URL being paid for.
    pub recipient: String,
    pub pay_to: Address,
    pub amount: U256,
    /// Unix seconds.
    pub valid_after: u64,
    /// Unix seconds.
    pub valid_before: u64,
}

/// Produces transfer authorizations for the payment flow.
pub trait AuthorizationSigner: Send + Sync {
    fn sign_transfer(
        &self,
        request: &TransferRequest,
    ) -> impl Future<Output = Result<SignedAuthorization, WalletError>> + Send;
}

/// The embedded wallet signs by prompting its user over the bridge.
impl AuthorizationSigner for EmbeddedWallet {
    async fn sign_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<SignedAuthorization, WalletError> {
        self.get_erc3009_signature(&Erc3009Request {
            recipient: request.recipient.clone(),
            destination_address: request.pay_to,
            amount: request.amount,
            valid_until: request.valid_before,
            valid_after: request.valid_after,
        })
        .await
    }
}
