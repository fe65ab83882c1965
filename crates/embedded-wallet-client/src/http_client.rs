use embedded_wallet::WalletError;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::StatusCode;
use url::Url;

use crate::challenge::{PaymentChallenge, ResourceInfo};
use crate::config::PaymentConfig;
use crate::constants::{PAYMENT_REQUIRED_HEADER, PAYMENT_SIGNATURE_HEADER};
use crate::payment::{encode_payment, PaymentPayload};
use crate::signer::{AuthorizationSigner, TransferRequest};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::validate::{select_exact, validate};

/// HTTP client that pays x402 challenges.
///
/// On a 402 response it parses the `PAYMENT-REQUIRED` challenge, checks it
/// against the [`PaymentConfig`] allowlist, has the [`AuthorizationSigner`]
/// authorize the transfer, and retries once with a `PAYMENT-SIGNATURE`
/// header.
pub struct PaymentClient<T: HttpTransport, S: AuthorizationSigner> {
    transport: T,
    signer: S,
    config: PaymentConfig,
}

impl<S: AuthorizationSigner> PaymentClient<ReqwestTransport, S> {
    /// Client over `reqwest` with the default allowlist.
    pub fn new(signer: S) -> Result<Self, WalletError> {
        Ok(Self::with_transport(ReqwestTransport::new()?, signer))
    }
}

impl<T: HttpTransport, S: AuthorizationSigner> PaymentClient<T, S> {
    pub fn with_transport(transport: T, signer: S) -> Self {
        Self {
            transport,
            signer,
            config: PaymentConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PaymentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    /// Send `request`, paying for it if the server asks.
    ///
    /// A non-402 response is returned as is. A 402 is answered with at most
    /// one paid retry, whose response is returned whatever its status.
    pub async fn fetch_with_payment(&self, request: HttpRequest) -> Result<HttpResponse, WalletError> {
        // First request
        let resp = self.transport.send(&request).await?;
        if resp.status != StatusCode::PAYMENT_REQUIRED {
            return Ok(resp);
        }

        let payload = match self.build_payment(&request, &resp).await {
            Ok(payload) => payload,
            Err(e) => {
                if e.is_payment_refusal() {
                    tracing::warn!(url = %request.url, error = %e, "refusing payment challenge");
                }
                return Err(e);
            }
        };

        // Encode and retry
        let encoded = encode_payment(&payload)?;
        let value = HeaderValue::from_str(&encoded)
            .map_err(|e| WalletError::Validation(format!("payment header is not a valid header value: {e}")))?;
        let mut paid = request;
        paid.headers
            .insert(HeaderName::from_static(PAYMENT_SIGNATURE_HEADER), value);

        let resp = self.transport.send(&paid).await?;
        tracing::info!(
            url = %paid.url,
            status = resp.status.as_u16(),
            settled = resp.settlement().map(|s| s.success),
            "paid request completed"
        );
        Ok(resp)
    }

    async fn build_payment(
        &self,
        request: &HttpRequest,
        resp: &HttpResponse,
    ) -> Result<PaymentPayload, WalletError> {
        let header = resp.header(PAYMENT_REQUIRED_HEADER).ok_or_else(|| {
            WalletError::ChallengeParse("402 response has no PAYMENT-REQUIRED header".to_string())
        })?;
        let challenge = PaymentChallenge::parse(header)?;
        let entry = select_exact(&challenge)?;
        let validated = validate(entry, &self.config)?;

        let resolved = Url::parse(&request.url)
            .map_err(|e| WalletError::Validation(format!("invalid request url '{}': {e}", request.url)))?
            .to_string();

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| WalletError::Config(format!("system time error: {e}")))?
            .as_secs();
        let transfer = TransferRequest {
            recipient: resolved.clone(),
            pay_to: validated.pay_to,
            amount: validated.amount,
            valid_after: now,
            valid_before: now.saturating_add(validated.max_timeout_seconds),
        };

        tracing::info!(
            url = %resolved,
            network = %validated.accepted.network,
            amount = %validated.amount,
            pay_to = %validated.pay_to,
            valid_before = transfer.valid_before,
            "requesting payment authorization"
        );
        let signed = self.signer.sign_transfer(&transfer).await?;

        Ok(PaymentPayload {
            x402_version: challenge.x402_version.unwrap_or(self.config.x402_version),
            resource: challenge
                .resource
                .clone()
                .unwrap_or_else(|| ResourceInfo::from_url(resolved)),
            accepted: validated.accepted,
            payload: signed.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::decode_payment;
    use alloy::primitives::{address, Address, U256};
    use embedded_wallet::{ErrorValue, SignedAuthorization};
    use serde_json::json;
    use std::sync::Mutex;

    const PAY_TO: Address = address!("2222222222222222222222222222222222222222");

    /// Replies from a script and records every request.
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<Vec<HttpResponse>>,
        sent: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<HttpResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<HttpRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, WalletError> {
            self.sent.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| WalletError::Transport("script exhausted".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingSigner {
        calls: Mutex<Vec<TransferRequest>>,
        fail_with: Option<ErrorValue>,
    }

    impl AuthorizationSigner for RecordingSigner {
        async fn sign_transfer(
            &self,
            request: &TransferRequest,
        ) -> Result<SignedAuthorization, WalletError> {
            self.calls.lock().unwrap().push(request.clone());
            if let Some(err) = &self.fail_with {
                return Err(WalletError::Remote(err.clone()));
            }
            Ok(SignedAuthorization {
                signature: "0xsigned".to_string(),
                from: "0x3333333333333333333333333333333333333333".to_string(),
                to: request.pay_to.to_string(),
                value: request.amount.to_string(),
                valid_after: request.valid_after.to_string(),
                valid_before: request.valid_before.to_string(),
                nonce: format!("0x{}", "00".repeat(32)),
            })
        }
    }

    fn challenge(network: &str) -> serde_json::Value {
        json!({
            "accepted": [{
                "scheme": "exact",
                "network": network,
                "amount": "1000",
                "asset": "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913",
                "payTo": "0x2222222222222222222222222222222222222222"
            }]
        })
    }

    fn payment_required(header: Option<String>) -> HttpResponse {
        let mut resp = HttpResponse::new(StatusCode::PAYMENT_REQUIRED);
        if let Some(header) = header {
            resp.headers.insert(
                HeaderName::from_static(PAYMENT_REQUIRED_HEADER),
                HeaderValue::from_str(&header).unwrap(),
            );
        }
        resp
    }

    fn now() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[tokio::test]
    async fn test_pays_exact_challenge_and_replays() {
        let transport = ScriptedTransport::new(vec![
            payment_required(Some(challenge("eip155:8453").to_string())),
            HttpResponse::new(StatusCode::OK),
        ]);
        let client = PaymentClient::with_transport(transport, RecordingSigner::default());

        let request = HttpRequest::get("https://api.example.com/data").with_header(
            HeaderName::from_static("x-trace"),
            HeaderValue::from_static("abc"),
        );
        let before = now();
        let resp = client.fetch_with_payment(request).await.unwrap();
        let after = now();
        assert_eq!(resp.status, StatusCode::OK);

        let calls = client.signer().calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        let transfer = &calls[0];
        assert_eq!(transfer.recipient, "https://api.example.com/data");
        assert_eq!(transfer.pay_to, PAY_TO);
        assert_eq!(transfer.amount, U256::from(1000u64));
        assert!(transfer.valid_after >= before && transfer.valid_after <= after);
        assert_eq!(transfer.valid_before, transfer.valid_after + 60);

        let sent = client.transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].headers.get(PAYMENT_SIGNATURE_HEADER).is_none());
        let replay = &sent[1];
        assert_eq!(replay.headers.get("x-trace").unwrap(), "abc");

        let header = replay.headers.get("PAYMENT-SIGNATURE").unwrap().to_str().unwrap();
        let payload = decode_payment(header).unwrap();
        assert_eq!(payload.x402_version, 2);
        assert_eq!(payload.resource.url, "https://api.example.com/data");
        assert_eq!(payload.accepted.scheme, "exact");
        assert_eq!(payload.accepted.amount, "1000");
        assert_eq!(payload.payload.signature, "0xsigned");
        assert_eq!(payload.payload.authorization.valid_after, transfer.valid_after.to_string());
    }

    #[tokio::test]
    async fn test_non_402_passes_through() {
        let mut ok = HttpResponse::new(StatusCode::OK);
        ok.body = "hello".into();
        let client = PaymentClient::with_transport(
            ScriptedTransport::new(vec![ok]),
            RecordingSigner::default(),
        );
        let resp = client
            .fetch_with_payment(HttpRequest::get("https://api.example.com/free"))
            .await
            .unwrap();
        assert_eq!(resp.text(), "hello");
        assert_eq!(client.transport.sent().len(), 1);
        assert!(client.signer().calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_chain_is_refused_before_signing() {
        let client = PaymentClient::with_transport(
            ScriptedTransport::new(vec![payment_required(Some(
                challenge("eip155:1").to_string(),
            ))]),
            RecordingSigner::default(),
        );
        let err = client
            .fetch_with_payment(HttpRequest::get("https://api.example.com/data"))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::UnsupportedAsset(_)));
        assert!(client.signer().calls.lock().unwrap().is_empty());
        assert_eq!(client.transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_challenge_header() {
        let client = PaymentClient::with_transport(
            ScriptedTransport::new(vec![payment_required(None)]),
            RecordingSigner::default(),
        );
        let err = client
            .fetch_with_payment(HttpRequest::get("https://api.example.com/data"))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::ChallengeParse(_)));
        assert!(client.signer().calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_signer_failure_propagates_unchanged() {
        let rejection = ErrorValue::new("UserRejectedError", "declined");
        let client = PaymentClient::with_transport(
            ScriptedTransport::new(vec![payment_required(Some(
                challenge("eip155:8453").to_string(),
            ))]),
            RecordingSigner {
                fail_with: Some(rejection.clone()),
                ..Default::default()
            },
        );
        match client
            .fetch_with_payment(HttpRequest::get("https://api.example.com/data"))
            .await
        {
            Err(WalletError::Remote(err)) => assert_eq!(err, rejection),
            other => panic!("expected remote error, got {other:?}"),
        }
        assert_eq!(client.transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_paid_retry_is_final_even_if_402_again() {
        let header = challenge("eip155:8453").to_string();
        let client = PaymentClient::with_transport(
            ScriptedTransport::new(vec![
                payment_required(Some(header.clone())),
                payment_required(Some(header)),
            ]),
            RecordingSigner::default(),
        );
        let resp = client
            .fetch_with_payment(HttpRequest::get("https://api.example.com/data"))
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(client.transport.sent().len(), 2);
        assert_eq!(client.signer().calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_challenge_version_resource_and_timeout_are_used() {
        let header = json!({
            "x402Version": 1,
            "resource": {"url": "https://api.example.com/canonical", "description": "report"},
            "accepts": {
                "scheme": "exact",
                "network": "eip155:8453",
                "amount": "1",
                "asset": "0x833589fCD6eDb6E08f4c7C32D4f71b54BdA02913",
                "payTo": "0x2222222222222222222222222222222222222222",
                "maxTimeoutSeconds": 15,
                "extra": {"assetTransferMethod": "eip3009"}
            }
        });
        let client = PaymentClient::with_transport(
            ScriptedTransport::new(vec![
                payment_required(Some(header.to_string())),
                HttpResponse::new(StatusCode::OK),
            ]),
            RecordingSigner::default(),
        );
        client
            .fetch_with_payment(HttpRequest::get("https://api.example.com/data?x=1"))
            .await
            .unwrap();

        let transfer = client.signer().calls.lock().unwrap()[0].clone();
        assert_eq!(transfer.valid_before - transfer.valid_after, 15);

        let sent = client.transport.sent();
        let header = sent[1].headers.get(PAYMENT_SIGNATURE_HEADER).unwrap().to_str().unwrap();
        let payload = decode_payment(header).unwrap();
        assert_eq!(payload.x402_version, 1);
        assert_eq!(payload.resource.url, "https://api.example.com/canonical");
        assert_eq!(payload.resource.description.as_deref(), Some("report"));
        assert_eq!(payload.accepted.max_timeout_seconds, Some(15));
        assert_eq!(
            payload.accepted.extra.as_ref().and_then(|e| e.get("assetTransferMethod")),
            Some(&json!("eip3009"))
        );
    }

    #[tokio::test]
    async fn test_recipient_is_the_resolved_url() {
        let client = PaymentClient::with_transport(
            ScriptedTransport::new(vec![
                payment_required(Some(challenge("eip155:8453").to_string())),
                HttpResponse::new(StatusCode::OK),
            ]),
            RecordingSigner::default(),
        );
        client
            .fetch_with_payment(HttpRequest::get("HTTPS://API.Example.com:443/a/../data"))
            .await
            .unwrap();

        let transfer = client.signer().calls.lock().unwrap()[0].clone();
        assert_eq!(transfer.recipient, "https://api.example.com/data");

        let sent = client.transport.sent();
        let header = sent[1].headers.get(PAYMENT_SIGNATURE_HEADER).unwrap().to_str().unwrap();
        assert_eq!(decode_payment(header).unwrap().resource.url, "https://api.example.com/data");
    }
}
