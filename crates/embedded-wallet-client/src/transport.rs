//! HTTP seam of the payment flow.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use embedded_wallet::WalletError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use url::Url;

use crate::constants::{HTTP_TIMEOUT_SECS, PAYMENT_RESPONSE_HEADER};
use crate::payment::{decode_settlement, SettleResponse};

/// A request the payment flow may send twice, so it owns its body.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Header value as text. Lookup is case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Settlement info from the PAYMENT-RESPONSE header, if the server sent
    /// one that parses.
    pub fn settlement(&self) -> Option<SettleResponse> {
        self.header(PAYMENT_RESPONSE_HEADER).and_then(decode_settlement)
    }
}

/// Sends one HTTP request and reads the whole response.
pub trait HttpTransport: Send + Sync {
    fn send(
        &self,
        request: &HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, WalletError>> + Send;
}

/// [`HttpTransport`] over `reqwest`.
///
/// Redirects are never followed: a redirect could carry the payment
/// signature header to a different host.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, WalletError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WalletError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Use a caller-configured client. Its redirect policy is the caller's
    /// responsibility.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, WalletError> {
        let url = Url::parse(&request.url)
            .map_err(|e| WalletError::Validation(format!("invalid request url '{}': {e}", request.url)))?;
        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| WalletError::Transport(format!("request to {} failed: {e}", request.url)))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp
            .bytes()
            .await
            .map_err(|e| WalletError::Transport(format!("failed to read response body: {e}")))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
