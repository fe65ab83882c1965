use std::env;

use url::Url;

use crate::constants::{DEFAULT_CONTAINER, DEFAULT_FRAME_NAME};
use crate::WalletError;

/// Where and how the wallet frame is embedded.
///
/// These are the handshake arguments: the element to mount into, the wallet
/// origin, the frame name the remote side must echo back, and the CSS
/// classes applied to the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedOptions {
    pub container: String,
    pub url: String,
    pub name: String,
    pub class_list: Vec<String>,
}

impl EmbedOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            container: DEFAULT_CONTAINER.to_string(),
            url: url.into(),
            name: DEFAULT_FRAME_NAME.to_string(),
            class_list: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    pub fn with_class_list<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.class_list = classes.into_iter().map(Into::into).collect();
        self
    }

    /// Load from the environment (and `.env`, if present).
    ///
    /// - `WALLET_URL` (required)
    /// - `WALLET_FRAME_NAME`, `WALLET_CONTAINER` (optional)
    /// - `WALLET_CLASS_LIST` (optional, comma separated)
    pub fn from_env() -> Result<Self, WalletError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WalletError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let url = get("WALLET_URL")
            .ok_or_else(|| WalletError::Config("missing required variable: WALLET_URL".to_string()))?;
        Url::parse(&url).map_err(|_| WalletError::Config(format!("invalid WALLET_URL: {url}")))?;

        let mut options = EmbedOptions::new(url);
        if let Some(name) = get("WALLET_FRAME_NAME") {
            options.name = name;
        }
        if let Some(container) = get("WALLET_CONTAINER") {
            options.container = container;
        }
        if let Some(classes) = get("WALLET_CLASS_LIST") {
            options.class_list = classes
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        Ok(options)
    }
}
