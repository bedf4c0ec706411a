use std::{fmt::Display, rc::Rc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::chain::RawChainId;

/// EIP-1193 code for "the user rejected the request".
pub const USER_REJECTED_CODE: i64 = 4001;

/// Raw failure reported by the wallet SDK or its RPC transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("Provider error {}: {message}", .code.map_or_else(|| "-".to_string(), |c| c.to_string()))]
pub struct ProviderError {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
}

impl ProviderError {
    pub fn new(message: &str) -> Self {
        Self { code: None, message: message.to_string() }
    }

    pub fn with_code(code: i64, message: &str) -> Self {
        Self { code: Some(code), message: message.to_string() }
    }
}

/// Events an EIP-1193 provider emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderEvent {
    #[serde(rename = "accountsChanged")]
    AccountsChanged,
    #[serde(rename = "chainChanged")]
    ChainChanged,
    #[serde(rename = "disconnect")]
    Disconnect,
}

impl ProviderEvent {
    pub const ALL: [ProviderEvent; 3] = [Self::AccountsChanged, Self::ChainChanged, Self::Disconnect];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountsChanged => "accountsChanged",
            Self::ChainChanged => "chainChanged",
            Self::Disconnect => "disconnect",
        }
    }
}

impl Display for ProviderEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload delivered with a [`ProviderEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderMessage {
    AccountsChanged(Vec<String>),
    ChainChanged(RawChainId),
    Disconnect(Option<ProviderError>),
}

impl ProviderMessage {
    pub fn event(&self) -> ProviderEvent {
        match self {
            Self::AccountsChanged(_) => ProviderEvent::AccountsChanged,
            Self::ChainChanged(_) => ProviderEvent::ChainChanged,
            Self::Disconnect(_) => ProviderEvent::Disconnect,
        }
    }
}

/// Listener handle. Identity (the `Rc` allocation) is what `remove_listener` matches on.
pub type ProviderListener = Rc<dyn Fn(ProviderMessage)>;

/// The wallet side of the connection. Implemented by SDK bindings, never by the connector.
#[async_trait(?Send)]
pub trait WalletProvider {
    /// Runs the wallet handshake and resolves to the authorized accounts.
    async fn enable(&self) -> Result<Vec<String>, ProviderError>;

    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ProviderError>;

    fn chain_id(&self) -> RawChainId;

    fn on(&self, event: ProviderEvent, listener: ProviderListener);

    fn remove_listener(&self, event: ProviderEvent, listener: &ProviderListener);

    fn disconnect(&self);

    fn close(&self);
}
