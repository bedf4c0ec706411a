use std::{fmt::Display, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_aux::prelude::deserialize_number_from_string;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainIdError {
    #[error("Empty chain id")]
    Empty,

    #[error("Chain id {0:?} is not a number")]
    Malformed(String, #[source] ParseIntError),
}

/// Chain id exactly as a wallet reports it: `1`, `"1"` or `"0x1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawChainId {
    Number(u64),
    Text(String),
}

impl RawChainId {
    pub fn normalize(&self) -> Result<u64, ChainIdError> {
        match self {
            Self::Number(id) => Ok(*id),
            Self::Text(text) => normalize_chain_id(text),
        }
    }
}

impl From<u64> for RawChainId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for RawChainId {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for RawChainId {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Parses a hex (`0x` prefixed) or decimal chain id into its integer value.
pub fn normalize_chain_id(value: &str) -> Result<u64, ChainIdError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ChainIdError::Empty);
    }

    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse::<u64>(),
    };
    parsed.map_err(|err| ChainIdError::Malformed(value.to_string(), err))
}

/// Hex form used by `wallet_switchEthereumChain`.
pub fn to_hex_chain_id(id: u64) -> String {
    format!("{id:#x}")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub rpc_urls: Vec<String>,
    #[serde(default)]
    pub testnet: bool,
}

impl Chain {
    pub fn new(id: u64, name: &str) -> Self {
        Self { id, name: name.to_string(), rpc_urls: Vec::new(), testnet: false }
    }

    /// A chain the wallet switched to that is not part of the configured list.
    pub fn unknown(id: u64) -> Self {
        Self::new(id, &format!("Chain {id}"))
    }

    pub fn mainnet() -> Self {
        Self {
            id: 1,
            name: "Mainnet".to_string(),
            rpc_urls: vec!["https://cloudflare-eth.com".to_string()],
            testnet: false,
        }
    }
}

impl Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

impl FromStr for Chain {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

/// Chain the wallet currently points at, paired with the allow-list verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainState {
    pub id: u64,
    pub unsupported: bool,
}

pub fn is_chain_unsupported(chains: &[Chain], id: u64) -> bool {
    !chains.iter().any(|chain| chain.id == id)
}
