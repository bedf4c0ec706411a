pub mod chain;
pub mod connectors;
pub mod environment;
pub mod event;
pub mod hooks;
#[cfg(target_arch = "wasm32")]
pub mod js;
pub mod prelude;
pub mod provider;
pub mod storage;
pub mod utils;
pub mod web3;

#[cfg(test)]
pub(crate) mod mock;

use std::rc::Rc;

use ethers::utils::ConversionError;

use self::{chain::ChainIdError, provider::ProviderError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("User rejected request")]
    UserRejectedRequest,

    #[error("No account available")]
    AccountUnavailable,

    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Bad config: {0}")]
    Config(String),

    #[error("Bad units: {0}")]
    Units(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    ChainId(#[from] ChainIdError),

    #[error(transparent)]
    Serialization(#[from] serde_json::error::Error),
}

impl From<ConversionError> for Error {
    fn from(err: ConversionError) -> Self {
        Self::Units(err.to_string())
    }
}

impl Error {
    /// True when the user explicitly cancelled, so the UI can stay quiet about it.
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::UserRejectedRequest)
    }
}

/// Error captured into reactive state. Cheap to clone so every reader can hold one.
pub type FetchError = Rc<Error>;
