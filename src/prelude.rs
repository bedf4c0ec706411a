pub use crate::{
    chain::{Chain, ChainState, RawChainId},
    connectors::{ConnectResult, Connector, ConnectorConfig, WalletLinkConnector, WalletLinkOptions},
    environment::Environment,
    event::{ConnectorData, Event, EventKind},
    hooks::{
        connector_reader, BlockNumberQuery, CacheBuster, FeeDataConfig, FeeDataQuery, QueryConfig,
        Triggers,
    },
    provider::{ProviderError, WalletProvider},
    utils::{ChecksumAddress, FormatUnits},
    web3::{ChainReader, FeeData, JsonRpcSigner, Web3Provider},
    Error,
};

#[cfg(target_arch = "wasm32")]
pub use crate::js::{JsWalletLinkSdk, WasmSpawner};
