pub mod walletlink;

use std::rc::Rc;

use async_trait::async_trait;
use log::debug;

use super::{
    chain::{is_chain_unsupported, Chain, ChainState},
    environment::Environment,
    event::{EventEmitter, EventKind, Listener},
    provider::WalletProvider,
    utils::ChecksumAddress,
    web3::{JsonRpcSigner, Web3Provider},
    Error,
};

pub use walletlink::{WalletLinkConnector, WalletLinkOptions, WalletSdk};

/// Decides whether a connector can be offered in a given host.
pub type ReadyCheck = Rc<dyn Fn(&Environment) -> bool>;

/// What a connector is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorConfig<O> {
    pub chains: Vec<Chain>,
    pub options: O,
}

impl<O> ConnectorConfig<O> {
    /// Mainnet only.
    pub fn new(options: O) -> Self {
        Self { chains: vec![Chain::mainnet()], options }
    }

    pub fn with_chains(mut self, chains: Vec<Chain>) -> Self {
        self.chains = chains;
        self
    }
}

/// Outcome of a successful [`Connector::connect`].
pub struct ConnectResult<P: ?Sized> {
    pub account: ChecksumAddress,
    pub chain: ChainState,
    pub provider: Web3Provider<P>,
}

impl<P: ?Sized> Clone for ConnectResult<P> {
    fn clone(&self) -> Self {
        Self { account: self.account, chain: self.chain, provider: self.provider.clone() }
    }
}

impl<P: ?Sized> std::fmt::Debug for ConnectResult<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectResult")
            .field("account", &self.account)
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

/// One wallet, one lifecycle: connect, observe, disconnect.
#[async_trait(?Send)]
pub trait Connector {
    type Provider: WalletProvider + 'static;
    type Options;

    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    /// Whether the wallet can be used in the current host. Fixed at construction.
    fn ready(&self) -> bool;

    fn chains(&self) -> &[Chain];

    fn options(&self) -> &Self::Options;

    fn emitter(&self) -> &EventEmitter;

    async fn connect(&self) -> Result<ConnectResult<Self::Provider>, Error>;

    /// Tears the session down. Calling it without a live provider does nothing.
    async fn disconnect(&self) -> Result<(), Error>;

    async fn get_account(&self) -> Result<ChecksumAddress, Error>;

    async fn get_chain_id(&self) -> Result<u64, Error>;

    /// Returns the provider, building it on first use. Same instance until `disconnect`.
    fn get_provider(&self) -> Rc<Self::Provider>;

    async fn get_signer(&self) -> Result<JsonRpcSigner<Self::Provider>, Error>;

    async fn switch_chain(&self, chain_id: u64) -> Result<Chain, Error>;

    async fn is_authorized(&self) -> bool {
        match self.get_account().await {
            Ok(_) => true,
            Err(err) => {
                debug!("{} not authorized: {err}", self.id());
                false
            }
        }
    }

    fn is_chain_unsupported(&self, chain_id: u64) -> bool {
        is_chain_unsupported(self.chains(), chain_id)
    }

    fn on(&self, kind: EventKind, listener: Listener) {
        self.emitter().on(kind, listener);
    }

    fn off(&self, kind: EventKind, listener: &Listener) {
        self.emitter().off(kind, listener);
    }
}
