use std::{cell::RefCell, rc::Rc};

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use super::{ConnectResult, Connector, ConnectorConfig, ReadyCheck};
use crate::{
    chain::{is_chain_unsupported, to_hex_chain_id, Chain, ChainState},
    environment::Environment,
    event::{ConnectorData, Event, EventEmitter},
    provider::{
        ProviderError, ProviderEvent, ProviderListener, ProviderMessage, WalletProvider,
        USER_REJECTED_CODE,
    },
    storage::purge_namespace,
    utils::{get_address, ChecksumAddress},
    web3::{JsonRpcSigner, Web3Provider},
    Error,
};

pub const WALLETLINK_ID: &str = "walletLink";
pub const WALLETLINK_NAME: &str = "Coinbase Wallet";

/// Every key the SDK persists contains this.
pub const STORAGE_NAMESPACE: &str = "-walletlink";

/// Message the SDK rejects `enable` with when the user dismisses the QR modal.
pub const USER_CLOSED_MODAL: &str = "User closed modal";

/// Flag the Coinbase Wallet extension sets on `window.ethereum`.
pub const INJECTED_FLAG: &str = "isCoinbaseWallet";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletLinkOptions {
    pub app_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_logo_url: Option<String>,
    #[serde(default)]
    pub dark_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_rpc_url: Option<String>,
    #[serde(default)]
    pub override_is_meta_mask: bool,
}

impl WalletLinkOptions {
    pub fn new(app_name: &str) -> Self {
        Self { app_name: app_name.to_string(), ..Self::default() }
    }

    pub fn with_json_rpc_url(mut self, url: &str) -> Self {
        self.json_rpc_url = Some(url.to_string());
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.app_name.trim().is_empty() {
            return Err(Error::Config("appName must not be empty".to_string()));
        }
        for url in [&self.json_rpc_url, &self.app_logo_url].into_iter().flatten() {
            Url::parse(url).map_err(|err| Error::Config(format!("{url}: {err}")))?;
        }
        Ok(())
    }
}

/// Factory for the SDK client. Called at most once per live session.
pub trait WalletSdk {
    type Provider: WalletProvider + 'static;

    fn make_provider(&self, options: &WalletLinkOptions) -> Self::Provider;
}

/// Available in a browser unless the Coinbase extension already claims `window.ethereum`.
pub fn default_ready(environment: &Environment) -> bool {
    environment.is_browser() && !environment.injected_flag(INJECTED_FLAG)
}

pub struct WalletLinkConnector<S: WalletSdk> {
    chains: Rc<[Chain]>,
    options: WalletLinkOptions,
    sdk: S,
    environment: Environment,
    ready: bool,
    provider: RefCell<Option<Rc<S::Provider>>>,
    emitter: Rc<EventEmitter>,
    on_accounts_changed: ProviderListener,
    on_chain_changed: ProviderListener,
    on_disconnect: ProviderListener,
}

impl<S: WalletSdk> WalletLinkConnector<S> {
    pub fn new(
        config: ConnectorConfig<WalletLinkOptions>,
        sdk: S,
        environment: Environment,
    ) -> Result<Self, Error> {
        config.options.validate()?;

        let chains: Rc<[Chain]> = config.chains.into();
        let emitter = Rc::new(EventEmitter::new());

        Ok(Self {
            ready: default_ready(&environment),
            on_accounts_changed: accounts_changed_listener(emitter.clone()),
            on_chain_changed: chain_changed_listener(emitter.clone(), chains.clone()),
            on_disconnect: disconnect_listener(emitter.clone()),
            chains,
            options: config.options,
            sdk,
            environment,
            provider: RefCell::new(None),
            emitter,
        })
    }

    /// Replaces the default availability rule.
    pub fn with_ready_check(mut self, check: ReadyCheck) -> Self {
        self.ready = check(&self.environment);
        self
    }

    pub fn sdk(&self) -> &S {
        &self.sdk
    }

    fn listeners(&self) -> [(ProviderEvent, &ProviderListener); 3] {
        [
            (ProviderEvent::AccountsChanged, &self.on_accounts_changed),
            (ProviderEvent::ChainChanged, &self.on_chain_changed),
            (ProviderEvent::Disconnect, &self.on_disconnect),
        ]
    }

    fn subscribe(&self, provider: &S::Provider) {
        for (event, listener) in self.listeners() {
            // Reconnecting must not stack a second copy of the same handler.
            provider.remove_listener(event, listener);
            provider.on(event, listener.clone());
        }
    }

    fn handshake_error(err: ProviderError) -> Error {
        if err.message == USER_CLOSED_MODAL {
            Error::UserRejectedRequest
        } else {
            Error::Provider(err)
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl WalletLinkConnector<crate::js::JsWalletLinkSdk> {
    /// Connector backed by the `walletlink` JS package in the real browser environment.
    pub fn browser(config: ConnectorConfig<WalletLinkOptions>) -> Result<Self, Error> {
        Self::new(config, crate::js::JsWalletLinkSdk, Environment::browser())
    }
}

#[async_trait(?Send)]
impl<S: WalletSdk> Connector for WalletLinkConnector<S> {
    type Provider = S::Provider;
    type Options = WalletLinkOptions;

    fn id(&self) -> &'static str {
        WALLETLINK_ID
    }

    fn name(&self) -> &'static str {
        WALLETLINK_NAME
    }

    fn ready(&self) -> bool {
        self.ready
    }

    fn chains(&self) -> &[Chain] {
        &self.chains
    }

    fn options(&self) -> &Self::Options {
        &self.options
    }

    fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    async fn connect(&self) -> Result<ConnectResult<Self::Provider>, Error> {
        let provider = self.get_provider();
        // Listen before the handshake so events fired while it runs are not lost.
        self.subscribe(&provider);

        let accounts = provider.enable().await.map_err(Self::handshake_error)?;
        let account = get_address(accounts.first().ok_or(Error::AccountUnavailable)?)?;
        let id = self.get_chain_id().await?;
        let chain = ChainState { id, unsupported: self.is_chain_unsupported(id) };

        debug!("Connected {account} on chain {id}");
        let data = ConnectorData { account: Some(account), chain: Some(chain) };
        self.emitter.emit(Event::Connect(data));

        Ok(ConnectResult { account, chain, provider: Web3Provider::new(provider) })
    }

    async fn disconnect(&self) -> Result<(), Error> {
        let provider = self.provider.borrow_mut().take();
        let Some(provider) = provider else {
            return Ok(());
        };

        for (event, listener) in self.listeners() {
            provider.remove_listener(event, listener);
        }
        provider.disconnect();
        provider.close();

        if let Some(storage) = self.environment.storage() {
            let purged = purge_namespace(storage.as_ref(), STORAGE_NAMESPACE);
            debug!("Disconnected, purged {purged} stored session keys");
        }
        Ok(())
    }

    async fn get_account(&self) -> Result<ChecksumAddress, Error> {
        let provider = Web3Provider::new(self.get_provider());
        let accounts: Vec<String> = provider.request("eth_accounts", None).await?;
        get_address(accounts.first().ok_or(Error::AccountUnavailable)?)
    }

    async fn get_chain_id(&self) -> Result<u64, Error> {
        Ok(self.get_provider().chain_id().normalize()?)
    }

    fn get_provider(&self) -> Rc<Self::Provider> {
        self.provider
            .borrow_mut()
            .get_or_insert_with(|| {
                debug!("Creating {WALLETLINK_NAME} provider for {}", self.options.app_name);
                Rc::new(self.sdk.make_provider(&self.options))
            })
            .clone()
    }

    async fn get_signer(&self) -> Result<JsonRpcSigner<Self::Provider>, Error> {
        let account = self.get_account().await?;
        Ok(Web3Provider::new(self.get_provider()).get_signer(account))
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<Chain, Error> {
        let provider = self.get_provider();
        let params = json!([{ "chainId": to_hex_chain_id(chain_id) }]);
        match provider.request("wallet_switchEthereumChain", Some(params)).await {
            Ok(_) => Ok(self
                .chains
                .iter()
                .find(|chain| chain.id == chain_id)
                .cloned()
                .unwrap_or_else(|| Chain::unknown(chain_id))),
            Err(err) if err.code == Some(USER_REJECTED_CODE) => Err(Error::UserRejectedRequest),
            Err(err) => Err(Self::handshake_error(err)),
        }
    }
}

fn accounts_changed_listener(emitter: Rc<EventEmitter>) -> ProviderListener {
    Rc::new(move |message: ProviderMessage| {
        let ProviderMessage::AccountsChanged(accounts) = message else {
            return;
        };
        match accounts.first() {
            None => emitter.emit(Event::Disconnect),
            Some(account) => match get_address(account) {
                Ok(account) => emitter
                    .emit(Event::Change(ConnectorData { account: Some(account), chain: None })),
                Err(err) => warn!("Ignoring accountsChanged: {err}"),
            },
        }
    })
}

fn chain_changed_listener(emitter: Rc<EventEmitter>, chains: Rc<[Chain]>) -> ProviderListener {
    Rc::new(move |message: ProviderMessage| {
        let ProviderMessage::ChainChanged(raw) = message else {
            return;
        };
        match raw.normalize() {
            Ok(id) => {
                let chain = ChainState { id, unsupported: is_chain_unsupported(&chains, id) };
                emitter.emit(Event::Change(ConnectorData { account: None, chain: Some(chain) }));
            }
            Err(err) => warn!("Ignoring chainChanged: {err}"),
        }
    })
}

fn disconnect_listener(emitter: Rc<EventEmitter>) -> ProviderListener {
    Rc::new(move |message: ProviderMessage| {
        if let ProviderMessage::Disconnect(reason) = message {
            debug!("Provider disconnected: {reason:?}");
            emitter.emit(Event::Disconnect);
        }
    })
}
