//! In-memory wallet, SDK and chain reader used by the unit tests.

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    rc::Rc,
};

use async_trait::async_trait;
use futures::channel::oneshot;
use serde_json::{json, Value};

use crate::{
    chain::RawChainId,
    connectors::walletlink::{WalletLinkOptions, WalletSdk},
    provider::{ProviderError, ProviderEvent, ProviderListener, ProviderMessage, WalletProvider},
    web3::{ChainReader, FeeData},
    Error,
};

pub const ALICE: &str = "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359";
pub const ALICE_CHECKSUM: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";
pub const BOB: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
pub const BOB_CHECKSUM: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

pub struct MockProvider {
    enable_result: RefCell<Result<Vec<String>, ProviderError>>,
    emit_during_enable: RefCell<Vec<ProviderMessage>>,
    responses: RefCell<HashMap<String, Result<Value, ProviderError>>>,
    requests: RefCell<Vec<(String, Option<Value>)>>,
    chain_id: RefCell<RawChainId>,
    listeners: RefCell<Vec<(ProviderEvent, ProviderListener)>>,
    pub disconnects: Cell<usize>,
    pub closes: Cell<usize>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            enable_result: RefCell::new(Ok(Vec::new())),
            emit_during_enable: RefCell::new(Vec::new()),
            responses: RefCell::new(HashMap::new()),
            requests: RefCell::new(Vec::new()),
            chain_id: RefCell::new(RawChainId::from("0x1")),
            listeners: RefCell::new(Vec::new()),
            disconnects: Cell::new(0),
            closes: Cell::new(0),
        }
    }

    pub fn set_accounts(&self, accounts: &[&str]) {
        let accounts = accounts.iter().map(|a| a.to_string()).collect::<Vec<_>>();
        self.respond("eth_accounts", json!(accounts));
        *self.enable_result.borrow_mut() = Ok(accounts);
    }

    pub fn fail_enable(&self, err: ProviderError) {
        *self.enable_result.borrow_mut() = Err(err);
    }

    pub fn emit_during_enable(&self, message: ProviderMessage) {
        self.emit_during_enable.borrow_mut().push(message);
    }

    pub fn set_chain_id(&self, chain_id: RawChainId) {
        *self.chain_id.borrow_mut() = chain_id;
    }

    pub fn respond(&self, method: &str, value: Value) {
        self.responses.borrow_mut().insert(method.to_string(), Ok(value));
    }

    pub fn fail(&self, method: &str, err: ProviderError) {
        self.responses.borrow_mut().insert(method.to_string(), Err(err));
    }

    pub fn last_request(&self) -> Option<(String, Option<Value>)> {
        self.requests.borrow().last().cloned()
    }

    pub fn listener_count(&self, event: ProviderEvent) -> usize {
        self.listeners.borrow().iter().filter(|(e, _)| *e == event).count()
    }

    pub fn emit(&self, message: ProviderMessage) {
        let event = message.event();
        let listeners = self
            .listeners
            .borrow()
            .iter()
            .filter(|(e, _)| *e == event)
            .map(|(_, l)| l.clone())
            .collect::<Vec<_>>();
        for listener in listeners {
            listener(message.clone());
        }
    }
}

#[async_trait(?Send)]
impl WalletProvider for MockProvider {
    async fn enable(&self) -> Result<Vec<String>, ProviderError> {
        let pending = self.emit_during_enable.borrow_mut().drain(..).collect::<Vec<_>>();
        for message in pending {
            self.emit(message);
        }
        self.enable_result.borrow().clone()
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ProviderError> {
        self.requests.borrow_mut().push((method.to_string(), params));
        self.responses
            .borrow()
            .get(method)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::new(&format!("{method} not mocked"))))
    }

    fn chain_id(&self) -> RawChainId {
        self.chain_id.borrow().clone()
    }

    fn on(&self, event: ProviderEvent, listener: ProviderListener) {
        self.listeners.borrow_mut().push((event, listener));
    }

    fn remove_listener(&self, event: ProviderEvent, listener: &ProviderListener) {
        self.listeners.borrow_mut().retain(|(e, l)| !(*e == event && Rc::ptr_eq(l, listener)));
    }

    fn disconnect(&self) {
        self.disconnects.set(self.disconnects.get() + 1);
    }

    fn close(&self) {
        self.closes.set(self.closes.get() + 1);
    }
}

#[derive(Default)]
pub struct MockSdk {
    pub created: Cell<usize>,
    pub last_options: RefCell<Option<WalletLinkOptions>>,
}

impl WalletSdk for MockSdk {
    type Provider = MockProvider;

    fn make_provider(&self, options: &WalletLinkOptions) -> Self::Provider {
        self.created.set(self.created.get() + 1);
        *self.last_options.borrow_mut() = Some(options.clone());
        MockProvider::new()
    }
}

/// Chain reader whose answers are handed out one call at a time, either immediately
/// (queued) or whenever the test decides (deferred).
#[derive(Default)]
pub struct MockReader {
    queued: RefCell<VecDeque<Result<FeeData, ProviderError>>>,
    deferred: RefCell<VecDeque<oneshot::Receiver<Result<FeeData, ProviderError>>>>,
    block_number: Cell<u64>,
    pub fee_calls: Cell<usize>,
    pub block_calls: Cell<usize>,
}

impl MockReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, result: Result<FeeData, ProviderError>) {
        self.queued.borrow_mut().push_back(result);
    }

    pub fn defer(&self) -> oneshot::Sender<Result<FeeData, ProviderError>> {
        let (tx, rx) = oneshot::channel();
        self.deferred.borrow_mut().push_back(rx);
        tx
    }

    pub fn set_block_number(&self, number: u64) {
        self.block_number.set(number);
    }
}

#[async_trait(?Send)]
impl ChainReader for MockReader {
    async fn get_fee_data(&self) -> Result<FeeData, Error> {
        self.fee_calls.set(self.fee_calls.get() + 1);
        let deferred = self.deferred.borrow_mut().pop_front();
        let result = match deferred {
            Some(rx) => rx.await.unwrap_or_else(|_| Err(ProviderError::new("dropped"))),
            None => {
                let queued = self.queued.borrow_mut().pop_front();
                queued.unwrap_or_else(|| Ok(FeeData::default()))
            }
        };
        Ok(result?)
    }

    async fn get_block_number(&self) -> Result<u64, Error> {
        self.block_calls.set(self.block_calls.get() + 1);
        Ok(self.block_number.get())
    }
}
