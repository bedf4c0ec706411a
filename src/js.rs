//! Browser side: the `walletlink` JS package, `window.ethereum` and the local task queue.

use std::{cell::RefCell, rc::Rc};

use async_trait::async_trait;
use futures::{
    future::LocalFutureObj,
    task::{LocalSpawn, SpawnError},
};
use gloo_utils::errors::JsError;
use js_sys::{Function, Promise, Reflect};
use log::{error, warn};
use serde::Serialize;
use serde_wasm_bindgen::Serializer;
use wasm_bindgen::{prelude::*, JsCast};
use wasm_bindgen_futures::JsFuture;

use crate::{
    chain::RawChainId,
    connectors::walletlink::{WalletLinkOptions, WalletSdk},
    environment::InjectedProbe,
    provider::{ProviderError, ProviderEvent, ProviderListener, ProviderMessage, WalletProvider},
};

#[wasm_bindgen(module = "walletlink")]
extern "C" {
    #[wasm_bindgen(js_name = WalletLink)]
    type JsWalletLink;

    #[wasm_bindgen(constructor, js_class = "WalletLink")]
    fn new(options: &JsValue) -> JsWalletLink;

    #[wasm_bindgen(method, js_class = "WalletLink", js_name = makeWeb3Provider)]
    fn make_web3_provider(this: &JsWalletLink, json_rpc_url: Option<String>) -> RawProvider;
}

#[wasm_bindgen]
extern "C" {
    type RawProvider;

    #[wasm_bindgen(method, catch)]
    fn enable(this: &RawProvider) -> Result<Promise, JsValue>;

    #[wasm_bindgen(method, catch)]
    fn request(this: &RawProvider, args: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(method, getter, js_name = chainId)]
    fn chain_id(this: &RawProvider) -> JsValue;

    #[wasm_bindgen(method)]
    fn on(this: &RawProvider, event: &str, listener: &Function);

    #[wasm_bindgen(method, js_name = removeListener)]
    fn remove_listener(this: &RawProvider, event: &str, listener: &Function);

    #[wasm_bindgen(method)]
    fn disconnect(this: &RawProvider);

    #[wasm_bindgen(method)]
    fn close(this: &RawProvider);
}

/// Creates providers through `new WalletLink(options).makeWeb3Provider(jsonRpcUrl)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsWalletLinkSdk;

impl WalletSdk for JsWalletLinkSdk {
    type Provider = JsWalletLinkProvider;

    fn make_provider(&self, options: &WalletLinkOptions) -> Self::Provider {
        let js_options = match options.serialize(&Serializer::json_compatible()) {
            Ok(js_options) => js_options,
            Err(err) => {
                error!("Failed to pass WalletLink options: {err}");
                JsValue::UNDEFINED
            }
        };
        let client = JsWalletLink::new(&js_options);
        let raw = client.make_web3_provider(options.json_rpc_url.clone());
        JsWalletLinkProvider { _client: client, raw, handlers: RefCell::new(Vec::new()) }
    }
}

type Handler = Closure<dyn FnMut(JsValue)>;

pub struct JsWalletLinkProvider {
    _client: JsWalletLink,
    raw: RawProvider,
    handlers: RefCell<Vec<(ProviderEvent, ProviderListener, Handler)>>,
}

#[async_trait(?Send)]
impl WalletProvider for JsWalletLinkProvider {
    async fn enable(&self) -> Result<Vec<String>, ProviderError> {
        let accounts = JsFuture::from(self.raw.enable().map_err(provider_error)?)
            .await
            .map_err(provider_error)?;
        serde_wasm_bindgen::from_value(accounts).map_err(|err| ProviderError::new(&err.to_string()))
    }

    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ProviderError> {
        #[derive(Serialize)]
        struct RequestArguments<'a> {
            method: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            params: Option<serde_json::Value>,
        }

        let args = RequestArguments { method, params }
            .serialize(&Serializer::json_compatible())
            .map_err(|err| ProviderError::new(&err.to_string()))?;
        let result = JsFuture::from(self.raw.request(&args).map_err(provider_error)?)
            .await
            .map_err(provider_error)?;
        if result.is_undefined() {
            return Ok(serde_json::Value::Null);
        }
        serde_wasm_bindgen::from_value(result).map_err(|err| ProviderError::new(&err.to_string()))
    }

    fn chain_id(&self) -> RawChainId {
        raw_chain_id(&self.raw.chain_id()).unwrap_or_else(|| RawChainId::Text(String::new()))
    }

    fn on(&self, event: ProviderEvent, listener: ProviderListener) {
        let target = listener.clone();
        let handler = Handler::new(move |payload: JsValue| match decode(event, payload) {
            Some(message) => target(message),
            None => warn!("Undecodable {event} payload"),
        });
        self.raw.on(event.as_str(), handler.as_ref().unchecked_ref());
        self.handlers.borrow_mut().push((event, listener, handler));
    }

    fn remove_listener(&self, event: ProviderEvent, listener: &ProviderListener) {
        let mut handlers = self.handlers.borrow_mut();
        if let Some(n) = handlers.iter().position(|(e, l, _)| *e == event && Rc::ptr_eq(l, listener)) {
            let (_, _, handler) = handlers.remove(n);
            self.raw.remove_listener(event.as_str(), handler.as_ref().unchecked_ref());
        }
    }

    fn disconnect(&self) {
        self.raw.disconnect();
    }

    fn close(&self) {
        self.raw.close();
    }
}

fn decode(event: ProviderEvent, payload: JsValue) -> Option<ProviderMessage> {
    match event {
        ProviderEvent::AccountsChanged => {
            serde_wasm_bindgen::from_value(payload).ok().map(ProviderMessage::AccountsChanged)
        }
        ProviderEvent::ChainChanged => raw_chain_id(&payload).map(ProviderMessage::ChainChanged),
        ProviderEvent::Disconnect => {
            let reason = (!payload.is_undefined() && !payload.is_null()).then(|| provider_error(payload));
            Some(ProviderMessage::Disconnect(reason))
        }
    }
}

fn raw_chain_id(value: &JsValue) -> Option<RawChainId> {
    if let Some(text) = value.as_string() {
        return Some(RawChainId::Text(text));
    }
    value
        .as_f64()
        .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= u64::MAX as f64)
        .map(|n| RawChainId::Number(n as u64))
}

/// Rejections are either `Error` instances or plain `{ code, message }` objects.
fn provider_error(value: JsValue) -> ProviderError {
    let field = |name: &str| Reflect::get(&value, &JsValue::from_str(name)).ok();
    let code = field("code").and_then(|code| code.as_f64()).map(|code| code as i64);
    let message = field("message")
        .and_then(|message| message.as_string())
        .or_else(|| value.as_string())
        .or_else(|| JsError::try_from(value.clone()).ok().map(|err| err.to_string()))
        .unwrap_or_else(|| format!("{value:?}"));
    ProviderError { code, message }
}

/// Reads flags off `window.ethereum`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowEthereum;

impl InjectedProbe for WindowEthereum {
    fn flag(&self, name: &str) -> bool {
        let Ok(ethereum) = Reflect::get(&js_sys::global(), &JsValue::from_str("ethereum")) else {
            return false;
        };
        if ethereum.is_undefined() || ethereum.is_null() {
            return false;
        }
        Reflect::get(&ethereum, &JsValue::from_str(name)).is_ok_and(|flag| flag.is_truthy())
    }
}

/// Runs hook fetches on the browser microtask queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct WasmSpawner;

impl LocalSpawn for WasmSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        wasm_bindgen_futures::spawn_local(future);
        Ok(())
    }
}

/// Whether a `window` object exists in this JS realm.
pub(crate) fn has_window() -> bool {
    Reflect::has(&js_sys::global(), &JsValue::from_str("window")).unwrap_or(false)
}
