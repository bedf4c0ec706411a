use std::{collections::HashSet, fmt::Debug, rc::Rc};

use super::storage::KeyValueStorage;

/// Looks at the globally injected provider (`window.ethereum`), if any.
pub trait InjectedProbe {
    /// True when the injected provider sets `name` (e.g. `isCoinbaseWallet`) to a truthy value.
    fn flag(&self, name: &str) -> bool;
}

/// Fixed set of flags, for hosts that already know what is injected.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe(HashSet<String>);

impl StaticProbe {
    pub fn new<I: IntoIterator<Item = S>, S: Into<String>>(flags: I) -> Self {
        Self(flags.into_iter().map(Into::into).collect())
    }
}

impl InjectedProbe for StaticProbe {
    fn flag(&self, name: &str) -> bool {
        self.0.contains(name)
    }
}

/// Capabilities of the host the connector runs in. Every part is optional so the
/// connectors work (and test) outside a browser.
#[derive(Clone, Default)]
pub struct Environment {
    browser: bool,
    storage: Option<Rc<dyn KeyValueStorage>>,
    injected: Option<Rc<dyn InjectedProbe>>,
}

impl Environment {
    /// No window, no storage, nothing injected.
    pub fn detached() -> Self {
        Self::default()
    }

    /// A browser-like host without storage or injected provider; add them with the builders.
    pub fn headless_browser() -> Self {
        Self { browser: true, ..Self::default() }
    }

    /// The real `window`, `window.localStorage` and `window.ethereum`.
    #[cfg(target_arch = "wasm32")]
    pub fn browser() -> Self {
        let has_window = super::js::has_window();
        let mut env = Self { browser: has_window, ..Self::default() };
        if has_window {
            env.storage = Some(Rc::new(super::storage::LocalStorage));
            env.injected = Some(Rc::new(super::js::WindowEthereum));
        }
        env
    }

    pub fn with_storage(mut self, storage: Rc<dyn KeyValueStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_injected(mut self, injected: Rc<dyn InjectedProbe>) -> Self {
        self.injected = Some(injected);
        self
    }

    pub fn is_browser(&self) -> bool {
        self.browser
    }

    pub fn storage(&self) -> Option<&Rc<dyn KeyValueStorage>> {
        self.storage.as_ref()
    }

    pub fn injected_flag(&self, name: &str) -> bool {
        self.injected.as_ref().is_some_and(|probe| probe.flag(name))
    }
}

impl Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("browser", &self.browser)
            .field("storage", &self.storage.is_some())
            .field("injected", &self.injected.is_some())
            .finish()
    }
}
