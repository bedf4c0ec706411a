use std::rc::Rc;

use super::signal::Signal;
use crate::{
    connectors::Connector,
    event::{Event, EventKind, Listener},
};

const BUSTING_EVENTS: [EventKind; 3] = [EventKind::Connect, EventKind::Change, EventKind::Disconnect];

/// Token that changes whenever the account or network context does.
#[derive(Debug, Clone, Default)]
pub struct CacheBuster {
    token: Signal<u64>,
}

impl CacheBuster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) -> Signal<u64> {
        self.token.clone()
    }

    pub fn token(&self) -> u64 {
        self.token.get()
    }

    pub fn bump(&self) {
        self.token.set(self.token.get().wrapping_add(1));
    }

    /// Bumps on every connect, change and disconnect of `connector`. Keep the returned
    /// listener to [`unbind`](Self::unbind) later.
    pub fn bind<C: Connector + ?Sized>(&self, connector: &C) -> Listener {
        let buster = self.clone();
        let listener: Listener = Rc::new(move |_: &Event| buster.bump());
        for kind in BUSTING_EVENTS {
            connector.on(kind, listener.clone());
        }
        listener
    }

    pub fn unbind<C: Connector + ?Sized>(connector: &C, listener: &Listener) {
        for kind in BUSTING_EVENTS {
            connector.off(kind, listener);
        }
    }
}
