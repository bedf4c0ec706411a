use std::{cell::RefCell, collections::HashMap, rc::Rc};

use serde::Serialize;

use super::{chain::ChainState, utils::ChecksumAddress};

/// Partial connection state carried by connect and change notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectorData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<ChecksumAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainState>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect(ConnectorData),
    Change(ConnectorData),
    Disconnect,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connect(_) => EventKind::Connect,
            Self::Change(_) => EventKind::Change,
            Self::Disconnect => EventKind::Disconnect,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Change,
    Disconnect,
}

pub type Listener = Rc<dyn Fn(&Event)>;

/// Minimal pub/sub owned by each connector.
#[derive(Default)]
pub struct EventEmitter {
    listeners: RefCell<HashMap<EventKind, Vec<Listener>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, kind: EventKind, listener: Listener) {
        let mut listeners = self.listeners.borrow_mut();
        let registered = listeners.entry(kind).or_default();
        if !registered.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            registered.push(listener);
        }
    }

    pub fn off(&self, kind: EventKind, listener: &Listener) {
        if let Some(registered) = self.listeners.borrow_mut().get_mut(&kind) {
            registered.retain(|l| !Rc::ptr_eq(l, listener));
        }
    }

    pub fn emit(&self, event: Event) {
        // Snapshot first: a listener may subscribe or unsubscribe while being notified.
        let listeners = match self.listeners.borrow().get(&event.kind()) {
            Some(registered) => registered.clone(),
            None => return,
        };
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.borrow().get(&kind).map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.borrow();
        f.debug_struct("EventEmitter")
            .field("listeners", &listeners.iter().map(|(k, v)| (*k, v.len())).collect::<Vec<_>>())
            .finish()
    }
}
