use std::{cell::RefCell, collections::BTreeMap};

/// Origin-scoped string store the wallet SDK persists its session into.
pub trait KeyValueStorage {
    fn keys(&self) -> Vec<String>;

    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str);

    fn remove(&self, key: &str);
}

/// Removes every key containing `namespace`, returning how many were dropped.
pub fn purge_namespace(storage: &dyn KeyValueStorage, namespace: &str) -> usize {
    // Collect before removing so index-based backends are not walked while shrinking.
    let doomed = storage.keys().into_iter().filter(|key| key.contains(namespace)).collect::<Vec<_>>();
    for key in &doomed {
        storage.remove(key);
    }
    doomed.len()
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryStorage {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: RefCell::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }
}

impl KeyValueStorage for MemoryStorage {
    fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}

#[cfg(target_arch = "wasm32")]
pub use self::browser::LocalStorage;

#[cfg(target_arch = "wasm32")]
mod browser {
    use gloo::storage::{LocalStorage as GlooLocalStorage, Storage};
    use log::warn;

    use super::KeyValueStorage;

    /// `window.localStorage`.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct LocalStorage;

    impl KeyValueStorage for LocalStorage {
        fn keys(&self) -> Vec<String> {
            let raw = GlooLocalStorage::raw();
            let length = raw.length().unwrap_or_default();
            (0..length).filter_map(|n| raw.key(n).ok().flatten()).collect()
        }

        fn get(&self, key: &str) -> Option<String> {
            GlooLocalStorage::raw().get_item(key).ok().flatten()
        }

        fn set(&self, key: &str, value: &str) {
            if let Err(err) = GlooLocalStorage::raw().set_item(key, value) {
                warn!("Failed to persist {key}: {err:?}");
            }
        }

        fn remove(&self, key: &str) {
            GlooLocalStorage::delete(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purges_only_namespaced_keys() {
        let storage: MemoryStorage =
            [("foo-walletlink", "1"), ("bar", "2"), ("baz-walletlink", "3")].into_iter().collect();

        assert_eq!(purge_namespace(&storage, "-walletlink"), 2);
        assert_eq!(storage.keys(), vec!["bar".to_string()]);
        assert_eq!(storage.get("bar").as_deref(), Some("2"));
    }

    #[test]
    fn purge_tolerates_empty_storage() {
        let storage = MemoryStorage::new();
        assert_eq!(purge_namespace(&storage, "-walletlink"), 0);
        assert!(storage.is_empty());
    }

    #[test]
    fn set_and_remove() {
        let storage = MemoryStorage::new();
        storage.set("a", "1");
        storage.set("a", "2");
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.get("a").as_deref(), Some("2"));
        storage.remove("a");
        storage.remove("a");
        assert!(storage.get("a").is_none());
    }
}
