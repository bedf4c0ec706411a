use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use futures::{
    future::LocalBoxFuture,
    task::{LocalSpawn, LocalSpawnExt},
    FutureExt,
};
use log::{debug, error};

use super::signal::{Signal, Subscription};
use crate::{Error, FetchError};

/// Produces one fetch attempt per call.
pub type Fetcher<T> = Rc<dyn Fn() -> LocalBoxFuture<'static, Result<T, Error>>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryConfig {
    /// Do not fetch on mount or on cache invalidation.
    pub skip: bool,
    /// Refetch on every new block number.
    pub watch: bool,
}

#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub error: Option<FetchError>,
    pub loading: bool,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self { data: None, error: None, loading: false }
    }
}

/// Outcome of a single fetch attempt.
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    pub data: Option<T>,
    pub error: Option<FetchError>,
}

/// External signals that make a query fetch again.
#[derive(Debug, Clone, Default)]
pub struct Triggers {
    pub cache_buster: Option<Signal<u64>>,
    pub block_number: Option<Signal<Option<u64>>>,
}

struct Inner<T> {
    name: &'static str,
    fetcher: Fetcher<T>,
    state: Signal<QueryState<T>>,
    scheduled: Cell<u64>,
    mounted: Cell<bool>,
}

impl<T: Clone + 'static> Inner<T> {
    async fn execute(self: Rc<Self>) -> QueryResult<T> {
        let ticket = self.scheduled.get() + 1;
        self.scheduled.set(ticket);
        if self.mounted.get() {
            self.state.update(|state| {
                state.error = None;
                state.loading = true;
            });
        }

        let result = (self.fetcher)().await;

        // Only the latest scheduled attempt of a mounted query may write state.
        let authoritative = self.mounted.get() && self.scheduled.get() == ticket;
        match result {
            Ok(data) => {
                if authoritative {
                    self.state.update(|state| {
                        state.data = Some(data.clone());
                        state.loading = false;
                    });
                }
                QueryResult { data: Some(data), error: None }
            }
            Err(err) => {
                debug!("{} fetch failed: {err}", self.name);
                let err: FetchError = Rc::new(err);
                if authoritative {
                    self.state.update(|state| {
                        state.error = Some(err.clone());
                        state.loading = false;
                    });
                }
                QueryResult { data: None, error: Some(err) }
            }
        }
    }

    /// Clears a `loading` flag no attempt will come back to clear.
    fn settle(&self) {
        if self.state.with(|state| state.loading) {
            self.state.update(|state| state.loading = false);
        }
    }
}

fn spawn_fetch<T: Clone + 'static>(spawner: &dyn LocalSpawn, inner: Rc<Inner<T>>) {
    let name = inner.name;
    let task = inner.execute().map(|_| ());
    if let Err(err) = spawner.spawn_local(task) {
        error!("Failed to schedule {name} fetch: {err}");
    }
}

/// Async value kept in sync with the connection: fetched on mount, on cache invalidation
/// and (when watching) on every new block.
pub struct Query<T> {
    inner: Rc<Inner<T>>,
    spawner: Rc<dyn LocalSpawn>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl<T: Clone + 'static> Query<T> {
    pub fn mount(
        name: &'static str,
        fetcher: Fetcher<T>,
        config: QueryConfig,
        triggers: Triggers,
        spawner: Rc<dyn LocalSpawn>,
    ) -> Self {
        let inner = Rc::new(Inner {
            name,
            fetcher,
            state: Signal::new(QueryState::default()),
            scheduled: Cell::new(0),
            mounted: Cell::new(true),
        });
        let mut subscriptions = Vec::new();

        if let Some(cache_buster) = triggers.cache_buster {
            let (weak, spawner) = (Rc::downgrade(&inner), spawner.clone());
            subscriptions.push(cache_buster.subscribe(move |_| {
                if !config.skip {
                    refetch_if_mounted(&weak, spawner.as_ref());
                }
            }));
        }

        if let (true, Some(block_number)) = (config.watch, triggers.block_number) {
            let last_seen = Cell::new(block_number.get());
            let (weak, spawner) = (Rc::downgrade(&inner), spawner.clone());
            subscriptions.push(block_number.subscribe(move |block| {
                if block.is_some() && *block != last_seen.get() {
                    last_seen.set(*block);
                    refetch_if_mounted(&weak, spawner.as_ref());
                }
            }));
        }

        if !config.skip {
            spawn_fetch(spawner.as_ref(), inner.clone());
        }

        Self { inner, spawner, subscriptions: RefCell::new(subscriptions) }
    }

    pub fn state(&self) -> QueryState<T> {
        self.inner.state.get()
    }

    /// Signal the UI subscribes to for re-rendering.
    pub fn state_signal(&self) -> Signal<QueryState<T>> {
        self.inner.state.clone()
    }

    /// Fetches now and resolves to this attempt's outcome.
    pub fn refetch(&self) -> LocalBoxFuture<'static, QueryResult<T>> {
        self.inner.clone().execute().boxed_local()
    }

    /// Schedules a fetch on the spawner without waiting for it.
    pub fn invalidate(&self) {
        if self.is_mounted() {
            spawn_fetch(self.spawner.as_ref(), self.inner.clone());
        }
    }

    /// Overwrites the data with a value obtained elsewhere (e.g. a pushed block header).
    pub fn set_data(&self, data: T) {
        if self.is_mounted() {
            self.inner.state.update(|state| state.data = Some(data));
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    /// Drops every trigger. In-flight fetches still resolve but no longer touch state.
    pub fn unmount(&self) {
        if self.inner.mounted.replace(false) {
            debug!("Unmounting {}", self.inner.name);
            self.subscriptions.borrow_mut().clear();
            self.inner.settle();
        }
    }
}

impl<T> Drop for Query<T> {
    fn drop(&mut self) {
        self.inner.mounted.set(false);
        self.subscriptions.get_mut().clear();
    }
}

fn refetch_if_mounted<T: Clone + 'static>(weak: &Weak<Inner<T>>, spawner: &dyn LocalSpawn) {
    if let Some(inner) = weak.upgrade() {
        if inner.mounted.get() {
            spawn_fetch(spawner, inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::LocalPool;

    use super::*;
    use crate::provider::ProviderError;

    fn counting_fetcher(calls: Rc<Cell<u64>>) -> Fetcher<u64> {
        Rc::new(move || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { Ok::<_, Error>(n) }.boxed_local()
        })
    }

    #[test]
    fn fetches_on_mount() {
        let mut pool = LocalPool::new();
        let calls = Rc::new(Cell::new(0));
        let query = Query::mount(
            "count",
            counting_fetcher(calls.clone()),
            QueryConfig::default(),
            Triggers::default(),
            Rc::new(pool.spawner()),
        );
        assert!(query.state().data.is_none());

        pool.run_until_stalled();
        let state = query.state();
        assert_eq!(state.data, Some(1));
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[test]
    fn skip_defers_to_manual_refetch() {
        let mut pool = LocalPool::new();
        let calls = Rc::new(Cell::new(0));
        let cache_buster = Signal::new(0u64);
        let query = Query::mount(
            "count",
            counting_fetcher(calls.clone()),
            QueryConfig { skip: true, watch: false },
            Triggers { cache_buster: Some(cache_buster.clone()), block_number: None },
            Rc::new(pool.spawner()),
        );

        cache_buster.set(1);
        pool.run_until_stalled();
        assert_eq!(calls.get(), 0);
        assert!(!query.state().loading);

        let result = pool.run_until(query.refetch());
        assert_eq!(result.data, Some(1));
        assert_eq!(query.state().data, Some(1));
    }

    #[test]
    fn cache_buster_refetches() {
        let mut pool = LocalPool::new();
        let calls = Rc::new(Cell::new(0));
        let cache_buster = Signal::new(0u64);
        let query = Query::mount(
            "count",
            counting_fetcher(calls.clone()),
            QueryConfig::default(),
            Triggers { cache_buster: Some(cache_buster.clone()), block_number: None },
            Rc::new(pool.spawner()),
        );
        pool.run_until_stalled();

        cache_buster.set(1);
        pool.run_until_stalled();
        assert_eq!(calls.get(), 2);
        assert_eq!(query.state().data, Some(2));
    }

    #[test]
    fn watch_fetches_once_per_new_block() {
        let mut pool = LocalPool::new();
        let calls = Rc::new(Cell::new(0));
        let block = Signal::new(None);
        let _query = Query::mount(
            "count",
            counting_fetcher(calls.clone()),
            QueryConfig { skip: true, watch: true },
            Triggers { cache_buster: None, block_number: Some(block.clone()) },
            Rc::new(pool.spawner()),
        );

        block.replace(None);
        block.set(Some(100));
        block.replace(Some(100));
        block.set(Some(101));
        pool.run_until_stalled();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn block_changes_are_ignored_without_watch() {
        let mut pool = LocalPool::new();
        let calls = Rc::new(Cell::new(0));
        let block = Signal::new(Some(1));
        let _query = Query::mount(
            "count",
            counting_fetcher(calls.clone()),
            QueryConfig { skip: true, watch: false },
            Triggers { cache_buster: None, block_number: Some(block.clone()) },
            Rc::new(pool.spawner()),
        );

        block.set(Some(2));
        pool.run_until_stalled();
        assert_eq!(calls.get(), 0);
        assert_eq!(block.subscriber_count(), 0);
    }

    #[test]
    fn errors_become_state_and_keep_previous_data() {
        let mut pool = LocalPool::new();
        let fail = Rc::new(Cell::new(false));
        let flag = fail.clone();
        let fetcher: Fetcher<u64> = Rc::new(move || {
            let fail = flag.get();
            async move {
                if fail {
                    Err(Error::Provider(ProviderError::new("boom")))
                } else {
                    Ok(7)
                }
            }
            .boxed_local()
        });
        let query = Query::mount(
            "flaky",
            fetcher,
            QueryConfig::default(),
            Triggers::default(),
            Rc::new(pool.spawner()),
        );
        pool.run_until_stalled();

        fail.set(true);
        let result = pool.run_until(query.refetch());
        assert!(result.data.is_none());
        assert!(matches!(result.error.as_deref(), Some(Error::Provider(_))));

        let state = query.state();
        assert_eq!(state.data, Some(7));
        assert!(state.error.is_some());
        assert!(!state.loading);

        fail.set(false);
        pool.run_until(query.refetch());
        assert!(query.state().error.is_none());
    }

    #[test]
    fn unmount_drops_triggers_and_late_results() {
        let mut pool = LocalPool::new();
        let calls = Rc::new(Cell::new(0));
        let cache_buster = Signal::new(0u64);
        let query = Query::mount(
            "count",
            counting_fetcher(calls.clone()),
            QueryConfig::default(),
            Triggers { cache_buster: Some(cache_buster.clone()), block_number: None },
            Rc::new(pool.spawner()),
        );

        query.unmount();
        pool.run_until_stalled();
        assert_eq!(calls.get(), 1);
        assert!(query.state().data.is_none());
        assert_eq!(cache_buster.subscriber_count(), 0);

        cache_buster.set(1);
        query.invalidate();
        pool.run_until_stalled();
        assert_eq!(calls.get(), 1);

        // A manual refetch still answers its caller but leaves state alone.
        let result = pool.run_until(query.refetch());
        assert_eq!(result.data, Some(2));
        let state = query.state();
        assert!(state.data.is_none());
        assert!(!state.loading);
    }

    #[test]
    fn set_data_overrides() {
        let pool = LocalPool::new();
        let query = Query::mount(
            "count",
            counting_fetcher(Rc::new(Cell::new(0))),
            QueryConfig { skip: true, watch: false },
            Triggers::default(),
            Rc::new(pool.spawner()),
        );
        query.set_data(42);
        assert_eq!(query.state().data, Some(42));
    }
}
