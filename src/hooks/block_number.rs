use std::rc::Rc;

use futures::{future::LocalBoxFuture, task::LocalSpawn, FutureExt};

use super::{
    query::{Fetcher, Query, QueryConfig, QueryResult, QueryState, Triggers},
    signal::{Signal, Subscription},
    ReaderAccessor,
};

/// Latest block number, mirrored into a signal other hooks can watch.
pub struct BlockNumberQuery {
    query: Query<u64>,
    block_number: Signal<Option<u64>>,
    watch: bool,
    _mirror: Subscription,
}

impl BlockNumberQuery {
    pub fn mount(
        reader: ReaderAccessor,
        config: QueryConfig,
        cache_buster: Option<Signal<u64>>,
        spawner: Rc<dyn LocalSpawn>,
    ) -> Self {
        let fetcher: Fetcher<u64> = Rc::new(move || {
            let reader = reader();
            async move { reader.get_block_number().await }.boxed_local()
        });
        let triggers = Triggers { cache_buster, block_number: None };
        // The block number never re-triggers itself.
        let query_config = QueryConfig { skip: config.skip, watch: false };
        let query = Query::mount("block number", fetcher, query_config, triggers, spawner);

        let block_number = Signal::new(None);
        let mirror = block_number.clone();
        let _mirror = query.state_signal().subscribe(move |state: &QueryState<u64>| {
            if let Some(number) = state.data {
                mirror.set(Some(number));
            }
        });

        Self { query, block_number, watch: config.watch, _mirror }
    }

    pub fn block_number(&self) -> Signal<Option<u64>> {
        self.block_number.clone()
    }

    pub fn state(&self) -> QueryState<u64> {
        self.query.state()
    }

    pub fn refetch(&self) -> LocalBoxFuture<'static, QueryResult<u64>> {
        self.query.refetch()
    }

    /// Feeds a block number from a head subscription. Ignored unless watching.
    pub fn push(&self, number: u64) {
        if self.watch {
            self.query.set_data(number);
        }
    }

    pub fn unmount(&self) {
        self.query.unmount();
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::LocalPool;

    use super::*;
    use crate::{
        hooks::{fee_data::FeeDataConfig, fixed_reader, FeeDataQuery},
        mock::MockReader,
        web3::ChainReader,
    };

    #[test]
    fn fetch_populates_signal() {
        let mut pool = LocalPool::new();
        let reader = Rc::new(MockReader::new());
        reader.set_block_number(100);
        let dyn_reader: Rc<dyn ChainReader> = reader.clone();
        let query = BlockNumberQuery::mount(
            fixed_reader(dyn_reader),
            QueryConfig::default(),
            None,
            Rc::new(pool.spawner()),
        );

        pool.run_until_stalled();
        assert_eq!(query.state().data, Some(100));
        assert_eq!(query.block_number().get(), Some(100));

        reader.set_block_number(105);
        let result = pool.run_until(query.refetch());
        assert_eq!(result.data, Some(105));
        assert_eq!(query.block_number().get(), Some(105));
    }

    #[test]
    fn push_requires_watch() {
        let pool = LocalPool::new();
        let reader: Rc<dyn ChainReader> = Rc::new(MockReader::new());
        let quiet = BlockNumberQuery::mount(
            fixed_reader(reader.clone()),
            QueryConfig { skip: true, watch: false },
            None,
            Rc::new(pool.spawner()),
        );
        quiet.push(7);
        assert_eq!(quiet.block_number().get(), None);

        let watching = BlockNumberQuery::mount(
            fixed_reader(reader),
            QueryConfig { skip: true, watch: true },
            None,
            Rc::new(pool.spawner()),
        );
        watching.push(7);
        assert_eq!(watching.block_number().get(), Some(7));
    }

    #[test]
    fn drives_fee_data_watch() {
        let mut pool = LocalPool::new();
        let reader = Rc::new(MockReader::new());
        let dyn_reader: Rc<dyn ChainReader> = reader.clone();
        let blocks = BlockNumberQuery::mount(
            fixed_reader(dyn_reader.clone()),
            QueryConfig { skip: true, watch: true },
            None,
            Rc::new(pool.spawner()),
        );
        let triggers = Triggers { cache_buster: None, block_number: Some(blocks.block_number()) };
        let _fees = FeeDataQuery::mount(
            fixed_reader(dyn_reader),
            FeeDataConfig { watch: true, ..FeeDataConfig::default() },
            triggers,
            Rc::new(pool.spawner()),
        )
        .unwrap();
        pool.run_until_stalled();
        assert_eq!(reader.fee_calls.get(), 1);

        blocks.push(100);
        blocks.push(100);
        blocks.push(101);
        pool.run_until_stalled();
        assert_eq!(reader.fee_calls.get(), 3);
        assert_eq!(reader.block_calls.get(), 0);
    }
}
