//! Reactive data layer. Each hook owns its state as a [`Signal`] and refetches when its
//! triggers fire; the UI only subscribes to state and calls `refetch`.

pub mod block_number;
pub mod cache_buster;
pub mod fee_data;
pub mod query;
pub mod signal;

use std::rc::Rc;

pub use block_number::BlockNumberQuery;
pub use cache_buster::CacheBuster;
pub use fee_data::{FeeDataConfig, FeeDataQuery, FeeDataState, FeeDataView, FormattedFeeData};
pub use query::{Fetcher, Query, QueryConfig, QueryResult, QueryState, Triggers};
pub use signal::{Signal, Subscription};

use super::{
    connectors::Connector,
    web3::{ChainReader, Web3Provider},
};

/// Hands out whichever reader is current at the time of the call.
pub type ReaderAccessor = Rc<dyn Fn() -> Rc<dyn ChainReader>>;

pub fn fixed_reader(reader: Rc<dyn ChainReader>) -> ReaderAccessor {
    Rc::new(move || reader.clone())
}

/// Reads through the connector's live provider, so a reconnect is picked up transparently.
pub fn connector_reader<C: Connector + 'static>(connector: Rc<C>) -> ReaderAccessor {
    Rc::new(move || {
        let reader: Rc<dyn ChainReader> = Rc::new(Web3Provider::new(connector.get_provider()));
        reader
    })
}
