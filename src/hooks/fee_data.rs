use std::rc::Rc;

use ethers::types::U256;
use futures::{future::LocalBoxFuture, task::LocalSpawn, FutureExt};
use serde::Serialize;

use super::{
    query::{Fetcher, Query, QueryConfig, QueryResult, Triggers},
    signal::Signal,
    ReaderAccessor,
};
use crate::{
    utils::{format_fixed, FormatUnits},
    web3::FeeData,
    Error, FetchError,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeeDataConfig {
    /// Unit the `formatted` projection is expressed in. Defaults to wei.
    pub format_units: FormatUnits,
    pub skip: bool,
    pub watch: bool,
}

/// Human readable fee fields. A field the chain did not report stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedFeeData {
    pub gas_price: Option<String>,
    pub max_fee_per_gas: Option<String>,
    pub max_priority_fee_per_gas: Option<String>,
}

impl FormattedFeeData {
    pub fn new(fee_data: &FeeData, units: &FormatUnits) -> Result<Self, Error> {
        Ok(Self::with_decimals(fee_data, units.decimals()?))
    }

    fn with_decimals(fee_data: &FeeData, decimals: u32) -> Self {
        // `decimals` was validated at mount, so formatting cannot fail here.
        let format = |value: Option<U256>| value.and_then(|value| format_fixed(value, decimals).ok());
        Self {
            gas_price: format(fee_data.gas_price),
            max_fee_per_gas: format(fee_data.max_fee_per_gas),
            max_priority_fee_per_gas: format(fee_data.max_priority_fee_per_gas),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeDataView {
    pub fee_data: FeeData,
    pub formatted: FormattedFeeData,
}

#[derive(Debug, Clone, Default)]
pub struct FeeDataState {
    pub data: Option<FeeDataView>,
    pub error: Option<FetchError>,
    pub loading: bool,
}

/// Current network fees, refreshed on context changes and optionally on every block.
pub struct FeeDataQuery {
    query: Query<FeeData>,
    decimals: u32,
}

impl FeeDataQuery {
    /// Fails only when `config.format_units` is not a known unit.
    pub fn mount(
        reader: ReaderAccessor,
        config: FeeDataConfig,
        triggers: Triggers,
        spawner: Rc<dyn LocalSpawn>,
    ) -> Result<Self, Error> {
        let decimals = config.format_units.decimals()?;
        let fetcher: Fetcher<FeeData> = Rc::new(move || {
            let reader = reader();
            async move { reader.get_fee_data().await }.boxed_local()
        });
        let query = Query::mount(
            "fee data",
            fetcher,
            QueryConfig { skip: config.skip, watch: config.watch },
            triggers,
            spawner,
        );
        Ok(Self { query, decimals })
    }

    pub fn state(&self) -> FeeDataState {
        let state = self.query.state();
        FeeDataState {
            data: state.data.map(|fee_data| FeeDataView {
                formatted: FormattedFeeData::with_decimals(&fee_data, self.decimals),
                fee_data,
            }),
            error: state.error,
            loading: state.loading,
        }
    }

    pub fn state_signal(&self) -> Signal<super::QueryState<FeeData>> {
        self.query.state_signal()
    }

    pub fn refetch(&self) -> LocalBoxFuture<'static, QueryResult<FeeData>> {
        self.query.refetch()
    }

    pub fn unmount(&self) {
        self.query.unmount();
    }
}
