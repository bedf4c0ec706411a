use std::rc::Rc;

use async_trait::async_trait;
use ethers::types::{Bytes, TransactionRequest, H256, U256, U64};
use log::debug;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;

use super::{
    provider::WalletProvider,
    utils::{get_address, ChecksumAddress},
    Error,
};

/// Tip suggested for EIP-1559 transactions, 1.5 gwei.
pub const DEFAULT_PRIORITY_FEE: u64 = 1_500_000_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeData {
    pub gas_price: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

impl FeeData {
    /// Legacy gas price plus the 1559 fields derived from the latest base fee, when the
    /// chain has one.
    pub fn from_base_fee(gas_price: Option<U256>, base_fee: Option<U256>) -> Self {
        match base_fee {
            Some(base_fee) => {
                let priority = U256::from(DEFAULT_PRIORITY_FEE);
                // Base fee comes straight from the node; saturate rather than overflow.
                let max_fee = base_fee.saturating_mul(U256::from(2)).saturating_add(priority);
                Self {
                    gas_price,
                    max_fee_per_gas: Some(max_fee),
                    max_priority_fee_per_gas: Some(priority),
                }
            }
            None => Self { gas_price, ..Self::default() },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockFees {
    #[serde(default)]
    base_fee_per_gas: Option<U256>,
}

/// Read side of a chain as the reactive hooks need it.
#[async_trait(?Send)]
pub trait ChainReader {
    async fn get_fee_data(&self) -> Result<FeeData, Error>;

    async fn get_block_number(&self) -> Result<u64, Error>;
}

/// Uniform Ethereum provider over whatever the wallet SDK hands out.
pub struct Web3Provider<P: ?Sized> {
    inner: Rc<P>,
}

impl<P: ?Sized> Clone for Web3Provider<P> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<P: ?Sized> std::fmt::Debug for Web3Provider<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Web3Provider").finish_non_exhaustive()
    }
}

impl<P: WalletProvider + ?Sized> Web3Provider<P> {
    pub fn new(inner: Rc<P>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Rc<P> {
        &self.inner
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<T, Error> {
        debug!("-> {method}");
        let value = self.inner.request(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn list_accounts(&self) -> Result<Vec<ChecksumAddress>, Error> {
        let accounts: Vec<String> = self.request("eth_accounts", None).await?;
        accounts.iter().map(|account| get_address(account)).collect()
    }

    pub async fn get_chain_id(&self) -> Result<u64, Error> {
        let id: U64 = self.request("eth_chainId", None).await?;
        Ok(id.as_u64())
    }

    pub async fn get_gas_price(&self) -> Result<U256, Error> {
        self.request("eth_gasPrice", None).await
    }

    pub fn get_signer(&self, address: ChecksumAddress) -> JsonRpcSigner<P> {
        JsonRpcSigner { provider: self.clone(), address }
    }
}

#[async_trait(?Send)]
impl<P: WalletProvider + ?Sized> ChainReader for Web3Provider<P> {
    async fn get_fee_data(&self) -> Result<FeeData, Error> {
        let (gas_price, block) = futures::try_join!(
            self.get_gas_price(),
            self.request::<Option<BlockFees>>("eth_getBlockByNumber", Some(json!(["latest", false])))
        )?;
        Ok(FeeData::from_base_fee(Some(gas_price), block.and_then(|b| b.base_fee_per_gas)))
    }

    async fn get_block_number(&self) -> Result<u64, Error> {
        let number: U64 = self.request("eth_blockNumber", None).await?;
        Ok(number.as_u64())
    }
}

/// Signer that delegates every signature to the wallet on behalf of `address`.
pub struct JsonRpcSigner<P: ?Sized> {
    provider: Web3Provider<P>,
    address: ChecksumAddress,
}

impl<P: ?Sized> Clone for JsonRpcSigner<P> {
    fn clone(&self) -> Self {
        Self { provider: self.provider.clone(), address: self.address }
    }
}

impl<P: ?Sized> std::fmt::Debug for JsonRpcSigner<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcSigner").field("address", &self.address).finish()
    }
}

impl<P: WalletProvider + ?Sized> JsonRpcSigner<P> {
    pub fn address(&self) -> ChecksumAddress {
        self.address
    }

    pub fn provider(&self) -> &Web3Provider<P> {
        &self.provider
    }

    pub async fn sign_message(&self, message: &[u8]) -> Result<Bytes, Error> {
        let message = Bytes::from(message.to_vec());
        self.provider
            .request("personal_sign", Some(json!([message, self.address.to_string()])))
            .await
    }

    pub async fn send_transaction(&self, tx: TransactionRequest) -> Result<H256, Error> {
        let tx = tx.from(self.address.address());
        self.provider.request("eth_sendTransaction", Some(json!([tx]))).await
    }
}
