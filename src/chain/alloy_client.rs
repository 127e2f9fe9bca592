use crate::chain::{BlockStream, ChainClient, ContractSnapshot, LogEntry, SettleReceipt};
use crate::utils::constants::{DOOMSDAY_ADDRESS, MULTICALL3_ADDRESS};
use alloy::network::{Ethereum, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::Provider;
use alloy::rpc::types::{BlockNumberOrTag, BlockTransactionsKind, Filter, TransactionRequest};
use alloy::sol_types::SolCall;
use alloy::transports::Transport;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use std::marker::PhantomData;
use std::time::Duration;
use tokio_stream::StreamExt;

alloy::sol! {
    struct Multicall3Call {
        address target;
        bool allowFailure;
        bytes callData;
    }

    struct Multicall3Result {
        bool success;
        bytes returnData;
    }

    function aggregate3(Multicall3Call[] calldata calls)
        external
        payable
        returns (Multicall3Result[] memory returnData);
}

alloy::sol! {
    interface IDoomsday {
        function getLastHash() external view returns (bytes32);
        function totalSupply() external view returns (uint256);
        function settle(uint256 location) external;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SubmitSettings {
    pub chain_id: u64,
    pub dry_run: bool,
    pub receipt_timeout: Duration,
}

/// [`ChainClient`] over an alloy provider.
///
/// The provider is expected to carry a wallet filler for `participant`; `send_settle` relies
/// on it for nonce, fees and signing.
pub struct AlloyChain<P, T> {
    provider: P,
    contract: Address,
    participant: Address,
    settings: SubmitSettings,
    _transport: PhantomData<fn() -> T>,
}

impl<P, T> AlloyChain<P, T>
where
    T: Transport + Clone,
    P: Provider<T, Ethereum>,
{
    pub fn new(provider: P, participant: Address, settings: SubmitSettings) -> Self {
        Self {
            provider,
            contract: DOOMSDAY_ADDRESS,
            participant,
            settings,
            _transport: PhantomData,
        }
    }

    fn settle_request(&self, candidate: U256) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.participant)
            .with_to(self.contract)
            .with_input(IDoomsday::settleCall { location: candidate }.abi_encode())
            .with_chain_id(self.settings.chain_id)
    }
}

pub(crate) fn snapshot_calldata(contract: Address) -> Bytes {
    let calls = vec![
        Multicall3Call {
            target: contract,
            allowFailure: false,
            callData: IDoomsday::getLastHashCall {}.abi_encode().into(),
        },
        Multicall3Call {
            target: contract,
            allowFailure: false,
            callData: IDoomsday::totalSupplyCall {}.abi_encode().into(),
        },
    ];
    aggregate3Call { calls }.abi_encode().into()
}

pub(crate) fn decode_snapshot(return_bytes: &[u8]) -> anyhow::Result<ContractSnapshot> {
    let decoded = <aggregate3Call as SolCall>::abi_decode_returns(return_bytes, true)
        .context("aggregate3 returned undecodable data")?;
    let [last_hash_result, supply_result] = decoded.returnData.as_slice() else {
        return Err(anyhow!(
            "aggregate3 returned {} results, expected 2",
            decoded.returnData.len()
        ));
    };
    if !last_hash_result.success || !supply_result.success {
        return Err(anyhow!(
            "snapshot read failed: getLastHash ok={} totalSupply ok={}",
            last_hash_result.success,
            supply_result.success
        ));
    }

    let last_hash =
        IDoomsday::getLastHashCall::abi_decode_returns(last_hash_result.returnData.as_ref(), true)
            .context("getLastHash returned undecodable data")?
            ._0;
    let supply =
        IDoomsday::totalSupplyCall::abi_decode_returns(supply_result.returnData.as_ref(), true)
            .context("totalSupply returned undecodable data")?
            ._0;
    Ok(ContractSnapshot { last_hash, supply })
}

#[async_trait]
impl<P, T> ChainClient for AlloyChain<P, T>
where
    T: Transport + Clone,
    P: Provider<T, Ethereum> + Send + Sync + 'static,
{
    async fn subscribe_new_blocks(&self) -> anyhow::Result<BlockStream> {
        let sub = self
            .provider
            .subscribe_blocks()
            .await
            .context("eth_subscribe(newHeads) failed; the endpoint may not support pubsub")?;
        Ok(Box::pin(sub.into_stream().map(|header| header.number)))
    }

    async fn get_block(&self, block_number: u64) -> anyhow::Result<B256> {
        let block = self
            .provider
            .get_block_by_number(
                BlockNumberOrTag::Number(block_number),
                BlockTransactionsKind::Hashes,
            )
            .await?
            .ok_or_else(|| anyhow!("block #{block_number} not found yet"))?;
        Ok(block.header.hash)
    }

    async fn get_logs(&self, block_hash: B256) -> anyhow::Result<Vec<LogEntry>> {
        let filter = Filter::new().at_block_hash(block_hash);
        let logs = self.provider.get_logs(&filter).await?;
        Ok(logs
            .into_iter()
            .map(|log| LogEntry {
                address: log.inner.address,
                topics: log.inner.data.topics().to_vec(),
            })
            .collect())
    }

    async fn batch_read(&self) -> anyhow::Result<ContractSnapshot> {
        let request = TransactionRequest::default()
            .with_to(MULTICALL3_ADDRESS)
            .with_input(snapshot_calldata(self.contract));
        let raw = self.provider.call(&request).await?;
        decode_snapshot(raw.as_ref())
    }

    async fn simulate_settle(&self, candidate: U256) -> anyhow::Result<()> {
        self.provider
            .call(&self.settle_request(candidate))
            .await
            .map_err(|err| anyhow!("settle({candidate}) simulation failed: {err}"))?;
        Ok(())
    }

    async fn send_settle(&self, candidate: U256) -> anyhow::Result<SettleReceipt> {
        if self.settings.dry_run {
            return Ok(SettleReceipt::Simulated);
        }

        let pending = self
            .provider
            .send_transaction(self.settle_request(candidate))
            .await
            .map_err(|err| anyhow!("settle({candidate}) broadcast failed: {err}"))?;
        let tx_hash = *pending.tx_hash();
        tracing::info!("[SUBMIT] settle({}) broadcast tx={:#x}", candidate, tx_hash);

        let receipt = tokio::time::timeout(self.settings.receipt_timeout, pending.get_receipt())
            .await
            .map_err(|_| {
                anyhow!(
                    "settle tx {tx_hash:#x} not mined within {}ms",
                    self.settings.receipt_timeout.as_millis()
                )
            })?
            .map_err(|err| anyhow!("settle tx {tx_hash:#x} receipt failed: {err}"))?;
        Ok(SettleReceipt::Confirmed {
            tx_hash,
            block_number: receipt.block_number,
            success: receipt.status(),
        })
    }
}
