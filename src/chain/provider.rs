//! Chain RPC adapter
//!
//! Wraps the HTTP JSON-RPC provider behind the [`ChainRpc`] trait so the
//! submission core can be exercised against mocks. Provider errors are
//! classified here, once, into [`RpcError`] variants; nothing above this
//! boundary matches on error strings.

use crate::error::{RpcError, RpcResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider, ProviderError};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::time::Duration;
use tracing::debug;

/// Fallible remote calls the submission core depends on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Read-only eth_call
    async fn call(&self, tx: TypedTransaction) -> RpcResult<Bytes>;

    /// Gas estimate for a prospective transaction
    async fn estimate_gas(&self, tx: TypedTransaction) -> RpcResult<U256>;

    /// Pending-tagged transaction count for an address
    async fn pending_nonce(&self, address: Address) -> RpcResult<u64>;

    /// Broadcast a signed transaction, returning its hash
    async fn send_raw_transaction(&self, raw: Bytes) -> RpcResult<H256>;

    /// Receipt for a broadcast transaction, if mined
    async fn transaction_receipt(&self, hash: H256) -> RpcResult<Option<TransactionReceipt>>;

    /// Native asset balance
    async fn native_balance(&self, address: Address) -> RpcResult<U256>;
}

/// HTTP provider for a single chain
pub struct ChainProvider {
    inner: Provider<Http>,
}

impl ChainProvider {
    pub fn new(rpc_url: &str, chain_id: u64) -> RpcResult<Self> {
        let inner = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| RpcError::Transient(format!("invalid rpc url: {}", e)))?
            .interval(Duration::from_millis(100));

        debug!("Initialized provider for chain {}: {}", chain_id, rpc_url);
        Ok(Self { inner })
    }
}

#[async_trait]
impl ChainRpc for ChainProvider {
    async fn call(&self, tx: TypedTransaction) -> RpcResult<Bytes> {
        self.inner.call(&tx, None).await.map_err(classify)
    }

    async fn estimate_gas(&self, tx: TypedTransaction) -> RpcResult<U256> {
        self.inner.estimate_gas(&tx, None).await.map_err(classify)
    }

    async fn pending_nonce(&self, address: Address) -> RpcResult<u64> {
        let count = self
            .inner
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(classify)?;
        Ok(count.as_u64())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> RpcResult<H256> {
        let pending = self
            .inner
            .send_raw_transaction(raw)
            .await
            .map_err(classify)?;
        Ok(pending.tx_hash())
    }

    async fn transaction_receipt(&self, hash: H256) -> RpcResult<Option<TransactionReceipt>> {
        self.inner
            .get_transaction_receipt(hash)
            .await
            .map_err(classify)
    }

    async fn native_balance(&self, address: Address) -> RpcResult<U256> {
        self.inner.get_balance(address, None).await.map_err(classify)
    }
}

/// Map a raw provider error onto the agent's error taxonomy.
///
/// The node's error surface is stringly typed, so the string matching lives
/// here and nowhere else. Patterns cover the standard geth texts plus the
/// codes this network's sequencer is known to emit.
fn classify(err: ProviderError) -> RpcError {
    let text = err.to_string();
    let lower = text.to_lowercase();

    if lower.contains("nonce too low")
        || lower.contains("nonce has already been used")
        || lower.contains("already known")
        || lower.contains("replacement transaction underpriced")
        || lower.contains("replacement_underpriced")
        || lower.contains("nonce_expired")
        || lower.contains("tx_replay_attack")
    {
        return RpcError::NonceConflict(text);
    }

    if lower.contains("insufficient funds") {
        return RpcError::InsufficientFunds(text);
    }

    if lower.contains("block not found")
        || lower.contains("transaction not found")
        || lower.contains("-32008")
    {
        return RpcError::NotYetAvailable(text);
    }

    if lower.contains("timeout") || lower.contains("timed out") {
        return RpcError::Timeout(text);
    }

    RpcError::Transient(text)
}
