//! Transaction construction
//!
//! Produces immutable EIP-1559 requests. The gas limit is the network
//! estimate scaled by a safety margin; a failed estimate is fatal for the
//! action because it almost always means the call would revert. Fees are
//! flat policy values, which only holds up on a low-contention test network.

use crate::chain::ChainRpc;
use crate::config::FeeConfig;
use crate::error::{AgentError, AgentResult};

use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use tracing::debug;

/// Builder for one account on one chain
pub struct TxBuilder {
    chain_id: u64,
    from: Address,
    fees: FeeConfig,
}

impl TxBuilder {
    pub fn new(chain_id: u64, from: Address, fees: FeeConfig) -> Self {
        Self { chain_id, from, fees }
    }

    /// Build a request for the given call, estimating gas up front
    pub async fn build(
        &self,
        rpc: &dyn ChainRpc,
        to: Address,
        data: Bytes,
        value: U256,
        nonce: u64,
    ) -> AgentResult<Eip1559TransactionRequest> {
        let probe = Eip1559TransactionRequest::new()
            .from(self.from)
            .to(to)
            .data(data.clone())
            .value(value);

        let estimate = rpc
            .estimate_gas(TypedTransaction::Eip1559(probe))
            .await
            .map_err(|e| AgentError::GasEstimation(e.to_string()))?;

        let gas_limit = estimate * (100 + self.fees.gas_margin_percent) / 100;
        debug!(
            "Gas for call to {:?}: estimate {}, limit {}",
            to, estimate, gas_limit
        );

        let fee = gwei(self.fees.max_fee_gwei);
        let priority = gwei(self.fees.priority_fee_gwei);

        Ok(Eip1559TransactionRequest::new()
            .from(self.from)
            .to(to)
            .data(data)
            .value(value)
            .gas(gas_limit)
            .max_fee_per_gas(fee)
            .max_priority_fee_per_gas(priority)
            .nonce(nonce)
            .chain_id(self.chain_id))
    }
}

/// A copy of the request carrying a corrected nonce; the original stays
/// untouched so retries never mutate a request in place.
pub fn with_nonce(request: &Eip1559TransactionRequest, nonce: u64) -> Eip1559TransactionRequest {
    request.clone().nonce(nonce)
}

fn gwei(amount: u64) -> U256 {
    U256::from(amount) * U256::exp10(9)
}
