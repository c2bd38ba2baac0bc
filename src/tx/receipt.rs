//! Receipt polling with bounded retries
//!
//! Distinguishes "not yet observed" (poll again after a fixed interval)
//! from "network call failed" (counts against the budget, exponential
//! backoff) from "reverted on-chain" (deterministic, returned immediately).

use crate::chain::ChainRpc;
use crate::config::ReceiptConfig;
use crate::error::RpcError;

use ethers::prelude::*;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Terminal result of waiting for a receipt
#[derive(Debug, Clone)]
pub enum ReceiptOutcome {
    Confirmed { block_number: u64, gas_used: U256 },
    Reverted,
    /// Budget exhausted without ever observing the receipt
    StillPending,
    /// Budget exhausted on repeated network failures
    TransientError(String),
}

/// Polls the receipt endpoint for one transaction at a time
pub struct ReceiptWaiter {
    policy: ReceiptConfig,
}

impl ReceiptWaiter {
    pub fn new(policy: ReceiptConfig) -> Self {
        Self { policy }
    }

    pub async fn wait(&self, rpc: &dyn ChainRpc, hash: H256) -> ReceiptOutcome {
        let mut attempt: u32 = 0;
        let mut last_error: Option<String> = None;
        let attempt_timeout = Duration::from_secs(self.policy.attempt_timeout_secs);

        while attempt < self.policy.max_attempts {
            let result = timeout(attempt_timeout, rpc.transaction_receipt(hash)).await;

            match result {
                Ok(Ok(Some(receipt))) => {
                    if receipt.status == Some(U64::one()) {
                        return ReceiptOutcome::Confirmed {
                            block_number: receipt.block_number.unwrap_or_default().as_u64(),
                            gas_used: receipt.gas_used.unwrap_or_default(),
                        };
                    }
                    // A revert is deterministic; polling again cannot help.
                    warn!("Transaction {:?} reverted on-chain", hash);
                    return ReceiptOutcome::Reverted;
                }
                Ok(Ok(None)) | Ok(Err(RpcError::NotYetAvailable(_))) => {
                    debug!(
                        "Receipt for {:?} not yet observed (attempt {}/{})",
                        hash,
                        attempt + 1,
                        self.policy.max_attempts
                    );
                    attempt += 1;
                    if attempt < self.policy.max_attempts {
                        sleep(Duration::from_millis(self.policy.poll_interval_ms)).await;
                    }
                }
                Ok(Err(e)) => {
                    warn!(
                        "Receipt poll {} for {:?} failed: {}",
                        attempt + 1,
                        hash,
                        e
                    );
                    last_error = Some(e.to_string());
                    attempt += 1;
                    if attempt < self.policy.max_attempts {
                        sleep(self.backoff(attempt - 1)).await;
                    }
                }
                Err(_) => {
                    warn!("Receipt poll {} for {:?} timed out", attempt + 1, hash);
                    last_error = Some(format!(
                        "receipt poll timed out after {}s",
                        self.policy.attempt_timeout_secs
                    ));
                    attempt += 1;
                    if attempt < self.policy.max_attempts {
                        sleep(self.backoff(attempt - 1)).await;
                    }
                }
            }
        }

        match last_error {
            Some(message) => ReceiptOutcome::TransientError(message),
            None => ReceiptOutcome::StillPending,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.min(self.policy.backoff_cap_exp);
        Duration::from_millis(self.policy.backoff_base_ms << exp)
    }
}
