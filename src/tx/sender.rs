//! Transaction submission with retry
//!
//! Signs and broadcasts a built request. Nonce conflicts resync the tracker
//! and retry immediately without consuming the backoff budget; other
//! transient failures back off exponentially. Broadcast is treated as
//! all-or-nothing for retry purposes, which accepts a small risk of a
//! duplicate in-flight transaction after an ambiguous network error.

use super::builder::with_nonce;
use super::nonce::NonceTracker;
use crate::chain::ChainRpc;
use crate::config::SubmissionConfig;
use crate::error::RpcError;

use ethers::prelude::*;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

/// Terminal result of a submission attempt sequence
#[derive(Debug, Clone)]
pub enum SubmissionOutcome {
    /// Accepted by the network; the tracker has been advanced
    Sent(H256),
    /// Transient failures exhausted the attempt budget
    RetryableFailure(String),
    /// Submission cannot succeed without operator intervention
    FatalFailure(String),
}

/// Signs and broadcasts requests for one account
pub struct TxSender {
    signer: LocalWallet,
    policy: SubmissionConfig,
}

impl TxSender {
    pub fn new(signer: LocalWallet, policy: SubmissionConfig) -> Self {
        Self { signer, policy }
    }

    /// Broadcast `request`, retrying per policy.
    ///
    /// The tracker advances exactly once per `Sent` outcome and never
    /// otherwise, so a nonce is never reused for two distinct broadcasts.
    pub async fn submit(
        &self,
        rpc: &dyn ChainRpc,
        tracker: &mut NonceTracker,
        request: Eip1559TransactionRequest,
    ) -> SubmissionOutcome {
        let mut request = request;
        let mut attempt: u32 = 0;
        let mut resyncs: u32 = 0;
        let mut last_error = String::from("no attempt made");

        while attempt < self.policy.max_attempts {
            let typed = TypedTransaction::Eip1559(request.clone());
            let signature = match self.signer.sign_transaction(&typed).await {
                Ok(sig) => sig,
                Err(e) => {
                    return SubmissionOutcome::FatalFailure(format!("signing failed: {}", e))
                }
            };
            let raw = typed.rlp_signed(&signature);

            let send_timeout = Duration::from_secs(self.policy.send_timeout_secs);
            let result = timeout(send_timeout, rpc.send_raw_transaction(raw)).await;

            match result {
                Ok(Ok(hash)) => {
                    tracker.advance();
                    info!(
                        "Transaction sent: {:?} (attempt {}/{})",
                        hash,
                        attempt + 1,
                        self.policy.max_attempts
                    );
                    return SubmissionOutcome::Sent(hash);
                }
                Ok(Err(RpcError::NonceConflict(msg))) => {
                    // Resync and rebuild with the corrected nonce. These
                    // retries are free: a conflict tells us nothing about
                    // network health, only that our local view was stale.
                    resyncs += 1;
                    if resyncs > self.policy.max_attempts {
                        return SubmissionOutcome::RetryableFailure(format!(
                            "nonce still conflicting after {} resyncs: {}",
                            resyncs - 1,
                            msg
                        ));
                    }
                    warn!(
                        "Nonce conflict on attempt {}, resyncing: {}",
                        attempt + 1,
                        msg
                    );
                    match tracker.resync(rpc).await {
                        Ok(fresh) => {
                            request = with_nonce(&request, fresh);
                            continue;
                        }
                        Err(e) => {
                            last_error = format!("nonce resync failed: {}", e);
                            attempt += 1;
                        }
                    }
                }
                Ok(Err(e @ RpcError::InsufficientFunds(_))) => {
                    return SubmissionOutcome::FatalFailure(e.to_string());
                }
                Ok(Err(e)) => {
                    warn!("Broadcast attempt {} failed: {}", attempt + 1, e);
                    last_error = e.to_string();
                    attempt += 1;
                }
                Err(_) => {
                    warn!("Broadcast attempt {} timed out", attempt + 1);
                    last_error = format!(
                        "broadcast timed out after {}s",
                        self.policy.send_timeout_secs
                    );
                    attempt += 1;
                }
            }

            if attempt < self.policy.max_attempts {
                sleep(self.backoff(attempt - 1)).await;
            }
        }

        SubmissionOutcome::RetryableFailure(format!(
            "broadcast failed after {} attempts: {}",
            self.policy.max_attempts, last_error
        ))
    }

    /// 2^attempt backoff with a capped exponent, attempt 0-indexed
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.min(self.policy.backoff_cap_exp);
        Duration::from_millis(self.policy.backoff_base_ms << exp)
    }
}
