//! Action orchestration
//!
//! Every business action (claim, stake, swap, add-liquidity, mint,
//! aquaflux, transfer) composes the same pipeline: read-only precondition
//! checks, optional approval, build, submit, confirm. The orchestrator is the only
//! place that maps typed submission/receipt outcomes onto the public
//! [`ActionResult`] stop decision; no error type crosses this boundary.

mod aquaflux;
mod claim;
mod liquidity;
mod mint;
mod stake;
mod swap;
mod transfer;

use crate::api::{AquafluxClient, RecommendationClient};
use crate::chain::{erc20, ChainRpc};
use crate::config::Settings;
use crate::error::AgentResult;
use crate::tx::{NonceTracker, ReceiptOutcome, ReceiptWaiter, SubmissionOutcome, TxBuilder, TxSender};

use ethers::prelude::*;
use ethers::signers::{LocalWallet, Signer};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Uniform contract returned by every public action.
///
/// `stop = true` tells the caller to abandon the remaining steps of the
/// flow; `stop = false` marks a transient condition a later run may clear.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub success: bool,
    pub tx_hash: Option<H256>,
    pub stop: bool,
    pub message: String,
}

impl ActionResult {
    /// Transaction confirmed on-chain
    pub fn confirmed(tx_hash: H256, message: impl Into<String>) -> Self {
        Self {
            success: true,
            tx_hash: Some(tx_hash),
            stop: false,
            message: message.into(),
        }
    }

    /// Nothing to do; the action's goal already holds
    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            success: true,
            tx_hash: None,
            stop: false,
            message: message.into(),
        }
    }

    /// Transient failure; a later run may succeed
    pub fn retry(message: impl Into<String>) -> Self {
        Self {
            success: false,
            tx_hash: None,
            stop: false,
            message: message.into(),
        }
    }

    /// Structural or fatal failure; abandon the flow
    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            success: false,
            tx_hash: None,
            stop: true,
            message: message.into(),
        }
    }
}

/// Drives one account through the configured action flow.
///
/// Exclusively owns the account's nonce tracker, so submissions for this
/// account are strictly sequential by construction.
pub struct Orchestrator {
    pub(crate) rpc: Arc<dyn ChainRpc>,
    pub(crate) builder: TxBuilder,
    pub(crate) sender: TxSender,
    pub(crate) waiter: ReceiptWaiter,
    pub(crate) tracker: NonceTracker,
    pub(crate) api: RecommendationClient,
    pub(crate) aquaflux: AquafluxClient,
    pub(crate) settings: Settings,
    pub(crate) address: Address,
}

impl Orchestrator {
    pub async fn new(
        settings: Settings,
        signer: LocalWallet,
        rpc: Arc<dyn ChainRpc>,
    ) -> AgentResult<Self> {
        let chain_id = settings.network.chain_id;
        let signer = signer.with_chain_id(chain_id);
        let address = signer.address();

        let tracker = NonceTracker::init(rpc.as_ref(), address).await?;
        let api = RecommendationClient::new(settings.api.clone(), chain_id, &signer).await?;
        let aquaflux = AquafluxClient::new(settings.aquaflux_api.clone(), signer.clone())?;
        let builder = TxBuilder::new(chain_id, address, settings.fees.clone());
        let sender = TxSender::new(signer, settings.submission.clone());
        let waiter = ReceiptWaiter::new(settings.receipt.clone());

        Ok(Self {
            rpc,
            builder,
            sender,
            waiter,
            tracker,
            api,
            aquaflux,
            settings,
            address,
        })
    }

    /// Run the configured action list in order. A `stop` result terminates
    /// the flow immediately; transient failures only skip the step.
    pub async fn run(&mut self) -> bool {
        let actions = self.settings.flow.actions.clone();
        let mut all_ok = true;

        for (index, action) in actions.iter().enumerate() {
            if index > 0 {
                self.step_delay().await;
            }

            info!("[{:?}] Running action: {}", self.address, action);
            let result = self.dispatch(action).await;

            if result.success {
                info!("[{:?}] {}: {}", self.address, action, result.message);
            } else if result.stop {
                warn!(
                    "[{:?}] {} failed, aborting flow: {}",
                    self.address, action, result.message
                );
                return false;
            } else {
                warn!(
                    "[{:?}] {} failed (retryable): {}",
                    self.address, action, result.message
                );
                all_ok = false;
            }
        }

        all_ok
    }

    async fn dispatch(&mut self, action: &str) -> ActionResult {
        match action {
            "claim" => self.claim_faucet().await,
            "stake" => self.stake_rounds().await,
            "swap" => self.swap().await,
            "add-liquidity" => self.add_liquidity().await,
            "mint" => self.mint_badge().await,
            "aquaflux" => self.aquaflux_flow().await,
            "transfer" => self.transfer_native().await,
            // Unreachable: config validation rejects unknown names
            other => ActionResult::aborted(format!("unknown action {:?}", other)),
        }
    }

    /// Build, submit and confirm one transaction, mapping every outcome
    /// onto the ActionResult contract.
    pub(crate) async fn execute(
        &mut self,
        to: Address,
        data: Bytes,
        value: U256,
        label: &str,
    ) -> ActionResult {
        let request = match self
            .builder
            .build(self.rpc.as_ref(), to, data, value, self.tracker.current())
            .await
        {
            Ok(request) => request,
            // Estimation failure usually means the call would revert
            Err(e) => return ActionResult::aborted(format!("{}: {}", label, e)),
        };

        let hash = match self
            .sender
            .submit(self.rpc.as_ref(), &mut self.tracker, request)
            .await
        {
            SubmissionOutcome::Sent(hash) => hash,
            SubmissionOutcome::RetryableFailure(message) => {
                return ActionResult::retry(format!("{}: {}", label, message));
            }
            SubmissionOutcome::FatalFailure(message) => {
                return ActionResult::aborted(format!("{}: {}", label, message));
            }
        };

        match self.waiter.wait(self.rpc.as_ref(), hash).await {
            ReceiptOutcome::Confirmed {
                block_number,
                gas_used,
            } => ActionResult::confirmed(
                hash,
                format!(
                    "{} confirmed in block {} ({} gas): {}",
                    label,
                    block_number,
                    gas_used,
                    self.explorer_link(hash)
                ),
            ),
            ReceiptOutcome::Reverted => {
                ActionResult::aborted(format!("{}: transaction {:?} reverted on-chain", label, hash))
            }
            ReceiptOutcome::StillPending => ActionResult::aborted(format!(
                "{}: transaction {:?} unconfirmed after the receipt budget",
                label, hash
            )),
            ReceiptOutcome::TransientError(message) => ActionResult::aborted(format!(
                "{}: receipt polling for {:?} failed: {}",
                label, hash, message
            )),
        }
    }

    /// Raise the spender's allowance if it is below `required`.
    ///
    /// Returns a successful result without a transaction when the current
    /// allowance already suffices; otherwise submits and confirms exactly
    /// one approval for `approve_amount`.
    pub(crate) async fn ensure_allowance(
        &mut self,
        token: Address,
        spender: Address,
        required: U256,
        approve_amount: U256,
        label: &str,
    ) -> ActionResult {
        let current = match erc20::allowance(self.rpc.as_ref(), token, self.address, spender).await
        {
            Ok(allowance) => allowance,
            Err(e) if e.is_retryable() => {
                return ActionResult::retry(format!("{}: allowance check failed: {}", label, e));
            }
            Err(e) => {
                return ActionResult::aborted(format!("{}: allowance check failed: {}", label, e));
            }
        };

        if current >= required {
            return ActionResult::skipped(format!("{}: allowance sufficient", label));
        }

        info!(
            "[{:?}] {}: raising allowance for spender {:?}",
            self.address, label, spender
        );
        let data = erc20::approve_calldata(spender, approve_amount);
        self.execute(token, data, U256::zero(), &format!("{} approval", label))
            .await
    }

    /// Randomized pause between flow steps to avoid uniform request timing
    pub(crate) async fn step_delay(&self) {
        let min = self.settings.flow.min_step_delay_secs;
        let max = self.settings.flow.max_step_delay_secs;
        let secs = rand::thread_rng().gen_range(min..=max);
        info!("[{:?}] Waiting {}s before the next step", self.address, secs);
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    pub(crate) fn explorer_link(&self, hash: H256) -> String {
        format!(
            "{}/tx/{:?}",
            self.settings.network.explorer_url.trim_end_matches('/'),
            hash
        )
    }

    pub(crate) fn unix_now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::chain::provider::MockChainRpc;
    use crate::config::*;

    pub const TEST_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    /// Settings with all delays shrunk to keep tests fast
    pub fn test_settings() -> Settings {
        Settings {
            network: NetworkConfig {
                name: "testnet".into(),
                chain_id: 688688,
                rpc_url: "http://localhost:8545".into(),
                explorer_url: "https://testnet.pharosscan.xyz".into(),
            },
            wallet: WalletConfig {
                keys_file: None,
                private_key_env: Some("UNSET".into()),
            },
            submission: SubmissionConfig {
                max_attempts: 3,
                backoff_base_ms: 1,
                backoff_cap_exp: 2,
                send_timeout_secs: 5,
            },
            receipt: ReceiptConfig {
                max_attempts: 5,
                poll_interval_ms: 1,
                attempt_timeout_secs: 5,
                backoff_base_ms: 1,
                backoff_cap_exp: 2,
            },
            fees: FeeConfig {
                max_fee_gwei: 1,
                priority_fee_gwei: 1,
                gas_margin_percent: 20,
            },
            api: ApiConfig {
                base_url: "http://localhost:9".into(),
                max_attempts: 1,
                retry_delay_secs: 0,
                pacing_delay_secs: 0,
                request_timeout_secs: 1,
            },
            aquaflux_api: ApiConfig {
                base_url: "http://localhost:9".into(),
                max_attempts: 1,
                retry_delay_secs: 0,
                pacing_delay_secs: 0,
                request_timeout_secs: 1,
            },
            flow: FlowConfig {
                actions: vec!["claim".into(), "stake".into()],
                staking_rounds: 1,
                min_step_delay_secs: 0,
                max_step_delay_secs: 0,
                stake_fraction_percent: 1,
                swap_amount: 0.01,
                lp_quote_range: [10000, 10000],
                transfer: Some(TransferConfig {
                    recipient: Address::repeat_byte(9),
                    amount: 0.001,
                }),
            },
            contracts: ContractsConfig {
                usdc: Address::repeat_byte(0x11),
                usdt: Address::repeat_byte(0x12),
                musd: Address::repeat_byte(0x13),
                wphrs: Address::repeat_byte(0x14),
                staking_router: Address::repeat_byte(0x21),
                faucet: Address::repeat_byte(0x22),
                swap_router: Address::repeat_byte(0x23),
                liquidity_router: Address::repeat_byte(0x24),
                dvm_pool: Address::repeat_byte(0x25),
                nft_sale: Address::repeat_byte(0x26),
                aquaflux_nft: Address::repeat_byte(0x27),
                aquaflux_c: Address::repeat_byte(0x28),
                aquaflux_s: Address::repeat_byte(0x29),
                aquaflux_cs: Address::repeat_byte(0x2a),
            },
        }
    }

    /// Orchestrator over a prepared mock; the mock must already answer the
    /// initial pending-nonce query.
    pub async fn test_orchestrator(rpc: MockChainRpc) -> Orchestrator {
        let signer: LocalWallet = TEST_KEY.parse().unwrap();
        Orchestrator::new(test_settings(), signer, Arc::new(rpc))
            .await
            .unwrap()
    }

    /// Mock that answers the session-start nonce query
    pub fn mock_with_nonce(nonce: u64) -> MockChainRpc {
        let mut rpc = MockChainRpc::new();
        rpc.expect_pending_nonce().returning(move |_| Ok(nonce));
        rpc
    }

    /// 32-byte big-endian word holding a uint
    pub fn uint_word(value: U256) -> Bytes {
        let mut word = [0u8; 32];
        value.to_big_endian(&mut word);
        Bytes::from(word.to_vec())
    }

    pub fn mined_receipt(status: u64) -> TransactionReceipt {
        TransactionReceipt {
            status: Some(U64::from(status)),
            block_number: Some(U64::from(100u64)),
            gas_used: Some(U256::from(50_000u64)),
            ..Default::default()
        }
    }
}
