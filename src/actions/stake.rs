//! Staking action
//!
//! Stakes a configured fraction of the account's stable balances through
//! the staking router, with the allocation and router calldata supplied by
//! the recommendation service. Approvals are raised per token before the
//! main transaction is built.

use super::{ActionResult, Orchestrator};
use crate::api::{AssetPosition, ChainRef};
use crate::chain::erc20;

use ethers::prelude::*;
use tracing::info;

/// USDC / USDT / MockUSD all use 6 decimals on this network
const STABLE_DECIMALS: u32 = 6;

impl Orchestrator {
    /// Run the configured number of staking rounds; any failed round ends
    /// the step with that round's result.
    pub async fn stake_rounds(&mut self) -> ActionResult {
        let rounds = self.settings.flow.staking_rounds;
        let mut last = ActionResult::skipped("no staking rounds configured");

        for round in 0..rounds {
            if round > 0 {
                self.step_delay().await;
            }
            info!("[{:?}] Staking round {}/{}", self.address, round + 1, rounds);

            last = self.stake_once().await;
            if !last.success {
                return last;
            }
        }

        last
    }

    async fn stake_once(&mut self) -> ActionResult {
        let contracts = self.settings.contracts.clone();
        let stables = [
            ("USDC", contracts.usdc),
            ("USDT", contracts.usdt),
            ("MockUSD", contracts.musd),
        ];
        let fraction = self.settings.flow.stake_fraction_percent;

        // CheckingPreconditions: every stable must yield a non-zero stake
        let mut amounts = Vec::with_capacity(stables.len());
        for (symbol, token) in stables {
            let balance = match erc20::balance_of(self.rpc.as_ref(), token, self.address).await {
                Ok(balance) => balance,
                Err(e) if e.is_retryable() => {
                    return ActionResult::retry(format!("staking: {} balance read failed: {}", symbol, e));
                }
                Err(e) => {
                    return ActionResult::aborted(format!("staking: {} balance read failed: {}", symbol, e));
                }
            };

            let amount = balance * fraction / 100;
            if amount.is_zero() {
                return ActionResult::aborted(format!(
                    "staking: insufficient {} balance ({} raw units at {}%)",
                    symbol, balance, fraction
                ));
            }
            amounts.push((symbol, token, amount));
        }

        info!(
            "[{:?}] Staking amounts: {}",
            self.address,
            amounts
                .iter()
                .map(|(s, _, a)| format!("{} {}", a, s))
                .collect::<Vec<_>>()
                .join(" | ")
        );

        let positions = amounts
            .iter()
            .map(|(symbol, token, amount)| AssetPosition {
                chain: ChainRef {
                    id: self.settings.network.chain_id,
                },
                name: symbol.to_string(),
                symbol: symbol.to_string(),
                decimals: STABLE_DECIMALS,
                address: format!("{:?}", token),
                assets: amount.to_string(),
                price: 1.0,
                assets_usd: amount.low_u128() as f64 / 10f64.powi(STABLE_DECIMALS as i32),
            })
            .collect();

        let recommendation = match self.api.portfolio_recommendation(positions).await {
            Ok(recommendation) => recommendation,
            Err(e) => return ActionResult::aborted(format!("staking: {}", e)),
        };

        // Approving: unbounded approval per deficient token, each confirmed
        // before the router transaction is built
        for (symbol, token, amount) in &amounts {
            let approval = self
                .ensure_allowance(
                    *token,
                    contracts.staking_router,
                    *amount,
                    U256::MAX,
                    &format!("staking {}", symbol),
                )
                .await;
            if !approval.success {
                return approval;
            }
        }

        let calldata = match self.api.change_transactions(&recommendation.changes).await {
            Ok(calldata) => calldata,
            Err(e) => return ActionResult::aborted(format!("staking: {}", e)),
        };

        self.execute(contracts.staking_router, calldata, U256::zero(), "staking")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;

    #[tokio::test]
    async fn test_zero_stakeable_balance_stops_without_any_submission() {
        let mut rpc = mock_with_nonce(0);
        // First balance read returns zero; no further reads or submissions
        rpc.expect_call()
            .times(1)
            .returning(|_| Ok(uint_word(U256::zero())));
        rpc.expect_estimate_gas().times(0);
        rpc.expect_send_raw_transaction().times(0);

        let mut session = test_orchestrator(rpc).await;
        let result = session.stake_rounds().await;

        assert!(!result.success);
        assert!(result.stop);
        assert!(result.message.contains("insufficient USDC"));
    }

    #[tokio::test]
    async fn test_small_balance_rounds_down_to_zero_stake() {
        let mut rpc = mock_with_nonce(0);
        // 50 raw units at 1% floors to zero
        rpc.expect_call()
            .times(1)
            .returning(|_| Ok(uint_word(U256::from(50u64))));
        rpc.expect_send_raw_transaction().times(0);

        let mut session = test_orchestrator(rpc).await;
        let result = session.stake_rounds().await;

        assert!(!result.success);
        assert!(result.stop);
    }
}
