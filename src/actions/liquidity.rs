//! DVM liquidity action
//!
//! Deposits a USDC/USDT pair into the DVM pool through the liquidity
//! router. The quote amount is drawn from a configured range and the base
//! amount follows the pool's current ratio; minimums allow 0.1% slippage.

use super::{ActionResult, Orchestrator};
use crate::chain::erc20;

use ethers::abi::{self, Token};
use ethers::prelude::*;
use ethers::utils::id;
use rand::Rng;
use tracing::info;

/// Base units per quote unit at the pool's published ratio, scaled by 1e4
const BASE_PER_QUOTE_RATIO_E4: u64 = 10_000;
const RATIO_DENOMINATOR: u64 = 30_427;

const DEADLINE_SECS: u64 = 600;

impl Orchestrator {
    pub async fn add_liquidity(&mut self) -> ActionResult {
        let contracts = self.settings.contracts.clone();
        let [range_low, range_high] = self.settings.flow.lp_quote_range;

        let quote_amount = U256::from(rand::thread_rng().gen_range(range_low..=range_high));
        let base_amount = base_leg_for(quote_amount);

        let legs = [
            ("USDC", contracts.usdc, base_amount),
            ("USDT", contracts.usdt, quote_amount),
        ];

        for (symbol, token, required) in legs {
            let balance = match erc20::balance_of(self.rpc.as_ref(), token, self.address).await {
                Ok(balance) => balance,
                Err(e) if e.is_retryable() => {
                    return ActionResult::retry(format!(
                        "liquidity: {} balance read failed: {}",
                        symbol, e
                    ));
                }
                Err(e) => {
                    return ActionResult::aborted(format!(
                        "liquidity: {} balance read failed: {}",
                        symbol, e
                    ));
                }
            };
            if balance < required {
                return ActionResult::aborted(format!(
                    "liquidity: insufficient {} balance: {} < {}",
                    symbol, balance, required
                ));
            }
        }

        for (symbol, token, required) in legs {
            let approval = self
                .ensure_allowance(
                    token,
                    contracts.liquidity_router,
                    required,
                    required,
                    &format!("liquidity {}", symbol),
                )
                .await;
            if !approval.success {
                return approval;
            }
        }

        info!(
            "[{:?}] Adding liquidity: {} USDC / {} USDT raw units",
            self.address, base_amount, quote_amount
        );

        let deadline = Self::unix_now() + DEADLINE_SECS;
        let calldata = add_dvm_liquidity_calldata(
            contracts.dvm_pool,
            base_amount,
            quote_amount,
            deadline,
        );

        self.execute(
            contracts.liquidity_router,
            calldata,
            U256::zero(),
            "add liquidity",
        )
        .await
    }
}

/// Base-token (USDC) amount matching a quote-token (USDT) deposit at the
/// pool's published ratio
fn base_leg_for(quote_amount: U256) -> U256 {
    quote_amount * BASE_PER_QUOTE_RATIO_E4 / RATIO_DENOMINATOR
}

/// addDVMLiquidity with 0.1% slippage on both minimums and flag 0
/// (both sides paid from the caller's balance)
fn add_dvm_liquidity_calldata(
    pool: Address,
    base_amount: U256,
    quote_amount: U256,
    deadline: u64,
) -> Bytes {
    let mut data =
        id("addDVMLiquidity(address,uint256,uint256,uint256,uint256,uint8,uint256)").to_vec();
    data.extend(abi::encode(&[
        Token::Address(pool),
        Token::Uint(base_amount),
        Token::Uint(quote_amount),
        Token::Uint(base_amount * 999 / 1000),
        Token::Uint(quote_amount * 999 / 1000),
        Token::Uint(U256::zero()),
        Token::Uint(U256::from(deadline)),
    ]));
    Bytes::from(data)
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;

    #[tokio::test]
    async fn test_insufficient_base_balance_stops_without_submission() {
        let mut rpc = mock_with_nonce(0);
        // USDC balance read comes back empty; nothing is submitted
        rpc.expect_call()
            .times(1)
            .returning(|_| Ok(uint_word(U256::zero())));
        rpc.expect_estimate_gas().times(0);
        rpc.expect_send_raw_transaction().times(0);

        let mut session = test_orchestrator(rpc).await;
        let result = session.add_liquidity().await;

        assert!(!result.success);
        assert!(result.stop);
        assert!(result.message.contains("insufficient USDC"));
    }

    #[tokio::test]
    async fn test_funded_deposit_submits_and_confirms() {
        let mut rpc = mock_with_nonce(0);
        // Two balance reads, then two allowance reads; all generous
        rpc.expect_call()
            .times(4)
            .returning(|_| Ok(uint_word(U256::from(u64::MAX))));
        rpc.expect_estimate_gas()
            .times(1)
            .returning(|_| Ok(U256::from(300_000u64)));
        rpc.expect_send_raw_transaction()
            .times(1)
            .returning(|_| Ok(H256::repeat_byte(0x1d)));
        rpc.expect_transaction_receipt()
            .times(1)
            .returning(|_| Ok(Some(mined_receipt(1))));

        let mut session = test_orchestrator(rpc).await;
        let result = session.add_liquidity().await;

        assert!(result.success, "{}", result.message);
        assert_eq!(result.tx_hash, Some(H256::repeat_byte(0x1d)));
    }

    #[test]
    fn test_base_leg_follows_pool_ratio() {
        // The configured range draws the USDT (quote) leg; USDC follows
        assert_eq!(base_leg_for(U256::from(30_427u64)), U256::from(10_000u64));
        assert_eq!(base_leg_for(U256::from(10_000u64)), U256::from(3_286u64));
    }

    #[test]
    fn test_calldata_encodes_pool_and_minimums() {
        let pool = Address::repeat_byte(0x42);
        let calldata =
            add_dvm_liquidity_calldata(pool, U256::from(10_000u64), U256::from(30_427u64), 1000);

        // Pool address sits in the first argument word
        assert_eq!(&calldata[16..36], pool.as_bytes());
        // Base minimum is 0.1% under the base amount
        assert_eq!(U256::from_big_endian(&calldata[100..132]), U256::from(9_990u64));
    }
}
