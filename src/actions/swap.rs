//! Swap action
//!
//! Swaps a configured amount between a random stable/wrapped-native pair
//! through the router's multicall entry point. The inner call is
//! exactInputSingle with the low fee tier and no minimum-out bound, which
//! is acceptable on a test network where the pools carry no real value.

use super::{ActionResult, Orchestrator};
use crate::chain::erc20;

use ethers::abi::{self, Token};
use ethers::prelude::*;
use ethers::utils::id;
use rand::Rng;
use tracing::info;

/// 0.05% fee tier
const FEE_TIER_LOW: u32 = 500;
/// Seconds a built multicall stays valid
const DEADLINE_SECS: u64 = 600;

struct Pair {
    from: &'static str,
    to: &'static str,
}

const PAIRS: [Pair; 4] = [
    Pair { from: "WPHRS", to: "USDC" },
    Pair { from: "USDC", to: "WPHRS" },
    Pair { from: "WPHRS", to: "USDT" },
    Pair { from: "USDT", to: "WPHRS" },
];

impl Orchestrator {
    pub async fn swap(&mut self) -> ActionResult {
        let pair = &PAIRS[rand::thread_rng().gen_range(0..PAIRS.len())];
        let token_in = self.token_by_symbol(pair.from);
        let token_out = self.token_by_symbol(pair.to);
        let decimals = decimals_for(pair.from);

        let amount_text = self.settings.flow.swap_amount.to_string();
        let required: U256 = match ethers::utils::parse_units(&amount_text, decimals) {
            Ok(parsed) => parsed.into(),
            Err(e) => {
                return ActionResult::aborted(format!("swap: invalid amount {}: {}", amount_text, e));
            }
        };

        let balance = match erc20::balance_of(self.rpc.as_ref(), token_in, self.address).await {
            Ok(balance) => balance,
            Err(e) if e.is_retryable() => {
                return ActionResult::retry(format!("swap: balance read failed: {}", e));
            }
            Err(e) => return ActionResult::aborted(format!("swap: balance read failed: {}", e)),
        };
        if balance < required {
            return ActionResult::retry(format!(
                "swap: insufficient {} balance: {} < {}",
                pair.from, balance, required
            ));
        }

        let router = self.settings.contracts.swap_router;
        let approval = self
            .ensure_allowance(token_in, router, required, required, "swap")
            .await;
        if !approval.success {
            return approval;
        }

        info!(
            "[{:?}] Swapping {} {} to {}",
            self.address, amount_text, pair.from, pair.to
        );

        let deadline = Self::unix_now() + DEADLINE_SECS;
        let calldata = multicall_swap_calldata(token_in, token_out, self.address, required, deadline);

        self.execute(
            router,
            calldata,
            U256::zero(),
            &format!("swap {} -> {}", pair.from, pair.to),
        )
        .await
    }

    fn token_by_symbol(&self, symbol: &str) -> Address {
        let contracts = &self.settings.contracts;
        match symbol {
            "USDC" => contracts.usdc,
            "USDT" => contracts.usdt,
            _ => contracts.wphrs,
        }
    }
}

fn decimals_for(symbol: &str) -> u32 {
    match symbol {
        "USDC" | "USDT" => 6,
        _ => 18,
    }
}

/// multicall(deadline, [exactInputSingle(...)]) calldata
fn multicall_swap_calldata(
    token_in: Address,
    token_out: Address,
    recipient: Address,
    amount_in: U256,
    deadline: u64,
) -> Bytes {
    let mut inner = id("exactInputSingle((address,address,uint24,address,uint256,uint256,uint160))")
        .to_vec();
    inner.extend(abi::encode(&[Token::Tuple(vec![
        Token::Address(token_in),
        Token::Address(token_out),
        Token::Uint(U256::from(FEE_TIER_LOW)),
        Token::Address(recipient),
        Token::Uint(amount_in),
        Token::Uint(U256::zero()),
        Token::Uint(U256::zero()),
    ])]));

    let mut outer = id("multicall(uint256,bytes[])").to_vec();
    outer.extend(abi::encode(&[
        Token::Uint(U256::from(deadline)),
        Token::Array(vec![Token::Bytes(inner)]),
    ]));

    Bytes::from(outer)
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;

    #[tokio::test]
    async fn test_insufficient_balance_is_transient_without_submission() {
        let mut rpc = mock_with_nonce(0);
        rpc.expect_call()
            .times(1)
            .returning(|_| Ok(uint_word(U256::zero())));
        rpc.expect_estimate_gas().times(0);
        rpc.expect_send_raw_transaction().times(0);

        let mut session = test_orchestrator(rpc).await;
        let result = session.swap().await;

        assert!(!result.success);
        assert!(!result.stop);
        assert!(result.message.contains("insufficient"));
    }

    #[tokio::test]
    async fn test_funded_swap_submits_and_confirms() {
        let mut rpc = mock_with_nonce(0);
        // Balance read, then allowance read; both generous
        rpc.expect_call()
            .times(2)
            .returning(|_| Ok(uint_word(U256::from(u64::MAX))));
        rpc.expect_estimate_gas()
            .times(1)
            .returning(|_| Ok(U256::from(260_000u64)));
        rpc.expect_send_raw_transaction()
            .times(1)
            .returning(|_| Ok(H256::repeat_byte(0xab)));
        rpc.expect_transaction_receipt()
            .times(1)
            .returning(|_| Ok(Some(mined_receipt(1))));

        let mut session = test_orchestrator(rpc).await;
        let result = session.swap().await;

        assert!(result.success, "{}", result.message);
        assert_eq!(result.tx_hash, Some(H256::repeat_byte(0xab)));
    }

    #[test]
    fn test_multicall_calldata_embeds_deadline_word() {
        let calldata = multicall_swap_calldata(
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            Address::repeat_byte(3),
            U256::from(10_000u64),
            1_700_000_000,
        );
        // Selector, then the deadline as the first argument word
        assert_eq!(
            U256::from_big_endian(&calldata[4..36]),
            U256::from(1_700_000_000u64)
        );
    }
}
