//! Native transfer action
//!
//! Sends a configured amount of PHRS to a fixed recipient. The balance
//! check reserves a small headroom for the transfer's own gas.

use super::{ActionResult, Orchestrator};

use ethers::prelude::*;
use ethers::utils::parse_ether;
use tracing::info;

/// 21000 gas at 1 gwei
const GAS_HEADROOM_ETHER: &str = "0.000021";

impl Orchestrator {
    pub async fn transfer_native(&mut self) -> ActionResult {
        let Some(transfer) = self.settings.flow.transfer.clone() else {
            return ActionResult::skipped("transfer: no recipient configured");
        };

        let amount: U256 = match ethers::utils::parse_units(&transfer.amount.to_string(), 18) {
            Ok(parsed) => parsed.into(),
            Err(e) => {
                return ActionResult::aborted(format!(
                    "transfer: invalid amount {}: {}",
                    transfer.amount, e
                ));
            }
        };
        let headroom = match parse_ether(GAS_HEADROOM_ETHER) {
            Ok(headroom) => headroom,
            Err(e) => return ActionResult::aborted(format!("transfer: headroom: {}", e)),
        };

        let balance = match self.rpc.native_balance(self.address).await {
            Ok(balance) => balance,
            Err(e) if e.is_retryable() => {
                return ActionResult::retry(format!("transfer: balance read failed: {}", e));
            }
            Err(e) => {
                return ActionResult::aborted(format!("transfer: balance read failed: {}", e));
            }
        };
        if balance < amount + headroom {
            return ActionResult::aborted(format!(
                "transfer: insufficient native balance: {} < {}",
                balance,
                amount + headroom
            ));
        }

        info!(
            "[{:?}] Sending {} PHRS to {:?}",
            self.address, transfer.amount, transfer.recipient
        );

        self.execute(transfer.recipient, Bytes::new(), amount, "native transfer")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;

    #[tokio::test]
    async fn test_missing_recipient_is_noop_success() {
        let rpc = mock_with_nonce(0);
        let mut session = test_orchestrator(rpc).await;
        session.settings.flow.transfer = None;

        let result = session.transfer_native().await;

        assert!(result.success);
        assert!(result.tx_hash.is_none());
    }

    #[tokio::test]
    async fn test_balance_below_amount_plus_headroom_stops() {
        let mut rpc = mock_with_nonce(0);
        // Exactly the amount, but nothing left for gas
        rpc.expect_native_balance()
            .times(1)
            .returning(|_| Ok(parse_ether("0.001").unwrap()));
        rpc.expect_send_raw_transaction().times(0);

        let mut session = test_orchestrator(rpc).await;
        session.settings.flow.transfer = Some(crate::config::TransferConfig {
            recipient: Address::repeat_byte(7),
            amount: 0.001,
        });

        let result = session.transfer_native().await;

        assert!(!result.success);
        assert!(result.stop);
    }

    #[tokio::test]
    async fn test_funded_transfer_submits_and_confirms() {
        let mut rpc = mock_with_nonce(0);
        rpc.expect_native_balance()
            .times(1)
            .returning(|_| Ok(parse_ether(1u64).unwrap()));
        rpc.expect_estimate_gas()
            .times(1)
            .returning(|_| Ok(U256::from(21_000u64)));
        rpc.expect_send_raw_transaction()
            .times(1)
            .returning(|_| Ok(H256::repeat_byte(0x7e)));
        rpc.expect_transaction_receipt()
            .times(1)
            .returning(|_| Ok(Some(mined_receipt(1))));

        let mut session = test_orchestrator(rpc).await;
        session.settings.flow.transfer = Some(crate::config::TransferConfig {
            recipient: Address::repeat_byte(7),
            amount: 0.001,
        });

        let result = session.transfer_native().await;

        assert!(result.success, "{}", result.message);
        assert_eq!(result.tx_hash, Some(H256::repeat_byte(0x7e)));
    }
}
