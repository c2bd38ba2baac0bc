//! NFT mint action
//!
//! Claims one badge from the sale contract for a flat 1 PHRS. The claim
//! call carries a fixed argument block (native currency sentinel, price,
//! empty allowlist proof) with only the recipient varying per account, so
//! the calldata is spliced from a template rather than re-encoded.

use super::{ActionResult, Orchestrator};

use ethers::prelude::*;
use ethers::utils::parse_ether;
use tracing::info;

/// claim(receiver, quantity=1, currency=native, price=1e18, proof, data)
/// with the receiver word left as a placeholder
/// 200k gas at 1 gwei, roughly what a claim costs
const GAS_HEADROOM_ETHER: &str = "0.0002";

const CLAIM_TEMPLATE: &str = "0x84bb1e42000000000000000000000000{receiver}0000000000000000000000000000000000000000000000000000000000000001000000000000000000000000eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee0000000000000000000000000000000000000000000000000de0b6b3a764000000000000000000000000000000000000000000000000000000000000000000c0000000000000000000000000000000000000000000000000000000000000016000000000000000000000000000000000000000000000000000000000000000800000000000000000000000000000000000000000000000000000000000000000ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000";

impl Orchestrator {
    pub async fn mint_badge(&mut self) -> ActionResult {
        let sale = self.settings.contracts.nft_sale;

        let price = match parse_ether(1u64) {
            Ok(price) => price,
            Err(e) => return ActionResult::aborted(format!("mint: price conversion: {}", e)),
        };
        let headroom = match parse_ether(GAS_HEADROOM_ETHER) {
            Ok(headroom) => headroom,
            Err(e) => return ActionResult::aborted(format!("mint: headroom: {}", e)),
        };

        let balance = match self.rpc.native_balance(self.address).await {
            Ok(balance) => balance,
            Err(e) if e.is_retryable() => {
                return ActionResult::retry(format!("mint: balance read failed: {}", e));
            }
            Err(e) => return ActionResult::aborted(format!("mint: balance read failed: {}", e)),
        };
        if balance < price + headroom {
            return ActionResult::aborted(format!(
                "mint: insufficient native balance: {} < {}",
                balance,
                price + headroom
            ));
        }

        info!("[{:?}] Minting badge for 1 PHRS", self.address);

        let calldata = match claim_calldata(self.address) {
            Ok(calldata) => calldata,
            Err(e) => return ActionResult::aborted(format!("mint: {}", e)),
        };

        self.execute(sale, calldata, price, "badge mint").await
    }
}

fn claim_calldata(receiver: Address) -> Result<Bytes, String> {
    let filled = CLAIM_TEMPLATE.replace("{receiver}", &hex::encode(receiver.as_bytes()));
    filled
        .parse::<Bytes>()
        .map_err(|e| format!("claim template: {}", e))
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;

    #[test]
    fn test_claim_calldata_splices_receiver() {
        let receiver = Address::repeat_byte(0x5a);
        let calldata = claim_calldata(receiver).unwrap();

        assert_eq!(&calldata[..4], &[0x84, 0xbb, 0x1e, 0x42]);
        // Receiver word, then quantity 1
        assert_eq!(&calldata[16..36], receiver.as_bytes());
        assert_eq!(U256::from_big_endian(&calldata[36..68]), U256::one());
        // Price word matches 1 ether
        assert_eq!(
            U256::from_big_endian(&calldata[100..132]),
            parse_ether(1u64).unwrap()
        );
    }

    #[tokio::test]
    async fn test_underfunded_account_stops_without_submission() {
        let mut rpc = mock_with_nonce(0);
        rpc.expect_native_balance()
            .times(1)
            .returning(|_| Ok(U256::from(100u64)));
        rpc.expect_estimate_gas().times(0);
        rpc.expect_send_raw_transaction().times(0);

        let mut session = test_orchestrator(rpc).await;
        let result = session.mint_badge().await;

        assert!(!result.success);
        assert!(result.stop);
        assert!(result.message.contains("insufficient native balance"));
    }

    #[tokio::test]
    async fn test_price_without_gas_headroom_stops() {
        let mut rpc = mock_with_nonce(0);
        // Exactly the mint price leaves nothing for gas
        rpc.expect_native_balance()
            .times(1)
            .returning(|_| Ok(parse_ether(1u64).unwrap()));
        rpc.expect_send_raw_transaction().times(0);

        let mut session = test_orchestrator(rpc).await;
        let result = session.mint_badge().await;

        assert!(!result.success);
        assert!(result.stop);
    }

    #[tokio::test]
    async fn test_funded_mint_submits_with_value() {
        let mut rpc = mock_with_nonce(0);
        rpc.expect_native_balance()
            .times(1)
            .returning(|_| Ok(parse_ether(2u64).unwrap()));
        rpc.expect_estimate_gas()
            .times(1)
            .returning(|_| Ok(U256::from(180_000u64)));
        rpc.expect_send_raw_transaction()
            .times(1)
            .returning(|_| Ok(H256::repeat_byte(0x9f)));
        rpc.expect_transaction_receipt()
            .times(1)
            .returning(|_| Ok(Some(mined_receipt(1))));

        let mut session = test_orchestrator(rpc).await;
        let result = session.mint_badge().await;

        assert!(result.success, "{}", result.message);
        assert_eq!(result.tx_hash, Some(H256::repeat_byte(0x9f)));
    }
}
