//! AquaFlux flow
//!
//! Multi-step action against the AquaFlux NFT contract: claim the free C
//! and S tokens, craft 100 CS from them, then mint the NFT with a signed
//! authorization issued by the AquaFlux backend. A claim the contract
//! already recorded for the day is a no-op; every other step failure ends
//! the flow.

use super::{ActionResult, Orchestrator};
use crate::chain::erc20;

use ethers::abi::{self, Token};
use ethers::prelude::*;
use ethers::utils::id;
use tracing::info;

/// craft method id; the contract is unverified and only publishes the
/// selector, not the signature
const CRAFT_SELECTOR: [u8; 4] = [0x4c, 0x10, 0xb5, 0x23];
/// mint(nftType, expiresAt, signature) method id, same provenance
const MINT_SELECTOR: [u8; 4] = [0x75, 0xe7, 0xe0, 0x53];

impl Orchestrator {
    pub async fn aquaflux_flow(&mut self) -> ActionResult {
        let contracts = self.settings.contracts.clone();
        let nft = contracts.aquaflux_nft;
        // 100 tokens at 18 decimals, consumed per craft and per mint
        let required = U256::from(100u64) * U256::exp10(18);

        let token = match self.aquaflux.login().await {
            Ok(token) => token,
            Err(e) => return ActionResult::aborted(format!("aquaflux: login failed: {}", e)),
        };

        info!("[{:?}] Claiming AquaFlux C and S tokens", self.address);
        let claim = self
            .execute(
                nft,
                Bytes::from(id("claimTokens()").to_vec()),
                U256::zero(),
                "aquaflux token claim",
            )
            .await;
        if !claim.success && !claim.message.to_lowercase().contains("already claimed") {
            return claim;
        }

        // Craft preconditions: 100 C and 100 S on hand
        for (symbol, token_addr) in [("C", contracts.aquaflux_c), ("S", contracts.aquaflux_s)] {
            let balance = match erc20::balance_of(self.rpc.as_ref(), token_addr, self.address).await
            {
                Ok(balance) => balance,
                Err(e) if e.is_retryable() => {
                    return ActionResult::retry(format!(
                        "aquaflux: {} balance read failed: {}",
                        symbol, e
                    ));
                }
                Err(e) => {
                    return ActionResult::aborted(format!(
                        "aquaflux: {} balance read failed: {}",
                        symbol, e
                    ));
                }
            };
            if balance < required {
                return ActionResult::aborted(format!(
                    "aquaflux: insufficient {} tokens: {} < {}",
                    symbol, balance, required
                ));
            }

            let approval = self
                .ensure_allowance(
                    token_addr,
                    nft,
                    required,
                    U256::MAX,
                    &format!("aquaflux {}", symbol),
                )
                .await;
            if !approval.success {
                return approval;
            }
        }

        let cs_before =
            match erc20::balance_of(self.rpc.as_ref(), contracts.aquaflux_cs, self.address).await {
                Ok(balance) => balance,
                Err(e) => {
                    return ActionResult::aborted(format!(
                        "aquaflux: CS balance read failed: {}",
                        e
                    ));
                }
            };

        info!("[{:?}] Crafting 100 CS tokens", self.address);
        let craft = self
            .execute(nft, craft_calldata(required), U256::zero(), "aquaflux craft")
            .await;
        if !craft.success {
            return craft;
        }

        let cs_after =
            match erc20::balance_of(self.rpc.as_ref(), contracts.aquaflux_cs, self.address).await {
                Ok(balance) => balance,
                Err(e) => {
                    return ActionResult::aborted(format!(
                        "aquaflux: CS balance read failed: {}",
                        e
                    ));
                }
            };
        if cs_after.saturating_sub(cs_before) < required {
            return ActionResult::aborted(format!(
                "aquaflux: craft incomplete: CS balance moved {} of {} expected",
                cs_after.saturating_sub(cs_before),
                required
            ));
        }

        match self.aquaflux.check_token_holding(&token).await {
            Ok(holding) => info!("[{:?}] AquaFlux holding check: {}", self.address, holding),
            Err(e) => return ActionResult::aborted(format!("aquaflux: {}", e)),
        }

        let auth = match self.aquaflux.mint_authorization(&token, 0).await {
            Ok(auth) => auth,
            Err(e) => return ActionResult::aborted(format!("aquaflux: {}", e)),
        };
        if Self::unix_now() >= auth.expires_at {
            return ActionResult::aborted(format!(
                "aquaflux: mint authorization expired at {}",
                auth.expires_at
            ));
        }

        let approval = self
            .ensure_allowance(contracts.aquaflux_cs, nft, required, U256::MAX, "aquaflux CS")
            .await;
        if !approval.success {
            return approval;
        }

        info!("[{:?}] Minting AquaFlux NFT type {}", self.address, auth.nft_type);
        self.execute(
            nft,
            mint_calldata(auth.nft_type, auth.expires_at, &auth.signature),
            U256::zero(),
            "aquaflux mint",
        )
        .await
    }
}

fn craft_calldata(amount: U256) -> Bytes {
    let mut data = CRAFT_SELECTOR.to_vec();
    data.extend(abi::encode(&[Token::Uint(amount)]));
    Bytes::from(data)
}

fn mint_calldata(nft_type: u64, expires_at: u64, signature: &Bytes) -> Bytes {
    let mut data = MINT_SELECTOR.to_vec();
    data.extend(abi::encode(&[
        Token::Uint(U256::from(nft_type)),
        Token::Uint(U256::from(expires_at)),
        Token::Bytes(signature.to_vec()),
    ]));
    Bytes::from(data)
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;

    #[test]
    fn test_craft_calldata_layout() {
        let amount = U256::from(100u64) * U256::exp10(18);
        let data = craft_calldata(amount);
        assert_eq!(&data[..4], &CRAFT_SELECTOR);
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(U256::from_big_endian(&data[4..36]), amount);
    }

    #[test]
    fn test_mint_calldata_embeds_authorization() {
        let signature = Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]);
        let data = mint_calldata(0, 1_700_000_600, &signature);

        assert_eq!(&data[..4], &MINT_SELECTOR);
        assert_eq!(U256::from_big_endian(&data[4..36]), U256::zero());
        assert_eq!(
            U256::from_big_endian(&data[36..68]),
            U256::from(1_700_000_600u64)
        );
        // Dynamic bytes: offset word, then length word, then the payload
        assert_eq!(U256::from_big_endian(&data[68..100]), U256::from(0x60u64));
        assert_eq!(U256::from_big_endian(&data[100..132]), U256::from(4u64));
        assert_eq!(&data[132..136], signature.as_ref());
    }

    #[tokio::test]
    async fn test_unreachable_backend_aborts_before_any_submission() {
        let mut rpc = mock_with_nonce(0);
        // Login fails first; nothing on-chain may happen
        rpc.expect_call().times(0);
        rpc.expect_estimate_gas().times(0);
        rpc.expect_send_raw_transaction().times(0);

        let mut session = test_orchestrator(rpc).await;
        let result = session.aquaflux_flow().await;

        assert!(!result.success);
        assert!(result.stop);
        assert!(result.message.contains("login failed"));
    }
}
