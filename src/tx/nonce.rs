//! Per-account nonce tracking
//!
//! Each account session exclusively owns one tracker; there is no shared
//! address-keyed map, so submissions for different accounts cannot race on
//! nonce state. The tracker advances only after a broadcast was accepted by
//! the network; a transaction that was sent but never confirmed must not be
//! resubmitted with the same nonce.

use crate::chain::ChainRpc;
use crate::error::RpcResult;

use ethers::types::Address;
use tracing::debug;

/// Next-usable-nonce counter for a single account
#[derive(Debug)]
pub struct NonceTracker {
    address: Address,
    next: u64,
}

impl NonceTracker {
    /// Seed the tracker from the network's pending transaction count
    pub async fn init(rpc: &dyn ChainRpc, address: Address) -> RpcResult<Self> {
        let next = rpc.pending_nonce(address).await?;
        debug!("Initialized nonce for {:?}: {}", address, next);
        Ok(Self { address, next })
    }

    /// The nonce the next submission should carry
    pub fn current(&self) -> u64 {
        self.next
    }

    /// Advance after a broadcast was accepted
    pub fn advance(&mut self) {
        self.next += 1;
    }

    /// Overwrite the local value with the network's pending count.
    ///
    /// Called when a submission fails with a nonce conflict: the local view
    /// is stale and the authoritative count wins.
    pub async fn resync(&mut self, rpc: &dyn ChainRpc) -> RpcResult<u64> {
        let fresh = rpc.pending_nonce(self.address).await?;
        if fresh != self.next {
            debug!(
                "Nonce resync for {:?}: local {} -> network {}",
                self.address, self.next, fresh
            );
        }
        self.next = fresh;
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::provider::MockChainRpc;

    #[tokio::test]
    async fn test_advance_is_strictly_increasing() {
        let mut rpc = MockChainRpc::new();
        rpc.expect_pending_nonce().returning(|_| Ok(7));

        let mut tracker = NonceTracker::init(&rpc, Address::zero()).await.unwrap();
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(tracker.current());
            tracker.advance();
        }
        assert_eq!(seen, vec![7, 8, 9, 10, 11]);
    }

    #[tokio::test]
    async fn test_resync_overwrites_local_value() {
        let mut rpc = MockChainRpc::new();
        let mut responses = vec![3u64, 12u64].into_iter();
        rpc.expect_pending_nonce()
            .times(2)
            .returning(move |_| Ok(responses.next().unwrap()));

        let mut tracker = NonceTracker::init(&rpc, Address::zero()).await.unwrap();
        tracker.advance();
        assert_eq!(tracker.current(), 4);

        let fresh = tracker.resync(&rpc).await.unwrap();
        assert_eq!(fresh, 12);
        assert_eq!(tracker.current(), 12);
    }
}
