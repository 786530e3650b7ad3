//! In-memory store of the best bid per auction lane and the payload backing
//! each served header.

use crate::types::{BlsPublicKey, GetHeaderResponse, GetPayloadResponse, Hash32, Slot};
use alloy_primitives::U256;
use parking_lot::RwLock;
use std::collections::HashMap;

/// The competitive lane a bid is ranked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BidKey {
    pub slot: Slot,
    pub parent_hash: Hash32,
    pub proposer_public_key: BlsPublicKey,
}

/// Identifies a payload for retrieval once its header was proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockKey {
    pub slot: Slot,
    pub block_hash: Hash32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    /// An existing bid for the lane carries the same or a higher value.
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionStats {
    pub removed: usize,
    pub remaining: usize,
}

// One lock guards both maps so a stored bid and its payload always appear and
// disappear together.
#[derive(Debug, Default)]
pub struct AuctionStore {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    bids: HashMap<BidKey, GetHeaderResponse>,
    payloads: HashMap<BlockKey, GetPayloadResponse>,
}

impl AuctionStore {
    pub fn get_bid(&self, key: &BidKey) -> Option<GetHeaderResponse> {
        self.state.read().bids.get(key).cloned()
    }

    pub fn get_payload(&self, key: &BlockKey) -> Option<GetPayloadResponse> {
        self.state.read().payloads.get(key).cloned()
    }

    pub fn best_bid_value(&self, key: &BidKey) -> Option<U256> {
        self.state.read().bids.get(key).map(|bid| bid.value())
    }

    /// Stores the bid and its payload unless the lane already holds a bid of
    /// equal or higher value. The check and the insert happen under one
    /// write lock, so concurrent submissions cannot regress the lane.
    pub fn try_submit(
        &self,
        bid_key: BidKey,
        block_key: BlockKey,
        bid: GetHeaderResponse,
        payload: GetPayloadResponse,
    ) -> SubmitOutcome {
        let mut state = self.state.write();
        if let Some(previous) = state.bids.get(&bid_key) {
            if previous.value() >= bid.value() {
                return SubmitOutcome::Rejected;
            }
        }
        state.bids.insert(bid_key, bid);
        state.payloads.insert(block_key, payload);
        SubmitOutcome::Accepted
    }

    /// Removes every bid and payload for slots before `cutoff`.
    pub fn evict_before(&self, cutoff: Slot) -> EvictionStats {
        let mut state = self.state.write();
        let before = state.bids.len() + state.payloads.len();
        state.bids.retain(|key, _| key.slot >= cutoff);
        state.payloads.retain(|key, _| key.slot >= cutoff);
        let after = state.bids.len() + state.payloads.len();
        EvictionStats { removed: before - after, remaining: state.bids.len() }
    }
}
