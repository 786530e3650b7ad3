use crate::types::{
    execution_payload::ExecutionPayload,
    primitives::{BlsPublicKey, BlsSignature, ExecutionAddress, Hash32, Slot},
};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use tree_hash_derive::TreeHash;

#[derive(Debug, Default, Clone, PartialEq, TreeHash, Serialize, Deserialize)]
pub struct BidTrace {
    #[serde(with = "crate::serde::as_str")]
    pub slot: Slot,
    pub parent_hash: Hash32,
    pub block_hash: Hash32,
    #[serde(rename = "builder_pubkey")]
    pub builder_public_key: BlsPublicKey,
    #[serde(rename = "proposer_pubkey")]
    pub proposer_public_key: BlsPublicKey,
    pub proposer_fee_recipient: ExecutionAddress,
    #[serde(with = "crate::serde::as_str")]
    pub gas_limit: u64,
    #[serde(with = "crate::serde::as_str")]
    pub gas_used: u64,
    #[serde(with = "crate::serde::as_str")]
    pub value: U256,
}

/// A builder's block submission: the bid metadata plus the full payload
/// backing it.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedBidSubmission {
    pub message: BidTrace,
    pub execution_payload: ExecutionPayload,
    pub signature: BlsSignature,
}
