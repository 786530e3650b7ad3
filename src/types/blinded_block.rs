use crate::types::{
    execution_payload::ExecutionPayloadHeader,
    primitives::{BlsSignature, Root, Slot, ValidatorIndex},
};
use serde::{Deserialize, Serialize};
use tree_hash_derive::TreeHash;

// The block body is reduced to the fields this relay consumes; the remaining
// consensus operations live behind the beacon-node boundary.

#[derive(Debug, Default, Clone, PartialEq, TreeHash, Serialize, Deserialize)]
pub struct BlindedBeaconBlockBody {
    pub execution_payload_header: ExecutionPayloadHeader,
}

#[derive(Debug, Default, Clone, PartialEq, TreeHash, Serialize, Deserialize)]
pub struct BlindedBeaconBlock {
    #[serde(with = "crate::serde::as_str")]
    pub slot: Slot,
    #[serde(with = "crate::serde::as_str")]
    pub proposer_index: ValidatorIndex,
    pub parent_root: Root,
    pub state_root: Root,
    pub body: BlindedBeaconBlockBody,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedBlindedBeaconBlock {
    pub message: BlindedBeaconBlock,
    pub signature: BlsSignature,
}
