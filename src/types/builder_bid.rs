use crate::types::{
    execution_payload::{ExecutionPayload, ExecutionPayloadHeader},
    primitives::{BlsPublicKey, BlsSignature, Fork},
};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use tree_hash_derive::TreeHash;

#[derive(Debug, Default, Clone, PartialEq, TreeHash, Serialize, Deserialize)]
pub struct BuilderBid {
    pub header: ExecutionPayloadHeader,
    #[serde(with = "crate::serde::as_str")]
    pub value: U256,
    #[serde(rename = "pubkey")]
    pub public_key: BlsPublicKey,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedBuilderBid {
    pub message: BuilderBid,
    pub signature: BlsSignature,
}

impl fmt::Display for SignedBuilderBid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let block_hash = self.message.header.block_hash;
        let value = &self.message.value;
        write!(f, "block hash {block_hash} and value {value}")
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetHeaderResponse {
    pub version: Fork,
    pub data: SignedBuilderBid,
}

impl GetHeaderResponse {
    pub fn value(&self) -> U256 {
        self.data.message.value
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPayloadResponse {
    pub version: Fork,
    pub data: ExecutionPayload,
}
